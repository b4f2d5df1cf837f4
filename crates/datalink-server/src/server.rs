//! Listener lifecycle.
//!
//! [`bind`] creates a listener with the configured accept backlog and
//! [`serve`] runs the router on it until the shutdown signal flips.

use std::net::SocketAddr;

use axum::Router;
use datalink_core::ServerSettings;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ServerError;

/// Bind a listener on `address` with an accept backlog of `backlog`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the socket cannot be created, bound,
/// or put into listening mode.
pub fn bind(address: SocketAddr, backlog: u32) -> Result<TcpListener, ServerError> {
    let bind_error = |source| ServerError::Bind { address, source };

    let socket = if address.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;
    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(address).map_err(bind_error)?;
    socket.listen(backlog).map_err(bind_error)
}

/// Bind every configured address. Returns each listener with its actual
/// local address, so port `0` resolves to the assigned port.
///
/// Fails as a whole: listeners bound before a failure are dropped.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] for the first address that fails.
pub fn bind_all(settings: &ServerSettings) -> Result<Vec<(SocketAddr, TcpListener)>, ServerError> {
    settings
        .socket_addrs()
        .into_iter()
        .map(|address| {
            let listener = bind(address, settings.backlog)?;
            let local = listener
                .local_addr()
                .map_err(|source| ServerError::Bind { address, source })?;
            debug!(requested = %address, bound = %local, "listener bound");
            Ok((local, listener))
        })
        .collect()
}

/// Serve `router` on `listener` until `shutdown` becomes `true` or its
/// sender is dropped.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the accept loop fails.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        })
        .await
        .map_err(|source| ServerError::Serve { source })
}
