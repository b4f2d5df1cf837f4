//! Chain of responsibility for plain HTTP requests.
//!
//! Each [`Responsibility`] inspects the request head and either answers
//! it or passes. The chain asks them in order and the first answer wins.
//! [`ElseResponsibility`] always sits last and always answers, so every
//! request gets a response.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tracing::debug;

/// Something that may answer a request.
pub trait Responsibility: Send + Sync {
    /// Answer the request, or return `None` to pass it on.
    fn respond(&self, parts: &Parts) -> Option<Response>;
}

/// Terminal responsibility: answers everything with `404`.
#[derive(Debug, Clone)]
pub struct ElseResponsibility {
    banner: String,
}

impl ElseResponsibility {
    /// Create the terminal responsibility. `banner` is `name/version`.
    pub const fn new(banner: String) -> Self {
        Self { banner }
    }

    fn answer(&self, parts: &Parts) -> Response {
        debug!(method = %parts.method, path = %parts.uri.path(), "no responsibility claimed request");
        let body = serde_json::json!({
            "error": format!("nothing is served at {}", parts.uri.path()),
            "status": StatusCode::NOT_FOUND.as_u16(),
            "server": self.banner,
        });
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

impl Responsibility for ElseResponsibility {
    fn respond(&self, parts: &Parts) -> Option<Response> {
        Some(self.answer(parts))
    }
}

/// Ordered responsibilities ending in an [`ElseResponsibility`].
pub struct ResponsibilityChain {
    responsibilities: Vec<Box<dyn Responsibility>>,
    terminal: ElseResponsibility,
}

impl ResponsibilityChain {
    /// A chain that only has the terminal responsibility.
    pub const fn new(terminal: ElseResponsibility) -> Self {
        Self {
            responsibilities: Vec::new(),
            terminal,
        }
    }

    /// Add a responsibility ahead of the terminal one.
    #[must_use]
    pub fn with(mut self, responsibility: impl Responsibility + 'static) -> Self {
        self.responsibilities.push(Box::new(responsibility));
        self
    }

    /// Answer a request. Always produces a response.
    pub fn respond(&self, parts: &Parts) -> Response {
        self.responsibilities
            .iter()
            .find_map(|r| r.respond(parts))
            .unwrap_or_else(|| self.terminal.answer(parts))
    }

    /// Number of responsibilities, not counting the terminal one.
    pub fn len(&self) -> usize {
        self.responsibilities.len()
    }

    /// Whether only the terminal responsibility is present.
    pub fn is_empty(&self) -> bool {
        self.responsibilities.is_empty()
    }
}

impl fmt::Debug for ResponsibilityChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsibilityChain")
            .field("responsibilities", &self.responsibilities.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    struct Fixed(&'static str, StatusCode);

    impl Responsibility for Fixed {
        fn respond(&self, parts: &Parts) -> Option<Response> {
            (parts.uri.path() == self.0).then(|| self.1.into_response())
        }
    }

    fn parts(path: &str) -> Parts {
        Request::get(path).body(()).unwrap().into_parts().0
    }

    #[test]
    fn first_answer_wins() {
        let chain = ResponsibilityChain::new(ElseResponsibility::new("t/1".to_owned()))
            .with(Fixed("/a", StatusCode::OK))
            .with(Fixed("/a", StatusCode::ACCEPTED))
            .with(Fixed("/b", StatusCode::CREATED));

        assert_eq!(chain.respond(&parts("/a")).status(), StatusCode::OK);
        assert_eq!(chain.respond(&parts("/b")).status(), StatusCode::CREATED);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn unclaimed_requests_reach_the_terminal() {
        let chain = ResponsibilityChain::new(ElseResponsibility::new("t/1".to_owned()));
        assert!(chain.is_empty());
        assert_eq!(chain.respond(&parts("/nowhere")).status(), StatusCode::NOT_FOUND);
    }
}
