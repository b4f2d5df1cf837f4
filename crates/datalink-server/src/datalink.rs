//! Batch evaluation of API strings over plain HTTP.
//!
//! `GET /datalink?alt=orbit.altitude&fuel=resource.amount[LiquidFuel]`
//! evaluates every parameter value against one telemetry snapshot and
//! answers `{"alt": .., "fuel": ..}` with keys in request order. A value
//! that cannot be produced is `null`; it never fails the whole batch.
//!
//! An object has one slot per key, so a batch that repeats a key is
//! answered with a bare array of values in request order instead.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::DataLinkError;
use crate::responsibility::Responsibility;
use crate::state::ServerContext;

/// Path served by the data link, for plain requests and stream upgrades.
pub const DATALINK_PATH: &str = "/datalink";

/// Whether `path` is the data-link path or below it.
pub fn is_datalink_path(path: &str) -> bool {
    path.strip_prefix(DATALINK_PATH)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Answers plain requests on [`DATALINK_PATH`].
#[derive(Debug, Clone)]
pub struct DataLinkResponsibility {
    context: Arc<ServerContext>,
}

impl DataLinkResponsibility {
    /// Create the responsibility over the shared context.
    pub const fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    fn answer(&self, parts: &Parts) -> Result<Response, DataLinkError> {
        if parts.method != Method::GET && parts.method != Method::HEAD {
            return Err(DataLinkError::MethodNotAllowed(parts.method.to_string()));
        }

        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|rejection| DataLinkError::MalformedRequest(rejection.body_text()))?;

        let body = serde_json::to_vec(&lay_out(self.evaluate(&pairs)))?;
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response())
    }

    /// Evaluate every `(key, api)` pair against one snapshot.
    fn evaluate(&self, pairs: &[(String, String)]) -> Vec<(String, Value)> {
        let telemetry = self.context.snapshot();
        let registry = self.context.registry();
        let mut out = Vec::with_capacity(pairs.len());
        for (key, api) in pairs {
            let value = registry.process(api, &telemetry).unwrap_or_else(|e| {
                if e.is_unknown() {
                    debug!(%key, %api, "unknown API in batch");
                } else {
                    debug!(%key, %api, error = %e, "API failed in batch");
                }
                Value::Null
            });
            out.push((key.clone(), value));
        }
        out
    }
}

/// Shape evaluated `(key, value)` pairs for the wire.
///
/// Distinct keys give an object in the given order. If any key repeats,
/// the values alone are returned as an array in the given order, so no
/// position is lost.
pub(crate) fn lay_out(entries: Vec<(String, Value)>) -> Value {
    let distinct = {
        let mut seen = HashSet::with_capacity(entries.len());
        entries.iter().all(|(key, _)| seen.insert(key.as_str()))
    };
    if distinct {
        return Value::Object(entries.into_iter().collect::<Map<String, Value>>());
    }
    debug!(positions = entries.len(), "repeated keys, answering positionally");
    Value::Array(entries.into_iter().map(|(_, value)| value).collect())
}

impl Responsibility for DataLinkResponsibility {
    fn respond(&self, parts: &Parts) -> Option<Response> {
        if !is_datalink_path(parts.uri.path()) {
            return None;
        }
        Some(self.answer(parts).unwrap_or_else(|e| {
            if e.status().is_server_error() {
                warn!(error = %e, "data link request failed");
            } else {
                debug!(error = %e, "data link request rejected");
            }
            e.into_response()
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pairs(entries: &[(&str, Value)]) -> Vec<(String, Value)> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn distinct_keys_lay_out_as_an_ordered_object() {
        let body = lay_out(pairs(&[("z", json!(1)), ("a", Value::Null)]));
        assert_eq!(body, json!({"z": 1, "a": null}));
        let keys: Vec<&String> = body.as_object().map(|o| o.keys().collect()).unwrap_or_default();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn repeated_keys_keep_every_position() {
        let body = lay_out(pairs(&[
            ("a", json!(5000.0)),
            ("a", Value::Null),
            ("b", json!(2)),
        ]));
        assert_eq!(body, json!([5000.0, null, 2]));
    }

    #[test]
    fn path_matching() {
        assert!(is_datalink_path("/datalink"));
        assert!(is_datalink_path("/datalink/"));
        assert!(!is_datalink_path("/datalinks"));
        assert!(!is_datalink_path("/"));
    }
}
