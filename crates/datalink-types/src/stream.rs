//! Client-to-server messages of the streaming protocol.
//!
//! After the upgrade handshake a dashboard manages its subscription list
//! by sending JSON text frames such as:
//!
//! ```json
//! { "+": ["orbit.altitude", "vessel.name"], "-": ["game.time"], "rate": 250 }
//! ```
//!
//! Every key is optional. The server answers with one JSON object per push
//! cycle whose keys are the subscribed API strings, in subscription order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A subscription-management message from a streaming client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StreamRequest {
    /// API calls to append to the subscription list.
    #[serde(rename = "+", default)]
    pub subscribe: Vec<String>,
    /// API calls to remove from the subscription list.
    #[serde(rename = "-", default)]
    pub unsubscribe: Vec<String>,
    /// New push interval in milliseconds.
    #[serde(default)]
    pub rate: Option<u64>,
    /// API calls to evaluate once, in the next frame only.
    #[serde(default)]
    pub run: Vec<String>,
}

impl StreamRequest {
    /// Whether the message carries no instruction at all.
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty()
            && self.unsubscribe.is_empty()
            && self.rate.is_none()
            && self.run.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_keys() {
        let msg: StreamRequest =
            serde_json::from_str(r#"{"+":["a.b","c[1,2]"],"-":["d"],"rate":250,"run":["e"]}"#)
                .unwrap();
        assert_eq!(msg.subscribe, vec!["a.b".to_owned(), "c[1,2]".to_owned()]);
        assert_eq!(msg.unsubscribe, vec!["d".to_owned()]);
        assert_eq!(msg.rate, Some(250));
        assert_eq!(msg.run, vec!["e".to_owned()]);
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let msg: StreamRequest = serde_json::from_str("{}").unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(serde_json::from_str::<StreamRequest>(r#"{"+":"a.b"}"#).is_err());
    }
}
