use std::sync::Arc;

use crate::api::ApiEntry;
use crate::error::{HandlerError, RegistryError};
use crate::flight::ControlQueue;
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Simulation clock and time warp. Available with or without a vessel.
    TimeWarpHandler
}

impl TimeWarpHandler {
    /// Build the handler. `warp.set` queues onto `queue`.
    pub fn new(queue: &Arc<ControlQueue>) -> Result<Self, RegistryError> {
        let setter = Arc::clone(queue);
        let mut table = EntryTable::new();
        table.register_all([
            ApiEntry::new(
                "warp.rate",
                "Current time-warp multiplier",
                Formatter::Default,
                |ds| Ok(Native::Float(ds.universe().warp_rate)),
            ),
            ApiEntry::new(
                "warp.set",
                "Request a new time-warp multiplier",
                Formatter::Default,
                move |ds| {
                    let rate: f64 = ds.parse_arg(0, "number")?;
                    if !rate.is_finite() || rate < 0.0 {
                        return Err(HandlerError::InvalidArgument {
                            value: ds.arg(0)?.to_owned(),
                            expected: "non-negative number",
                        });
                    }
                    setter.enqueue(move |c| c.set_warp_rate(rate));
                    Ok(Native::Int(0))
                },
            ),
            ApiEntry::new(
                "game.time",
                "Universal time in seconds",
                Formatter::Default,
                |ds| Ok(Native::Float(ds.universe().universal_time)),
            ),
        ])?;
        Ok(Self { table })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::deferred::DeferredQueue;
    use crate::flight::testing::RecordingControl;
    use crate::handlers::testing::{eval, flying, grounded};

    #[test]
    fn reads_the_clock_without_a_vessel() {
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        let handler = TimeWarpHandler::new(&queue).unwrap();
        assert_eq!(eval(&handler, &grounded(), "game.time").unwrap(), json!(0.0));
        assert_eq!(eval(&handler, &flying(), "warp.rate").unwrap(), json!(1.0));
    }

    #[test]
    fn set_is_deferred_and_validated() {
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        let handler = TimeWarpHandler::new(&queue).unwrap();
        let t = grounded();

        assert!(eval(&handler, &t, "warp.set[-1]").is_err());
        assert!(eval(&handler, &t, "warp.set[inf]").is_err());
        assert!(queue.is_empty());

        assert_eq!(eval(&handler, &t, "warp.set[4]").unwrap(), json!(0));
        let mut control = RecordingControl::default();
        queue.drain(&mut control);
        assert_eq!(control.warp, Some(4.0));
    }
}
