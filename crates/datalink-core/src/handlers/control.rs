use std::sync::Arc;

use crate::api::{ApiEntry, DataSources};
use crate::deferred::DelayedEntry;
use crate::error::{HandlerError, RegistryError};
use crate::flight::{ControlQueue, FlightControl};
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Fly-by-wire commands.
    ///
    /// Every command validates its arguments, requires an active vessel,
    /// and answers `0` at once. The change itself is queued and applied
    /// on the next simulation tick.
    ControlHandler
}

impl ControlHandler {
    /// Build the handler around the queue the host drains each tick.
    pub fn new(queue: &Arc<ControlQueue>) -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register_all([
            command(
                queue,
                "control.throttle",
                "Set the main throttle, clamped to [0, 1]",
                |ds| {
                    let value: f64 = ds.parse_arg(0, "number")?;
                    if !value.is_finite() {
                        return Err(HandlerError::InvalidArgument {
                            value: ds.arg(0)?.to_owned(),
                            expected: "finite number",
                        });
                    }
                    let throttle = value.clamp(0.0, 1.0);
                    Ok(action(move |c| c.set_throttle(throttle)))
                },
            ),
            command(queue, "control.sas", "Engage (true) or release (false) SAS", |ds| {
                let engaged = ds.bool_arg(0)?;
                Ok(action(move |c| c.set_sas(engaged)))
            }),
            command(queue, "control.rcs", "Engage (true) or release (false) RCS", |ds| {
                let engaged = ds.bool_arg(0)?;
                Ok(action(move |c| c.set_rcs(engaged)))
            }),
            command(queue, "control.stage", "Activate the next stage", |_| {
                Ok(action(|c| c.activate_next_stage()))
            }),
        ])?;
        Ok(Self { table })
    }
}

type Action = DelayedEntry<dyn FlightControl>;

fn action(f: impl FnOnce(&mut (dyn FlightControl + 'static)) + Send + 'static) -> Action {
    Box::new(f)
}

/// Wrap a command builder as an entry that queues the built action.
fn command<B>(queue: &Arc<ControlQueue>, name: &str, description: &str, build: B) -> ApiEntry
where
    B: Fn(&DataSources) -> Result<Action, HandlerError> + Send + Sync + 'static,
{
    let queue = Arc::clone(queue);
    ApiEntry::new(name, description, Formatter::Default, move |ds| {
        ds.subject()?;
        queue.enqueue_boxed(build(ds)?);
        Ok(Native::Int(0))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::deferred::DeferredQueue;
    use crate::flight::testing::RecordingControl;
    use crate::handlers::testing::{eval, flying, grounded};

    fn setup() -> (Arc<ControlQueue>, ControlHandler) {
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        let handler = ControlHandler::new(&queue).unwrap();
        (queue, handler)
    }

    #[test]
    fn commands_apply_on_drain_not_on_call() {
        let (queue, handler) = setup();
        let t = flying();
        assert_eq!(eval(&handler, &t, "control.throttle[0.75]").unwrap(), json!(0));
        assert_eq!(eval(&handler, &t, "control.sas[off]").unwrap(), json!(0));
        assert_eq!(eval(&handler, &t, "control.rcs[true]").unwrap(), json!(0));
        assert_eq!(eval(&handler, &t, "control.stage").unwrap(), json!(0));
        assert_eq!(queue.len(), 4);

        let mut control = RecordingControl::default();
        assert_eq!(queue.drain(&mut control), 4);
        assert_eq!(control.throttle, Some(0.75));
        assert_eq!(control.sas, Some(false));
        assert_eq!(control.rcs, Some(true));
        assert_eq!(control.stages, 1);
    }

    #[test]
    fn throttle_is_clamped() {
        let (queue, handler) = setup();
        eval(&handler, &flying(), "control.throttle[7]").unwrap();
        let mut control = RecordingControl::default();
        queue.drain(&mut control);
        assert_eq!(control.throttle, Some(1.0));
    }

    #[test]
    fn bad_arguments_queue_nothing() {
        let (queue, handler) = setup();
        let t = flying();
        assert!(matches!(
            eval(&handler, &t, "control.throttle[fast]"),
            Err(HandlerError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval(&handler, &t, "control.throttle[NaN]"),
            Err(HandlerError::InvalidArgument { .. })
        ));
        assert_eq!(
            eval(&handler, &t, "control.sas"),
            Err(HandlerError::MissingArgument { index: 0 })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn commands_need_a_vessel() {
        let (queue, handler) = setup();
        assert_eq!(
            eval(&handler, &grounded(), "control.stage"),
            Err(HandlerError::NoSubject)
        );
        assert!(queue.is_empty());
    }
}
