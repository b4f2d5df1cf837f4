//! The control surface the host simulation exposes to the data link.
//!
//! Control capabilities never touch live state from a network task. They
//! enqueue a closure on the [`ControlQueue`], and the host drains it once
//! per tick against its [`FlightControl`] implementation.

use crate::deferred::DeferredQueue;

/// Mutations the data link may request of the running simulation.
///
/// Called only from the simulation thread, during the deferred drain.
pub trait FlightControl {
    /// Set the main throttle. The value is already clamped to `[0, 1]`.
    fn set_throttle(&mut self, throttle: f64);

    /// Engage or release stability assist.
    fn set_sas(&mut self, engaged: bool);

    /// Engage or release reaction control.
    fn set_rcs(&mut self, engaged: bool);

    /// Fire the next stage.
    fn activate_next_stage(&mut self);

    /// Change the time-warp multiplier. The value is finite and non-negative.
    fn set_warp_rate(&mut self, rate: f64);
}

/// Deferred actions targeting the host's [`FlightControl`].
pub type ControlQueue = DeferredQueue<dyn FlightControl>;

#[cfg(test)]
pub(crate) mod testing {
    use super::FlightControl;

    /// Records every call for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingControl {
        pub throttle: Option<f64>,
        pub sas: Option<bool>,
        pub rcs: Option<bool>,
        pub stages: u32,
        pub warp: Option<f64>,
    }

    impl FlightControl for RecordingControl {
        fn set_throttle(&mut self, throttle: f64) {
            self.throttle = Some(throttle);
        }

        fn set_sas(&mut self, engaged: bool) {
            self.sas = Some(engaged);
        }

        fn set_rcs(&mut self, engaged: bool) {
            self.rcs = Some(engaged);
        }

        fn activate_next_stage(&mut self) {
            self.stages = self.stages.saturating_add(1);
        }

        fn set_warp_rate(&mut self, rate: f64) {
            self.warp = Some(rate);
        }
    }
}
