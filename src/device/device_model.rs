use crate::{
    agent::{agent_model::ActionCandidate, error::DeviceFault, task::Task},
    screen::screen_model::ScreenSnapshot,
};

/// Acknowledgement of an executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// The device a run drives. Owned exclusively by one run.
///
/// Implementations must tolerate repeated calls and must not assume any
/// earlier call succeeded.
pub trait DeviceCollaborator {
    /// Bring the target app to the foreground before the first step.
    fn prepare(&mut self, _task: &Task) -> Result<(), DeviceFault> {
        Ok(())
    }

    fn capture_snapshot(&mut self) -> Result<ScreenSnapshot, DeviceFault>;

    /// Execute a candidate whose coordinates are already device-native.
    fn execute(&mut self, candidate: &ActionCandidate) -> Result<Ack, DeviceFault>;
}

impl<D: DeviceCollaborator + ?Sized> DeviceCollaborator for Box<D> {
    fn prepare(&mut self, task: &Task) -> Result<(), DeviceFault> {
        (**self).prepare(task)
    }

    fn capture_snapshot(&mut self) -> Result<ScreenSnapshot, DeviceFault> {
        (**self).capture_snapshot()
    }

    fn execute(&mut self, candidate: &ActionCandidate) -> Result<Ack, DeviceFault> {
        (**self).execute(candidate)
    }
}
