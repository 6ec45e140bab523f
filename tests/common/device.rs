use std::cell::RefCell;
use std::rc::Rc;

use mobile_agent::{
    agent::{agent_model::ActionCandidate, error::DeviceFault},
    device::device_model::{Ack, DeviceCollaborator},
    screen::screen_model::ScreenSnapshot,
};

use super::screens;

type ScreenFn = Box<dyn Fn(usize) -> ScreenSnapshot>;

/// In-memory device. The screen is a function of how many actions have
/// executed so far.
pub struct ScriptedDevice {
    screen_at: ScreenFn,
    executed_count: usize,
    executed: Rc<RefCell<Vec<ActionCandidate>>>,
    pending_execute_faults: u32,
    pending_capture_faults: u32,
    captures: Rc<RefCell<u32>>,
}

impl ScriptedDevice {
    pub fn new(screen_at: impl Fn(usize) -> ScreenSnapshot + 'static) -> Self {
        Self {
            screen_at: Box::new(screen_at),
            executed_count: 0,
            executed: Rc::new(RefCell::new(Vec::new())),
            pending_execute_faults: 0,
            pending_capture_faults: 0,
            captures: Rc::new(RefCell::new(0)),
        }
    }

    /// Screen that never changes.
    pub fn fixed(snapshot: ScreenSnapshot) -> Self {
        Self::new(move |_| snapshot.clone())
    }

    /// A new screen after every action.
    pub fn ever_changing() -> Self {
        Self::new(screens::numbered)
    }

    /// Walk through `sequence`, staying on the last screen.
    pub fn sequence(sequence: Vec<ScreenSnapshot>) -> Self {
        Self::new(move |i| sequence[i.min(sequence.len() - 1)].clone())
    }

    /// The next `n` execute calls fail.
    pub fn failing_executions(mut self, n: u32) -> Self {
        self.pending_execute_faults = n;
        self
    }

    /// The next `n` capture calls fail.
    pub fn failing_captures(mut self, n: u32) -> Self {
        self.pending_capture_faults = n;
        self
    }

    pub fn executed(&self) -> Rc<RefCell<Vec<ActionCandidate>>> {
        self.executed.clone()
    }

    pub fn capture_count(&self) -> Rc<RefCell<u32>> {
        self.captures.clone()
    }
}

impl DeviceCollaborator for ScriptedDevice {
    fn capture_snapshot(&mut self) -> Result<ScreenSnapshot, DeviceFault> {
        *self.captures.borrow_mut() += 1;
        if self.pending_capture_faults > 0 {
            self.pending_capture_faults -= 1;
            return Err(DeviceFault::Capture("scripted capture fault".into()));
        }
        Ok((self.screen_at)(self.executed_count))
    }

    fn execute(&mut self, candidate: &ActionCandidate) -> Result<Ack, DeviceFault> {
        if self.pending_execute_faults > 0 {
            self.pending_execute_faults -= 1;
            return Err(DeviceFault::Other("scripted execute fault".into()));
        }
        self.executed.borrow_mut().push(candidate.clone());
        self.executed_count += 1;
        Ok(Ack)
    }
}
