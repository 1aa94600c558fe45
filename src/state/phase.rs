use thiserror::Error;

/// Lifecycle phases of the session coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinatorPhase {
    /// No round has been started yet.
    #[default]
    Idle,
    /// A round is in progress and accepts answers.
    Running,
    /// Termination side effects are being executed.
    Ending,
    /// The round terminated; a new one may be started.
    Ended,
}

/// Events that move the coordinator between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A player starts a round.
    Start,
    /// Termination has been claimed by the first caller.
    BeginEnd,
    /// Termination side effects are done.
    FinishEnd,
}

/// Error returned when an event is not valid in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the coordinator was in.
    pub from: CoordinatorPhase,
    /// Rejected event.
    pub event: PhaseEvent,
}

/// Validated transition table for [`CoordinatorPhase`].
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    phase: CoordinatorPhase,
}

impl PhaseMachine {
    /// Machine initialised in [`CoordinatorPhase::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<CoordinatorPhase, InvalidTransition> {
        let next = Self::compute_transition(self.phase, event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(
        from: CoordinatorPhase,
        event: PhaseEvent,
    ) -> Result<CoordinatorPhase, InvalidTransition> {
        let next = match (from, event) {
            (CoordinatorPhase::Idle | CoordinatorPhase::Ended, PhaseEvent::Start) => {
                CoordinatorPhase::Running
            }
            (CoordinatorPhase::Running, PhaseEvent::BeginEnd) => CoordinatorPhase::Ending,
            (CoordinatorPhase::Ending, PhaseEvent::FinishEnd) => CoordinatorPhase::Ended,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_is_idle() {
        assert_eq!(PhaseMachine::new().phase(), CoordinatorPhase::Idle);
    }

    #[test]
    fn full_round_and_restart() {
        let mut machine = PhaseMachine::new();
        assert_eq!(machine.apply(PhaseEvent::Start), Ok(CoordinatorPhase::Running));
        assert_eq!(machine.apply(PhaseEvent::BeginEnd), Ok(CoordinatorPhase::Ending));
        assert_eq!(machine.apply(PhaseEvent::FinishEnd), Ok(CoordinatorPhase::Ended));
        assert_eq!(machine.apply(PhaseEvent::Start), Ok(CoordinatorPhase::Running));
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut machine = PhaseMachine::new();
        machine.apply(PhaseEvent::Start).unwrap();
        let err = machine.apply(PhaseEvent::Start).unwrap_err();
        assert_eq!(err.from, CoordinatorPhase::Running);
        assert_eq!(err.event, PhaseEvent::Start);
        assert_eq!(machine.phase(), CoordinatorPhase::Running);
    }

    #[test]
    fn end_from_idle_is_rejected() {
        let mut machine = PhaseMachine::new();
        assert!(machine.apply(PhaseEvent::BeginEnd).is_err());
        assert_eq!(machine.phase(), CoordinatorPhase::Idle);
    }
}
