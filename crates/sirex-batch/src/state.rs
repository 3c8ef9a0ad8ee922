//! Transient per-run call accounting.

/// Call counters threaded through one run. Never persisted.
///
/// The budget counts calls that produced an artifact; pacing counts every
/// call that was attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    budget: Option<u64>,
    calls_attempted: u64,
    calls_made: u64,
    waits: u64,
    halted: bool,
}

impl RunState {
    /// `max_new_files == 0` means no budget.
    pub fn new(max_new_files: u64) -> Self {
        Self {
            budget: (max_new_files > 0).then_some(max_new_files),
            ..Self::default()
        }
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// True once another call would exceed the budget.
    pub fn budget_exhausted(&self) -> bool {
        self.budget.is_some_and(|b| self.calls_made >= b)
    }

    /// Every call after the first of the run is paced.
    pub fn needs_pacing(&self) -> bool {
        self.calls_attempted > 0
    }

    pub fn record_attempt(&mut self) {
        self.calls_attempted += 1;
    }

    pub fn record_call(&mut self) {
        self.calls_made += 1;
    }

    pub fn record_wait(&mut self) {
        self.waits += 1;
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn calls_attempted(&self) -> u64 {
        self.calls_attempted
    }

    pub fn calls_made(&self) -> u64 {
        self.calls_made
    }

    pub fn waits(&self) -> u64 {
        self.waits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_unlimited() {
        let mut state = RunState::new(0);
        for _ in 0..100 {
            state.record_call();
        }
        assert_eq!(state.budget(), None);
        assert!(!state.budget_exhausted());
    }

    #[test]
    fn budget_counts_completed_calls() {
        let mut state = RunState::new(2);
        state.record_attempt();
        assert!(!state.budget_exhausted());
        state.record_call();
        state.record_attempt();
        state.record_call();
        assert!(state.budget_exhausted());
    }

    #[test]
    fn failed_attempts_still_trigger_pacing() {
        let mut state = RunState::new(1);
        assert!(!state.needs_pacing());
        state.record_attempt();
        assert!(state.needs_pacing());
        assert!(!state.budget_exhausted());
    }
}
