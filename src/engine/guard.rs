use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Executing,
}

/// Holds an engine in [`EngineState::Executing`] for its lifetime.
///
/// Dropping the guard returns the engine to `Idle`, whether the execution returned normally,
/// propagated an error or unwound.
#[derive(Debug)]
pub(crate) struct ExecutionGuard<'a> {
    state: &'a Mutex<EngineState>,
}

impl<'a> ExecutionGuard<'a> {
    /// Enter the executing state, or `None` when the engine is already executing.
    pub(crate) fn enter(state: &'a Mutex<EngineState>) -> Option<ExecutionGuard<'a>> {
        let mut current = state.lock();
        if *current == EngineState::Executing {
            return None;
        }
        *current = EngineState::Executing;
        Some(ExecutionGuard { state })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = EngineState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_guard_is_exclusive() {
        let state = Mutex::new(EngineState::Idle);
        let guard = ExecutionGuard::enter(&state).unwrap();
        assert_eq!(*state.lock(), EngineState::Executing);
        assert!(ExecutionGuard::enter(&state).is_none());
        drop(guard);
        assert_eq!(*state.lock(), EngineState::Idle);
        assert!(ExecutionGuard::enter(&state).is_some());
    }

    #[test]
    fn test_guard_resets_on_error_path() {
        fn failing(state: &Mutex<EngineState>) -> Result<(), String> {
            let _guard = ExecutionGuard::enter(state).ok_or("busy")?;
            Err("evaluation failed".to_string())
        }
        let state = Mutex::new(EngineState::Idle);
        assert!(failing(&state).is_err());
        assert_eq!(*state.lock(), EngineState::Idle);
    }

    #[test]
    fn test_guard_resets_on_unwind() {
        let state = Mutex::new(EngineState::Idle);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ExecutionGuard::enter(&state);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(*state.lock(), EngineState::Idle);
    }
}
