//! Lock-free lifecycle state shared between control operations and the fault
//! handler.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::{
    config::FecState,
    err::{FecError, FecResult},
};

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU32);

impl StateCell {
    pub(crate) const fn new(state: FecState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    pub(crate) fn get(&self) -> FecState {
        match self.0.load(Ordering::Acquire) {
            0 => FecState::Init,
            1 => FecState::Started,
            2 => FecState::Stopped,
            _ => FecState::NeedsReset,
        }
    }

    pub(crate) fn is_needs_reset(&self) -> bool {
        self.get() == FecState::NeedsReset
    }

    /// Unconditional store, used by reinitialisation and escalation.
    pub(crate) fn set(&self, state: FecState) {
        self.0.store(state as u32, Ordering::Release);
    }

    /// Move to `next` unless a fault escalated the device meanwhile.
    ///
    /// Returns the state that was replaced.
    pub(crate) fn advance(&self, next: FecState) -> FecResult<FecState> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == FecState::NeedsReset as u32 {
                error!("Device needs reset, refusing transition to {next:?}");
                return Err(FecError::PermissionDenied("device needs reset"));
            }
            match self
                .0
                .compare_exchange_weak(current, next as u32, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => return FecState::try_from(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Fail with `PermissionDenied` once the device needs reset.
    pub(crate) fn ensure_operational(&self) -> FecResult<()> {
        if self.is_needs_reset() {
            error!("Device needs reset, aborting");
            return Err(FecError::PermissionDenied("device needs reset"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_reports_previous_state() {
        let state = StateCell::new(FecState::Init);
        assert_eq!(state.advance(FecState::Started), Ok(FecState::Init));
        assert_eq!(state.get(), FecState::Started);
        assert_eq!(state.advance(FecState::Stopped), Ok(FecState::Started));
    }

    #[test]
    fn needs_reset_is_sticky() {
        let state = StateCell::new(FecState::Started);
        state.set(FecState::NeedsReset);
        assert!(state.advance(FecState::Stopped).is_err());
        assert!(state.ensure_operational().is_err());
        assert_eq!(state.get(), FecState::NeedsReset);

        state.set(FecState::Init);
        assert!(state.ensure_operational().is_ok());
    }
}
