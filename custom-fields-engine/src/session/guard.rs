//! Rollback of in-flight markers when a request future is dropped.

use std::sync::{Mutex, MutexGuard};

use custom_fields_shared::{EntryId, FieldId, SubsectionId};

use crate::state::{
    apply_load_failure, apply_submit_failure, finish_entry_create, finish_entry_op, finish_upload,
    EngineState,
};

/// Lock the state, recovering from a poisoned mutex.
pub(crate) fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The marker to clear if a request never completes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Rollback {
    Load,
    Submit,
    Upload(FieldId),
    Entry(EntryId),
    EntryCreate(SubsectionId),
}

impl Rollback {
    fn apply(self, state: &EngineState) -> EngineState {
        match self {
            Self::Load => apply_load_failure("load was cancelled"),
            Self::Submit => apply_submit_failure(state),
            Self::Upload(field_id) => finish_upload(state, field_id, None),
            Self::Entry(entry_id) => finish_entry_op(state, entry_id, None),
            Self::EntryCreate(subsection_id) => finish_entry_create(state, subsection_id),
        }
    }
}

/// Held across a request's await point.
///
/// Dropping the guard without [`RollbackGuard::complete`] applies the
/// rollback, which covers both request failures and cancelled futures.
pub(crate) struct RollbackGuard<'a> {
    state: &'a Mutex<EngineState>,
    rollback: Option<Rollback>,
}

impl<'a> RollbackGuard<'a> {
    pub(crate) fn new(state: &'a Mutex<EngineState>, rollback: Rollback) -> Self {
        Self {
            state,
            rollback: Some(rollback),
        }
    }

    /// Replace the rollback with the request's own outcome.
    pub(crate) fn complete(mut self, outcome: impl FnOnce(&EngineState) -> EngineState) {
        self.rollback = None;
        let mut state = lock(self.state);
        *state = outcome(&state);
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if let Some(rollback) = self.rollback.take() {
            let mut state = lock(self.state);
            *state = rollback.apply(&state);
        }
    }
}
