//! Async engine session bound to one `(entity_type, entity_slug)` pair.
//!
//! The session owns an [`EngineState`] behind a mutex and drives the three
//! network boundaries: the initial load, uploads, and submissions. All state
//! changes go through the reducers in [`crate::state`]; the lock is never
//! held across an await point.

mod guard;

use std::sync::Mutex;

use tracing::{debug, info, instrument, warn};

use custom_fields_repository::{
    CompliancePayload, ComplianceQuery, EntityRef, FieldsApiError, FieldsService, FileUpload,
};
use custom_fields_shared::{
    ComplianceHistoryEntry, EntryId, FieldId, FieldUpdate, SubsectionId, TypedValue,
};

use crate::compliance::{fallback_download_url, ComplianceAction, ComplianceSubmission};
use crate::errors::EngineError;
use crate::render::{build_render_model, RenderModel};
use crate::state::{
    apply_compliance_refresh, apply_entry_added, apply_entry_field_change, apply_entry_removed,
    apply_field_change, apply_load_failure, apply_load_success, apply_submit_success,
    begin_entry_create, begin_entry_op, begin_entry_save, begin_load, begin_submit, begin_upload,
    check_file_field, finish_entry_op, finish_upload, EngineState, LoadPayload, Phase,
    SessionStatus, SubmitPlan,
};

use guard::{lock, Rollback, RollbackGuard};

/// What a session fetches on load.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Fetch the management listing for orphan reconciliation.
    pub include_management: bool,
    /// Fetch compliance values for compliance cards.
    pub include_compliance: bool,
    pub compliance_query: ComplianceQuery,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            include_management: true,
            include_compliance: true,
            compliance_query: ComplianceQuery::default(),
        }
    }
}

/// Result of a submission that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { updated: usize },
    /// There was nothing to send; no request was made.
    NothingToUpdate,
}

pub struct EngineSession {
    service: FieldsService,
    entity: EntityRef,
    options: SessionOptions,
    state: Mutex<EngineState>,
}

impl EngineSession {
    pub fn new(service: FieldsService, entity: EntityRef) -> Self {
        Self::with_options(service, entity, SessionOptions::default())
    }

    pub fn with_options(service: FieldsService, entity: EntityRef, options: SessionOptions) -> Self {
        Self {
            service,
            entity,
            options,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// A copy of the current state.
    pub fn state(&self) -> EngineState {
        lock(&self.state).clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase.clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status()
    }

    pub fn render_model(&self) -> RenderModel {
        build_render_model(&lock(&self.state))
    }

    pub fn has_unsaved_changes(&self) -> bool {
        lock(&self.state).has_unsaved_changes()
    }

    /// The scalar updates a submission would send right now.
    pub fn pending_updates(&self) -> Vec<FieldUpdate> {
        lock(&self.state).pending_updates()
    }

    /// Current value of an entity-level field.
    pub fn value(&self, field_id: FieldId) -> Option<TypedValue> {
        lock(&self.state).snapshot.current.get(&field_id).cloned()
    }

    /// Current value of a group entry field.
    pub fn entry_value(&self, entry_id: EntryId, field_id: FieldId) -> Option<TypedValue> {
        lock(&self.state)
            .entries
            .get(&entry_id)
            .and_then(|entry| entry.snapshot.current.get(&field_id).cloned())
    }

    /// Run a reducer against the state, storing its result on success.
    fn transition<T>(
        &self,
        reducer: impl FnOnce(&EngineState) -> Result<(EngineState, T), EngineError>,
    ) -> Result<T, EngineError> {
        let mut state = lock(&self.state);
        let (next, output) = reducer(&state)?;
        *state = next;
        Ok(output)
    }

    /// Fetch hierarchy, values and the optional listings concurrently.
    ///
    /// Any failure moves the session to `LoadFailed`; nothing partial is kept.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn load(&self) -> Result<(), EngineError> {
        self.transition(|state| begin_load(state).map(|next| (next, ())))?;
        let guard = RollbackGuard::new(&self.state, Rollback::Load);

        match self.fetch_all().await {
            Ok(payload) => {
                let ready = apply_load_success(payload);
                info!(
                    sections = ready.schema().sections().len(),
                    scalar_fields = ready.loaded.field_id_to_slug.len(),
                    orphans = ready.loaded.orphan_count,
                    entries = ready.entries.len(),
                    compliance_values = ready.compliance.len(),
                    "Session loaded"
                );
                guard.complete(|_| ready);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Session load failed");
                let message = err.to_string();
                guard.complete(|_| apply_load_failure(message));
                Err(EngineError::load(err))
            }
        }
    }

    /// Discard all edits and load again.
    pub async fn reload(&self) -> Result<(), EngineError> {
        match self.phase() {
            Phase::Ready | Phase::LoadFailed(_) => self.load().await,
            Phase::Idle => Err(EngineError::NotReady),
            Phase::Loading | Phase::Submitting => {
                Err(EngineError::busy("cannot reload while a request is in progress"))
            }
        }
    }

    async fn fetch_all(&self) -> Result<LoadPayload, FieldsApiError> {
        let hierarchy = self
            .service
            .fetch_hierarchy(&self.entity.entity_type, Some(&self.entity.entity_slug));
        let values = self.service.fetch_entity_values(&self.entity);
        let management = async {
            if self.options.include_management {
                self.service
                    .fetch_management_fields(&self.entity.entity_type)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let compliance = async {
            if self.options.include_compliance {
                self.service
                    .fetch_compliance_fields(&self.entity, &self.options.compliance_query)
                    .await
            } else {
                Ok(Vec::new())
            }
        };

        let (hierarchy, values, management, compliance) =
            tokio::try_join!(hierarchy, values, management, compliance)?;

        Ok(LoadPayload {
            hierarchy,
            values,
            management,
            compliance,
        })
    }

    /// Set a field's value and propagate it to the fields mirroring it.
    pub fn on_field_change(
        &self,
        field_id: FieldId,
        value: impl Into<TypedValue>,
    ) -> Result<(), EngineError> {
        let value = value.into();
        self.transition(|state| apply_field_change(state, field_id, value).map(|next| (next, ())))
    }

    /// Send the scalar diff.
    ///
    /// An empty diff returns [`SubmitOutcome::NothingToUpdate`] without a
    /// request. Validation failures block the request. On failure every edit
    /// stays in place for a retry.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn submit(&self) -> Result<SubmitOutcome, EngineError> {
        let (updates, submitted) = match self.transition(begin_submit)? {
            SubmitPlan::NothingToUpdate => {
                info!("Nothing to update");
                return Ok(SubmitOutcome::NothingToUpdate);
            }
            SubmitPlan::Send { updates, submitted } => (updates, submitted),
        };
        let guard = RollbackGuard::new(&self.state, Rollback::Submit);

        debug!(update_count = updates.len(), "Submitting field updates");
        match self
            .service
            .submit_field_updates(&self.entity.entity_slug, &updates)
            .await
        {
            Ok(()) => {
                guard.complete(|state| apply_submit_success(state, submitted));
                info!(updated = updates.len(), "Field updates submitted");
                Ok(SubmitOutcome::Submitted {
                    updated: updates.len(),
                })
            }
            Err(err) => {
                warn!(error = %err, "Submission failed, edits preserved");
                drop(guard);
                Err(EngineError::Submission(err))
            }
        }
    }

    /// Upload a file for a `file` field; the new file id becomes its value.
    #[instrument(skip(self, file), fields(entity = %self.entity, file_name = %file.file_name))]
    pub async fn upload_field_file(
        &self,
        field_id: FieldId,
        file: FileUpload,
    ) -> Result<i64, EngineError> {
        self.transition(|state| {
            check_file_field(state, field_id)?;
            begin_upload(state, field_id).map(|next| (next, ()))
        })?;
        let guard = RollbackGuard::new(&self.state, Rollback::Upload(field_id));

        match self.service.upload_file(&file).await {
            Ok(uploaded) => {
                guard.complete(|state| finish_upload(state, field_id, Some(uploaded.file_id)));
                info!(file_id = uploaded.file_id, "File uploaded");
                Ok(uploaded.file_id)
            }
            Err(err) => {
                warn!(error = %err, "File upload failed, value unchanged");
                Err(EngineError::upload(field_id, err))
            }
        }
    }

    /// Which write action a compliance field currently offers.
    pub fn compliance_action(&self, field_id: FieldId) -> Result<ComplianceAction, EngineError> {
        let state = lock(&self.state);
        state.compliance_field(field_id)?;
        Ok(state.compliance.action_for(field_id))
    }

    /// Create the first compliance value for a field.
    pub async fn upload_compliance(
        &self,
        field_id: FieldId,
        submission: ComplianceSubmission,
    ) -> Result<(), EngineError> {
        self.run_compliance(field_id, submission, false).await
    }

    /// Supersede the stored compliance value of a field.
    pub async fn renew_compliance(
        &self,
        field_id: FieldId,
        submission: ComplianceSubmission,
    ) -> Result<(), EngineError> {
        self.run_compliance(field_id, submission, true).await
    }

    #[instrument(skip(self, submission), fields(entity = %self.entity, files = submission.files.len()))]
    async fn run_compliance(
        &self,
        field_id: FieldId,
        submission: ComplianceSubmission,
        renew: bool,
    ) -> Result<(), EngineError> {
        let action = self.transition(|state| {
            state.compliance_field(field_id)?;
            let action = state.compliance.action_for(field_id);
            match (&action, renew) {
                (ComplianceAction::Upload, true) => {
                    return Err(EngineError::compliance(field_id, "there is no stored value to renew"))
                }
                (ComplianceAction::Renew { .. }, false) => {
                    return Err(EngineError::compliance(
                        field_id,
                        "a value is already stored; renew it instead",
                    ))
                }
                _ => {}
            }
            begin_upload(state, field_id).map(|next| (next, action))
        })?;
        let guard = RollbackGuard::new(&self.state, Rollback::Upload(field_id));

        let mut file_ids = Vec::with_capacity(submission.files.len());
        for file in &submission.files {
            let uploaded = self.service.upload_file(file).await.map_err(|err| {
                warn!(error = %err, file_name = %file.file_name, "Compliance file upload failed");
                EngineError::upload(field_id, err)
            })?;
            file_ids.push(uploaded.file_id);
        }

        let payload = CompliancePayload {
            entity_type: self.entity.entity_type.clone(),
            entity_slug: self.entity.entity_slug.clone(),
            custom_field_id: field_id,
            file_ids,
            sub_field_values: submission.sub_field_values,
            notes: submission.notes,
        };
        let result = match &action {
            ComplianceAction::Upload => self.service.upload_compliance(&payload).await,
            ComplianceAction::Renew { value_slug, .. } => {
                self.service.renew_compliance(value_slug, &payload).await
            }
        };
        if let Err(source) = result {
            warn!(error = %source, "Compliance request failed");
            return Err(EngineError::ComplianceRequest { field_id, source });
        }

        guard.complete(|state| finish_upload(state, field_id, None));
        info!(action = ?action, "Compliance value stored");
        self.refresh_compliance().await;
        Ok(())
    }

    /// Re-fetch the compliance listing. A failure keeps the old listing.
    async fn refresh_compliance(&self) {
        match self
            .service
            .fetch_compliance_fields(&self.entity, &self.options.compliance_query)
            .await
        {
            Ok(values) => {
                let mut state = lock(&self.state);
                *state = apply_compliance_refresh(&state, &values);
            }
            Err(err) => warn!(error = %err, "Failed to refresh compliance values"),
        }
    }

    /// History of the stored compliance value of a field.
    pub async fn view_compliance_history(
        &self,
        field_id: FieldId,
    ) -> Result<Vec<ComplianceHistoryEntry>, EngineError> {
        let value_id = {
            let state = lock(&self.state);
            state.compliance_field(field_id)?;
            state
                .compliance
                .value_for(field_id)
                .filter(|value| value.has_record())
                .map(|value| value.id)
        }
        .ok_or_else(|| EngineError::compliance(field_id, "no stored value has a history"))?;

        self.service
            .fetch_compliance_history(value_id)
            .await
            .map_err(|source| EngineError::ComplianceRequest { field_id, source })
    }

    /// A fetchable URL for one file of a compliance value.
    ///
    /// Falls back to the pre-supplied file or value URL when the file
    /// reference cannot be resolved.
    pub async fn compliance_download_url(
        &self,
        field_id: FieldId,
        file_id: i64,
    ) -> Result<String, EngineError> {
        let value = {
            let state = lock(&self.state);
            state.compliance_field(field_id)?;
            state.compliance.value_for(field_id).cloned()
        };

        match self.service.resolve_file_url(file_id).await {
            Ok(url) => Ok(url),
            Err(source) => match value.and_then(|value| fallback_download_url(&value, file_id)) {
                Some(url) => {
                    warn!(field_id, file_id, error = %source, "Using pre-supplied download URL");
                    Ok(url)
                }
                None => Err(EngineError::ComplianceRequest { field_id, source }),
            },
        }
    }

    /// Create an entry in a repeatable subsection.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn add_group_entry(
        &self,
        subsection_id: SubsectionId,
        label: &str,
    ) -> Result<EntryId, EngineError> {
        self.transition(|state| begin_entry_create(state, subsection_id).map(|next| (next, ())))?;
        let guard = RollbackGuard::new(&self.state, Rollback::EntryCreate(subsection_id));

        let mut entry = self
            .service
            .create_group_entry(&self.entity, subsection_id, label)
            .await
            .map_err(EngineError::Entry)?;
        entry.subsection_id = subsection_id;
        let entry_id = entry.id;

        guard.complete(|state| apply_entry_added(state, entry));
        info!(entry_id, "Group entry created");
        Ok(entry_id)
    }

    /// Delete an entry; it leaves the local state only once the backend agrees.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn remove_group_entry(&self, entry_id: EntryId) -> Result<(), EngineError> {
        self.transition(|state| begin_entry_op(state, entry_id).map(|next| (next, ())))?;
        let guard = RollbackGuard::new(&self.state, Rollback::Entry(entry_id));

        match self.service.delete_group_entry(entry_id).await {
            Ok(()) => {
                guard.complete(|state| apply_entry_removed(state, entry_id));
                info!("Group entry deleted");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Group entry delete failed");
                Err(EngineError::Entry(err))
            }
        }
    }

    pub fn on_entry_field_change(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
        value: impl Into<TypedValue>,
    ) -> Result<(), EngineError> {
        let value = value.into();
        self.transition(|state| {
            apply_entry_field_change(state, entry_id, field_id, value).map(|next| (next, ()))
        })
    }

    /// Persist one entry's changed values.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn save_group_entry(&self, entry_id: EntryId) -> Result<SubmitOutcome, EngineError> {
        let (updates, submitted) = match self.transition(|state| begin_entry_save(state, entry_id))? {
            SubmitPlan::NothingToUpdate => return Ok(SubmitOutcome::NothingToUpdate),
            SubmitPlan::Send { updates, submitted } => (updates, submitted),
        };
        let guard = RollbackGuard::new(&self.state, Rollback::Entry(entry_id));

        match self.service.update_group_entry(entry_id, &updates).await {
            Ok(()) => {
                guard.complete(|state| finish_entry_op(state, entry_id, Some(submitted)));
                info!(updated = updates.len(), "Group entry saved");
                Ok(SubmitOutcome::Submitted {
                    updated: updates.len(),
                })
            }
            Err(err) => {
                warn!(error = %err, "Group entry save failed, edits preserved");
                Err(EngineError::Entry(err))
            }
        }
    }
}
