use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::engine::{FormEngine, FormError, FormId, FormResult, write_lock};
use super::value::Values;

/// Keeps unsaved form input alive across a closed modal or a remount.
pub trait FormDraftStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, form_id: FormId, values: &Values) -> Result<(), Self::Error>;
    fn load(&self, form_id: FormId) -> Result<Option<Values>, Self::Error>;
    fn clear(&self, form_id: FormId) -> Result<(), Self::Error>;
}

#[derive(Clone, Default)]
pub struct InMemoryDraftStore {
    drafts: Arc<RwLock<BTreeMap<FormId, Values>>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drafts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FormDraftStore for InMemoryDraftStore {
    type Error = Infallible;

    fn save(&self, form_id: FormId, values: &Values) -> Result<(), Self::Error> {
        self.drafts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(form_id, values.clone());
        Ok(())
    }

    fn load(&self, form_id: FormId) -> Result<Option<Values>, Self::Error> {
        Ok(self
            .drafts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&form_id)
            .cloned())
    }

    fn clear(&self, form_id: FormId) -> Result<(), Self::Error> {
        self.drafts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&form_id);
        Ok(())
    }
}

impl FormEngine {
    pub fn save_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: FormDraftStore,
    {
        let snapshot = self.snapshot()?;
        store
            .save(snapshot.id, &snapshot.values)
            .map_err(|error| FormError::DraftSaveFailed(error.to_string()))
    }

    /// Restores saved values over the current ones. The initial baseline is
    /// kept, so a restored draft reads as dirty.
    pub fn load_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: FormDraftStore,
    {
        let form_id = self.form_id()?;
        let Some(draft) = store
            .load(form_id)
            .map_err(|error| FormError::DraftLoadFailed(error.to_string()))?
        else {
            return Ok(false);
        };

        let mut state = write_lock(&self.state, "loading draft into form")?;
        state.values = draft;
        state.errors.clear();
        state.touched.clear();
        state.tickets.clear();
        state.validating.clear();
        state.async_failures.clear();
        state.is_submitting = false;
        state.submit_count = 0;
        debug!(form_id = form_id.0, "restored form draft");
        Ok(true)
    }

    pub fn clear_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: FormDraftStore,
    {
        let form_id = self.form_id()?;
        store
            .clear(form_id)
            .map_err(|error| FormError::DraftClearFailed(error.to_string()))
    }
}
