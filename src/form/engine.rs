use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_timer::Delay;
use gpui::SharedString;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::binding::FocusHandler;
use super::model::{FieldValueError, FormValues};
use super::validation::ValidationRules;
use super::value::{FieldName, FieldValue, Values};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Identifies a form instance and keys its drafts. Allocated ids count up
/// from 1; pass a fixed one through `FormOptions::form_id` to find a draft
/// again after a remount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

/// `None` means the field was validated and passed.
pub type Errors = BTreeMap<FieldName, Option<SharedString>>;
pub type Touched = BTreeMap<FieldName, bool>;

/// Policy for a `handle_submit` call that arrives while another is in flight.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReentrantSubmit {
    /// Refuse with `FormError::AlreadySubmitting`.
    #[default]
    Reject,
    /// Run both; `is_submitting` clears when the latest one settles.
    Allow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_on_blur: bool,
    pub clear_error_on_change: bool,
    pub reentrant_submit: ReentrantSubmit,
    pub focus_first_error_on_submit: bool,
    /// `None` allocates a fresh id per engine.
    pub form_id: Option<FormId>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_blur: true,
            clear_error_on_change: true,
            reentrant_submit: ReentrantSubmit::Reject,
            focus_first_error_on_submit: true,
            form_id: None,
        }
    }
}

/// Raw value delivered by an input's change notification.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    Text(SharedString),
    Checked(bool),
    Number(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormSnapshot {
    pub id: FormId,
    pub values: Values,
    pub errors: Errors,
    pub touched: Touched,
    pub is_submitting: bool,
    pub submit_count: u32,
    pub is_valid: bool,
    pub is_dirty: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form submit is already in progress")]
    AlreadySubmitting,
    #[error("form values do not match the model: {0}")]
    Model(#[from] FieldValueError),
    #[error("failed to load draft: {0}")]
    DraftLoadFailed(String),
    #[error("failed to save draft: {0}")]
    DraftSaveFailed(String),
    #[error("failed to clear draft: {0}")]
    DraftClearFailed(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FormState {
    pub(super) id: FormId,
    pub(super) initial_values: Values,
    pub(super) values: Values,
    pub(super) errors: Errors,
    pub(super) touched: Touched,
    pub(super) is_submitting: bool,
    pub(super) submit_count: u32,
    pub(super) submit_generation: u64,
    pub(super) tickets: BTreeMap<FieldName, ValidationTicket>,
    pub(super) ticket_seq: u64,
    pub(super) validating: BTreeSet<FieldName>,
    /// Latest async failure per field, valid until the value changes.
    pub(super) async_failures: BTreeMap<FieldName, SharedString>,
}

impl FormState {
    fn new(id: FormId, initial_values: Values) -> Self {
        Self {
            id,
            values: initial_values.clone(),
            initial_values,
            errors: Errors::new(),
            touched: Touched::new(),
            is_submitting: false,
            submit_count: 0,
            submit_generation: 0,
            tickets: BTreeMap::new(),
            ticket_seq: 0,
            validating: BTreeSet::new(),
            async_failures: BTreeMap::new(),
        }
    }

    pub(super) fn is_valid(&self) -> bool {
        self.errors.values().all(Option::is_none)
    }

    pub(super) fn first_error(&self) -> Option<&FieldName> {
        self.errors
            .iter()
            .find_map(|(field, error)| error.is_some().then_some(field))
    }

    /// Async failures for unchanged values outlive a sync revalidation.
    pub(super) fn keep_async_failures(&self, errors: &mut Errors) {
        for (field, message) in &self.async_failures {
            let entry = errors.entry(field.clone()).or_insert(None);
            if entry.is_none() {
                *entry = Some(message.clone());
            }
        }
    }

    fn assign(&mut self, field: FieldName, value: FieldValue, clear_error: bool) {
        // An in-flight async check was started for the old value.
        self.tickets.remove(&field);
        self.validating.remove(&field);
        self.async_failures.remove(&field);
        if clear_error && self.errors.get(&field).is_some_and(Option::is_some) {
            self.errors.remove(&field);
        }
        self.values.insert(field, value);
    }
}

/// Form state plus the rule table it validates against. Clones share state,
/// so widget callbacks can each hold one.
#[derive(Clone)]
pub struct FormEngine {
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) rules: Arc<ValidationRules>,
    pub(super) focus_handlers: Arc<RwLock<BTreeMap<FieldName, FocusHandler>>>,
}

impl FormEngine {
    pub fn new(initial_values: Values, rules: ValidationRules) -> Self {
        Self::with_options(initial_values, rules, FormOptions::default())
    }

    pub fn with_options(
        initial_values: Values,
        rules: ValidationRules,
        options: FormOptions,
    ) -> Self {
        Self {
            options,
            state: Arc::new(RwLock::new(FormState::new(
                options.form_id.unwrap_or_else(FormId::next),
                initial_values,
            ))),
            rules: Arc::new(rules),
            focus_handlers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn for_model<M>(model: &M, rules: ValidationRules) -> Self
    where
        M: FormValues,
    {
        Self::new(model.to_values(), rules)
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn set_value(
        &self,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let field = field.into();
        let mut state = write_lock(&self.state, "writing field value")?;
        trace!(form_id = state.id.0, field = %field, "set value");
        state.assign(field, value.into(), self.options.clear_error_on_change);
        Ok(())
    }

    /// Shallow merge; nested objects are replaced, not merged.
    pub fn set_values(&self, partial: Values) -> FormResult<()> {
        let mut state = write_lock(&self.state, "merging field values")?;
        trace!(form_id = state.id.0, fields = partial.len(), "set values");
        for (field, value) in partial {
            state.assign(field, value, self.options.clear_error_on_change);
        }
        Ok(())
    }

    /// Stores text as-is (no numeric coercion) and checkbox state as a bool.
    /// Non-finite numbers are ignored.
    pub fn handle_change(&self, field: impl Into<FieldName>, event: ChangeEvent) -> FormResult<()> {
        let value = match event {
            ChangeEvent::Text(text) => FieldValue::Text(text),
            ChangeEvent::Checked(checked) => FieldValue::Bool(checked),
            ChangeEvent::Number(number) => match decimal_from_f64(number) {
                Some(number) => FieldValue::Number(number),
                None => return Ok(()),
            },
        };
        self.set_value(field, value)
    }

    pub fn handle_blur(&self, field: impl Into<FieldName>) -> FormResult<()> {
        let field = field.into();
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.touched.insert(field.clone(), true);
        }
        if self.options.validate_on_blur {
            let _ = self.validate_field(field)?;
        }
        Ok(())
    }

    /// Runs the field's rule chain. Fields without rules are valid and keep
    /// their error entry untouched. An async failure recorded for the current
    /// value still counts when the chain passes.
    pub fn validate_field(&self, field: impl Into<FieldName>) -> FormResult<bool> {
        let field = field.into();
        if !self.rules.has_rules(&field) {
            return Ok(true);
        }
        let value = read_lock(&self.state, "reading value for field validation")?
            .values
            .get(&field)
            .cloned()
            .unwrap_or_default();
        let Some(error) = self.rules.run_chain(&field, &value) else {
            return Ok(true);
        };

        let mut state = write_lock(&self.state, "writing field validation result")?;
        let error = error.or_else(|| state.async_failures.get(&field).cloned());
        let is_valid = error.is_none();
        debug!(form_id = state.id.0, field = %field, is_valid, "validated field");
        state.errors.insert(field, error);
        Ok(is_valid)
    }

    /// Rebuilds the error map from every rule chain and form-level check.
    pub fn validate_all_fields(&self) -> FormResult<bool> {
        let values = read_lock(&self.state, "reading values for form validation")?
            .values
            .clone();
        let mut errors = self.compute_errors(&values);
        let mut state = write_lock(&self.state, "applying form validation result")?;
        state.keep_async_failures(&mut errors);
        state.errors = errors;
        let is_valid = state.is_valid();
        debug!(form_id = state.id.0, is_valid, "validated form");
        Ok(is_valid)
    }

    pub(super) fn compute_errors(&self, values: &Values) -> Errors {
        let mut errors = Errors::new();
        for field in self.rules.validated_fields() {
            let value = values.get(field).cloned().unwrap_or_default();
            if let Some(error) = self.rules.run_chain(field, &value) {
                errors.insert(field.clone(), error);
            }
        }
        for (field, message) in self.rules.run_form_validators(values) {
            let entry = errors.entry(field).or_insert(None);
            if entry.is_none() {
                *entry = Some(message);
            }
        }
        errors
    }

    /// Sync chain first; async validators only run on a value that passes it.
    /// Superseded runs neither write nor count.
    pub async fn validate_field_async(&self, field: impl Into<FieldName>) -> FormResult<bool> {
        let field = field.into();
        if !self.validate_field(field.clone())? {
            return Ok(false);
        }
        self.run_async_validators(&field).await
    }

    /// Fields already carrying a message (from their chain or a form-level
    /// check) skip their async validators.
    pub async fn validate_all_fields_async(&self) -> FormResult<bool> {
        let _ = self.validate_all_fields()?;
        self.run_all_async_validators().await?;
        self.is_valid()
    }

    /// Touches and validates including async validators.
    pub async fn handle_blur_async(&self, field: impl Into<FieldName>) -> FormResult<bool> {
        let field = field.into();
        self.handle_blur(field.clone())?;
        self.validate_field_async(field).await
    }

    pub(super) async fn run_all_async_validators(&self) -> FormResult<()> {
        let fields = self.rules.async_fields.keys().cloned().collect::<Vec<_>>();
        for field in fields {
            if self.field_passes(&field)? {
                let _ = self.run_async_validators(&field).await?;
            }
        }
        self.apply_form_validators()
    }

    async fn run_async_validators(&self, field: &FieldName) -> FormResult<bool> {
        let Some(entries) = self.rules.async_fields.get(field).cloned() else {
            return Ok(true);
        };

        for entry in entries {
            let (ticket, value, values) = {
                let mut state = write_lock(&self.state, "starting async validation")?;
                state.ticket_seq += 1;
                let next = ValidationTicket(state.ticket_seq);
                state.tickets.insert(field.clone(), next);
                state.validating.insert(field.clone());
                let value = state.values.get(field).cloned().unwrap_or_default();
                (next, value, state.values.clone())
            };
            let _validating = ValidatingGuard {
                engine: self,
                field,
                ticket,
            };

            if !entry.debounce.is_zero() {
                Delay::new(entry.debounce).await;
                if !self.is_latest_ticket(field, ticket)? {
                    return self.field_passes(field);
                }
            }

            let error = entry.validator.validate(value, values).await;
            let failed = error.is_some();
            if !self.finish_async_validation(field, ticket, error)? {
                return self.field_passes(field);
            }
            if failed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Form-level messages fill fields that passed everything else.
    fn apply_form_validators(&self) -> FormResult<()> {
        let values = self.values()?;
        let messages = self.rules.run_form_validators(&values);
        let mut state = write_lock(&self.state, "applying form-level validation")?;
        for (field, message) in messages {
            let entry = state.errors.entry(field).or_insert(None);
            if entry.is_none() {
                *entry = Some(message);
            }
        }
        Ok(())
    }

    fn is_latest_ticket(&self, field: &FieldName, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(field)
            .copied()
            == Some(ticket))
    }

    fn field_passes(&self, field: &FieldName) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(field)
            .is_none_or(Option::is_none))
    }

    /// Returns false when a newer run owns the field.
    fn finish_async_validation(
        &self,
        field: &FieldName,
        ticket: ValidationTicket,
        error: Option<SharedString>,
    ) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "finishing async validation")?;
        if state.tickets.get(field).copied() != Some(ticket) {
            return Ok(false);
        }
        state.validating.remove(field);
        match &error {
            Some(message) => state.async_failures.insert(field.clone(), message.clone()),
            None => state.async_failures.remove(field),
        };
        debug!(
            form_id = state.id.0,
            field = %field,
            is_valid = error.is_none(),
            "async validation finished"
        );
        state.errors.insert(field.clone(), error);
        Ok(true)
    }

    /// Back to `new_initial` (which becomes the dirty baseline) or to the
    /// values captured at construction.
    pub fn reset(&self, new_initial: Option<Values>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        if let Some(initial) = new_initial {
            state.initial_values = initial;
        }
        state.values = state.initial_values.clone();
        state.errors.clear();
        state.touched.clear();
        state.tickets.clear();
        state.validating.clear();
        state.async_failures.clear();
        state.is_submitting = false;
        state.submit_count = 0;
        debug!(form_id = state.id.0, "reset form");
        Ok(())
    }

    pub fn reset_field(&self, field: impl Into<FieldName>) -> FormResult<()> {
        let field = field.into();
        let mut state = write_lock(&self.state, "resetting field")?;
        match state.initial_values.get(&field).cloned() {
            Some(initial) => {
                state.values.insert(field.clone(), initial);
            }
            None => {
                state.values.remove(&field);
            }
        }
        state.errors.remove(&field);
        state.touched.remove(&field);
        state.tickets.remove(&field);
        state.validating.remove(&field);
        state.async_failures.remove(&field);
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all field errors")?;
        state.errors.clear();
        state.async_failures.clear();
        Ok(())
    }

    pub fn clear_field_error(&self, field: impl Into<FieldName>) -> FormResult<()> {
        let field = field.into();
        let mut state = write_lock(&self.state, "clearing field error")?;
        state.errors.remove(&field);
        state.async_failures.remove(&field);
        Ok(())
    }

    pub fn values(&self) -> FormResult<Values> {
        Ok(read_lock(&self.state, "reading values")?.values.clone())
    }

    pub fn value(&self, field: impl Into<FieldName>) -> FormResult<Option<FieldValue>> {
        Ok(read_lock(&self.state, "reading value")?
            .values
            .get(&field.into())
            .cloned())
    }

    pub fn model<M>(&self) -> FormResult<M>
    where
        M: FormValues,
    {
        let state = read_lock(&self.state, "reading values for model")?;
        Ok(M::from_values(&state.values)?)
    }

    pub fn errors(&self) -> FormResult<Errors> {
        Ok(read_lock(&self.state, "reading errors")?.errors.clone())
    }

    pub fn error(&self, field: impl Into<FieldName>) -> FormResult<Option<SharedString>> {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(&field.into())
            .cloned()
            .flatten())
    }

    pub fn touched(&self) -> FormResult<Touched> {
        Ok(read_lock(&self.state, "reading touched fields")?.touched.clone())
    }

    pub fn is_touched(&self, field: impl Into<FieldName>) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched field")?
            .touched
            .get(&field.into())
            .copied()
            .unwrap_or(false))
    }

    pub fn is_validating(&self, field: impl Into<FieldName>) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading validating fields")?
            .validating
            .contains(&field.into()))
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit flag")?.is_submitting)
    }

    pub fn submit_count(&self) -> FormResult<u32> {
        Ok(read_lock(&self.state, "reading submit count")?.submit_count)
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading validity")?.is_valid())
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading dirty state")?;
        Ok(state.values != state.initial_values)
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            id: state.id,
            values: state.values.clone(),
            errors: state.errors.clone(),
            touched: state.touched.clone(),
            is_submitting: state.is_submitting,
            submit_count: state.submit_count,
            is_valid: state.is_valid(),
            is_dirty: state.values != state.initial_values,
        })
    }
}

/// Drops the field's in-flight marker when an async run ends early or its
/// future is dropped, unless a newer run took over the field.
struct ValidatingGuard<'a> {
    engine: &'a FormEngine,
    field: &'a FieldName,
    ticket: ValidationTicket,
}

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self
            .engine
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.tickets.get(self.field).copied() == Some(self.ticket) {
            state.validating.remove(self.field);
        }
    }
}

pub(super) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    // Display gives the shortest round-trip form, so 0.1 stays 0.1.
    Decimal::from_str(&value.to_string()).ok()
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
