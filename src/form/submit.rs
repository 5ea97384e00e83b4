use std::fmt::Display;
use std::future::Future;
use std::sync::PoisonError;

use tracing::{debug, warn};

use super::engine::{FormEngine, FormError, FormResult, ReentrantSubmit, write_lock};
use super::value::Values;

/// Result of one submit attempt. Callback failures are data, not `FormError`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome<E> {
    /// Validation failed; the callback was not invoked.
    Invalid,
    Submitted,
    Failed(E),
}

impl<E> SubmitOutcome<E> {
    /// The boolean the submit contract reports: was the form valid, i.e. did
    /// the engine attempt submission.
    pub fn was_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Clears `is_submitting` when the submit future finishes or is dropped,
/// provided no later submit has taken the flag over.
pub(super) struct SubmittingGuard {
    engine: Option<FormEngine>,
    generation: u64,
}

impl SubmittingGuard {
    fn new(engine: FormEngine, generation: u64) -> Self {
        Self {
            engine: Some(engine),
            generation,
        }
    }

    fn release(mut self) -> FormResult<()> {
        match self.engine.take() {
            Some(engine) => {
                let mut state = write_lock(&engine.state, "completing submit")?;
                if state.submit_generation == self.generation {
                    state.is_submitting = false;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!("submit future dropped before completion");
            let mut state = engine
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if state.submit_generation == self.generation {
                state.is_submitting = false;
            }
        }
    }
}

pub(super) enum SubmitStart {
    Invalid,
    Valid { values: Values, guard: SubmittingGuard },
}

impl FormEngine {
    /// Flags the form as submitting, touches every present field and runs
    /// full sync validation, all before returning. The returned future then
    /// awaits the async validators, invokes `on_submit` once when the form is
    /// still valid and clears the flag when the callback settles.
    pub fn handle_submit<F, Fut, R, E>(
        &self,
        on_submit: F,
    ) -> impl Future<Output = FormResult<SubmitOutcome<E>>> + use<F, Fut, R, E>
    where
        F: FnOnce(Values) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let start = self.begin_submit();
        let engine = self.clone();
        async move {
            let (values, guard) = match start? {
                SubmitStart::Invalid => return Ok(SubmitOutcome::Invalid),
                SubmitStart::Valid { values, guard } => (values, guard),
            };
            if engine.rules.has_any_async_rules() {
                engine.run_all_async_validators().await?;
                if !engine.is_valid()? {
                    debug!(form_id = engine.form_id()?.0, "submit blocked by async validation");
                    guard.release()?;
                    return Ok(SubmitOutcome::Invalid);
                }
            }
            let result = on_submit(values).await;
            guard.release()?;
            Ok(settle(result))
        }
    }

    /// `handle_submit` for callbacks that complete synchronously. Async
    /// validators are not awaited; messages they already reported for the
    /// current values still block the submit.
    pub fn handle_submit_sync<F, R, E>(&self, on_submit: F) -> FormResult<SubmitOutcome<E>>
    where
        F: FnOnce(Values) -> Result<R, E>,
        E: Display,
    {
        let (values, guard) = match self.begin_submit()? {
            SubmitStart::Invalid => return Ok(SubmitOutcome::Invalid),
            SubmitStart::Valid { values, guard } => (values, guard),
        };
        let result = on_submit(values);
        guard.release()?;
        Ok(settle(result))
    }

    pub(super) fn begin_submit(&self) -> FormResult<SubmitStart> {
        let values = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.is_submitting && self.options.reentrant_submit == ReentrantSubmit::Reject {
                warn!(form_id = state.id.0, "rejected submit while another is in flight");
                return Err(FormError::AlreadySubmitting);
            }
            state.is_submitting = true;
            state.submit_count = state.submit_count.saturating_add(1);
            state.submit_generation += 1;
            let fields = state.values.keys().cloned().collect::<Vec<_>>();
            for field in fields {
                state.touched.insert(field, true);
            }
            state.values.clone()
        };

        let mut errors = self.compute_errors(&values);
        let mut state = write_lock(&self.state, "applying submit validation result")?;
        state.keep_async_failures(&mut errors);
        state.errors = errors;
        if !state.is_valid() {
            debug!(form_id = state.id.0, "submit blocked by validation errors");
            state.is_submitting = false;
            return Ok(SubmitStart::Invalid);
        }
        Ok(SubmitStart::Valid {
            values,
            guard: SubmittingGuard::new(self.clone(), state.submit_generation),
        })
    }
}

fn settle<R, E>(result: Result<R, E>) -> SubmitOutcome<E>
where
    E: Display,
{
    match result {
        Ok(_) => SubmitOutcome::Submitted,
        Err(error) => {
            warn!(%error, "form submit callback failed");
            SubmitOutcome::Failed(error)
        }
    }
}
