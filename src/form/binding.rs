use std::fmt::Display;
use std::sync::Arc;

use gpui::{SharedString, Window};

use super::engine::{ChangeEvent, FormEngine, FormResult, read_lock, write_lock};
use super::submit::SubmitOutcome;
use super::value::{FieldName, Values};

pub(super) type FocusHandler = Arc<dyn Fn(&mut Window, &mut gpui::App) + Send + Sync>;

pub type TextChangeHandler = Box<dyn Fn(SharedString, &mut Window, &mut gpui::App)>;
pub type CheckedChangeHandler = Box<dyn Fn(bool, &mut Window, &mut gpui::App)>;
pub type NumberChangeHandler = Box<dyn Fn(f64, &mut Window, &mut gpui::App)>;
pub type BlurHandler = Box<dyn Fn(&mut Window, &mut gpui::App)>;

impl FormEngine {
    /// For text inputs, selects and textareas.
    pub fn text_change_handler(&self, field: impl Into<FieldName>) -> TextChangeHandler {
        let engine = self.clone();
        let field = field.into();
        Box::new(move |next: SharedString, _: &mut Window, _: &mut gpui::App| {
            drop(engine.handle_change(field.clone(), ChangeEvent::Text(next)));
        })
    }

    /// For checkboxes and switches.
    pub fn checked_change_handler(&self, field: impl Into<FieldName>) -> CheckedChangeHandler {
        let engine = self.clone();
        let field = field.into();
        Box::new(move |checked: bool, _: &mut Window, _: &mut gpui::App| {
            drop(engine.handle_change(field.clone(), ChangeEvent::Checked(checked)));
        })
    }

    pub fn number_change_handler(&self, field: impl Into<FieldName>) -> NumberChangeHandler {
        let engine = self.clone();
        let field = field.into();
        Box::new(move |number: f64, _: &mut Window, _: &mut gpui::App| {
            drop(engine.handle_change(field.clone(), ChangeEvent::Number(number)));
        })
    }

    pub fn blur_handler(&self, field: impl Into<FieldName>) -> BlurHandler {
        let engine = self.clone();
        let field = field.into();
        Box::new(move |_: &mut Window, _: &mut gpui::App| {
            drop(engine.handle_blur(field.clone()));
        })
    }

    pub fn register_focus_handler(
        &self,
        field: impl Into<FieldName>,
        handler: impl Fn(&mut Window, &mut gpui::App) + Send + Sync + 'static,
    ) -> FormResult<()> {
        let mut handlers = write_lock(&self.focus_handlers, "registering focus handler")?;
        handlers.insert(field.into(), Arc::new(handler));
        Ok(())
    }

    /// Focuses the first field (in key order) carrying an error. Returns
    /// whether a handler ran.
    pub fn focus_first_error(&self, window: &mut Window, cx: &mut gpui::App) -> FormResult<bool> {
        let Some(field) = read_lock(&self.state, "reading first error field")?
            .first_error()
            .cloned()
        else {
            return Ok(false);
        };
        let handler = read_lock(&self.focus_handlers, "reading focus handlers")?
            .get(&field)
            .cloned();
        match handler {
            Some(handler) => {
                handler(window, cx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Synchronous submit from inside a gpui handler, moving focus to the
    /// first invalid field when the form does not validate.
    pub fn submit_in<F, R, E>(
        &self,
        window: &mut Window,
        cx: &mut gpui::App,
        on_submit: F,
    ) -> FormResult<SubmitOutcome<E>>
    where
        F: FnOnce(Values) -> Result<R, E>,
        E: Display,
    {
        let outcome = self.handle_submit_sync(on_submit)?;
        if !outcome.was_valid() && self.options.focus_first_error_on_submit {
            let _ = self.focus_first_error(window, cx)?;
        }
        Ok(outcome)
    }

    /// The field's error once the user has blurred it or attempted a submit.
    pub fn field_error_for_display(
        &self,
        field: impl Into<FieldName>,
    ) -> FormResult<Option<SharedString>> {
        let field = field.into();
        let state = read_lock(&self.state, "reading display error message")?;
        let touched = state.touched.get(&field).copied().unwrap_or(false);
        if !touched && state.submit_count == 0 {
            return Ok(None);
        }
        Ok(state.errors.get(&field).cloned().flatten())
    }
}
