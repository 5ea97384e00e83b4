pub use crate::feedback::{
    Notifier, SubmitFeedback, ToastEntry, ToastKind, ToastManager, ToastPosition,
};
pub use crate::form::{
    ChangeEvent, FieldName, FieldValue, FormEngine, FormError, FormOptions, FormResult,
    FormValues, ReentrantSubmit, SubmitOutcome, ValidationRule, ValidationRules, Values, rules,
};
pub use crate::i18n::{I18nManager, Locale};
