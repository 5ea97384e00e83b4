mod binding;
mod draft;
mod engine;
mod model;
mod submit;
mod validation;
mod value;


pub use bizform_derive::FormValues;
pub use binding::{BlurHandler, CheckedChangeHandler, NumberChangeHandler, TextChangeHandler};
pub use draft::{FormDraftStore, InMemoryDraftStore};
pub use engine::{
    ChangeEvent, Errors, FormEngine, FormError, FormId, FormOptions, FormResult, FormSnapshot,
    ReentrantSubmit, Touched, ValidationTicket,
};
pub use model::{FieldValueError, FormValues, FromFieldValue, IntoFieldValue, read_field};
pub use submit::SubmitOutcome;
pub use validation::{
    AsyncFieldValidator, BoxedValidationFuture, FieldValidator, FormValidator, ValidationRule,
    ValidationRules, rules,
};
pub use value::{FieldName, FieldValue, Values};
