extern crate self as bizform;

pub mod feedback;
pub mod form;
pub mod i18n;
pub mod prelude;

pub use i18n::{I18nManager, Locale};
