use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use gpui::SharedString;

use super::value::{FieldName, FieldValue, Values};

/// A single pure check on one field value. `None` means the value passes.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: &FieldValue) -> Option<SharedString>;
}

impl<F> FieldValidator for F
where
    F: Fn(&FieldValue) -> Option<SharedString> + Send + Sync,
{
    fn validate(&self, value: &FieldValue) -> Option<SharedString> {
        (self)(value)
    }
}

/// Cross-field check over the whole value map, reporting messages per field.
pub trait FormValidator: Send + Sync {
    fn validate(&self, values: &Values) -> Vec<(FieldName, SharedString)>;
}

impl<F> FormValidator for F
where
    F: Fn(&Values) -> Vec<(FieldName, SharedString)> + Send + Sync,
{
    fn validate(&self, values: &Values) -> Vec<(FieldName, SharedString)> {
        (self)(values)
    }
}

pub type BoxedValidationFuture =
    Pin<Box<dyn Future<Output = Option<SharedString>> + Send + 'static>>;

/// Remote or otherwise slow check, e.g. "is this customer email already taken".
/// Receives owned copies so no engine lock is held while it runs.
pub trait AsyncFieldValidator: Send + Sync {
    fn validate(&self, value: FieldValue, values: Values) -> BoxedValidationFuture;
}

impl<F, Fut> AsyncFieldValidator for F
where
    F: Fn(FieldValue, Values) -> Fut + Send + Sync,
    Fut: Future<Output = Option<SharedString>> + Send + 'static,
{
    fn validate(&self, value: FieldValue, values: Values) -> BoxedValidationFuture {
        Box::pin((self)(value, values))
    }
}

#[derive(Clone)]
pub struct ValidationRule(Arc<dyn FieldValidator>);

impl ValidationRule {
    pub fn new(validator: impl FieldValidator + 'static) -> Self {
        Self(Arc::new(validator))
    }

    pub fn check(&self, value: &FieldValue) -> Option<SharedString> {
        self.0.validate(value)
    }
}

pub(super) type FormValidatorFn = Arc<dyn FormValidator>;

#[derive(Clone)]
pub(super) struct AsyncFieldValidatorEntry {
    pub(super) debounce: Duration,
    pub(super) validator: Arc<dyn AsyncFieldValidator>,
}

/// Rule table handed to the engine at construction. Immutable afterwards.
#[derive(Clone, Default)]
pub struct ValidationRules {
    pub(super) fields: BTreeMap<FieldName, Vec<ValidationRule>>,
    pub(super) form: Vec<FormValidatorFn>,
    pub(super) async_fields: BTreeMap<FieldName, Vec<AsyncFieldValidatorEntry>>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rules` to the chain of `field`, keeping registration order.
    pub fn field<I>(mut self, field: impl Into<FieldName>, rules: I) -> Self
    where
        I: IntoIterator<Item = ValidationRule>,
    {
        self.fields.entry(field.into()).or_default().extend(rules);
        self
    }

    pub fn rule(mut self, field: impl Into<FieldName>, rule: ValidationRule) -> Self {
        self.fields.entry(field.into()).or_default().push(rule);
        self
    }

    pub fn rule_fn(
        self,
        field: impl Into<FieldName>,
        validator: impl FieldValidator + 'static,
    ) -> Self {
        self.rule(field, ValidationRule::new(validator))
    }

    pub fn form_rule(mut self, validator: impl FormValidator + 'static) -> Self {
        self.form.push(Arc::new(validator));
        self
    }

    pub fn async_rule(
        self,
        field: impl Into<FieldName>,
        validator: impl AsyncFieldValidator + 'static,
    ) -> Self {
        self.async_rule_with_debounce(field, 0, validator)
    }

    pub fn async_rule_with_debounce(
        mut self,
        field: impl Into<FieldName>,
        debounce_ms: u64,
        validator: impl AsyncFieldValidator + 'static,
    ) -> Self {
        self.async_fields
            .entry(field.into())
            .or_default()
            .push(AsyncFieldValidatorEntry {
                debounce: Duration::from_millis(debounce_ms),
                validator: Arc::new(validator),
            });
        self
    }

    pub fn has_rules(&self, field: &FieldName) -> bool {
        self.fields.get(field).is_some_and(|rules| !rules.is_empty())
    }

    pub fn has_async_rules(&self, field: &FieldName) -> bool {
        self.async_fields
            .get(field)
            .is_some_and(|entries| !entries.is_empty())
    }

    pub fn has_any_async_rules(&self) -> bool {
        self.async_fields.values().any(|entries| !entries.is_empty())
    }

    pub fn validated_fields(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.keys()
    }

    /// `None` when the field has no chain. Otherwise the first failing
    /// message, later rules are not evaluated.
    pub(super) fn run_chain(
        &self,
        field: &FieldName,
        value: &FieldValue,
    ) -> Option<Option<SharedString>> {
        let rules = self.fields.get(field)?;
        Some(rules.iter().find_map(|rule| rule.check(value)))
    }

    pub(super) fn run_form_validators(&self, values: &Values) -> Vec<(FieldName, SharedString)> {
        self.form
            .iter()
            .flat_map(|validator| validator.validate(values))
            .collect()
    }
}

/// Built-in rules. Messages are resolved from the i18n catalog when the rule
/// is built.
pub mod rules {
    use std::str::FromStr;

    use gpui::SharedString;
    use rust_decimal::Decimal;

    use super::ValidationRule;
    use crate::form::value::FieldValue;
    use crate::i18n::I18nManager;

    /// Rule factory bound to one locale.
    #[derive(Clone, Default)]
    pub struct Rules {
        i18n: I18nManager,
    }

    impl Rules {
        pub fn new(i18n: I18nManager) -> Self {
            Self { i18n }
        }

        pub fn required(&self) -> ValidationRule {
            let message = self.i18n.t("validation.required");
            ValidationRule::new(move |value: &FieldValue| {
                value.is_blank().then(|| message.clone())
            })
        }

        pub fn email(&self) -> ValidationRule {
            let message = self.i18n.t("validation.email");
            ValidationRule::new(move |value: &FieldValue| match value {
                FieldValue::Text(text) if !text.trim().is_empty() => {
                    (!is_email(text.trim())).then(|| message.clone())
                }
                _ => None,
            })
        }

        pub fn min_length(&self, min: usize) -> ValidationRule {
            let bound = min.to_string();
            let message = self
                .i18n
                .t_with("validation.min_length", &[("min", bound.as_str())]);
            ValidationRule::new(move |value: &FieldValue| {
                length_of(value)
                    .filter(|len| *len > 0 && *len < min)
                    .map(|_| message.clone())
            })
        }

        pub fn max_length(&self, max: usize) -> ValidationRule {
            let bound = max.to_string();
            let message = self
                .i18n
                .t_with("validation.max_length", &[("max", bound.as_str())]);
            ValidationRule::new(move |value: &FieldValue| {
                length_of(value)
                    .filter(|len| *len > max)
                    .map(|_| message.clone())
            })
        }

        pub fn min(&self, min: Decimal) -> ValidationRule {
            let bound = min.to_string();
            let message = self
                .i18n
                .t_with("validation.min", &[("min", bound.as_str())]);
            ValidationRule::new(move |value: &FieldValue| {
                number_of(value)
                    .filter(|number| *number < min)
                    .map(|_| message.clone())
            })
        }

        pub fn max(&self, max: Decimal) -> ValidationRule {
            let bound = max.to_string();
            let message = self
                .i18n
                .t_with("validation.max", &[("max", bound.as_str())]);
            ValidationRule::new(move |value: &FieldValue| {
                number_of(value)
                    .filter(|number| *number > max)
                    .map(|_| message.clone())
            })
        }

        pub fn number(&self) -> ValidationRule {
            let message = self.i18n.t("validation.number");
            ValidationRule::new(move |value: &FieldValue| match value {
                FieldValue::Text(text) if !text.trim().is_empty() => {
                    Decimal::from_str(text.trim()).is_err().then(|| message.clone())
                }
                _ => None,
            })
        }
    }

    pub fn required() -> ValidationRule {
        Rules::default().required()
    }

    pub fn email() -> ValidationRule {
        Rules::default().email()
    }

    pub fn min_length(min: usize) -> ValidationRule {
        Rules::default().min_length(min)
    }

    pub fn max_length(max: usize) -> ValidationRule {
        Rules::default().max_length(max)
    }

    pub fn min(min: Decimal) -> ValidationRule {
        Rules::default().min(min)
    }

    pub fn max(max: Decimal) -> ValidationRule {
        Rules::default().max(max)
    }

    pub fn number() -> ValidationRule {
        Rules::default().number()
    }

    pub fn predicate<P>(check: P, message: impl Into<SharedString>) -> ValidationRule
    where
        P: Fn(&FieldValue) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        ValidationRule::new(move |value: &FieldValue| (!check(value)).then(|| message.clone()))
    }

    fn length_of(value: &FieldValue) -> Option<usize> {
        match value {
            FieldValue::Text(text) => Some(text.trim().chars().count()),
            FieldValue::List(items) => Some(items.len()),
            _ => None,
        }
    }

    // Numeric inputs often arrive as text; unparsable text is left to `number()`.
    fn number_of(value: &FieldValue) -> Option<Decimal> {
        match value {
            FieldValue::Number(number) => Some(*number),
            FieldValue::Text(text) => Decimal::from_str(text.trim()).ok(),
            _ => None,
        }
    }

    pub(crate) fn is_email(candidate: &str) -> bool {
        if candidate.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = candidate.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.contains('@') {
            return false;
        }
        let labels = domain.split('.').collect::<Vec<_>>();
        labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
    }
}
