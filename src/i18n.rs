use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use gpui::SharedString;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/bizform_i18n_generated.rs"));
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Locale {
    #[default]
    System,
    Tag(String),
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("system") {
            Self::System
        } else {
            Self::Tag(value.to_string())
        }
    }
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Message lookup for validation texts. Clones share the selected locale.
#[derive(Clone)]
pub struct I18nManager {
    catalog: &'static MessageCatalog,
    locale: Arc<RwLock<Locale>>,
}

impl Default for I18nManager {
    fn default() -> Self {
        Self::new()
    }
}

impl I18nManager {
    pub fn new() -> Self {
        Self::with_locale(Locale::System)
    }

    pub fn with_locale(locale: impl Into<Locale>) -> Self {
        Self {
            catalog: MessageCatalog::shared(),
            locale: Arc::new(RwLock::new(locale.into())),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_locale(&self, locale: impl Into<Locale>) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.into();
    }

    pub fn default_locale(&self) -> &'static str {
        self.catalog.default_locale
    }

    pub fn resolved_locale(&self) -> &'static str {
        self.catalog.resolve(self.requested_locale().as_deref())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Missing keys render as the key itself.
    pub fn t(&self, key: &str) -> SharedString {
        match self.lookup(key) {
            Some(message) => message.into(),
            None => key.to_string().into(),
        }
    }

    pub fn t_with(&self, key: &str, params: &[(&str, &str)]) -> SharedString {
        let template = self.lookup(key).unwrap_or(key);
        if params.is_empty() {
            return template.to_string().into();
        }
        interpolate(template, params).into()
    }

    fn requested_locale(&self) -> Option<String> {
        match self.locale() {
            Locale::System => system_locale(),
            Locale::Tag(tag) => Some(tag),
        }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        let locale = self.resolved_locale();
        self.catalog
            .lookup(locale, key)
            .or_else(|| self.catalog.lookup(self.catalog.default_locale, key))
    }
}

#[cfg(feature = "i18n")]
fn system_locale() -> Option<String> {
    sys_locale::get_locale()
}

#[cfg(not(feature = "i18n"))]
fn system_locale() -> Option<String> {
    None
}

struct MessageCatalog {
    default_locale: &'static str,
    messages: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    by_tag: HashMap<String, &'static str>,
    by_language: HashMap<String, &'static str>,
}

impl MessageCatalog {
    fn shared() -> &'static Self {
        static CATALOG: OnceLock<MessageCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load)
    }

    fn load() -> Self {
        let mut messages = HashMap::new();
        let mut by_tag = HashMap::new();
        let mut by_language = HashMap::<String, Option<&'static str>>::new();

        for (locale, entries) in generated::LOCALES.iter().copied() {
            let tag = normalize_locale_tag(locale);
            let language = primary_language(&tag);
            by_tag.insert(tag, locale);
            by_language
                .entry(language)
                .and_modify(|existing| {
                    if *existing != Some(locale) {
                        *existing = None;
                    }
                })
                .or_insert(Some(locale));
            messages.insert(locale, entries.iter().copied().collect::<HashMap<_, _>>());
        }

        let default_locale = generated::DEFAULT_LOCALE;
        messages.entry(default_locale).or_default();
        by_tag
            .entry(normalize_locale_tag(default_locale))
            .or_insert(default_locale);

        // Languages shared by several regional catalogs stay unresolved.
        let by_language = by_language
            .into_iter()
            .filter_map(|(language, locale)| locale.map(|locale| (language, locale)))
            .collect();

        Self {
            default_locale,
            messages,
            by_tag,
            by_language,
        }
    }

    fn resolve(&self, requested: Option<&str>) -> &'static str {
        let Some(requested) = requested else {
            return self.default_locale;
        };
        let tag = normalize_locale_tag(requested);
        if let Some(locale) = self.by_tag.get(&tag) {
            return *locale;
        }
        self.by_language
            .get(&primary_language(&tag))
            .copied()
            .unwrap_or(self.default_locale)
    }

    fn lookup(&self, locale: &'static str, key: &str) -> Option<&'static str> {
        self.messages
            .get(locale)
            .and_then(|entries| entries.get(key).copied())
    }
}

fn primary_language(tag: &str) -> String {
    tag.split('-').next().unwrap_or_default().to_string()
}

/// `zh_CN.UTF-8` and `zh-cn` both become `zh-cn`.
fn normalize_locale_tag(tag: &str) -> String {
    let tag = tag.trim();
    let tag = tag.split(['.', '@']).next().unwrap_or(tag);
    tag.split(['-', '_'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Replaces `{name}` placeholders; unknown or unterminated ones are kept.
fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            output.push_str(&rest[open..]);
            return output;
        };
        let name = &after_open[..close];
        match params.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => output.push_str(value),
            None => output.push_str(&rest[open..open + close + 2]),
        }
        rest = &after_open[close + 1..];
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::{I18nManager, interpolate, normalize_locale_tag};

    #[test]
    fn missing_translation_shows_key() {
        let i18n = I18nManager::with_locale("en-US");
        assert_eq!(i18n.t("validation.unknown").to_string(), "validation.unknown");
    }

    #[test]
    fn default_locale_carries_required_message() {
        let i18n = I18nManager::with_locale("en-US");
        assert_eq!(i18n.default_locale(), "en-US");
        assert_eq!(
            i18n.t("validation.required").to_string(),
            "This field is required"
        );
    }

    #[test]
    fn supports_locale_tag_normalization() {
        let i18n = I18nManager::new();
        i18n.set_locale("zh_CN.UTF-8");
        assert_eq!(i18n.resolved_locale(), "zh-CN");
        assert_eq!(i18n.t("validation.required").to_string(), "此项为必填项");
    }

    #[test]
    fn unknown_locale_falls_back_to_default() {
        let i18n = I18nManager::with_locale("fr-FR");
        assert_eq!(i18n.resolved_locale(), "en-US");
    }

    #[test]
    fn supports_placeholder_interpolation() {
        let i18n = I18nManager::with_locale("en-US");
        assert_eq!(
            i18n.t_with("validation.min_length", &[("min", "3")])
                .to_string(),
            "Must be at least 3 characters"
        );
        assert_eq!(interpolate("{a}-{b}", &[("a", "1")]), "1-{b}");
        assert_eq!(interpolate("open {a", &[("a", "1")]), "open {a");
        assert_eq!(normalize_locale_tag(" en_us "), "en-us");
    }
}
