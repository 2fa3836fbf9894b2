use langcon_protocol::{Language, MessageValue};
use std::collections::{BTreeMap, HashMap};

use crate::error::TranslateError;

pub const UPDATE_AVAILABLE_KEY: &str = "toast.update.available";
pub const COMMAND_FAILED_KEY: &str = "toast.error.command";

pub trait Translator: Send + Sync {
    fn lookup(&self, language: Language, key: &str) -> Option<String>;

    fn lookup_strict(&self, language: Language, key: &str) -> Result<String, TranslateError> {
        self.lookup(language, key)
            .or_else(|| self.lookup(Language::FALLBACK, key))
            .ok_or_else(|| TranslateError::UnlocalizedKey {
                language,
                key: key.to_string(),
            })
    }

    /// Never fails: an unknown key renders as itself.
    fn resolve(
        &self,
        language: Language,
        key: &str,
        values: &BTreeMap<String, MessageValue>,
    ) -> String {
        match self.lookup_strict(language, key) {
            Ok(template) => interpolate(&template, values),
            Err(err) => {
                tracing::debug!(%err, "showing raw message key");
                key.to_string()
            }
        }
    }
}

/// Replaces `{name}` placeholders. Unknown placeholders are left untouched.
pub fn interpolate(template: &str, values: &BTreeMap<String, MessageValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match values.get(name) {
            Some(value) => out.push_str(&value.to_string()),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<Language, HashMap<String, String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            Language::En,
            UPDATE_AVAILABLE_KEY,
            "A new version is available ({current} -> {latest}).",
        );
        catalog.insert(Language::En, COMMAND_FAILED_KEY, "{message}");
        catalog.insert(
            Language::Ko,
            UPDATE_AVAILABLE_KEY,
            "새 버전을 사용할 수 있습니다 ({current} -> {latest}).",
        );
        catalog.insert(
            Language::Ja,
            UPDATE_AVAILABLE_KEY,
            "新しいバージョンがあります ({current} -> {latest})。",
        );
        catalog.insert(
            Language::Zh,
            UPDATE_AVAILABLE_KEY,
            "有新版本可用 ({current} -> {latest})。",
        );
        catalog
    }

    /// Parses `{"en": {"key": "text"}, "ko": {...}}`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<Language, HashMap<String, String>> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, language: Language, key: impl Into<String>, text: impl Into<String>) {
        self.entries
            .entry(language)
            .or_default()
            .insert(key.into(), text.into());
    }

    pub fn merge(&mut self, other: Catalog) {
        for (language, table) in other.entries {
            self.entries.entry(language).or_default().extend(table);
        }
    }
}

impl Translator for Catalog {
    fn lookup(&self, language: Language, key: &str) -> Option<String> {
        self.entries.get(&language)?.get(key).cloned()
    }
}
