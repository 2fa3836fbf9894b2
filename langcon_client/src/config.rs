use langcon_protocol::Language;
use std::time::Duration;

use crate::version::RetryPolicy;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub autosave_delay: Duration,
    pub retry: RetryPolicy,
    pub initial_language: Language,
    pub check_for_updates: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            retry: RetryPolicy::default(),
            initial_language: Language::FALLBACK,
            check_for_updates: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `LANGCON_AUTOSAVE_MS`, `LANGCON_UPDATE_CHECK` and `LANGCON_LANGUAGE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("LANGCON_AUTOSAVE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.autosave_delay = Duration::from_millis(ms),
                Err(err) => tracing::warn!(%err, value = %raw, "ignoring LANGCON_AUTOSAVE_MS"),
            }
        }

        if let Some(raw) = lookup("LANGCON_UPDATE_CHECK") {
            config.check_for_updates = !matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }

        if let Some(raw) = lookup("LANGCON_LANGUAGE") {
            config.initial_language = Language::sanitize(&raw);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_apply_and_bad_values_keep_defaults() {
        let env: HashMap<&str, &str> = [
            ("LANGCON_AUTOSAVE_MS", "250"),
            ("LANGCON_UPDATE_CHECK", "off"),
            ("LANGCON_LANGUAGE", "ZH"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.autosave_delay, Duration::from_millis(250));
        assert!(!config.check_for_updates);
        assert_eq!(config.initial_language, Language::Zh);

        let config = ClientConfig::from_lookup(|k| {
            (k == "LANGCON_AUTOSAVE_MS").then(|| "soon".to_string())
        });
        assert_eq!(config, ClientConfig::default());
    }
}
