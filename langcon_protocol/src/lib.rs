use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

pub const DETECT_INTERVAL_RANGE: RangeInclusive<f32> = 0.1..=2.0;
pub const MOUSE_SENSITIVITY_RANGE: RangeInclusive<u32> = 10..=500;
pub const DEFAULT_DETECT_INTERVAL_SECS: f32 = 0.5;
pub const DEFAULT_MOUSE_SENSITIVITY: u32 = 100;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
    Ja,
    Zh,
}

impl Language {
    pub const FALLBACK: Language = Language::En;
    pub const ALL: [Language; 4] = [Language::En, Language::Ko, Language::Ja, Language::Zh];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Ja => "ja",
            Language::Zh => "zh",
        }
    }

    /// Unknown or malformed codes collapse to [`Language::FALLBACK`].
    pub fn sanitize(value: &str) -> Language {
        let lower = value.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == lower)
            .unwrap_or(Language::FALLBACK)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Language::sanitize(&raw))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImeStatus {
    Korean,
    English,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub title: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub process: Option<ProcessInfo>,
    pub ime_status: ImeStatus,
    pub manual_override: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageValue::Integer(v) => write!(f, "{v}"),
            MessageValue::Float(v) => write!(f, "{v}"),
            MessageValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<String> for MessageValue {
    fn from(value: String) -> Self {
        MessageValue::Text(value)
    }
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        MessageValue::Text(value.to_string())
    }
}

impl From<i64> for MessageValue {
    fn from(value: i64) -> Self {
        MessageValue::Integer(value)
    }
}

impl From<u32> for MessageValue {
    fn from(value: u32) -> Self {
        MessageValue::Integer(i64::from(value))
    }
}

impl From<f64> for MessageValue {
    fn from(value: f64) -> Self {
        MessageValue::Float(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub key: String,
    #[serde(default)]
    pub values: BTreeMap<String, MessageValue>,
}

impl StatusMessage {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_values<K, V>(
        key: impl Into<String>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<MessageValue>,
    {
        Self {
            key: key.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub selected_processes: Vec<String>,
    pub use_auto_to_en: bool,
    pub use_mouse_move_event: bool,
    pub detect_interval_secs: f32,
    pub mouse_sensitivity: u32,
    pub start_with_windows: bool,
    pub language: Language,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_processes: Vec::new(),
            use_auto_to_en: true,
            use_mouse_move_event: true,
            detect_interval_secs: DEFAULT_DETECT_INTERVAL_SECS,
            mouse_sensitivity: DEFAULT_MOUSE_SENSITIVITY,
            start_with_windows: false,
            language: Language::FALLBACK,
        }
    }
}

pub fn clamp_detect_interval(seconds: f32) -> f32 {
    if seconds.is_nan() {
        return DEFAULT_DETECT_INTERVAL_SECS;
    }
    seconds.clamp(*DETECT_INTERVAL_RANGE.start(), *DETECT_INTERVAL_RANGE.end())
}

pub fn clamp_mouse_sensitivity(distance: u32) -> u32 {
    distance.clamp(*MOUSE_SENSITIVITY_RANGE.start(), *MOUSE_SENSITIVITY_RANGE.end())
}

impl AppConfig {
    pub fn normalize(&mut self) {
        self.detect_interval_secs = clamp_detect_interval(self.detect_interval_secs);
        self.mouse_sensitivity = clamp_mouse_sensitivity(self.mouse_sensitivity);
        self.selected_processes.sort();
        self.selected_processes.dedup();
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected_processes.iter().any(|p| p == name)
    }

    /// Inserts `name` keeping the list sorted and free of duplicates.
    pub fn select(&mut self, name: &str) -> bool {
        match self.selected_processes.binary_search_by(|p| p.as_str().cmp(name)) {
            Ok(_) => false,
            Err(pos) => {
                self.selected_processes.insert(pos, name.to_string());
                true
            }
        }
    }

    pub fn deselect(&mut self, name: &str) -> bool {
        let before = self.selected_processes.len();
        self.selected_processes.retain(|p| p != name);
        self.selected_processes.len() != before
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub saved_config: AppConfig,
    pub draft_config: AppConfig,
    pub available_processes: Vec<ProcessInfo>,
    #[serde(default)]
    pub focus: Option<FocusSnapshot>,
    #[serde(default)]
    pub status_message: Option<StatusMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "command", content = "args")]
pub enum Command {
    LoadState,
    SaveChanges,
    DiscardChanges,
    AddSelectedProcess { name: String },
    RemoveSelectedProcess { name: String },
    RefreshProcesses,
    SetLanguage { language: Language },
    SetStartWithWindows { enabled: bool },
    SetUseAutoToEn { enabled: bool },
    SetUseMouseMoveEvent { enabled: bool },
    SetDetectInterval { seconds: f32 },
    SetMouseSensitivity { distance: u32 },
    SetManualOverride {
        #[serde(rename = "processName")]
        process_name: String,
        enabled: bool,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::LoadState => "load_state",
            Command::SaveChanges => "save_changes",
            Command::DiscardChanges => "discard_changes",
            Command::AddSelectedProcess { .. } => "add_selected_process",
            Command::RemoveSelectedProcess { .. } => "remove_selected_process",
            Command::RefreshProcesses => "refresh_processes",
            Command::SetLanguage { .. } => "set_language",
            Command::SetStartWithWindows { .. } => "set_start_with_windows",
            Command::SetUseAutoToEn { .. } => "set_use_auto_to_en",
            Command::SetUseMouseMoveEvent { .. } => "set_use_mouse_move_event",
            Command::SetDetectInterval { .. } => "set_detect_interval",
            Command::SetMouseSensitivity { .. } => "set_mouse_sensitivity",
            Command::SetManualOverride { .. } => "set_manual_override",
        }
    }

    /// Whether the command edits the draft config (and so needs a trailing persist).
    pub fn mutates_draft(&self) -> bool {
        matches!(
            self,
            Command::AddSelectedProcess { .. }
                | Command::RemoveSelectedProcess { .. }
                | Command::SetLanguage { .. }
                | Command::SetStartWithWindows { .. }
                | Command::SetUseAutoToEn { .. }
                | Command::SetUseMouseMoveEvent { .. }
                | Command::SetDetectInterval { .. }
                | Command::SetMouseSensitivity { .. }
        )
    }

    pub fn stage(&self, draft: &mut AppConfig) -> bool {
        match self {
            Command::AddSelectedProcess { name } => draft.select(name),
            Command::RemoveSelectedProcess { name } => draft.deselect(name),
            Command::SetLanguage { language } => replace(&mut draft.language, *language),
            Command::SetStartWithWindows { enabled } => {
                replace(&mut draft.start_with_windows, *enabled)
            }
            Command::SetUseAutoToEn { enabled } => replace(&mut draft.use_auto_to_en, *enabled),
            Command::SetUseMouseMoveEvent { enabled } => {
                replace(&mut draft.use_mouse_move_event, *enabled)
            }
            Command::SetDetectInterval { seconds } => {
                let next = clamp_detect_interval(*seconds);
                if (draft.detect_interval_secs - next).abs() > f32::EPSILON {
                    draft.detect_interval_secs = next;
                    true
                } else {
                    false
                }
            }
            Command::SetMouseSensitivity { distance } => {
                replace(&mut draft.mouse_sensitivity, clamp_mouse_sensitivity(*distance))
            }
            Command::LoadState
            | Command::SaveChanges
            | Command::DiscardChanges
            | Command::RefreshProcesses
            | Command::SetManualOverride { .. } => false,
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushChannel {
    #[serde(rename = "focus-changed")]
    FocusChanged,
    #[serde(rename = "status-message")]
    StatusMessage,
    #[serde(rename = "processes-updated")]
    ProcessesUpdated,
}

impl PushChannel {
    pub const ALL: [PushChannel; 3] = [
        PushChannel::FocusChanged,
        PushChannel::StatusMessage,
        PushChannel::ProcessesUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PushChannel::FocusChanged => "focus-changed",
            PushChannel::StatusMessage => "status-message",
            PushChannel::ProcessesUpdated => "processes-updated",
        }
    }
}

impl fmt::Display for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum PushEvent {
    #[serde(rename = "focus-changed")]
    FocusChanged(Option<FocusSnapshot>),
    #[serde(rename = "status-message")]
    StatusMessage(StatusMessage),
    #[serde(rename = "processes-updated")]
    ProcessesUpdated(Vec<ProcessInfo>),
}

impl PushEvent {
    pub fn channel(&self) -> PushChannel {
        match self {
            PushEvent::FocusChanged(_) => PushChannel::FocusChanged,
            PushEvent::StatusMessage(_) => PushChannel::StatusMessage,
            PushEvent::ProcessesUpdated(_) => PushChannel::ProcessesUpdated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_shape_uses_backend_names() {
        let json = serde_json::to_value(Command::SetManualOverride {
            process_name: "notepad.exe".to_string(),
            enabled: true,
        })
        .unwrap();
        assert_eq!(json["command"], "set_manual_override");
        assert_eq!(json["args"]["processName"], "notepad.exe");

        let json = serde_json::to_value(Command::LoadState).unwrap();
        assert_eq!(json["command"], Command::LoadState.name());
    }

    #[test]
    fn language_deserialization_sanitizes_unknown_codes() {
        let lang: Language = serde_json::from_str("\"KO\"").unwrap();
        assert_eq!(lang, Language::Ko);
        let lang: Language = serde_json::from_str("\"fr\"").unwrap();
        assert_eq!(lang, Language::En);
    }

    #[test]
    fn view_model_parses_backend_payload() {
        let raw = r#"{
            "savedConfig": {"selectedProcesses": ["code.exe"], "useAutoToEn": true,
                "useMouseMoveEvent": false, "detectIntervalSecs": 0.5,
                "mouseSensitivity": 120, "startWithWindows": false, "language": "ja"},
            "draftConfig": {"selectedProcesses": [], "language": "ja"},
            "availableProcesses": [{"pid": 4, "name": "code.exe", "title": "main.rs"}],
            "focus": {"process": null, "imeStatus": "korean", "manualOverride": false},
            "hasUnsavedChanges": true,
            "statusMessage": {"key": "toast.status.autoSwitch",
                "values": {"name": "code.exe", "count": 3}}
        }"#;
        let vm: ViewModel = serde_json::from_str(raw).unwrap();
        assert_eq!(vm.saved_config.language, Language::Ja);
        assert_eq!(vm.draft_config.mouse_sensitivity, DEFAULT_MOUSE_SENSITIVITY);
        assert_eq!(vm.focus.as_ref().map(|f| f.ime_status), Some(ImeStatus::Korean));
        let msg = vm.status_message.unwrap();
        assert_eq!(msg.values["count"], MessageValue::Integer(3));
        assert_eq!(msg.values["name"].to_string(), "code.exe");
    }

    #[test]
    fn stage_clamps_ranges_and_keeps_selection_sorted() {
        let mut cfg = AppConfig::default();
        assert!(Command::SetDetectInterval { seconds: 9.0 }.stage(&mut cfg));
        assert_eq!(cfg.detect_interval_secs, 2.0);
        assert!(Command::SetMouseSensitivity { distance: 1 }.stage(&mut cfg));
        assert_eq!(cfg.mouse_sensitivity, 10);

        assert!(Command::AddSelectedProcess { name: "z.exe".into() }.stage(&mut cfg));
        assert!(Command::AddSelectedProcess { name: "a.exe".into() }.stage(&mut cfg));
        assert!(!Command::AddSelectedProcess { name: "a.exe".into() }.stage(&mut cfg));
        assert_eq!(cfg.selected_processes, vec!["a.exe", "z.exe"]);

        assert!(!Command::SaveChanges.stage(&mut cfg));
        assert!(!Command::SetUseAutoToEn { enabled: true }.stage(&mut cfg));
    }

    #[test]
    fn push_event_carries_channel_name() {
        let ev = PushEvent::FocusChanged(None);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.channel().as_str());
        assert!(json["payload"].is_null());
    }
}
