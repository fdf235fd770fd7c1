//! Hook model for printer event notifications.
//!
//! A hook describes one HTTP target: where to send, how to shape the request,
//! and which printer events it reacts to.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::HookError;

/// Printer event understood by hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEvent {
    PrintStarted,
    PrintDone,
    PrintFailed,
    PrintPaused,
    UserActionNeeded,
    PrintProgress,
    Error,
    /// Any other host event, matched against a hook's custom events.
    Custom(String),
}

impl HookEvent {
    pub const NOTIFY_EVENT: &'static str = "plugin_webhooks_notify";
    pub const PROGRESS_EVENT: &'static str = "plugin_webhooks_progress";

    /// Map a host event name to a hook event.
    pub fn from_name(name: &str) -> Self {
        match name {
            "PrintStarted" => Self::PrintStarted,
            "PrintDone" => Self::PrintDone,
            "PrintFailed" => Self::PrintFailed,
            "PrintPaused" => Self::PrintPaused,
            "Error" => Self::Error,
            Self::NOTIFY_EVENT => Self::UserActionNeeded,
            Self::PROGRESS_EVENT => Self::PrintProgress,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Host event name, also used as the cooldown key.
    pub fn name(&self) -> &str {
        match self {
            Self::PrintStarted => "PrintStarted",
            Self::PrintDone => "PrintDone",
            Self::PrintFailed => "PrintFailed",
            Self::PrintPaused => "PrintPaused",
            Self::UserActionNeeded => Self::NOTIFY_EVENT,
            Self::PrintProgress => Self::PROGRESS_EVENT,
            Self::Error => "Error",
            Self::Custom(name) => name,
        }
    }

    /// Human readable topic exposed to templates as `@topic`.
    pub fn topic(&self) -> &str {
        match self {
            Self::PrintStarted => "Print Started",
            Self::PrintDone => "Print Done",
            Self::PrintFailed => "Print Failed",
            Self::PrintPaused => "Print Paused",
            Self::UserActionNeeded => "User Action Needed",
            Self::PrintProgress => "Print Progress",
            Self::Error => "Error",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request body encoding.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[default]
    Json,
    Form,
}

impl ContentType {
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// Integer setting that may be stored as a number or as free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    pub fn parse_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Self::Float(_) => None,
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl Default for LooseNumber {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl fmt::Display for LooseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Enable flag and message template for one built-in event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

impl EventToggle {
    fn on(message: &str) -> Self {
        Self {
            enabled: true,
            message: message.to_string(),
        }
    }
}

/// Print progress notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressToggle {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval: LooseNumber,
    #[serde(default = "default_progress_message")]
    pub message: String,
}

impl Default for ProgressToggle {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
            message: default_progress_message(),
        }
    }
}

/// Per-event settings for the built-in printer events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventSettings {
    pub print_started: EventToggle,
    pub print_done: EventToggle,
    pub print_failed: EventToggle,
    pub print_paused: EventToggle,
    pub user_action_needed: EventToggle,
    pub error: EventToggle,
    pub print_progress: ProgressToggle,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            print_started: EventToggle::on("Your print has started."),
            print_done: EventToggle::on("Your print is done."),
            print_failed: EventToggle::on("Something went wrong and your print has failed."),
            print_paused: EventToggle::on(
                "Your print has paused. You might need to change the filament color.",
            ),
            user_action_needed: EventToggle::on(
                "User action needed. You might need to change the filament color.",
            ),
            error: EventToggle::on("There was an error."),
            print_progress: ProgressToggle::default(),
        }
    }
}

/// User defined event handled by a hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomEvent {
    pub name: String,
    #[serde(default)]
    pub message: String,
}

/// Token request performed before the main request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub http_method: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_oauth_body")]
    pub body: Value,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            http_method: default_method(),
            content_type: ContentType::Json,
            headers: default_headers(),
            body: default_oauth_body(),
        }
    }
}

impl OAuthConfig {
    pub fn request_template(&self) -> RequestTemplate<'_> {
        RequestTemplate {
            url: &self.url,
            http_method: &self.http_method,
            content_type: self.content_type,
            headers: &self.headers,
            body: &self.body,
        }
    }
}

/// Borrowed view over the request-shaping fields of a hook or its OAuth step.
#[derive(Debug, Clone, Copy)]
pub struct RequestTemplate<'a> {
    pub url: &'a str,
    pub http_method: &'a str,
    pub content_type: ContentType,
    pub headers: &'a BTreeMap<String, String>,
    pub body: &'a Value,
}

impl RequestTemplate<'_> {
    fn mentions(&self, token: &str) -> bool {
        self.url.contains(token)
            || self.headers.values().any(|value| value.contains(token))
            || value_mentions(self.body, token)
    }
}

/// Topic and message template selected for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRoute {
    pub topic: String,
    pub message: String,
}

/// Persisted hook definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hook {
    /// Stable identifier keying milestone and cooldown state.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub http_method: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_body")]
    pub body: Value,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub device_identifier: String,
    #[serde(default)]
    pub events: EventSettings,
    #[serde(default)]
    pub custom_events: Vec<CustomEvent>,
    /// Minimum seconds between two deliveries of the same event.
    #[serde(default)]
    pub cooldown: LooseNumber,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

impl Default for Hook {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            enabled: true,
            url: String::new(),
            http_method: default_method(),
            content_type: ContentType::Json,
            headers: default_headers(),
            body: default_body(),
            api_secret: String::new(),
            device_identifier: String::new(),
            events: EventSettings::default(),
            custom_events: Vec::new(),
            cooldown: LooseNumber::default(),
            verify_ssl: true,
            oauth: OAuthConfig::default(),
        }
    }
}

impl Hook {
    /// Create a hook targeting `url` with default templates.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Assign a fresh id when the stored record has none.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
    }

    /// Label used in logs and notices.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Topic and message template for `event`, or `None` when the hook ignores it.
    pub fn route(&self, event: &HookEvent) -> Option<EventRoute> {
        let toggle = match event {
            HookEvent::PrintStarted => &self.events.print_started,
            HookEvent::PrintDone => &self.events.print_done,
            HookEvent::PrintFailed => &self.events.print_failed,
            HookEvent::PrintPaused => &self.events.print_paused,
            HookEvent::UserActionNeeded => &self.events.user_action_needed,
            HookEvent::Error => &self.events.error,
            HookEvent::PrintProgress => {
                let progress = &self.events.print_progress;
                return progress.enabled.then(|| EventRoute {
                    topic: event.topic().to_string(),
                    message: progress.message.clone(),
                });
            }
            HookEvent::Custom(name) => {
                return self
                    .custom_events
                    .iter()
                    .find(|custom| custom.name == *name)
                    .map(|custom| EventRoute {
                        topic: name.clone(),
                        message: custom.message.clone(),
                    });
            }
        };

        toggle.enabled.then(|| EventRoute {
            topic: event.topic().to_string(),
            message: toggle.message.clone(),
        })
    }

    /// Parsed progress interval in percent.
    pub fn progress_interval(&self) -> Result<i64, HookError> {
        let raw = &self.events.print_progress.interval;
        match raw.parse_int() {
            Some(value) if value > 0 => Ok(value),
            _ => Err(HookError::Config(format!(
                "invalid print progress interval {raw:?}, use a positive whole number"
            ))),
        }
    }

    /// Parsed cooldown window.
    pub fn cooldown_duration(&self) -> Result<Duration, HookError> {
        match self.cooldown.parse_int() {
            Some(seconds) if seconds >= 0 => Ok(Duration::from_secs(seconds as u64)),
            _ => Err(HookError::Config(format!(
                "invalid event cooldown {:?}, use a whole number of seconds",
                self.cooldown
            ))),
        }
    }

    /// Whether any template of this hook references `@name`.
    ///
    /// Covers the request, the message templates and the OAuth step.
    pub fn references(&self, name: &str) -> bool {
        let token = format!("@{name}");
        let events = &self.events;
        let messages = [
            &events.print_started.message,
            &events.print_done.message,
            &events.print_failed.message,
            &events.print_paused.message,
            &events.user_action_needed.message,
            &events.error.message,
            &events.print_progress.message,
        ];

        self.request_template().mentions(&token)
            || messages.iter().any(|message| message.contains(&token))
            || self
                .custom_events
                .iter()
                .any(|custom| custom.message.contains(&token))
            || (self.oauth.enabled && self.oauth.request_template().mentions(&token))
    }

    pub fn request_template(&self) -> RequestTemplate<'_> {
        RequestTemplate {
            url: &self.url,
            http_method: &self.http_method,
            content_type: self.content_type,
            headers: &self.headers,
            body: &self.body,
        }
    }
}

fn value_mentions(value: &Value, token: &str) -> bool {
    match value {
        Value::String(text) => text.contains(token),
        Value::Array(items) => items.iter().any(|item| value_mentions(item, token)),
        Value::Object(map) => map.values().any(|item| value_mentions(item, token)),
        _ => false,
    }
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_interval() -> LooseNumber {
    LooseNumber::Text("50".to_string())
}

fn default_progress_message() -> String {
    "Your print is @percentCompleteMilestone % complete.".to_string()
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

fn default_body() -> Value {
    json!({
        "deviceIdentifier": "@deviceIdentifier",
        "apiSecret": "@apiSecret",
        "topic": "@topic",
        "message": "@message",
        "extra": "@extra",
        "state": "@state",
        "job": "@job",
        "progress": "@progress",
        "currentZ": "@currentZ",
        "offsets": "@offsets",
        "meta": "@meta",
        "currentTime": "@currentTime",
        "snapshot": "@snapshot"
    })
}

fn default_oauth_body() -> Value {
    json!({
        "client_id": "myClient",
        "client_secret": "mySecret",
        "grant_type": "client_credentials"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_round_trip_host_names() {
        for name in [
            "PrintStarted",
            "PrintDone",
            "PrintFailed",
            "PrintPaused",
            "Error",
            HookEvent::NOTIFY_EVENT,
            HookEvent::PROGRESS_EVENT,
            "FilamentRunout",
        ] {
            assert_eq!(HookEvent::from_name(name).name(), name);
        }
        assert_eq!(
            HookEvent::from_name("FilamentRunout"),
            HookEvent::Custom("FilamentRunout".to_string())
        );
    }

    #[test]
    fn test_hook_deserializes_with_defaults() {
        let hook: Hook = serde_json::from_value(json!({ "url": "http://example.com" }))
            .expect("parse hook");

        assert!(hook.enabled);
        assert!(hook.verify_ssl);
        assert!(hook.id.is_empty());
        assert_eq!(hook.http_method, "POST");
        assert_eq!(hook.content_type, ContentType::Json);
        assert_eq!(hook.body["job"], "@job");
        assert!(!hook.events.print_progress.enabled);
        assert_eq!(hook.progress_interval().expect("interval"), 50);
    }

    #[test]
    fn test_route_respects_toggles_and_custom_events() {
        let mut hook = Hook::new("test", "http://example.com");
        hook.events.print_done.enabled = false;
        hook.custom_events.push(CustomEvent {
            name: "FilamentRunout".to_string(),
            message: "Out of filament".to_string(),
        });

        let started = hook.route(&HookEvent::PrintStarted).expect("started route");
        assert_eq!(started.topic, "Print Started");
        assert_eq!(started.message, "Your print has started.");
        assert!(hook.route(&HookEvent::PrintDone).is_none());
        assert!(hook.route(&HookEvent::PrintProgress).is_none());

        let custom = hook
            .route(&HookEvent::from_name("FilamentRunout"))
            .expect("custom route");
        assert_eq!(custom.topic, "FilamentRunout");
        assert_eq!(custom.message, "Out of filament");
        assert!(hook.route(&HookEvent::from_name("Unknown")).is_none());
    }

    #[test]
    fn test_loose_numbers() {
        let mut hook = Hook::default();
        hook.events.print_progress.interval = LooseNumber::Text(" 25 ".to_string());
        assert_eq!(hook.progress_interval().expect("interval"), 25);

        hook.events.print_progress.interval = LooseNumber::Text("abc".to_string());
        assert!(matches!(hook.progress_interval(), Err(HookError::Config(_))));

        hook.events.print_progress.interval = LooseNumber::Int(0);
        assert!(hook.progress_interval().is_err());

        hook.cooldown = LooseNumber::Float(30.0);
        assert_eq!(
            hook.cooldown_duration().expect("cooldown"),
            Duration::from_secs(30)
        );
        hook.cooldown = LooseNumber::Int(-1);
        assert!(hook.cooldown_duration().is_err());
    }

    #[test]
    fn test_references_scans_all_templates() {
        let mut hook = Hook::new("test", "http://example.com");
        assert!(hook.references("snapshot"));

        hook.body = json!({ "text": "@message" });
        assert!(!hook.references("snapshot"));

        hook.headers
            .insert("X-Image".to_string(), "@snapshot".to_string());
        assert!(hook.references("snapshot"));
    }

    #[test]
    fn test_references_covers_messages_and_oauth() {
        let plain = || {
            let mut hook = Hook::new("test", "http://example.com");
            hook.body = json!({ "text": "@message" });
            hook
        };
        assert!(!plain().references("snapshot"));

        let mut hook = plain();
        hook.events.print_done.message = "see @snapshot".to_string();
        assert!(hook.references("snapshot"));

        let mut hook = plain();
        hook.custom_events.push(CustomEvent {
            name: "ZChange".to_string(),
            message: "frame @snapshot".to_string(),
        });
        assert!(hook.references("snapshot"));

        let mut hook = plain();
        hook.oauth.body = json!({ "image": "@snapshot" });
        assert!(!hook.references("snapshot"));
        hook.oauth.enabled = true;
        assert!(hook.references("snapshot"));
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let mut hook = Hook {
            id: String::new(),
            ..Hook::default()
        };
        hook.ensure_id();
        let assigned = hook.id.clone();
        assert!(!assigned.is_empty());

        hook.ensure_id();
        assert_eq!(hook.id, assigned);
    }
}
