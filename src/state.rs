use crate::config::Config;
use crate::features::capabilities::{Capability, CapabilityRegistry};
use crate::features::image_convert::ImageToolState;
use crate::features::message::MessageChannel;
use crate::features::persistence::{PersistedFormState, PersistenceMirror};
use crate::features::qr::QrToolState;
use crate::features::video_gif::GifToolState;
use serde::Serialize;
use std::collections::HashMap;

/// DOM ids of the page fields. They double as `bindings` keys.
pub mod field_ids {
    pub const JSON_INPUT: &str = "json-input";
    pub const JSON_OUTPUT: &str = "json-output";
    pub const BASE64_INPUT: &str = "base64-input";
    pub const BASE64_OUTPUT: &str = "base64-output";
    pub const QR_INPUT: &str = "qr-input";
    pub const QR_SIZE: &str = "qr-size";
    pub const QR_COLOR: &str = "qr-color";
    pub const QR_CANVAS: &str = "qr-canvas";
    pub const CODE_INPUT: &str = "code-input";
    pub const CODE_OUTPUT: &str = "code-output";
    pub const CODE_LANGUAGE: &str = "code-language";
    pub const REGEX_PATTERN: &str = "regex-pattern";
    pub const REGEX_TEXT: &str = "regex-text";
    pub const REGEX_OUTPUT: &str = "regex-output";
    pub const REGEX_GLOBAL: &str = "regex-global";
    pub const REGEX_IGNORECASE: &str = "regex-ignorecase";
    pub const REGEX_MULTILINE: &str = "regex-multiline";
    pub const IMAGE_INPUT: &str = "image-input";
    pub const IMAGE_FORMAT: &str = "image-format";
    pub const IMAGE_QUALITY: &str = "image-quality";
    pub const IMAGE_PREVIEW: &str = "image-preview";
    pub const VIDEO_INPUT: &str = "video-input";
    pub const GIF_WIDTH: &str = "gif-width";
    pub const GIF_FPS: &str = "gif-fps";
    pub const GIF_DURATION: &str = "gif-duration";
    pub const VIDEO_PREVIEW: &str = "video-preview";
}

/// Work the core hands back to the host, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Download {
        filename: String,
        mime: String,
        base64: String,
    },
    CopyText {
        text: String,
    },
    LoadScript {
        url: String,
        capability: Capability,
    },
    ConvertImage {
        format: String,
        mime: String,
        quality: u8,
        base64: String,
    },
    LoadVideo {
        session: u64,
    },
    CaptureFrame {
        session: u64,
        index: u32,
        time_ms: u64,
        width: u32,
        height: u32,
        delay_ms: u64,
    },
    ScheduleTick {
        at_ms: u64,
    },
}

/// Output fields a plain text tool writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    Json,
    Base64,
    Code,
    Regex,
}

impl OutputField {
    pub fn id(self) -> &'static str {
        match self {
            OutputField::Json => field_ids::JSON_OUTPUT,
            OutputField::Base64 => field_ids::BASE64_OUTPUT,
            OutputField::Code => field_ids::CODE_OUTPUT,
            OutputField::Regex => field_ids::REGEX_OUTPUT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextToolState {
    pub input: String,
    pub output: String,
}

impl TextToolState {
    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeToolState {
    pub input: String,
    pub output: String,
    pub language: String,
}

impl Default for CodeToolState {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            language: "javascript".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegexToolState {
    pub pattern: String,
    pub text: String,
    pub output: String,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

pub struct AppState {
    pub config: Config,
    pub locale: String,
    pub now_ms: u64,
    pub initialized: bool,
    pub messages: MessageChannel,
    pub persistence: PersistenceMirror,
    pub capabilities: CapabilityRegistry,
    pub json: TextToolState,
    pub base64: TextToolState,
    pub qr: QrToolState,
    pub code: CodeToolState,
    pub regex: RegexToolState,
    pub image: ImageToolState,
    pub gif: GifToolState,
    pub effects: Vec<Effect>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            locale: "en".into(),
            now_ms: 0,
            initialized: false,
            messages: MessageChannel::new(config.message_timeout_ms),
            persistence: PersistenceMirror::new(
                config.persistence_enabled,
                config.storage_key.clone(),
                config.debounce_ms,
            ),
            capabilities: CapabilityRegistry::new(),
            json: TextToolState::default(),
            base64: TextToolState::default(),
            qr: QrToolState::new(config.qr_default_size, config.qr_fallback_sources.clone()),
            code: CodeToolState::default(),
            regex: RegexToolState::default(),
            image: ImageToolState::default(),
            gif: GifToolState::default(),
            effects: Vec::new(),
            config,
        }
    }

    pub fn reset_runtime(&mut self) {
        *self = Self::new();
    }

    pub fn apply_config(&mut self, config: Config) {
        self.messages.set_timeout(config.message_timeout_ms);
        self.persistence.configure(
            config.persistence_enabled,
            &config.storage_key,
            config.debounce_ms,
        );
        if self.qr.size == self.config.qr_default_size {
            self.qr.size = config.qr_default_size;
        }
        self.qr.remote.set_sources(config.qr_fallback_sources.clone());
        self.config = config;
    }

    pub fn push_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn schedule_tick(&mut self, at_ms: u64) {
        let already = self
            .effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleTick { at_ms: existing } if *existing == at_ms));
        if !already {
            self.effects.push(Effect::ScheduleTick { at_ms });
        }
    }

    pub fn notify_success(&mut self, text: impl Into<String>) {
        let deadline = self.messages.success(text, self.now_ms);
        self.schedule_tick(deadline);
    }

    pub fn notify_warning(&mut self, text: impl Into<String>) {
        let deadline = self.messages.warning(text, self.now_ms);
        self.schedule_tick(deadline);
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        let deadline = self.messages.error(text, self.now_ms);
        self.schedule_tick(deadline);
    }

    pub fn output_mut(&mut self, field: OutputField) -> &mut String {
        match field {
            OutputField::Json => &mut self.json.output,
            OutputField::Base64 => &mut self.base64.output,
            OutputField::Code => &mut self.code.output,
            OutputField::Regex => &mut self.regex.output,
        }
    }

    /// Current value of a text field by DOM id, for copy and persistence.
    pub fn field_value(&self, id: &str) -> Option<&str> {
        let value = match id {
            field_ids::JSON_INPUT => &self.json.input,
            field_ids::JSON_OUTPUT => &self.json.output,
            field_ids::BASE64_INPUT => &self.base64.input,
            field_ids::BASE64_OUTPUT => &self.base64.output,
            field_ids::QR_INPUT => &self.qr.input,
            field_ids::CODE_INPUT => &self.code.input,
            field_ids::CODE_OUTPUT => &self.code.output,
            field_ids::REGEX_PATTERN => &self.regex.pattern,
            field_ids::REGEX_TEXT => &self.regex.text,
            field_ids::REGEX_OUTPUT => &self.regex.output,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Copies host field values into the tool states before an action runs.
    /// Unknown ids are ignored; missing ids keep their previous value.
    pub fn sync_bindings(&mut self, bindings: &HashMap<String, String>) {
        for (id, value) in bindings {
            match id.as_str() {
                field_ids::JSON_INPUT => self.json.input = value.clone(),
                field_ids::JSON_OUTPUT => self.json.output = value.clone(),
                field_ids::BASE64_INPUT => self.base64.input = value.clone(),
                field_ids::BASE64_OUTPUT => self.base64.output = value.clone(),
                field_ids::QR_INPUT => self.qr.input = value.clone(),
                field_ids::QR_SIZE => self.qr.size = parse_u32(value).unwrap_or(0),
                field_ids::QR_COLOR => self.qr.color = value.trim().to_string(),
                field_ids::CODE_INPUT => self.code.input = value.clone(),
                field_ids::CODE_OUTPUT => self.code.output = value.clone(),
                field_ids::CODE_LANGUAGE => self.code.language = value.trim().to_string(),
                field_ids::REGEX_PATTERN => self.regex.pattern = value.clone(),
                field_ids::REGEX_TEXT => self.regex.text = value.clone(),
                field_ids::REGEX_OUTPUT => self.regex.output = value.clone(),
                field_ids::REGEX_GLOBAL => self.regex.global = parse_bool(value),
                field_ids::REGEX_IGNORECASE => self.regex.ignore_case = parse_bool(value),
                field_ids::REGEX_MULTILINE => self.regex.multiline = parse_bool(value),
                field_ids::IMAGE_INPUT => self.image.set_file_name(value),
                field_ids::IMAGE_FORMAT => self.image.format = value.trim().to_string(),
                field_ids::IMAGE_QUALITY => self.image.set_quality(value),
                field_ids::VIDEO_INPUT => self.gif.set_video_name(value),
                field_ids::GIF_WIDTH => self.gif.width = parse_u32(value),
                field_ids::GIF_FPS => self.gif.fps = parse_u32(value),
                field_ids::GIF_DURATION => self.gif.duration_s = parse_u32(value),
                other => log::trace!("ignoring binding `{other}`"),
            }
        }
    }

    pub fn persisted_fields(&self) -> PersistedFormState {
        PersistedFormState {
            json_input: Some(self.json.input.clone()),
            base64_input: Some(self.base64.input.clone()),
            qr_input: Some(self.qr.input.clone()),
            code_input: Some(self.code.input.clone()),
            regex_pattern: Some(self.regex.pattern.clone()),
            regex_text: Some(self.regex.text.clone()),
        }
    }

    /// Fills fields from a stored record. Empty stored values never overwrite.
    pub fn apply_persisted(&mut self, stored: &PersistedFormState) {
        fn fill(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *target = v.to_string();
            }
        }
        fill(&mut self.json.input, &stored.json_input);
        fill(&mut self.base64.input, &stored.base64_input);
        fill(&mut self.qr.input, &stored.qr_input);
        fill(&mut self.code.input, &stored.code_input);
        fill(&mut self.regex.pattern, &stored.regex_pattern);
        fill(&mut self.regex.text, &stored.regex_text);
    }
}

pub(crate) fn parse_u32(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bindings_update_only_named_fields() {
        let mut state = AppState::new();
        state.base64.input = "keep".into();
        state.sync_bindings(&bindings(&[
            ("json-input", "{\"a\":1}"),
            ("regex-global", "true"),
            ("regex-multiline", "off"),
            ("unknown-field", "x"),
        ]));
        assert_eq!(state.json.input, "{\"a\":1}");
        assert_eq!(state.base64.input, "keep");
        assert!(state.regex.global);
        assert!(!state.regex.multiline);
    }

    #[test]
    fn invalid_qr_size_reads_as_zero() {
        let mut state = AppState::new();
        state.sync_bindings(&bindings(&[("qr-size", "big")]));
        assert_eq!(state.qr.size, 0);
    }

    #[test]
    fn restore_skips_empty_values() {
        let mut state = AppState::new();
        state.qr.input = "existing".into();
        state.apply_persisted(&PersistedFormState {
            json_input: Some("X".into()),
            qr_input: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(state.json.input, "X");
        assert_eq!(state.qr.input, "existing");
    }

    #[test]
    fn notify_schedules_expiry_tick_once() {
        let mut state = AppState::new();
        state.now_ms = 100;
        state.notify_success("a");
        state.notify_error("b");
        assert_eq!(state.take_effects(), vec![Effect::ScheduleTick { at_ms: 3100 }]);
        assert_eq!(state.messages.current().map(|m| m.text.as_str()), Some("b"));
    }

    #[test]
    fn effects_serialize_with_type_tag() {
        let effect = Effect::LoadScript {
            url: "https://cdn/qrcode.js".into(),
            capability: Capability::QrCode,
        };
        let value = serde_json::to_value(effect).unwrap();
        assert_eq!(value["type"], "load_script");
        assert_eq!(value["capability"], "qr_code");
    }
}
