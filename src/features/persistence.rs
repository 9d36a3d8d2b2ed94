use crate::error::ToolError;
use crate::features::storage::StorageBackend;
use serde::{Deserialize, Serialize};

/// Snapshot of the tracked input fields, stored as one JSON record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedFormState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_text: Option<String>,
}

impl PersistedFormState {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coalesces bursts of input events: every trigger moves the deadline, only
/// the quiet period after the last one fires.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    deadline_ms: Option<u64>,
}

impl Debouncer {
    pub const fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            deadline_ms: None,
        }
    }

    pub fn set_window(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    pub fn trigger(&mut self, now_ms: u64) -> u64 {
        let deadline = now_ms.saturating_add(self.window_ms);
        self.deadline_ms = Some(deadline);
        deadline
    }

    /// True exactly once when the deadline has been reached.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }
}

/// Mirrors form fields into a storage backend. All failures are logged and
/// swallowed; the mirror never reports an error to its caller.
pub struct PersistenceMirror {
    enabled: bool,
    key: String,
    backend: Option<Box<dyn StorageBackend>>,
    pub debounce: Debouncer,
}

impl PersistenceMirror {
    pub fn new(enabled: bool, key: impl Into<String>, debounce_ms: u64) -> Self {
        Self {
            enabled,
            key: key.into(),
            backend: None,
            debounce: Debouncer::new(debounce_ms),
        }
    }

    pub fn configure(&mut self, enabled: bool, key: &str, debounce_ms: u64) {
        self.enabled = enabled;
        self.key = key.to_string();
        self.debounce.set_window(debounce_ms);
        if !enabled {
            self.debounce.cancel();
        }
    }

    pub fn install(&mut self, backend: Box<dyn StorageBackend>) {
        log::info!("persistence backend: {}", backend.name());
        self.backend = Some(backend);
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn save_state(&mut self, fields: &PersistedFormState) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.try_save(fields) {
            log::warn!("unable to save to local storage: {e}");
        }
    }

    fn try_save(&mut self, fields: &PersistedFormState) -> Result<(), ToolError> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| ToolError::storage("no_backend"))?;
        let encoded = serde_json::to_string(fields).map_err(ToolError::storage)?;
        backend.set_item(&self.key, &encoded)
    }

    /// Missing, unreadable and malformed records all read as "no prior state".
    pub fn restore_state(&self) -> PersistedFormState {
        if !self.enabled {
            return PersistedFormState::default();
        }
        match self.try_restore() {
            Ok(state) => state,
            Err(e) => {
                log::warn!("unable to restore data from local storage: {e}");
                PersistedFormState::default()
            }
        }
    }

    fn try_restore(&self) -> Result<PersistedFormState, ToolError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ToolError::storage("no_backend"))?;
        match backend.get_item(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(ToolError::storage)
            }
            _ => Ok(PersistedFormState::default()),
        }
    }

    /// Arms the debounce window; returns the flush deadline, or `None` when
    /// persistence is off.
    pub fn note_input(&mut self, now_ms: u64) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        Some(self.debounce.trigger(now_ms))
    }
}
