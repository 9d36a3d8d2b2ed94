use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_STORAGE_KEY: &str = "freetools_data";
pub const DATA_DIR_ENV: &str = "FREETOOLS_DATA_DIR";

pub const DEFAULT_QR_SOURCES: [&str; 3] = [
    "https://cdnjs.cloudflare.com/ajax/libs/qrcode/1.5.3/qrcode.min.js",
    "https://unpkg.com/qrcode@1.5.3/build/qrcode.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/qrcode/1.5.3/qrcode.js",
];

/// Page-level toggles sent by the host with `init`. Anything missing keeps its
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub persistence_enabled: bool,
    pub storage_key: String,
    pub debounce_ms: u64,
    pub message_timeout_ms: u64,
    pub qr_fallback_sources: Vec<String>,
    pub qr_default_size: u32,
    pub locale: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persistence_enabled: true,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce_ms: 1000,
            message_timeout_ms: 3000,
            qr_fallback_sources: DEFAULT_QR_SOURCES.iter().map(|s| s.to_string()).collect(),
            qr_default_size: 256,
            locale: None,
        }
    }
}

/// Directory used by the native file storage backend.
pub fn data_dir() -> PathBuf {
    if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }
    std::env::temp_dir().join("freetools")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"persistence_enabled": false, "debounce_ms": 250}"#)
            .expect("config should parse");
        assert!(!cfg.persistence_enabled);
        assert_eq!(cfg.debounce_ms, 250);
        assert_eq!(cfg.message_timeout_ms, 3000);
        assert_eq!(cfg.storage_key, "freetools_data");
        assert_eq!(cfg.qr_fallback_sources.len(), 3);
    }

    #[test]
    fn fallback_sources_keep_configured_order() {
        let cfg: Config =
            serde_json::from_str(r#"{"qr_fallback_sources": ["https://b", "https://a"]}"#).unwrap();
        assert_eq!(cfg.qr_fallback_sources, vec!["https://b", "https://a"]);
    }
}
