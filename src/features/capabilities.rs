use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// External libraries or platform APIs a tool delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    QrCode,
    JsBeautify,
    CssBeautify,
    HtmlBeautify,
    GifEncoder,
    WebpEncoder,
}

impl Capability {
    /// Checked once at startup; a missing one produces a warning.
    pub const REQUIRED: [Capability; 5] = [
        Capability::QrCode,
        Capability::JsBeautify,
        Capability::CssBeautify,
        Capability::HtmlBeautify,
        Capability::GifEncoder,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Capability::QrCode => "QR Code Generation Library",
            Capability::JsBeautify => "JavaScript Beautification Library",
            Capability::CssBeautify => "CSS Beautification Library",
            Capability::HtmlBeautify => "HTML Beautification Library",
            Capability::GifEncoder => "GIF Generation Library",
            Capability::WebpEncoder => "WebP Encoder",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "qr_code" | "QRCode" => Some(Capability::QrCode),
            "js_beautify" => Some(Capability::JsBeautify),
            "css_beautify" => Some(Capability::CssBeautify),
            "html_beautify" => Some(Capability::HtmlBeautify),
            "gif_encoder" | "GIF" => Some(Capability::GifEncoder),
            "webp_encoder" => Some(Capability::WebpEncoder),
            _ => None,
        }
    }

    /// Whether the core ships an implementation of its own. WebP encoding is
    /// only reachable through the host canvas.
    fn built_in(self) -> bool {
        !matches!(self, Capability::WebpEncoder)
    }
}

/// Availability per capability: the built-in default unless the host reported
/// otherwise. Re-checked after every remote load.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    reported: BTreeMap<Capability, bool>,
}

impl CapabilityRegistry {
    pub const fn new() -> Self {
        Self {
            reported: BTreeMap::new(),
        }
    }

    pub fn is_available(&self, cap: Capability) -> bool {
        self.reported.get(&cap).copied().unwrap_or_else(|| cap.built_in())
    }

    pub fn set(&mut self, cap: Capability, available: bool) {
        self.reported.insert(cap, available);
    }

    /// Applies a host report such as `{"qr_code": false, "webp_encoder": true}`.
    /// Unknown keys are logged and skipped.
    pub fn apply_report(&mut self, report: &HashMap<String, bool>) {
        for (key, available) in report {
            match Capability::from_key(key) {
                Some(cap) => self.set(cap, *available),
                None => log::debug!("ignoring unknown capability `{key}`"),
            }
        }
    }

    pub fn missing_required(&self) -> Vec<Capability> {
        Capability::REQUIRED
            .iter()
            .copied()
            .filter(|cap| !self.is_available(*cap))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_available_by_default() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_available(Capability::QrCode));
        assert!(registry.is_available(Capability::GifEncoder));
        assert!(!registry.is_available(Capability::WebpEncoder));
        assert!(registry.missing_required().is_empty());
    }

    #[test]
    fn host_report_overrides_defaults() {
        let mut registry = CapabilityRegistry::new();
        let report = HashMap::from([
            ("qr_code".to_string(), false),
            ("webp_encoder".to_string(), true),
            ("something_else".to_string(), false),
        ]);
        registry.apply_report(&report);
        assert!(!registry.is_available(Capability::QrCode));
        assert!(registry.is_available(Capability::WebpEncoder));
        assert_eq!(registry.missing_required(), vec![Capability::QrCode]);
    }

    #[test]
    fn later_report_wins() {
        let mut registry = CapabilityRegistry::new();
        registry.set(Capability::QrCode, false);
        registry.set(Capability::QrCode, true);
        assert!(registry.is_available(Capability::QrCode));
    }
}
