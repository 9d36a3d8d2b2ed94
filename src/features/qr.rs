use crate::error::ToolError;
use crate::features::capabilities::{Capability, CapabilityRegistry};
use crate::state::{field_ids, AppState, Effect};
use crate::ui::{
    to_value_or_text, Button as UiButton, Card as UiCard, Column as UiColumn,
    ImageBase64 as UiImage, Row as UiRow, Section as UiSection, Text as UiText,
    TextInput as UiTextInput,
};
use base64::Engine;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use rust_i18n::t;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_DARK: &str = "#000000";
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const QUIET_ZONE: u32 = 2;
/// Pixel bounds for a requested QR image.
const MIN_QR_SIZE: u32 = 64;
const MAX_QR_SIZE: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrStage {
    AttemptPrimary,
    AttemptSecondary,
    AttemptRemoteFallback,
    Rendered,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QrLibrary {
    Primary,
    Secondary,
    RemoteFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrRenderAttempt {
    pub library: QrLibrary,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRequest {
    pub id: u64,
    pub text: String,
    pub size: u32,
    pub dark: Rgba<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQr {
    pub png: Vec<u8>,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrOutcome {
    Rendered {
        request_id: u64,
        png_base64: String,
        width: u32,
    },
    Degraded {
        request_id: u64,
        text: String,
    },
}

/// Where a chain run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Finished(QrOutcome),
    /// Parked on a remote load; `Some(url)` when this run started it.
    Waiting(Option<String>),
}

/// Ordered remote sources for the QR capability. Shared by the startup check
/// and generation requests, so at most one load is ever in flight.
#[derive(Debug, Clone, Default)]
pub struct RemoteSources {
    sources: Vec<String>,
    next: usize,
    in_flight: Option<String>,
    /// Replacement list that arrived while a load was in flight.
    pending: Option<Vec<String>>,
    announce_restore: bool,
}

impl RemoteSources {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    /// Replaces the source list. While a load is in flight the new list is
    /// held back and takes over once that load reports back.
    pub fn set_sources(&mut self, sources: Vec<String>) {
        if let Some(url) = &self.in_flight {
            if sources == self.sources {
                self.pending = None;
            } else {
                log::info!("deferring new QR sources until {url} reports back");
                self.pending = Some(sources);
            }
            return;
        }
        self.sources = sources;
        self.next = 0;
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_exhausted(&self) -> bool {
        self.in_flight.is_none() && self.next >= self.sources.len()
    }

    pub fn restart(&mut self) {
        if self.in_flight.is_none() {
            self.next = 0;
        }
    }

    /// Marks the next source as in flight and returns it.
    pub fn start_next(&mut self) -> Option<String> {
        if self.in_flight.is_some() {
            return None;
        }
        let url = self.sources.get(self.next)?.clone();
        self.next += 1;
        log::info!("loading QR library from {url}");
        self.in_flight = Some(url.clone());
        Some(url)
    }

    /// Records the host's answer for the in-flight source.
    pub fn finish(&mut self, ok: bool) -> Option<String> {
        let url = self.in_flight.take();
        match (&url, ok) {
            (Some(u), true) => log::info!("QR library loaded from {u}"),
            (Some(u), false) => log::warn!("backup source {u} failed to load"),
            (None, _) => log::debug!("load result with nothing in flight"),
        }
        if url.is_some() {
            if let Some(sources) = self.pending.take() {
                self.sources = sources;
                self.next = 0;
            }
        }
        url
    }
}

/// One generation request walking through the fallback stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrChain {
    pub request: QrRequest,
    pub stage: QrStage,
    pub attempts: Vec<QrRenderAttempt>,
}

impl QrChain {
    pub fn new(request: QrRequest, capabilities: &CapabilityRegistry) -> Self {
        let stage = if capabilities.is_available(Capability::QrCode) {
            QrStage::AttemptPrimary
        } else {
            QrStage::AttemptRemoteFallback
        };
        Self {
            request,
            stage,
            attempts: Vec::new(),
        }
    }

    fn record(&mut self, library: QrLibrary, status: AttemptStatus) {
        match self.attempts.last_mut() {
            Some(last) if last.library == library && last.status == AttemptStatus::Pending => {
                last.status = status
            }
            _ => self.attempts.push(QrRenderAttempt { library, status }),
        }
    }

    fn settle_pending(&mut self, status: AttemptStatus) {
        if let Some(last) = self.attempts.last_mut() {
            if last.status == AttemptStatus::Pending {
                last.status = status;
            }
        }
    }

    /// Runs stages until the request is rendered, degraded, or parked on a
    /// remote load.
    pub fn run(&mut self, capabilities: &CapabilityRegistry, remote: &mut RemoteSources) -> ChainStatus {
        loop {
            match self.stage {
                QrStage::AttemptPrimary => {
                    match render_primary(&self.request.text, self.request.size, self.request.dark) {
                        Ok(rendered) => {
                            self.record(QrLibrary::Primary, AttemptStatus::Success);
                            self.stage = QrStage::Rendered;
                            return ChainStatus::Finished(self.rendered(rendered));
                        }
                        Err(e) => {
                            log::debug!("primary QR renderer failed: {e}");
                            self.record(QrLibrary::Primary, AttemptStatus::Failed);
                            self.stage = QrStage::AttemptSecondary;
                        }
                    }
                }
                QrStage::AttemptSecondary => {
                    match render_secondary(&self.request.text, self.request.size, self.request.dark) {
                        Ok(rendered) => {
                            self.record(QrLibrary::Secondary, AttemptStatus::Success);
                            self.stage = QrStage::Rendered;
                            return ChainStatus::Finished(self.rendered(rendered));
                        }
                        Err(e) => {
                            log::warn!("secondary QR renderer failed: {e}");
                            self.record(QrLibrary::Secondary, AttemptStatus::Failed);
                            self.stage = QrStage::Degraded;
                        }
                    }
                }
                QrStage::AttemptRemoteFallback => {
                    if capabilities.is_available(Capability::QrCode) {
                        self.record(QrLibrary::RemoteFallback, AttemptStatus::Success);
                        self.stage = QrStage::AttemptPrimary;
                        continue;
                    }
                    if remote.is_loading() {
                        self.record(QrLibrary::RemoteFallback, AttemptStatus::Pending);
                        return ChainStatus::Waiting(None);
                    }
                    // The previous load completed without providing the library.
                    self.settle_pending(AttemptStatus::Failed);
                    match remote.start_next() {
                        Some(url) => {
                            self.record(QrLibrary::RemoteFallback, AttemptStatus::Pending);
                            return ChainStatus::Waiting(Some(url));
                        }
                        None => {
                            log::warn!("all backup sources failed to provide the QR library");
                            self.stage = QrStage::Degraded;
                        }
                    }
                }
                QrStage::Degraded => {
                    return ChainStatus::Finished(QrOutcome::Degraded {
                        request_id: self.request.id,
                        text: self.request.text.clone(),
                    });
                }
                // Running a finished chain again renders it again.
                QrStage::Rendered => self.stage = QrStage::AttemptPrimary,
            }
        }
    }

    fn rendered(&self, rendered: RenderedQr) -> QrOutcome {
        QrOutcome::Rendered {
            request_id: self.request.id,
            png_base64: base64::engine::general_purpose::STANDARD.encode(rendered.png),
            width: rendered.width,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrToolState {
    pub input: String,
    pub size: u32,
    pub color: String,
    pub result: Option<QrOutcome>,
    pub chain: Option<QrChain>,
    pub remote: RemoteSources,
    next_request_id: u64,
}

impl QrToolState {
    pub fn new(default_size: u32, sources: Vec<String>) -> Self {
        Self {
            input: String::new(),
            size: default_size,
            color: DEFAULT_DARK.into(),
            result: None,
            chain: None,
            remote: RemoteSources::new(sources),
            next_request_id: 0,
        }
    }

    fn next_request(&mut self, text: String, size: u32, dark: Rgba<u8>) -> QrRequest {
        self.next_request_id += 1;
        QrRequest {
            id: self.next_request_id,
            text,
            size,
            dark,
        }
    }

    pub fn has_rendered(&self) -> bool {
        matches!(self.result, Some(QrOutcome::Rendered { .. }))
    }
}

/// `#rgb` or `#rrggbb`; anything else is rejected.
pub fn parse_hex_color(raw: &str) -> Option<Rgba<u8>> {
    let hex = raw.trim().strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

fn encode_png(img: &RgbaImage) -> Result<RenderedQr, ToolError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(|e| ToolError::delegate(format!("qr_png_failed:{e}")))?;
    Ok(RenderedQr {
        png: buf,
        width: img.width(),
    })
}

/// High error correction with a quiet zone, scaled to roughly `size` pixels.
pub fn render_primary(text: &str, size: u32, dark: Rgba<u8>) -> Result<RenderedQr, ToolError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::H)
        .map_err(|e| ToolError::delegate(format!("qr_encode_failed:{e}")))?;
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let total = modules + 2 * QUIET_ZONE;
    let scale = (size / total.max(1)).max(1);
    let img = RgbaImage::from_fn(total * scale, total * scale, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&my);
        let idx = ((my.saturating_sub(QUIET_ZONE)) * modules + mx.saturating_sub(QUIET_ZONE)) as usize;
        if inside && matches!(colors.get(idx), Some(Color::Dark)) {
            dark
        } else {
            LIGHT
        }
    });
    encode_png(&img)
}

/// Default error correction, no margin, module-grid indexing.
pub fn render_secondary(text: &str, size: u32, dark: Rgba<u8>) -> Result<RenderedQr, ToolError> {
    let code = QrCode::new(text.as_bytes())
        .map_err(|e| ToolError::delegate(format!("qr_encode_failed:{e}")))?;
    let modules = code.width() as u32;
    let scale = (size / modules.max(1)).max(1);
    let img = RgbaImage::from_fn(modules * scale, modules * scale, |x, y| {
        if code[((x / scale) as usize, (y / scale) as usize)] == Color::Dark {
            dark
        } else {
            LIGHT
        }
    });
    encode_png(&img)
}

pub fn handle_generate(state: &mut AppState) -> Result<(), ToolError> {
    let text = state.qr.input.trim().to_string();
    if text.is_empty() {
        state.notify_error(t!("qr.empty"));
        return Err(ToolError::EmptyInput(field_ids::QR_INPUT));
    }
    let size = match state.qr.size {
        0 => state.config.qr_default_size,
        s => s,
    }
    .clamp(MIN_QR_SIZE, MAX_QR_SIZE);
    let dark = parse_hex_color(&state.qr.color)
        .or_else(|| parse_hex_color(DEFAULT_DARK))
        .unwrap_or(Rgba([0, 0, 0, 255]));

    // A new request supersedes whatever was shown or pending.
    state.qr.result = None;
    if state.qr.remote.is_exhausted() {
        state.qr.remote.restart();
    }
    let request = state.qr.next_request(text, size, dark);
    let chain = QrChain::new(request, &state.capabilities);
    state.qr.chain = Some(chain);
    drive_chain(state);
    Ok(())
}

fn drive_chain(state: &mut AppState) {
    let Some(mut chain) = state.qr.chain.take() else {
        return;
    };
    match chain.run(&state.capabilities, &mut state.qr.remote) {
        ChainStatus::Waiting(started) => {
            if let Some(url) = started {
                state.push_effect(Effect::LoadScript {
                    url,
                    capability: Capability::QrCode,
                });
            }
            state.qr.chain = Some(chain);
        }
        ChainStatus::Finished(outcome) => finish_chain(state, outcome),
    }
}

fn finish_chain(state: &mut AppState, outcome: QrOutcome) {
    match &outcome {
        QrOutcome::Rendered { .. } => state.notify_success(t!("qr.generated")),
        QrOutcome::Degraded { .. } => state.notify_warning(t!("qr.degraded")),
    }
    state.qr.result = Some(outcome);
}

/// Starts the background load when the capability is missing at startup.
pub fn start_background_load(state: &mut AppState) {
    log::info!("attempting to load QR code library from backup sources");
    state.qr.remote.restart();
    state.qr.remote.announce_restore = true;
    if let Some(url) = state.qr.remote.start_next() {
        state.push_effect(Effect::LoadScript {
            url,
            capability: Capability::QrCode,
        });
    }
}

/// Host answer for a `LoadScript` effect.
pub fn handle_capability_loaded(state: &mut AppState, ok: bool) {
    if state.qr.remote.finish(ok).is_none() {
        return;
    }
    if ok {
        state.capabilities.set(Capability::QrCode, true);
        if std::mem::take(&mut state.qr.remote.announce_restore) {
            state.notify_success(t!("qr.restored"));
        }
        drive_chain(state);
        return;
    }

    if state.qr.chain.is_some() {
        drive_chain(state);
    } else if let Some(url) = state.qr.remote.start_next() {
        state.push_effect(Effect::LoadScript {
            url,
            capability: Capability::QrCode,
        });
    } else {
        state.qr.remote.announce_restore = false;
        log::warn!("all backup CDNs failed to load the QR code library");
    }
}

pub fn handle_download(state: &mut AppState) -> Result<(), ToolError> {
    match &state.qr.result {
        Some(QrOutcome::Rendered { png_base64, .. }) => {
            let effect = Effect::Download {
                filename: "qrcode.png".into(),
                mime: "image/png".into(),
                base64: png_base64.clone(),
            };
            state.push_effect(effect);
            state.notify_success(t!("qr.downloaded"));
            Ok(())
        }
        _ => {
            state.notify_error(t!("qr.download_first"));
            Err(ToolError::EmptyInput(field_ids::QR_CANVAS))
        }
    }
}

pub fn handle_clear(state: &mut AppState) {
    state.qr.result = None;
    state.qr.chain = None;
    state.qr.input.clear();
    state.notify_success(t!("qr.cleared"));
}

fn render_canvas(state: &AppState) -> Value {
    let mut canvas: Vec<Value> = Vec::new();
    match &state.qr.result {
        Some(QrOutcome::Rendered {
            png_base64, width, ..
        }) => {
            canvas.push(to_value_or_text(
                UiImage::new("image/png", png_base64)
                    .dimensions(*width, *width)
                    .content_description("qr_code"),
                "qr_image",
            ));
        }
        Some(QrOutcome::Degraded { text, .. }) => {
            let title = t!("qr.placeholder_title");
            let tip = t!("qr.placeholder_tip");
            let card = UiCard::new(vec![
                to_value_or_text(UiText::new("📱").size(48.0), "qr_icon"),
                to_value_or_text(UiText::new(&title).size(16.0), "qr_title"),
                to_value_or_text(
                    UiText::new(text).monospace(true).content_description("qr_content"),
                    "qr_content",
                ),
                to_value_or_text(UiText::new(&tip).size(12.0), "qr_tip"),
            ])
            .style("dashed");
            canvas.push(to_value_or_text(card, "qr_placeholder"));
        }
        None if state.qr.chain.is_some() => {
            let pending = t!("qr.generating");
            canvas.push(to_value_or_text(UiText::new(&pending).size(14.0), "qr_pending"));
        }
        None => {}
    }
    to_value_or_text(UiColumn::new(canvas).id(field_ids::QR_CANVAS), "qr_canvas")
}

pub fn render_qr_panel(state: &AppState) -> Value {
    let title = t!("qr.title");
    let hint = t!("qr.input_hint");
    let generate = t!("qr.generate");
    let clear = t!("common.clear");
    let download = t!("common.download");
    let size = state.qr.size.to_string();

    let children = vec![
        to_value_or_text(
            UiTextInput::new(field_ids::QR_INPUT, &state.qr.input)
                .hint(&hint)
                .action_on_submit("qr_generate"),
            "qr_input",
        ),
        to_value_or_text(
            UiTextInput::new(field_ids::QR_SIZE, &size).input_type("number"),
            "qr_size",
        ),
        to_value_or_text(
            UiTextInput::new(field_ids::QR_COLOR, &state.qr.color).input_type("color"),
            "qr_color",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiButton::new(&generate, "qr_generate").shortcut("Ctrl+Shift+Q"),
                    "qr_generate",
                ),
                to_value_or_text(UiButton::new(&clear, "qr_clear"), "qr_clear"),
            ]),
            "qr_buttons",
        ),
        render_canvas(state),
        to_value_or_text(
            UiButton::new(&download, "qr_download").download(state.qr.has_rendered()),
            "qr_download",
        ),
    ];
    to_value_or_text(
        UiSection::new("qr-generator", &title, children).icon("📱"),
        "qr_panel",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn sources() -> Vec<String> {
        vec!["https://a/qr.js".into(), "https://b/qr.js".into()]
    }

    fn request(text: &str) -> QrRequest {
        QrRequest {
            id: 1,
            text: text.into(),
            size: 256,
            dark: BLACK,
        }
    }

    #[test]
    fn primary_renders_png_with_quiet_zone() {
        let rendered = render_primary("hello", 256, BLACK).expect("qr should render");
        assert_eq!(&rendered.png[1..4], b"PNG");
        let img = image::load_from_memory(&rendered.png).unwrap().to_rgba8();
        assert_eq!(img.width(), rendered.width);
        // Top-left corner sits in the quiet zone.
        assert_eq!(*img.get_pixel(0, 0), LIGHT);
    }

    #[test]
    fn secondary_starts_with_finder_pattern() {
        let dark = parse_hex_color("#ff0000").unwrap();
        let rendered = render_secondary("hello", 100, dark).unwrap();
        let img = image::load_from_memory(&rendered.png).unwrap().to_rgba8();
        assert_eq!(*img.get_pixel(0, 0), dark);
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#000"), Some(BLACK));
        assert_eq!(parse_hex_color("#1a2B3c"), Some(Rgba([0x1a, 0x2b, 0x3c, 255])));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn oversized_for_level_h_falls_back_to_secondary() {
        let caps = CapabilityRegistry::new();
        let mut remote = RemoteSources::new(sources());
        let mut chain = QrChain::new(request(&"a".repeat(1500)), &caps);
        let status = chain.run(&caps, &mut remote);
        assert!(matches!(status, ChainStatus::Finished(QrOutcome::Rendered { .. })));
        assert_eq!(
            chain.attempts,
            vec![
                QrRenderAttempt { library: QrLibrary::Primary, status: AttemptStatus::Failed },
                QrRenderAttempt { library: QrLibrary::Secondary, status: AttemptStatus::Success },
            ]
        );
    }

    #[test]
    fn too_long_for_any_renderer_degrades_with_capability_present() {
        let caps = CapabilityRegistry::new();
        let mut remote = RemoteSources::new(sources());
        let text = "a".repeat(3000);
        let mut chain = QrChain::new(request(&text), &caps);
        match chain.run(&caps, &mut remote) {
            ChainStatus::Finished(QrOutcome::Degraded { text: shown, .. }) => assert_eq!(shown, text),
            other => panic!("expected degraded, got {other:?}"),
        }
        assert!(!remote.is_loading(), "no remote load when the capability is present");
    }

    #[test]
    fn missing_capability_walks_sources_in_order() {
        let mut caps = CapabilityRegistry::new();
        caps.set(Capability::QrCode, false);
        let mut remote = RemoteSources::new(sources());
        let mut chain = QrChain::new(request("hi"), &caps);

        assert_eq!(chain.run(&caps, &mut remote), ChainStatus::Waiting(Some("https://a/qr.js".into())));
        // Still in flight: a second run must not start another load.
        assert_eq!(chain.run(&caps, &mut remote), ChainStatus::Waiting(None));

        remote.finish(false);
        assert_eq!(chain.run(&caps, &mut remote), ChainStatus::Waiting(Some("https://b/qr.js".into())));

        remote.finish(false);
        assert!(matches!(
            chain.run(&caps, &mut remote),
            ChainStatus::Finished(QrOutcome::Degraded { .. })
        ));
        assert_eq!(chain.stage, QrStage::Degraded);
        assert_eq!(chain.attempts.len(), 2);
        assert!(chain
            .attempts
            .iter()
            .all(|a| a.library == QrLibrary::RemoteFallback && a.status == AttemptStatus::Failed));
    }

    #[test]
    fn remote_success_reenters_primary() {
        let mut caps = CapabilityRegistry::new();
        caps.set(Capability::QrCode, false);
        let mut remote = RemoteSources::new(sources());
        let mut chain = QrChain::new(request("hi"), &caps);
        chain.run(&caps, &mut remote);

        remote.finish(true);
        caps.set(Capability::QrCode, true);
        assert!(matches!(
            chain.run(&caps, &mut remote),
            ChainStatus::Finished(QrOutcome::Rendered { request_id: 1, .. })
        ));
        assert_eq!(chain.attempts[0].library, QrLibrary::RemoteFallback);
        assert_eq!(chain.attempts[0].status, AttemptStatus::Success);
    }

    #[test]
    fn exhausted_sources_restart_from_top() {
        let mut remote = RemoteSources::new(sources());
        remote.start_next();
        remote.finish(false);
        remote.start_next();
        remote.finish(false);
        assert!(remote.is_exhausted());
        remote.restart();
        assert_eq!(remote.start_next().as_deref(), Some("https://a/qr.js"));
    }

    #[test]
    fn new_sources_wait_for_in_flight_load() {
        let mut remote = RemoteSources::new(sources());
        assert_eq!(remote.start_next().as_deref(), Some("https://a/qr.js"));
        remote.set_sources(vec!["https://c/qr.js".into()]);
        assert!(remote.is_loading());

        remote.finish(false);
        assert_eq!(remote.start_next().as_deref(), Some("https://c/qr.js"));
        remote.finish(false);
        assert!(remote.is_exhausted());
    }
}
