use crate::error::ToolError;
use crate::features::capabilities::{Capability, CapabilityRegistry};
use crate::state::{field_ids, AppState, Effect};
use crate::ui::{
    to_value_or_text, Button as UiButton, Column as UiColumn, ImageBase64 as UiImage,
    Row as UiRow, Section as UiSection, Select as UiSelect, Text as UiText,
    TextInput as UiTextInput,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use rust_i18n::t;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_QUALITY: u8 = 92;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTarget {
    Jpeg,
    Png,
    Webp,
}

impl ImageTarget {
    pub const ALL: [ImageTarget; 3] = [ImageTarget::Jpeg, ImageTarget::Png, ImageTarget::Webp];

    pub fn id(self) -> &'static str {
        match self {
            ImageTarget::Jpeg => "jpeg",
            ImageTarget::Png => "png",
            ImageTarget::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageTarget::Jpeg => "image/jpeg",
            ImageTarget::Png => "image/png",
            ImageTarget::Webp => "image/webp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageTarget::Jpeg => "JPEG",
            ImageTarget::Png => "PNG",
            ImageTarget::Webp => "WebP",
        }
    }
}

/// Unknown or empty values fall back to PNG.
pub fn parse_image_target(raw: &str) -> ImageTarget {
    match raw.trim().to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => ImageTarget::Jpeg,
        "webp" => ImageTarget::Webp,
        _ => ImageTarget::Png,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedImage {
    pub target: ImageTarget,
    pub base64: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Host answer for a delegated conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageConversionResult {
    pub ok: bool,
    pub data: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageToolState {
    pub file_name: Option<String>,
    pub data: Option<String>,
    pub format: String,
    pub quality: u8,
    pub result: Option<ConvertedImage>,
    pub awaiting: Option<ImageTarget>,
}

impl Default for ImageToolState {
    fn default() -> Self {
        Self {
            file_name: None,
            data: None,
            format: ImageTarget::Png.id().into(),
            quality: DEFAULT_QUALITY,
            result: None,
            awaiting: None,
        }
    }
}

impl ImageToolState {
    /// A different file name invalidates the bytes held for the old one.
    pub fn set_file_name(&mut self, raw: &str) {
        let name = raw.trim();
        if name.is_empty() {
            self.file_name = None;
            self.data = None;
        } else if self.file_name.as_deref() != Some(name) {
            self.file_name = Some(name.to_string());
            self.data = None;
        }
    }

    pub fn set_quality(&mut self, raw: &str) {
        self.quality = raw
            .trim()
            .parse::<u32>()
            .map(|q| q.clamp(1, 100) as u8)
            .unwrap_or(DEFAULT_QUALITY);
    }

    pub fn target(&self) -> ImageTarget {
        parse_image_target(&self.format)
    }
}

/// Re-encodes `bytes` in-core. WebP has no in-core encoder and is rejected
/// here; callers route it to the host instead.
pub fn convert_image(bytes: &[u8], target: ImageTarget, quality: u8) -> Result<ConvertedImage, ToolError> {
    let img = image::load_from_memory(bytes).map_err(|e| ToolError::parse(format!("unreadable image: {e}")))?;
    let (width, height) = (img.width(), img.height());
    let mut buf = Vec::new();
    match target {
        ImageTarget::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new(&mut buf)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(ToolError::delegate)?;
        }
        ImageTarget::Jpeg => {
            // JPEG has no alpha channel; transparent pixels keep their color.
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(ToolError::delegate)?;
        }
        ImageTarget::Webp => return Err(ToolError::CapabilityMissing(Capability::WebpEncoder)),
    }
    Ok(ConvertedImage {
        target,
        base64: STANDARD.encode(buf),
        width: Some(width),
        height: Some(height),
    })
}

fn fail(state: &mut AppState, err: ToolError) -> Result<(), ToolError> {
    state.image.result = None;
    let reason = err.to_string();
    state.notify_error(t!("image.failed", error = reason));
    Err(err)
}

pub fn handle_convert(state: &mut AppState, capabilities: &CapabilityRegistry) -> Result<(), ToolError> {
    // A host result still outstanding from an earlier WebP request is stale now.
    if state.image.awaiting.take().is_some() {
        log::debug!("superseding pending image conversion");
    }
    let Some(data) = state.image.data.clone().filter(|d| !d.trim().is_empty()) else {
        state.notify_error(t!("image.empty"));
        return Err(ToolError::EmptyInput(field_ids::IMAGE_INPUT));
    };
    let target = state.image.target();
    let quality = state.image.quality;

    if target == ImageTarget::Webp {
        if !capabilities.is_available(Capability::WebpEncoder) {
            return fail(state, ToolError::CapabilityMissing(Capability::WebpEncoder));
        }
        state.image.awaiting = Some(target);
        state.push_effect(Effect::ConvertImage {
            format: target.id().into(),
            mime: target.mime().into(),
            quality,
            base64: data,
        });
        return Ok(());
    }

    let bytes = match STANDARD.decode(data.trim().as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => return fail(state, ToolError::parse(format!("invalid image data: {e}"))),
    };
    match convert_image(&bytes, target, quality) {
        Ok(converted) => {
            log::debug!(
                "converted {} to {} ({} bytes base64)",
                state.image.file_name.as_deref().unwrap_or("image"),
                target.id(),
                converted.base64.len()
            );
            state.image.result = Some(converted);
            state.notify_success(t!("image.converted"));
            Ok(())
        }
        Err(err) => fail(state, err),
    }
}

pub fn handle_result(state: &mut AppState, result: ImageConversionResult) -> Result<(), ToolError> {
    let Some(target) = state.image.awaiting.take() else {
        log::debug!("ignoring image result with no conversion pending");
        return Ok(());
    };
    match (result.ok, result.data) {
        (true, Some(data)) if !data.is_empty() => {
            state.image.result = Some(ConvertedImage {
                target,
                base64: data,
                width: None,
                height: None,
            });
            state.notify_success(t!("image.converted"));
            Ok(())
        }
        _ => {
            let reason = result.error.unwrap_or_else(|| "conversion_failed".into());
            fail(state, ToolError::Delegate(reason))
        }
    }
}

pub fn handle_download(state: &mut AppState) -> Result<(), ToolError> {
    let Some(result) = state.image.result.clone() else {
        state.notify_error(t!("image.convert_first"));
        return Err(ToolError::EmptyInput(field_ids::IMAGE_PREVIEW));
    };
    state.push_effect(Effect::Download {
        filename: format!("converted_image.{}", result.target.id()),
        mime: result.target.mime().into(),
        base64: result.base64,
    });
    state.notify_success(t!("image.downloaded"));
    Ok(())
}

pub fn handle_clear(state: &mut AppState) {
    let format = std::mem::take(&mut state.image.format);
    let quality = state.image.quality;
    state.image = ImageToolState {
        format,
        quality,
        ..ImageToolState::default()
    };
    state.notify_success(t!("image.cleared"));
}

pub fn render_image_panel(state: &AppState) -> Value {
    let title = t!("image.title");
    let convert = t!("image.convert");
    let quality_label = t!("image.quality", value = state.image.quality);
    let download = t!("common.download");
    let clear = t!("common.clear");
    let file_name = state.image.file_name.clone().unwrap_or_default();
    let quality = state.image.quality.to_string();
    let options: Vec<(&str, &str)> = ImageTarget::ALL.iter().map(|t| (t.id(), t.label())).collect();
    let selected = state.image.target().id();

    let mut preview = Vec::new();
    if let Some(result) = &state.image.result {
        let mut img = UiImage::new(result.target.mime(), &result.base64).content_description("converted_image");
        if let (Some(w), Some(h)) = (result.width, result.height) {
            img = img.dimensions(w, h);
        }
        preview.push(to_value_or_text(img, "image_preview_img"));
    } else if state.image.awaiting.is_some() {
        let pending = t!("image.converting");
        preview.push(to_value_or_text(UiText::new(&pending).size(14.0), "image_pending"));
    }

    let children = vec![
        to_value_or_text(
            UiTextInput::new(field_ids::IMAGE_INPUT, &file_name).input_type("file"),
            "image_input",
        ),
        to_value_or_text(UiSelect::new(field_ids::IMAGE_FORMAT, selected, &options), "image_format"),
        to_value_or_text(UiText::new(&quality_label).size(12.0), "image_quality_label"),
        to_value_or_text(
            UiTextInput::new(field_ids::IMAGE_QUALITY, &quality).input_type("range"),
            "image_quality",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(UiButton::new(&convert, "image_convert"), "image_convert"),
                to_value_or_text(UiButton::new(&clear, "image_clear"), "image_clear"),
            ]),
            "image_buttons",
        ),
        to_value_or_text(UiColumn::new(preview).id(field_ids::IMAGE_PREVIEW), "image_preview"),
        to_value_or_text(
            UiButton::new(&download, "image_download").download(state.image.result.is_some()),
            "image_download",
        ),
    ];
    to_value_or_text(
        UiSection::new("image-converter", &title, children).icon("🖼️"),
        "image_panel",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(4, 3, |x, _| Rgba([x as u8 * 60, 10, 200, 255]));
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), 4, 3, ColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn targets_parse_with_png_default() {
        assert_eq!(parse_image_target("JPG"), ImageTarget::Jpeg);
        assert_eq!(parse_image_target("webp"), ImageTarget::Webp);
        assert_eq!(parse_image_target("tiff"), ImageTarget::Png);
        assert_eq!(parse_image_target(""), ImageTarget::Png);
    }

    #[test]
    fn png_converts_to_jpeg() {
        let converted = convert_image(&sample_png(), ImageTarget::Jpeg, 80).unwrap();
        let bytes = STANDARD.decode(converted.base64).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!((converted.width, converted.height), (Some(4), Some(3)));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = convert_image(b"not an image", ImageTarget::Png, 92).unwrap_err();
        assert!(matches!(err, ToolError::Parse(_)));
    }

    #[test]
    fn quality_is_clamped() {
        let mut state = ImageToolState::default();
        state.set_quality("250");
        assert_eq!(state.quality, 100);
        state.set_quality("0");
        assert_eq!(state.quality, 1);
        state.set_quality("abc");
        assert_eq!(state.quality, DEFAULT_QUALITY);
    }

    #[test]
    fn webp_without_encoder_fails_with_capability_message() {
        let mut state = AppState::new();
        state.image.data = Some(STANDARD.encode(sample_png()));
        state.image.format = "webp".into();
        let caps = state.capabilities.clone();
        let err = handle_convert(&mut state, &caps).unwrap_err();
        assert_eq!(err, ToolError::CapabilityMissing(Capability::WebpEncoder));
        assert!(state.take_effects().iter().all(|e| !matches!(e, Effect::ConvertImage { .. })));
    }

    #[test]
    fn webp_is_delegated_when_host_can_encode() {
        let mut state = AppState::new();
        state.capabilities.set(Capability::WebpEncoder, true);
        state.image.data = Some("AAAA".into());
        state.image.format = "webp".into();
        let caps = state.capabilities.clone();
        handle_convert(&mut state, &caps).unwrap();
        assert!(state
            .take_effects()
            .iter()
            .any(|e| matches!(e, Effect::ConvertImage { format, .. } if format == "webp")));

        handle_result(
            &mut state,
            ImageConversionResult {
                ok: true,
                data: Some("UklGRg==".into()),
                error: None,
            },
        )
        .unwrap();
        assert_eq!(state.image.result.as_ref().unwrap().target, ImageTarget::Webp);
    }

    #[test]
    fn late_webp_result_does_not_replace_newer_conversion() {
        let mut state = AppState::new();
        state.capabilities.set(Capability::WebpEncoder, true);
        state.image.data = Some(STANDARD.encode(sample_png()));
        state.image.format = "webp".into();
        let caps = state.capabilities.clone();
        handle_convert(&mut state, &caps).unwrap();

        state.image.format = "jpeg".into();
        handle_convert(&mut state, &caps).unwrap();
        assert_eq!(state.image.result.as_ref().unwrap().target, ImageTarget::Jpeg);

        handle_result(
            &mut state,
            ImageConversionResult {
                ok: true,
                data: Some("UklGRg==".into()),
                error: None,
            },
        )
        .unwrap();
        assert_eq!(state.image.result.as_ref().unwrap().target, ImageTarget::Jpeg);
    }

    #[test]
    fn new_file_name_drops_old_bytes() {
        let mut state = ImageToolState::default();
        state.set_file_name("a.png");
        state.data = Some("AAAA".into());
        state.set_file_name("a.png");
        assert!(state.data.is_some());
        state.set_file_name("b.png");
        assert!(state.data.is_none());
    }
}
