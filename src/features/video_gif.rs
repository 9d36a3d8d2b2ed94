use crate::error::ToolError;
use crate::features::capabilities::Capability;
use crate::state::{field_ids, AppState, Effect};
use crate::ui::{
    to_value_or_text, Button as UiButton, Column as UiColumn, ImageBase64 as UiImage,
    Progress as UiProgress, Row as UiRow, Section as UiSection, Text as UiText,
    TextInput as UiTextInput,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use rust_i18n::t;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pause the host takes between seeking and grabbing a frame.
pub const CAPTURE_DELAY_MS: u64 = 50;

const WIDTH_RANGE: (u32, u32, u32) = (16, 1024, 320);
const FPS_RANGE: (u32, u32, u32) = (1, 30, 10);
const DURATION_RANGE: (u32, u32, u32) = (1, 30, 3);

fn clamp_or_default(value: Option<u32>, (min, max, default): (u32, u32, u32)) -> u32 {
    value.map(|v| v.clamp(min, max)).unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifSettings {
    pub width: u32,
    pub fps: u32,
    pub duration_s: u32,
}

impl GifSettings {
    pub fn from_fields(width: Option<u32>, fps: Option<u32>, duration_s: Option<u32>) -> Self {
        Self {
            width: clamp_or_default(width, WIDTH_RANGE),
            fps: clamp_or_default(fps, FPS_RANGE),
            duration_s: clamp_or_default(duration_s, DURATION_RANGE),
        }
    }
}

/// Shared stop flag for a conversion. Clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output geometry and frame count for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frame_count: u32,
}

impl FramePlan {
    /// Height keeps the video aspect ratio. The clip is cut at whichever ends
    /// first: the requested duration or the video.
    pub fn new(
        settings: GifSettings,
        video_width: u32,
        video_height: u32,
        video_duration_ms: u64,
    ) -> Result<Self, ToolError> {
        if video_width == 0 || video_height == 0 {
            return Err(ToolError::parse("video has no dimensions"));
        }
        let height = ((settings.width as f64 * video_height as f64 / video_width as f64).round() as u32).max(1);
        let fps = settings.fps as f64;
        let requested = settings.duration_s as f64 * fps;
        let available = video_duration_ms as f64 / 1000.0 * fps;
        let frame_count = requested.min(available).ceil() as u32;
        if frame_count == 0 {
            return Err(ToolError::parse("video is empty"));
        }
        Ok(Self {
            width: settings.width,
            height,
            fps: settings.fps,
            frame_count,
        })
    }

    pub fn time_ms(&self, index: u32) -> u64 {
        (index as f64 * 1000.0 / self.fps as f64).round() as u64
    }

    pub fn frame_delay(&self) -> Delay {
        Delay::from_numer_denom_ms(1000, self.fps)
    }

    pub fn schedule(&self, token: CancellationToken) -> FrameSchedule {
        FrameSchedule {
            plan: *self,
            next: 0,
            token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub index: u32,
    pub time_ms: u64,
}

/// Capture points in order. Stops early once the token is cancelled.
#[derive(Debug, Clone)]
pub struct FrameSchedule {
    plan: FramePlan,
    next: u32,
    token: CancellationToken,
}

impl Iterator for FrameSchedule {
    type Item = FrameRequest;

    fn next(&mut self) -> Option<FrameRequest> {
        if self.token.is_cancelled() || self.next >= self.plan.frame_count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(FrameRequest {
            index,
            time_ms: self.plan.time_ms(index),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GifSession {
    pub id: u64,
    pub settings: GifSettings,
    pub token: CancellationToken,
    pub plan: Option<FramePlan>,
    schedule: Option<FrameSchedule>,
    awaiting: Option<u32>,
    frames: Vec<RgbaImage>,
}

impl GifSession {
    fn new(id: u64, settings: GifSettings) -> Self {
        Self {
            id,
            settings,
            token: CancellationToken::new(),
            plan: None,
            schedule: None,
            awaiting: None,
            frames: Vec::new(),
        }
    }

    pub fn captured(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifResult {
    pub base64: String,
    pub width: u32,
    pub height: u32,
    pub frames: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GifToolState {
    pub video_name: Option<String>,
    pub width: Option<u32>,
    pub fps: Option<u32>,
    pub duration_s: Option<u32>,
    pub session: Option<GifSession>,
    pub result: Option<GifResult>,
    next_session_id: u64,
}

impl GifToolState {
    pub fn set_video_name(&mut self, raw: &str) {
        let name = raw.trim();
        self.video_name = (!name.is_empty()).then(|| name.to_string());
    }

    fn cancel_session(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.token.cancel();
                true
            }
            None => false,
        }
    }

    /// The running session, if `id` names it and it was not cancelled.
    fn live_session(&mut self, id: u64) -> Option<&mut GifSession> {
        self.session
            .as_mut()
            .filter(|s| s.id == id && !s.token.is_cancelled())
    }
}

pub fn encode_gif(frames: Vec<RgbaImage>, delay: Delay) -> Result<Vec<u8>, ToolError> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite).map_err(ToolError::delegate)?;
        encoder
            .encode_frames(frames.into_iter().map(|img| Frame::from_parts(img, 0, 0, delay)))
            .map_err(ToolError::delegate)?;
    }
    Ok(buf)
}

fn fail_session(state: &mut AppState, err: ToolError) -> Result<(), ToolError> {
    state.gif.cancel_session();
    let reason = err.to_string();
    state.notify_error(t!("gif.failed", error = reason));
    Err(err)
}

fn request_frame(state: &mut AppState, session: u64, request: FrameRequest, plan: FramePlan) {
    state.push_effect(Effect::CaptureFrame {
        session,
        index: request.index,
        time_ms: request.time_ms,
        width: plan.width,
        height: plan.height,
        delay_ms: CAPTURE_DELAY_MS,
    });
}

/// Starts a new conversion. A running one is cancelled first.
pub fn handle_convert(state: &mut AppState) -> Result<(), ToolError> {
    if state.gif.video_name.is_none() {
        state.notify_error(t!("gif.empty"));
        return Err(ToolError::EmptyInput(field_ids::VIDEO_INPUT));
    }
    if state.gif.cancel_session() {
        log::info!("superseding running gif conversion");
    }
    let settings = GifSettings::from_fields(state.gif.width, state.gif.fps, state.gif.duration_s);
    state.gif.next_session_id += 1;
    let id = state.gif.next_session_id;
    state.gif.session = Some(GifSession::new(id, settings));
    state.gif.result = None;
    state.push_effect(Effect::LoadVideo { session: id });
    Ok(())
}

/// Host reply to `LoadVideo` with the decoded video's metadata.
pub fn handle_video_meta(
    state: &mut AppState,
    session: u64,
    video_width: u32,
    video_height: u32,
    duration_ms: u64,
) -> Result<(), ToolError> {
    if state.gif.live_session(session).is_none() {
        log::debug!("dropping metadata for stale gif session {session}");
        return Ok(());
    }
    if !state.capabilities.is_available(Capability::GifEncoder) {
        state.gif.cancel_session();
        state.notify_error(t!("gif.library_missing"));
        return Err(ToolError::CapabilityMissing(Capability::GifEncoder));
    }
    let Some(live) = state.gif.live_session(session) else {
        return Ok(());
    };
    let plan = match FramePlan::new(live.settings, video_width, video_height, duration_ms) {
        Ok(plan) => plan,
        Err(err) => return fail_session(state, err),
    };
    let mut schedule = plan.schedule(live.token.clone());
    let first = schedule.next();
    live.plan = Some(plan);
    live.schedule = Some(schedule);
    live.awaiting = first.map(|r| r.index);
    log::info!(
        "gif session {session}: {} frames at {}x{}",
        plan.frame_count,
        plan.width,
        plan.height
    );
    if let Some(request) = first {
        request_frame(state, session, request, plan);
    }
    Ok(())
}

/// One captured frame as raw RGBA at the planned size.
pub fn handle_frame(state: &mut AppState, session: u64, index: u32, data: &str) -> Result<(), ToolError> {
    let Some(live) = state.gif.live_session(session) else {
        log::debug!("dropping frame {index} of stale gif session {session}");
        return Ok(());
    };
    let (Some(plan), Some(expected)) = (live.plan, live.awaiting) else {
        log::debug!("dropping unexpected frame {index} of gif session {session}");
        return Ok(());
    };
    if index != expected {
        log::debug!("dropping out-of-order frame {index}, waiting for {expected}");
        return Ok(());
    }

    let pixels = match STANDARD.decode(data.trim().as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => return fail_session(state, ToolError::parse(format!("invalid frame data: {e}"))),
    };
    let expected_len = plan.width as u64 * plan.height as u64 * 4;
    let frame = match RgbaImage::from_raw(plan.width, plan.height, pixels) {
        Some(frame) if frame.as_raw().len() as u64 == expected_len => frame,
        _ => {
            return fail_session(
                state,
                ToolError::parse(format!("frame {index} is not {}x{} RGBA", plan.width, plan.height)),
            )
        }
    };
    live.frames.push(frame);

    let next = live.schedule.as_mut().and_then(Iterator::next);
    live.awaiting = next.map(|r| r.index);
    if let Some(request) = next {
        request_frame(state, session, request, plan);
        return Ok(());
    }

    let Some(done) = state.gif.session.take() else {
        return Ok(());
    };
    let count = done.frames.len() as u32;
    match encode_gif(done.frames, plan.frame_delay()) {
        Ok(bytes) => {
            state.gif.result = Some(GifResult {
                base64: STANDARD.encode(bytes),
                width: plan.width,
                height: plan.height,
                frames: count,
            });
            state.notify_success(t!("gif.generated"));
            Ok(())
        }
        Err(err) => fail_session(state, err),
    }
}

pub fn handle_cancel(state: &mut AppState) {
    if state.gif.cancel_session() {
        state.notify_warning(t!("gif.cancelled"));
    }
}

pub fn handle_download(state: &mut AppState) -> Result<(), ToolError> {
    let Some(result) = state.gif.result.as_ref() else {
        state.notify_error(t!("gif.generate_first"));
        return Err(ToolError::EmptyInput(field_ids::VIDEO_PREVIEW));
    };
    let effect = Effect::Download {
        filename: "video.gif".into(),
        mime: "image/gif".into(),
        base64: result.base64.clone(),
    };
    state.push_effect(effect);
    state.notify_success(t!("gif.downloaded"));
    Ok(())
}

pub fn handle_clear(state: &mut AppState) {
    state.gif.cancel_session();
    state.gif.video_name = None;
    state.gif.result = None;
    state.notify_success(t!("gif.cleared"));
}

pub fn render_gif_panel(state: &AppState) -> Value {
    let title = t!("gif.title");
    let convert = t!("gif.convert");
    let cancel = t!("gif.cancel");
    let download = t!("common.download");
    let clear = t!("common.clear");
    let video_name = state.gif.video_name.clone().unwrap_or_default();
    let width = state.gif.width.map(|v| v.to_string()).unwrap_or_default();
    let fps = state.gif.fps.map(|v| v.to_string()).unwrap_or_default();
    let duration = state.gif.duration_s.map(|v| v.to_string()).unwrap_or_default();
    let width_hint = t!("gif.width_hint");
    let fps_hint = t!("gif.fps_hint");
    let duration_hint = t!("gif.duration_hint");

    let mut preview = Vec::new();
    if let Some(session) = &state.gif.session {
        let label = match session.plan {
            Some(plan) => t!(
                "gif.progress",
                current = session.captured(),
                total = plan.frame_count
            ),
            None => t!("gif.loading"),
        };
        let fraction = session
            .plan
            .map(|p| session.captured() as f64 / p.frame_count as f64)
            .unwrap_or(0.0);
        preview.push(to_value_or_text(
            UiProgress::new().text(&label).fraction(fraction),
            "gif_progress",
        ));
        preview.push(to_value_or_text(UiButton::new(&cancel, "gif_cancel"), "gif_cancel"));
    } else if let Some(result) = &state.gif.result {
        let summary = t!(
            "gif.summary",
            width = result.width,
            height = result.height,
            frames = result.frames
        );
        preview.push(to_value_or_text(
            UiImage::new("image/gif", &result.base64)
                .dimensions(result.width, result.height)
                .content_description("video_gif"),
            "gif_preview",
        ));
        preview.push(to_value_or_text(UiText::new(&summary).size(12.0), "gif_summary"));
    }

    let children = vec![
        to_value_or_text(
            UiTextInput::new(field_ids::VIDEO_INPUT, &video_name).input_type("file"),
            "video_input",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiTextInput::new(field_ids::GIF_WIDTH, &width)
                        .hint(&width_hint)
                        .input_type("number"),
                    "gif_width",
                ),
                to_value_or_text(
                    UiTextInput::new(field_ids::GIF_FPS, &fps)
                        .hint(&fps_hint)
                        .input_type("number"),
                    "gif_fps",
                ),
                to_value_or_text(
                    UiTextInput::new(field_ids::GIF_DURATION, &duration)
                        .hint(&duration_hint)
                        .input_type("number"),
                    "gif_duration",
                ),
            ]),
            "gif_settings",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(UiButton::new(&convert, "gif_convert"), "gif_convert"),
                to_value_or_text(UiButton::new(&clear, "video_clear"), "video_clear"),
            ]),
            "gif_buttons",
        ),
        to_value_or_text(UiColumn::new(preview).id(field_ids::VIDEO_PREVIEW), "video_preview"),
        to_value_or_text(
            UiButton::new(&download, "gif_download").download(state.gif.result.is_some()),
            "gif_download",
        ),
    ];
    to_value_or_text(UiSection::new("video-gif", &title, children).icon("🎬"), "gif_panel")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(width: u32, fps: u32, duration_s: u32) -> GifSettings {
        GifSettings {
            width,
            fps,
            duration_s,
        }
    }

    fn solid_frame(plan: &FramePlan, shade: u8) -> String {
        let pixels: Vec<u8> = std::iter::repeat([shade, shade, shade, 255])
            .take((plan.width * plan.height) as usize)
            .flatten()
            .collect();
        STANDARD.encode(pixels)
    }

    fn captures(effects: &[Effect]) -> Vec<(u64, u32)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::CaptureFrame { session, index, .. } => Some((*session, *index)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn settings_are_clamped_with_defaults() {
        let s = GifSettings::from_fields(Some(5000), Some(0), None);
        assert_eq!(s, settings(1024, 1, 3));
        assert_eq!(GifSettings::from_fields(None, None, None), settings(320, 10, 3));
    }

    #[test]
    fn plan_keeps_aspect_and_caps_at_video_length() {
        let plan = FramePlan::new(settings(320, 10, 3), 1920, 1080, 10_000).unwrap();
        assert_eq!((plan.width, plan.height), (320, 180));
        assert_eq!(plan.frame_count, 30);

        let short = FramePlan::new(settings(320, 10, 3), 640, 480, 1_250).unwrap();
        assert_eq!(short.frame_count, 13);
        assert_eq!(short.time_ms(12), 1200);
    }

    #[test]
    fn plan_rejects_zero_sized_video() {
        assert!(FramePlan::new(settings(320, 10, 3), 0, 480, 1000).is_err());
        assert!(FramePlan::new(settings(320, 10, 3), 640, 480, 0).is_err());
    }

    #[test]
    fn schedule_stops_when_cancelled() {
        let plan = FramePlan::new(settings(16, 10, 1), 16, 16, 1_000).unwrap();
        let token = CancellationToken::new();
        let mut schedule = plan.schedule(token.clone());
        assert_eq!(schedule.next().map(|r| r.index), Some(0));
        assert_eq!(schedule.next().map(|r| r.time_ms), Some(100));
        token.cancel();
        assert!(schedule.next().is_none());
    }

    #[test]
    fn frames_are_collected_and_encoded() {
        let mut state = AppState::new();
        state.gif.video_name = Some("clip.mp4".into());
        state.gif.width = Some(16);
        state.gif.fps = Some(2);
        state.gif.duration_s = Some(1);

        handle_convert(&mut state).unwrap();
        let effects = state.take_effects();
        let session = match effects.first() {
            Some(Effect::LoadVideo { session }) => *session,
            other => panic!("expected LoadVideo, got {other:?}"),
        };

        handle_video_meta(&mut state, session, 32, 16, 5_000).unwrap();
        assert_eq!(captures(&state.take_effects()), vec![(session, 0)]);
        let plan = state.gif.session.as_ref().and_then(|s| s.plan).unwrap();
        assert_eq!((plan.width, plan.height, plan.frame_count), (16, 8, 2));

        handle_frame(&mut state, session, 0, &solid_frame(&plan, 0)).unwrap();
        assert_eq!(captures(&state.take_effects()), vec![(session, 1)]);
        handle_frame(&mut state, session, 1, &solid_frame(&plan, 255)).unwrap();

        let result = state.gif.result.as_ref().expect("gif result");
        assert_eq!(result.frames, 2);
        let bytes = STANDARD.decode(&result.base64).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert!(state.gif.session.is_none());
        assert_eq!(state.messages.current().unwrap().text, "GIF generated successfully!");
    }

    #[test]
    fn new_conversion_drops_frames_of_previous_session() {
        let mut state = AppState::new();
        state.gif.video_name = Some("clip.mp4".into());
        state.gif.width = Some(16);
        handle_convert(&mut state).unwrap();
        handle_video_meta(&mut state, 1, 16, 16, 1_000).unwrap();
        let plan = state.gif.session.as_ref().and_then(|s| s.plan).unwrap();

        handle_convert(&mut state).unwrap();
        state.take_effects();
        handle_frame(&mut state, 1, 0, &solid_frame(&plan, 10)).unwrap();
        let current = state.gif.session.as_ref().unwrap();
        assert_eq!(current.id, 2);
        assert_eq!(current.captured(), 0);
        assert!(captures(&state.take_effects()).is_empty());
    }

    #[test]
    fn missing_encoder_reports_library_message() {
        let mut state = AppState::new();
        state.capabilities.set(Capability::GifEncoder, false);
        state.gif.video_name = Some("clip.mp4".into());
        handle_convert(&mut state).unwrap();
        let err = handle_video_meta(&mut state, 1, 640, 480, 3_000).unwrap_err();
        assert_eq!(err, ToolError::CapabilityMissing(Capability::GifEncoder));
        assert!(state.gif.session.is_none());
        assert!(state
            .messages
            .current()
            .unwrap()
            .text
            .starts_with("GIF generation library not loaded"));
    }

    #[test]
    fn wrong_frame_size_fails_session() {
        let mut state = AppState::new();
        state.gif.video_name = Some("clip.mp4".into());
        state.gif.width = Some(16);
        handle_convert(&mut state).unwrap();
        handle_video_meta(&mut state, 1, 16, 16, 1_000).unwrap();
        assert!(handle_frame(&mut state, 1, 0, "AAAA").is_err());
        assert!(state.gif.session.is_none());
    }

    #[test]
    fn oversized_frame_fails_session_without_encoding() {
        let mut state = AppState::new();
        state.gif.video_name = Some("clip.mp4".into());
        state.gif.width = Some(16);
        state.gif.fps = Some(1);
        state.gif.duration_s = Some(1);
        handle_convert(&mut state).unwrap();
        handle_video_meta(&mut state, 1, 16, 16, 1_000).unwrap();
        let plan = state.gif.session.as_ref().and_then(|s| s.plan).unwrap();
        assert_eq!(plan.frame_count, 1);

        let padded = STANDARD.encode(vec![0u8; 16 * 16 * 4 + 4]);
        assert!(handle_frame(&mut state, 1, 0, &padded).is_err());
        assert!(state.gif.session.is_none());
        assert!(state.gif.result.is_none());
        assert!(state
            .messages
            .current()
            .unwrap()
            .text
            .contains("is not 16x16 RGBA"));
    }

    #[test]
    fn stale_metadata_leaves_live_session_alone() {
        let mut state = AppState::new();
        state.gif.video_name = Some("clip.mp4".into());
        handle_convert(&mut state).unwrap();
        handle_convert(&mut state).unwrap();
        state.capabilities.set(Capability::GifEncoder, false);

        handle_video_meta(&mut state, 1, 640, 480, 3_000).unwrap();
        let live = state.gif.session.as_ref().expect("session 2 still running");
        assert_eq!(live.id, 2);
        assert!(!live.token.is_cancelled());
    }

    #[test]
    fn download_requires_result() {
        let mut state = AppState::new();
        assert!(handle_download(&mut state).is_err());
        assert_eq!(state.messages.current().unwrap().text, "Please generate a GIF first");
    }
}
