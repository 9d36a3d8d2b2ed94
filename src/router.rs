use crate::config::Config;
use crate::error::ToolError;
use crate::features::capabilities::Capability;
use crate::features::clipboard::{handle_copy, handle_copy_result};
use crate::features::code_tools::{handle_code_action, handle_code_clear, render_code_panel, CodeAction};
use crate::features::image_convert::{self, render_image_panel, ImageConversionResult};
use crate::features::qr::{self, render_qr_panel};
use crate::features::regex_tester::{handle_regex_clear, handle_regex_test, render_regex_panel};
use crate::features::shortcuts::{shortcut_action, KeyPress};
use crate::features::storage::default_backend;
use crate::features::text_tools::{
    handle_base64_action, handle_base64_clear, handle_json_action, handle_json_clear,
    render_base64_panel, render_json_panel, Base64Action, JsonAction,
};
use crate::features::video_gif::{self, render_gif_panel};
use crate::features::{feature_catalog, render_menu};
use crate::i18n;
use crate::state::{AppState, Effect};
use crate::ui::{to_value_or_text, Column as UiColumn, Message as UiMessage};
use rust_i18n::t;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// One host event. Only `action` is required; each action reads the fields
/// it needs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Command {
    action: String,
    bindings: Option<HashMap<String, String>>,
    now_ms: Option<u64>,
    config: Option<Config>,
    capabilities: Option<HashMap<String, bool>>,
    ok: Option<bool>,
    error: Option<String>,
    data: Option<String>,
    session: Option<u64>,
    index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    duration_ms: Option<u64>,
    key: Option<String>,
    ctrl: Option<bool>,
    shift: Option<bool>,
    focus: Option<String>,
    target: Option<String>,
}

#[derive(Debug)]
enum Action {
    Init {
        config: Option<Config>,
        capabilities: Option<HashMap<String, bool>>,
    },
    Reset,
    Tick,
    InputChanged,
    PageHide,
    PageError {
        error: Option<String>,
    },
    InvalidCommand {
        reason: String,
    },
    Keydown(KeyPress),
    Json(JsonAction),
    JsonClear,
    Base64(Base64Action),
    Base64Clear,
    QrGenerate,
    QrDownload,
    QrClear,
    QrCapabilityLoaded {
        ok: bool,
    },
    Code(CodeAction),
    CodeClear,
    RegexTest,
    RegexClear,
    ImageConvert {
        data: Option<String>,
    },
    ImageConvertResult(ImageConversionResult),
    ImageDownload,
    ImageClear,
    GifConvert,
    GifVideoMeta {
        session: u64,
        width: u32,
        height: u32,
        duration_ms: u64,
    },
    GifFrame {
        session: u64,
        index: u32,
        data: String,
    },
    GifCancel,
    GifDownload,
    VideoClear,
    CopyToClipboard {
        target: Option<String>,
    },
    ClipboardResult {
        ok: bool,
        error: Option<String>,
    },
}

/// Names of the page's exported handlers, accepted as aliases.
fn canonical_action(name: &str) -> &str {
    match name {
        "formatJSON" => "json_format",
        "minifyJSON" => "json_minify",
        "clearJSON" => "json_clear",
        "encodeBase64" => "base64_encode",
        "decodeBase64" => "base64_decode",
        "clearBase64" => "base64_clear",
        "generateQR" => "qr_generate",
        "clearQR" => "qr_clear",
        "downloadQR" => "qr_download",
        "beautifyCode" => "code_beautify",
        "minifyCode" => "code_minify",
        "clearCode" => "code_clear",
        "testRegex" => "regex_test",
        "clearRegex" => "regex_clear",
        "convertImage" => "image_convert",
        "downloadImage" => "image_download",
        "clearImage" => "image_clear",
        "convertToGif" => "gif_convert",
        "downloadGif" => "gif_download",
        "clearVideo" => "video_clear",
        "copyToClipboard" => "copy_to_clipboard",
        other => other,
    }
}

/// Actions that carry no payload beyond the bindings.
fn simple_action(name: &str) -> Option<Action> {
    let action = match name {
        "reset" => Action::Reset,
        "tick" => Action::Tick,
        "input_changed" => Action::InputChanged,
        "page_hide" => Action::PageHide,
        "json_format" => Action::Json(JsonAction::Format),
        "json_minify" => Action::Json(JsonAction::Minify),
        "json_clear" => Action::JsonClear,
        "base64_encode" => Action::Base64(Base64Action::Encode),
        "base64_decode" => Action::Base64(Base64Action::Decode),
        "base64_clear" => Action::Base64Clear,
        "qr_generate" => Action::QrGenerate,
        "qr_download" => Action::QrDownload,
        "qr_clear" => Action::QrClear,
        "code_beautify" => Action::Code(CodeAction::Beautify),
        "code_minify" => Action::Code(CodeAction::Minify),
        "code_clear" => Action::CodeClear,
        "regex_test" => Action::RegexTest,
        "regex_clear" => Action::RegexClear,
        "image_download" => Action::ImageDownload,
        "image_clear" => Action::ImageClear,
        "gif_convert" => Action::GifConvert,
        "gif_cancel" => Action::GifCancel,
        "gif_download" => Action::GifDownload,
        "video_clear" => Action::VideoClear,
        _ => return None,
    };
    Some(action)
}

fn parse_action(command: Command) -> Result<Action, String> {
    let Command {
        action,
        now_ms: _,
        bindings: _,
        config,
        capabilities,
        ok,
        error,
        data,
        session,
        index,
        width,
        height,
        duration_ms,
        key,
        ctrl,
        shift,
        focus,
        target,
    } = command;

    let name = canonical_action(action.trim());
    if let Some(simple) = simple_action(name) {
        return Ok(simple);
    }

    match name {
        "init" => Ok(Action::Init {
            config,
            capabilities,
        }),
        "error" => Ok(Action::InvalidCommand {
            reason: error.unwrap_or_else(|| "invalid_command".into()),
        }),
        "page_error" => Ok(Action::PageError { error }),
        "keydown" => Ok(Action::Keydown(KeyPress {
            key: key.unwrap_or_default(),
            ctrl: ctrl.unwrap_or(false),
            shift: shift.unwrap_or(false),
            focus,
        })),
        "qr_capability_loaded" => Ok(Action::QrCapabilityLoaded {
            ok: ok.unwrap_or(false),
        }),
        "image_convert" => Ok(Action::ImageConvert { data }),
        "image_convert_result" => Ok(Action::ImageConvertResult(ImageConversionResult {
            ok: ok.unwrap_or(false),
            data,
            error,
        })),
        "gif_video_meta" => Ok(Action::GifVideoMeta {
            session: session.ok_or("missing_session")?,
            width: width.ok_or("missing_width")?,
            height: height.ok_or("missing_height")?,
            duration_ms: duration_ms.ok_or("missing_duration")?,
        }),
        "gif_frame" => Ok(Action::GifFrame {
            session: session.ok_or("missing_session")?,
            index: index.ok_or("missing_index")?,
            data: data.ok_or("missing_data")?,
        }),
        "copy_to_clipboard" => Ok(Action::CopyToClipboard { target }),
        "clipboard_result" => Ok(Action::ClipboardResult {
            ok: ok.unwrap_or(false),
            error,
        }),
        other => Err(format!("unknown_action:{other}")),
    }
}

static STATE: OnceLock<Mutex<AppState>> = OnceLock::new();

/// The page state. A panic in an earlier command leaves the lock poisoned;
/// the state inside is still consistent enough to render.
fn lock_state() -> MutexGuard<'static, AppState> {
    let mutex = STATE.get_or_init(|| Mutex::new(AppState::new()));
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("recovering poisoned state lock");
            poisoned.into_inner()
        }
    }
}

fn handle_command(mut command: Command) -> Value {
    let mut state = lock_state();
    if let Some(now) = command.now_ms {
        state.now_ms = now;
    }
    if let Some(bindings) = command.bindings.take() {
        state.sync_bindings(&bindings);
    }

    match parse_action(command) {
        Ok(action) => {
            if let Err(err) = apply_action(&mut state, action) {
                if err.is_silent() {
                    log::warn!("{err}");
                } else {
                    log::debug!("action failed: {err}");
                }
            }
        }
        Err(reason) => {
            log::warn!("rejecting command: {reason}");
            state.notify_error(t!("common.invalid_command", reason = reason));
        }
    }

    let effects = state.take_effects();
    render_ui(&state, &effects)
}

fn apply_action(state: &mut AppState, action: Action) -> Result<(), ToolError> {
    match action {
        Action::Init {
            config,
            capabilities,
        } => {
            handle_init(state, config, capabilities);
            Ok(())
        }
        Action::Reset => {
            state.reset_runtime();
            Ok(())
        }
        Action::Tick => {
            handle_tick(state);
            Ok(())
        }
        Action::InputChanged => {
            let now = state.now_ms;
            if let Some(deadline) = state.persistence.note_input(now) {
                state.schedule_tick(deadline);
            }
            Ok(())
        }
        Action::PageHide => {
            state.persistence.debounce.cancel();
            let fields = state.persisted_fields();
            state.persistence.save_state(&fields);
            Ok(())
        }
        Action::PageError { error } => {
            log::error!("page error: {}", error.as_deref().unwrap_or("unknown"));
            state.notify_error(t!("common.page_error"));
            Ok(())
        }
        Action::InvalidCommand { reason } => {
            log::warn!("invalid command: {reason}");
            state.notify_error(t!("common.invalid_command", reason = reason));
            Ok(())
        }
        Action::Keydown(press) => match shortcut_action(&press).and_then(simple_action) {
            Some(action) => apply_action(state, action),
            None => Ok(()),
        },
        Action::Json(action) => handle_json_action(state, action),
        Action::JsonClear => {
            handle_json_clear(state);
            Ok(())
        }
        Action::Base64(action) => handle_base64_action(state, action),
        Action::Base64Clear => {
            handle_base64_clear(state);
            Ok(())
        }
        Action::QrGenerate => qr::handle_generate(state),
        Action::QrDownload => qr::handle_download(state),
        Action::QrClear => {
            qr::handle_clear(state);
            Ok(())
        }
        Action::QrCapabilityLoaded { ok } => {
            qr::handle_capability_loaded(state, ok);
            Ok(())
        }
        Action::Code(action) => handle_code_action(state, action),
        Action::CodeClear => {
            handle_code_clear(state);
            Ok(())
        }
        Action::RegexTest => handle_regex_test(state),
        Action::RegexClear => {
            handle_regex_clear(state);
            Ok(())
        }
        Action::ImageConvert { data } => {
            if let Some(data) = data {
                state.image.data = Some(data);
            }
            let capabilities = state.capabilities.clone();
            image_convert::handle_convert(state, &capabilities)
        }
        Action::ImageConvertResult(result) => image_convert::handle_result(state, result),
        Action::ImageDownload => image_convert::handle_download(state),
        Action::ImageClear => {
            image_convert::handle_clear(state);
            Ok(())
        }
        Action::GifConvert => video_gif::handle_convert(state),
        Action::GifVideoMeta {
            session,
            width,
            height,
            duration_ms,
        } => video_gif::handle_video_meta(state, session, width, height, duration_ms),
        Action::GifFrame {
            session,
            index,
            data,
        } => video_gif::handle_frame(state, session, index, &data),
        Action::GifCancel => {
            video_gif::handle_cancel(state);
            Ok(())
        }
        Action::GifDownload => video_gif::handle_download(state),
        Action::VideoClear => {
            video_gif::handle_clear(state);
            Ok(())
        }
        Action::CopyToClipboard { target } => handle_copy(state, target.as_deref()),
        Action::ClipboardResult { ok, error } => {
            handle_copy_result(state, ok, error.as_deref());
            Ok(())
        }
    }
}

/// Page load: configuration, capability report, restore, startup checks.
fn handle_init(
    state: &mut AppState,
    config: Option<Config>,
    capabilities: Option<HashMap<String, bool>>,
) {
    if state.initialized {
        log::info!("init received again, re-applying configuration");
    }
    if let Some(config) = config {
        state.apply_config(config);
    }
    if let Some(locale) = state.config.locale.clone() {
        i18n::update_locale(state, &locale);
    }
    if let Some(report) = capabilities {
        state.capabilities.apply_report(&report);
    }

    if state.persistence.is_enabled() {
        if !state.persistence.has_backend() {
            state.persistence.install(default_backend());
        }
        let stored = state.persistence.restore_state();
        if stored.is_empty() {
            log::debug!("no saved form state");
        } else {
            state.apply_persisted(&stored);
        }
    }
    state.initialized = true;

    let missing = state.capabilities.missing_required();
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|cap| cap.label())
            .collect::<Vec<_>>()
            .join(", ");
        log::warn!("missing capabilities: {names}");
        state.notify_warning(t!("common.features_unavailable", names = names));
    }
    if !state.capabilities.is_available(Capability::QrCode) {
        qr::start_background_load(state);
    }
    log::info!("freetools core initialized (locale {})", state.locale);
}

fn handle_tick(state: &mut AppState) {
    let now = state.now_ms;
    if state.messages.expire(now) {
        log::trace!("message expired at {now}");
    }
    if state.persistence.debounce.poll(now) {
        let fields = state.persisted_fields();
        state.persistence.save_state(&fields);
    }
}

fn error_ui(message: &str) -> Value {
    json!({
        "type": "Column",
        "padding": 24,
        "children": [
            { "type": "Message", "class": "message error", "text": message },
        ],
        "effects": []
    })
}

fn render_ui(state: &AppState, effects: &[Effect]) -> Value {
    let mut children = Vec::new();
    if let Some(msg) = state.messages.current() {
        children.push(to_value_or_text(
            UiMessage::new(&msg.text, msg.kind.as_str(), msg.expires_at_ms),
            "message",
        ));
    }
    children.push(render_menu(&feature_catalog()));
    children.push(render_json_panel(state));
    children.push(render_base64_panel(state));
    children.push(render_qr_panel(state));
    children.push(render_code_panel(state));
    children.push(render_regex_panel(state));
    children.push(render_image_panel(state));
    children.push(render_gif_panel(state));

    let mut page = to_value_or_text(UiColumn::new(children).id("freetools").padding(16), "page");
    let effects = serde_json::to_value(effects).unwrap_or_else(|e| {
        log::error!("unable to serialize effects: {e}");
        Value::Array(Vec::new())
    });
    if let Value::Object(map) = &mut page {
        map.insert("effects".into(), effects);
    }
    page
}

/// Runs one command end to end and returns the rendered page as JSON text.
pub fn dispatch_json(input: &str) -> String {
    let response = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let command: Command = serde_json::from_str(input).unwrap_or_else(|e| {
            log::warn!("malformed command: {e}");
            Command {
                action: "error".into(),
                error: Some("invalid_json".into()),
                ..Default::default()
            }
        });
        handle_command(command)
    }));

    match response {
        Ok(value) => value,
        Err(_) => {
            log::error!("panic while handling command");
            error_ui(&t!("common.page_error"))
        }
    }
    .to_string()
}
