mod config;
mod error;
mod features;
mod i18n;
mod logging;
mod router;
mod state;
mod ui;

rust_i18n::i18n!("locales", fallback = "en");

pub use config::Config;
pub use error::ToolError;

static LOGGER: std::sync::Once = std::sync::Once::new();

/// Single entry point for the host shell: takes a JSON command, returns the
/// rendered page (with its `effects`) as JSON.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
pub fn dispatch(input: &str) -> String {
    LOGGER.call_once(logging::init);
    router::dispatch_json(input)
}
