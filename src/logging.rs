//! Logger installation for the host the core runs in.
//!
//! Everything in the crate logs through the `log` facade. Native builds get a
//! `simplelog` terminal logger, browser builds forward records to the devtools
//! console.

use log::LevelFilter;

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the logger once. Later calls are ignored.
#[cfg(not(target_arch = "wasm32"))]
pub fn init() {
    use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

    let _ = TermLogger::init(
        default_level(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

#[cfg(target_arch = "wasm32")]
pub fn init() {
    if log::set_logger(&console::CONSOLE).is_ok() {
        log::set_max_level(default_level());
    }
}

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};
    use wasm_bindgen::JsValue;

    pub(super) struct ConsoleLogger;

    pub(super) static CONSOLE: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
            match record.level() {
                Level::Error => web_sys::console::error_1(&line),
                Level::Warn => web_sys::console::warn_1(&line),
                Level::Info => web_sys::console::info_1(&line),
                Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
            }
        }

        fn flush(&self) {}
    }
}

/// Initializes a terminal logger for unit tests. Safe to call from every test.
#[cfg(test)]
pub fn initialize_for_tests() {
    init();
}
