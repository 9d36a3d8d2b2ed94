use crate::state::AppState;

pub fn update_locale(state: &mut AppState, locale_str: &str) {
    let normalized = normalize_locale(locale_str);
    state.locale = normalized.to_string();
    rust_i18n::set_locale(normalized);
}

pub(crate) fn normalize_locale(locale_str: &str) -> &'static str {
    let trimmed = locale_str.trim();
    if trimmed.is_empty() {
        return "en";
    }

    // Browsers report tags like "zh-CN" / "en_US"; only the language part
    // selects a compiled locale.
    let lower = trimmed.to_ascii_lowercase().replace('_', "-");
    let lang = lower.split('-').next().unwrap_or("en");

    match lang {
        "zh" => "zh",
        _ => "en",
    }
}
