use crate::error::ToolError;
use crate::features::capabilities::{Capability, CapabilityRegistry};
use crate::features::{run_tool, ToolMessages};
use crate::state::{field_ids, AppState, OutputField};
use crate::ui::{
    to_value_or_text, Button as UiButton, Row as UiRow, Section as UiSection,
    Select as UiSelect, TextArea as UiTextArea,
};
use regex::Regex;
use rust_i18n::t;
use serde_json::Value;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;

const INDENT: &str = "  ";

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    Css,
    Html,
    Json,
    Xml,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::JavaScript,
        Language::Css,
        Language::Html,
        Language::Json,
        Language::Xml,
    ];

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Some(Language::JavaScript),
            "css" => Some(Language::Css),
            "html" => Some(Language::Html),
            "json" => Some(Language::Json),
            "xml" => Some(Language::Xml),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Css => "css",
            Language::Html => "html",
            Language::Json => "json",
            Language::Xml => "xml",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::Css => "CSS",
            Language::Html => "HTML",
            Language::Json => "JSON",
            Language::Xml => "XML",
        }
    }

    /// Beautifier this language needs; JSON is handled by serde.
    fn beautifier(self) -> Option<Capability> {
        match self {
            Language::JavaScript => Some(Capability::JsBeautify),
            Language::Css => Some(Capability::CssBeautify),
            Language::Html | Language::Xml => Some(Capability::HtmlBeautify),
            Language::Json => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeAction {
    Beautify,
    Minify,
}

/// Unknown languages pass through unchanged.
pub fn beautify(
    input: &str,
    language: Option<Language>,
    capabilities: &CapabilityRegistry,
) -> Result<String, ToolError> {
    let Some(language) = language else {
        return Ok(input.to_string());
    };
    if let Some(cap) = language.beautifier() {
        if !capabilities.is_available(cap) {
            return Err(ToolError::CapabilityMissing(cap));
        }
    }
    match language {
        Language::JavaScript => Ok(beautify_braces(input, false)),
        Language::Css => Ok(beautify_braces(input, true)),
        Language::Html => Ok(beautify_markup(input, true)),
        Language::Xml => Ok(beautify_markup(input, false)),
        Language::Json => {
            let value: Value = serde_json::from_str(input)
                .map_err(|_| ToolError::parse(t!("code.invalid_json")))?;
            serde_json::to_string_pretty(&value).map_err(ToolError::parse)
        }
    }
}

pub fn minify(input: &str, language: Option<Language>) -> Result<String, ToolError> {
    let Some(language) = language else {
        return Ok(input.to_string());
    };
    let out = match language {
        Language::JavaScript => {
            let s = block_comment_re().replace_all(input, "");
            let s = line_comment_re().replace_all(&s, "");
            let s = whitespace_re().replace_all(&s, " ");
            js_punct_re().replace_all(&s, "$1").trim().to_string()
        }
        Language::Css => {
            let s = block_comment_re().replace_all(input, "");
            let s = whitespace_re().replace_all(&s, " ");
            css_punct_re().replace_all(&s, "$1").trim().to_string()
        }
        Language::Html | Language::Xml => {
            let s = markup_comment_re().replace_all(input, "");
            let s = whitespace_re().replace_all(&s, " ");
            between_tags_re().replace_all(&s, "><").trim().to_string()
        }
        Language::Json => {
            let value: Value = serde_json::from_str(input)
                .map_err(|_| ToolError::parse(t!("code.invalid_json")))?;
            serde_json::to_string(&value).map_err(ToolError::parse)?
        }
    };
    Ok(out)
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern {pattern}: {e}")))
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?s)/\*.*?\*/")
}

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?m)//.*$")
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\s+")
}

fn js_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\s*([{}();,=])\s*")
}

fn css_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\s*([{}:;,])\s*")
}

fn markup_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?s)<!--.*?-->")
}

fn between_tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r">\s+<")
}

struct LineWriter {
    out: String,
    line: String,
    depth: usize,
}

impl LineWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            line: String::new(),
            depth: 0,
        }
    }

    fn push(&mut self, c: char) {
        if c.is_whitespace() {
            if !self.line.is_empty() && !self.line.ends_with(' ') {
                self.line.push(' ');
            }
        } else {
            self.line.push(c);
        }
    }

    fn push_str(&mut self, s: &str) {
        self.line.push_str(s);
    }

    fn flush(&mut self) {
        let trimmed = self.line.trim();
        if !trimmed.is_empty() {
            self.out.push_str(&INDENT.repeat(self.depth));
            self.out.push_str(trimmed);
            self.out.push('\n');
        }
        self.line.clear();
    }

    fn blank_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.out.trim_end().to_string()
    }
}

fn copy_quoted(chars: &mut Peekable<Chars<'_>>, quote: char, w: &mut LineWriter) {
    w.line.push(quote);
    let mut escaped = false;
    for c in chars.by_ref() {
        w.line.push(c);
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            break;
        }
    }
}

fn next_significant(chars: &Peekable<Chars<'_>>) -> Option<char> {
    chars.clone().find(|c| !c.is_whitespace())
}

/// Brace-structured indenter for JavaScript and CSS.
pub fn beautify_braces(input: &str, css: bool) -> String {
    let mut w = LineWriter::new();
    let mut parens = 0usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' | '`' => copy_quoted(&mut chars, c, &mut w),
            '/' if chars.peek() == Some(&'*') => {
                w.push_str("/*");
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    w.line.push(n);
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                w.flush();
            }
            '/' if !css && chars.peek() == Some(&'/') => {
                w.push('/');
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    w.line.push(n);
                    chars.next();
                }
                w.flush();
            }
            '\n' if parens == 0 && !css => w.flush(),
            '(' => {
                parens += 1;
                w.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                w.push(c);
            }
            '{' => {
                if !w.line.is_empty() && !w.line.ends_with(' ') {
                    w.line.push(' ');
                }
                w.line.push('{');
                w.flush();
                w.depth += 1;
            }
            '}' => {
                w.flush();
                w.depth = w.depth.saturating_sub(1);
                w.line.push('}');
                match next_significant(&chars) {
                    Some(';' | ',' | ')') => {}
                    Some(_) if css && w.depth == 0 => {
                        w.flush();
                        w.blank_line();
                    }
                    _ => w.flush(),
                }
            }
            ';' => {
                w.line.push(';');
                if parens == 0 {
                    w.flush();
                }
            }
            ':' if css && w.depth > 0 => {
                w.line.push(':');
                w.line.push(' ');
                while chars.peek().is_some_and(|n| n.is_whitespace()) {
                    chars.next();
                }
            }
            _ => w.push(c),
        }
    }
    w.finish()
}

enum MarkupToken {
    Open { name: String, raw: String, self_closing: bool },
    Close { name: String, raw: String },
    Other(String),
    Text(String),
}

fn tag_name(raw: &str) -> String {
    raw.trim_start_matches('<')
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn tokenize_markup(input: &str, html: bool) -> Vec<MarkupToken> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->").map(|i| i + 3).unwrap_or(body.len());
            tokens.push(MarkupToken::Other(format!("<!--{}", &body[..end])));
            rest = &body[end..];
            continue;
        }
        if rest.starts_with('<') {
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            let raw = rest[..end].to_string();
            rest = &rest[end..];
            if raw.starts_with("</") {
                tokens.push(MarkupToken::Close {
                    name: tag_name(&raw),
                    raw,
                });
            } else if raw.starts_with("<!") || raw.starts_with("<?") {
                tokens.push(MarkupToken::Other(raw));
            } else {
                let name = tag_name(&raw);
                let self_closing =
                    raw.ends_with("/>") || (html && VOID_ELEMENTS.contains(&name.as_str()));
                let raw_body = html && (name == "script" || name == "style") && !self_closing;
                tokens.push(MarkupToken::Open {
                    name: name.clone(),
                    raw,
                    self_closing,
                });
                if raw_body {
                    let closing = format!("</{name}");
                    let end = rest.to_ascii_lowercase().find(&closing).unwrap_or(rest.len());
                    let body = rest[..end].trim();
                    if !body.is_empty() {
                        tokens.push(MarkupToken::Text(body.to_string()));
                    }
                    rest = &rest[end..];
                }
            }
            continue;
        }
        let end = rest.find('<').unwrap_or(rest.len());
        let text = whitespace_re().replace_all(rest[..end].trim(), " ").to_string();
        if !text.is_empty() {
            tokens.push(MarkupToken::Text(text));
        }
        rest = &rest[end..];
    }
    tokens
}

/// Tag-structured indenter for HTML and XML. An element holding only text
/// stays on one line.
pub fn beautify_markup(input: &str, html: bool) -> String {
    let tokens = tokenize_markup(input, html);
    let mut lines: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    let pad = |depth: usize| INDENT.repeat(depth);

    while i < tokens.len() {
        match &tokens[i] {
            MarkupToken::Open {
                name,
                raw,
                self_closing,
            } => {
                if *self_closing {
                    lines.push(format!("{}{raw}", pad(depth)));
                } else if let (Some(MarkupToken::Text(text)), Some(MarkupToken::Close { name: close, raw: close_raw })) =
                    (tokens.get(i + 1), tokens.get(i + 2))
                {
                    if close == name && !text.contains('\n') {
                        lines.push(format!("{}{raw}{text}{close_raw}", pad(depth)));
                        i += 3;
                        continue;
                    }
                    lines.push(format!("{}{raw}", pad(depth)));
                    depth += 1;
                } else {
                    lines.push(format!("{}{raw}", pad(depth)));
                    depth += 1;
                }
            }
            MarkupToken::Close { raw, .. } => {
                depth = depth.saturating_sub(1);
                lines.push(format!("{}{raw}", pad(depth)));
            }
            MarkupToken::Other(raw) => lines.push(format!("{}{raw}", pad(depth))),
            MarkupToken::Text(text) => {
                for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    lines.push(format!("{}{line}", pad(depth)));
                }
            }
        }
        i += 1;
    }
    lines.join("\n")
}

pub fn handle_code_action(state: &mut AppState, action: CodeAction) -> Result<(), ToolError> {
    let input = state.code.input.clone();
    let language = Language::from_id(&state.code.language);
    match action {
        CodeAction::Beautify => {
            let capabilities = state.capabilities.clone();
            run_tool(
                state,
                OutputField::Code,
                &input,
                ToolMessages {
                    empty: t!("code.empty_beautify").into(),
                    success: t!("code.beautified").into(),
                    failure: |e| t!("code.beautify_failed", error = e).into(),
                },
                |text| beautify(text, language, &capabilities),
            )
        }
        CodeAction::Minify => run_tool(
            state,
            OutputField::Code,
            &input,
            ToolMessages {
                empty: t!("code.empty_minify").into(),
                success: t!("code.minified").into(),
                failure: |e| t!("code.minify_failed", error = e).into(),
            },
            |text| minify(text, language),
        ),
    }
}

pub fn handle_code_clear(state: &mut AppState) {
    state.code.input.clear();
    state.code.output.clear();
    state.notify_success(t!("code.cleared"));
}

pub fn render_code_panel(state: &AppState) -> Value {
    let title = t!("code.title");
    let hint = t!("code.input_hint");
    let beautify_label = t!("code.beautify");
    let minify_label = t!("code.minify");
    let clear = t!("common.clear");
    let copy = t!("common.copy");
    let options: Vec<(&str, &str)> = Language::ALL.iter().map(|l| (l.id(), l.label())).collect();

    let children = vec![
        to_value_or_text(
            UiSelect::new(field_ids::CODE_LANGUAGE, &state.code.language, &options),
            "code_language",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::CODE_INPUT, &state.code.input).hint(&hint),
            "code_input",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiButton::new(&beautify_label, "code_beautify").shortcut("Ctrl+Shift+B"),
                    "code_beautify",
                ),
                to_value_or_text(UiButton::new(&minify_label, "code_minify"), "code_minify"),
                to_value_or_text(UiButton::new(&clear, "code_clear"), "code_clear"),
            ]),
            "code_buttons",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::CODE_OUTPUT, &state.code.output).readonly(true),
            "code_output",
        ),
        to_value_or_text(
            UiButton::new(&copy, "copy_to_clipboard").target(field_ids::CODE_OUTPUT),
            "code_copy",
        ),
    ];
    to_value_or_text(
        UiSection::new("code-formatter", &title, children).icon("💻"),
        "code_panel",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> CapabilityRegistry {
        CapabilityRegistry::new()
    }

    #[test]
    fn javascript_is_indented_by_braces() {
        let out = beautify("function f(a){if(a){return 1;}return 2;}", Some(Language::JavaScript), &caps())
            .unwrap();
        assert_eq!(
            out,
            "function f(a) {\n  if(a) {\n    return 1;\n  }\n  return 2;\n}"
        );
    }

    #[test]
    fn for_loop_semicolons_stay_on_one_line() {
        let out = beautify_braces("for(let i=0;i<3;i++){x();}", false);
        assert_eq!(out, "for(let i=0;i<3;i++) {\n  x();\n}");
    }

    #[test]
    fn strings_and_comments_are_preserved() {
        let out = beautify_braces("var s = \"{;}\"; // note {\nvar t = 1;", false);
        assert_eq!(out, "var s = \"{;}\";\n// note {\nvar t = 1;");
    }

    #[test]
    fn css_rules_are_separated_by_blank_line() {
        let out = beautify("a{color:red;margin:0}b{top:1px}", Some(Language::Css), &caps()).unwrap();
        assert_eq!(out, "a {\n  color: red;\n  margin: 0\n}\n\nb {\n  top: 1px\n}");
    }

    #[test]
    fn html_nests_and_inlines_text_elements() {
        let out = beautify(
            "<div><p>Hi <b>there</b></p><br><span>x</span></div>",
            Some(Language::Html),
            &caps(),
        )
        .unwrap();
        assert_eq!(
            out,
            "<div>\n  <p>\n    Hi\n    <b>there</b>\n  </p>\n  <br>\n  <span>x</span>\n</div>"
        );
    }

    #[test]
    fn xml_self_closing_tags_do_not_indent() {
        let out = beautify("<?xml version=\"1.0\"?><a><b/><c>1</c></a>", Some(Language::Xml), &caps())
            .unwrap();
        assert_eq!(out, "<?xml version=\"1.0\"?>\n<a>\n  <b/>\n  <c>1</c>\n</a>");
    }

    #[test]
    fn missing_beautifier_names_library() {
        let mut registry = caps();
        registry.set(Capability::CssBeautify, false);
        let err = beautify("a{}", Some(Language::Css), &registry).unwrap_err();
        assert_eq!(err.to_string(), "CSS Beautification Library not loaded");
    }

    #[test]
    fn unknown_language_passes_through() {
        assert_eq!(beautify("x  y", Language::from_id("cobol"), &caps()).unwrap(), "x  y");
        assert_eq!(minify("x  y", None).unwrap(), "x  y");
    }

    #[test]
    fn javascript_minify_strips_comments_and_spaces() {
        let src = "/* header */\nfunction add(a, b) {\n  // sum\n  return a + b;\n}\n";
        assert_eq!(
            minify(src, Some(Language::JavaScript)).unwrap(),
            "function add(a,b){return a + b;}"
        );
    }

    #[test]
    fn css_and_html_minify() {
        assert_eq!(
            minify("a {\n  color : red ; /* c */\n}\n", Some(Language::Css)).unwrap(),
            "a{color:red;}"
        );
        assert_eq!(
            minify("<div>\n  <!-- c -->\n  <p> x </p>\n</div>", Some(Language::Html)).unwrap(),
            "<div><p> x </p></div>"
        );
    }

    #[test]
    fn json_minify_rejects_invalid_input() {
        assert_eq!(minify("{ \"a\" : 1 }", Some(Language::Json)).unwrap(), "{\"a\":1}");
        let err = minify("{", Some(Language::Json)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON format");
    }
}
