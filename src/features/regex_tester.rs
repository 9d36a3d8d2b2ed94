use crate::error::ToolError;
use crate::state::{field_ids, AppState};
use crate::ui::{
    to_value_or_text, Button as UiButton, Checkbox as UiCheckbox, Row as UiRow,
    Section as UiSection, TextArea as UiTextArea, TextInput as UiTextInput,
};
use regex::{NoExpand, RegexBuilder};
use rust_i18n::t;
use serde_json::Value;
use std::fmt::Write as _;

const REPLACEMENT: &str = "***REPLACED***";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
}

impl RegexFlags {
    fn set(&mut self, flag: char) -> Result<(), ToolError> {
        match flag {
            'g' => self.global = true,
            'i' => self.ignore_case = true,
            'm' => self.multiline = true,
            's' => self.dot_all = true,
            other => return Err(ToolError::parse(format!("invalid flag '{other}'"))),
        }
        Ok(())
    }

    pub fn as_string(&self) -> String {
        [
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, c)| *c)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    pub text: String,
    /// Character index into the test text.
    pub position: usize,
    pub groups: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexReport {
    pub pattern: String,
    pub flags: RegexFlags,
    pub text: String,
    pub matches: Vec<RegexMatch>,
    pub replaced: String,
}

/// Splits `/body/flags` literals. A lone leading slash is part of the pattern.
pub fn split_literal(pattern: &str) -> (&str, &str) {
    if let Some(stripped) = pattern.strip_prefix('/') {
        if let Some(last) = stripped.rfind('/') {
            return (&stripped[..last], &stripped[last + 1..]);
        }
    }
    (pattern, "")
}

pub fn test_regex(pattern: &str, text: &str, checkboxes: RegexFlags) -> Result<RegexReport, ToolError> {
    let (body, literal_flags) = split_literal(pattern);
    let mut flags = checkboxes;
    for flag in literal_flags.chars() {
        flags.set(flag)?;
    }

    let re = RegexBuilder::new(body)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multiline)
        .dot_matches_new_line(flags.dot_all)
        .build()
        .map_err(ToolError::parse)?;

    let to_match = |caps: regex::Captures<'_>| -> Option<RegexMatch> {
        let whole = caps.get(0)?;
        Some(RegexMatch {
            text: whole.as_str().to_string(),
            position: text[..whole.start()].chars().count(),
            groups: caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        })
    };

    let matches: Vec<RegexMatch> = if flags.global {
        re.captures_iter(text).filter_map(to_match).collect()
    } else {
        re.captures(text).and_then(to_match).into_iter().collect()
    };

    let replaced = if flags.global {
        re.replace_all(text, NoExpand(REPLACEMENT)).into_owned()
    } else {
        re.replace(text, NoExpand(REPLACEMENT)).into_owned()
    };

    Ok(RegexReport {
        pattern: pattern.to_string(),
        flags,
        text: text.to_string(),
        matches,
        replaced,
    })
}

impl RegexReport {
    pub fn render(&self) -> String {
        let flags = self.flags.as_string();
        let mut out = String::new();
        let _ = writeln!(out, "Regular Expression: {}", self.pattern);
        let _ = writeln!(out, "Flags: {}", if flags.is_empty() { "None" } else { &flags });
        let _ = writeln!(out, "Test Text: {}\n", self.text);

        if self.matches.is_empty() {
            out.push_str("No matches found\n");
        } else {
            let _ = writeln!(out, "Found {} match(es):", self.matches.len());
            for (idx, m) in self.matches.iter().enumerate() {
                let _ = writeln!(out, "{}. Match: \"{}\" (Position: {})", idx + 1, m.text, m.position);
                for (gidx, group) in m.groups.iter().enumerate() {
                    match group {
                        Some(g) => {
                            let _ = writeln!(out, "   Group {}: \"{g}\"", gidx + 1);
                        }
                        None => {
                            let _ = writeln!(out, "   Group {}: <none>", gidx + 1);
                        }
                    }
                }
            }
        }

        let _ = writeln!(out, "\nReplacement Result: {}", self.replaced);
        out
    }
}

pub fn handle_regex_test(state: &mut AppState) -> Result<(), ToolError> {
    let pattern = state.regex.pattern.trim().to_string();
    let text = state.regex.text.clone();
    if pattern.is_empty() {
        state.notify_error(t!("regex.empty_pattern"));
        return Err(ToolError::EmptyInput(field_ids::REGEX_PATTERN));
    }
    if text.is_empty() {
        state.notify_error(t!("regex.empty_text"));
        return Err(ToolError::EmptyInput(field_ids::REGEX_TEXT));
    }

    let checkboxes = RegexFlags {
        global: state.regex.global,
        ignore_case: state.regex.ignore_case,
        multiline: state.regex.multiline,
        dot_all: false,
    };
    match test_regex(&pattern, &text, checkboxes) {
        Ok(report) => {
            state.regex.output = report.render();
            state.notify_success(t!("regex.completed", count = report.matches.len()));
            Ok(())
        }
        Err(err) => {
            state.regex.output.clear();
            let reason = err.to_string();
            state.notify_error(t!("regex.error", error = reason));
            Err(err)
        }
    }
}

pub fn handle_regex_clear(state: &mut AppState) {
    state.regex = Default::default();
    state.notify_success(t!("regex.cleared"));
}

pub fn render_regex_panel(state: &AppState) -> Value {
    let title = t!("regex.title");
    let pattern_hint = t!("regex.pattern_hint");
    let text_hint = t!("regex.text_hint");
    let global = t!("regex.global");
    let ignore_case = t!("regex.ignore_case");
    let multiline = t!("regex.multiline");
    let test = t!("regex.test");
    let clear = t!("common.clear");

    let children = vec![
        to_value_or_text(
            UiTextInput::new(field_ids::REGEX_PATTERN, &state.regex.pattern)
                .hint(&pattern_hint)
                .action_on_submit("regex_test"),
            "regex_pattern",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiCheckbox::new(field_ids::REGEX_GLOBAL, &global, state.regex.global),
                    "regex_global",
                ),
                to_value_or_text(
                    UiCheckbox::new(field_ids::REGEX_IGNORECASE, &ignore_case, state.regex.ignore_case),
                    "regex_ignorecase",
                ),
                to_value_or_text(
                    UiCheckbox::new(field_ids::REGEX_MULTILINE, &multiline, state.regex.multiline),
                    "regex_multiline",
                ),
            ]),
            "regex_flags",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::REGEX_TEXT, &state.regex.text).hint(&text_hint),
            "regex_text",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiButton::new(&test, "regex_test").shortcut("Ctrl+Shift+R"),
                    "regex_test",
                ),
                to_value_or_text(UiButton::new(&clear, "regex_clear"), "regex_clear"),
            ]),
            "regex_buttons",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::REGEX_OUTPUT, &state.regex.output).readonly(true),
            "regex_output",
        ),
    ];
    to_value_or_text(
        UiSection::new("regex-tester", &title, children).icon("🔍"),
        "regex_panel",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> RegexFlags {
        RegexFlags {
            global: true,
            ..Default::default()
        }
    }

    #[test]
    fn global_match_lists_every_occurrence() {
        let report = test_regex("a(b)c", "abcabc", global()).unwrap();
        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.matches[0].groups, vec![Some("b".to_string())]);
        assert_eq!(report.matches[1].position, 3);
        assert_eq!(report.replaced, "***REPLACED******REPLACED***");
    }

    #[test]
    fn non_global_stops_at_first_match() {
        let report = test_regex("a(b)c", "abcabc", RegexFlags::default()).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.replaced, "***REPLACED***abc");
    }

    #[test]
    fn literal_syntax_contributes_flags() {
        let report = test_regex("/HELLO/gi", "hello Hello", RegexFlags::default()).unwrap();
        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.flags.as_string(), "gi");
        assert_eq!(report.pattern, "/HELLO/gi");
    }

    #[test]
    fn duplicate_flags_are_ignored_and_unknown_rejected() {
        let report = test_regex("/a/gg", "aa", global()).unwrap();
        assert_eq!(report.flags.as_string(), "g");
        let err = test_regex("/a/y", "a", RegexFlags::default()).unwrap_err();
        assert_eq!(err.to_string(), "invalid flag 'y'");
    }

    #[test]
    fn lone_slash_stays_in_pattern() {
        assert_eq!(split_literal("/"), ("/", ""));
        assert_eq!(split_literal("a/b"), ("a/b", ""));
        assert_eq!(split_literal("/a/b/m"), ("a/b", "m"));
    }

    #[test]
    fn positions_count_characters_not_bytes() {
        let report = test_regex("x", "éx", RegexFlags::default()).unwrap();
        assert_eq!(report.matches[0].position, 1);
    }

    #[test]
    fn non_participating_group_renders_none() {
        let report = test_regex("a(x)?", "a", RegexFlags::default()).unwrap();
        assert_eq!(report.matches[0].groups, vec![None]);
        assert!(report.render().contains("Group 1: <none>"));
    }

    #[test]
    fn replacement_is_not_expanded() {
        let report = test_regex("(a)", "a$1", global()).unwrap();
        assert_eq!(report.replaced, "***REPLACED***$1");
    }

    #[test]
    fn report_layout() {
        let report = test_regex("b", "abc", RegexFlags::default()).unwrap();
        assert_eq!(
            report.render(),
            "Regular Expression: b\nFlags: None\nTest Text: abc\n\nFound 1 match(es):\n1. Match: \"b\" (Position: 1)\n\nReplacement Result: a***REPLACED***c\n"
        );
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(test_regex("(", "x", RegexFlags::default()).is_err());
    }

    #[test]
    fn clear_resets_flags() {
        let mut state = AppState::new();
        state.regex.global = true;
        state.regex.pattern = "a".into();
        handle_regex_clear(&mut state);
        assert!(!state.regex.global);
        assert!(state.regex.pattern.is_empty());
    }
}
