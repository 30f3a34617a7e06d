//! Step and documentation-block extraction.
//!
//! Both are line/pattern scans anchored within a test body's brace span.
//! A step line is split on a pipe delimiter into up to three fields
//! (action, data, expected result); missing trailing fields default to
//! empty. The documentation block is a `meta { ... }` block of
//! `key: value` lines carrying the narrative fields.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::lexer::Lexed;

/// An ordered step as declared in source: action, data, expected result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStep {
    pub action: String,
    pub data: String,
    pub expected: String,
}

/// Narrative fields recovered from a `meta { ... }` block. All optional;
/// absent fields keep their defaults downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMeta {
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub postconditions: Option<String>,
    pub severity: Option<String>,
    pub behavior: Option<String>,
    pub flaky: Option<bool>,
}

static STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"step\s*\(\s*"((?:[^"\\]|\\.)*)"\s*\)\s*;"#).expect("valid regex"));

static META_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"meta\s*\{").expect("valid regex"));

static META_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?P<key>[a-z_]+)\s*:\s*(?:"(?P<str>(?:[^"\\]|\\.)*)"|(?P<bare>true|false))\s*,?\s*$"#)
        .expect("valid regex")
});

/// Split one step declaration's string payload on the pipe delimiter.
///
/// `"Submit form | user=alice | 200 OK"` yields all three fields;
/// `"Submit form"` yields an action with empty data and expected result.
/// Extra pipes beyond the third field are folded into the expected result.
pub fn split_step(payload: &str) -> RawStep {
    let mut parts = payload.splitn(3, '|');
    RawStep {
        action: parts.next().unwrap_or("").trim().to_string(),
        data: parts.next().unwrap_or("").trim().to_string(),
        expected: parts.next().unwrap_or("").trim().to_string(),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract the ordered step list from a test body span.
///
/// `body` is the slice between the body's braces and `body_start` its byte
/// offset within the unit, used to discard matches that begin inside
/// strings or comments of the full lexed stream.
pub fn scan_steps(lexed: &Lexed, body: &str, body_start: usize) -> Vec<RawStep> {
    STEP_RE
        .captures_iter(body)
        .filter(|c| {
            c.get(0)
                .map(|m| lexed.is_code(body_start + m.start()))
                .unwrap_or(false)
        })
        .map(|c| split_step(&unescape(&c[1])))
        .collect()
}

/// Extract the documentation block from a test body span, if present.
///
/// The block's own brace span is recovered from the token stream, so a
/// `}` inside a quoted field value cannot terminate it early.
pub fn scan_meta(lexed: &Lexed, body: &str, body_start: usize) -> RawMeta {
    let mut meta = RawMeta::default();
    let Some(open) = META_OPEN_RE
        .find_iter(body)
        .find(|m| lexed.is_code(body_start + m.start()))
    else {
        return meta;
    };
    // The pattern ends at `{`, so the block's open brace sits one byte
    // before the match end.
    let brace_offset = body_start + open.end() - 1;
    let Some(open_idx) = lexed.open_brace_at(brace_offset) else {
        return meta;
    };
    let Some(close_offset) = lexed.matching_close(open_idx) else {
        return meta;
    };
    let inner = &body[open.end()..close_offset - body_start];

    for captures in META_FIELD_RE.captures_iter(inner) {
        let value = captures
            .name("str")
            .map(|m| unescape(m.as_str()))
            .or_else(|| captures.name("bare").map(|m| m.as_str().to_string()));
        let Some(value) = value else { continue };
        match &captures["key"] {
            "description" => meta.description = Some(value),
            "preconditions" => meta.preconditions = Some(value),
            "postconditions" => meta.postconditions = Some(value),
            "severity" => meta.severity = Some(value),
            "behavior" => meta.behavior = Some(value),
            "flaky" => meta.flaky = value.parse().ok(),
            _ => {}
        }
    }
    meta
}
