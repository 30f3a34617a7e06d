//! Structural extraction of test metadata from source units.
//!
//! Given the full text of one source unit, the scanner recovers every test
//! declaration together with its nested-group ancestry, inline steps and
//! documentation block. Nesting is never inferred from indentation: group
//! openers are located by pattern, then each one is checked against the
//! [`lexer::Lexed`] brace stream with a balance walk. A group whose block
//! has not closed by the time the stream reaches a test's declaration is an
//! open ancestor of that test; ancestors are ordered by source position,
//! outermost first.
//!
//! Error tolerance follows the compiler model used elsewhere in this crate:
//! a malformed declaration is excluded and recorded as a
//! [`ParseDiagnostic`], never a hard failure for the whole unit. The one
//! hard per-test condition is an unbalanced block that makes the container
//! path unresolvable; such a test is refused rather than guessed at.
//!
//! Scanned surface:
//!
//! ```text
//! suite("Checkout") {
//!     suite("Guest") {
//!         case("TC-E2E-CART-004", "Pay without an account") {
//!             remote_id(8812);
//!             meta {
//!                 description: "Covers the guest payment path"
//!                 severity: "critical"
//!             }
//!             step("Open cart | 2 items | cart renders");
//!             step("Pay | visa test card | confirmation page");
//!         }
//!     }
//! }
//! ```

pub mod diagnostic;
pub mod docblock;
pub mod lexer;

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ident::CaseId;

pub use diagnostic::ParseDiagnostic;
pub use docblock::{RawMeta, RawStep};
pub use lexer::Lexed;

static SUITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bsuite\s*\(\s*"((?:[^"\\]|\\.)*)"\s*\)\s*\{"#).expect("valid regex")
});

static CASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bcase\s*\(\s*"((?:[^"\\]|\\.)*)"\s*,\s*"((?:[^"\\]|\\.)*)"\s*\)\s*\{"#)
        .expect("valid regex")
});

static ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bremote_id\s*\(\s*(\d+)\s*\)\s*;").expect("valid regex"));

/// A previously written remote-id annotation found inside a test body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Byte span of the full call expression within the source unit.
    pub span: Range<usize>,
    pub value: u64,
}

/// One test declaration recovered from a source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCase {
    pub id: CaseId,
    pub title: String,
    /// Group names from outermost to innermost.
    pub suite_path: Vec<String>,
    pub steps: Vec<RawStep>,
    pub meta: RawMeta,
    /// Byte offset of the test body's opening brace.
    pub body_open: usize,
    /// Indentation of the body's first statement, used when inserting an
    /// annotation.
    pub body_indent: String,
    pub annotation: Option<Annotation>,
}

impl ParsedCase {
    pub fn remote_id(&self) -> Option<u64> {
        self.annotation.as_ref().map(|a| a.value)
    }
}

/// Output of scanning one source unit. An empty case list is valid.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub cases: Vec<ParsedCase>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseOutcome {
    pub fn warnings(&self) -> impl Iterator<Item = &ParseDiagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ParseDiagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

struct Group {
    name: String,
    decl_offset: usize,
    open_idx: usize,
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn body_indent(body: &str) -> String {
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        return line
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect::<String>();
    }
    "    ".to_string()
}

/// Scan one source unit. `label` names the unit (normally its path) in
/// diagnostics.
pub fn parse_source(text: &str, label: &str) -> ParseOutcome {
    let lexed = Lexed::scan(text);
    let mut outcome = ParseOutcome::default();

    let groups: Vec<Group> = SUITE_RE
        .captures_iter(text)
        .filter_map(|captures| {
            let m = captures.get(0)?;
            if !lexed.is_code(m.start()) {
                return None;
            }
            // The pattern ends at the group's opening brace.
            let open_idx = lexed.open_brace_at(m.end() - 1)?;
            Some(Group {
                name: unescape(&captures[1]),
                decl_offset: m.start(),
                open_idx,
            })
        })
        .collect();
    tracing::debug!("{label}: found {} group openers", groups.len());

    for captures in CASE_RE.captures_iter(text) {
        let Some(m) = captures.get(0) else { continue };
        if !lexed.is_code(m.start()) {
            continue;
        }
        let raw_id = unescape(&captures[1]);
        let title = unescape(&captures[2]);
        let decl_offset = m.start();

        let id = match CaseId::parse(&raw_id) {
            Ok(id) => id,
            Err(err) => {
                outcome.diagnostics.push(ParseDiagnostic::warning(format!(
                    "{label}: declaration '{title}' excluded: {err}"
                )));
                continue;
            }
        };

        let body = lexed
            .open_brace_at(m.end() - 1)
            .and_then(|open_idx| lexed.matching_close(open_idx).map(|close| (open_idx, close)));
        let Some((_, body_close)) = body else {
            outcome.diagnostics.push(ParseDiagnostic::error(format!(
                "{label}: no container path resolvable for '{id}': \
                 unbalanced braces at offset {decl_offset}"
            )));
            continue;
        };

        // Outermost first: an enclosing group necessarily opens earlier in
        // the source than any group nested inside it.
        let mut ancestors: Vec<&Group> = groups
            .iter()
            .filter(|g| lexed.is_open_at(g.open_idx, decl_offset))
            .collect();
        ancestors.sort_by_key(|g| g.decl_offset);
        let suite_path: Vec<String> = ancestors.into_iter().map(|g| g.name.clone()).collect();

        let body_open = m.end() - 1;
        let body_start = body_open + 1;
        let body_text = &text[body_start..body_close];

        let annotation = ANNOTATION_RE
            .captures_iter(body_text)
            .find_map(|c| {
                let am = c.get(0)?;
                if !lexed.is_code(body_start + am.start()) {
                    return None;
                }
                let value = c[1].parse().ok()?;
                Some(Annotation {
                    span: body_start + am.start()..body_start + am.end(),
                    value,
                })
            });

        outcome.cases.push(ParsedCase {
            id,
            title,
            suite_path,
            steps: docblock::scan_steps(&lexed, body_text, body_start),
            meta: docblock::scan_meta(&lexed, body_text, body_start),
            body_open,
            body_indent: body_indent(body_text),
            annotation,
        });
    }

    tracing::debug!(
        "{label}: extracted {} cases, {} diagnostics",
        outcome.cases.len(),
        outcome.diagnostics.len()
    );
    outcome
}
