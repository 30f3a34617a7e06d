//! Reverse flow: writing remote-assigned ids back into source text.
//!
//! The rewrite itself is a pure transformation — original text plus a set
//! of byte-offset-positioned edits yields new text — so the logic is unit
//! testable without a filesystem. Persisting the result, with a backup
//! copy of the original written first, is a separate thin step.

use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use crate::{error::CasebindError, model::SourceLocation};

/// One replacement or insertion. An empty span is a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Compute the edit that brings a test body's annotation in line with
/// `remote_id`, or `None` when the annotation is already correct.
///
/// An existing annotation with a differing id is replaced in place. When no
/// annotation exists, the call expression is inserted immediately after the
/// body's opening brace, indented like the body's first statement.
pub fn annotation_edit(location: &SourceLocation, remote_id: u64) -> Option<Edit> {
    match &location.annotation {
        Some(existing) if existing.value == remote_id => None,
        Some(existing) => Some(Edit {
            span: existing.span.clone(),
            replacement: format!("remote_id({remote_id});"),
        }),
        None => {
            let insert_at = location.body_open + 1;
            Some(Edit {
                span: insert_at..insert_at,
                replacement: format!("\n{}remote_id({remote_id});", location.body_indent),
            })
        }
    }
}

/// Apply a set of non-overlapping edits to `text`.
///
/// Edits are applied back to front so earlier offsets stay valid.
/// Overlapping spans mean the caller computed edits against two different
/// versions of the text and are refused.
pub fn apply_edits(text: &str, mut edits: Vec<Edit>) -> Result<String, CasebindError> {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    for pair in edits.windows(2) {
        if pair[1].span.end > pair[0].span.start {
            return Err(CasebindError::Parse {
                path: String::new(),
                message: format!(
                    "overlapping annotation edits at offsets {} and {}",
                    pair[1].span.start, pair[0].span.start
                ),
            });
        }
    }
    let mut out = text.to_string();
    for edit in edits {
        if edit.span.end > out.len() {
            return Err(CasebindError::Parse {
                path: String::new(),
                message: format!("annotation edit at {} beyond end of text", edit.span.start),
            });
        }
        out.replace_range(edit.span.clone(), &edit.replacement);
    }
    Ok(out)
}

/// Write `new_text` to `path`, first copying the original to `<path>.bak`.
pub fn write_with_backup(path: &Path, new_text: &str) -> Result<(), CasebindError> {
    let mut backup = PathBuf::from(path);
    backup.set_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.bak"),
        None => "bak".to_string(),
    });
    tracing::debug!("backing up {path:?} to {backup:?}");
    fs::copy(path, &backup)?;
    fs::write(path, new_text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_source;

    fn location_of(text: &str) -> SourceLocation {
        let outcome = parse_source(text, "t.cb");
        let case = &outcome.cases[0];
        SourceLocation {
            file: PathBuf::from("t.cb"),
            body_open: case.body_open,
            body_indent: case.body_indent.clone(),
            annotation: case.annotation.clone(),
        }
    }

    #[test]
    fn test_insertion_after_opening_brace() {
        let text = "suite(\"S\") {\n    case(\"TC-API-SYNC-001\", \"t\") {\n        step(\"x\");\n    }\n}\n";
        let location = location_of(text);
        let edit = annotation_edit(&location, 42).unwrap();
        let rewritten = apply_edits(text, vec![edit]).unwrap();
        assert!(rewritten.contains("\"t\") {\n        remote_id(42);\n        step(\"x\");"));

        // The rewrite must still parse, to the same id and annotation.
        let reparsed = parse_source(&rewritten, "t.cb");
        assert_eq!(reparsed.cases[0].remote_id(), Some(42));
        assert_eq!(reparsed.cases[0].id.as_str(), "TC-API-SYNC-001");
    }

    #[test]
    fn test_replacement_in_place() {
        let text = "case(\"TC-API-SYNC-001\", \"t\") {\n    remote_id(7);\n    step(\"x\");\n}\n";
        let location = location_of(text);
        let edit = annotation_edit(&location, 42).unwrap();
        let rewritten = apply_edits(text, vec![edit]).unwrap();
        assert!(rewritten.contains("remote_id(42);"));
        assert!(!rewritten.contains("remote_id(7);"));
        // Replacement, not insertion: exactly one annotation remains.
        assert_eq!(rewritten.matches("remote_id").count(), 1);
    }

    #[test]
    fn test_matching_annotation_is_untouched() {
        let text = "case(\"TC-API-SYNC-001\", \"t\") {\n    remote_id(42);\n}\n";
        let location = location_of(text);
        assert!(annotation_edit(&location, 42).is_none());
    }

    #[test]
    fn test_multiple_edits_applied_back_to_front() {
        let text = concat!(
            "suite(\"S\") {\n",
            "    case(\"TC-API-SYNC-001\", \"a\") {\n    }\n",
            "    case(\"TC-API-SYNC-002\", \"b\") {\n    }\n",
            "}\n"
        );
        let outcome = parse_source(text, "t.cb");
        let edits: Vec<Edit> = outcome
            .cases
            .iter()
            .zip([10u64, 11])
            .filter_map(|(case, id)| {
                annotation_edit(
                    &SourceLocation {
                        file: PathBuf::from("t.cb"),
                        body_open: case.body_open,
                        body_indent: case.body_indent.clone(),
                        annotation: case.annotation.clone(),
                    },
                    id,
                )
            })
            .collect();
        let rewritten = apply_edits(text, edits).unwrap();
        let reparsed = parse_source(&rewritten, "t.cb");
        assert_eq!(reparsed.cases[0].remote_id(), Some(10));
        assert_eq!(reparsed.cases[1].remote_id(), Some(11));
    }

    #[test]
    fn test_overlapping_edits_refused() {
        let edits = vec![
            Edit {
                span: 0..4,
                replacement: "x".to_string(),
            },
            Edit {
                span: 2..6,
                replacement: "y".to_string(),
            },
        ];
        assert!(apply_edits("0123456789", edits).is_err());
    }

    #[test]
    fn test_write_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.cb");
        fs::write(&path, "original").unwrap();
        write_with_backup(&path, "rewritten").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "rewritten");
        assert_eq!(
            fs::read_to_string(dir.path().join("unit.cb.bak")).unwrap(),
            "original"
        );
    }
}
