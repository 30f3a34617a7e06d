//! Literal-stream lexer for brace-balanced source units.
//!
//! Structural recovery never trusts indentation. Instead the lexer reduces a
//! source unit to the stream of braces that actually govern nesting: every
//! `{`/`}` that appears outside string literals and outside comments, with
//! its byte offset. Ancestor recovery is then a balance walk over these
//! tokens rather than over raw characters, so a `{` inside a quoted step
//! description or a commented-out block can never corrupt the hierarchy.

use std::ops::Range;

/// One structural brace in the literal character stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BraceToken {
    pub kind: BraceKind,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceKind {
    Open,
    Close,
}

/// Lexed view of one source unit.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    braces: Vec<BraceToken>,
    /// Byte ranges covered by string literals and comments, in order.
    opaque: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Str,
    LineComment,
    BlockComment,
}

impl Lexed {
    /// Scan `text`, classifying every byte as code or opaque (string
    /// literal, `// line` comment, `/* block */` comment) and collecting
    /// the structural braces. String escapes (`\"`) are honored; an
    /// unterminated string or block comment runs to end of input.
    pub fn scan(text: &str) -> Lexed {
        let bytes = text.as_bytes();
        let mut braces = Vec::new();
        let mut opaque = Vec::new();
        let mut mode = Mode::Code;
        let mut region_start = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            let b = bytes[i];
            match mode {
                Mode::Code => match b {
                    b'"' => {
                        mode = Mode::Str;
                        region_start = i;
                        i += 1;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'/') => {
                        mode = Mode::LineComment;
                        region_start = i;
                        i += 2;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'*') => {
                        mode = Mode::BlockComment;
                        region_start = i;
                        i += 2;
                    }
                    b'{' => {
                        braces.push(BraceToken {
                            kind: BraceKind::Open,
                            offset: i,
                        });
                        i += 1;
                    }
                    b'}' => {
                        braces.push(BraceToken {
                            kind: BraceKind::Close,
                            offset: i,
                        });
                        i += 1;
                    }
                    _ => i += 1,
                },
                Mode::Str => match b {
                    b'\\' => i += 2,
                    b'"' => {
                        opaque.push(region_start..i + 1);
                        mode = Mode::Code;
                        i += 1;
                    }
                    _ => i += 1,
                },
                Mode::LineComment => {
                    if b == b'\n' {
                        opaque.push(region_start..i);
                        mode = Mode::Code;
                    }
                    i += 1;
                }
                Mode::BlockComment => {
                    if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        opaque.push(region_start..i + 2);
                        mode = Mode::Code;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
            }
        }
        if mode != Mode::Code {
            opaque.push(region_start..bytes.len());
        }

        Lexed { braces, opaque }
    }

    pub fn braces(&self) -> &[BraceToken] {
        &self.braces
    }

    /// Whether `offset` lies in literal code, i.e. outside every string
    /// literal and comment. Pattern matches whose start offset is opaque are
    /// discarded by the scanner.
    pub fn is_code(&self, offset: usize) -> bool {
        // opaque ranges are in ascending order
        for range in &self.opaque {
            if range.start > offset {
                break;
            }
            if range.contains(&offset) {
                return false;
            }
        }
        true
    }

    /// Index of the first structural `{` at or after `offset`.
    pub fn open_brace_at(&self, offset: usize) -> Option<usize> {
        self.braces
            .iter()
            .position(|t| t.offset >= offset && t.kind == BraceKind::Open)
    }

    /// Byte offset of the `}` matching the open brace at token index
    /// `open_idx`, or `None` when the block never closes.
    pub fn matching_close(&self, open_idx: usize) -> Option<usize> {
        debug_assert_eq!(self.braces[open_idx].kind, BraceKind::Open);
        let mut depth = 0isize;
        for token in &self.braces[open_idx..] {
            match token.kind {
                BraceKind::Open => depth += 1,
                BraceKind::Close => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(token.offset);
                    }
                }
            }
        }
        None
    }

    /// Balance walk: whether the block opened at token index `open_idx` is
    /// still open when the stream reaches `target_offset`. A group whose
    /// block is still open at a test's position is an ancestor of that test.
    pub fn is_open_at(&self, open_idx: usize, target_offset: usize) -> bool {
        if self.braces[open_idx].offset >= target_offset {
            return false;
        }
        let mut depth = 0isize;
        for token in &self.braces[open_idx..] {
            if token.offset >= target_offset {
                break;
            }
            match token.kind {
                BraceKind::Open => depth += 1,
                BraceKind::Close => depth -= 1,
            }
            if depth == 0 {
                return false;
            }
        }
        depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braces_inside_strings_skipped() {
        let lexed = Lexed::scan(r#"suite("has { and }") { step("x"); }"#);
        let kinds: Vec<_> = lexed.braces().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![BraceKind::Open, BraceKind::Close]);
    }

    #[test]
    fn test_braces_inside_comments_skipped() {
        let text = "{\n// open { never } counted\n/* nor { these } */\n}";
        let lexed = Lexed::scan(text);
        assert_eq!(lexed.braces().len(), 2);
        assert_eq!(lexed.braces()[0].kind, BraceKind::Open);
        assert_eq!(lexed.braces()[1].kind, BraceKind::Close);
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        let text = r#"x = "a \" { b"; {}"#;
        let lexed = Lexed::scan(text);
        assert_eq!(lexed.braces().len(), 2);
    }

    #[test]
    fn test_is_code_classification() {
        let text = r#"case("id") { /* hidden */ }"#;
        let lexed = Lexed::scan(text);
        assert!(lexed.is_code(0));
        // Inside the string argument.
        assert!(!lexed.is_code(6));
        // Inside the block comment.
        assert!(!lexed.is_code(16));
    }

    #[test]
    fn test_matching_close_and_open_walk() {
        let text = "a { b { c } d } e { f }";
        let lexed = Lexed::scan(text);
        let outer = lexed.open_brace_at(0).unwrap();
        let close = lexed.matching_close(outer).unwrap();
        assert_eq!(&text[close..close + 1], "}");
        assert_eq!(close, 14);

        // Position of `c` is inside both outer and inner blocks.
        let c_pos = text.find('c').unwrap();
        assert!(lexed.is_open_at(outer, c_pos));
        let inner = lexed.open_brace_at(5).unwrap();
        assert!(lexed.is_open_at(inner, c_pos));

        // The trailing block is not an ancestor of `c`.
        let trailing = lexed.open_brace_at(18).unwrap();
        assert!(!lexed.is_open_at(trailing, c_pos));
        // Nor is the inner block an ancestor of `e`.
        let e_pos = text.find('e').unwrap();
        assert!(!lexed.is_open_at(inner, e_pos));
    }

    #[test]
    fn test_unterminated_block_never_closes() {
        let lexed = Lexed::scan("{ { }");
        let outer = lexed.open_brace_at(0).unwrap();
        assert!(lexed.matching_close(outer).is_none());
    }
}
