use crate::diag::{warning, Diagnostics};
use crate::include::{parse_include_spec, IncludeSpec};
use crate::reader::Cursor;

fn is_space(b: u8) -> bool {
    b == b'\t' || b == b' '
}

fn is_whitespace(b: u8) -> bool {
    is_space(b) || b == b'\n'
}

/// Scope state of one file's scan. Reset per file, never shared across jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Normal,
    InRemoveBlock,
    /// Lines still to drop, counting the `rmn` directive line itself.
    InRemoveNLines(usize),
}

/// What to do with one scanned line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineAction<'a> {
    /// Write `head` then `tail`, byte for byte (head is the leading
    /// whitespace, tail runs to and including the newline).
    Copy(&'a [u8], &'a [u8]),
    Drop,
    /// The directive line is dropped; the resolver splices the target here.
    Include {
        spec: IncludeSpec,
        line: usize,
        col: usize,
    },
}

/// Per-line directive scanner. Expects LF-normalized text whose chunks never
/// split a line.
pub struct Scanner {
    tag: Vec<u8>,
    file: String,
    state: ScanState,
    line_no: usize,
}

impl Scanner {
    pub fn new(tag: &str, file: &str) -> Self {
        // directives are "<tag><SP><keyword>"; matching tag plus space at
        // once keeps a tag-prefixed identifier from looking like a directive
        let mut tag = tag.as_bytes().to_vec();
        tag.push(b' ');
        Self {
            tag,
            file: file.to_string(),
            state: ScanState::Normal,
            line_no: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn scan_line<'a>(&mut self, line: &'a [u8], diags: &mut Diagnostics) -> LineAction<'a> {
        self.line_no += 1;
        let mut cur = Cursor::new(line);
        let ws = cur.skip_while(is_space);
        let head = &line[..ws];

        let mut skip_this_line = false;
        let mut include = None;

        if cur.rest().starts_with(&self.tag) {
            let tag_col = ws + 1;
            cur.bump(self.tag.len());
            cur.skip_while(is_space);
            let kw_col = cur.pos() + 1;
            let kw = cur.take_while(|b| !is_whitespace(b));

            let ignored_in_scope = match self.state {
                ScanState::InRemoveBlock => kw != b"endrm",
                ScanState::InRemoveNLines(_) => true,
                ScanState::Normal => false,
            };

            if ignored_in_scope {
                diags.warning_at(
                    warning::TAG_IN_REMOVE_SCOPE,
                    &self.file,
                    "tags inside \"rm\" or \"rmn\" scopes are ignored",
                    self.line_no,
                    tag_col,
                );
            } else {
                match kw {
                    b"rm" => {
                        self.state = ScanState::InRemoveBlock;
                    }
                    b"endrm" => {
                        if self.state == ScanState::InRemoveBlock {
                            self.state = ScanState::Normal;
                            skip_this_line = true;
                        } else {
                            diags.error_at(
                                &self.file,
                                "unexpected \"endrm\"",
                                self.line_no,
                                kw_col,
                            );
                        }
                    }
                    b"rmn" => {
                        cur.skip_while(is_space);
                        let arg_col = cur.pos() + 1;
                        let arg = cur.take_while(|b| !is_whitespace(b));
                        if arg.is_empty() {
                            diags.error_at(
                                &self.file,
                                "missing argument of \"rmn\"",
                                self.line_no,
                                cur.pos() + 1,
                            );
                        } else if arg.len() == 1 && arg[0].is_ascii_digit() {
                            // the directive line itself is the first removed line
                            self.state = ScanState::InRemoveNLines((arg[0] - b'0') as usize + 1);
                        } else {
                            diags.error_at(
                                &self.file,
                                format!(
                                    "invalid argument of \"rmn\": \"{}\"",
                                    String::from_utf8_lossy(arg)
                                ),
                                self.line_no,
                                arg_col,
                            );
                        }
                    }
                    b"ins" => {
                        // drop exactly one separator; everything after is kept
                        if matches!(cur.peek(), Some(b) if is_space(b)) {
                            cur.bump(1);
                        }
                    }
                    b"include" => {
                        cur.skip_while(is_space);
                        let path_col = cur.pos() + 1;
                        match parse_include_spec(&mut cur) {
                            Ok(spec) => {
                                include = Some((spec, path_col));
                                skip_this_line = true;
                            }
                            Err(msg) => {
                                diags.error_at(&self.file, msg, self.line_no, path_col);
                            }
                        }
                    }
                    _ => {
                        diags.error_at(
                            &self.file,
                            format!("unknown key word \"{}\"", String::from_utf8_lossy(kw)),
                            self.line_no,
                            kw_col,
                        );
                    }
                }

                if kw != b"ins" {
                    let tail = match cur.rest() {
                        [rest @ .., b'\n'] => rest,
                        rest => rest,
                    };
                    if tail.iter().any(|&b| !is_space(b)) {
                        diags.warning_at(
                            warning::NO_NEWLINE_AFTER_EXPRESSION,
                            &self.file,
                            "no new line after expression",
                            self.line_no,
                            cur.pos() + 1,
                        );
                    }
                }
            }
        }

        let in_scope = match self.state {
            ScanState::InRemoveBlock => true,
            ScanState::InRemoveNLines(n) => {
                self.state = if n <= 1 {
                    ScanState::Normal
                } else {
                    ScanState::InRemoveNLines(n - 1)
                };
                true
            }
            ScanState::Normal => false,
        };

        if let Some((spec, col)) = include {
            return LineAction::Include {
                spec,
                line: self.line_no,
                col,
            };
        }
        if in_scope || skip_this_line {
            return LineAction::Drop;
        }
        LineAction::Copy(head, cur.rest())
    }

    /// End-of-stream checks: an open `rm` block is an error, an overlapping
    /// `rmn` only a warning since there is nothing left to output anyway.
    pub fn finish(&mut self, diags: &mut Diagnostics) {
        match self.state {
            ScanState::InRemoveBlock => {
                diags.error_at(&self.file, "missing \"endrm\"", self.line_no, 0);
            }
            ScanState::InRemoveNLines(_) => {
                diags.warning_at(
                    warning::RMN_OVERLAPPED_EOF,
                    &self.file,
                    "\"rmn\" overlapped EOF",
                    self.line_no,
                    0,
                );
            }
            ScanState::Normal => {}
        }
        self.state = ScanState::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{Diagnostic, Reporter, Tally};
    use crate::include::IncludeKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Collect(Vec<Diagnostic>);

    impl Reporter for Collect {
        fn report(&mut self, diag: &Diagnostic) {
            self.0.push(diag.clone());
        }
    }

    /// Runs the scanner over LF input, returning output and tally.
    fn scan(tag: &str, input: &str) -> (String, Tally, Vec<Diagnostic>) {
        let mut collect = Collect::default();
        let mut diags = Diagnostics::new(&mut collect, &HashSet::new());
        let mut scanner = Scanner::new(tag, "test.js");
        let mut out = Vec::new();
        for line in input.as_bytes().split_inclusive(|&b| b == b'\n') {
            match scanner.scan_line(line, &mut diags) {
                LineAction::Copy(head, tail) => {
                    out.extend_from_slice(head);
                    out.extend_from_slice(tail);
                }
                LineAction::Drop => {}
                LineAction::Include { .. } => panic!("no includes in scanner tests"),
            }
        }
        scanner.finish(&mut diags);
        (String::from_utf8(out).unwrap(), diags.tally(), collect.0)
    }

    #[test]
    fn input_without_directives_is_copied_byte_for_byte() {
        let input = "a\n  indented\n\nlast without newline";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, input);
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn rm_block_is_removed() {
        let input = "A\n//#p rm\nB\n//#p endrm\nC\n";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, "A\nC\n");
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn indented_directives_are_recognized() {
        let input = "A\n\t //#p rm\nB\n  //#p endrm\nC\n";
        let (out, _, _) = scan("//#p", input);
        assert_eq!(out, "A\nC\n");
    }

    #[test]
    fn unexpected_endrm_is_one_error_and_copying_continues() {
        let input = "A\n//#p endrm\nB\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "A\n\nB\n");
        assert_eq!(tally, Tally::new(1, 0));
        assert!(diags[0].message.contains("unexpected"));
    }

    #[test]
    fn missing_endrm_is_an_error() {
        let input = "A\n//#p rm\nB\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "A\n");
        assert_eq!(tally, Tally::new(1, 0));
        assert!(diags[0].message.contains("missing"));
    }

    #[test]
    fn rmn_removes_directive_line_plus_n() {
        let input = "//#p rmn 2\none\ntwo\nD\nE\n";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, "D\nE\n");
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn rmn_zero_removes_only_the_directive_line() {
        let input = "//#p rmn 0\nkeep\n";
        let (out, _, _) = scan("//#p", input);
        assert_eq!(out, "keep\n");
    }

    #[test]
    fn rmn_argument_must_be_a_single_digit() {
        for bad in ["//#p rmn 12\nA\n", "//#p rmn x\nA\n", "//#p rmn\nA\n"] {
            let (_, tally, _) = scan("//#p", bad);
            assert_eq!(tally.errors, 1, "input {bad:?}");
        }
    }

    #[test]
    fn rmn_overlapping_eof_is_a_warning() {
        let input = "//#p rmn 5\nonly\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "");
        assert_eq!(tally, Tally::new(0, 1));
        assert_eq!(diags[0].warning_id, Some(warning::RMN_OVERLAPPED_EOF));
    }

    #[test]
    fn ins_keeps_the_rest_of_the_line() {
        let input = "//#p ins code();\n";
        let (out, _, _) = scan("//#p", input);
        assert_eq!(out, "code();\n");
    }

    #[test]
    fn ins_preserves_leading_whitespace_and_extra_spacing() {
        let input = "    //#p ins  spaced();\n";
        let (out, _, _) = scan("//#p", input);
        assert_eq!(out, "     spaced();\n");
    }

    #[test]
    fn tags_inside_scopes_warn_and_are_ignored() {
        let input = "//#p rm\n//#p rmn 4\n//#p endrm\nC\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "C\n");
        assert_eq!(tally, Tally::new(0, 1));
        assert_eq!(diags[0].warning_id, Some(warning::TAG_IN_REMOVE_SCOPE));
    }

    #[test]
    fn directives_do_not_nest_inside_rmn() {
        // the endrm is within the rmn window, so it is ignored with a warning
        let input = "//#p rmn 1\n//#p endrm\nC\n";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, "C\n");
        assert_eq!(tally, Tally::new(0, 1));
    }

    #[test]
    fn unknown_keyword_is_an_error() {
        let input = "//#p frobnicate\nA\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "\nA\n");
        assert_eq!(tally.errors, 1);
        assert!(diags[0].message.contains("frobnicate"));
    }

    #[test]
    fn trailing_text_after_keyword_warns() {
        let input = "//#p rm stray\nB\n//#p endrm\n";
        let (out, tally, diags) = scan("//#p", input);
        assert_eq!(out, "");
        assert_eq!(tally, Tally::new(0, 1));
        assert_eq!(
            diags[0].warning_id,
            Some(warning::NO_NEWLINE_AFTER_EXPRESSION)
        );
    }

    #[test]
    fn trailing_whitespace_after_keyword_is_fine() {
        let input = "//#p rm   \nB\n//#p endrm\n";
        let (_, tally, _) = scan("//#p", input);
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn tag_without_following_space_is_not_a_directive() {
        let input = "//#pxrm\n//#p\n";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, input);
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn include_lines_yield_an_include_action() {
        let mut collect = Collect::default();
        let mut diags = Diagnostics::new(&mut collect, &HashSet::new());
        let mut scanner = Scanner::new("//#p", "test.js");
        match scanner.scan_line(b"//#p include \"lib.js\"\n", &mut diags) {
            LineAction::Include { spec, line, .. } => {
                assert_eq!(spec.kind, IncludeKind::Clean);
                assert_eq!(spec.path, "lib.js");
                assert_eq!(line, 1);
            }
            other => panic!("expected include, got {other:?}"),
        }
    }

    #[test]
    fn bad_include_path_is_an_error_and_line_is_copied() {
        let input = "//#p include lib.js\nA\n";
        let (out, tally, _) = scan("//#p", input);
        assert_eq!(out, "lib.js\nA\n");
        assert_eq!(tally.errors, 1);
    }
}
