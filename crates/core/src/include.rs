use std::path::{Path, PathBuf};

use crate::reader::Cursor;

/// How an include target is spliced into the host stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// Double-quote delimited: the target is preprocessed with a synthetic
    /// child job before splicing.
    Clean,
    /// Single-quote delimited: the target's raw bytes are spliced verbatim,
    /// only its line ending is matched to the host stream.
    Dirty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSpec {
    pub kind: IncludeKind,
    pub path: String,
}

/// Parses `<delim><path><delim>` with the cursor sitting on the opening
/// delimiter. A backslash escapes exactly the delimiter character; any other
/// backslash is a literal path byte.
pub(crate) fn parse_include_spec(cur: &mut Cursor) -> Result<IncludeSpec, &'static str> {
    let (kind, delim) = match cur.peek() {
        Some(b'"') => (IncludeKind::Clean, b'"'),
        Some(b'\'') => (IncludeKind::Dirty, b'\''),
        _ => return Err("invalid include path: expected \" or ' delimiter"),
    };
    cur.bump(1);

    let mut path = Vec::new();
    loop {
        match cur.peek() {
            None | Some(b'\n') => return Err("unterminated include path"),
            Some(b'\\') if cur.rest().get(1) == Some(&delim) => {
                path.push(delim);
                cur.bump(2);
            }
            Some(b) if b == delim => {
                cur.bump(1);
                break;
            }
            Some(b) => {
                path.push(b);
                cur.bump(1);
            }
        }
    }

    Ok(IncludeSpec {
        kind,
        path: String::from_utf8_lossy(&path).into_owned(),
    })
}

/// Resolves an include path against the directory of the including file and
/// canonicalizes it, so the include stack compares real absolute paths.
pub(crate) fn resolve_target(path: &str, including_dir: &Path) -> std::io::Result<PathBuf> {
    let joined = including_dir.join(path);
    joined.canonicalize()
}

/// `a.js -> b.js -> a.js`, for the cycle error.
pub(crate) fn format_chain(stack: &[PathBuf], next: &Path) -> String {
    let mut chain: Vec<String> = stack
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    chain.push(next.to_string_lossy().into_owned());
    chain.join(" -> ")
}
