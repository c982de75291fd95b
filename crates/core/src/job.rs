use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ProcessorError, Result};

/// Builtin tag for scripts with C++ like comments.
pub const TAG_CPP: &str = "//#p";
/// Builtin tag for scripts with bash like comments.
pub const TAG_BASH: &str = "##p";
/// Builtin tag for batch scripts.
pub const TAG_BATCH: &str = "@rem #p";

const TAG_LEN_MIN: usize = 3;
const TAG_LEN_MAX: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    Process,
    Copy,
    CopyOverwrite,
}

/// One input -> output transformation unit.
///
/// Immutable once handed to the processor, except that the include resolver
/// derives synthetic child jobs (same tag and options, different paths) for
/// clean includes.
#[derive(Debug, Clone)]
pub struct Job {
    input: PathBuf,
    output: PathBuf,
    tag: String,
    mode: JobMode,
    warn_as_error: bool,
    suppressed_warnings: HashSet<u32>,
    error_line_text: Option<String>,
}

impl Job {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        tag: impl Into<String>,
    ) -> Result<Self> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(Self {
            input: input.into(),
            output: output.into(),
            tag,
            mode: JobMode::Process,
            warn_as_error: false,
            suppressed_warnings: HashSet::new(),
            error_line_text: None,
        })
    }

    pub fn with_mode(mut self, mode: JobMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_warn_as_error(mut self, on: bool) -> Self {
        self.warn_as_error = on;
        self
    }

    pub fn with_suppressed_warnings(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.suppressed_warnings = ids.into_iter().collect();
        self
    }

    pub fn with_error_line_text(mut self, text: Option<String>) -> Self {
        self.error_line_text = text;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn warn_as_error(&self) -> bool {
        self.warn_as_error
    }

    pub fn suppressed_warnings(&self) -> &HashSet<u32> {
        &self.suppressed_warnings
    }

    pub fn error_line_text(&self) -> Option<&str> {
        self.error_line_text.as_deref()
    }

    /// Short name used to label diagnostics for this job's input.
    pub fn display_file(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.to_string_lossy().into_owned())
    }

    /// Derives the synthetic child job a clean include is processed with:
    /// same tag and options, include target as input, staging file as output.
    pub(crate) fn child_for_include(&self, input: &Path, output: &Path) -> Job {
        Job {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            tag: self.tag.clone(),
            mode: JobMode::Process,
            warn_as_error: false, // escalation happens once, at the top level
            suppressed_warnings: self.suppressed_warnings.clone(),
            error_line_text: None,
        }
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.len() < TAG_LEN_MIN {
        return Err(ProcessorError::InvalidJob(format!(
            "tag too short: \"{tag}\""
        )));
    }
    if tag.len() > TAG_LEN_MAX {
        return Err(ProcessorError::InvalidJob(format!("tag too long: \"{tag}\"")));
    }
    if !tag.chars().all(|c| (' '..='~').contains(&c)) || tag.trim() != tag {
        return Err(ProcessorError::InvalidJob(format!(
            "tag contains non-printable characters: \"{tag}\""
        )));
    }
    Ok(())
}

/// Picks the builtin tag for a file extension, if it maps to one.
pub fn tag_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "php" | "js" | "c" | "cpp" | "h" | "hpp" => Some(TAG_CPP),
        "sh" => Some(TAG_BASH),
        "bat" | "cmd" => Some(TAG_BATCH),
        _ => None,
    }
}

/// Mutable state scoped to one top-level job run, passed by reference through
/// the pipeline instead of living in process globals.
#[derive(Debug)]
pub struct RunContext {
    current_dir: PathBuf,
    include_stack: Vec<PathBuf>,
    include_history: HashSet<PathBuf>,
}

impl RunContext {
    pub fn new(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: current_dir.into(),
            include_stack: Vec::new(),
            include_history: HashSet::new(),
        }
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    pub fn set_current_dir(&mut self, dir: impl Into<PathBuf>) -> PathBuf {
        std::mem::replace(&mut self.current_dir, dir.into())
    }

    /// Resolves a possibly relative path against the run's current directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    pub fn include_stack(&self) -> &[PathBuf] {
        &self.include_stack
    }

    /// True if `path` is already being included (a cycle).
    pub fn on_stack(&self, path: &Path) -> bool {
        self.include_stack.iter().any(|p| p == path)
    }

    /// Pushes an include; returns whether this file was already included
    /// somewhere during this run (duplicate, worth a warning).
    pub fn push_include(&mut self, path: PathBuf) -> bool {
        debug_assert!(!self.on_stack(&path));
        let duplicate = !self.include_history.insert(path.clone());
        self.include_stack.push(path);
        duplicate
    }

    pub fn pop_include(&mut self) {
        self.include_stack.pop();
    }
}
