use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;

use tagstrip_core::{warning, Diagnostics, Job, Reporter, Tally};

use crate::flags::JobArgs;

/// Comment character; everything from it to the end of the line is ignored.
const COMMENT: char = '#';

/// Wrapper that lets one jobfile line reuse the command line's job flags.
#[derive(Parser, Debug)]
#[command(
    name = "jobfile",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct JobLine {
    #[command(flatten)]
    job: JobArgs,
}

pub(crate) struct ParsedJobfile {
    pub jobs: Vec<Job>,
    /// Errors/warnings produced while parsing; errors gate execution unless
    /// the jobfile is forced.
    pub tally: Tally,
}

/// Reads and parses a jobfile. `Err` means the file itself was unusable (IO,
/// encoding); per-line problems are reported as diagnostics and counted in
/// the returned tally so `--force-jobfile` can still run the good lines.
pub(crate) fn parse_jobfile(path: &Path, reporter: &mut dyn Reporter) -> anyhow::Result<ParsedJobfile> {
    let data = fs::read(path).with_context(|| format!("\"{}\"", path.display()))?;

    let mut diags = Diagnostics::new(reporter, &HashSet::new());
    let label = "jobfile";

    if data.is_empty() {
        diags.warning(warning::EMPTY_JOBFILE, label, "empty file");
        return Ok(ParsedJobfile {
            jobs: Vec::new(),
            tally: diags.tally(),
        });
    }

    if data.len() >= 4 {
        if data[..4] == [0x00, 0x00, 0xFE, 0xFF] {
            bail!("encoding not supported: UTF-32 BE");
        }
        if data[..4] == [0xFF, 0xFE, 0x00, 0x00] {
            bail!("encoding not supported: UTF-32 LE");
        }
    }
    if data.len() >= 2 {
        if data[..2] == [0xFE, 0xFF] {
            bail!("encoding not supported: UTF-16 BE");
        }
        if data[..2] == [0xFF, 0xFE] {
            bail!("encoding not supported: UTF-16 LE");
        }
    }

    let body = data.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(&data);

    if data.last() != Some(&b'\n') {
        diags.warning(
            warning::JOBFILE_NO_TRAILING_NEWLINE,
            label,
            "file does not end with a new line (may cause jobfile parse errors)",
        );
    }

    let mut jobs = Vec::new();

    for (idx, raw) in body.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        let line = match line.find(COMMENT) {
            Some(pos) => &line[..pos],
            None => line,
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(job) => jobs.push(job),
            Err(message) => diags.error_at(label, message, line_no, 0),
        }
    }

    Ok(ParsedJobfile {
        jobs,
        tally: diags.tally(),
    })
}

fn parse_line(line: &str) -> Result<Job, String> {
    let tokens = tokenize(line);
    let parsed = JobLine::try_parse_from(tokens).map_err(|err| clap_summary(&err))?;
    parsed.job.to_job()
}

/// Whitespace-split tokens; a token starting with a double quote runs to the
/// closing quote and may contain whitespace.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line;

    loop {
        rest = rest.trim_start_matches([' ', '\t']);
        if rest.is_empty() {
            break;
        }

        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            tokens.push(quoted[..end].to_string());
            rest = &quoted[(end + 1).min(quoted.len())..];
        } else {
            let end = rest
                .find([' ', '\t'])
                .unwrap_or(rest.len());
            tokens.push(rest[..end].to_string());
            rest = &rest[end..];
        }
    }

    tokens
}

/// First line of a clap error, without the "error: " prefix; the full
/// rendering is usage help and far too loud for a per-line diagnostic.
fn clap_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}
