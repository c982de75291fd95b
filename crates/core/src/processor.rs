use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::diag::{warning, Diagnostics, Reporter, Tally};
use crate::error::Result;
use crate::include::{self, IncludeKind, IncludeSpec};
use crate::job::{Job, JobMode, RunContext};
use crate::line_ending::{self, LineEnding};
use crate::reader::ChunkedReader;
use crate::scanner::{LineAction, Scanner};

/// Runs a batch strictly in listed order. A failing job never stops the
/// batch; even a panicking one is converted into a single generic error.
pub fn process_jobs(jobs: &[Job], base_dir: &Path, reporter: &mut dyn Reporter) -> Tally {
    let mut total = Tally::default();

    for job in jobs {
        log::info!(
            "processing \"{}\" -> \"{}\"",
            job.input().display(),
            job.output().display()
        );
        let outcome = catch_unwind(AssertUnwindSafe(|| process_job(job, base_dir, &mut *reporter)));
        total += match outcome {
            Ok(tally) => tally,
            Err(_) => {
                let mut diags = Diagnostics::new(reporter, &HashSet::new());
                diags.error(&job.display_file(), "internal error");
                diags.tally()
            }
        };
    }

    total
}

/// Runs one job. Relative job paths resolve against `base_dir` (the jobfile's
/// directory, or the caller's working directory for single invocations).
pub fn process_job(job: &Job, base_dir: &Path, reporter: &mut dyn Reporter) -> Tally {
    let mut diags = Diagnostics::new(reporter, job.suppressed_warnings());
    let mut ctx = RunContext::new(base_dir);
    let display = job.display_file();

    let input = ctx.resolve(job.input());
    let output = ctx.resolve(job.output());

    match job.mode() {
        JobMode::Copy => copy_job(&input, &output, false, &display, &mut diags),
        JobMode::CopyOverwrite => copy_job(&input, &output, true, &display, &mut diags),
        JobMode::Process => {
            if !input.exists() {
                diags.error(&display, "file does not exist");
                discard_output(&output, false, job.error_line_text(), &display, &mut diags);
                return diags.tally();
            }

            let created_dir = match prepare_output_dir(&output) {
                Ok(created) => created,
                Err(err) => {
                    diags.error(&display, err.to_string());
                    return diags.tally();
                }
            };

            if output.exists() && is_same_file(&input, &output) {
                // do not fall through to cleanup: deleting the output would
                // delete the input
                diags.error(&display, "in and out files are the same");
                return diags.tally();
            }

            if let Err(err) = run_pipeline(job, &input, &output, &mut ctx, &mut diags) {
                diags.error(&display, err.to_string());
            }

            let tally = diags.tally();
            if job.warn_as_error() && tally.warnings > 0 {
                diags.error(&display, format!("[Werror] {} warnings", tally.warnings));
            }

            if diags.tally().errors > 0 {
                discard_output(
                    &output,
                    created_dir,
                    job.error_line_text(),
                    &display,
                    &mut diags,
                );
            }
        }
    }

    diags.tally()
}

/// The per-file pipeline: line-ending detection, LF staging when needed, the
/// scan itself, and re-normalization of the result. Clean includes recurse
/// into this function with a synthetic child job.
fn run_pipeline(
    job: &Job,
    input: &Path,
    output: &Path,
    ctx: &mut RunContext,
    diags: &mut Diagnostics,
) -> Result<()> {
    let display = job.display_file();
    let source_dir = input.parent().unwrap_or(Path::new(".")).to_path_buf();

    let ending = match line_ending::detect(input)? {
        Some(ending) => ending,
        None => {
            diags.warning(
                warning::AMBIGUOUS_LINE_ENDING,
                &display,
                "unable to determine line ending, assuming LF",
            );
            LineEnding::Lf
        }
    };

    if ending == LineEnding::Lf {
        let mut out = BufWriter::new(File::create(output)?);
        scan_stream(input, &source_dir, &display, &mut out, job, ctx, diags)?;
        out.flush()?;
        return Ok(());
    }

    // non-LF input: round-trip through an LF staging directory next to the
    // output, so the scanner only ever sees LF
    let staging_parent = output.parent().unwrap_or(Path::new(".")).to_path_buf();
    let staging = tempfile::Builder::new()
        .prefix(".tagstrip-")
        .tempdir_in(&staging_parent)?;
    let in_lf = staging.path().join(staged_name(input, "in-lf"));
    let out_lf = staging.path().join(staged_name(output, "out-lf"));

    line_ending::convert(input, ending, &in_lf, LineEnding::Lf)?;

    {
        let mut out = BufWriter::new(File::create(&out_lf)?);
        scan_stream(&in_lf, &source_dir, &display, &mut out, job, ctx, diags)?;
        out.flush()?;
    }

    if diags.tally().errors == 0 {
        if let Err(err) = line_ending::convert(&out_lf, LineEnding::Lf, output, ending) {
            // keep the staging directory around to aid diagnosis
            let kept = staging.into_path();
            diags.error(
                &display,
                format!(
                    "converting line ending back to {} failed: {} (staging kept at \"{}\")",
                    ending.name(),
                    err,
                    kept.display()
                ),
            );
            return Ok(());
        }
    }

    if let Err(err) = staging.close() {
        diags.warning(
            warning::CLEANUP_FAILED,
            &display,
            format!("temporary processing directory not deleted: {err}"),
        );
    }

    Ok(())
}

fn staged_name(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stream".to_string());
    format!("{name}.{suffix}")
}

/// Feeds newline-aligned chunks to the scanner and settles each line's fate
/// on the output stream as soon as it is decided.
fn scan_stream(
    source: &Path,
    source_dir: &Path,
    display: &str,
    out: &mut dyn Write,
    job: &Job,
    ctx: &mut RunContext,
    diags: &mut Diagnostics,
) -> Result<()> {
    let mut reader = ChunkedReader::new(File::open(source)?);
    let mut scanner = Scanner::new(job.tag(), display);
    let mut chunk = Vec::new();

    while reader.next_chunk(&mut chunk)? {
        for line in chunk.split_inclusive(|&b| b == b'\n') {
            match scanner.scan_line(line, diags) {
                LineAction::Copy(head, tail) => {
                    out.write_all(head)?;
                    out.write_all(tail)?;
                }
                LineAction::Drop => {}
                LineAction::Include { spec, line, col } => {
                    splice_include(&spec, source_dir, display, line, col, out, job, ctx, diags)?;
                }
            }
        }
    }

    scanner.finish(diags);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn splice_include(
    spec: &IncludeSpec,
    source_dir: &Path,
    display: &str,
    line: usize,
    col: usize,
    out: &mut dyn Write,
    job: &Job,
    ctx: &mut RunContext,
    diags: &mut Diagnostics,
) -> Result<()> {
    let target = match include::resolve_target(&spec.path, source_dir) {
        Ok(target) => target,
        Err(err) => {
            diags.error_at(
                display,
                format!("unresolvable include target \"{}\": {err}", spec.path),
                line,
                col,
            );
            return Ok(());
        }
    };

    match spec.kind {
        IncludeKind::Dirty => splice_dirty(&target, out),
        IncludeKind::Clean => splice_clean(&target, spec, display, line, col, out, job, ctx, diags),
    }
}

/// Splices the target verbatim, normalized to the host stream's LF. An
/// undetectable line ending means an empty target, so there is nothing to
/// splice.
fn splice_dirty(target: &Path, out: &mut dyn Write) -> Result<()> {
    let ending = match line_ending::detect(target)? {
        Some(ending) => ending,
        None => return Ok(()),
    };

    let reader = BufReader::new(File::open(target)?);
    line_ending::convert_stream(reader, ending, out, LineEnding::Lf)?;
    Ok(())
}

/// Preprocesses the target with a synthetic child job into a staging file,
/// then splices the staged result like a dirty include.
#[allow(clippy::too_many_arguments)]
fn splice_clean(
    target: &Path,
    spec: &IncludeSpec,
    display: &str,
    line: usize,
    col: usize,
    out: &mut dyn Write,
    job: &Job,
    ctx: &mut RunContext,
    diags: &mut Diagnostics,
) -> Result<()> {
    if ctx.on_stack(target) {
        diags.error_at(
            display,
            format!(
                "include loop detected: {}",
                include::format_chain(ctx.include_stack(), target)
            ),
            line,
            col,
        );
        return Ok(());
    }

    let duplicate = ctx.push_include(target.to_path_buf());
    if duplicate {
        diags.warning_at(
            warning::DUPLICATE_INCLUDE,
            display,
            format!("\"{}\" included more than once", spec.path),
            line,
            col,
        );
    }

    let result = run_clean_include(target, out, job, ctx, diags);
    // popped on return regardless of outcome
    ctx.pop_include();
    result
}

fn run_clean_include(
    target: &Path,
    out: &mut dyn Write,
    job: &Job,
    ctx: &mut RunContext,
    diags: &mut Diagnostics,
) -> Result<()> {
    let staging = tempfile::Builder::new().prefix(".tagstrip-inc-").tempdir()?;
    let staged_out = staging.path().join(staged_name(target, "inc"));
    let child = job.child_for_include(target, &staged_out);
    let child_dir = target.parent().unwrap_or(Path::new(".")).to_path_buf();

    let errors_before = diags.tally().errors;
    let saved_dir = ctx.set_current_dir(child_dir);
    let piped = run_pipeline(&child, target, &staged_out, ctx, diags);
    ctx.set_current_dir(saved_dir);

    if let Err(err) = piped {
        diags.error(&child.display_file(), err.to_string());
    }

    if diags.tally().errors == errors_before {
        splice_dirty(&staged_out, out)?;
    }

    if let Err(err) = staging.close() {
        diags.warning(
            warning::CLEANUP_FAILED,
            &child.display_file(),
            format!("temporary include directory not deleted: {err}"),
        );
    }

    Ok(())
}

fn prepare_output_dir(output: &Path) -> Result<bool> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// On failure the output is deleted (plus the directory the job created for
/// it), unless the job configures an error line, in which case the output is
/// replaced with exactly that text.
fn discard_output(
    output: &Path,
    created_dir: bool,
    error_line_text: Option<&str>,
    display: &str,
    diags: &mut Diagnostics,
) {
    if let Some(text) = error_line_text {
        if let Err(err) = fs::write(output, text) {
            diags.warning(
                warning::OUTPUT_NOT_DELETED,
                display,
                format!("error line not written: {err}"),
            );
        }
        return;
    }

    if output.exists() {
        if let Err(err) = fs::remove_file(output) {
            diags.warning(
                warning::OUTPUT_NOT_DELETED,
                display,
                format!("invalid output file not deleted: {err}"),
            );
        }
    }

    if created_dir {
        if let Some(parent) = output.parent() {
            if let Err(err) = fs::remove_dir(parent) {
                diags.warning(
                    warning::OUTPUT_NOT_DELETED,
                    display,
                    format!("output directory not deleted: {err}"),
                );
            }
        }
    }
}

fn copy_job(input: &Path, output: &Path, overwrite: bool, display: &str, diags: &mut Diagnostics) {
    if !input.exists() {
        diags.error(display, "file does not exist");
        return;
    }
    if output.exists() {
        if is_same_file(input, output) {
            diags.error(display, "in and out files are the same");
            return;
        }
        if !overwrite && !output_older_than_input(input, output) {
            log::debug!("skipping copy, \"{}\" is up to date", output.display());
            return;
        }
    }

    if let Err(err) = prepare_output_dir(output).and_then(|_| {
        fs::copy(input, output)?;
        Ok(())
    }) {
        diags.error(display, err.to_string());
    }
}

fn output_older_than_input(input: &Path, output: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(input), modified(output)) {
        (Some(inp), Some(out)) => out < inp,
        // without timestamps, copying is the safe call
        _ => true,
    }
}
