use std::path::{Path, PathBuf};

use clap::Parser;

use tagstrip_core::{process_job, process_jobs, Reporter, Tally};

mod flags;
mod jobfile;
mod report;

use flags::JobArgs;
use report::{ConsoleReporter, JsonReporter};

const DEFAULT_JOBFILE: &str = "./tagstripJobs";

const EXIT_OK: i32 = 0;
const EXIT_INVALID_ARGS: i32 = 1;
const EXIT_JOBFILE: i32 = 2;
const EXIT_WORKDIR: i32 = 3;
const EXIT_ERROR_BASE: i32 = 10;
// stay compatible with systems that treat the exit code as signed 8 bit
const EXIT_MAX: i32 = 127;

/// Summary line is only printed for noisy runs in release builds.
#[cfg(debug_assertions)]
const SUMMARY_THRESHOLD: u32 = 0;
#[cfg(not(debug_assertions))]
const SUMMARY_THRESHOLD: u32 = 6;

#[derive(Parser)]
#[command(name = "tagstrip")]
#[command(about = "Strips tagged development-only regions out of deploy artifacts", long_about = None)]
#[command(version)]
struct Cli {
    /// Run every job listed in FILE (default when no input is given)
    #[arg(long, short = 'j', value_name = "FILE", conflicts_with = "input")]
    jobfile: Option<PathBuf>,

    /// Run the valid jobfile lines even if some failed to parse
    #[arg(long, requires = "jobfile")]
    force_jobfile: bool,

    #[command(flatten)]
    job: JobArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,

    /// Print a machine-readable JSON report to stdout
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_OK };
            std::process::exit(code);
        }
    };

    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    if cli.json {
        let mut reporter = JsonReporter::default();
        let (tally, code) = dispatch(&cli, &mut reporter);
        println!("{}", reporter.render(tally));
        code
    } else {
        let mut reporter = ConsoleReporter;
        let (tally, code) = dispatch(&cli, &mut reporter);
        if tally.exceeds(SUMMARY_THRESHOLD) {
            report::print_summary(tally);
        }
        code
    }
}

fn dispatch(cli: &Cli, reporter: &mut dyn Reporter) -> (Tally, i32) {
    match effective_jobfile(cli) {
        Some(jobfile) => run_jobfile(&jobfile, cli, reporter),
        None => run_single(cli, reporter),
    }
}

/// With no jobfile and no input file, the default jobfile is assumed.
fn effective_jobfile(cli: &Cli) -> Option<PathBuf> {
    if cli.jobfile.is_some() {
        return cli.jobfile.clone();
    }
    if cli.job.input.is_none() {
        return Some(PathBuf::from(DEFAULT_JOBFILE));
    }
    None
}

fn run_jobfile(path: &Path, cli: &Cli, reporter: &mut dyn Reporter) -> (Tally, i32) {
    let parsed = match jobfile::parse_jobfile(path, reporter) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::error!("reading jobfile failed: {err:#}");
            return (Tally::new(1, 0), EXIT_JOBFILE);
        }
    };

    let mut tally = parsed.tally;
    if tally.errors > 0 && !cli.force_jobfile {
        return (tally, EXIT_JOBFILE);
    }

    // relative job paths resolve against the jobfile's directory
    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !base.is_dir() {
        log::error!("jobfile directory \"{}\" is not usable", base.display());
        return (tally, EXIT_WORKDIR);
    }

    tally += process_jobs(&parsed.jobs, &base, reporter);
    (tally, exit_code(tally))
}

fn run_single(cli: &Cli, reporter: &mut dyn Reporter) -> (Tally, i32) {
    let job = match cli.job.to_job() {
        Ok(job) => job,
        Err(message) => {
            log::error!("{message}");
            return (Tally::new(1, 0), EXIT_INVALID_ARGS);
        }
    };

    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let tally = process_job(&job, &base, reporter);
    (tally, exit_code(tally))
}

fn exit_code(tally: Tally) -> i32 {
    if tally.errors == 0 {
        EXIT_OK
    } else {
        (EXIT_ERROR_BASE + tally.errors as i32).min(EXIT_MAX)
    }
}
