use std::path::{Path, PathBuf};

use clap::Args;

use tagstrip_core::{tag_for_extension, Job, JobMode, TAG_BASH, TAG_BATCH, TAG_CPP};

/// Per-job arguments, shared between the command line and jobfile lines.
#[derive(Args, Debug, Clone)]
pub(crate) struct JobArgs {
    /// Input file
    #[arg(long = "in", short = 'i', value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file
    #[arg(long = "out", short = 'o', value_name = "FILE", conflicts_with = "out_dir")]
    pub output: Option<PathBuf>,

    /// Output directory (same filename)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Tag: cpp, bash, batch or custom:<tag> (default: by input extension)
    #[arg(long, short = 't', value_name = "TAG")]
    pub tag: Option<String>,

    /// Treat warnings as errors
    #[arg(long)]
    pub werror: bool,

    /// Warning IDs to suppress, comma separated
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub wsup: Vec<u32>,

    /// Copy instead of processing, only if the output is older
    #[arg(long, conflicts_with = "copy_overwrite")]
    pub copy: bool,

    /// Copy instead of processing, always overwriting
    #[arg(long)]
    pub copy_overwrite: bool,

    /// On failure, write TEXT to the output instead of deleting it
    #[arg(long, value_name = "TEXT")]
    pub error_line: Option<String>,
}

impl JobArgs {
    /// Builds the core job, or a human-readable reason it cannot be built.
    pub fn to_job(&self) -> Result<Job, String> {
        let input = self.input.clone().ok_or("missing input file")?;

        let output = match (&self.output, &self.out_dir) {
            (Some(file), None) => file.clone(),
            (None, Some(dir)) => {
                let name = input
                    .file_name()
                    .ok_or_else(|| format!("invalid input filename: \"{}\"", input.display()))?;
                dir.join(name)
            }
            (None, None) => return Err("missing output (--out or --out-dir)".to_string()),
            (Some(_), Some(_)) => return Err("both --out and --out-dir given".to_string()),
        };

        let tag = resolve_tag(self.tag.as_deref(), &input)?;

        let mode = if self.copy_overwrite {
            JobMode::CopyOverwrite
        } else if self.copy {
            JobMode::Copy
        } else {
            JobMode::Process
        };

        let job = Job::new(input, output, tag)
            .map_err(|err| err.to_string())?
            .with_mode(mode)
            .with_warn_as_error(self.werror)
            .with_suppressed_warnings(self.wsup.iter().copied())
            .with_error_line_text(self.error_line.clone());

        Ok(job)
    }
}

/// An explicit tag wins; otherwise the input extension decides.
fn resolve_tag(arg: Option<&str>, input: &Path) -> Result<String, String> {
    if let Some(value) = arg {
        if let Some(custom) = value.strip_prefix("custom:") {
            return Ok(custom.to_string());
        }
        return match value {
            "cpp" => Ok(TAG_CPP.to_string()),
            "bash" => Ok(TAG_BASH.to_string()),
            "batch" => Ok(TAG_BATCH.to_string()),
            other => Err(format!("unknown tag \"{other}\"")),
        };
    }

    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    tag_for_extension(ext)
        .map(str::to_string)
        .ok_or_else(|| "unable to determine tag".to_string())
}
