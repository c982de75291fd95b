use console::style;
use serde::Serialize;

use tagstrip_core::{Diagnostic, Reporter, Severity, Tally};

/// Column where severity labels start; keeps short positions aligned.
const POS_WIDTH: usize = 21;
const LABEL_WIDTH: usize = 9;

/// Renders diagnostics as colored `file:line:col: severity: message` lines.
#[derive(Default)]
pub(crate) struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&mut self, diag: &Diagnostic) {
        // widths are tracked on the plain text, the styling is invisible
        let mut width = diag.file.len() + 1;
        let mut line = format!("{}:", style(&diag.file).white().bright());

        if diag.line > 0 {
            let number = diag.line.to_string();
            width += number.len() + 1;
            line.push_str(&format!("{}:", style(&number).white().bright()));
        }
        if diag.col > 0 {
            if diag.line == 0 {
                width += 1;
                line.push(':');
            }
            let number = diag.col.to_string();
            width += number.len() + 1;
            line.push_str(&format!("{}:", style(&number).white().bright()));
        }

        line.push(' ');
        width += 1;
        while width < POS_WIDTH {
            line.push(' ');
            width += 1;
        }

        let label = match diag.severity {
            Severity::Error => style("error:").red().bright().bold(),
            Severity::Warning => style("warning:").yellow().bright().bold(),
            Severity::Info => style("info:").cyan().bright().bold(),
        };
        let plain_len = match diag.severity {
            Severity::Error => "error:".len(),
            Severity::Warning => "warning:".len(),
            Severity::Info => "info:".len(),
        };
        line.push_str(&label.to_string());
        for _ in plain_len..LABEL_WIDTH {
            line.push(' ');
        }

        line.push_str(&diag.message);
        println!("{line}");
    }
}

pub(crate) fn print_summary(tally: Tally) {
    println!(
        "\n   errors: {}   warnings: {}",
        style(tally.errors).red().bright(),
        style(tally.warnings).yellow().bright()
    );
}

/// Collects diagnostics for the machine-readable `--json` report.
#[derive(Default)]
pub(crate) struct JsonReporter {
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    ok: bool,
    errors: u32,
    warnings: u32,
    diagnostics: &'a [Diagnostic],
}

impl Reporter for JsonReporter {
    fn report(&mut self, diag: &Diagnostic) {
        self.diagnostics.push(diag.clone());
    }
}

impl JsonReporter {
    pub fn render(&self, tally: Tally) -> String {
        let report = JsonReport {
            ok: tally.errors == 0,
            errors: tally.errors,
            warnings: tally.warnings,
            diagnostics: &self.diagnostics,
        };
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    }
}
