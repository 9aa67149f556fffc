//! jfence command-line interface
//!
//! Scans compiled JVM class files for uses of `@Restricted` symbols and
//! reports every use the declared policies prohibit. Stands in for a build
//! tool binding: the classpath is passed explicitly and the exit status
//! carries the verdict.

use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};

use jfence_checker::{Checker, Classpath, ErrorListener, Location, Report, Severity};

mod output;

use output::{resolve_color_choice, StyledOutput};

#[derive(Parser)]
#[command(name = "jfence")]
#[command(about = "Access-restriction checker for JVM class files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check class files against the restrictions on their classpath
    Check {
        /// Class file or directory of class files to inspect
        root: PathBuf,
        /// Classpath entry (directory or jar); repeatable
        #[arg(short = 'c', long = "classpath", value_name = "PATH")]
        classpath: Vec<PathBuf>,
        /// Extra restriction list whose entries count as the inspected
        /// module's own
        #[arg(long, value_name = "FILE")]
        module_index: Option<PathBuf>,
        /// Property passed through to policies, as key=value; repeatable
        #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
        properties: Vec<String>,
        /// Report violations but exit successfully anyway
        #[arg(long)]
        no_fail_on_error: bool,
        /// Skip the check entirely
        #[arg(long)]
        skip: bool,
        /// Output format for findings
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Color output: auto, always, never
        #[arg(long, value_name = "WHEN")]
        color: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human-readable diagnostics on stderr
    Text,
    /// JSON report array on stdout
    Json,
}

/// Streams findings to the terminal as they arrive and keeps them for the
/// final report and the exit status.
struct ConsoleListener {
    out: StyledOutput,
    reports: Vec<Report>,
    render: bool,
}

impl ConsoleListener {
    fn new(out: StyledOutput, render: bool) -> Self {
        Self {
            out,
            reports: Vec::new(),
            render,
        }
    }

    fn report(
        &mut self,
        severity: Severity,
        cause: Option<&dyn Error>,
        location: Option<&Location<'_>>,
        message: &str,
    ) {
        let report = Report {
            severity,
            location: location.map(|l| l.to_string()),
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        };
        if self.render {
            match severity {
                Severity::Error => self.out.error_label(),
                Severity::Warning => self.out.warning_label(),
            }
            self.out.text(": ");
            if let Some(location) = &report.location {
                self.out.location(location);
                self.out.text(": ");
            }
            self.out.text(&report.message);
            if let Some(cause) = &report.cause {
                self.out.text(" (");
                self.out.dim(cause);
                self.out.text(")");
            }
            self.out.newline();
        }
        self.reports.push(report);
    }

    fn error_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.severity == Severity::Error)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.reports.len() - self.error_count()
    }
}

impl ErrorListener for ConsoleListener {
    fn on_error(&mut self, cause: Option<&dyn Error>, location: Option<&Location<'_>>, msg: &str) {
        self.report(Severity::Error, cause, location, msg);
    }

    fn on_warning(&mut self, cause: Option<&dyn Error>, location: Option<&Location<'_>>, msg: &str) {
        self.report(Severity::Warning, cause, location, msg);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check {
            root,
            classpath,
            module_index,
            properties,
            no_fail_on_error,
            skip,
            format,
            color,
        } => {
            let out = StyledOutput::new(resolve_color_choice(color.as_deref()));
            match run_check(
                root,
                classpath,
                module_index,
                properties,
                no_fail_on_error,
                skip,
                format,
                out,
            ) {
                Ok(code) => code,
                Err(e) => {
                    let mut out = StyledOutput::new(resolve_color_choice(color.as_deref()));
                    out.failure(&format!("error: {e:#}"));
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_check(
    root: PathBuf,
    classpath: Vec<PathBuf>,
    module_index: Option<PathBuf>,
    properties: Vec<String>,
    no_fail_on_error: bool,
    skip: bool,
    format: Format,
    mut out: StyledOutput,
) -> anyhow::Result<ExitCode> {
    if skip {
        out.success("check skipped");
        return Ok(ExitCode::SUCCESS);
    }

    let properties = parse_properties(&properties)?;

    // The inspected classes come first so their resources shadow dependency
    // resources the way a build tool's class loader would order them.
    let mut entries = Vec::with_capacity(classpath.len() + 1);
    if root.is_dir() {
        entries.push(root.clone());
    }
    entries.extend(classpath);
    let resolver = Classpath::new(entries).context("failed to open classpath")?;

    let mut listener = ConsoleListener::new(out, format == Format::Text);
    let mut checker = Checker::new(resolver, properties);
    checker
        .load_access_restrictions(&mut listener)
        .context("failed to load access restrictions")?;

    // Entries advertised by the inspected module itself are reloaded as
    // in-module so module-scoped policies can exempt them.
    if root.is_dir() {
        let own = Classpath::new(vec![root.clone()]).context("failed to open module root")?;
        checker
            .load_module_restrictions(&own, &mut listener)
            .context("failed to load module restrictions")?;
    }
    if let Some(path) = module_index {
        let list = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        checker
            .load_restriction_list(&list, true, &mut listener)
            .context("failed to load module index")?;
    }

    checker
        .check(&root, &mut listener)
        .with_context(|| format!("failed to check {}", root.display()))?;

    let errors = listener.error_count();
    let warnings = listener.warning_count();
    let mut out = listener.out;

    if format == Format::Json {
        let rendered = serde_json::to_string_pretty(&listener.reports)?;
        out.stdout_line(&rendered);
    }

    let summary = format!("{errors} error(s), {warnings} warning(s)");
    if errors > 0 {
        out.failure(&summary);
    } else {
        out.success(&summary);
    }
    out.flush();

    if errors > 0 && !no_fail_on_error {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_properties(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut properties = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid property {pair:?}, expected key=value");
        };
        properties.insert(key.to_string(), value.to_string());
    }
    Ok(properties)
}
