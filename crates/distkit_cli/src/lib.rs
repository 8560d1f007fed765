//! distkit CLI: filtered tree mirroring and default-variant promotion.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use serde_json::json;

use distkit_io_fs::{
    EnumMirrorErrorPolicy, EnumMirrorPatternMode, EnumMirrorSymlinkStrategy, ReportMirror,
    SpecMirrorOptions, SpecPromoteOptions, mirror_tree, promote_files,
};

/// CLI entrypoint for distkit.
#[derive(Debug, Parser)]
#[command(
    name = "distkit",
    version,
    about = "Assemble distribution trees: filtered directory mirrors and default-variant promotion"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mirror the files of SOURCE selected by the include patterns into DESTINATION
    Mirror(MirrorArgs),
    /// Copy the files directly inside VARIANT_DIR into ALIAS_DIR
    Promote(PromoteArgs),
}

#[derive(Debug, Args)]
struct MirrorArgs {
    /// Source directory to scan
    #[arg(value_hint = ValueHint::DirPath)]
    source: PathBuf,

    /// Destination root (created if missing)
    #[arg(value_hint = ValueHint::DirPath)]
    destination: PathBuf,

    #[command(flatten)]
    patterns: PatternArgs,

    /// Exclude files whose name matches (repeatable, comma-separated)
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Prune directories whose name matches (repeatable, comma-separated)
    #[arg(long = "exclude-dir", value_delimiter = ',')]
    exclude_dir: Vec<String>,

    /// Symlink handling while walking SOURCE
    #[arg(long = "symlinks", default_value_t = SymlinkChoice::Dereference, value_enum)]
    symlinks: SymlinkChoice,

    /// Keep going after a failed entry and report all failures at the end
    #[arg(long = "collect-errors", action = ArgAction::SetTrue)]
    collect_errors: bool,

    /// Copy worker threads (0 picks a value from the CPU count)
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    jobs: usize,

    /// Also create destination directories that receive no file
    #[arg(long = "keep-empty-dirs", action = ArgAction::SetTrue)]
    keep_empty_dirs: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct PromoteArgs {
    /// Variant directory holding the default build
    #[arg(value_hint = ValueHint::DirPath)]
    variant_dir: PathBuf,

    /// Alias directory receiving the promoted files
    #[arg(value_hint = ValueHint::DirPath)]
    alias_dir: PathBuf,

    #[command(flatten)]
    patterns: PatternArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct PatternArgs {
    /// Include files whose name matches (repeatable, comma-separated); default: all files
    #[arg(short = 'i', long = "include", value_delimiter = ',')]
    include: Vec<String>,

    /// How include/exclude patterns are interpreted
    #[arg(short = 'm', long = "mode", default_value_t = PatternModeChoice::Extension, value_enum)]
    mode: PatternModeChoice,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Copy permissions and timestamps along with file contents
    #[arg(long = "preserve-metadata", action = ArgAction::SetTrue)]
    preserve_metadata: bool,

    /// Walk and report without writing anything
    #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Emit the report as a JSON object
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PatternModeChoice {
    Extension,
    Glob,
    Regex,
    Literal,
}

impl From<PatternModeChoice> for EnumMirrorPatternMode {
    fn from(choice: PatternModeChoice) -> Self {
        match choice {
            PatternModeChoice::Extension => Self::Extension,
            PatternModeChoice::Glob => Self::Glob,
            PatternModeChoice::Regex => Self::Regex,
            PatternModeChoice::Literal => Self::Literal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SymlinkChoice {
    Dereference,
    Skip,
    Error,
}

impl From<SymlinkChoice> for EnumMirrorSymlinkStrategy {
    fn from(choice: SymlinkChoice) -> Self {
        match choice {
            SymlinkChoice::Dereference => Self::Dereference,
            SymlinkChoice::Skip => Self::SkipSymlinks,
            SymlinkChoice::Error => Self::Error,
        }
    }
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    distkit_log::init_tracing(distkit_log::level_from_verbosity(cli.verbose, cli.quiet));

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    run_command(cli.command, &mut handle)
}

fn run_command(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Mirror(args) => run_mirror(args, out),
        Command::Promote(args) => run_promote(args, out),
    }
}

fn non_empty(patterns: &[String]) -> Option<Vec<String>> {
    if patterns.is_empty() {
        None
    } else {
        Some(patterns.to_vec())
    }
}

fn build_mirror_options(args: &MirrorArgs) -> SpecMirrorOptions {
    SpecMirrorOptions {
        patterns_include_files: non_empty(&args.patterns.include),
        patterns_exclude_files: non_empty(&args.exclude),
        patterns_exclude_dirs: non_empty(&args.exclude_dir),
        rule_pattern: args.patterns.mode.into(),
        rule_symlink: args.symlinks.into(),
        rule_error: if args.collect_errors {
            EnumMirrorErrorPolicy::Collect
        } else {
            EnumMirrorErrorPolicy::Abort
        },
        num_workers_max: if args.jobs == 0 {
            None
        } else {
            Some(args.jobs)
        },
        if_keep_empty_dirs: args.keep_empty_dirs,
        if_preserve_metadata: args.output.preserve_metadata,
        if_dry_run: args.output.dry_run,
    }
}

fn build_promote_options(args: &PromoteArgs) -> SpecPromoteOptions {
    SpecPromoteOptions {
        patterns_include_files: non_empty(&args.patterns.include),
        rule_pattern: args.patterns.mode.into(),
        if_preserve_metadata: args.output.preserve_metadata,
        if_dry_run: args.output.dry_run,
    }
}

fn run_mirror(args: MirrorArgs, out: &mut impl Write) -> Result<()> {
    let spec_mirror_options = build_mirror_options(&args);
    let report = mirror_tree(&args.source, &args.destination, spec_mirror_options)
        .with_context(|| {
            format!(
                "mirror {} -> {} failed",
                args.source.display(),
                args.destination.display()
            )
        })?;
    write_report(out, &report, "[MIRROR]", &args.output)?;
    ensure_no_entry_errors(&report)
}

fn run_promote(args: PromoteArgs, out: &mut impl Write) -> Result<()> {
    let spec_promote_options = build_promote_options(&args);
    let report = promote_files(&args.variant_dir, &args.alias_dir, spec_promote_options)
        .with_context(|| {
            format!(
                "promote {} -> {} failed",
                args.variant_dir.display(),
                args.alias_dir.display()
            )
        })?;
    write_report(out, &report, "[PROMOTE]", &args.output)
}

fn write_report(
    out: &mut impl Write,
    report: &ReportMirror,
    prefix: &str,
    args: &OutputArgs,
) -> Result<()> {
    if args.json {
        let l_errors: Vec<_> = report
            .errors
            .iter()
            .map(|e| {
                json!({
                    "path": e.path.display().to_string(),
                    "operation": e.operation.as_str(),
                    "exception": e.exception,
                })
            })
            .collect();
        let l_planned: Vec<String> = report
            .paths_planned
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let value = json!({
            "counts": report.to_dict(),
            "planned": l_planned,
            "warnings": report.warnings,
            "errors": l_errors,
            "dry_run": args.dry_run,
        });
        serde_json::to_writer_pretty(&mut *out, &value)?;
        writeln!(out)?;
        return Ok(());
    }

    if args.dry_run {
        for path in &report.paths_planned {
            writeln!(out, "{}", path.display())?;
        }
    }
    writeln!(out, "{}", report.format(prefix))?;
    Ok(())
}

fn ensure_no_entry_errors(report: &ReportMirror) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    for spec_error in &report.errors {
        eprintln!("  {spec_error}");
    }
    bail!("{} entries failed", report.error_count())
}

#[cfg(test)]
mod tests;
