use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nova_config::{load_for_workspace, NovaConfig};
use nova_stream_migration::{apply_text_edits, MigrationFinding, StreamApiMigrationInspection};
use nova_types::Severity;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nova", version, about = "Nova CLI (loop-to-stream migration)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report loops that can be replaced with a stream pipeline
    Check(CheckArgs),
    /// Rewrite loops into stream pipelines in place
    Fix(FixArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// A `.java` file or a directory to scan recursively
    path: PathBuf,
    /// Config file (defaults to `nova.toml` in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct FixArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Print what would change without writing files
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Check(args) => {
            let (config, inspection) = setup(&args.common)?;
            let report = check(&inspection, &args.common.path)?;
            tracing::debug!(
                target: "nova.cli",
                files = report.summary.files_scanned,
                findings = report.summary.findings,
                level = %config.stream_migration.language_level,
                "check finished"
            );
            let exit = if report.summary.warnings > 0 { 1 } else { 0 };
            print_check(&report, args.common.json)?;
            Ok(exit)
        }
        Command::Fix(args) => {
            let (_, inspection) = setup(&args.common)?;
            let report = fix(&inspection, &args.common.path, args.dry_run)?;
            print_fix(&report, args.common.json)?;
            Ok(0)
        }
    }
}

fn setup(args: &CommonArgs) -> Result<(NovaConfig, StreamApiMigrationInspection)> {
    let config = match &args.config {
        Some(path) => NovaConfig::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            load_for_workspace(&cwd)?.0
        }
    };
    nova_config::init_tracing(&config.logging);
    let inspection = StreamApiMigrationInspection::new(config.inspection_options());
    Ok((config, inspection))
}

/// `.java` files under `path`, sorted for stable output.
fn java_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        anyhow::bail!("path does not exist: {}", path.display());
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "java") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// 1-based line and column of a byte offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

#[derive(Debug, Serialize)]
struct CheckReport {
    findings: Vec<FindingReport>,
    summary: CheckSummary,
}

#[derive(Debug, Default, Serialize)]
struct CheckSummary {
    files_scanned: usize,
    findings: usize,
    warnings: usize,
}

#[derive(Debug, Serialize)]
struct FindingReport {
    file: PathBuf,
    line: usize,
    column: usize,
    severity: Severity,
    code: &'static str,
    message: String,
    fixes: Vec<String>,
}

impl FindingReport {
    fn new(file: &Path, text: &str, finding: &MigrationFinding) -> Self {
        let offset = finding.diagnostic.span.map_or(0, |span| span.start);
        let (line, column) = line_col(text, offset);
        Self {
            file: file.to_path_buf(),
            line,
            column,
            severity: finding.diagnostic.severity,
            code: finding.diagnostic.code,
            message: finding.diagnostic.message.clone(),
            fixes: finding.fixes.iter().map(|fix| fix.name.clone()).collect(),
        }
    }
}

fn check(inspection: &StreamApiMigrationInspection, path: &Path) -> Result<CheckReport> {
    let mut report = CheckReport {
        findings: Vec::new(),
        summary: CheckSummary::default(),
    };
    for file in java_files(path)? {
        let text = read_source(&file)?;
        report.summary.files_scanned += 1;
        for finding in inspection.check_text(&text) {
            if finding.diagnostic.severity == Severity::Warning {
                report.summary.warnings += 1;
            }
            report.findings.push(FindingReport::new(&file, &text, &finding));
        }
    }
    report.summary.findings = report.findings.len();
    Ok(report)
}

fn print_check(report: &CheckReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for finding in &report.findings {
        println!(
            "{}:{}:{}: {}[{}] {}",
            finding.file.display(),
            finding.line,
            finding.column,
            finding.severity.as_str(),
            finding.code,
            finding.message
        );
    }
    println!(
        "summary: {} files, {} findings",
        report.summary.files_scanned, report.summary.findings
    );
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct FixReport {
    files: Vec<FixedFile>,
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct FixedFile {
    file: PathBuf,
    applied: Vec<String>,
}

/// Applies the first fix of one finding at a time and inspects the file
/// again, so fixes of nested loops never see stale offsets.
fn fix_text(inspection: &StreamApiMigrationInspection, text: &str) -> Result<(String, Vec<String>)> {
    let mut text = text.to_string();
    let mut applied = Vec::new();
    let budget = text.matches("for").count() + text.matches("while").count();
    for _ in 0..=budget {
        let findings = inspection.check_text(&text);
        let Some(fix) = findings
            .iter()
            .filter(|f| f.diagnostic.severity == Severity::Warning)
            .find_map(|f| f.fixes.first())
        else {
            break;
        };
        text = apply_text_edits(&text, &fix.edits).context("fix produced invalid edits")?;
        applied.push(fix.name.clone());
    }
    Ok((text, applied))
}

fn fix(inspection: &StreamApiMigrationInspection, path: &Path, dry_run: bool) -> Result<FixReport> {
    let mut report = FixReport {
        dry_run,
        ..FixReport::default()
    };
    for file in java_files(path)? {
        let original = read_source(&file)?;
        let (fixed, applied) = fix_text(inspection, &original)?;
        if applied.is_empty() {
            continue;
        }
        if !dry_run {
            std::fs::write(&file, fixed).with_context(|| format!("failed to write {}", file.display()))?;
        }
        report.files.push(FixedFile { file, applied });
    }
    Ok(report)
}

fn print_fix(report: &FixReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let verb = if report.dry_run { "would fix" } else { "fixed" };
    for file in &report.files {
        println!("{verb}: {} ({} loops)", file.file.display(), file.applied.len());
        for name in &file.applied {
            println!("  {name}");
        }
    }
    let loops: usize = report.files.iter().map(|f| f.applied.len()).sum();
    println!("summary: {} files, {} loops", report.files.len(), loops);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let text = "class A {\n  void m() {\n    for (;;) {}\n  }\n}\n";
        let offset = text.find("for").unwrap();
        assert_eq!(line_col(text, offset), (3, 5));
        assert_eq!(line_col(text, 0), (1, 1));
    }
}
