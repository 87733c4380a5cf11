//! bsonsift - Validate, analyze and repair BSON dump files
//!
//! Works on files of concatenated BSON documents as written by `mongodump`.
//! Reports go to stdout; progress and per-document warnings go to stderr
//! through the log.

use anyhow::{Context, Result};
use bsonsift_core::analyze::{DateRange, SetDiff};
use bsonsift_core::{
    analyze_file, check_paths, compare_files, validate_file, AnalysisStats, DiffReport, Document,
    ExportConfig, LogProgress, NullProgress, Progress, Transform, TransformReport,
    ValidationReport, Value,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Validate, analyze and repair files of concatenated BSON documents
#[derive(Parser, Debug)]
#[command(name = "bsonsift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print reports and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: ReportFormat,

    /// Log a progress line every N documents (0 = never)
    #[arg(
        long,
        env = "BSONSIFT_PROGRESS_INTERVAL",
        default_value = "1000",
        global = true
    )]
    progress_interval: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that every document frames and decodes
    Validate {
        /// BSON file to check
        input: PathBuf,
    },

    /// Print field, type and size statistics
    Analyze {
        /// BSON file to analyze
        input: PathBuf,
    },

    /// Compare the structure of two files
    Compare {
        /// Baseline file
        first: PathBuf,
        /// File compared against the baseline
        second: PathBuf,
    },

    /// Convert to an Extended JSON array
    Export {
        /// BSON file to convert
        input: PathBuf,
        /// JSON file to create
        output: PathBuf,
        /// Spaces per indentation level
        #[arg(long, default_value = "2")]
        indent: usize,
    },

    /// Remove documents with identical content
    Dedup {
        /// BSON file to read
        input: PathBuf,
        /// BSON file to create
        output: PathBuf,
    },

    /// Keep documents 0 through LIMIT
    Trim {
        /// BSON file to read
        input: PathBuf,
        /// BSON file to create
        output: PathBuf,
        /// Zero-based index of the last document to keep
        #[arg(short, long)]
        limit: u64,
    },

    /// Remove documents that fail to decode
    Clean {
        /// BSON file to read
        input: PathBuf,
        /// BSON file to create
        output: PathBuf,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    /// Human-readable summary
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

/// Reports nesting no deeper than this are rendered on the calling thread
const INLINE_RENDER_DEPTH: usize = 256;

/// Stack reserved per nesting level when rendering on a dedicated thread
const STACK_PER_LEVEL: usize = 8 * 1024;

const BASE_RENDER_STACK: usize = 2 * 1024 * 1024;

/// A report printable in every [`ReportFormat`]
trait Report: Serialize + Sync {
    /// Deepest document nesting held by the report
    fn nesting(&self) -> usize {
        0
    }
}

impl Report for ValidationReport {}
impl Report for DiffReport {}
impl Report for TransformReport {}

impl Report for AnalysisStats {
    fn nesting(&self) -> usize {
        self.sample_documents
            .iter()
            .map(Document::depth)
            .max()
            .unwrap_or(0)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.global.quiet {
        Level::ERROR
    } else {
        match cli.global.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command; `Ok(false)` means it ran but found the input unsound
fn execute(cli: &Cli) -> Result<bool> {
    let mut progress = progress_sink(&cli.global);
    let format = cli.global.format;

    match &cli.command {
        Command::Validate { input } => {
            check_paths(input, None)?;
            let report = validate_file(input, progress.as_mut())
                .with_context(|| format!("Failed to validate {}", input.display()))?;
            emit(format, &report, print_validation)?;
            Ok(report.integrity_check)
        }
        Command::Analyze { input } => {
            check_paths(input, None)?;
            let stats = analyze_file(input, progress.as_mut())
                .with_context(|| format!("Failed to analyze {}", input.display()))?;
            emit(format, &stats, print_analysis)?;
            Ok(true)
        }
        Command::Compare { first, second } => {
            check_paths(first, None)?;
            check_paths(second, None)?;
            let diff = compare_files(first, second, progress.as_mut()).with_context(|| {
                format!("Failed to compare {} and {}", first.display(), second.display())
            })?;
            emit(format, &diff, print_diff)?;
            Ok(true)
        }
        Command::Export {
            input,
            output,
            indent,
        } => {
            let config = ExportConfig::new().indent(" ".repeat(*indent));
            transform(cli, Transform::Export(config), input, output, progress.as_mut())
        }
        Command::Dedup { input, output } => {
            transform(cli, Transform::Deduplicate, input, output, progress.as_mut())
        }
        Command::Trim {
            input,
            output,
            limit,
        } => transform(cli, Transform::Trim { limit: *limit }, input, output, progress.as_mut()),
        Command::Clean { input, output } => {
            transform(cli, Transform::Clean, input, output, progress.as_mut())
        }
    }
}

fn progress_sink(global: &GlobalArgs) -> Box<dyn Progress> {
    if global.quiet {
        Box::new(NullProgress)
    } else {
        Box::new(LogProgress::new(global.progress_interval))
    }
}

fn transform(
    cli: &Cli,
    transform: Transform,
    input: &Path,
    output: &Path,
    progress: &mut dyn Progress,
) -> Result<bool> {
    check_paths(input, Some(output))?;
    debug!("Running {:?}", transform);

    let report = transform.apply_file(input, output, progress).map_err(|e| {
        if output.exists() {
            info!("Leaving partial output at {}", output.display());
        }
        anyhow::Error::new(e).context(format!("Failed to process {}", input.display()))
    })?;

    emit(cli.global.format, &report, |report| {
        print_transform(report, output)
    })?;
    Ok(true)
}

/// Print a report in `format`, using `text` for the human-readable form
fn emit<T: Report>(format: ReportFormat, report: &T, text: impl FnOnce(&T) + Send) -> Result<()> {
    with_stack_for(report.nesting(), || -> Result<()> {
        match render(format, report)? {
            Some(rendered) => println!("{}", rendered.trim_end()),
            None => text(report),
        }
        Ok(())
    })?
}

/// Structured rendering of a report; `None` for the text format
fn render<T: Serialize>(format: ReportFormat, report: &T) -> Result<Option<String>> {
    let rendered = match format {
        ReportFormat::Text => return Ok(None),
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to render report as JSON")?
        }
        ReportFormat::Yaml => {
            serde_yaml::to_string(report).context("Failed to render report as YAML")?
        }
    };
    Ok(Some(rendered))
}

/// Runs `f` where serializing `depth` nested levels cannot exhaust the stack.
///
/// Serialization recurses once per level, so deep reports get a thread
/// whose stack grows with the depth.
fn with_stack_for<T: Send>(depth: usize, f: impl FnOnce() -> T + Send) -> Result<T> {
    if depth <= INLINE_RENDER_DEPTH {
        return Ok(f());
    }
    let stack_size = depth
        .saturating_mul(STACK_PER_LEVEL)
        .saturating_add(BASE_RENDER_STACK);
    debug!("Rendering {} nesting levels with a {} byte stack", depth, stack_size);

    std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("render".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, f)
            .context("Failed to start render thread")?;
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("Render thread panicked"))
    })
}

fn print_validation(report: &ValidationReport) {
    println!("Valid documents:   {}", report.valid_documents);
    println!("Invalid documents: {}", report.invalid_documents);
    println!(
        "Integrity check:   {}",
        if report.integrity_check { "passed" } else { "FAILED" }
    );
    print_list("Errors", &report.errors);
    print_list("Warnings", &report.warnings);
}

fn print_analysis(stats: &AnalysisStats) {
    println!("Documents:         {}", stats.total_documents);
    if stats.skipped_documents > 0 {
        println!("Skipped:           {}", stats.skipped_documents);
    }
    println!("Total size:        {} bytes", stats.total_size_bytes);
    println!("Average size:      {:.1} bytes", stats.avg_doc_size_bytes);
    if let Some(range) = format_date_range(&stats.date_range) {
        println!("Date range:        {}", range);
    }

    println!("Fields:");
    for (path, count) in &stats.field_names {
        let marker = if stats.array_fields.contains(path) { " []" } else { "" };
        println!("  {path}{marker}: {count}");
    }

    println!("Types:");
    for (name, count) in &stats.data_types {
        println!("  {name}: {count}");
    }

    if !stats.sample_documents.is_empty() {
        println!("Samples:");
        for doc in &stats.sample_documents {
            match serde_json::to_string(doc) {
                Ok(json) => println!("  {json}"),
                Err(e) => println!("  <unprintable: {e}>"),
            }
        }
    }
}

fn format_date_range(range: &DateRange) -> Option<String> {
    let render = |millis: i64| match serde_json::to_value(Value::DateTime(millis)) {
        Ok(serde_json::Value::Object(map)) => match map.get("$date") {
            Some(serde_json::Value::String(iso)) => iso.clone(),
            _ => millis.to_string(),
        },
        _ => millis.to_string(),
    };
    match (range.min, range.max) {
        (Some(min), Some(max)) => Some(format!("{} .. {}", render(min), render(max))),
        _ => None,
    }
}

fn print_diff(diff: &DiffReport) {
    println!("Document count:    {:+}", diff.document_count_diff);
    println!("Total size:        {:+} bytes", diff.size_diff_bytes);
    print_set_diff("Fields", &diff.field_differences);
    print_set_diff("Types", &diff.type_differences);
}

fn print_set_diff(title: &str, diff: &SetDiff) {
    if diff.is_empty() {
        println!("{title}: unchanged");
        return;
    }
    println!("{title}:");
    for added in &diff.added {
        println!("  + {added}");
    }
    for removed in &diff.removed {
        println!("  - {removed}");
    }
}

fn print_transform(report: &TransformReport, output: &Path) {
    println!(
        "Wrote {} of {} documents to {}",
        report.written,
        report.processed,
        output.display()
    );
    if report.skipped > 0 {
        println!("Skipped {} undecodable documents", report.skipped);
    }
    if report.dropped() > 0 {
        println!("Dropped {} documents", report.dropped());
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{title}:");
    for item in items {
        println!("  - {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn document(key: &str, value: i32) -> Vec<u8> {
        let mut body = vec![0x10];
        body.extend_from_slice(key.as_bytes());
        body.push(0);
        body.extend_from_slice(&value.to_le_bytes());
        body.push(0);
        let mut doc = ((body.len() + 4) as i32).to_le_bytes().to_vec();
        doc.extend_from_slice(&body);
        doc
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bsonsift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_trim_requires_limit() {
        let result = Cli::try_parse_from(["bsonsift", "trim", "in.bson", "out.bson"]);
        assert!(result.is_err());

        let cli = parse(&["trim", "in.bson", "out.bson", "--limit", "9"]);
        assert!(matches!(cli.command, Command::Trim { limit: 9, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["validate", "in.bson", "--format", "json", "-vv"]);
        assert_eq!(cli.global.format, ReportFormat::Json);
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["bsonsift", "-q", "-v", "validate", "in.bson"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_exit_status() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.bson");
        let bad = temp_dir.path().join("bad.bson");
        std::fs::write(&good, document("a", 1)).unwrap();
        let mut damaged = document("a", 1);
        damaged.extend_from_slice(&[2, 0, 0, 0]);
        std::fs::write(&bad, damaged).unwrap();

        let cli = parse(&["-q", "validate", good.to_str().unwrap()]);
        assert!(execute(&cli).unwrap());
        let cli = parse(&["-q", "validate", bad.to_str().unwrap()]);
        assert!(!execute(&cli).unwrap());
    }

    #[test]
    fn test_trim_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.bson");
        let output = temp_dir.path().join("out.bson");
        let docs: Vec<u8> = (0..4).flat_map(|n| document("n", n)).collect();
        std::fs::write(&input, &docs).unwrap();

        let cli = parse(&[
            "-q",
            "trim",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--limit",
            "1",
        ]);
        assert!(execute(&cli).unwrap());

        let mut expected = document("n", 0);
        expected.extend(document("n", 1));
        assert_eq!(std::fs::read(&output).unwrap(), expected);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.bson");
        let output = temp_dir.path().join("out.bson");
        std::fs::write(&input, document("a", 1)).unwrap();
        std::fs::write(&output, b"existing").unwrap();

        let cli = parse(&["-q", "clean", input.to_str().unwrap(), output.to_str().unwrap()]);
        let err = execute(&cli).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read(&output).unwrap(), b"existing");
    }

    #[test]
    fn test_date_range_rendering() {
        let range = DateRange {
            min: Some(0),
            max: Some(86_400_000),
        };
        assert_eq!(
            format_date_range(&range).as_deref(),
            Some("1970-01-01T00:00:00.000Z .. 1970-01-02T00:00:00.000Z")
        );
        assert_eq!(format_date_range(&DateRange::default()), None);
    }

    #[test]
    fn test_yaml_report_parses_back() {
        let cli = parse(&["analyze", "in.bson", "--format", "yaml"]);
        assert_eq!(cli.global.format, ReportFormat::Yaml);

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.bson");
        let docs: Vec<u8> = (0..3).flat_map(|n| document("n", n)).collect();
        std::fs::write(&input, &docs).unwrap();
        let stats = analyze_file(&input, &mut NullProgress).unwrap();

        let yaml = render(ReportFormat::Yaml, &stats).unwrap().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["total_documents"].as_u64(), Some(3));
        assert_eq!(parsed["field_names"]["n"].as_u64(), Some(3));
        assert_eq!(parsed["sample_documents"][2]["n"].as_i64(), Some(2));

        let report = TransformReport {
            processed: 4,
            written: 3,
            skipped: 1,
        };
        let yaml = render(ReportFormat::Yaml, &report).unwrap().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["written"].as_u64(), Some(3));
        assert_eq!(parsed["skipped"].as_u64(), Some(1));

        assert_eq!(render(ReportFormat::Text, &report).unwrap(), None);
    }

    #[test]
    fn test_deep_sample_renders_on_sized_stack() {
        let depth = 5_000;
        let mut sample = Document::new();
        for _ in 0..depth {
            let mut outer = Document::new();
            outer.insert("0", Value::Document(sample));
            sample = outer;
        }
        let stats = AnalysisStats {
            total_documents: 1,
            sample_documents: vec![sample],
            ..AnalysisStats::default()
        };
        assert_eq!(stats.nesting(), depth + 1);

        let json = with_stack_for(stats.nesting(), || render(ReportFormat::Json, &stats))
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(json.matches("\"0\"").count(), depth);
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
