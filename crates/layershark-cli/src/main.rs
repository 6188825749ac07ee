use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use layershark_core::{
    CaptureReport, InputInfo, NamespaceMatching, PcapFileSource, SessionConfig, dissect_source,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("LAYERSHARK_BUILD_COMMIT"),
    ", ",
    env!("LAYERSHARK_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "layershark")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Layered packet dissector for PCAP/PCAPNG captures.",
    long_about = None,
    after_help = "Examples:\n  layershark pcap dissect capture.pcapng -o report.json\n  layershark pcap dissect capture.pcap --stdout --pretty\n  layershark pcap dissect capture.pcapng --query tcp.dst"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on PCAP/PCAPNG inputs.
    Pcap {
        #[command(subcommand)]
        command: PcapCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PcapCommands {
    /// Dissect every packet of a capture into a layered JSON report.
    #[command(
        after_help = "Examples:\n  layershark pcap dissect capture.pcapng -o report.json\n  layershark pcap dissect 'captures/*.pcapng' --stdout --compact\n  layershark pcap dissect capture.pcap --query ipv6.src --link raw"
    )]
    Dissect(DissectArgs),
}

#[derive(Args, Debug)]
struct DissectArgs {
    /// Path (or glob matching one file) to a .pcap or .pcapng file
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(
        short = 'o',
        long,
        required_unless_present_any = ["stdout", "query"]
    )]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Worker threads for stateless dissection
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Print `frame<TAB>layer<TAB>value` for every frame carrying this attribute
    #[arg(long, value_name = "TOKEN")]
    query: Option<String>,

    /// Session settings (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Force the link dissector instead of deriving it from the capture
    #[arg(long, value_name = "NAME")]
    link: Option<String>,

    /// Match plain dissector namespaces exactly instead of by prefix
    #[arg(long)]
    exact_namespaces: bool,

    /// Maximum number of layers below the root
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Pcap { command } => match command {
            PcapCommands::Dissect(args) => cmd_pcap_dissect(args),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_pcap_dissect(args: DissectArgs) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    if let Some(report_path) = args.report.as_ref() {
        ensure_distinct_output(report_path, &input_abs)?;
    }

    let config = session_config(&args)?;
    debug!(?config, input = %resolved_input.display(), "dissecting capture");

    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    let source = PcapFileSource::open(&resolved_input)
        .with_context(|| format!("Failed to open capture: {}", resolved_input.display()))?;
    let capture = dissect_source(source, &config, args.threads)
        .context("PCAP/PCAPNG dissection failed")?;

    if let Some(token) = args.query.as_deref() {
        for hit in capture.query(token) {
            println!("{}\t{}\t{}", hit.frame, hit.layer, hit.value);
        }
        if args.report.is_none() && !args.stdout {
            return Ok(());
        }
    }

    let rep = capture.to_report(InputInfo {
        path: resolved_input.display().to_string(),
        bytes: meta.len(),
    });
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    let Some(report) = args.report else {
        print!("{}", json);
        return Ok(());
    };
    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }

    fs::write(&report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;

    if !args.quiet {
        eprintln!(
            "OK: {} frames dissected -> {}",
            rep.frames.len(),
            report.display()
        );
    }
    Ok(())
}

/// Config file first, then command-line overrides.
fn session_config(args: &DissectArgs) -> Result<SessionConfig, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => SessionConfig::from_toml_file(path).map_err(|err| {
            CliError::new(
                format!("invalid config '{}': {}", path.display(), err),
                Some("check the TOML keys: link, enabled, matching, max_depth, options".to_string()),
            )
        })?,
        None => SessionConfig::default(),
    };
    if let Some(link) = args.link.as_ref() {
        config.link = Some(link.clone());
    }
    if args.exact_namespaces {
        config.matching = NamespaceMatching::Exact;
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    config.validate().map_err(|err| {
        CliError::new(
            format!("invalid session settings: {err}"),
            Some("--max-depth must be at least 1".to_string()),
        )
    })?;
    Ok(config)
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_abs = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose();
    // A missing output directory is created later and cannot hold the input.
    let Ok(Some(report_dir)) = report_abs else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path: {}", report_path.display()))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(rep: &CaptureReport, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        ));
    }
    if matches.len() > 1 {
        let listed = matches
            .iter()
            .take(3)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let more = if matches.len() > 3 { ", ..." } else { "" };
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches); matches: {}{}",
                pattern,
                matches.len(),
                listed,
                more
            ),
            Some("pass a single capture file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
