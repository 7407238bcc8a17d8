//! ecgconv: an electrocardiogram file format converter.
//!
//! ecgconv reads a record in one ECG format and writes it in another. Every
//! conversion passes through a single in-memory [`ir::EcgRecord`]: loaders
//! fill it, lead names are normalized once, and writers render it.
//!
//! # Modules
//!
//! - [`format`]: Format tags, capabilities and the loader/writer dispatcher
//! - [`ir`]: The in-memory record and one codec module per format
//! - [`leads`]: Canonical lead vocabulary and lead name normalization
//! - [`conversion`]: The read-then-write pipeline and conversion reports
//! - [`validation`]: Record validation and error reporting
//! - [`inspect`]: Record summaries and per-channel statistics
//! - [`sample`]: Deterministic synthetic records
//! - [`error`]: Error types for ecgconv operations

pub mod conversion;
pub mod error;
pub mod format;
pub mod inspect;
pub mod ir;
pub mod leads;
pub mod sample;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::EcgError;

use conversion::ConvertRequest;
use format::{Dispatcher, FormatTag, ReadRequest};
use ir::EcgRecord;

/// The ecgconv CLI application.
#[derive(Parser)]
#[command(name = "ecgconv")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a record from one format to another.
    Convert(ConvertArgs),
    /// Show a record's metadata and per-channel statistics.
    Inspect(InspectArgs),
    /// Validate a record for errors and warnings.
    Validate(ValidateArgs),
    /// List supported formats and what ecgconv can do with each.
    Formats(FormatsArgs),
    /// Write a synthetic ECG record.
    Sample(SampleArgs),
}

/// Report rendering for commands that print a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Source format (e.g. wfdb, musexml, philips104).
    #[arg(short, long)]
    from: FormatTag,

    /// Target format (rdt, hl7, gemuse, wfdb, wfdb-16, wfdb-61, wfdb-212).
    #[arg(short, long)]
    to: FormatTag,

    /// Input file; for WFDB, the header file.
    input: PathBuf,

    /// Number of signals to read from a WFDB record; 0 reads all.
    #[arg(long, default_value_t = 0)]
    signals: usize,

    /// Directory the converted record is written to.
    #[arg(short, long, env = "ECGCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Refuse conversions that would lose information.
    #[arg(long)]
    strict: bool,

    /// Output format for the conversion report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    report: OutputFormat,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Input file to inspect.
    input: PathBuf,

    /// Input format.
    #[arg(short, long)]
    format: FormatTag,

    /// Number of signals to read from a WFDB record; 0 reads all.
    #[arg(long, default_value_t = 0)]
    signals: usize,

    /// Also report each channel's standard deviation.
    #[arg(long)]
    std_dev: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Input file to validate.
    input: PathBuf,

    /// Input format.
    #[arg(short, long)]
    format: FormatTag,

    /// Number of signals to read from a WFDB record; 0 reads all.
    #[arg(long, default_value_t = 0)]
    signals: usize,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Arguments for the formats subcommand.
#[derive(clap::Args)]
struct FormatsArgs {
    /// Output format for the listing.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Arguments for the sample subcommand.
#[derive(clap::Args)]
struct SampleArgs {
    /// Format to write.
    #[arg(short, long, default_value = "wfdb")]
    format: FormatTag,

    /// Record name; the format's extension is appended.
    #[arg(long, default_value = "sample")]
    name: String,

    /// Directory the record is written to.
    #[arg(short, long, env = "ECGCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 12)]
    channels: usize,

    /// Sampling rate in Hz.
    #[arg(long, default_value_t = 500.0)]
    rate: f64,

    /// Record length in seconds.
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Heart rate in beats per minute.
    #[arg(long, default_value_t = 72.0)]
    heart_rate: f64,

    /// ADU gain in counts per millivolt.
    #[arg(long, default_value_t = ir::DEFAULT_ADU_GAIN)]
    gain: u32,

    /// Peak noise amplitude in microvolts.
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Random seed for reproducible noise.
    #[arg(long)]
    seed: Option<u64>,
}

/// Run the ecgconv CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), EcgError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Formats(args)) => run_formats(args),
        Some(Commands::Sample(args)) => run_sample(args),
        None => {
            println!("ecgconv {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Electrocardiogram file format converter.");
            println!();
            println!("Run 'ecgconv --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // A logger may already be installed when embedded; keep it.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Splits an input path into its directory and UTF-8 file name.
fn split_input(input: &Path) -> Result<(&Path, &str), EcgError> {
    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| EcgError::InvalidRecordName {
            file_name: input.display().to_string(),
        })?;
    let input_dir = input
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((input_dir, file_name))
}

/// Loads one record through the built-in dispatcher.
fn load_record(format: FormatTag, input: &Path, signals: usize) -> Result<EcgRecord, EcgError> {
    let (input_dir, file_name) = split_input(input)?;
    let record_name = conversion::record_name_from_file_name(file_name)?;
    let request =
        ReadRequest::new(format, file_name, input_dir, record_name).with_signals(signals);
    Dispatcher::builtin().read(&request)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EcgError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{json}");
    Ok(())
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), EcgError> {
    let (input_dir, file_name) = split_input(&args.input)?;
    let request = ConvertRequest::new(args.from, args.to, file_name, input_dir, &args.output_dir)
        .with_signals(args.signals);

    let dispatcher = Dispatcher::builtin();
    let report = match conversion::convert_with_report(&dispatcher, &request, !args.strict) {
        Ok(report) => report,
        Err(EcgError::LossyConversion { from, to, report }) => {
            eprint!("{report}");
            return Err(EcgError::LossyConversion { from, to, report });
        }
        Err(err) => return Err(err),
    };

    match args.report {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!(
                "Converted {} ({}) -> {} in {}",
                args.input.display(),
                report.from,
                report.to,
                args.output_dir.display()
            );
            print!("{report}");
        }
    }
    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), EcgError> {
    let record = load_record(args.format, &args.input, args.signals)?;
    let opts = inspect::InspectOptions {
        std_dev: args.std_dev,
        ..Default::default()
    };
    let report = inspect::inspect_record(&record, &opts);

    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), EcgError> {
    let record = load_record(args.format, &args.input, args.signals)?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate_record(&record, &opts);

    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{report}"),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (args.strict && has_warnings) {
        Err(EcgError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

/// One row of the formats listing.
#[derive(Serialize)]
struct FormatInfo {
    name: &'static str,
    #[serde(flatten)]
    capabilities: format::Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<&'static str>,
}

/// Execute the formats subcommand.
fn run_formats(args: FormatsArgs) -> Result<(), EcgError> {
    let infos: Vec<FormatInfo> = FormatTag::ALL
        .iter()
        .map(|tag| FormatInfo {
            name: tag.name(),
            capabilities: tag.capabilities(),
            extension: tag.output_extension(),
        })
        .collect();

    match args.output {
        OutputFormat::Json => print_json(&infos)?,
        OutputFormat::Text => {
            let mark = |yes: bool| if yes { "yes" } else { "-" };
            println!(
                "{:<20} {:<5} {:<6} {:<8} {:<8} {}",
                "FORMAT", "LOAD", "WRITE", "SIGNALS", "PAYLOAD", "EXTENSION"
            );
            for info in &infos {
                let caps = info.capabilities;
                println!(
                    "{:<20} {:<5} {:<6} {:<8} {:<8} {}",
                    info.name,
                    mark(caps.can_load),
                    mark(caps.can_write),
                    mark(caps.accepts_signal_count),
                    mark(caps.produces_payload),
                    info.extension.unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

/// Execute the sample subcommand.
fn run_sample(args: SampleArgs) -> Result<(), EcgError> {
    let dispatcher = Dispatcher::builtin();
    if !dispatcher.can_write(args.format) {
        return Err(EcgError::unsupported(args.format, error::Direction::Write));
    }

    let opts = sample::SampleOptions {
        channels: args.channels,
        sampling_rate: args.rate,
        duration_secs: args.duration,
        heart_rate_bpm: args.heart_rate,
        adu_gain: args.gain,
        noise_uv: args.noise,
        seed: args.seed,
    };
    let record = sample::generate_record(&opts, args.format)?;
    let rows = dispatcher.write(args.format, &record, &args.output_dir, &args.name)?;

    println!(
        "Wrote {} {} record '{}' ({} row(s)) to {}",
        record.channel_count(),
        args.format,
        args.name,
        rows,
        args.output_dir.display()
    );
    Ok(())
}
