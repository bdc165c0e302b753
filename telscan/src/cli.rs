//! Command-line argument parsing.
//!
//! Usage:
//!   telscan --mode {banner|connect|fingerprint|probe|scan} [options] <target>...
//!
//! Hand-rolled rather than built on a framework: no repo in the retrieved
//! corpus depends on an argument-parsing crate, and the format here (long
//! flags only, no short-combined forms) is simpler than what a framework
//! would buy back.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unrecognized option: {0}")]
    UnknownOption(String),
    #[error("option {0} requires a value")]
    MissingValue(String),
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
    #[error("no target host given")]
    MissingTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Banner,
    Connect,
    Fingerprint,
    Probe,
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFilter {
    Auto,
    Http,
    Https,
    Ssh,
    Telnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Plain,
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub mode: Mode,
    pub protocol: ProtocolFilter,
    pub concurrency: usize,
    pub timeout: Duration,
    pub input: Option<PathBuf>,
    pub input_format: InputFormat,
    pub output: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub verbose: u8,
    /// Positional `host[:port]` targets, in addition to (or instead of)
    /// `--input`.
    pub targets: Vec<String>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            mode: Mode::Fingerprint,
            protocol: ProtocolFilter::Auto,
            concurrency: 50,
            timeout: Duration::from_secs_f64(10.0),
            input: None,
            input_format: InputFormat::Csv,
            output: None,
            output_format: OutputFormat::Plain,
            verbose: 0,
            targets: Vec::new(),
        }
    }
}

/// What a successful parse asks the caller to do.
pub enum ParseOutcome {
    Run(CliArgs),
    Help,
    Version,
}

/// Parse `std::env::args()`.
pub fn parse_args() -> Result<ParseOutcome, CliError> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<ParseOutcome, CliError> {
    if argv.is_empty() {
        return Ok(ParseOutcome::Help);
    }

    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "--help" | "-h" => return Ok(ParseOutcome::Help),
            "--version" => return Ok(ParseOutcome::Version),
            "--verbose" | "-v" => args.verbose += 1,
            "--mode" => args.mode = parse_mode(&next_value(argv, &mut i, "--mode")?)?,
            "--protocol" => args.protocol = parse_protocol(&next_value(argv, &mut i, "--protocol")?)?,
            "--concurrency" => args.concurrency = parse_usize(&next_value(argv, &mut i, "--concurrency")?, "--concurrency")?,
            "--timeout" => args.timeout = parse_timeout(&next_value(argv, &mut i, "--timeout")?)?,
            "--input" => args.input = Some(PathBuf::from(next_value(argv, &mut i, "--input")?)),
            "--input-format" => args.input_format = parse_input_format(&next_value(argv, &mut i, "--input-format")?)?,
            "--output" => args.output = Some(PathBuf::from(next_value(argv, &mut i, "--output")?)),
            "--output-format" => args.output_format = parse_output_format(&next_value(argv, &mut i, "--output-format")?)?,
            other if other.starts_with('-') => return Err(CliError::UnknownOption(other.to_owned())),
            other => args.targets.push(other.to_owned()),
        }
        i += 1;
    }

    if args.input.is_none() && args.targets.is_empty() {
        return Err(CliError::MissingTarget);
    }

    Ok(ParseOutcome::Run(args))
}

fn next_value(argv: &[String], i: &mut usize, option: &str) -> Result<String, CliError> {
    let value = argv.get(*i + 1).ok_or_else(|| CliError::MissingValue(option.to_owned()))?;
    *i += 1;
    Ok(value.clone())
}

fn parse_mode(value: &str) -> Result<Mode, CliError> {
    match value {
        "banner" => Ok(Mode::Banner),
        "connect" => Ok(Mode::Connect),
        "fingerprint" => Ok(Mode::Fingerprint),
        "probe" => Ok(Mode::Probe),
        "scan" => Ok(Mode::Scan),
        other => Err(invalid("--mode", other)),
    }
}

fn parse_protocol(value: &str) -> Result<ProtocolFilter, CliError> {
    match value {
        "auto" => Ok(ProtocolFilter::Auto),
        "http" => Ok(ProtocolFilter::Http),
        "https" => Ok(ProtocolFilter::Https),
        "ssh" => Ok(ProtocolFilter::Ssh),
        "telnet" => Ok(ProtocolFilter::Telnet),
        other => Err(invalid("--protocol", other)),
    }
}

fn parse_input_format(value: &str) -> Result<InputFormat, CliError> {
    match value {
        "csv" => Ok(InputFormat::Csv),
        "json" => Ok(InputFormat::Json),
        other => Err(invalid("--input-format", other)),
    }
}

fn parse_output_format(value: &str) -> Result<OutputFormat, CliError> {
    match value {
        "csv" => Ok(OutputFormat::Csv),
        "json" => Ok(OutputFormat::Json),
        "plain" => Ok(OutputFormat::Plain),
        other => Err(invalid("--output-format", other)),
    }
}

fn parse_usize(value: &str, option: &str) -> Result<usize, CliError> {
    value.parse().map_err(|_| invalid(option, value))
}

fn parse_timeout(value: &str) -> Result<Duration, CliError> {
    let secs: f64 = value.parse().map_err(|_| invalid("--timeout", value))?;
    if secs < 0.0 || !secs.is_finite() {
        return Err(invalid("--timeout", value));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn invalid(option: &str, value: &str) -> CliError {
    CliError::InvalidValue { option: option.to_owned(), value: value.to_owned() }
}

/// Map a `--verbose` count to a `tracing` max level: 0 ⇒ WARN, 1 ⇒ INFO,
/// 2+ ⇒ DEBUG.
pub fn verbosity_to_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    }
}

pub const USAGE: &str = "\
telscan --mode {banner|connect|fingerprint|probe|scan} [options] <host[:port]>...

Options:
  --protocol {auto|http|https|ssh|telnet}  default: auto
  --concurrency N                          default: 50
  --timeout S                              default: 10.0
  --input PATH                             read targets from a file
  --input-format {csv|json}                default: csv
  --output PATH                            write results to a file
  --output-format {csv|json|plain}         default: plain
  --verbose                                repeatable
  --version
  --help
";

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_yields_help() {
        assert!(matches!(parse_argv(&[]).unwrap(), ParseOutcome::Help));
    }

    #[test]
    fn bare_host_defaults_to_fingerprint_mode() {
        let outcome = parse_argv(&argv(&["example.com"])).unwrap();
        match outcome {
            ParseOutcome::Run(args) => {
                assert_eq!(args.mode, Mode::Fingerprint);
                assert_eq!(args.targets, vec!["example.com"]);
                assert_eq!(args.concurrency, 50);
                assert_eq!(args.timeout, Duration::from_secs_f64(10.0));
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn mode_protocol_and_concurrency_are_parsed() {
        let outcome = parse_argv(&argv(&["--mode", "scan", "--protocol", "ssh", "--concurrency", "8", "host"])).unwrap();
        match outcome {
            ParseOutcome::Run(args) => {
                assert_eq!(args.mode, Mode::Scan);
                assert_eq!(args.protocol, ProtocolFilter::Ssh);
                assert_eq!(args.concurrency, 8);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = parse_argv(&argv(&["--bogus", "host"])).unwrap_err();
        assert!(matches!(err, CliError::UnknownOption(_)));
    }

    #[test]
    fn option_missing_its_value_is_rejected() {
        let err = parse_argv(&argv(&["--mode"])).unwrap_err();
        assert!(matches!(err, CliError::MissingValue(_)));
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let err = parse_argv(&argv(&["--protocol", "gopher", "host"])).unwrap_err();
        assert!(matches!(err, CliError::InvalidValue { .. }));
    }

    #[test]
    fn missing_target_and_input_is_rejected() {
        let err = parse_argv(&argv(&["--mode", "probe"])).unwrap_err();
        assert!(matches!(err, CliError::MissingTarget));
    }

    #[test]
    fn input_path_satisfies_the_target_requirement() {
        let outcome = parse_argv(&argv(&["--input", "targets.csv"])).unwrap();
        assert!(matches!(outcome, ParseOutcome::Run(_)));
    }

    #[test]
    fn version_flag_short_circuits() {
        assert!(matches!(parse_argv(&argv(&["--version"])).unwrap(), ParseOutcome::Version));
    }

    #[test]
    fn repeated_verbose_increments_count() {
        let outcome = parse_argv(&argv(&["-v", "-v", "host"])).unwrap();
        match outcome {
            ParseOutcome::Run(args) => assert_eq!(args.verbose, 2),
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn verbosity_maps_to_tracing_levels() {
        assert_eq!(verbosity_to_level(0), tracing::Level::WARN);
        assert_eq!(verbosity_to_level(1), tracing::Level::INFO);
        assert_eq!(verbosity_to_level(5), tracing::Level::DEBUG);
    }
}
