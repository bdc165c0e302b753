use std::time::Duration;

use telscan::cli::{self, CliArgs, Mode, ParseOutcome, ProtocolFilter};
use telscan::detect::{self, DetectionResult, Protocol, ProtocolDetector};
use telscan::files::{csv, indexmap_like::OrderedMap, json, plain};
use telscan::harness::Harness;
use telscan::probe::{self, ConnectionResult};
use telscan::progress::LoggingProgress;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let outcome = match cli::parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("telscan: {e}");
            eprintln!();
            eprint!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let args = match outcome {
        ParseOutcome::Help => {
            print!("{}", cli::USAGE);
            std::process::exit(0);
        }
        ParseOutcome::Version => {
            println!("telscan {}", env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }
        ParseOutcome::Run(args) => args,
    };

    init_tracing(args.verbose);

    let targets = match load_targets(&args) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("telscan: {e}");
            std::process::exit(1);
        }
    };

    let output = match run_mode(&args, targets).await {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("telscan: {e}");
            std::process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, output) {
                eprintln!("telscan: failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
        }
        None => print!("{output}"),
    }
}

fn init_tracing(verbose: u8) {
    let level = cli::verbosity_to_level(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parse `host` or `host:port` into its two parts, defaulting the port to
/// `default_port` when absent.
fn parse_target(spec: &str, default_port: u16) -> (String, u16) {
    match spec.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(p) => (host.to_owned(), p),
            Err(_) => (spec.to_owned(), default_port),
        },
        None => (spec.to_owned(), default_port),
    }
}

fn load_targets(args: &CliArgs) -> Result<Vec<(String, u16)>, String> {
    let mut targets: Vec<(String, u16)> =
        args.targets.iter().map(|t| parse_target(t, 23)).collect();

    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
        targets.extend(load_from_file(&text, args.input_format)?);
    }

    Ok(targets)
}

fn load_from_file(text: &str, format: cli::InputFormat) -> Result<Vec<(String, u16)>, String> {
    match format {
        cli::InputFormat::Csv => {
            let records = csv::read(text).map_err(|e| e.to_string())?;
            Ok(records
                .into_iter()
                .filter_map(|r| {
                    let host = r.get("host")?.to_owned();
                    let port: u16 = r.get("port").and_then(|p| p.parse().ok()).unwrap_or(23);
                    Some((host, port))
                })
                .collect())
        }
        cli::InputFormat::Json => {
            let value = json::read(text).map_err(|e| e.to_string())?;
            let array = value.as_array().ok_or("expected a JSON array of {host, port} objects")?;
            Ok(array
                .iter()
                .filter_map(|entry| {
                    let host = entry.get("host")?.as_str()?.to_owned();
                    let port = entry.get("port").and_then(|p| p.as_u64()).unwrap_or(23) as u16;
                    Some((host, port))
                })
                .collect())
        }
    }
}

async fn run_mode(args: &CliArgs, targets: Vec<(String, u16)>) -> Result<String, String> {
    match args.mode {
        Mode::Probe => {
            let harness = Harness::new(args.concurrency);
            let progress = LoggingProgress::new(targets.len());
            let timeout = args.timeout;
            let results = harness
                .run(targets, &progress, move |host, port| async move { probe::try_connect(&host, port, timeout).await })
                .await
                .map_err(|e| e.to_string())?;
            render_connection_results(&results, args.output_format)
        }
        Mode::Banner => {
            let (host, port) = targets.first().ok_or("no target to read a banner from")?.clone();
            let result = ProtocolDetector::new(args.timeout).detect_passive_only(&host, port).await;
            render_detection_results(&[result], args.output_format)
        }
        Mode::Connect | Mode::Fingerprint => {
            let (host, port) = targets.first().ok_or("no target to fingerprint")?.clone();
            let result = classify(&host, port, args.protocol, args.timeout).await;
            if matches!(args.mode, Mode::Connect) {
                match detect::get_client(&result, &host, port).await {
                    Ok(_client) => render_detection_results(&[result], args.output_format),
                    Err(e) => Err(e.to_string()),
                }
            } else {
                render_detection_results(&[result], args.output_format)
            }
        }
        Mode::Scan => {
            let harness = Harness::new(args.concurrency);
            let progress = LoggingProgress::new(targets.len());
            let timeout = args.timeout;
            let protocol = args.protocol;
            let results = harness
                .run(targets, &progress, move |host, port| async move { classify(&host, port, protocol, timeout).await })
                .await
                .map_err(|e| e.to_string())?;
            render_detection_results(&results, args.output_format)
        }
    }
}

async fn classify(host: &str, port: u16, protocol: ProtocolFilter, timeout: Duration) -> DetectionResult {
    if protocol != ProtocolFilter::Auto {
        return DetectionResult { protocol: forced_protocol(protocol), banner: None, extra: Default::default() };
    }
    ProtocolDetector::new(timeout).detect(host, port).await
}

fn forced_protocol(protocol: ProtocolFilter) -> Protocol {
    match protocol {
        ProtocolFilter::Auto => Protocol::Unknown,
        ProtocolFilter::Http => Protocol::Http,
        ProtocolFilter::Https => Protocol::Https,
        ProtocolFilter::Ssh => Protocol::Ssh,
        ProtocolFilter::Telnet => Protocol::Telnet,
    }
}

fn render_connection_results(results: &[ConnectionResult], format: cli::OutputFormat) -> Result<String, String> {
    let records: Vec<OrderedMap> = results
        .iter()
        .map(|r| {
            let mut m = OrderedMap::new();
            m.insert("host", r.host.clone());
            m.insert("port", r.port.to_string());
            m.insert("success", r.success.to_string());
            m.insert("time_ms", r.time_ms.to_string());
            m.insert("error", r.error.as_ref().map(ToString::to_string).unwrap_or_default());
            m.insert("error_kind", r.error.as_ref().map(|e| e.kind().to_owned()).unwrap_or_default());
            m
        })
        .collect();
    render_records(&records, format)
}

fn render_detection_results(results: &[DetectionResult], format: cli::OutputFormat) -> Result<String, String> {
    let records: Vec<OrderedMap> = results
        .iter()
        .map(|r| {
            let mut m = OrderedMap::new();
            m.insert("protocol", r.protocol.as_str());
            if let Some(banner) = &r.banner {
                m.insert("banner", String::from_utf8_lossy(banner).into_owned());
            }
            for (k, v) in &r.extra {
                m.insert(k.clone(), v.clone());
            }
            m
        })
        .collect();
    render_records(&records, format)
}

fn render_records(records: &[OrderedMap], format: cli::OutputFormat) -> Result<String, String> {
    match format {
        cli::OutputFormat::Csv => Ok(csv::write(records)),
        cli::OutputFormat::Json => {
            let array: Vec<serde_json::Value> = records
                .iter()
                .map(|r| serde_json::Value::Object(r.iter().map(|(k, v)| (k.to_owned(), serde_json::Value::String(v.to_owned()))).collect()))
                .collect();
            json::write(&serde_json::Value::Array(array)).map_err(|e| e.to_string())
        }
        cli::OutputFormat::Plain => {
            if records.len() == 1 {
                Ok(plain::write_map(&records[0]))
            } else {
                let lines: Vec<String> = records.iter().map(|r| r.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ")).collect();
                Ok(plain::write_list(&lines))
            }
        }
    }
}

