use clap::{Args, Parser, Subcommand};
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_positive_duration(input: &str) -> Result<Duration, String> {
    let d = parse_duration(input)?;
    if d.is_zero() {
        return Err(format!("duration '{}' must be positive", input.trim()));
    }
    Ok(d)
}

fn parse_rate(input: &str) -> Result<f64, String> {
    let v: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid rate '{input}' (expected a number within 0.0..=1.0)"))?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("rate {v} is outside 0.0..=1.0"));
    }
    Ok(v)
}

fn parse_env_pair(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid env pair '{input}' (expected KEY=VALUE)")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    Human,
    /// One JSON object per line (NDJSON) on stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SuiteKind {
    /// Health fan-out, policy validation, cache probe and a heavier health burst.
    Load,
    /// A lighter version of `load` with a mixed workload.
    Simple,
    /// Concurrency escalation, sustained load and a payload-heavy burst.
    Stress,
}

#[derive(Debug, Parser)]
#[command(
    name = "surge",
    author,
    version,
    about = "Load generation and measurement harness for HTTP services",
    long_about = "surge drives concurrent HTTP traffic against a target, classifies every request, and reports latency, throughput and success rates.\n\nThe target is either already running (`--target-url`) or spawned and health-checked by surge (`--spawn`). Logs go to stderr and are controlled with RUST_LOG.",
    after_help = "Examples:\n  surge suite load --target-url http://127.0.0.1:8080\n  surge escalate --levels 10,25,50 --max-avg-latency 50ms\n  surge sustain --workers 50 --duration 30s --output json\n  surge suite simple --spawn ./target/release/my-service --spawn-arg --port --spawn-arg 8080"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one of the canned scenario suites
    Suite(SuiteArgs),

    /// Step concurrency upward until the target degrades
    Escalate(EscalateArgs),

    /// Hold a fixed worker pool against the probe endpoint for a duration
    Sustain(SustainArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Base URL of the system under test
    #[arg(
        long,
        env = "SURGE_TARGET_URL",
        default_value = "http://127.0.0.1:8080"
    )]
    pub target_url: String,

    /// Spawn this program as the system under test before the run (killed afterwards)
    #[arg(long, value_name = "PROGRAM")]
    pub spawn: Option<String>,

    /// Argument passed to the spawned program (repeatable)
    #[arg(
        long = "spawn-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        requires = "spawn"
    )]
    pub spawn_args: Vec<String>,

    /// Env var passed to the spawned program (repeatable, KEY=VALUE)
    #[arg(
        long = "spawn-env",
        value_name = "KEY=VALUE",
        value_parser = parse_env_pair,
        requires = "spawn"
    )]
    pub spawn_env: Vec<(String, String)>,

    /// How long to wait for the target's health check to pass
    #[arg(
        long,
        env = "SURGE_STARTUP_TIMEOUT",
        default_value = "30s",
        value_parser = parse_positive_duration
    )]
    pub startup_timeout: Duration,

    /// Hard per-request timeout; exceeding it counts as a failed request
    #[arg(
        long,
        env = "SURGE_REQUEST_TIMEOUT",
        default_value = "5s",
        value_parser = parse_positive_duration
    )]
    pub request_timeout: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SuiteArgs {
    /// Which suite to run
    #[arg(value_enum)]
    pub suite: SuiteKind,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct EscalateArgs {
    /// Strictly increasing worker counts (comma separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "10,25,50,75,100,150,200,300"
    )]
    pub levels: Vec<u64>,

    /// Sequential requests per worker at each level
    #[arg(long, default_value_t = 10)]
    pub requests_per_worker: u64,

    /// Stop once the success rate of a level falls below this
    #[arg(long, default_value = "0.95", value_parser = parse_rate)]
    pub min_success_rate: f64,

    /// Stop once the average latency of a level exceeds this
    #[arg(long, default_value = "100ms", value_parser = parse_duration)]
    pub max_avg_latency: Duration,

    /// Pause between two levels
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub settle: Duration,

    /// Probe endpoint path (GET)
    #[arg(long, default_value = "/health")]
    pub probe: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct SustainArgs {
    /// Number of concurrent workers
    #[arg(long, default_value_t = 50)]
    pub workers: u64,

    /// How long to hold the load
    #[arg(long, default_value = "30s", value_parser = parse_positive_duration)]
    pub duration: Duration,

    /// Probe endpoint path (GET)
    #[arg(long, default_value = "/health")]
    pub probe: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        match Cli::try_parse_from(args) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        }
    }

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_positive_duration("0s").is_err());
    }

    #[test]
    fn parse_env_pair_requires_a_key() {
        assert_eq!(
            parse_env_pair("RUST_LOG=debug"),
            Ok(("RUST_LOG".to_string(), "debug".to_string()))
        );
        assert_eq!(
            parse_env_pair("EMPTY="),
            Ok(("EMPTY".to_string(), String::new()))
        );
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn cli_parses_suite_with_spawn() {
        let cli = parse(&[
            "surge",
            "suite",
            "load",
            "--spawn",
            "./my-service",
            "--spawn-arg",
            "--port",
            "--spawn-arg",
            "8080",
            "--spawn-env",
            "MODE=bench",
            "--target-url",
            "http://127.0.0.1:8080",
            "--startup-timeout",
            "10s",
            "--output",
            "json",
        ]);

        match cli.command {
            Command::Suite(args) => {
                assert_eq!(args.suite, SuiteKind::Load);
                assert_eq!(args.target.spawn.as_deref(), Some("./my-service"));
                assert_eq!(args.target.spawn_args, vec!["--port", "8080"]);
                assert_eq!(
                    args.target.spawn_env,
                    vec![("MODE".to_string(), "bench".to_string())]
                );
                assert_eq!(args.target.startup_timeout, Duration::from_secs(10));
                assert_eq!(args.target.request_timeout, Duration::from_secs(5));
                assert_eq!(args.target.output, OutputFormat::Json);
            }
            other => panic!("expected suite command, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_escalate_defaults() {
        let cli = parse(&["surge", "escalate"]);

        match cli.command {
            Command::Escalate(args) => {
                assert_eq!(args.levels, vec![10, 25, 50, 75, 100, 150, 200, 300]);
                assert_eq!(args.requests_per_worker, 10);
                assert_eq!(args.min_success_rate, 0.95);
                assert_eq!(args.max_avg_latency, Duration::from_millis(100));
                assert_eq!(args.settle, Duration::from_secs(1));
                assert_eq!(args.probe, "/health");
                assert_eq!(args.target.output, OutputFormat::Human);
            }
            other => panic!("expected escalate command, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_escalate_levels() {
        let cli = parse(&["surge", "escalate", "--levels", "5,10,20", "--settle", "0s"]);

        match cli.command {
            Command::Escalate(args) => {
                assert_eq!(args.levels, vec![5, 10, 20]);
                assert_eq!(args.settle, Duration::ZERO);
            }
            other => panic!("expected escalate command, got {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_out_of_range_rate_and_spawn_args_without_spawn() {
        assert!(Cli::try_parse_from(["surge", "escalate", "--min-success-rate", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["surge", "sustain", "--spawn-arg", "x"]).is_err());
        assert!(Cli::try_parse_from(["surge", "sustain", "--duration", "0s"]).is_err());
    }

    #[test]
    fn cli_parses_sustain() {
        let cli = parse(&["surge", "sustain", "--workers", "8", "--duration", "2s"]);

        match cli.command {
            Command::Sustain(args) => {
                assert_eq!(args.workers, 8);
                assert_eq!(args.duration, Duration::from_secs(2));
                assert_eq!(args.probe, "/health");
            }
            other => panic!("expected sustain command, got {other:?}"),
        }
    }
}
