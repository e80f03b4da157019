//! Faultline CLI
//!
//! Entry point for the `faultline` command-line tool.

use clap::{Parser, Subcommand, ValueEnum};
use faultline::config::{env_layer, EffectiveConfig, DEFAULT_CONFIG_FILE};
use faultline::{
    classify, present, raise, FailureEvent, FaultlineError, Host, InterfaceKind, Origin,
    RawSignal, RunConfiguration, Settings, Severity,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{self, ExitCode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Process-wide failure interception and reporting", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the label for a severity code or name
    Classify {
        /// Numeric code (e.g. 2) or severity name (e.g. warning)
        code: String,
    },

    /// Render a failure event the way the caller would see it
    Render {
        /// Numeric code or severity name
        #[arg(long)]
        code: String,

        /// Failure message
        #[arg(long)]
        message: String,

        /// Source file
        #[arg(long)]
        file: Option<String>,

        /// Source line
        #[arg(long)]
        line: Option<u32>,

        /// Caller interface (default: detected)
        #[arg(long)]
        interface: Option<InterfaceKind>,

        /// Render in debug mode
        #[arg(long)]
        debug: bool,
    },

    /// Drive a failure scenario through the installed pipeline
    Simulate {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,

        /// Path to config file (default: ./faultline.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Enable debug mode
        #[arg(long)]
        debug: bool,

        /// Caller interface (default: from config, else detected)
        #[arg(long)]
        interface: Option<InterfaceKind>,
    },

    /// Print the effective configuration
    Config {
        /// Path to config file (default: ./faultline.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Enable debug mode
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Recoverable warning: logged, shown and fatal only in debug mode
    Warning,
    /// Notice: logged, silent in production
    Notice,
    /// Fatal runtime error raised live
    Fatal,
    /// Fatal error found by the shutdown scan after partial output
    FatalAtShutdown,
    /// Panic in application code
    Panic,
    /// Error returned from the application body
    Error,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { code } => run_classify(&code),
        Commands::Render {
            code,
            message,
            file,
            line,
            interface,
            debug,
        } => run_render(&code, &message, file, line, interface, debug),
        Commands::Simulate {
            scenario,
            config,
            debug,
            interface,
        } => run_simulate(scenario, config, debug, interface),
        Commands::Config { config, debug } => run_config(config, debug),
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Parse a numeric code or severity name to a raw code
fn parse_code(code: &str) -> Result<u32, FaultlineError> {
    match code.trim().parse::<u32>() {
        Ok(raw) => Ok(raw),
        Err(_) => Ok(code.parse::<Severity>()?.code()),
    }
}

fn run_classify(code: &str) -> ExitCode {
    match parse_code(code) {
        Ok(raw) => {
            println!("{}", classify(raw));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_render(
    code: &str,
    message: &str,
    file: Option<String>,
    line: Option<u32>,
    interface: Option<InterfaceKind>,
    debug: bool,
) -> ExitCode {
    let raw = match parse_code(code) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = RunConfiguration::with_interface(debug, interface.unwrap_or_else(InterfaceKind::detect));
    let mut event = FailureEvent::new(raw, message, Origin::RuntimeSignal);
    if file.is_some() || line.is_some() {
        event = event.with_location(file.unwrap_or_default(), line.unwrap_or(0));
    }

    print!("{}", present::render(&event, &config));
    let _ = io::stdout().flush();
    ExitCode::SUCCESS
}

fn load_settings(
    config_path: Option<PathBuf>,
    debug: bool,
    interface: Option<InterfaceKind>,
) -> Result<EffectiveConfig, FaultlineError> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let env = env_layer(std::env::vars())?;

    let mut cli = serde_json::Map::new();
    if debug {
        cli.insert("debug".to_string(), serde_json::Value::Bool(true));
    }
    if let Some(kind) = interface {
        cli.insert(
            "interface".to_string(),
            serde_json::Value::String(kind.as_str().to_string()),
        );
    }
    let cli = if cli.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(cli))
    };

    Ok(EffectiveConfig::build(Some(Path::new(&path)), env, cli)?)
}

fn run_config(config_path: Option<PathBuf>, debug: bool) -> ExitCode {
    let effective = match load_settings(config_path, debug, None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    match effective.to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_simulate(
    scenario: Scenario,
    config_path: Option<PathBuf>,
    debug: bool,
    interface: Option<InterfaceKind>,
) -> ExitCode {
    let settings: Settings = match load_settings(config_path, debug, interface)
        .and_then(|c| Ok(c.settings()?))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    init_tracing(settings.debug);

    Host::run(&settings, |host| -> Result<(), io::Error> {
        writeln!(host.output(), "partial page")?;

        match scenario {
            Scenario::Warning => raise!(host, Severity::Warning, "divide by zero risk"),
            Scenario::Notice => raise!(host, Severity::Notice, "undefined index: user"),
            Scenario::Fatal => raise!(host, Severity::UserError, "invariant violated"),
            Scenario::FatalAtShutdown => host.record_unrecovered(RawSignal::new(
                Severity::Error.code(),
                "Allowed memory size exhausted",
                file!(),
                line!(),
            )),
            Scenario::Panic => panic!("simulated panic"),
            Scenario::Error => {
                return Err(io::Error::new(io::ErrorKind::Other, "simulated failure"));
            }
        }

        writeln!(host.output(), "rest of page")?;
        Ok(())
    })
}
