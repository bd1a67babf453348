//! chainline CLI: interpret a script and print the resulting actions.

use std::error::Error;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use tracing::{warn, Level};

use chainline::config::{load_config, load_config_from};
use chainline::{ActionSink, Interpreter, SessionSnapshot};

#[derive(Parser)]
#[command(name = "chainline", version)]
#[command(about = "Compile DAW method-chain scripts into actions", long_about = None)]
struct Cli {
    /// Script file, or `-` to read stdin
    script: PathBuf,

    /// Session snapshot JSON ({"tracks": [...]} or {"state": {...}})
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Config file (default: ~/.chainline/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let source = read_script(&cli.script)?;

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config().unwrap_or_default(),
    };

    let mut interpreter = Interpreter::new(config);
    if let Some(path) = &cli.state {
        let text = std::fs::read_to_string(path)?;
        interpreter.set_snapshot(Some(SessionSnapshot::from_json_str(&text)?));
    }

    // Actions emitted before a failing call are still printed.
    let mut sink = ActionSink::new();
    let outcome = interpreter.interpret_source_into(&source, &mut sink);
    if !sink.is_empty() {
        print_actions(&sink.to_api_actions(), cli.format)?;
    }
    let (skipped, _) = outcome?;
    if !skipped.is_empty() {
        warn!(count = skipped.len(), "some combinator items were skipped");
    }
    Ok(())
}

fn print_actions(actions: &[serde_json::Value], format: Format) -> Result<(), Box<dyn Error>> {
    let out = match format {
        Format::Json => serde_json::to_string_pretty(actions)?,
        Format::Yaml => serde_yaml::to_string(actions)?,
    };
    println!("{out}");
    Ok(())
}

fn read_script(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(path)
    }
}
