use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, Stdio};

use accel_hook::request::parse_body;
use accel_hook::{Dispatcher, Error, Result, config};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Handle one request body and print the response
    Invoke {
        /// Config TOML (defaults to $ACCEL_HOOK_CONFIG, then built-in paths)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Request body; read from stdin when omitted
        #[arg(long)]
        body: Option<String>,
        /// Original handler command, run without a shell on pass-through
        #[arg(last = true)]
        handler: Vec<String>,
    },
    /// Print the parsed request parameters as JSON
    Parse {
        /// Request body; read from stdin when omitted
        #[arg(long)]
        body: Option<String>,
    },
    /// Print the resolved configuration
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_format);

    match args.cmd {
        Command::Invoke {
            config,
            body,
            handler,
        } => cmd_invoke(config, body, &handler),
        Command::Parse { body } => cmd_parse(body),
        Command::Config { config } => cmd_config(config),
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_body(body: Option<String>) -> Result<String> {
    if let Some(b) = body {
        return Ok(b);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| Error::Io(format!("failed to read request body from stdin: {e}")))?;
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

fn cmd_invoke(config_path: Option<PathBuf>, body: Option<String>, handler: &[String]) -> Result<()> {
    let cfg = config::load_or_default(config_path.as_deref())?;
    let body = read_body(body)?;
    let dispatcher = Dispatcher::system(&cfg);
    let out = dispatcher.handle(&body, || run_original_handler(handler));
    println!("{out}");
    Ok(())
}

// The handler's stdout is its response; stderr stays attached to ours.
fn run_original_handler(argv: &[String]) -> String {
    let Some((program, args)) = argv.split_first() else {
        return String::new();
    };
    let out = ProcessCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output();
    match out {
        Ok(out) => {
            if !out.status.success() {
                tracing::warn!(status = %out.status, "original handler exited unsuccessfully");
            }
            String::from_utf8_lossy(&out.stdout)
                .trim_end_matches('\n')
                .to_string()
        }
        Err(e) => {
            let msg = format!("failed to run original handler {program}: {e}");
            tracing::error!("{msg}");
            msg
        }
    }
}

fn cmd_parse(body: Option<String>) -> Result<()> {
    let parsed = parse_body(&read_body(body)?);
    let s = serde_json::to_string_pretty(&parsed)
        .map_err(|e| Error::msg(format!("json encode error: {e}")))?;
    println!("{s}");
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_or_default(config_path.as_deref())?;
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}
