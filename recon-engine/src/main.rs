use anyhow::Result;
use clap::{ArgAction, Parser};
use pipeline::Pipeline;
use recon_core::{preflight, ReconError};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

/// Exit status after an interrupt, as a shell would report SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "recon-engine", version, about = "Streaming subdomain recon: discovery → HTTP probe → fingerprint, one JSON line per host")]
struct Cli {
    /// Target domain (e.g., example.com)
    target: String,
    /// Optional config file (YAML). If omitted, loads ./recon.yaml if present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log more to stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(flatten)]
    opts: config::Options,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

/// Startup failures are reported as one `{error, message}` line on stdout.
fn report_fatal(err: &anyhow::Error) {
    let obj = match err.downcast_ref::<ReconError>() {
        Some(ReconError::Output(e)) => {
            // stdout itself is gone; nothing sensible to print there
            error!(error = %e, "output failed");
            return;
        }
        Some(re) => re.to_json(),
        None => serde_json::json!({ "error": err.to_string(), "message": format!("{:#}", err) }),
    };
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{}", obj);
    let _ = out.flush();
}

fn run(cli: Cli) -> Result<i32> {
    let file_cfg = config::load_config(cli.config.as_deref())?;
    let settings = config::Settings::resolve(&cli.target, &cli.opts, file_cfg)?;
    let pipeline_cfg = settings.pipeline_config();
    preflight::check_programs(pipeline_cfg.required_programs())?;
    info!(
        target = %settings.target,
        deep = settings.deep,
        fingerprint = settings.fingerprint,
        port_scan = settings.port_scan,
        "starting recon"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let recon = Pipeline::new(pipeline_cfg);
    let summary = rt.block_on(async {
        let _signals = pipeline::spawn_signal_listener(recon.cancel_token());
        recon.run(std::io::stdout()).await
    })?;
    for s in &summary.sources {
        info!(tool = %s.name, started = s.started, emitted = s.emitted, skipped = s.skipped, "source summary");
    }
    Ok(if summary.cancelled { EXIT_INTERRUPTED } else { 0 })
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report_fatal(&e);
            1
        }
    };
    std::process::exit(code);
}
