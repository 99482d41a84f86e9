mod calc;
mod ipc;
mod labels;
mod logging;
mod marks;
mod report;
mod roster;
mod verify;
mod view;

use clap::Parser;
use std::io::{self, BufRead, Write};

/// VPR results analysis sidecar: one JSON request per stdin line, one JSON
/// response per stdout line.
#[derive(Debug, Parser)]
#[command(name = "vprd", version)]
struct Cli {
    /// Log filter, e.g. `debug` or `vprd=trace`. Overrides VPRD_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, env = "VPRD_LOG_JSON")]
    log_json: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init_tracing(cli.log_level.as_deref(), cli.log_json) {
        eprintln!("vprd: logging disabled: {e}");
    }

    let mut state = ipc::AppState::new();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vprd started");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "bad request line");
                let _ = writeln!(stdout, "{}", ipc::bad_json(e.to_string()));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}
