mod config;
mod ipc;
mod telemetry;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::load().context("loading configuration")?;
    telemetry::init(&config.telemetry).context("initialising logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        default_scale = %config.grading.scale,
        default_rounding = %config.grading.rounding,
        "gradingd started"
    );

    let mut state = ipc::AppState::new(config.grading);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed with error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "dropping malformed request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
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

    info!("stdin closed, shutting down");
    Ok(())
}
