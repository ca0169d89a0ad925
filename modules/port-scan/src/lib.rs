//! Background nmap port scan against the target, written to a report file.

use anyhow::{anyhow, Result};
use recon_core::{ReconError, ToolCommand};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_PORTS: u16 = 100;
pub const DEFAULT_REPORT: &str = "nmap-scan.txt";

/// Parse a comma-separated list of ports/ranges (e.g., "22,80,443", "1-1024,8080").
pub fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let s: u16 = start.trim().parse()?;
            let e: u16 = end.trim().parse()?;
            if s == 0 || e == 0 || s > e {
                return Err(anyhow!("invalid port range: {}", part));
            }
            ports.extend(s..=e);
        } else {
            let p: u16 = part.parse()?;
            if p == 0 {
                return Err(anyhow!("invalid port: {}", part));
            }
            ports.push(p);
        }
    }
    if ports.is_empty() {
        return Err(anyhow!("empty port list"));
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Render sorted ports for `nmap -p`, collapsing consecutive runs into ranges.
pub fn format_ports(ports: &[u16]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < ports.len() {
        let start = ports[i];
        let mut end = start;
        while i + 1 < ports.len() && ports[i + 1] == end.saturating_add(1) {
            i += 1;
            end = ports[i];
        }
        parts.push(if start == end { start.to_string() } else { format!("{}-{}", start, end) });
        i += 1;
    }
    parts.join(",")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub target: String,
    /// Explicit ports; when `None` the `top_ports` most common ports are scanned.
    pub ports: Option<Vec<u16>>,
    pub top_ports: u16,
    pub report: PathBuf,
}

impl ScanPlan {
    pub fn new(target: impl Into<String>) -> Self {
        ScanPlan { target: target.into(), ports: None, top_ports: DEFAULT_TOP_PORTS, report: PathBuf::from(DEFAULT_REPORT) }
    }
}

/// `nmap (-p <list> | --top-ports <n>) <target> -oN <report>`
pub fn nmap(plan: &ScanPlan) -> ToolCommand {
    let mut cmd = ToolCommand::new("nmap", Vec::<String>::new());
    cmd = match &plan.ports {
        Some(p) => cmd.arg("-p").arg(format_ports(p)),
        None => cmd.arg("--top-ports").arg(plan.top_ports.max(1).to_string()),
    };
    cmd.arg(plan.target.clone()).arg("-oN").arg(plan.report.to_string_lossy().into_owned())
}

/// A scan running in the background; its stdout is discarded.
#[derive(Debug)]
pub struct RunningScan {
    name: String,
    child: Child,
}

pub fn spawn(tool: &ToolCommand) -> Result<RunningScan, ReconError> {
    let mut cmd = tool.to_command();
    cmd.stdout(Stdio::null());
    let child = cmd
        .spawn()
        .map_err(|source| ReconError::Spawn { tool: tool.name().to_string(), source })?;
    info!(tool = tool.name(), args = ?tool.args, "port scan started");
    Ok(RunningScan { name: tool.name().to_string(), child })
}

impl RunningScan {
    /// Wait for the scan to finish, or kill it when `cancel` fires (then `None`).
    pub async fn wait(mut self, cancel: &CancellationToken) -> Option<ExitStatus> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = self.child.kill().await {
                    debug!(tool = %self.name, error = %e, "kill failed");
                }
                None
            }
            status = self.child.wait() => match status {
                Ok(s) => {
                    if s.success() { info!(tool = %self.name, "port scan finished"); }
                    else { warn!(tool = %self.name, status = %s, "port scan failed"); }
                    Some(s)
                }
                Err(e) => {
                    warn!(tool = %self.name, error = %e, "wait failed");
                    None
                }
            },
        }
    }
}
