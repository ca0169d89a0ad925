use anyhow::{Context, Result};
use clap::Args;
use discovery::DiscoverySource;
use fingerprint::Fingerprinter;
use pipeline::PipelineConfig;
use port_scan::ScanPlan;
use recon_core::ToolCommand;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "recon.yaml";

/// Per-tool override: replacement program path and extra arguments.
#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub path: Option<String>,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    pub subfinder: Option<ToolConfig>,
    pub amass: Option<ToolConfig>,
    pub httpx: Option<ToolConfig>,
    pub whatweb: Option<ToolConfig>,
    pub nmap: Option<ToolConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub deep: Option<bool>,
    pub fingerprint: Option<bool>,
    pub port_scan: Option<bool>,
    pub ports: Option<String>,
    pub top_ports: Option<u16>,
    pub scan_output: Option<PathBuf>,
    pub channel_capacity: Option<usize>,
    pub tool_stderr: Option<bool>,
    pub tools: Option<ToolsConfig>,
}

/// Load the YAML config. An explicit path must exist and parse; without one,
/// ./recon.yaml is used when present.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(cfg))
}

/// Command-line switches; set flags win over the config file.
#[derive(Debug, Default, Clone, Args)]
pub struct Options {
    /// Enable deep discovery (amass)
    #[arg(long, default_value_t = false)]
    pub deep: bool,
    /// Enable aggressive fingerprinting of live hosts (whatweb)
    #[arg(long, default_value_t = false)]
    pub fingerprint: bool,
    /// Run an nmap port scan of the target in the background
    #[arg(long, default_value_t = false)]
    pub port_scan: bool,
    /// Ports for the port scan: comma/range list (e.g., 22,80,8000-8100). Default: top ports.
    #[arg(long, conflicts_with = "top_ports")]
    pub ports: Option<String>,
    /// Scan the N most common ports (default 100)
    #[arg(long)]
    pub top_ports: Option<u16>,
    /// Port scan report file (nmap normal output)
    #[arg(long, value_name = "FILE")]
    pub scan_output: Option<PathBuf>,
    /// Capacity of the discovery channel; producers block when it is full
    #[arg(long)]
    pub channel_capacity: Option<usize>,
    /// Let external tools write to this process's stderr
    #[arg(long, default_value_t = false)]
    pub tool_stderr: bool,
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub target: String,
    pub deep: bool,
    pub fingerprint: bool,
    pub port_scan: bool,
    pub ports: Option<Vec<u16>>,
    pub top_ports: u16,
    pub scan_output: PathBuf,
    pub channel_capacity: usize,
    pub tool_stderr: bool,
    pub tools: ToolsConfig,
}

impl Settings {
    pub fn resolve(target: &str, opts: &Options, file: Option<Config>) -> Result<Settings> {
        let target = target.trim();
        if target.is_empty() || target.chars().any(char::is_whitespace) {
            return Err(recon_core::ReconError::Config(format!("invalid target domain: {:?}", target)).into());
        }
        let cfg = file.unwrap_or_default();
        let ports_spec = opts.ports.clone().or(cfg.ports);
        let ports = match ports_spec {
            Some(spec) => Some(
                port_scan::parse_ports(&spec)
                    .map_err(|e| recon_core::ReconError::Config(format!("ports {:?}: {}", spec, e)))?,
            ),
            None => None,
        };
        let channel_capacity = opts.channel_capacity.or(cfg.channel_capacity).unwrap_or(discovery::DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            return Err(recon_core::ReconError::Config("channel capacity must be > 0".into()).into());
        }
        Ok(Settings {
            target: target.to_string(),
            deep: opts.deep || cfg.deep.unwrap_or(false),
            fingerprint: opts.fingerprint || cfg.fingerprint.unwrap_or(false),
            port_scan: opts.port_scan || cfg.port_scan.unwrap_or(false),
            ports,
            top_ports: opts.top_ports.or(cfg.top_ports).unwrap_or(port_scan::DEFAULT_TOP_PORTS),
            scan_output: opts.scan_output.clone().or(cfg.scan_output).unwrap_or_else(|| PathBuf::from(port_scan::DEFAULT_REPORT)),
            channel_capacity,
            tool_stderr: opts.tool_stderr || cfg.tool_stderr.unwrap_or(false),
            tools: cfg.tools.unwrap_or_default(),
        })
    }

    fn customize(&self, cmd: ToolCommand, over: Option<&ToolConfig>) -> ToolCommand {
        let mut cmd = cmd.inherit_stderr(self.tool_stderr);
        if let Some(o) = over {
            if let Some(p) = &o.path {
                cmd.program = p.clone();
            }
            if let Some(extra) = &o.args {
                cmd = cmd.extend_args(extra.iter().cloned());
            }
        }
        cmd
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let t = &self.tools;
        let source = |s: DiscoverySource, over: Option<&ToolConfig>| DiscoverySource {
            command: self.customize(s.command, over),
            format: s.format,
        };
        let mut discovery_sources = vec![source(discovery::subfinder(&self.target), t.subfinder.as_ref())];
        if self.deep {
            discovery_sources.push(source(discovery::amass(&self.target), t.amass.as_ref()));
        }
        let fingerprint = self.fingerprint.then(|| {
            Fingerprinter::new(self.customize(Fingerprinter::whatweb().command().clone(), t.whatweb.as_ref()))
        });
        let port_scan = self.port_scan.then(|| {
            let plan = ScanPlan {
                target: self.target.clone(),
                ports: self.ports.clone(),
                top_ports: self.top_ports,
                report: self.scan_output.clone(),
            };
            self.customize(port_scan::nmap(&plan), t.nmap.as_ref())
        });
        PipelineConfig {
            discovery: discovery_sources,
            probe: self.customize(http_probe::httpx(), t.httpx.as_ref()),
            fingerprint,
            port_scan,
            channel_capacity: self.channel_capacity,
        }
    }
}
