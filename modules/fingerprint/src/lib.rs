//! Per-host fingerprinting via whatweb, merged into an existing record.

use recon_core::{null_as_default, ToolCommand, UnifiedRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct WhatWebTarget {
    #[serde(default, deserialize_with = "null_as_default")]
    plugins: BTreeMap<String, Option<WhatWebPlugin>>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatWebPlugin {
    #[serde(default, deserialize_with = "null_as_default")]
    version: Vec<String>,
}

/// Components detected on one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// Component name → comma-joined versions, for components that reported any.
    pub versions: BTreeMap<String, String>,
    /// Every detected component name, sorted.
    pub components: Vec<String>,
}

/// Decode a whatweb JSON report (an array of targets); only the first target is used.
/// Returns `None` for undecodable output or an empty report.
pub fn decode_report(bytes: &[u8]) -> Option<Fingerprint> {
    let targets: Vec<WhatWebTarget> = serde_json::from_slice(bytes).ok()?;
    let first = targets.into_iter().next()?;
    let mut fp = Fingerprint::default();
    for (name, plugin) in first.plugins {
        let plugin = plugin.unwrap_or_default();
        if !plugin.version.is_empty() {
            fp.versions.insert(name.clone(), plugin.version.join(", "));
        }
        fp.components.push(name);
    }
    Some(fp)
}

impl Fingerprint {
    /// Merge into `record`: versions are recorded and unknown components are appended
    /// to the tech stack. Applying the same fingerprint twice changes nothing.
    pub fn apply_to(&self, record: &mut UnifiedRecord) {
        if !self.versions.is_empty() {
            record.versions.get_or_insert_with(BTreeMap::new).extend(self.versions.clone());
        }
        for c in &self.components {
            record.add_tech(c);
        }
    }
}

/// Runs the fingerprinting tool once per URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprinter {
    command: ToolCommand,
}

impl Fingerprinter {
    /// The URL is appended as the final argument of `command`.
    pub fn new(command: ToolCommand) -> Self {
        Fingerprinter { command }
    }

    /// `whatweb --aggression 3 --format=json <url>`
    pub fn whatweb() -> Self {
        Self::new(ToolCommand::new("whatweb", ["--aggression", "3", "--format=json"]))
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// Fingerprint one URL. Any failure (bad URL, spawn error, bad output) is `None`.
    pub async fn fingerprint(&self, url: &str) -> Option<Fingerprint> {
        if !is_probeable(url) {
            debug!(url, "not an http(s) url; skipping fingerprint");
            return None;
        }
        let mut cmd = self.command.clone().arg(url).to_command();
        let output = match cmd.output().await {
            Ok(o) => o,
            Err(e) => {
                debug!(tool = self.command.name(), url, error = %e, "fingerprint spawn failed");
                return None;
            }
        };
        let fp = decode_report(&output.stdout);
        if fp.is_none() {
            debug!(tool = self.command.name(), url, status = %output.status, "no usable fingerprint");
        }
        fp
    }
}

fn is_probeable(url: &str) -> bool {
    matches!(Url::parse(url), Ok(u) if matches!(u.scheme(), "http" | "https") && u.host().is_some())
}
