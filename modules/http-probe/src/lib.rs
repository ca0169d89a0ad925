//! HTTP probing via httpx: hosts in on stdin, one JSON observation per live answer out.

use recon_core::{null_as_default, HostId, InfraIndex, ToolCommand, UnifiedRecord};
use serde::Deserialize;
use tracing::trace;

/// `httpx -silent -json -title -tech-detect -status-code`, reading hosts from stdin.
pub fn httpx() -> ToolCommand {
    ToolCommand::new("httpx", ["-silent", "-json", "-title", "-tech-detect", "-status-code"])
}

/// One decoded httpx line. Missing or `null` fields default, unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Observation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_code: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tech: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub webserver: String,
}

/// A decoded observation together with the join key taken from its `input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probed {
    pub host: HostId,
    pub observation: Observation,
}

/// Decode one httpx output line; malformed lines and lines without a usable
/// `input` host give `None`.
pub fn decode_observation(line: &[u8]) -> Option<Probed> {
    let observation: Observation = serde_json::from_slice(line).ok()?;
    let host = HostId::parse(&observation.input)?;
    Some(Probed { host, observation })
}

impl Probed {
    /// Build the output record, joining infrastructure metadata when the index has it.
    pub fn to_record(&self, index: &InfraIndex) -> UnifiedRecord {
        let obs = &self.observation;
        trace!(host = %self.host, url = %obs.url, webserver = %obs.webserver, "observation");
        UnifiedRecord::new(&self.host, obs.status_code, obs.title.clone(), obs.tech.clone())
            .with_infra(index.get(&self.host))
    }
}
