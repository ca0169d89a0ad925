//! Core types shared by the recon pipeline crates.

pub mod error;
pub mod infra;
pub mod preflight;
pub mod process;
pub mod record;

pub use error::ReconError;
pub use infra::InfraIndex;
pub use process::{LineSource, ToolCommand};
pub use record::UnifiedRecord;

use serde::{Deserialize, Deserializer};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// `deserialize_with` helper: JSON `null` decodes like a missing field.
///
/// Tools written in Go emit `null` for empty slices and maps; pair with
/// `#[serde(default)]` so both spellings give `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Host identifier used as the join key across every stage.
///
/// Parsing trims, strips one trailing `.` and folds ASCII case, so the same
/// host reported with different casing by two tools dedups and joins as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(String);

impl HostId {
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        let t = t.strip_suffix('.').unwrap_or(t);
        if t.is_empty() || t.chars().any(char::is_whitespace) {
            return None;
        }
        Some(HostId(t.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin network and organization reported for a host by a discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraInfo {
    pub asn: u32,
    pub org: String,
}
