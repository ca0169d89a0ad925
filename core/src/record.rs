use crate::{HostId, InfraInfo};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const RECORD_SOURCE: &str = "recon_pipeline";

/// One output line per probed host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRecord {
    pub timestamp: String,
    pub subdomain: String,
    pub status_code: u16,
    pub title: String,
    pub tech_stack: Vec<String>,
    pub vulnerabilities: Vec<Map<String, Value>>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<BTreeMap<String, String>>,
}

impl UnifiedRecord {
    pub fn new(host: &HostId, status_code: u16, title: String, tech_stack: Vec<String>) -> Self {
        UnifiedRecord {
            timestamp: crate::now_rfc3339(),
            subdomain: host.as_str().to_string(),
            status_code,
            title,
            tech_stack,
            vulnerabilities: Vec::new(),
            source: RECORD_SOURCE.to_string(),
            asn: None,
            org: None,
            versions: None,
        }
    }

    pub fn with_infra(mut self, info: Option<InfraInfo>) -> Self {
        if let Some(info) = info {
            self.asn = Some(format!("AS{}", info.asn));
            self.org = Some(info.org).filter(|o| !o.is_empty());
        }
        self
    }

    /// Live means the probe got any HTTP answer at all.
    pub fn is_live(&self) -> bool {
        self.status_code > 0
    }

    /// Append `name` to the tech stack unless it is already present.
    pub fn add_tech(&mut self, name: &str) -> bool {
        if self.tech_stack.iter().any(|t| t == name) {
            return false;
        }
        self.tech_stack.push(name.to_string());
        true
    }
}
