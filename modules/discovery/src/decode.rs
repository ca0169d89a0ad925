//! Per-line decoders for discovery tool output. Bad lines yield `None`, never an error.

use recon_core::{null_as_default, HostId, InfraInfo};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Bare hostnames, one per line.
    PlainText,
    /// amass `-json` records.
    AmassJson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub host: HostId,
    pub infra: Option<InfraInfo>,
}

#[derive(Debug, Deserialize)]
struct AmassRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    // passive runs print `"addresses": null`
    #[serde(default, deserialize_with = "null_as_default")]
    addresses: Vec<AmassAddress>,
}

#[derive(Debug, Deserialize)]
struct AmassAddress {
    #[serde(default)]
    asn: Option<u32>,
    #[serde(default)]
    desc: Option<String>,
}

pub fn decode_line(format: RecordFormat, line: &[u8]) -> Option<Discovered> {
    match format {
        RecordFormat::PlainText => decode_plain(line),
        RecordFormat::AmassJson => decode_amass(line),
    }
}

fn decode_plain(line: &[u8]) -> Option<Discovered> {
    let text = String::from_utf8_lossy(line);
    let host = HostId::parse(&text)?;
    Some(Discovered { host, infra: None })
}

fn decode_amass(line: &[u8]) -> Option<Discovered> {
    let rec: AmassRecord = serde_json::from_slice(line).ok()?;
    let host = HostId::parse(&rec.name)?;
    // first address that actually carries an ASN
    let infra = rec
        .addresses
        .into_iter()
        .find_map(|a| a.asn.map(|asn| InfraInfo { asn, org: a.desc.unwrap_or_default() }));
    Some(Discovered { host, infra })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines() {
        let d = decode_line(RecordFormat::PlainText, b"Api.Example.com").unwrap();
        assert_eq!(d.host.as_str(), "api.example.com");
        assert!(d.infra.is_none());
        assert!(decode_line(RecordFormat::PlainText, b"").is_none());
        assert!(decode_line(RecordFormat::PlainText, b"   ").is_none());
        assert!(decode_line(RecordFormat::PlainText, b"[INF] Loading provider config").is_none());
    }

    #[test]
    fn amass_with_addresses() {
        let line = br#"{"name":"www.example.com","domain":"example.com","addresses":[{"ip":"1.2.3.4","cidr":"1.2.3.0/24","asn":13335,"desc":"CLOUDFLARENET"},{"ip":"5.6.7.8","asn":15169,"desc":"GOOGLE"}]}"#;
        let d = decode_line(RecordFormat::AmassJson, line).unwrap();
        assert_eq!(d.host.as_str(), "www.example.com");
        assert_eq!(d.infra, Some(InfraInfo { asn: 13335, org: "CLOUDFLARENET".into() }));
    }

    #[test]
    fn amass_skips_addresses_without_asn() {
        let line = br#"{"name":"m.example.com","addresses":[{"ip":"10.0.0.1"},{"ip":"1.1.1.1","asn":64500}]}"#;
        let d = decode_line(RecordFormat::AmassJson, line).unwrap();
        assert_eq!(d.infra, Some(InfraInfo { asn: 64500, org: String::new() }));
    }

    #[test]
    fn amass_without_addresses() {
        let d = decode_line(RecordFormat::AmassJson, br#"{"name":"dev.example.com","domain":"example.com"}"#).unwrap();
        assert!(d.infra.is_none());
    }

    #[test]
    fn amass_null_fields_keep_the_host() {
        let line = br#"{"name":"www.example.com","domain":"example.com","addresses":null,"tag":"cert","sources":["CertSpotter"]}"#;
        let d = decode_line(RecordFormat::AmassJson, line).unwrap();
        assert_eq!(d.host.as_str(), "www.example.com");
        assert!(d.infra.is_none());

        let line = br#"{"name":"api.example.com","addresses":[{"ip":"1.2.3.4","cidr":null,"asn":64500,"desc":null}]}"#;
        let d = decode_line(RecordFormat::AmassJson, line).unwrap();
        assert_eq!(d.infra, Some(InfraInfo { asn: 64500, org: String::new() }));

        let line = br#"{"name":"m.example.com","addresses":[{"ip":"10.0.0.1","asn":null},{"ip":"1.1.1.1","asn":13335,"desc":"CLOUDFLARENET"}]}"#;
        let d = decode_line(RecordFormat::AmassJson, line).unwrap();
        assert_eq!(d.infra.map(|i| i.asn), Some(13335));
    }

    #[test]
    fn amass_malformed_or_nameless() {
        assert!(decode_line(RecordFormat::AmassJson, b"{not json").is_none());
        assert!(decode_line(RecordFormat::AmassJson, br#"{"domain":"example.com"}"#).is_none());
        assert!(decode_line(RecordFormat::AmassJson, br#"{"name":null,"addresses":null}"#).is_none());
        assert!(decode_line(RecordFormat::AmassJson, b"dev.example.com").is_none());
    }
}
