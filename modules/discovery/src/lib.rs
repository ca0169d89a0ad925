//! Subdomain discovery: external enumeration tools merged into one deduplicated host stream.

pub mod decode;
pub mod fan_in;

pub use decode::{decode_line, Discovered, RecordFormat};
pub use fan_in::{feed_unique, spawn_fan_in, Dedup, FanIn, FeedReport, SourceReport};

use recon_core::ToolCommand;

/// Default capacity of the discovery → dedup channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// One discovery tool and the format of its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySource {
    pub command: ToolCommand,
    pub format: RecordFormat,
}

impl DiscoverySource {
    pub fn new(command: ToolCommand, format: RecordFormat) -> Self {
        DiscoverySource { command, format }
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }
}

/// `subfinder -d <target> -silent`: one host per line.
pub fn subfinder(target: &str) -> DiscoverySource {
    DiscoverySource::new(ToolCommand::new("subfinder", ["-d", target, "-silent"]), RecordFormat::PlainText)
}

/// `amass enum -passive -d <target> -json /dev/stdout`: JSON records with address metadata.
pub fn amass(target: &str) -> DiscoverySource {
    DiscoverySource::new(
        ToolCommand::new("amass", ["enum", "-passive", "-d", target, "-json", "/dev/stdout"]),
        RecordFormat::AmassJson,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_target_the_domain() {
        let s = subfinder("example.com");
        assert_eq!(s.name(), "subfinder");
        assert_eq!(s.command.args, vec!["-d", "example.com", "-silent"]);
        assert_eq!(s.format, RecordFormat::PlainText);

        let a = amass("example.com");
        assert_eq!(a.name(), "amass");
        assert!(a.command.args.windows(2).any(|w| w == ["-d", "example.com"]));
        assert_eq!(a.format, RecordFormat::AmassJson);
    }
}
