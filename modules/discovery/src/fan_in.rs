//! Concurrent fan-in of discovery sources with a single deduplicating consumer.

use crate::decode::decode_line;
use crate::DiscoverySource;
use recon_core::{HostId, InfraIndex, LineSource};
use std::collections::HashSet;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-source outcome, reported once the source's task ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub emitted: usize,
    pub skipped: usize,
    pub started: bool,
    pub cancelled: bool,
}

/// Merged host stream plus the coordinator that closes it.
#[derive(Debug)]
pub struct FanIn {
    pub hosts: mpsc::Receiver<HostId>,
    pub done: JoinHandle<Vec<SourceReport>>,
}

/// Start every source concurrently. The returned receiver yields hosts from all of
/// them (duplicates included) and ends only after every source task has finished.
pub fn spawn_fan_in(
    sources: Vec<DiscoverySource>,
    index: InfraIndex,
    capacity: usize,
    cancel: CancellationToken,
) -> FanIn {
    let (tx, rx) = mpsc::channel::<HostId>(capacity.max(1));
    let mut tasks = JoinSet::new();
    for source in sources {
        tasks.spawn(run_source(source, tx.clone(), index.clone(), cancel.clone()));
    }
    let done = tokio::spawn(async move {
        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(r) => {
                    info!(tool = %r.name, emitted = r.emitted, skipped = r.skipped, "discovery source finished");
                    reports.push(r);
                }
                Err(e) => warn!(error = %e, "discovery task failed"),
            }
        }
        // Last sender: the channel closes here and only here.
        drop(tx);
        debug!(sources = reports.len(), "discovery complete");
        reports
    });
    FanIn { hosts: rx, done }
}

async fn run_source(
    source: DiscoverySource,
    tx: mpsc::Sender<HostId>,
    index: InfraIndex,
    cancel: CancellationToken,
) -> SourceReport {
    let mut report = SourceReport { name: source.name().to_string(), ..Default::default() };
    let mut lines = match LineSource::spawn(&source.command) {
        Ok(l) => l,
        Err(e) => {
            warn!(tool = %report.name, error = %e, cause = %e.message(), "discovery source unavailable");
            return report;
        }
    };
    report.started = true;
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                lines.terminate().await;
                return report;
            }
            line = lines.next_line() => line,
        };
        let Some(line) = line else { break };
        let Some(found) = decode_line(source.format, &line) else {
            report.skipped += 1;
            continue;
        };
        // Index before sending so the host never reaches the probe ahead of its own metadata.
        if let Some(info) = found.infra {
            index.put(found.host.clone(), info);
        }
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                lines.terminate().await;
                return report;
            }
            r = tx.send(found.host) => r.is_ok(),
        };
        if !sent {
            debug!(tool = %report.name, "consumer gone; stopping");
            lines.terminate().await;
            return report;
        }
        report.emitted += 1;
    }
    lines.finish().await;
    report
}

/// Seen-set owned by the sole consumer of the fan-in channel.
#[derive(Debug, Default)]
pub struct Dedup {
    seen: HashSet<HostId>,
}

impl Dedup {
    /// `true` the first time a host is offered.
    pub fn admit(&mut self, host: &HostId) -> bool {
        self.seen.insert(host.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub unique: usize,
    pub duplicates: usize,
    pub write_failed: bool,
}

/// Drain the fan-in channel, writing each distinct host once per line to `sink`.
/// The sink is shut down and dropped at the end, which signals end of input.
pub async fn feed_unique<W>(mut hosts: mpsc::Receiver<HostId>, mut sink: W) -> FeedReport
where
    W: AsyncWrite + Unpin,
{
    let mut dedup = Dedup::default();
    let mut report = FeedReport::default();
    while let Some(host) = hosts.recv().await {
        if !dedup.admit(&host) {
            report.duplicates += 1;
            continue;
        }
        let mut line = String::with_capacity(host.as_str().len() + 1);
        line.push_str(host.as_str());
        line.push('\n');
        if let Err(e) = sink.write_all(line.as_bytes()).await {
            warn!(host = %host, error = %e, "probe input closed early");
            report.write_failed = true;
            break;
        }
        report.unique += 1;
    }
    // Dropping the receiver makes any remaining producers stop.
    drop(hosts);
    if let Err(e) = sink.shutdown().await {
        debug!(error = %e, "probe input shutdown");
    }
    drop(sink);
    info!(unique = report.unique, duplicates = report.duplicates, "probe input closed");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordFormat;
    use recon_core::{InfraInfo, ToolCommand};
    use std::time::Duration;

    fn host(s: &str) -> HostId {
        HostId::parse(s).unwrap()
    }

    fn sh(script: &str, format: RecordFormat) -> DiscoverySource {
        DiscoverySource::new(ToolCommand::new("sh", ["-c", script]), format)
    }

    #[test]
    fn dedup_admits_once() {
        let mut d = Dedup::default();
        assert!(d.admit(&host("a.example.com")));
        assert!(!d.admit(&host("A.example.com")));
        assert!(d.admit(&host("b.example.com")));
        assert!(!d.admit(&host("b.example.com.")));
    }

    #[tokio::test]
    async fn feed_writes_each_host_once() {
        let (tx, rx) = mpsc::channel(4);
        let producer = tokio::spawn(async move {
            for h in ["a.example.com", "b.example.com", "a.example.com", "c.example.com", "b.example.com"] {
                tx.send(host(h)).await.unwrap();
            }
        });
        let mut out = Vec::new();
        let report = feed_unique(rx, &mut out).await;
        producer.await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a.example.com\nb.example.com\nc.example.com\n");
        assert_eq!(report, FeedReport { unique: 3, duplicates: 2, write_failed: false });
    }

    #[tokio::test]
    async fn feed_with_nothing_discovered() {
        let (tx, rx) = mpsc::channel::<HostId>(1);
        drop(tx);
        let mut out = Vec::new();
        let report = feed_unique(rx, &mut out).await;
        assert!(out.is_empty());
        assert_eq!(report.unique, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fan_in_merges_all_sources() {
        let sources = vec![
            sh("printf 'a.example.com\\nb.example.com\\n'", RecordFormat::PlainText),
            sh("printf 'b.example.com\\nnot a host\\nc.example.com\\n'", RecordFormat::PlainText),
            sh("printf 'A.EXAMPLE.COM\\n'; exit 1", RecordFormat::PlainText),
        ];
        // capacity 1 forces producers to block on the consumer
        let fan = spawn_fan_in(sources, InfraIndex::new(), 1, CancellationToken::new());
        let mut out = Vec::new();
        let report = feed_unique(fan.hosts, &mut out).await;
        let mut reports = fan.done.await.unwrap();
        reports.sort_by_key(|r| r.emitted);

        let mut lines: Vec<_> = String::from_utf8(out).unwrap().lines().map(str::to_string).collect();
        lines.sort();
        assert_eq!(lines, vec!["a.example.com", "b.example.com", "c.example.com"]);
        assert_eq!(report.unique, 3);
        assert_eq!(report.duplicates, 2);
        assert_eq!(reports.iter().map(|r| r.emitted).sum::<usize>(), 5);
        assert_eq!(reports.iter().map(|r| r.skipped).sum::<usize>(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn amass_source_fills_the_index() {
        let script = r#"printf '%s\n' '{"name":"www.example.com","addresses":[{"asn":13335,"desc":"CLOUDFLARENET"}]}' 'garbage' '{"name":"dev.example.com"}'"#;
        let index = InfraIndex::new();
        let fan = spawn_fan_in(vec![sh(script, RecordFormat::AmassJson)], index.clone(), 8, CancellationToken::new());
        let mut out = Vec::new();
        feed_unique(fan.hosts, &mut out).await;
        fan.done.await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "www.example.com\ndev.example.com\n");
        assert_eq!(index.get(&host("www.example.com")), Some(InfraInfo { asn: 13335, org: "CLOUDFLARENET".into() }));
        assert!(index.get(&host("dev.example.com")).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unavailable_source_degrades() {
        let sources = vec![
            DiscoverySource::new(ToolCommand::new("no-such-discovery-tool", ["-d", "x"]), RecordFormat::PlainText),
            sh("echo ok.example.com", RecordFormat::PlainText),
        ];
        let fan = spawn_fan_in(sources, InfraIndex::new(), 8, CancellationToken::new());
        let mut out = Vec::new();
        feed_unique(fan.hosts, &mut out).await;
        let reports = fan.done.await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ok.example.com\n");
        assert_eq!(reports.iter().filter(|r| !r.started).count(), 1);
    }

    #[tokio::test]
    async fn no_sources_closes_immediately() {
        let fan = spawn_fan_in(Vec::new(), InfraIndex::new(), 8, CancellationToken::new());
        let mut out = Vec::new();
        let report = feed_unique(fan.hosts, &mut out).await;
        assert!(fan.done.await.unwrap().is_empty());
        assert_eq!(report.unique, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_stops_hung_source() {
        let cancel = CancellationToken::new();
        let fan = spawn_fan_in(vec![sh("echo first.example.com; exec sleep 30", RecordFormat::PlainText)], InfraIndex::new(), 8, cancel.clone());
        let feeder = tokio::spawn(feed_unique(fan.hosts, Vec::new()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let reports = tokio::time::timeout(Duration::from_secs(5), fan.done).await.unwrap().unwrap();
        assert!(reports[0].cancelled);
        let report = tokio::time::timeout(Duration::from_secs(5), feeder).await.unwrap().unwrap();
        assert_eq!(report.unique, 1);
    }
}
