//! Recon pipeline orchestration.
//!
//! Discovery sources run concurrently and feed one bounded channel. A single
//! consumer dedups hosts into the probe's stdin. The probe's output is read
//! here line by line, joined against the infrastructure index, optionally
//! fingerprinted inline, and emitted as JSON lines. Records come out in the
//! order the probe produces them.

pub mod cancel;
pub mod emit;

pub use cancel::spawn_signal_listener;
pub use emit::Emitter;

use discovery::{DiscoverySource, SourceReport};
use fingerprint::Fingerprinter;
use recon_core::{InfraIndex, LineSource, ReconError, ToolCommand};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// At least one source; the first is the mandatory one.
    pub discovery: Vec<DiscoverySource>,
    pub probe: ToolCommand,
    pub fingerprint: Option<Fingerprinter>,
    pub port_scan: Option<ToolCommand>,
    pub channel_capacity: usize,
}

impl PipelineConfig {
    /// subfinder → httpx, nothing optional enabled.
    pub fn new(target: &str) -> Self {
        PipelineConfig {
            discovery: vec![discovery::subfinder(target)],
            probe: http_probe::httpx(),
            fingerprint: None,
            port_scan: None,
            channel_capacity: discovery::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Every program this configuration will spawn, in check order, without repeats.
    pub fn required_programs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .discovery
            .iter()
            .map(|s| &s.command)
            .chain(std::iter::once(&self.probe))
            .chain(self.port_scan.iter())
            .chain(self.fingerprint.iter().map(Fingerprinter::command));
        for tool in all {
            if !out.contains(&tool.program) {
                out.push(tool.program.clone());
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.discovery.is_empty() {
            return Err(ReconError::Config("no discovery source configured".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ReconError::Config("channel capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    pub unique_hosts: usize,
    pub duplicate_hosts: usize,
    pub observations: usize,
    pub skipped_lines: usize,
    pub enriched: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub cancelled: bool,
}

/// One orchestrator instance; owns its infrastructure index and cancellation token.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    index: InfraIndex,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config, index: InfraIndex::new(), cancel: CancellationToken::new() }
    }

    pub fn index(&self) -> &InfraIndex {
        &self.index
    }

    /// Cancelling this token kills every external process the run started.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run to completion (or cancellation), writing records to `out`.
    ///
    /// Only startup failures of the probe and failures of `out` itself are errors;
    /// everything the collaborators do wrong mid-stream just means fewer records.
    pub async fn run<W: Write>(&self, out: W) -> Result<RunSummary, ReconError> {
        self.config.validate()?;
        let (stdin, mut probe) = LineSource::spawn_with_stdin(&self.config.probe)?;
        info!(tool = probe.name(), "probe started");

        let scan_task = self.config.port_scan.as_ref().and_then(|tool| match port_scan::spawn(tool) {
            Ok(scan) => {
                let cancel = self.cancel.clone();
                Some(tokio::spawn(async move { scan.wait(&cancel).await }))
            }
            Err(e) => {
                warn!(error = %e, cause = %e.message(), "port scan unavailable");
                None
            }
        });

        let fan_in = discovery::spawn_fan_in(
            self.config.discovery.clone(),
            self.index.clone(),
            self.config.channel_capacity,
            self.cancel.clone(),
        );
        let feeder = tokio::spawn(discovery::feed_unique(fan_in.hosts, stdin));

        let mut emitter = Emitter::new(out);
        let mut summary = RunSummary::default();
        let mut output_error = None;

        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                line = probe.next_line() => line,
            };
            let Some(line) = line else { break };
            let Some(probed) = http_probe::decode_observation(&line) else {
                summary.skipped_lines += 1;
                continue;
            };
            summary.observations += 1;
            let mut record = probed.to_record(&self.index);

            if let Some(fp) = &self.config.fingerprint {
                if record.is_live() {
                    let found = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            summary.cancelled = true;
                            break;
                        }
                        found = fp.fingerprint(&probed.observation.url) => found,
                    };
                    if let Some(found) = found {
                        found.apply_to(&mut record);
                        summary.enriched += 1;
                    }
                }
            }

            if let Err(e) = emitter.emit(&record) {
                error!(error = %e, "output closed; stopping");
                output_error = Some(e);
                self.cancel.cancel();
                break;
            }
        }
        summary.emitted = emitter.emitted();
        summary.dropped = emitter.dropped();

        let aborted = summary.cancelled || output_error.is_some();
        if aborted {
            probe.terminate().await;
            feeder.abort();
        } else {
            probe.finish().await;
        }
        match feeder.await {
            Ok(fed) => {
                summary.unique_hosts = fed.unique;
                summary.duplicate_hosts = fed.duplicates;
            }
            Err(e) if e.is_cancelled() => debug!("feeder aborted"),
            Err(e) => warn!(error = %e, "feeder task failed"),
        }
        match fan_in.done.await {
            Ok(reports) => summary.sources = reports,
            Err(e) => warn!(error = %e, "discovery coordinator failed"),
        }
        if let Some(task) = scan_task {
            if !aborted {
                info!("waiting for port scan to finish");
            }
            if let Err(e) = task.await {
                warn!(error = %e, "port scan task failed");
            }
        }
        // an interrupt while waiting on the scan still counts
        summary.cancelled |= self.cancel.is_cancelled();

        if let Some(e) = output_error {
            return Err(ReconError::Output(e));
        }
        info!(
            unique = summary.unique_hosts,
            emitted = summary.emitted,
            skipped = summary.skipped_lines,
            enriched = summary.enriched,
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(summary)
    }
}
