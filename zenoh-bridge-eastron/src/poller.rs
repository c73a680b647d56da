//! Meter polling: one sequential sweep over the register map per period.

use crate::catalog::DeviceModel;
use crate::config::MeterConfig;
use crate::decoder::{DecodeError, Decoder};
use crate::link::{LinkHealthTracker, LinkState, ReadOutcome};
use crate::publisher::{StatePublisher, connection_definition};
use crate::transport::{ReadError, Transport};
use meterlink_common::StateDefinition;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, warn};

/// Upper bound for the final connectivity write on shutdown.
const SHUTDOWN_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing and failure policy of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between the starts of two cycles.
    pub interval: Duration,
    /// Timeout of each register read.
    pub read_timeout: Duration,
    /// Stop the current cycle at the first failed register.
    pub abort_cycle_on_failure: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(5000),
            abort_cycle_on_failure: true,
        }
    }
}

impl From<&MeterConfig> for PollSettings {
    fn from(config: &MeterConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            read_timeout: config.read_timeout(),
            abort_cycle_on_failure: config.abort_cycle_on_failure,
        }
    }
}

/// Why a register produced no value.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Read(ReadError),
    Decode(DecodeError),
}

/// A register that failed during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub state_id: String,
    pub address: u16,
    pub kind: FailureKind,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Registers a read was attempted for.
    pub attempted: usize,
    /// Values handed to the publisher successfully.
    pub published: usize,
    pub failures: Vec<CycleFailure>,
    /// Remaining registers were skipped after a failure.
    pub aborted: bool,
}

/// Polls one meter for the lifetime of the process.
///
/// The poller exclusively owns the transport, the link tracker and the
/// publisher; nothing else reads from the meter.
pub struct MeterPoller<T, P> {
    model: DeviceModel,
    transport: T,
    publisher: P,
    decoder: Decoder,
    link: LinkHealthTracker,
    settings: PollSettings,
}

impl<T: Transport, P: StatePublisher> MeterPoller<T, P> {
    pub fn new(
        model: DeviceModel,
        transport: T,
        publisher: P,
        decoder: Decoder,
        link: LinkHealthTracker,
        settings: PollSettings,
    ) -> Self {
        Self {
            model,
            transport,
            publisher,
            decoder,
            link,
            settings,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Run until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// Cancels a pending cycle or in-flight read, then writes a final
    /// `connected = false` and releases the transport.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            model = %self.model.name,
            registers = self.model.len(),
            interval_ms = self.settings.interval.as_millis() as u64,
            read_timeout_ms = self.settings.read_timeout.as_millis() as u64,
            "Starting meter poller"
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancelled = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => true,
            _ = self.define_states() => false,
        };
        if cancelled {
            self.stop().await;
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let report = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                report = self.poll_once() => report,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            if report.failures.is_empty() {
                debug!(
                    published = report.published,
                    elapsed_ms, "Poll cycle complete"
                );
            } else {
                warn!(
                    attempted = report.attempted,
                    published = report.published,
                    failed = report.failures.len(),
                    aborted = report.aborted,
                    consecutive_failures = self.link.consecutive_failures(),
                    elapsed_ms,
                    "Poll cycle incomplete"
                );
            }
        }

        self.stop().await;
    }

    /// Publish the definitions of the connectivity flag and every register.
    ///
    /// Definitions that fail here are retried before the state's next write.
    pub async fn define_states(&mut self) {
        let definitions = std::iter::once(connection_definition())
            .chain(self.model.registers.iter().map(|r| r.definition()));

        for definition in definitions {
            ensure_defined(&mut self.publisher, &definition).await;
        }
    }

    /// Read every register once, in declaration order.
    pub async fn poll_once(&mut self) -> CycleReport {
        let Self {
            model,
            transport,
            publisher,
            decoder,
            link,
            settings,
        } = self;

        let mut report = CycleReport::default();
        debug!(model = %model.name, "Polling");

        for register in &model.registers {
            report.attempted += 1;
            let state_id = register.state_id();

            let read = transport
                .read_registers(
                    register.function,
                    register.address,
                    register.word_count,
                    settings.read_timeout,
                )
                .await;

            let failure = match read {
                Ok(bytes) => match decoder.decode(&bytes) {
                    Ok(value) => {
                        ensure_defined(publisher, &register.definition()).await;
                        match publisher.publish(&state_id, value, true).await {
                            Ok(()) => report.published += 1,
                            Err(e) => warn!(state = %state_id, error = %e, "Failed to publish value"),
                        }
                        record_outcome(link, publisher, &ReadOutcome::Success(bytes)).await;
                        continue;
                    }
                    Err(e) => {
                        error!(
                            state = %state_id,
                            address = register.address,
                            error = %e,
                            "Undecodable register response"
                        );
                        let outcome = ReadOutcome::ProtocolError(e.to_string());
                        record_outcome(link, publisher, &outcome).await;
                        FailureKind::Decode(e)
                    }
                },
                Err(e) => {
                    warn!(
                        state = %state_id,
                        address = register.address,
                        error = %e,
                        "Register read failed"
                    );
                    let outcome = match &e {
                        ReadError::Timeout(_) => ReadOutcome::Timeout,
                        ReadError::Protocol(detail) => ReadOutcome::ProtocolError(detail.clone()),
                    };
                    record_outcome(link, publisher, &outcome).await;
                    FailureKind::Read(e)
                }
            };

            report.failures.push(CycleFailure {
                state_id,
                address: register.address,
                kind: failure,
            });

            if settings.abort_cycle_on_failure {
                report.aborted = report.attempted < model.len();
                break;
            }
        }

        report
    }

    async fn stop(&mut self) {
        info!(model = %self.model.name, "Stopping meter poller");

        let publisher = &mut self.publisher;
        let report_down = async move {
            ensure_defined(publisher, &connection_definition()).await;
            publisher.publish_connectivity(false).await
        };

        match timeout(SHUTDOWN_PUBLISH_TIMEOUT, report_down).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to publish disconnected state"),
            Err(_) => warn!("Timed out publishing disconnected state"),
        }

        self.transport.disconnect().await;
    }
}

/// Feed an outcome into the tracker and publish the flag if it changed.
async fn record_outcome<P: StatePublisher>(
    link: &mut LinkHealthTracker,
    publisher: &mut P,
    outcome: &ReadOutcome,
) {
    let Some(connected) = link.record(outcome) else {
        return;
    };

    if connected {
        info!("Meter link up");
    } else {
        warn!(
            consecutive_failures = link.consecutive_failures(),
            "Meter link down"
        );
    }

    ensure_defined(publisher, &connection_definition()).await;
    if let Err(e) = publisher.publish_connectivity(connected).await {
        warn!(connected, error = %e, "Failed to publish connectivity");
    }
}

/// Make sure a state is defined; failures are logged and retried on the
/// next write of the state.
async fn ensure_defined<P: StatePublisher>(publisher: &mut P, definition: &StateDefinition) {
    if let Err(e) = publisher.ensure_state_definition(definition).await {
        warn!(state = %definition.id, error = %e, "Failed to publish state definition");
    }
}

/// Resolves once shutdown was requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
