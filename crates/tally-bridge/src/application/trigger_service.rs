//! TriggerService: turns "show layout X on card N" into a tally pulse.
//!
//! A pulse sequence is:
//!
//! ```text
//! send ON ──► wait pulse_width (100 ms) ──► send OFF ──► wait flush (50 ms) ──► success
//! ```
//!
//! # Concurrency
//!
//! Every sequence runs in its own spawned Tokio task.  Awaiting the
//! [`JoinHandle`](tokio::task::JoinHandle) is only how the caller collects
//! the result; dropping the caller (for example an HTTP client hanging up)
//! does not stop a sequence that has already sent its ON packet, so a card
//! is never left with a tally stuck on.
//!
//! Batches group requests by destination `ip:port`.  Requests for the same
//! destination run one after another inside one task, in request order, so
//! two pulses never interleave on one card.  Different destinations run in
//! parallel, bounded by a semaphore.  [`TriggerService::trigger_cards`]
//! resolves each card first; cards that are unknown or disabled are reported
//! without holding up the rest.
//!
//! # Error handling
//!
//! No failure crosses this boundary as an `Err`: resolution and transport
//! errors are folded into [`TriggerResult`]s so one bad card never aborts its
//! siblings.  There are no automatic retries.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use tally_core::{
    encode_tally, BatchResult, CardId, CardRegistry, LayoutCatalog, TriggerRequest, TriggerResult,
};

use crate::domain::BridgeConfig;
use crate::infrastructure::transport::{PacketTransport, ProbeOutcome, TransportError};

/// Error type for resolving and running a trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Card {0} not found")]
    UnknownCard(CardId),

    #[error("Card {0} is disabled")]
    CardDisabled(CardId),

    #[error("Invalid trigger parameters")]
    InvalidParameters,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Source of waits between packets.
///
/// The production clock sleeps on the Tokio timer; tests substitute a
/// virtual clock so timing assertions do not depend on wall-clock time.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Waits and limits of one pulse sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pub pulse_width: Duration,
    pub flush_interval: Duration,
    pub send_timeout: Duration,
    pub probe_timeout: Duration,
}

impl From<&BridgeConfig> for PulseTiming {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            pulse_width: config.pulse_width,
            flush_interval: config.flush_interval,
            send_timeout: config.send_timeout,
            probe_timeout: config.probe_timeout,
        }
    }
}

/// Everything a spawned sequence needs, cheap to clone into the task.
#[derive(Clone)]
struct PulseSequencer {
    transport: Arc<dyn PacketTransport>,
    clock: Arc<dyn Clock>,
    timing: PulseTiming,
}

impl PulseSequencer {
    async fn run(&self, request: TriggerRequest) -> TriggerResult {
        match self.pulse(&request).await {
            Ok(()) => TriggerResult::succeeded(
                &request,
                format!(
                    "Triggered layout index {} on {}:{}",
                    request.index, request.ip, request.port
                ),
            ),
            Err(e) => {
                warn!(
                    ip = %request.ip,
                    port = request.port,
                    index = request.index,
                    "trigger failed: {e}"
                );
                TriggerResult::failed(request.card_id, request.ip, request.index, e)
            }
        }
    }

    async fn pulse(&self, request: &TriggerRequest) -> Result<(), TriggerError> {
        let addr = socket_addr(&request.ip, request.port)?;

        self.send(addr, &encode_tally(request.index, true)).await?;
        self.clock.sleep(self.timing.pulse_width).await;

        if let Err(e) = self.send(addr, &encode_tally(request.index, false)).await {
            error!(%addr, index = request.index, "tally OFF not delivered after ON: {e}");
            return Err(e.into());
        }
        self.clock.sleep(self.timing.flush_interval).await;

        debug!(%addr, index = request.index, "pulse complete");
        Ok(())
    }

    async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError> {
        timeout(self.timing.send_timeout, self.transport.send(addr, packet))
            .await
            .map_err(|_| TransportError::Timeout {
                addr,
                after: self.timing.send_timeout,
            })?
    }

    /// Runs `request` on its own task and waits for the result.
    async fn spawn(&self, request: TriggerRequest) -> TriggerResult {
        let sequencer = self.clone();
        let fallback = (request.card_id, request.ip.clone(), request.index);
        match tokio::spawn(async move { sequencer.run(request).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!("trigger task failed: {e}");
                TriggerResult::failed(fallback.0, fallback.1, fallback.2, e)
            }
        }
    }
}

fn socket_addr(ip: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let ip: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| TransportError::InvalidAddress(ip.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}

/// Resolves triggers against the card registry and runs pulse sequences.
pub struct TriggerService {
    sequencer: PulseSequencer,
    registry: Arc<RwLock<CardRegistry>>,
    catalog: LayoutCatalog,
    batch_limit: Arc<Semaphore>,
}

impl TriggerService {
    pub fn new(
        transport: Arc<dyn PacketTransport>,
        clock: Arc<dyn Clock>,
        registry: Arc<RwLock<CardRegistry>>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            sequencer: PulseSequencer {
                transport,
                clock,
                timing: PulseTiming::from(config),
            },
            registry,
            catalog: LayoutCatalog::standard(),
            batch_limit: Arc::new(Semaphore::new(config.batch_concurrency.max(1))),
        }
    }

    /// Shared handle to the card registry.
    pub fn registry(&self) -> &Arc<RwLock<CardRegistry>> {
        &self.registry
    }

    pub fn catalog(&self) -> &LayoutCatalog {
        &self.catalog
    }

    /// Builds the request for showing `layout` on `card_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::UnknownCard`] or [`TriggerError::CardDisabled`]
    /// when the card cannot be targeted.  Unknown layout names resolve to the
    /// fallback index and are not an error.
    fn resolve_in(
        &self,
        registry: &CardRegistry,
        card_id: CardId,
        layout: &str,
    ) -> Result<TriggerRequest, TriggerError> {
        let card = registry
            .get(card_id)
            .ok_or(TriggerError::UnknownCard(card_id))?;
        if !card.enabled {
            return Err(TriggerError::CardDisabled(card_id));
        }
        Ok(TriggerRequest {
            card_id: Some(card_id),
            ip: card.ip.clone(),
            port: card.port,
            index: self.catalog.tally_index_of(layout),
        })
    }

    /// Failure result for a card that could not be resolved, carrying
    /// whatever address and index are known.
    fn unresolved(
        &self,
        registry: &CardRegistry,
        card_id: CardId,
        layout: &str,
        error: TriggerError,
    ) -> TriggerResult {
        warn!(card_id, layout, "cannot trigger: {error}");
        let ip = registry
            .get(card_id)
            .map(|card| card.ip.clone())
            .unwrap_or_default();
        TriggerResult::failed(Some(card_id), ip, self.catalog.tally_index_of(layout), error)
    }

    /// Shows `layout` on `card_id` right away.
    pub async fn trigger_one(&self, card_id: CardId, layout: &str) -> TriggerResult {
        let resolved = {
            let registry = self.registry.read().await;
            self.resolve_in(&registry, card_id, layout)
                .map_err(|e| self.unresolved(&registry, card_id, layout, e))
        };
        match resolved {
            Ok(request) => {
                info!(card_id, layout, index = request.index, "triggering layout");
                self.sequencer.spawn(request).await
            }
            Err(failed) => failed,
        }
    }

    /// Shows a layout on each listed card, as [`trigger_one`](Self::trigger_one)
    /// would for each pair.
    ///
    /// A card that is unknown or disabled fails on its own; the others are
    /// pulsed as in [`trigger_batch`](Self::trigger_batch).  Results come
    /// back in target order.
    pub async fn trigger_cards(&self, targets: Vec<(CardId, String)>) -> BatchResult {
        let resolved: Vec<Result<TriggerRequest, TriggerResult>> = {
            let registry = self.registry.read().await;
            targets
                .iter()
                .map(|(card_id, layout)| {
                    self.resolve_in(&registry, *card_id, layout)
                        .map_err(|e| self.unresolved(&registry, *card_id, layout, e))
                })
                .collect()
        };

        let valid = resolved.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        let mut pulsed = self.trigger_batch(valid).await.results.into_iter();

        let results = resolved
            .into_iter()
            .map(|r| match r {
                Ok(request) => pulsed.next().unwrap_or_else(|| {
                    TriggerResult::failed(request.card_id, request.ip, request.index, "missing result")
                }),
                Err(failed) => failed,
            })
            .collect();
        BatchResult::from_results(results)
    }

    /// Pulses an already resolved index.
    pub async fn trigger_index(&self, request: TriggerRequest) -> TriggerResult {
        info!(ip = %request.ip, port = request.port, index = request.index, "triggering index");
        self.sequencer.spawn(request).await
    }

    /// Pulses every request, grouping by destination.
    ///
    /// Results come back in request order; the batch succeeds only if every
    /// item does.
    pub async fn trigger_batch(&self, requests: Vec<TriggerRequest>) -> BatchResult {
        let total = requests.len();
        info!(total, "triggering batch");

        let mut order: Vec<(String, u16)> = Vec::new();
        let mut groups: HashMap<(String, u16), Vec<(usize, TriggerRequest)>> = HashMap::new();
        for (pos, request) in requests.into_iter().enumerate() {
            let key = request.destination();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push((pos, request));
        }

        let mut tasks = Vec::with_capacity(order.len());
        for key in order {
            let Some(items) = groups.remove(&key) else {
                continue;
            };
            let fallbacks: Vec<(usize, TriggerResult)> = items
                .iter()
                .map(|(pos, r)| {
                    (
                        *pos,
                        TriggerResult::failed(r.card_id, r.ip.clone(), r.index, "trigger task failed"),
                    )
                })
                .collect();

            let sequencer = self.sequencer.clone();
            let limit = Arc::clone(&self.batch_limit);
            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only fails on shutdown.
                let _permit = limit.acquire_owned().await.ok();
                let mut out = Vec::with_capacity(items.len());
                for (pos, request) in items {
                    out.push((pos, sequencer.run(request).await));
                }
                out
            });
            tasks.push((handle, fallbacks));
        }

        let mut slots: Vec<Option<TriggerResult>> = vec![None; total];
        for (handle, fallbacks) in tasks {
            let results = match handle.await {
                Ok(results) => results,
                Err(e) => {
                    error!("batch task failed: {e}");
                    fallbacks
                }
            };
            for (pos, result) in results {
                slots[pos] = Some(result);
            }
        }

        let batch = BatchResult::from_results(slots.into_iter().flatten().collect());
        let failed = batch.results.iter().filter(|r| !r.success).count();
        info!(total, failed, "batch finished");
        batch
    }

    /// Checks whether `ip:port` looks reachable.  Never fails.
    pub async fn probe(&self, ip: &str, port: u16) -> ProbeOutcome {
        let addr = match socket_addr(ip, port) {
            Ok(addr) => addr,
            Err(e) => return ProbeOutcome::unreachable(format!("Connection failed: {e}")),
        };
        let limit = self.sequencer.timing.probe_timeout;
        match timeout(limit, self.sequencer.transport.probe(addr, limit)).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::timed_out(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::MockPacketTransport;
    use std::sync::Mutex;
    use tally_core::{decode_tally, EndpointUpdate};

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Clock that advances instantly and remembers the virtual time.
    #[derive(Default)]
    struct VirtualClock {
        now: Mutex<Duration>,
    }

    impl VirtualClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for VirtualClock {
        async fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }

    /// Records every packet with its destination and virtual send time.
    struct RecordingTransport {
        clock: Arc<VirtualClock>,
        sent: Mutex<Vec<(SocketAddr, Duration, [u8; 12])>>,
        fail_for: Option<SocketAddr>,
    }

    impl RecordingTransport {
        fn new(clock: Arc<VirtualClock>) -> Self {
            Self {
                clock,
                sent: Mutex::new(Vec::new()),
                fail_for: None,
            }
        }
    }

    #[async_trait]
    impl PacketTransport for RecordingTransport {
        async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError> {
            if self.fail_for == Some(addr) {
                return Err(TransportError::Io {
                    addr,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
                });
            }
            let mut bytes = [0u8; 12];
            bytes.copy_from_slice(packet);
            self.sent
                .lock()
                .unwrap()
                .push((addr, self.clock.now(), bytes));
            Ok(())
        }

        async fn probe(&self, _addr: SocketAddr, _limit: Duration) -> ProbeOutcome {
            ProbeOutcome::reachable("recorded")
        }
    }

    fn registry_with(cards: &[(CardId, &str, bool)]) -> Arc<RwLock<CardRegistry>> {
        let mut registry = CardRegistry::new();
        for &(id, ip, enabled) in cards {
            registry
                .update(
                    id,
                    EndpointUpdate {
                        ip: Some(ip.to_string()),
                        enabled: Some(enabled),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        Arc::new(RwLock::new(registry))
    }

    fn service(
        transport: Arc<dyn PacketTransport>,
        clock: Arc<dyn Clock>,
        registry: Arc<RwLock<CardRegistry>>,
    ) -> TriggerService {
        TriggerService::new(transport, clock, registry, &BridgeConfig::default())
    }

    fn request(ip: &str, index: u16) -> TriggerRequest {
        TriggerRequest {
            card_id: None,
            ip: ip.to_string(),
            port: 8902,
            index,
        }
    }

    // ── Pulse sequence ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pulse_sends_on_then_off_at_least_100ms_apart() {
        // Arrange
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport.clone(), clock.clone(), registry_with(&[]));

        // Act
        let result = svc.trigger_index(request("10.0.0.5", 5)).await;

        // Assert
        assert!(result.success, "{result:?}");
        assert_eq!(
            result.message.as_deref(),
            Some("Triggered layout index 5 on 10.0.0.5:8902")
        );
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let on = decode_tally(&sent[0].2).unwrap();
        let off = decode_tally(&sent[1].2).unwrap();
        assert!(on.tally_on && !off.tally_on);
        assert_eq!((on.index, off.index), (5, 5));
        assert!(sent[1].1 - sent[0].1 >= Duration::from_millis(100));
        assert_eq!(clock.now(), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_trigger_one_resolves_card_and_layout() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(
            transport.clone(),
            clock,
            registry_with(&[(4, "10.0.1.4", true)]),
        );

        let result = svc.trigger_one(4, "4_SPLIT").await;

        assert!(result.success);
        assert_eq!(result.card_id, Some(4));
        assert_eq!(result.index, 10);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0.to_string(), "10.0.1.4:8902");
    }

    #[tokio::test]
    async fn test_trigger_one_disabled_card_sends_nothing() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(
            transport.clone(),
            clock,
            registry_with(&[(2, "10.0.1.2", false)]),
        );

        let result = svc.trigger_one(2, "9_SPLIT").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Card 2 is disabled"));
        assert_eq!(result.ip, "10.0.1.2");
        assert_eq!(result.index, LayoutCatalog::standard().tally_index_of("9_SPLIT"));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_one_unknown_card() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport, clock, registry_with(&[]));

        let result = svc.trigger_one(40, "9_SPLIT").await;

        assert_eq!(result.error.as_deref(), Some("Card 40 not found"));
    }

    #[tokio::test]
    async fn test_invalid_ip_is_reported_not_sent() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport.clone(), clock, registry_with(&[]));

        let result = svc.trigger_index(request("kaleido.local", 1)).await;

        assert!(!result.success);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_on_packet_skips_off_packet() {
        // Arrange: the mock fails the first send.
        let mut mock = MockPacketTransport::new();
        mock.expect_send()
            .withf(|_, packet| decode_tally(packet).map(|p| p.tally_on).unwrap_or(false))
            .times(1)
            .returning(|addr, _| {
                Err(TransportError::Io {
                    addr,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "network unreachable"),
                })
            });
        let svc = service(
            Arc::new(mock),
            Arc::new(VirtualClock::default()),
            registry_with(&[]),
        );

        // Act
        let result = svc.trigger_index(request("10.0.0.9", 3)).await;

        // Assert: no OFF expectation was set, so a second send would panic the mock.
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Connection failed: network unreachable")
        );
    }

    // ── Batch ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_batch_reports_in_request_order_and_ands_success() {
        let clock = Arc::new(VirtualClock::default());
        let mut transport = RecordingTransport::new(Arc::clone(&clock));
        transport.fail_for = Some("10.0.0.2:8902".parse().unwrap());
        let svc = service(Arc::new(transport), clock, registry_with(&[]));

        let batch = svc
            .trigger_batch(vec![
                request("10.0.0.1", 1),
                request("10.0.0.2", 2),
                request("10.0.0.3", 3),
            ])
            .await;

        assert!(!batch.success);
        let ips: Vec<&str> = batch.results.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(ips, ["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let ok: Vec<bool> = batch.results.iter().map(|r| r.success).collect();
        assert_eq!(ok, [true, false, true]);
    }

    #[tokio::test]
    async fn test_batch_same_destination_never_interleaves() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport.clone(), clock, registry_with(&[]));

        let batch = svc
            .trigger_batch(vec![request("10.0.0.1", 1), request("10.0.0.1", 2)])
            .await;

        assert!(batch.success);
        let sent = transport.sent.lock().unwrap();
        let sequence: Vec<(u16, bool)> = sent
            .iter()
            .map(|(_, _, bytes)| {
                let p = decode_tally(bytes).unwrap();
                (p.index, p.tally_on)
            })
            .collect();
        assert_eq!(sequence, [(1, true), (1, false), (2, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_card_batch_disabled_card_fails_alone() {
        // Arrange: cards 1 and 3 enabled, card 2 disabled.
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(
            transport.clone(),
            clock,
            registry_with(&[
                (1, "10.0.0.1", true),
                (2, "10.0.0.2", false),
                (3, "10.0.0.3", true),
            ]),
        );

        // Act
        let batch = svc
            .trigger_cards(vec![
                (1, "4_SPLIT".to_string()),
                (2, "5_SPLIT".to_string()),
                (3, "9_SPLIT".to_string()),
            ])
            .await;

        // Assert
        assert!(!batch.success);
        let outcomes: Vec<_> = batch
            .results
            .iter()
            .map(|r| (r.card_id, r.success))
            .collect();
        assert_eq!(outcomes, [(Some(1), true), (Some(2), false), (Some(3), true)]);
        assert_eq!(batch.results[1].error.as_deref(), Some("Card 2 is disabled"));
        assert_eq!(batch.results[1].ip, "10.0.0.2");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(addr, _, _)| addr.ip().to_string() != "10.0.0.2"));
    }

    #[tokio::test]
    async fn test_card_batch_unknown_card_fails_alone() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport, clock, registry_with(&[(5, "10.0.0.5", true)]));

        let batch = svc
            .trigger_cards(vec![(30, "9_SPLIT".to_string()), (5, "9_SPLIT".to_string())])
            .await;

        assert_eq!(batch.results[0].error.as_deref(), Some("Card 30 not found"));
        assert!(batch.results[1].success);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport, clock, registry_with(&[]));

        let batch = svc.trigger_batch(Vec::new()).await;

        assert!(batch.success);
        assert!(batch.results.is_empty());
    }

    // ── Wall-clock behaviour ──────────────────────────────────────────────────

    /// Records ON/OFF packets without a clock of its own.
    #[derive(Default)]
    struct PacketLog {
        sent: Mutex<Vec<(SocketAddr, bool)>>,
    }

    impl PacketLog {
        fn len(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PacketTransport for PacketLog {
        async fn send(&self, addr: SocketAddr, packet: &[u8]) -> Result<(), TransportError> {
            let on = decode_tally(packet).map(|p| p.tally_on).unwrap_or(false);
            self.sent.lock().unwrap().push((addr, on));
            Ok(())
        }

        async fn probe(&self, _addr: SocketAddr, _limit: Duration) -> ProbeOutcome {
            ProbeOutcome::reachable("logged")
        }
    }

    #[tokio::test]
    async fn test_distinct_destinations_pulse_concurrently() {
        // Arrange: five cards, each sequence waits 100 ms + 50 ms.
        let log = Arc::new(PacketLog::default());
        let svc = service(log.clone(), Arc::new(SystemClock), registry_with(&[]));
        let requests: Vec<_> = (1..=5)
            .map(|n| request(&format!("10.0.0.{n}"), n))
            .collect();

        // Act
        let started = tokio::time::Instant::now();
        let batch = svc.trigger_batch(requests).await;
        let elapsed = started.elapsed();

        // Assert: run back to back this would take 750 ms.
        assert!(batch.success);
        assert_eq!(log.len(), 10);
        assert!(elapsed < Duration::from_millis(450), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_sequence_finishes_after_caller_is_dropped() {
        // Arrange
        let log = Arc::new(PacketLog::default());
        let svc = Arc::new(service(log.clone(), Arc::new(SystemClock), registry_with(&[])));
        let caller = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.trigger_index(request("10.0.0.7", 7)).await })
        };

        // Act: wait for the ON packet, then drop the caller mid-pulse.
        timeout(Duration::from_secs(1), async {
            while log.len() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        caller.abort();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Assert
        let sent = log.sent.lock().unwrap();
        let states: Vec<bool> = sent.iter().map(|(_, on)| *on).collect();
        assert_eq!(states, [true, false]);
    }

    #[tokio::test]
    async fn test_probe_invalid_ip_is_unreachable() {
        let clock = Arc::new(VirtualClock::default());
        let transport = Arc::new(RecordingTransport::new(Arc::clone(&clock)));
        let svc = service(transport, clock, registry_with(&[]));

        let outcome = svc.probe("not-an-ip", 8902).await;

        assert!(!outcome.success);
    }
}
