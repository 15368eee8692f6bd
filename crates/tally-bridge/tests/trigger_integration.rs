//! End-to-end tests over real loopback sockets.
//!
//! Each "card" is a UDP socket or TCP listener on 127.0.0.1; the bytes it
//! receives are decoded with the `tally-core` codec and compared against the
//! layout catalog.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::timeout;

use tally_bridge::application::SystemClock;
use tally_bridge::domain::{BridgeConfig, TransportKind};
use tally_bridge::infrastructure::transport::build_transport;
use tally_bridge::infrastructure::AppState;
use tally_core::{
    decode_tally, CardId, CardRegistry, DisplayId, EndpointUpdate, LayoutCatalog, Side,
    TallyPacket, TriggerRequest,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn fast_config(transport: TransportKind) -> BridgeConfig {
    BridgeConfig {
        transport,
        pulse_width: Duration::from_millis(5),
        flush_interval: Duration::from_millis(1),
        send_timeout: Duration::from_secs(2),
        ..BridgeConfig::default()
    }
}

fn enable(registry: &mut CardRegistry, card_id: CardId, addr: SocketAddr) {
    registry
        .update(
            card_id,
            EndpointUpdate {
                ip: Some(addr.ip().to_string()),
                port: Some(u32::from(addr.port())),
                enabled: Some(true),
                label: None,
            },
        )
        .unwrap();
}

async fn state_with(config: BridgeConfig, registry: CardRegistry) -> AppState {
    let transport = build_transport(config.transport, config.send_timeout)
        .await
        .unwrap();
    AppState::new(config, transport, Arc::new(SystemClock), registry, None)
}

async fn udp_card() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Receives `count` datagrams and decodes them in arrival order.
async fn recv_packets(socket: &UdpSocket, count: usize) -> Vec<TallyPacket> {
    let mut packets = Vec::with_capacity(count);
    let mut buf = [0u8; 64];
    for _ in 0..count {
        let (n, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("card received nothing")
            .unwrap();
        packets.push(decode_tally(&buf[..n]).unwrap());
    }
    packets
}

fn on_off(index: u16) -> Vec<(u16, bool)> {
    vec![(index, true), (index, false)]
}

fn summarize(packets: &[TallyPacket]) -> Vec<(u16, bool)> {
    packets.iter().map(|p| (p.index, p.tally_on)).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_pulses_each_card_and_isolates_bad_item() {
    // Arrange
    let (card_a, addr_a) = udp_card().await;
    let (card_b, addr_b) = udp_card().await;
    let state = state_with(fast_config(TransportKind::Udp), CardRegistry::new()).await;

    let requests = vec![
        TriggerRequest {
            card_id: Some(1),
            ip: "127.0.0.1".to_string(),
            port: addr_a.port(),
            index: 4,
        },
        TriggerRequest {
            card_id: Some(2),
            ip: "10.0.0.300".to_string(),
            port: 8902,
            index: 5,
        },
        TriggerRequest {
            card_id: Some(3),
            ip: "127.0.0.1".to_string(),
            port: addr_b.port(),
            index: 7,
        },
    ];

    // Act
    let batch = state.trigger.trigger_batch(requests).await;

    // Assert
    assert!(!batch.success);
    let outcomes: Vec<_> = batch.results.iter().map(|r| (r.card_id, r.success)).collect();
    assert_eq!(
        outcomes,
        vec![(Some(1), true), (Some(2), false), (Some(3), true)]
    );
    assert_eq!(summarize(&recv_packets(&card_a, 2).await), on_off(4));
    assert_eq!(summarize(&recv_packets(&card_b, 2).await), on_off(7));
}

#[tokio::test]
async fn test_card_batch_reports_disabled_card_without_blocking_others() {
    // Arrange: three cards on loopback, the middle one disabled.
    let (card_1, addr_1) = udp_card().await;
    let (card_2, addr_2) = udp_card().await;
    let (card_3, addr_3) = udp_card().await;
    let mut registry = CardRegistry::new();
    enable(&mut registry, 1, addr_1);
    enable(&mut registry, 2, addr_2);
    enable(&mut registry, 3, addr_3);
    registry
        .update(
            2,
            EndpointUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    let state = state_with(fast_config(TransportKind::Udp), registry).await;

    // Act
    let batch = state
        .trigger
        .trigger_cards(vec![
            (1, "4_SPLIT".to_string()),
            (2, "4_SPLIT".to_string()),
            (3, "5_SPLIT".to_string()),
        ])
        .await;

    // Assert
    assert!(!batch.success);
    let outcomes: Vec<_> = batch.results.iter().map(|r| (r.card_id, r.success)).collect();
    assert_eq!(
        outcomes,
        vec![(Some(1), true), (Some(2), false), (Some(3), true)]
    );
    assert_eq!(batch.results[1].error.as_deref(), Some("Card 2 is disabled"));

    let catalog = LayoutCatalog::standard();
    assert_eq!(
        summarize(&recv_packets(&card_1, 2).await),
        on_off(catalog.tally_index_of("4_SPLIT"))
    );
    assert_eq!(
        summarize(&recv_packets(&card_3, 2).await),
        on_off(catalog.tally_index_of("5_SPLIT"))
    );
    let mut buf = [0u8; 64];
    assert!(
        timeout(Duration::from_millis(100), card_2.recv_from(&mut buf))
            .await
            .is_err(),
        "disabled card must not be pulsed"
    );
}

#[tokio::test]
async fn test_immediate_layout_change_pulses_catalog_index() {
    let (card, addr) = udp_card().await;
    let mut registry = CardRegistry::new();
    enable(&mut registry, 4, addr);
    let mut config = fast_config(TransportKind::Udp);
    config.trigger_mode = tally_core::TriggerMode::Immediate;
    let state = state_with(config, registry).await;

    let applied = state
        .staging
        .apply_layout_change(DisplayId::new(4, Side::One), "4_SPLIT")
        .await
        .unwrap();

    assert_eq!(applied.previous.as_deref(), Some("9_SPLIT"));
    let expected = LayoutCatalog::standard().tally_index_of("4_SPLIT");
    assert_eq!(summarize(&recv_packets(&card, 2).await), on_off(expected));
    assert!(state.staging.list().await.is_empty());
}

#[tokio::test]
async fn test_staged_commit_skips_disabled_card_and_clears_ledger() {
    // Arrange: cards 1 and 3 reachable, card 2 left disabled.
    let (card_1, addr_1) = udp_card().await;
    let (card_3, addr_3) = udp_card().await;
    let mut registry = CardRegistry::new();
    enable(&mut registry, 1, addr_1);
    enable(&mut registry, 3, addr_3);
    let state = state_with(fast_config(TransportKind::Udp), registry).await;

    for card_id in [1, 2, 3] {
        state
            .staging
            .stage(DisplayId::new(card_id, Side::One), "9_SPLIT", "6_SPLIT_L", card_id)
            .await;
    }

    // Act
    let outcome = state.staging.commit_all().await;

    // Assert
    assert!(outcome.success);
    assert_eq!(outcome.results.len(), 2);
    let expected = LayoutCatalog::standard().tally_index_of("6_SPLIT_L");
    assert_ne!(expected, 1);
    assert_eq!(summarize(&recv_packets(&card_1, 2).await), on_off(expected));
    assert_eq!(summarize(&recv_packets(&card_3, 2).await), on_off(expected));
    assert!(state.staging.list().await.is_empty());
}

#[tokio::test]
async fn test_staged_commit_failure_keeps_every_entry() {
    // Arrange: card 1 has a TCP listener, card 3 points at a closed port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap();
    let closed = {
        let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
        scratch.local_addr().unwrap()
    };

    let server = tokio::spawn(async move {
        let mut packets = Vec::new();
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            packets.push(decode_tally(&buf).unwrap());
        }
        packets
    });

    let mut registry = CardRegistry::new();
    enable(&mut registry, 1, open);
    enable(&mut registry, 3, closed);
    let state = state_with(fast_config(TransportKind::Tcp), registry).await;

    state
        .staging
        .stage(DisplayId::new(1, Side::One), "9_SPLIT", "4_SPLIT", 1)
        .await;
    state
        .staging
        .stage(DisplayId::new(3, Side::One), "9_SPLIT", "4_SPLIT", 3)
        .await;

    // Act
    let outcome = state.staging.commit_all().await;

    // Assert
    assert!(!outcome.success);
    let by_card: Vec<_> = outcome
        .results
        .iter()
        .map(|r| (r.card_id, r.success))
        .collect();
    assert_eq!(by_card, vec![(Some(1), true), (Some(3), false)]);
    assert!(outcome.results[1]
        .error
        .as_deref()
        .unwrap()
        .starts_with("Connection failed"));
    assert_eq!(state.staging.list().await.len(), 2);

    let expected = LayoutCatalog::standard().tally_index_of("4_SPLIT");
    let received = timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summarize(&received), on_off(expected));
}

#[tokio::test]
async fn test_probe_reaches_tcp_card() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = state_with(fast_config(TransportKind::Tcp), CardRegistry::new()).await;

    let outcome = state.trigger.probe("127.0.0.1", addr.port()).await;

    assert!(outcome.success);
    assert_eq!(
        outcome.message.as_deref(),
        Some(format!("Connected to 127.0.0.1:{}", addr.port()).as_str())
    );
}
