use std::time::Duration;

use lin_bridge::LinkState;
use lin_bridge::lin::parity_encode;

use super::{Rig, assert_header_on_wire};

#[test]
fn valid_header_is_regenerated_on_the_slave_bus() {
    let mut rig = Rig::new();
    rig.master_header(parity_encode(0x01));

    assert_header_on_wire(&rig.lin2.wire(), Duration::from_micros(1500), &[0x55, 0xC1]);
    assert_eq!(rig.bridge.master().state(), LinkState::GotId);
    assert!(rig.lin1.wire().is_empty());

    let tracker = rig.bridge.tracker().snapshot();
    assert!(tracker.expecting);
    assert_eq!(tracker.pid, 0xC1);
}

#[test]
fn header_split_over_events_is_regenerated() {
    let mut rig = Rig::new();
    rig.lin1.send_break();
    rig.lin1.send_bytes(&[0x55]);
    rig.lin1.send_bytes(&[0x3C]);
    rig.bridge.master().process_pending();

    assert_eq!(rig.lin2.written_bytes(), vec![0x55, 0x3C]);
}

#[test]
fn framing_error_starts_a_frame_like_a_break() {
    let mut rig = Rig::new();
    rig.lin1.framing_error();
    rig.lin1.send_bytes(&[0x55, 0xC1]);
    rig.bridge.master().process_pending();

    assert_eq!(rig.lin2.written_bytes(), vec![0x55, 0xC1]);
}

#[test]
fn invalid_parity_discards_the_frame() {
    let mut rig = Rig::new();
    rig.master_header(0x01);

    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
    assert!(rig.lin2.wire().is_empty());
    assert!(rig.sink.contains("[lin1_to_lin2] Parity error: PID=0x01"));
    assert!(!rig.bridge.tracker().snapshot().expecting);

    // the response that follows is not anchored to a break any more
    rig.master_bytes(&[0x11, 0x22]);
    assert!(rig.lin2.wire().is_empty());

    let stats = rig.bridge.master().stats().snapshot();
    assert_eq!(stats.parity_errors, 1);
    assert_eq!(stats.dropped_bytes, 2);
}

#[test]
fn bytes_without_break_are_never_forwarded() {
    let mut rig = Rig::new();
    rig.master_bytes(&[0x55, 0xC1, 0x11]);

    assert!(rig.lin2.wire().is_empty());
    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
}

#[test]
fn response_bytes_are_forwarded_and_logged_at_next_break() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    rig.master_bytes(&[0x11, 0x22, 0xCC]);

    assert_eq!(
        rig.lin2.written_bytes(),
        vec![0x55, 0xC1, 0x11, 0x22, 0xCC]
    );
    assert_eq!(rig.bridge.master().state(), LinkState::Data);
    assert!(!rig.sink.contains("Data="));

    rig.master_break();
    assert_eq!(rig.sink.count("[lin1_to_lin2] ID=0x01 Data=11 22 CC"), 1);
    assert_eq!(rig.bridge.master().state(), LinkState::GotBreak);
    assert_eq!(rig.bridge.master().stats().snapshot().frames, 1);
}

#[test]
fn frame_logging_can_be_disabled() {
    let mut config = lin_bridge::GatewayConfig::default();
    config.logging.log_frames = false;
    let mut rig = Rig::with_config(config);
    rig.master_header(0xC1);
    rig.master_bytes(&[0x11, 0xEE]);
    rig.master_break();

    assert!(!rig.sink.contains("Data="));
    // anomalies are still reported
    assert!(rig.sink.contains("No response for ID 0x01"));
}

#[test]
fn oversized_frame_is_forwarded_and_flagged_truncated() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    let long: Vec<u8> = (0..30).collect();
    rig.master_bytes(&long);

    assert_eq!(rig.lin2.written_bytes().len(), 2 + 30);
    assert!(rig.bridge.master().assembler().truncated());

    rig.master_break();
    assert!(rig.sink.contains("(truncated)"));
    assert_eq!(rig.bridge.master().stats().snapshot().truncated_frames, 1);
}

#[test]
fn transmit_failure_is_reported_and_not_fatal() {
    let mut rig = Rig::new();
    rig.lin2.set_tx_failure(true);
    rig.master_header(0xC1);

    assert!(rig.sink.contains("[lin1_to_lin2] TX error"));
    assert!(!rig.bridge.tracker().snapshot().expecting);
    assert_eq!(rig.bridge.master().stats().snapshot().tx_errors, 1);

    rig.lin2.set_tx_failure(false);
    rig.master_header(0xC1);
    assert_eq!(rig.lin2.written_bytes(), vec![0x55, 0xC1]);
}
