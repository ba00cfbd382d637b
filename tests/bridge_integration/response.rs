use lin_bridge::GatewayConfig;

use super::Rig;

#[test]
fn reply_latency_is_measured_from_regenerated_header() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);

    rig.at(2_000);
    rig.slave_bytes(&[0x11]);

    assert_eq!(rig.lin1.written_bytes(), vec![0x11]);
    assert!(
        rig.sink
            .contains("[lin2_to_lin1] Response for ID 0x01 after 2.000 ms")
    );
    let tracker = rig.bridge.tracker().snapshot();
    assert!(tracker.got);

    rig.at(2_500);
    rig.slave_bytes(&[0x22, 0xCC]);
    assert_eq!(rig.lin1.written_bytes(), vec![0x11, 0x22, 0xCC]);
    assert_eq!(rig.sink.count("Response for ID"), 1);

    rig.master_break();
    assert!(!rig.sink.contains("No response"));
    assert_eq!(rig.bridge.slave().stats().snapshot().responses, 1);
}

#[test]
fn missing_reply_is_reported_at_next_break() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    rig.at(10_000);
    rig.master_break();

    assert_eq!(rig.sink.count("[lin1_to_lin2] No response for ID 0x01"), 1);
    assert!(!rig.bridge.tracker().snapshot().expecting);

    // reported once only
    rig.master_break();
    assert_eq!(rig.sink.count("No response"), 1);
    assert_eq!(rig.bridge.master().stats().snapshot().no_responses, 1);
}

#[test]
fn end_to_end_frame_then_missing_reply() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    rig.master_bytes(&[0x11, 0x22, 0xCC]);
    rig.at(2_000);
    rig.slave_bytes(&[0x11]);
    assert!(rig.sink.contains("Response for ID 0x01 after 2.000 ms"));

    rig.master_header(0xC1);
    assert!(rig.sink.contains("[lin1_to_lin2] ID=0x01 Data=11 22 CC"));
    assert!(!rig.sink.contains("No response"));

    rig.master_break();
    assert!(rig.sink.contains("[lin1_to_lin2] No response for ID 0x01"));
}

#[test]
fn slave_bytes_without_header_are_relayed_silently() {
    let mut rig = Rig::new();
    rig.slave_bytes(&[0xAA, 0xBB]);

    assert_eq!(rig.lin1.written_bytes(), vec![0xAA, 0xBB]);
    assert!(rig.sink.lines().is_empty());
}

#[test]
fn reply_bytes_are_logged_when_the_slave_stops() {
    let mut rig = Rig::new();
    rig.master_header(parity_of(0x10));
    rig.slave_bytes(&[0x01, 0x02, 0xF0]);
    rig.bridge.slave().finish();

    assert!(rig.sink.contains("[lin2_to_lin1] Reply ID=0x10 Data=01 02 F0"));
}

#[test]
fn response_timeout_reports_before_next_break() {
    let mut config = GatewayConfig::default();
    config.timing.response_timeout_us = Some(10_000);
    let mut rig = Rig::with_config(config);
    rig.master_header(0xC1);

    rig.at(5_000);
    rig.bridge.master().poll_response_timeout();
    assert!(!rig.sink.contains("No response"));

    rig.at(12_000);
    rig.bridge.master().poll_response_timeout();
    assert!(rig.sink.contains("[lin1_to_lin2] No response for ID 0x01 (timeout)"));

    rig.master_break();
    assert_eq!(rig.sink.count("No response"), 1);
}

#[test]
fn late_reply_after_timeout_is_only_relayed() {
    let mut config = GatewayConfig::default();
    config.timing.response_timeout_us = Some(10_000);
    let mut rig = Rig::with_config(config);
    rig.master_header(0xC1);
    rig.at(12_000);
    rig.bridge.master().poll_response_timeout();

    rig.slave_bytes(&[0x11]);
    assert_eq!(rig.lin1.written_bytes(), vec![0x11]);
    assert!(!rig.sink.contains("Response for ID"));
}

fn parity_of(id: u8) -> u8 {
    lin_bridge::parity_encode(id)
}
