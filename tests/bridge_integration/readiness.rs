use std::collections::HashMap;

use lin_bridge::LinkState;
use lin_bridge::config::{LIN1, LIN2};
use lin_bridge::readiness::ReadyFlag;
use lin_bridge::{Bridge, GatewayConfig};

use super::Rig;

#[test]
fn traffic_is_discarded_until_both_links_are_ready() {
    let Rig {
        lin1,
        lin2,
        bridge,
        sink,
        ..
    } = Rig::new();
    let config = GatewayConfig::default();
    let (set1, token1) = ReadyFlag::new();
    let (set2, token2) = ReadyFlag::new();
    let tokens = HashMap::from([(LIN1.to_string(), token1), (LIN2.to_string(), token2)]);
    let mut bridge: Bridge = bridge.gated(&config, &tokens);

    lin1.send_break();
    lin1.send_bytes(&[0x55, 0xC1]);
    bridge.process_pending();
    assert!(lin2.wire().is_empty());
    assert_eq!(bridge.master().state(), LinkState::Idle);
    assert!(lin1.flush_count() >= 1);

    set1.set();
    lin1.send_break();
    lin1.send_bytes(&[0x55, 0xC1]);
    bridge.process_pending();
    assert!(lin2.wire().is_empty());

    set2.set();
    lin1.send_break();
    lin1.send_bytes(&[0x55, 0xC1]);
    bridge.process_pending();
    assert_eq!(lin2.written_bytes(), vec![0x55, 0xC1]);

    // nothing about the discarded traffic was reported
    assert!(sink.lines().is_empty());
}
