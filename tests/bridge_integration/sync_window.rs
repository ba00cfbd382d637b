use lin_bridge::LinkState;

use super::Rig;

#[test]
fn four_strays_abandon_the_frame() {
    let mut rig = Rig::new();
    rig.master_break();
    for (i, stray) in [0xF0, 0xF1, 0xF2].into_iter().enumerate() {
        rig.at(100 * (i as u64 + 1));
        rig.master_bytes(&[stray]);
        assert_eq!(rig.bridge.master().state(), LinkState::GotBreak);
    }
    rig.at(400);
    rig.master_bytes(&[0xF3]);

    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
    assert!(rig.sink.contains("[lin1_to_lin2] Sync abandoned: 4 stray bytes, 400 us after break"));
    assert!(rig.lin2.wire().is_empty());
    assert_eq!(rig.bridge.master().stats().snapshot().sync_abandoned, 1);
}

#[test]
fn two_strays_then_sync_is_accepted() {
    let mut rig = Rig::new();
    rig.master_break();
    rig.at(100);
    rig.master_bytes(&[0xF0, 0xFE]);
    rig.at(200);
    rig.master_bytes(&[0x55]);

    assert_eq!(rig.bridge.master().state(), LinkState::GotSync);
    assert!(!rig.sink.contains("Sync abandoned"));

    rig.master_bytes(&[0xC1]);
    assert_eq!(rig.lin2.written_bytes(), vec![0x55, 0xC1]);
}

#[test]
fn zero_bytes_after_break_are_not_strays() {
    let mut rig = Rig::new();
    rig.master_break();
    rig.master_bytes(&[0x00, 0x00, 0x00, 0x00, 0x00]);
    rig.master_bytes(&[0x55]);

    assert_eq!(rig.bridge.master().state(), LinkState::GotSync);
}

#[test]
fn stray_after_window_abandons() {
    let mut rig = Rig::new();
    rig.master_break();
    rig.at(700);
    rig.master_bytes(&[0xF0]);

    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
    assert!(rig.sink.contains("Sync abandoned: 1 stray bytes, 700 us after break"));
}

#[test]
fn custom_window_from_config() {
    let mut config = lin_bridge::GatewayConfig::default();
    config.timing.max_sync_strays = 0;
    let mut rig = Rig::with_config(config);
    rig.master_break();
    rig.master_bytes(&[0xF0]);

    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
}
