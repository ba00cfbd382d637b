use lin_bridge::LinkState;

use super::Rig;

#[test]
fn overflow_mid_frame_flushes_and_resets() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    rig.master_bytes(&[0x11, 0x22]);
    assert_eq!(rig.bridge.master().state(), LinkState::Data);

    rig.lin1.overflow();
    rig.bridge.master().process_pending();

    assert_eq!(rig.bridge.master().state(), LinkState::Idle);
    assert_eq!(rig.bridge.master().assembler().len(), 0);
    assert_eq!(rig.lin1.flush_count(), 1);
    assert!(rig.sink.contains("[lin1_to_lin2] RX overflow"));

    // the interrupted frame is never logged
    rig.master_break();
    assert_eq!(rig.sink.count("] ID=0x01 Data="), 0);
}

#[test]
fn overflow_drops_queued_events() {
    let mut rig = Rig::new();
    rig.lin1.overflow();
    rig.lin1.send_break();
    rig.lin1.send_bytes(&[0x55, 0xC1]);
    rig.bridge.master().process_pending();

    // the flush discarded the queued break and bytes
    assert!(rig.lin2.wire().is_empty());
    assert!(rig.sink.contains("2 queued events dropped"));
    assert_eq!(rig.bridge.master().stats().snapshot().overflows, 1);
}

#[test]
fn bridge_recovers_after_overflow() {
    let mut rig = Rig::new();
    rig.lin1.overflow();
    rig.bridge.master().process_pending();

    rig.master_header(0xC1);
    assert_eq!(rig.lin2.written_bytes(), vec![0x55, 0xC1]);
    assert_eq!(rig.bridge.master().state(), LinkState::GotId);
}

#[test]
fn slave_overflow_clears_reply_tracking() {
    let mut rig = Rig::new();
    rig.master_header(0xC1);
    rig.slave_bytes(&[0x11]);

    rig.lin2.overflow();
    rig.bridge.slave().process_pending();
    rig.bridge.slave().finish();

    assert!(rig.sink.contains("[lin2_to_lin1] RX overflow"));
    assert!(!rig.sink.contains("Reply ID"));
}
