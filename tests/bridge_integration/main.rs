//! Bridge integration tests: both directions driven over simulated buses
//! with a manual clock, reports captured in memory.

mod header;
mod overflow;
mod readiness;
mod response;
mod sync_window;

use std::sync::Arc;
use std::time::Duration;

use lin_bridge::bus::sim::{SimBus, WireEvent};
use lin_bridge::clock::ManualClock;
use lin_bridge::config::{LIN1, LIN2};
use lin_bridge::sink::MemorySink;
use lin_bridge::{Bridge, GatewayConfig};

/// Two simulated buses bridged by a single-threaded [`Bridge`].
pub struct Rig {
    pub lin1: SimBus,
    pub lin2: SimBus,
    pub bridge: Bridge,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemorySink>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let (lin1, link1) = SimBus::new(LIN1);
        let (lin2, link2) = SimBus::new(LIN2);
        let clock = Arc::new(ManualClock::new(1_000));
        let sink = Arc::new(MemorySink::new());
        let bridge = Bridge::new(&config, vec![link1, link2], sink.clone(), clock.clone())
            .expect("default links");
        Self {
            lin1,
            lin2,
            bridge,
            clock,
            sink,
        }
    }

    /// Move the clock to `us` after the rig was created.
    pub fn at(&self, us: u64) {
        self.clock.set(1_000 + us);
    }

    /// Master sends break, sync and `pid` on lin1; the bridge handles it.
    pub fn master_header(&mut self, pid: u8) {
        self.lin1.send_break();
        self.lin1.send_bytes(&[0x55, pid]);
        self.bridge.master().process_pending();
    }

    pub fn master_bytes(&mut self, bytes: &[u8]) {
        self.lin1.send_bytes(bytes);
        self.bridge.master().process_pending();
    }

    pub fn slave_bytes(&mut self, bytes: &[u8]) {
        self.lin2.send_bytes(bytes);
        self.bridge.slave().process_pending();
    }

    pub fn master_break(&mut self) {
        self.lin1.send_break();
        self.bridge.master().process_pending();
    }
}

/// Asserts that `wire` starts with a break of at least `min` followed by `bytes`.
pub fn assert_header_on_wire(wire: &[WireEvent], min: Duration, bytes: &[u8]) {
    match wire.first() {
        Some(WireEvent::Break { low }) => assert!(
            *low >= min,
            "break of {low:?} is shorter than {min:?}"
        ),
        other => panic!("expected a break first, got {other:?}"),
    }
    let written: Vec<WireEvent> = bytes.iter().map(|&b| WireEvent::Byte(b)).collect();
    assert_eq!(&wire[1..], written.as_slice());
}
