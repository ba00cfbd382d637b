//! Gateway orchestration.
//!
//! [`Gateway::launch`] opens the physical links, wires the forwarders of the
//! selected [`RunMode`] and starts one named thread per forwarder plus the
//! one-shot pin setup thread. The returned [`GatewayHandle`] exposes the
//! per-link counters and stops everything on [`GatewayHandle::join`] or drop.
//!
//! [`Bridge`] is the same wiring without threads, for callers that want to
//! drive the forwarders themselves.
//!
//! ```
//! use lin_bridge::bus::sim::SimDriver;
//! use lin_bridge::bridge::Gateway;
//! use lin_bridge::GatewayConfig;
//!
//! let mut driver = SimDriver::new();
//! let handle = Gateway::new(GatewayConfig::default())
//!     .launch(&mut driver)
//!     .unwrap();
//! assert_eq!(handle.link_names(), vec!["lin1_to_lin2", "lin2_to_lin1"]);
//! handle.join();
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::bus::{LinDriver, PhysicalLink, PinSetup};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{GatewayConfig, LinkConfig, RunMode};
use crate::error::{Error, Result};
use crate::forwarder::{LinkContext, LinkForwarder};
use crate::readiness::{ReadinessGate, ReadyFlag, ReadySetter, ReadyToken};
use crate::sink::LogSink;
use crate::sniffer::Sniffer;
use crate::stats::{LinkStats, StatsSnapshot};
use crate::tracker::{ResponseTracker, TrackerState};

/// The two forwarding directions of a bridge, sharing one response tracker.
#[derive(Debug)]
pub struct Bridge {
    master: LinkForwarder,
    slave: LinkForwarder,
    tracker: Arc<ResponseTracker>,
}

impl Bridge {
    /// Wire the master and slave directions of `config` over `links`.
    ///
    /// Each direction reads its input link and writes its output link, so
    /// both links are consumed.
    pub fn new(
        config: &GatewayConfig,
        links: Vec<PhysicalLink>,
        sink: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (master_cfg, slave_cfg) = config.bridge_links()?;
        let mut links: HashMap<String, PhysicalLink> =
            links.into_iter().map(|l| (l.name.clone(), l)).collect();
        let mut a = take_link(&mut links, &master_cfg.input)?;
        let mut b = take_link(&mut links, &master_cfg.output)?;
        if slave_cfg.input != b.name || slave_cfg.output != a.name {
            return Err(Error::InvalidConfig(
                "master and slave links must cross the same two buses".into(),
            ));
        }
        // pins are finalized by whoever owns the bridge
        a.pin_setup = None;
        b.pin_setup = None;

        let tracker = Arc::new(ResponseTracker::new());
        let ctx = LinkContext {
            tracker: tracker.clone(),
            sink,
            clock,
        };
        let options = config.forwarder_options();

        let master = LinkForwarder::new(master_cfg, a.input, b.output, ctx.clone(), options);
        let slave = LinkForwarder::new(slave_cfg, b.input, a.output, ctx, options);
        Ok(Self {
            master,
            slave,
            tracker,
        })
    }

    /// Hold each direction back until both of its links report ready.
    pub fn gated(mut self, config: &GatewayConfig, tokens: &HashMap<String, ReadyToken>) -> Self {
        if let Ok((master_cfg, slave_cfg)) = config.bridge_links() {
            self.master = self.master.with_gate(gate_for(master_cfg, tokens));
            self.slave = self.slave.with_gate(gate_for(slave_cfg, tokens));
        }
        self
    }

    /// Master direction.
    pub fn master(&mut self) -> &mut LinkForwarder {
        &mut self.master
    }

    /// Slave direction.
    pub fn slave(&mut self) -> &mut LinkForwarder {
        &mut self.slave
    }

    /// Tracker shared by both directions.
    pub fn tracker(&self) -> Arc<ResponseTracker> {
        self.tracker.clone()
    }

    /// Drain both queues, master first, until neither has work.
    pub fn process_pending(&mut self) -> usize {
        let mut total = 0;
        loop {
            let handled = self.master.process_pending() + self.slave.process_pending();
            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    /// Split into the two forwarders.
    pub fn into_parts(self) -> (LinkForwarder, LinkForwarder) {
        (self.master, self.slave)
    }
}

fn take_link(links: &mut HashMap<String, PhysicalLink>, name: &str) -> Result<PhysicalLink> {
    links
        .remove(name)
        .ok_or_else(|| Error::InvalidConfig(format!("bus {name} is not open")))
}

fn gate_for(link: &LinkConfig, tokens: &HashMap<String, ReadyToken>) -> ReadinessGate {
    [&link.input, &link.output]
        .into_iter()
        .filter_map(|name| tokens.get(name.as_str()).cloned())
        .fold(ReadinessGate::open(), ReadinessGate::with)
}

/// Builder for a running gateway.
pub struct Gateway {
    config: GatewayConfig,
    sink: Option<Arc<dyn LogSink>>,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    /// Gateway for `config`, reporting to the sinks it describes.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            sink: None,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Report to `sink` instead of the configured sinks.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use `clock` for timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open every configured bus and start the forwarders.
    ///
    /// Fails when the configuration is invalid, a serial driver cannot be
    /// installed or a thread cannot be spawned. Nothing is left running on
    /// failure.
    pub fn launch(self, driver: &mut dyn LinDriver) -> Result<GatewayHandle> {
        let Gateway {
            config,
            sink,
            clock,
        } = self;
        config.validate()?;
        let sink = sink.unwrap_or_else(|| config.logging.build_sink());

        let mut links = Vec::with_capacity(config.buses.len());
        for name in &config.buses {
            let link = driver.open(name, &config.serial)?;
            log::info!(
                "[gateway] {name} open at {} baud",
                config.serial.baud_rate
            );
            links.push(link);
        }

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let mut handle = GatewayHandle {
            shutdown: Some(shutdown_tx),
            threads: Vec::new(),
            stats: Vec::new(),
            tracker: None,
            ready: Vec::new(),
        };

        let mut tokens = HashMap::new();
        let mut pin_jobs = Vec::new();
        for link in &mut links {
            let token = match link.pin_setup.take() {
                Some(setup) => {
                    let (setter, token) = ReadyFlag::new();
                    pin_jobs.push(PinJob {
                        link: link.name.clone(),
                        setup,
                        ready: setter,
                    });
                    token
                }
                None => ReadyFlag::ready(),
            };
            handle.ready.push(token.clone());
            tokens.insert(link.name.clone(), token);
        }

        match &config.mode {
            RunMode::Bridge => {
                let bridge = Bridge::new(&config, links, sink, clock)?.gated(&config, &tokens);
                handle.tracker = Some(bridge.tracker());
                let (master, slave) = bridge.into_parts();
                for fwd in [master, slave] {
                    handle.stats.push((fwd.name().to_string(), fwd.stats()));
                    let name = fwd.name().to_string();
                    let shutdown = shutdown_rx.clone();
                    handle.spawn(name, move || fwd.run(shutdown))?;
                }
            }
            RunMode::Sniffer { link } => {
                let index = links
                    .iter()
                    .position(|l| &l.name == link)
                    .ok_or_else(|| Error::InvalidConfig(format!("bus {link} is not open")))?;
                let observed = links.swap_remove(index);
                let gate = tokens
                    .get(link)
                    .cloned()
                    .map_or_else(ReadinessGate::open, |t| ReadinessGate::open().with(t));
                let sniffer = Sniffer::new(observed.input, sink, clock, config.sniffer_options())
                    .with_gate(gate);
                handle.stats.push((sniffer.name().to_string(), sniffer.stats()));
                let shutdown = shutdown_rx.clone();
                handle.spawn(format!("sniffer-{link}"), move || sniffer.run(shutdown))?;
            }
        }

        let delay = config.pin_setup_delay();
        handle.spawn("pin-setup".to_string(), move || {
            run_pin_setup(pin_jobs, delay, shutdown_rx)
        })?;

        log::info!("[gateway] running ({:?})", config.mode);
        Ok(handle)
    }
}

struct PinJob {
    link: String,
    setup: Box<dyn PinSetup>,
    ready: ReadySetter,
}

/// Finalize pin configuration after `delay`, then release the forwarders.
///
/// A link whose pin setup fails stays closed.
fn run_pin_setup(jobs: Vec<PinJob>, delay: Duration, shutdown: Receiver<()>) {
    match shutdown.recv_timeout(delay) {
        Err(RecvTimeoutError::Timeout) => {}
        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
    }
    for mut job in jobs {
        match job.setup.finalize() {
            Ok(()) => {
                log::info!("[pins] {} ready", job.link);
                job.ready.set();
            }
            Err(e) => log::error!("[pins] {} stays closed: {e}", job.link),
        }
    }
}

/// A running gateway.
pub struct GatewayHandle {
    shutdown: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
    stats: Vec<(String, Arc<LinkStats>)>,
    tracker: Option<Arc<ResponseTracker>>,
    ready: Vec<ReadyToken>,
}

impl GatewayHandle {
    fn spawn<F>(&mut self, name: String, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = thread::Builder::new()
            .name(name)
            .spawn(f)
            .map_err(Error::ThreadSpawn)?;
        self.threads.push(thread);
        Ok(())
    }

    /// Names of the running forwarders.
    pub fn link_names(&self) -> Vec<&str> {
        self.stats.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Counters of forwarder `name`.
    pub fn stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.stats
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, stats)| stats.snapshot())
    }

    /// Current response tracker record (bridge mode only).
    pub fn tracker(&self) -> Option<TrackerState> {
        self.tracker.as_ref().map(|t| t.snapshot())
    }

    /// True once the pin setup released every link.
    pub fn is_ready(&self) -> bool {
        self.ready.iter().all(ReadyToken::is_ready)
    }

    /// Block until [`is_ready`](Self::is_ready) or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while !self.is_ready() {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Ask every thread to stop. Frames in flight are reported on the way out.
    pub fn shutdown(&mut self) {
        if self.shutdown.take().is_some() {
            log::info!("[gateway] shutting down");
        }
    }

    /// Stop and wait for every thread.
    pub fn join(mut self) {
        self.shutdown();
        self.join_threads();
    }

    fn join_threads(&mut self) {
        for thread in self.threads.drain(..) {
            let name = thread.thread().name().unwrap_or("?").to_string();
            if thread.join().is_err() {
                log::error!("[gateway] thread {name} panicked");
            }
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        self.shutdown();
        self.join_threads();
    }
}

impl std::fmt::Debug for GatewayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandle")
            .field("links", &self.link_names())
            .field("threads", &self.threads.len())
            .field("running", &self.shutdown.is_some())
            .finish()
    }
}
