//! Link forwarder: the per-direction bridging engine.
//!
//! A [`LinkForwarder`] consumes the [`BusEvent`]s of its input link one at a
//! time, in arrival order, and writes to its output link.
//!
//! - **Master role** runs the break/sync/ID decoder. A valid header is
//!   regenerated on the output bus (break pulse at pin level, then `0x55` and
//!   the protected ID) and the [`ResponseTracker`] is armed. Response bytes
//!   that follow on the master bus are forwarded verbatim. Bytes outside a
//!   break-anchored frame are never forwarded.
//! - **Slave role** is a transparent byte relay. The first byte after an armed
//!   header yields the response latency.
//!
//! Every anomaly is recovered locally: the forwarder resynchronizes on the
//! next break and reports through the [`LogSink`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, select};

use crate::bus::{BusEvent, BusInput, LinTx};
use crate::clock::Clock;
use crate::config::{LinkConfig, LinkRole};
use crate::lin::{DecoderConfig, FrameAssembler, HeaderDecoder, LinkState, Step};
use crate::readiness::ReadinessGate;
use crate::report::Report;
use crate::sink::LogSink;
use crate::stats::{Counter, LinkStats};
use crate::tracker::ResponseTracker;

/// Behavior switches of a forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderOptions {
    /// Low time of a regenerated break
    pub break_low: Duration,
    /// Sync-search tuning
    pub decoder: DecoderConfig,
    /// Report completed frames and replies
    pub log_frames: bool,
    /// Report a missing reply after this long (master role only)
    pub response_timeout: Option<Duration>,
}

impl Default for ForwarderOptions {
    fn default() -> Self {
        Self {
            break_low: Duration::from_micros(1500),
            decoder: DecoderConfig::default(),
            log_frames: true,
            response_timeout: None,
        }
    }
}

/// Collaborators shared by every forwarder of a gateway.
#[derive(Clone)]
pub struct LinkContext {
    /// Header/reply bookkeeping shared by the two directions
    pub tracker: Arc<ResponseTracker>,
    /// Report destination
    pub sink: Arc<dyn LogSink>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkContext")
            .field("tracker", &self.tracker.snapshot())
            .finish_non_exhaustive()
    }
}

/// One direction of the bridge.
pub struct LinkForwarder {
    name: Arc<str>,
    role: LinkRole,
    input: BusInput,
    output: Box<dyn LinTx>,
    decoder: HeaderDecoder,
    reply: FrameAssembler,
    reply_pid: Option<u8>,
    ctx: LinkContext,
    gate: ReadinessGate,
    options: ForwarderOptions,
    stats: Arc<LinkStats>,
}

impl LinkForwarder {
    /// Create a forwarder for `config`, reading `input` and writing `output`.
    pub fn new(
        config: &LinkConfig,
        input: BusInput,
        output: Box<dyn LinTx>,
        ctx: LinkContext,
        options: ForwarderOptions,
    ) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            role: config.role,
            input,
            output,
            decoder: HeaderDecoder::new(options.decoder),
            reply: FrameAssembler::new(),
            reply_pid: None,
            ctx,
            gate: ReadinessGate::open(),
            options,
            stats: Arc::new(LinkStats::new()),
        }
    }

    /// Hold back all traffic until the gate opens.
    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    /// Link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forwarding role.
    pub fn role(&self) -> LinkRole {
        self.role
    }

    /// Decoder state (always `Idle` for the slave role).
    pub fn state(&self) -> LinkState {
        self.decoder.state()
    }

    /// Bytes collected for the frame in flight.
    pub fn assembler(&self) -> &FrameAssembler {
        self.decoder.assembler()
    }

    /// Shared handle to this forwarder's counters.
    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    /// Process one bus event.
    pub fn handle(&mut self, event: BusEvent) {
        if !self.gate.is_open() {
            self.input.flush();
            self.decoder.reset();
            self.reply.reset();
            self.reply_pid = None;
            return;
        }
        self.poll_response_timeout();

        match event {
            BusEvent::Overflow => self.on_overflow(),
            BusEvent::Break | BusEvent::FramingError => self.on_break(),
            BusEvent::Data(n) => {
                for _ in 0..n {
                    let Some(byte) = self.input.read_byte() else {
                        break;
                    };
                    match self.role {
                        LinkRole::Master => self.on_master_byte(byte),
                        LinkRole::Slave => self.on_slave_byte(byte),
                    }
                }
            }
        }
    }

    /// Process every queued event without blocking.
    ///
    /// Returns the number of events handled.
    pub fn process_pending(&mut self) -> usize {
        let events = self.input.events().clone();
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Block on the event queue until it disconnects or `shutdown` fires.
    ///
    /// The frame in flight is reported before returning.
    pub fn run(mut self, shutdown: Receiver<()>) {
        log::info!(
            "[{}] forwarding as {:?} (break {} us)",
            self.name,
            self.role,
            self.options.break_low.as_micros()
        );
        let events = self.input.events().clone();
        let poll = match self.role {
            LinkRole::Master => self.options.response_timeout,
            LinkRole::Slave => None,
        };

        loop {
            let event = match poll {
                Some(poll) => select! {
                    recv(events) -> event => event,
                    recv(shutdown) -> _ => break,
                    default(poll) => {
                        self.poll_response_timeout();
                        continue;
                    }
                },
                None => select! {
                    recv(events) -> event => event,
                    recv(shutdown) -> _ => break,
                },
            };
            match event {
                Ok(event) => self.handle(event),
                Err(_) => {
                    log::warn!("[{}] event source disconnected", self.name);
                    break;
                }
            }
        }

        self.finish();
        log::info!("[{}] stopped", self.name);
    }

    /// Report whatever is still in flight.
    pub fn finish(&mut self) {
        match self.role {
            LinkRole::Master => {
                self.report_pending_frame();
                self.decoder.reset();
            }
            LinkRole::Slave => self.flush_reply(),
        }
    }

    fn emit(&self, report: Report) {
        self.ctx.sink.report(&report);
    }

    fn on_overflow(&mut self) {
        let dropped_events = self.input.flush();
        self.decoder.reset();
        self.reply.reset();
        self.reply_pid = None;
        self.stats.bump(Counter::Overflows);
        self.emit(Report::Overflow {
            link: self.name.clone(),
            dropped_events,
        });
    }

    fn on_break(&mut self) {
        match self.role {
            LinkRole::Master => {
                self.report_pending_frame();
                if let Some(pid) = self.ctx.tracker.on_break() {
                    self.stats.bump(Counter::NoResponses);
                    self.emit(Report::NoResponse {
                        link: self.name.clone(),
                        pid,
                        timed_out: false,
                    });
                }
                self.decoder.on_break(self.ctx.clock.now_us());
            }
            LinkRole::Slave => self.flush_reply(),
        }
    }

    fn report_pending_frame(&mut self) {
        let Some(frame) = self.decoder.pending_frame() else {
            return;
        };
        let truncated = self.decoder.assembler().truncated();
        let report = frame.pid().map(|pid| Report::Frame {
            link: self.name.clone(),
            pid,
            response: frame.response().to_vec(),
            truncated,
        });

        self.stats.bump(Counter::Frames);
        if truncated {
            self.stats.bump(Counter::TruncatedFrames);
        }
        if let Some(report) = report {
            if self.options.log_frames || truncated {
                self.emit(report);
            }
        }
    }

    fn on_master_byte(&mut self, byte: u8) {
        let now = self.ctx.clock.now_us();
        match self.decoder.on_byte(byte, now) {
            Step::Unframed(_) => self.stats.bump(Counter::DroppedBytes),
            Step::BreakNoise | Step::Sync => {}
            Step::Stray { .. } => self.stats.bump(Counter::DroppedBytes),
            Step::SyncAbandoned {
                strays, elapsed_us, ..
            } => {
                self.stats.bump(Counter::SyncAbandoned);
                self.stats.bump(Counter::DroppedBytes);
                self.emit(Report::SyncAbandoned {
                    link: self.name.clone(),
                    strays,
                    elapsed_us,
                });
            }
            Step::ParityError { pid, discarded } => {
                self.stats.bump(Counter::ParityErrors);
                self.emit(Report::ParityError {
                    link: self.name.clone(),
                    pid,
                    discarded,
                });
            }
            Step::Header { pid } => self.regenerate_header(pid),
            Step::Response { byte, .. } => self.forward(&[byte]),
        }
    }

    fn regenerate_header(&mut self, pid: u8) {
        match self.output.send_header(pid, self.options.break_low) {
            Ok(()) => {
                self.stats.add(Counter::ForwardedBytes, 2);
                self.ctx.tracker.arm(pid, self.ctx.clock.now_us());
            }
            Err(e) => self.tx_error(e),
        }
    }

    fn on_slave_byte(&mut self, byte: u8) {
        self.forward(&[byte]);

        if let Some(latency) = self.ctx.tracker.record_reply(self.ctx.clock.now_us()) {
            self.flush_reply();
            self.reply_pid = Some(latency.pid);
            self.stats.bump(Counter::Responses);
            self.emit(Report::Response {
                link: self.name.clone(),
                pid: latency.pid,
                latency_us: latency.latency_us,
            });
        }
        if self.reply_pid.is_some() {
            self.reply.push(byte);
        }
    }

    fn flush_reply(&mut self) {
        if let Some(pid) = self.reply_pid.take() {
            if self.options.log_frames && !self.reply.is_empty() {
                self.emit(Report::Reply {
                    link: self.name.clone(),
                    pid,
                    bytes: self.reply.as_frame().as_bytes().to_vec(),
                });
            }
        }
        self.reply.reset();
    }

    fn forward(&mut self, bytes: &[u8]) {
        match self.output.write(bytes) {
            Ok(()) => self.stats.add(Counter::ForwardedBytes, bytes.len() as u64),
            Err(e) => self.tx_error(e),
        }
    }

    fn tx_error(&mut self, err: crate::Error) {
        self.stats.bump(Counter::TxErrors);
        self.emit(Report::TxError {
            link: self.name.clone(),
            reason: err.to_string(),
        });
    }

    /// Report an armed header whose reply is overdue.
    ///
    /// Does nothing unless a response timeout is configured for a master link.
    pub fn poll_response_timeout(&mut self) {
        let (LinkRole::Master, Some(timeout)) = (self.role, self.options.response_timeout) else {
            return;
        };
        let now = self.ctx.clock.now_us();
        if let Some(pid) = self.ctx.tracker.expire(now, timeout.as_micros() as u64) {
            self.stats.bump(Counter::NoResponses);
            self.emit(Report::NoResponse {
                link: self.name.clone(),
                pid,
                timed_out: true,
            });
        }
    }
}

impl fmt::Debug for LinkForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkForwarder")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.decoder.state())
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}
