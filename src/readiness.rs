//! Pin-readiness tokens.
//!
//! GPIO direction and pull configuration may finish shortly after the serial
//! driver starts delivering events. Each physical link gets one [`ReadyFlag`]:
//! the pin setup phase holds the [`ReadySetter`] and fires it exactly once,
//! while forwarders hold [`ReadyToken`]s and discard traffic until it fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Constructor namespace for a setter/token pair.
pub struct ReadyFlag;

impl ReadyFlag {
    /// Create an unset flag.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (ReadySetter, ReadyToken) {
        let flag = Arc::new(AtomicBool::new(false));
        (ReadySetter { flag: flag.clone() }, ReadyToken { flag })
    }

    /// Create a token that is already ready (links without pin setup).
    pub fn ready() -> ReadyToken {
        ReadyToken {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// One-shot handle that marks a link ready.
#[derive(Debug)]
pub struct ReadySetter {
    flag: Arc<AtomicBool>,
}

impl ReadySetter {
    /// Mark the link ready. Consumes the setter.
    pub fn set(self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Read side of a readiness flag.
#[derive(Debug, Clone)]
pub struct ReadyToken {
    flag: Arc<AtomicBool>,
}

impl ReadyToken {
    /// True once the setter fired.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Readiness of every link a forwarder touches.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    tokens: Vec<ReadyToken>,
}

impl ReadinessGate {
    /// Gate that is open from the start.
    pub fn open() -> Self {
        Self::default()
    }

    /// Add a token the gate waits on.
    pub fn with(mut self, token: ReadyToken) -> Self {
        self.tokens.push(token);
        self
    }

    /// True when every token is ready.
    ///
    /// Once open the gate stays open; the tokens are dropped so the steady
    /// state costs nothing.
    pub fn is_open(&mut self) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        if self.tokens.iter().all(ReadyToken::is_ready) {
            self.tokens.clear();
            return true;
        }
        false
    }
}
