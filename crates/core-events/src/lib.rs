//! Core event types and async event sources for the grid runtime.
//!
//! Everything that can change a grid session arrives as an [`Event`] on one
//! bounded channel: surface resizes, viewport scroll reports, completions of
//! deferred fetches and shutdown. Debounce deadlines are not events; the
//! control loop sleeps until the session's next deadline.

use std::sync::atomic::{AtomicU64, Ordering};

use core_data::{FetchError, FetchedBlock};
use core_scroll::ScrollReport;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod script;
pub use script::{ScriptError, ScriptEventSource, ScriptStep, parse_script};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers await `send`, which parks them while
// the control loop is busy rather than dropping events: scroll reports are lossy only through the
// debounce policy, never through the channel.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 8192;

// Telemetry: relaxed atomic counters, logged by the runtime at shutdown.
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static SCRIPT_EVENTS_EMITTED: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the channel telemetry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTelemetry {
    pub send_failures: u64,
    pub script_events: u64,
}

impl EventTelemetry {
    pub fn snapshot() -> Self {
        Self {
            send_failures: CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
            script_events: SCRIPT_EVENTS_EMITTED.load(Ordering::Relaxed),
        }
    }
}

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Surface(SurfaceEvent),
    Scroll(ScrollReport),
    /// A deferred fetch finished on a worker task.
    FetchCompleted {
        ticket: u64,
        result: Result<FetchedBlock, FetchError>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// The visible body area changed size (pixels).
    Resized { width: f64, height: f64 },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Surface(_) => "surface",
            Event::Scroll(_) => "scroll",
            Event::FetchCompleted { .. } => "fetch_completed",
            Event::Shutdown => "shutdown",
        }
    }
}

/// Send `event`, counting a failure when the consumer is gone. Returns whether
/// the producer should keep running.
pub async fn send_event(tx: &Sender<Event>, event: Event) -> bool {
    if tx.send(event).await.is_err() {
        CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
        return false;
    }
    true
}

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors should
    /// stop when `tx.send(..).await` returns Err (channel closed) or on their own internal stop
    /// condition. They should avoid busy loops by awaiting timers.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; during shutdown the caller drops its final `Sender` before awaiting the
    /// handles so the sources observe the closed channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Draining prevents duplicate spawns if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}
