//! gridwin entrypoint: drives a headless grid session from scripted scroll and
//! resize events and prints a summary of the work done.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::{ConfigOverrides, FetchMode, GridSettings, load_from};
use core_data::{CacheStats, DataSource, FetchError, FetchedBlock, FormulaSource};
use core_events::{
    EVENT_CHANNEL_CAP, Event, EventSourceRegistry, EventTelemetry, ScriptEventSource, ScriptStep, SurfaceEvent,
    parse_script, send_event,
};
use core_scroll::{ScrollMetricsSnapshot, ScrollReport};
use core_session::{GridSession, SessionError};
use core_surface::{MemorySurface, SurfaceSize};
use core_window::{Anchor, LoadedExtent, PENDING_LABEL};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const SWEEP_STEPS: usize = 60;
const SWEEP_STEP_DELAY: Duration = Duration::from_millis(16);
const SWEEP_PAUSE: Duration = Duration::from_millis(200);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "gridwin", version, about = "Windowed, recycling grid renderer (headless driver)")]
struct Args {
    /// Optional configuration file path (overrides discovery of `gridwin.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Total logical rows (overrides the config file).
    #[arg(long)]
    rows: Option<usize>,
    /// Total logical columns (overrides the config file).
    #[arg(long)]
    columns: Option<usize>,
    /// Initial visible surface width in pixels.
    #[arg(long, default_value_t = 600.0)]
    width: f64,
    /// Initial visible surface height in pixels.
    #[arg(long, default_value_t = 600.0)]
    height: f64,
    /// Script of `scroll` / `resize` steps; a diagonal sweep is generated when omitted.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Fetch data through deferred tickets on worker tasks.
    #[arg(long)]
    deferred: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            total_rows: self.rows,
            total_columns: self.columns,
            fetch: self.deferred.then_some(FetchMode::Deferred),
        }
    }
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("gridwin.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "gridwin.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    fn load_settings(args: &Args) -> Result<GridSettings> {
        let config_override = args.config.is_some();
        let mut config = load_from(args.config.clone())?;
        config.apply_overrides(args.overrides());
        let settings = config.resolve();
        info!(
            target: "runtime",
            config_override,
            config_loaded = config.raw.is_some(),
            "config_resolved"
        );
        Ok(settings)
    }

    fn load_steps(args: &Args, settings: &GridSettings) -> Result<Vec<ScriptStep>> {
        match args.script.as_ref() {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading script {}", path.display()))?;
                parse_script(&text).with_context(|| format!("parsing script {}", path.display()))
            }
            None => Ok(sweep_steps(settings, SurfaceSize::new(args.width, args.height))),
        }
    }
}

/// Diagonal sweep from the origin to the far corner of the grid, a resize to
/// half size, then a jump back home.
fn sweep_steps(settings: &GridSettings, size: SurfaceSize) -> Vec<ScriptStep> {
    let (max_left, max_top) = settings
        .geometry
        .pixel_position(settings.extent.total_rows, settings.extent.total_columns);
    let max_left = (max_left as f64 - size.width).max(0.0);
    let max_top = (max_top as f64 - size.height).max(0.0);

    let mut steps = Vec::with_capacity(SWEEP_STEPS + 2);
    for k in 1..=SWEEP_STEPS {
        let f = k as f64 / SWEEP_STEPS as f64;
        steps.push(ScriptStep::scroll(max_left * f, max_top * f, SWEEP_STEP_DELAY));
    }
    steps.push(ScriptStep::resize(size.width / 2.0, size.height / 2.0, SWEEP_PAUSE));
    steps.push(ScriptStep::scroll(0.0, 0.0, SWEEP_PAUSE));
    steps
}

enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LoopCounters {
    events: u64,
    resizes: u64,
    recycles: u64,
    fetches_completed: u64,
    fetch_failures: u64,
}

/// What the run did, reported once the session has been torn down.
#[derive(Debug, Clone)]
struct RunSummary {
    reason: ShutdownReason,
    anchor: Anchor,
    loaded: LoadedExtent,
    placeholders_at_exit: usize,
    slots_detached: u64,
    counters: LoopCounters,
    scroll: ScrollMetricsSnapshot,
    cache: CacheStats,
    telemetry: EventTelemetry,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "shutdown: {}", self.reason)?;
        writeln!(
            f,
            "window: anchor ({}, {}), loaded {} x {}",
            self.anchor.row, self.anchor.column, self.loaded.rows, self.loaded.columns
        )?;
        writeln!(
            f,
            "events: {} (resizes {}, recycles {})",
            self.counters.events, self.counters.resizes, self.counters.recycles
        )?;
        writeln!(
            f,
            "scroll: reports {}, qualifying {}, immediate {}, settle {}, suppressed {}",
            self.scroll.scroll_reports,
            self.scroll.qualifying,
            self.scroll.immediate_recycles,
            self.scroll.settle_recycles,
            self.scroll.suppressed
        )?;
        writeln!(
            f,
            "cache: fetches {}, cells {}, labels {}, deferred completions {} ({} failed)",
            self.cache.fetches,
            self.cache.cells_written,
            self.cache.labels_written,
            self.counters.fetches_completed,
            self.counters.fetch_failures
        )?;
        writeln!(
            f,
            "channel: {} script events, {} failed sends",
            self.telemetry.script_events, self.telemetry.send_failures
        )?;
        write!(
            f,
            "slots: {} detached at teardown, {} placeholders at exit",
            self.slots_detached, self.placeholders_at_exit
        )
    }
}

struct GridRuntime<D: DataSource + 'static> {
    session: GridSession<MemorySurface, D>,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<JoinHandle<()>>,
    counters: LoopCounters,
    draining: bool,
}

impl<D: DataSource + 'static> GridRuntime<D> {
    fn new(
        session: GridSession<MemorySurface, D>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        source_handles: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            session,
            rx,
            tx: Some(tx),
            source_handles,
            counters: LoopCounters::default(),
            draining: false,
        }
    }

    async fn run(mut self) -> Result<RunSummary> {
        // Tickets issued by the initial resize.
        self.dispatch_fetches();

        let shutdown_reason = loop {
            if self.draining && self.idle() {
                break ShutdownReason::ShutdownEvent;
            }
            let deadline = self.session.next_deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let control = tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some(event) => self.handle_event(event)?,
                    None => LoopControl::Break { reason: ShutdownReason::ChannelClosed },
                },
                _ = timer => {
                    self.fire_timers(Instant::now())?;
                    LoopControl::Continue
                }
            };

            match control {
                LoopControl::Continue => self.dispatch_fetches(),
                LoopControl::Break { reason } => break reason,
            }
        };

        self.rx.close();
        Ok(self.finalize_shutdown(shutdown_reason).await)
    }

    /// No pending debounce timer and no deferred fetch in flight.
    fn idle(&self) -> bool {
        self.session.next_deadline().is_none() && self.session.cache().in_flight().is_empty()
    }

    fn handle_event(&mut self, event: Event) -> Result<LoopControl> {
        self.counters.events += 1;
        trace!(target: "runtime.events", kind = event.kind(), "event");
        match event {
            Event::Surface(SurfaceEvent::Resized { width, height }) => {
                self.session
                    .surface_mut()
                    .set_size(SurfaceSize::new(width, height));
                let outcome = self.session.resize()?;
                if !outcome.is_noop() {
                    self.counters.resizes += 1;
                }
            }
            Event::Scroll(report) => self.handle_scroll(report)?,
            Event::FetchCompleted { ticket, result } => self.handle_fetch(ticket, result)?,
            Event::Shutdown => {
                info!(target: "runtime", "shutdown_requested");
                self.draining = true;
            }
        }
        Ok(LoopControl::Continue)
    }

    fn handle_scroll(&mut self, report: ScrollReport) -> Result<()> {
        if let Some(outcome) = self.session.on_scroll(Instant::now(), report)?
            && !outcome.is_noop()
        {
            self.counters.recycles += 1;
        }
        Ok(())
    }

    fn handle_fetch(&mut self, ticket: u64, result: Result<FetchedBlock, FetchError>) -> Result<()> {
        match self.session.complete_fetch(ticket, result) {
            Ok(_) => {
                self.counters.fetches_completed += 1;
                Ok(())
            }
            // A failed or unknown fetch leaves placeholders; the region is
            // requested again by the next coverage check.
            Err(SessionError::Fetch(e)) => {
                self.counters.fetch_failures += 1;
                warn!(target: "runtime", ticket, error = %e, "deferred_fetch_failed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn fire_timers(&mut self, now: Instant) -> Result<()> {
        if let Some(outcome) = self.session.poll_timers(now)?
            && !outcome.is_noop()
        {
            self.counters.recycles += 1;
        }
        Ok(())
    }

    /// Run every newly issued deferred fetch on the blocking pool; results come
    /// back as `Event::FetchCompleted`.
    fn dispatch_fetches(&mut self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        for ticket in self.session.take_fetch_requests() {
            let source = self.session.source();
            let tx = tx.clone();
            trace!(target: "runtime", ticket = ticket.id, rect = %ticket.rect, "fetch_dispatched");
            tokio::spawn(async move {
                let rect = ticket.rect;
                let result = tokio::task::spawn_blocking(move || source.fetch(rect))
                    .await
                    .unwrap_or_else(|err| {
                        Err(FetchError::Source {
                            rect,
                            reason: err.to_string(),
                        })
                    });
                send_event(
                    &tx,
                    Event::FetchCompleted {
                        ticket: ticket.id,
                        result,
                    },
                )
                .await;
            });
        }
    }

    async fn finalize_shutdown(mut self, reason: ShutdownReason) -> RunSummary {
        log_shutdown_stage(reason, "begin");
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        let state = self.session.state();
        let placeholders_at_exit = self
            .session
            .window()
            .body_rows()
            .flat_map(|row| row.iter())
            .filter(|slot| slot.content() == PENDING_LABEL)
            .count();
        let scroll = self.session.scroll_metrics();
        let cache = self.session.cache_stats();
        let surface = self.session.teardown();
        let telemetry = EventTelemetry::snapshot();
        info!(
            target: "runtime.shutdown",
            script_events = telemetry.script_events,
            send_failures = telemetry.send_failures,
            "event_telemetry"
        );
        log_shutdown_stage(reason, "complete");

        RunSummary {
            reason,
            anchor: state.anchor(),
            loaded: state.loaded(),
            placeholders_at_exit,
            slots_detached: surface.slots_detached(),
            counters: self.counters,
            scroll,
            cache,
            telemetry,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let settings = AppStartup::load_settings(&args)?;
    let steps = AppStartup::load_steps(&args, &settings)?;

    let surface = MemorySurface::new(SurfaceSize::new(args.width, args.height));
    let session = GridSession::new(settings, surface, Arc::new(FormulaSource::new()))?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    registry.register(ScriptEventSource::new(steps));
    let source_handles = registry.spawn_all(&tx);

    let runtime = GridRuntime::new(session, tx, rx, source_handles);
    let summary = runtime.run().await?;
    info!(target: "runtime", reason = summary.reason.as_str(), "exit");
    println!("{summary}");
    Ok(())
}
