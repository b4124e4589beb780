//! Scripted scroll/resize event source.
//!
//! Script format, one step per line:
//!
//! ```text
//! # comment
//! scroll <left> <top> [delay_ms]
//! resize <width> <height> [delay_ms]
//! ```
//!
//! `delay_ms` is the pause before the step is emitted (default
//! [`DEFAULT_STEP_DELAY_MS`]). After the last step the source sends
//! `Event::Shutdown`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use core_scroll::ScrollReport;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::{AsyncEventSource, Event, SCRIPT_EVENTS_EMITTED, SurfaceEvent, send_event};

pub const DEFAULT_STEP_DELAY_MS: u64 = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: `{command}` expects {expected} arguments")]
    Arity {
        line: usize,
        command: &'static str,
        expected: &'static str,
    },
    #[error("line {line}: invalid number `{value}`")]
    Number { line: usize, value: String },
}

#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: Event,
}

impl ScriptStep {
    pub fn scroll(left: f64, top: f64, delay: Duration) -> Self {
        Self {
            delay,
            event: Event::Scroll(ScrollReport::new(left, top)),
        }
    }

    pub fn resize(width: f64, height: f64, delay: Duration) -> Self {
        Self {
            delay,
            event: Event::Surface(SurfaceEvent::Resized { width, height }),
        }
    }
}

pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let mut parts = content.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();
        let (name, build): (&'static str, fn(f64, f64, Duration) -> ScriptStep) = match command {
            "scroll" => ("scroll", ScriptStep::scroll),
            "resize" => ("resize", ScriptStep::resize),
            other => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: other.to_string(),
                });
            }
        };
        if !(2..=3).contains(&args.len()) {
            return Err(ScriptError::Arity {
                line,
                command: name,
                expected: "2 or 3",
            });
        }
        let a = number(line, args[0])?;
        let b = number(line, args[1])?;
        let delay = match args.get(2) {
            Some(ms) => ms.parse::<u64>().map_err(|_| ScriptError::Number {
                line,
                value: (*ms).to_string(),
            })?,
            None => DEFAULT_STEP_DELAY_MS,
        };
        steps.push(build(a, b, Duration::from_millis(delay)));
    }
    Ok(steps)
}

fn number(line: usize, value: &str) -> Result<f64, ScriptError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScriptError::Number {
            line,
            value: value.to_string(),
        })
}

/// Replays [`ScriptStep`]s with their delays, then requests shutdown.
pub struct ScriptEventSource {
    steps: Vec<ScriptStep>,
}

impl ScriptEventSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }
}

impl AsyncEventSource for ScriptEventSource {
    fn name(&self) -> &'static str {
        "script"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            for step in self.steps {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                if !send_event(&tx, step.event).await {
                    return;
                }
                SCRIPT_EVENTS_EMITTED.fetch_add(1, Ordering::Relaxed);
            }
            tracing::debug!(target: "runtime.events", "script_exhausted");
            let _ = send_event(&tx, Event::Shutdown).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventTelemetry;
    use tokio::sync::mpsc;

    #[test]
    fn parses_commands_comments_and_delays() {
        let steps = parse_script(
            "# warm up\n\
             resize 600 600 0\n\
             \n\
             scroll 0 3000   # jump\n\
             scroll 120.5 3060 5\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 3);
        assert!(matches!(
            steps[0].event,
            Event::Surface(SurfaceEvent::Resized { width, height }) if width == 600.0 && height == 600.0
        ));
        assert_eq!(steps[0].delay, Duration::ZERO);
        assert_eq!(steps[1].delay, Duration::from_millis(DEFAULT_STEP_DELAY_MS));
        match steps[2].event {
            Event::Scroll(r) => assert_eq!((r.left, r.top), (120.5, 3060.0)),
            ref other => panic!("expected scroll, got {other:?}"),
        }
        assert_eq!(steps[2].delay, Duration::from_millis(5));
    }

    #[test]
    fn reports_line_numbers_on_errors() {
        assert_eq!(
            parse_script("scroll 1 2\njump 3 4").unwrap_err(),
            ScriptError::UnknownCommand {
                line: 2,
                command: "jump".into()
            }
        );
        assert!(matches!(parse_script("resize 1").unwrap_err(), ScriptError::Arity { line: 1, .. }));
        assert!(matches!(parse_script("scroll x 2").unwrap_err(), ScriptError::Number { line: 1, .. }));
        assert!(matches!(parse_script("scroll 1 2 -3").unwrap_err(), ScriptError::Number { .. }));
        assert!(matches!(parse_script("scroll inf 2").unwrap_err(), ScriptError::Number { .. }));
    }

    #[tokio::test]
    async fn source_replays_steps_then_shuts_down() {
        let before = EventTelemetry::snapshot();
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let steps = parse_script("scroll 0 60 0\nresize 300 300 1").unwrap();
        let handle = Box::new(ScriptEventSource::new(steps)).spawn(tx);
        let kinds: Vec<&'static str> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .flatten()
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["scroll", "surface", "shutdown"]);
        handle.await.unwrap();
        // Shutdown is not a script step.
        assert!(EventTelemetry::snapshot().script_events >= before.script_events + 2);
    }
}
