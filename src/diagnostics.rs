//! Diagnostic sink for the detection pipeline and the stage machine.
//!
//! Core components receive an `Arc<dyn DiagnosticSink>` when they are built
//! and report what they do through it. Recording is fire-and-forget: a sink
//! that fails to write must not change what the caller returns.

use image::DynamicImage;
use std::fs;
use std::path::PathBuf;

use crate::ocr::engine::OcrConfig;
use crate::timer::stage::{Stage, TimerAlert};

/// Severity of a diagnostic event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        write!(f, "{:>5}", s)
    }
}

/// Something worth recording while detecting or timing.
#[derive(Debug)]
pub enum DiagnosticEvent<'a> {
    /// One screen capture attempt
    Capture {
        attempt: u32,
        success: bool,
        target: String,
    },
    /// Intermediate image, persisted under `tag`
    Artifact {
        tag: &'a str,
        image: &'a DynamicImage,
    },
    /// One OCR engine invocation
    OcrPass {
        strategy: &'a str,
        config: &'a OcrConfig,
        text: &'a str,
        error: Option<&'a str>,
    },
    /// Percentages extracted by one strategy
    Percentages {
        strategy: &'a str,
        values: &'a [f64],
    },
    /// Outcome of a whole detection call
    FinalResult {
        percentage: Option<f64>,
        method: Option<&'a str>,
    },
    TimerStarted {
        seconds: u32,
        stage: Stage,
    },
    TimerStopped {
        timed_out: bool,
    },
    StageEntered(Stage),
    Alert(TimerAlert),
    /// The on_tick callback panicked; the loop kept running
    CallbackFailed(String),
}

impl DiagnosticEvent<'_> {
    pub fn level(&self) -> Level {
        match self {
            DiagnosticEvent::Capture { success: false, .. } => Level::Warn,
            DiagnosticEvent::OcrPass { error: Some(_), .. } => Level::Warn,
            DiagnosticEvent::FinalResult {
                percentage: None, ..
            } => Level::Error,
            DiagnosticEvent::TimerStopped { timed_out: true } => Level::Warn,
            DiagnosticEvent::CallbackFailed(_) => Level::Error,
            DiagnosticEvent::Artifact { .. } | DiagnosticEvent::OcrPass { .. } => Level::Debug,
            _ => Level::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticEvent::Capture {
                attempt,
                success,
                target,
            } => {
                if *success {
                    write!(f, "Captured {} (attempt {})", target, attempt)
                } else {
                    write!(f, "Capture of {} failed (attempt {})", target, attempt)
                }
            }
            DiagnosticEvent::Artifact { tag, image } => {
                write!(f, "Artifact {} ({}x{})", tag, image.width(), image.height())
            }
            DiagnosticEvent::OcrPass {
                strategy,
                config,
                text,
                error,
            } => match error {
                Some(e) => write!(f, "OCR {} | {} | engine error: {}", strategy, config, e),
                None => write!(f, "OCR {} | {} | raw text: '{}'", strategy, config, text.trim()),
            },
            DiagnosticEvent::Percentages { strategy, values } => {
                if values.is_empty() {
                    write!(f, "{} found no percentages", strategy)
                } else {
                    write!(f, "{} found percentages: {:?}", strategy, values)
                }
            }
            DiagnosticEvent::FinalResult { percentage, method } => match (percentage, method) {
                (Some(p), Some(m)) => write!(f, "Final result: {}% detected using {}", p, m),
                (Some(p), None) => write!(f, "Final result: {}%", p),
                (None, _) => write!(f, "Final result: no percentage detected by any method"),
            },
            DiagnosticEvent::TimerStarted { seconds, stage } => write!(
                f,
                "Timer started: {:02}:{:02} ({})",
                seconds / 60,
                seconds % 60,
                stage
            ),
            DiagnosticEvent::TimerStopped { timed_out } => {
                if *timed_out {
                    write!(f, "Timer stopped; tick loop did not exit in time")
                } else {
                    write!(f, "Timer stopped")
                }
            }
            DiagnosticEvent::StageEntered(stage) => write!(f, "Entered {} stage", stage),
            DiagnosticEvent::Alert(alert) => write!(f, "Alert: {}", alert.tag()),
            DiagnosticEvent::CallbackFailed(msg) => write!(f, "Tick callback failed: {}", msg),
        }
    }
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &DiagnosticEvent<'_>);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _event: &DiagnosticEvent<'_>) {}
}

/// Writes events to the application log and images to the screenshots folder.
///
/// Only the latest image per tag is kept: `ocr_enhanced.png` is overwritten on
/// every detection.
#[derive(Debug, Clone)]
pub struct FileSink {
    screenshots_dir: Option<PathBuf>,
}

impl FileSink {
    pub fn new(screenshots_dir: Option<PathBuf>) -> Self {
        Self { screenshots_dir }
    }

    fn save_artifact(&self, tag: &str, image: &DynamicImage) {
        let Some(dir) = &self.screenshots_dir else {
            return;
        };
        if image.width() == 0 || image.height() == 0 {
            return;
        }
        let path = dir.join(format!("{}.png", sanitize_tag(tag)));
        let _ = fs::remove_file(&path);
        if let Err(e) = image.save(&path) {
            crate::log(&format!(
                "[{}] Failed to save debug screenshot {}: {}",
                Level::Error,
                path.display(),
                e
            ));
        }
    }
}

impl DiagnosticSink for FileSink {
    fn record(&self, event: &DiagnosticEvent<'_>) {
        if let DiagnosticEvent::Artifact { tag, image } = event {
            self.save_artifact(tag, image);
        }
        crate::log(&format!("[{}] {}", event.level(), event));
    }
}

/// Keeps file names to `[A-Za-z0-9_-]`.
fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
