//! Overlay state and the pure display rules.

use eframe::egui::Color32;

use crate::config::AppConfig;
use crate::launch::TimerPlan;
use crate::timer::stage::{FIVE_MINUTES, ONE_MINUTE};
use crate::timer::{Stage, TimeLeft, TimerAlert};

/// Detection status for display.
#[derive(Clone, Debug, Default)]
pub enum DetectionStatus {
    #[default]
    Idle,
    Detecting,
    Planned(TimerPlan),
}

impl DetectionStatus {
    pub fn status_text(&self) -> String {
        match self {
            Self::Idle => "Press Detect & Start".to_string(),
            Self::Detecting => "Detecting...".to_string(),
            Self::Planned(plan) if plan.fell_back => {
                "No percentage found, started at 0%".to_string()
            }
            Self::Planned(plan) => format!("Detected {}%", plan.percentage),
        }
    }

    pub fn is_detecting(&self) -> bool {
        matches!(self, Self::Detecting)
    }
}

#[derive(Debug)]
pub struct GuiState {
    pub config: AppConfig,
    pub status: DetectionStatus,
    /// Percentage the running timer was started from
    pub detected_percent: f64,
    /// Latest alert, shown until the next one
    pub last_alert: Option<TimerAlert>,
    /// Label of the latest tick update ("Reset" right after a reset)
    pub last_label: Option<&'static str>,
    pub show_settings: bool,
}

impl GuiState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            status: DetectionStatus::Idle,
            detected_percent: 0.0,
            last_alert: None,
            last_label: None,
            show_settings: false,
        }
    }

    /// Clears `Detecting` when the worker is gone without sending a plan.
    ///
    /// `worker_busy` must be read before draining the plan channel so a plan
    /// sent just before the worker finished is not mistaken for a lost one.
    pub fn settle_detection(&mut self, worker_busy: bool) -> bool {
        if worker_busy || !self.status.is_detecting() {
            return false;
        }
        self.status = DetectionStatus::Idle;
        true
    }
}

/// Straight (unmultiplied) RGBA.
pub type Rgba = [u8; 4];

pub const GROWING_COLOR: Rgba = [200, 200, 200, 80];
pub const WARNING_COLOR: Rgba = [255, 165, 0, 120];
pub const URGENT_COLOR: Rgba = [255, 68, 68, 120];
pub const READY_COLOR: Rgba = [33, 150, 243, 120];
pub const FLOWERING_COLOR: Rgba = [156, 39, 176, 120];
pub const SEEDING_COLOR: Rgba = [76, 175, 80, 120];

/// Overlay background for a stage and countdown.
///
/// The one- and five-minute warnings override the stage colour in every
/// timed stage.
pub fn background_rgba(stage: Stage, time_left: TimeLeft) -> Rgba {
    if stage == Stage::Seeding {
        return SEEDING_COLOR;
    }
    match time_left.seconds() {
        Some(s) if s <= ONE_MINUTE => return URGENT_COLOR,
        Some(s) if s <= FIVE_MINUTES => return WARNING_COLOR,
        _ => {}
    }
    match stage {
        Stage::Growing => GROWING_COLOR,
        Stage::Ready => READY_COLOR,
        Stage::Flowering => FLOWERING_COLOR,
        Stage::Seeding => SEEDING_COLOR,
    }
}

pub fn background_color(stage: Stage, time_left: TimeLeft) -> Color32 {
    let [r, g, b, a] = background_rgba(stage, time_left);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

pub fn alert_text(alert: TimerAlert) -> String {
    match alert {
        TimerAlert::FiveMinutesLeft(stage) => format!("{}: 5 minutes left", stage),
        TimerAlert::OneMinuteLeft(stage) => format!("{}: 1 minute left", stage),
        TimerAlert::StageCompleted(stage) => format!("{} complete", stage),
    }
}
