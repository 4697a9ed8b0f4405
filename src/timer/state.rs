//! Countdown state advanced by the tick loop.
//!
//! Kept free of threads and clocks so the whole lifecycle can be stepped
//! synchronously.

use std::collections::BTreeSet;

use super::stage::{FIVE_MINUTES, ONE_MINUTE, Stage, TimeLeft, TimerAlert};
use crate::crop::{CropType, PlanterType};

#[derive(Clone, Debug, PartialEq)]
pub struct TimerState {
    pub time_left: TimeLeft,
    pub original_time: u32,
    pub stage: Stage,
    pub crop: CropType,
    pub planter: PlanterType,
    pub notifications_sent: BTreeSet<String>,
    /// Emissions since the last decrement
    subticks: u32,
}

impl TimerState {
    pub fn new(seconds: u32, crop: CropType, planter: PlanterType) -> Self {
        Self {
            time_left: TimeLeft::Finite(seconds),
            original_time: seconds,
            stage: Stage::Growing,
            crop,
            planter,
            notifications_sent: BTreeSet::new(),
            subticks: 0,
        }
    }

    /// Counts one emission; every `ticks_per_second`-th one advances the
    /// countdown by a second.
    pub fn tick(&mut self, ticks_per_second: u32) -> Vec<TimerAlert> {
        self.subticks += 1;
        if self.subticks < ticks_per_second.max(1) {
            return Vec::new();
        }
        self.subticks = 0;
        self.advance_second()
    }

    /// Decrements a finite countdown and moves to the next stage at zero.
    ///
    /// The seeding stage holds `Infinite` and is left untouched.
    pub fn advance_second(&mut self) -> Vec<TimerAlert> {
        let mut alerts = Vec::new();
        let TimeLeft::Finite(seconds) = self.time_left else {
            return alerts;
        };

        let left = seconds.saturating_sub(1);
        self.time_left = TimeLeft::Finite(left);

        if left == FIVE_MINUTES {
            self.fire(TimerAlert::FiveMinutesLeft(self.stage), &mut alerts);
        } else if left == ONE_MINUTE {
            self.fire(TimerAlert::OneMinuteLeft(self.stage), &mut alerts);
        } else if left == 0 {
            self.fire(TimerAlert::StageCompleted(self.stage), &mut alerts);
            self.enter_next_stage();
        }

        alerts
    }

    /// Back to the start of the growing stage with no alerts sent.
    pub fn reset(&mut self) {
        self.time_left = TimeLeft::Finite(self.original_time);
        self.stage = Stage::Growing;
        self.notifications_sent.clear();
        self.subticks = 0;
    }

    pub fn snapshot(&self, running: bool) -> TimerSnapshot {
        TimerSnapshot {
            running,
            time_left: self.time_left,
            original_time: self.original_time,
            stage: self.stage,
            crop: self.crop,
            planter: self.planter,
            notifications_sent: self.notifications_sent.clone(),
        }
    }

    fn enter_next_stage(&mut self) {
        let Some(next) = self.stage.next() else {
            return;
        };
        self.stage = next;
        self.time_left = next
            .fixed_duration(self.crop, self.planter)
            .unwrap_or(TimeLeft::Infinite);
    }

    fn fire(&mut self, alert: TimerAlert, alerts: &mut Vec<TimerAlert>) {
        if self.stage == Stage::Seeding {
            return;
        }
        if self.notifications_sent.insert(alert.tag()) {
            alerts.push(alert);
        }
    }
}

/// Copy of the machine state as last published by the tick loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerSnapshot {
    pub running: bool,
    pub time_left: TimeLeft,
    pub original_time: u32,
    pub stage: Stage,
    pub crop: CropType,
    pub planter: PlanterType,
    pub notifications_sent: BTreeSet<String>,
}

impl TimerSnapshot {
    /// Live growth estimate, interpolated from `detected` at start to 100% when
    /// the growing stage ends.
    pub fn growth_percent(&self, detected: f64) -> f64 {
        if self.stage != Stage::Growing {
            return 100.0;
        }
        let detected = detected.clamp(0.0, 100.0);
        let (TimeLeft::Finite(left), true) = (self.time_left, self.original_time > 0) else {
            return detected;
        };
        let elapsed = self.original_time.saturating_sub(left) as f64;
        let ratio = (elapsed / self.original_time as f64).clamp(0.0, 1.0);
        detected + (100.0 - detected) * ratio
    }
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        let seconds = super::duration::remaining_seconds(
            0.0,
            CropType::default(),
            PlanterType::default(),
        );
        TimerState::new(seconds, CropType::default(), PlanterType::default()).snapshot(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Advances second by second until the stage changes.
    fn run_stage(state: &mut TimerState) -> Vec<TimerAlert> {
        let stage = state.stage;
        let mut alerts = Vec::new();
        while state.stage == stage {
            alerts.extend(state.advance_second());
        }
        alerts
    }

    #[test]
    fn test_ten_emissions_per_decrement() {
        let mut state = TimerState::new(100, CropType::Coca, PlanterType::Basic);
        for _ in 0..9 {
            state.tick(10);
        }
        assert_eq!(state.time_left, TimeLeft::Finite(100));
        state.tick(10);
        assert_eq!(state.time_left, TimeLeft::Finite(99));
        for _ in 0..20 {
            state.tick(10);
        }
        assert_eq!(state.time_left, TimeLeft::Finite(97));
    }

    #[test]
    fn test_full_lifecycle_visits_stages_in_order() {
        let mut state = TimerState::new(3, CropType::Coca, PlanterType::Basic);
        let mut visited = vec![state.stage];
        let mut guard = 0;
        while state.stage != Stage::Seeding {
            let before = state.stage;
            state.tick(10);
            if state.stage != before {
                visited.push(state.stage);
            }
            guard += 1;
            assert!(guard < 100_000, "lifecycle did not finish");
        }
        assert_eq!(
            visited,
            vec![Stage::Growing, Stage::Ready, Stage::Flowering, Stage::Seeding]
        );
    }

    #[test]
    fn test_stage_durations_on_entry() {
        let mut state = TimerState::new(2, CropType::Marijuana, PlanterType::PlanterBox);
        run_stage(&mut state);
        assert_eq!(state.stage, Stage::Ready);
        assert_eq!(state.time_left, TimeLeft::Finite(240));
        run_stage(&mut state);
        assert_eq!(state.stage, Stage::Flowering);
        assert_eq!(state.time_left, TimeLeft::Finite(180));
    }

    #[test]
    fn test_flowering_expiry_enters_infinite_seeding() {
        let mut state = TimerState::new(1, CropType::Coca, PlanterType::PlanterBox);
        state.stage = Stage::Flowering;
        state.time_left = TimeLeft::Finite(1);

        let alerts = state.advance_second();
        assert_eq!(alerts, vec![TimerAlert::StageCompleted(Stage::Flowering)]);
        assert_eq!(state.stage, Stage::Seeding);
        assert_eq!(state.time_left, TimeLeft::Infinite);

        for _ in 0..1000 {
            assert!(state.tick(10).is_empty());
        }
        assert_eq!(state.stage, Stage::Seeding);
        assert_eq!(state.time_left, TimeLeft::Infinite);
    }

    #[test]
    fn test_alerts_fire_once_per_stage() {
        let mut state = TimerState::new(302, CropType::Coca, PlanterType::Basic);
        let alerts = run_stage(&mut state);
        assert_eq!(
            alerts,
            vec![
                TimerAlert::FiveMinutesLeft(Stage::Growing),
                TimerAlert::OneMinuteLeft(Stage::Growing),
                TimerAlert::StageCompleted(Stage::Growing),
            ]
        );
        // Ready (450s) passes both thresholds too
        let alerts = run_stage(&mut state);
        assert_eq!(alerts.len(), 3);
        assert!(state.notifications_sent.contains("ready_5min"));
        assert!(state.notifications_sent.contains("growing_completed"));
        assert_eq!(state.notifications_sent.len(), 6);
    }

    #[test]
    fn test_zero_seconds_completes_on_first_second() {
        let mut state = TimerState::new(0, CropType::Coca, PlanterType::Basic);
        state.advance_second();
        assert_eq!(state.stage, Stage::Ready);
    }

    #[test]
    fn test_reset_restores_growing() {
        let mut state = TimerState::new(62, CropType::Coca, PlanterType::Basic);
        run_stage(&mut state);
        assert_eq!(state.stage, Stage::Ready);
        state.tick(10);

        state.reset();
        assert_eq!(state.stage, Stage::Growing);
        assert_eq!(state.time_left, TimeLeft::Finite(62));
        assert!(state.notifications_sent.is_empty());
        assert_eq!(state.subticks, 0);
    }

    #[test]
    fn test_growth_percent() {
        let mut snapshot = TimerState::new(100, CropType::Coca, PlanterType::Basic).snapshot(true);
        assert_eq!(snapshot.growth_percent(20.0), 20.0);
        snapshot.time_left = TimeLeft::Finite(50);
        assert_eq!(snapshot.growth_percent(20.0), 60.0);
        snapshot.time_left = TimeLeft::Finite(0);
        assert_eq!(snapshot.growth_percent(20.0), 100.0);
        snapshot.stage = Stage::Ready;
        snapshot.time_left = TimeLeft::Finite(450);
        assert_eq!(snapshot.growth_percent(20.0), 100.0);
    }

    #[test]
    fn test_default_snapshot_is_idle_coca_basic() {
        let snapshot = TimerSnapshot::default();
        assert!(!snapshot.running);
        assert_eq!(snapshot.time_left, TimeLeft::Finite(2280));
        assert_eq!(snapshot.stage, Stage::Growing);
    }
}
