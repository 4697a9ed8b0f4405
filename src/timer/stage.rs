use crate::crop::{CropType, PlanterType};

/// Seconds left at which the five-minute warning fires.
pub const FIVE_MINUTES: u32 = 5 * 60;
/// Seconds left at which the one-minute warning fires.
pub const ONE_MINUTE: u32 = 60;

/// Crop lifecycle phase. Always visited in declaration order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    #[default]
    Growing,
    Ready,
    Flowering,
    Seeding,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Growing, Stage::Ready, Stage::Flowering, Stage::Seeding];

    /// Stage entered when this one runs out; `None` for the terminal stage.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Growing => Some(Stage::Ready),
            Stage::Ready => Some(Stage::Flowering),
            Stage::Flowering => Some(Stage::Seeding),
            Stage::Seeding => None,
        }
    }

    /// Label passed to the display sink.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Growing => "Growing",
            Stage::Ready => "Ready",
            Stage::Flowering => "Flowering",
            Stage::Seeding => "Seeding",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Stage::Growing => "growing",
            Stage::Ready => "ready",
            Stage::Flowering => "flowering",
            Stage::Seeding => "seeding",
        }
    }

    /// Duration a stage starts with when it is entered by a transition.
    ///
    /// Growing has no fixed duration: it comes from the detected percentage.
    pub fn fixed_duration(self, crop: CropType, planter: PlanterType) -> Option<TimeLeft> {
        let seconds = match (self, crop, planter) {
            (Stage::Growing, _, _) => return None,
            (Stage::Seeding, _, _) => return Some(TimeLeft::Infinite),
            (Stage::Ready, CropType::Coca, _) => 450,
            (Stage::Ready, CropType::Marijuana, _) => 240,
            (Stage::Flowering, CropType::Coca, PlanterType::PlanterBox) => 450,
            (Stage::Flowering, CropType::Coca, PlanterType::Basic) => 480,
            (Stage::Flowering, CropType::Marijuana, PlanterType::PlanterBox) => 180,
            (Stage::Flowering, CropType::Marijuana, PlanterType::Basic) => 210,
        };
        Some(TimeLeft::Finite(seconds))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Countdown value: whole seconds, or the seeding stage's "no timer".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeLeft {
    Finite(u32),
    Infinite,
}

impl TimeLeft {
    pub fn seconds(self) -> Option<u32> {
        match self {
            TimeLeft::Finite(s) => Some(s),
            TimeLeft::Infinite => None,
        }
    }
}

impl Default for TimeLeft {
    fn default() -> Self {
        TimeLeft::Finite(0)
    }
}

impl std::fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeLeft::Finite(s) => write!(f, "{:02}:{:02}", s / 60, s % 60),
            TimeLeft::Infinite => write!(f, "∞"),
        }
    }
}

/// Stage-scoped event raised while counting down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerAlert {
    FiveMinutesLeft(Stage),
    OneMinuteLeft(Stage),
    StageCompleted(Stage),
}

impl TimerAlert {
    pub fn stage(self) -> Stage {
        match self {
            TimerAlert::FiveMinutesLeft(s)
            | TimerAlert::OneMinuteLeft(s)
            | TimerAlert::StageCompleted(s) => s,
        }
    }

    /// Tag stored in `notifications_sent`, e.g. `ready_1min`.
    pub fn tag(self) -> String {
        let suffix = match self {
            TimerAlert::FiveMinutesLeft(_) => "5min",
            TimerAlert::OneMinuteLeft(_) => "1min",
            TimerAlert::StageCompleted(_) => "completed",
        };
        format!("{}_{}", self.stage().key(), suffix)
    }
}
