use crate::crop::{CropType, PlanterType};

/// Shortest timer ever started.
pub const MIN_TIMER_SECONDS: u32 = 1;

/// Full growing time in minutes, from 0% to 100%.
pub fn base_minutes(crop: CropType, planter: PlanterType) -> u32 {
    match (crop, planter) {
        (CropType::Coca, PlanterType::Basic) => 38,
        (CropType::Coca, PlanterType::PlanterBox) => 36,
        (CropType::Marijuana, PlanterType::Basic) => 19,
        (CropType::Marijuana, PlanterType::PlanterBox) => 18,
    }
}

/// Growing time left at `percentage`, floored to whole seconds, without the
/// one-second minimum.
pub fn growing_seconds(percentage: f64, crop: CropType, planter: PlanterType) -> u32 {
    let percentage = if percentage.is_finite() {
        percentage.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let base = base_minutes(crop, planter) as f64;
    ((base * 60.0 * (100.0 - percentage)) / 100.0).floor() as u32
}

/// Seconds the growing stage still needs at `percentage`; never below one.
pub fn remaining_seconds(percentage: f64, crop: CropType, planter: PlanterType) -> u32 {
    growing_seconds(percentage, crop, planter).max(MIN_TIMER_SECONDS)
}
