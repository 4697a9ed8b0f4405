use regex::Regex;
use std::sync::OnceLock;

use crate::crop::CropType;

/// An integer or decimal immediately followed by a percent sign.
const PERCENTAGE_PATTERN: &str = r"(\d+(?:\.\d+)?)%";

static PERCENTAGE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn percentage_regex() -> Option<&'static Regex> {
    PERCENTAGE_REGEX
        .get_or_init(|| Regex::new(PERCENTAGE_PATTERN).ok())
        .as_ref()
}

/// Extracts percentage values from OCR text.
///
/// Keeps values within 0..=100, drops duplicates and preserves the order in
/// which values first appear. Text without any match yields an empty list.
pub fn extract_percentages(text: &str) -> Vec<f64> {
    let mut percentages: Vec<f64> = Vec::new();
    let Some(regex) = percentage_regex() else {
        return percentages;
    };

    for capture in regex.captures_iter(text) {
        let Ok(value) = capture[1].parse::<f64>() else {
            continue;
        };
        if !(0.0..=100.0).contains(&value) {
            continue;
        }
        if !percentages.contains(&value) {
            percentages.push(value);
        }
    }

    percentages
}

/// Reads the crop label from OCR text.
///
/// Case-insensitive substring match: "coca" is checked before "cannabis".
pub fn extract_crop_label(text: &str) -> Option<CropType> {
    let lower = text.to_lowercase();
    if lower.contains("coca") {
        Some(CropType::Coca)
    } else if lower.contains("cannabis") {
        Some(CropType::Marijuana)
    } else {
        None
    }
}

/// True when the text is worth parsing for a percentage.
pub fn has_percent_sign(text: &str) -> bool {
    text.contains('%')
}

/// Smallest value in a percentage list.
///
/// OCR tends to over-read nested or partial digits, so the smallest plausible
/// match is taken as the progress value.
pub fn smallest(percentages: &[f64]) -> Option<f64> {
    percentages.iter().copied().reduce(f64::min)
}
