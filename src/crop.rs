//! Crop and planter domains shared by detection, duration policy and timer.

use serde::{Deserialize, Serialize};

/// Crop being grown. The in-game label for `Marijuana` is "Cannabis".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    #[default]
    Coca,
    Marijuana,
}

impl CropType {
    /// Name shown on the overlay.
    pub fn display_name(self) -> &'static str {
        match self {
            CropType::Coca => "Coca",
            CropType::Marijuana => "Cannabis",
        }
    }

    /// Key used in the config file and in log lines.
    pub fn key(self) -> &'static str {
        match self {
            CropType::Coca => "coca",
            CropType::Marijuana => "marijuana",
        }
    }

    pub const ALL: [CropType; 2] = [CropType::Coca, CropType::Marijuana];
}

impl std::fmt::Display for CropType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Container the crop grows in. Planter boxes shorten every stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanterType {
    #[default]
    Basic,
    PlanterBox,
}

impl PlanterType {
    pub fn display_name(self) -> &'static str {
        match self {
            PlanterType::Basic => "Basic",
            PlanterType::PlanterBox => "Planter Box",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PlanterType::Basic => "basic",
            PlanterType::PlanterBox => "planter_box",
        }
    }

    pub const ALL: [PlanterType; 2] = [PlanterType::Basic, PlanterType::PlanterBox];
}

impl std::fmt::Display for PlanterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
