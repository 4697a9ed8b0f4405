//! Detection strategies: preprocessing transform + ordered OCR configs.
//!
//! The table is the single place that decides which image variants are
//! tried, with which engine settings, and in what order.

use image::DynamicImage;

use super::engine::{OcrConfig, PageSegMode};
use super::preprocess::{BINARIZE_THRESHOLD, enhance_for_ocr, invert, threshold_bright_pixels};

/// Image transform applied before a strategy's OCR passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preprocess {
    /// Grayscale, contrast, sharpness, 3× upscale
    Enhanced,
    /// Enhanced, then bright pixels → black, everything else → white
    Binarized { threshold: u8 },
    /// Enhanced, then inverted
    Inverted,
}

impl Preprocess {
    pub fn apply(self, img: &DynamicImage) -> DynamicImage {
        let enhanced = enhance_for_ocr(img);
        match self {
            Preprocess::Enhanced => enhanced,
            Preprocess::Binarized { threshold } => {
                DynamicImage::ImageLuma8(threshold_bright_pixels(&enhanced.to_luma8(), threshold))
            }
            Preprocess::Inverted => DynamicImage::ImageLuma8(invert(&enhanced.to_luma8())),
        }
    }
}

/// One detection strategy.
#[derive(Clone, Debug)]
pub struct Strategy {
    pub name: &'static str,
    pub preprocess: Preprocess,
    /// Tried in order; the first text containing '%' ends the strategy
    pub configs: Vec<OcrConfig>,
}

/// (psm, digits-only whitelist)
type PassConfig = (PageSegMode, bool);

const STRATEGY_TABLE: &[(&str, Preprocess, &[PassConfig])] = &[
    (
        "enhanced",
        Preprocess::Enhanced,
        &[(PageSegMode::SingleLine, false), (PageSegMode::SingleBlock, false)],
    ),
    (
        "enhanced_digits",
        Preprocess::Enhanced,
        &[
            (PageSegMode::SingleBlock, true),
            (PageSegMode::SingleWord, true),
            (PageSegMode::SingleLine, true),
        ],
    ),
    (
        "binarized_digits",
        Preprocess::Binarized {
            threshold: BINARIZE_THRESHOLD,
        },
        &[(PageSegMode::SingleLine, true), (PageSegMode::SingleBlock, true)],
    ),
    (
        "inverted",
        Preprocess::Inverted,
        &[(PageSegMode::SingleLine, false), (PageSegMode::SingleBlock, false)],
    ),
];

/// Strategies in priority order.
pub fn default_strategies() -> Vec<Strategy> {
    STRATEGY_TABLE
        .iter()
        .map(|&(name, preprocess, passes)| Strategy {
            name,
            preprocess,
            configs: passes
                .iter()
                .map(|&(psm, digits)| {
                    if digits {
                        OcrConfig::digits(psm)
                    } else {
                        OcrConfig::new(psm)
                    }
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_table_order_and_shape() {
        let strategies = default_strategies();
        let names: Vec<_> = strategies.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["enhanced", "enhanced_digits", "binarized_digits", "inverted"]
        );
        for strategy in &strategies {
            assert!(strategy.configs.len() >= 2, "{} needs two configs", strategy.name);
            assert!(strategy.configs.iter().any(|c| c.psm == PageSegMode::SingleLine));
            assert!(strategy.configs.iter().any(|c| c.psm == PageSegMode::SingleBlock));
        }
    }

    #[test]
    fn test_first_strategy_can_read_labels() {
        let strategies = default_strategies();
        assert!(strategies[0].configs.iter().all(|c| c.whitelist.is_none()));
        assert!(strategies[1].configs.iter().all(|c| c.whitelist.is_some()));
    }

    #[test]
    fn test_binarized_output_is_black_and_white() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(6, 6, |x, _| {
            Luma([if x < 3 { 20 } else { 240 }])
        }));
        let out = Preprocess::Binarized { threshold: 160 }.apply(&img).to_luma8();
        assert_eq!(out.dimensions(), (18, 18));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
