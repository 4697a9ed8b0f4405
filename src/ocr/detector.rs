//! Detection orchestrator.
//!
//! Runs the strategy table over one captured image and reconciles the
//! per-strategy candidates into a single answer.

use image::DynamicImage;
use std::sync::Arc;

use super::engine::OcrEngine;
use super::extract::{extract_crop_label, extract_percentages, has_percent_sign, smallest};
use super::strategy::{Strategy, default_strategies};
use crate::crop::CropType;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};

/// One strategy's proposal.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionCandidate {
    pub method: String,
    /// Smallest percentage the strategy read, within 0..=100
    pub percentage: f64,
    pub crop_label: Option<CropType>,
}

/// The reconciled answer of a detection call.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub percentage: f64,
    /// First label read by any pass, regardless of which strategy won
    pub crop_label: Option<CropType>,
    pub method: String,
    pub candidates: Vec<DetectionCandidate>,
}

/// What one strategy produced.
#[derive(Debug, Default)]
struct StrategyOutcome {
    candidate: Option<DetectionCandidate>,
    label: Option<CropType>,
}

/// Picks the reported candidate.
///
/// The first non-zero candidate in priority order wins. A zero reading is
/// only used when nothing else was found.
pub fn choose_candidate(candidates: &[DetectionCandidate]) -> Option<&DetectionCandidate> {
    candidates
        .iter()
        .find(|c| c.percentage > 0.0)
        .or_else(|| candidates.first())
}

pub struct Detector<E> {
    engine: E,
    strategies: Vec<Strategy>,
    sink: Arc<dyn DiagnosticSink>,
    save_artifacts: bool,
}

impl<E: OcrEngine> Detector<E> {
    pub fn new(engine: E, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            engine,
            strategies: default_strategies(),
            sink,
            save_artifacts: true,
        }
    }

    /// Controls whether preprocessed images are sent to the sink.
    pub fn with_artifacts(mut self, save: bool) -> Self {
        self.save_artifacts = save;
        self
    }

    /// Detects percentage and crop label.
    pub fn detect(&self, image: &DynamicImage) -> Option<Detection> {
        self.detect_with(image, true)
    }

    /// Detects the percentage, and the crop label when `want_label` is set.
    ///
    /// Strategies run strictly in sequence. Once a non-zero candidate is held
    /// (and a label, if wanted), the remaining strategies are skipped.
    pub fn detect_with(&self, image: &DynamicImage, want_label: bool) -> Option<Detection> {
        let mut candidates: Vec<DetectionCandidate> = Vec::new();
        let mut crop_label: Option<CropType> = None;

        for strategy in &self.strategies {
            let outcome = self.run_strategy(strategy, image);
            if crop_label.is_none() {
                crop_label = outcome.label;
            }
            if let Some(candidate) = outcome.candidate {
                candidates.push(candidate);
            }

            let has_nonzero = candidates.iter().any(|c| c.percentage > 0.0);
            if has_nonzero && (crop_label.is_some() || !want_label) {
                break;
            }
        }

        let Some(chosen) = choose_candidate(&candidates).cloned() else {
            self.sink.record(&DiagnosticEvent::FinalResult {
                percentage: None,
                method: None,
            });
            return None;
        };

        self.sink.record(&DiagnosticEvent::FinalResult {
            percentage: Some(chosen.percentage),
            method: Some(&chosen.method),
        });

        Some(Detection {
            percentage: chosen.percentage,
            crop_label: if want_label { crop_label } else { None },
            method: chosen.method,
            candidates,
        })
    }

    fn run_strategy(&self, strategy: &Strategy, image: &DynamicImage) -> StrategyOutcome {
        let processed = strategy.preprocess.apply(image);
        if self.save_artifacts {
            let tag = format!("ocr_{}", strategy.name);
            self.sink.record(&DiagnosticEvent::Artifact {
                tag: &tag,
                image: &processed,
            });
        }

        let mut texts: Vec<String> = Vec::new();
        let mut accepted: Option<usize> = None;

        for config in &strategy.configs {
            let output = self.engine.recognize(&processed, config);
            self.sink.record(&DiagnosticEvent::OcrPass {
                strategy: strategy.name,
                config,
                text: &output.text,
                error: output.error.as_deref(),
            });

            if output.is_failed() || output.text.trim().is_empty() {
                continue;
            }
            let found_percent = has_percent_sign(&output.text);
            texts.push(output.text);
            if found_percent {
                accepted = Some(texts.len() - 1);
                break;
            }
        }

        let label = texts.iter().find_map(|t| extract_crop_label(t));

        let percent_text = accepted
            .map(|i| texts[i].as_str())
            .or_else(|| texts.last().map(String::as_str));
        let percentages = percent_text.map(extract_percentages).unwrap_or_default();
        self.sink.record(&DiagnosticEvent::Percentages {
            strategy: strategy.name,
            values: &percentages,
        });

        StrategyOutcome {
            candidate: smallest(&percentages).map(|percentage| DetectionCandidate {
                method: strategy.name.to_string(),
                percentage,
                crop_label: label,
            }),
            label,
        }
    }
}
