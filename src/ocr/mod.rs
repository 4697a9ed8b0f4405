//! Percentage and crop-label detection.
//!
//! preprocess → engine (per config) → extract → detector picks the answer.

pub mod detector;
pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;
pub mod strategy;

pub use detector::{Detection, Detector};
pub use engine::{OcrEngine, TesseractEngine};
pub use setup::ensure_tesseract;
