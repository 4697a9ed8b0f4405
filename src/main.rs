//! Coca Timer
//!
//! Reads a crop's growth percentage from a screen region with OCR, works out
//! how long the crop still has to grow, and counts down through the ready,
//! flowering and seeding stages in a small always-on-top overlay.

// Hide console window on Windows for GUI builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod capture;
mod config;
mod crop;
mod diagnostics;
mod gui;
mod launch;
mod ocr;
mod paths;
mod timer;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::AppConfig;
use diagnostics::{DiagnosticSink, FileSink};
use ocr::{Detector, OcrEngine, TesseractEngine};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("coca_timer.log");
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("coca_timer.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories()?;

    let engine = match ocr::ensure_tesseract() {
        Ok(found) => TesseractEngine::from_paths(&found),
        Err(e) => {
            log(&format!("Warning: Tesseract executable not found: {}", e));
            log("Detection will fall back to the default timer.");
            TesseractEngine::new(PathBuf::from("tesseract"), None)
        }
    };

    let config = AppConfig::load(&paths::get_config_path());
    let artifacts_dir = config
        .save_debug_artifacts
        .then(paths::get_screenshots_dir);
    let sink: Arc<dyn DiagnosticSink> = Arc::new(FileSink::new(artifacts_dir));
    let detector =
        Detector::new(engine, sink.clone()).with_artifacts(config.save_debug_artifacts);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => gui::run_gui(config, detector, sink).map_err(|e| anyhow!("GUI error: {}", e)),
        [command, image] if command == "detect" => run_detect(Path::new(image), &detector, &config),
        _ => Err(anyhow!("Usage: coca-timer [detect <image>]")),
    }
}

/// Runs detection on an image file and prints the resulting timer plan.
fn run_detect<E: OcrEngine>(
    image: &Path,
    detector: &Detector<E>,
    config: &AppConfig,
) -> Result<()> {
    let img = image::open(image).with_context(|| format!("Failed to open {}", image.display()))?;
    log(&format!(
        "Detecting on {} ({}x{})",
        image.display(),
        img.width(),
        img.height()
    ));

    let prefs = config.preferences;
    let detection = detector.detect_with(&img, prefs.auto_detect_crop);
    match &detection {
        Some(d) => {
            log(&format!("Percentage: {}% via {}", d.percentage, d.method));
            match d.crop_label {
                Some(label) => log(&format!("Crop label: {}", label.display_name())),
                None => log("Crop label: none"),
            }
            for candidate in &d.candidates {
                log(&format!("  candidate {}: {}%", candidate.method, candidate.percentage));
            }
        }
        None => log("No percentage detected"),
    }

    let plan = launch::plan_timer(detection.as_ref(), &prefs);
    log(&format!("Timer: {}", plan));
    Ok(())
}
