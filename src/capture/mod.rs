//! Screen capture collaborators.
//!
//! A source hands back an RGBA image of a screen region or of the whole
//! screen, or `None` when it cannot. Detection only sees the image.

pub mod file;
pub mod screen;

use image::DynamicImage;
use std::thread;
use std::time::Duration;

use crate::config::{AppConfig, ScreenRect};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};

pub use file::ImageFileCapture;
pub use screen::ScreenSource;

pub const CAPTURE_ATTEMPTS: u32 = 3;
pub const CAPTURE_BACKOFF: Duration = Duration::from_millis(100);

pub trait ScreenCapture: Send + Sync {
    fn capture_region(&self, rect: ScreenRect) -> Option<DynamicImage>;
    fn capture_full_screen(&self) -> Option<DynamicImage>;
}

/// Picks the configured image file when set, the live screen otherwise.
pub fn source_for(config: &AppConfig) -> Box<dyn ScreenCapture> {
    match &config.capture_source {
        Some(path) => Box::new(ImageFileCapture::new(path.clone())),
        None => Box::new(ScreenSource),
    }
}

/// Captures `area` (or the full screen), retrying a few times on failure.
pub fn capture_with_retry(
    source: &dyn ScreenCapture,
    area: Option<ScreenRect>,
    sink: &dyn DiagnosticSink,
) -> Option<DynamicImage> {
    let target = match area {
        Some(r) => format!("region {}x{} at ({}, {})", r.width, r.height, r.x, r.y),
        None => "full screen".to_string(),
    };

    for attempt in 1..=CAPTURE_ATTEMPTS {
        let image = match area {
            Some(rect) => source.capture_region(rect),
            None => source.capture_full_screen(),
        }
        .filter(|img| img.width() > 0 && img.height() > 0);

        sink.record(&DiagnosticEvent::Capture {
            attempt,
            success: image.is_some(),
            target: target.clone(),
        });
        if image.is_some() {
            return image;
        }
        if attempt < CAPTURE_ATTEMPTS {
            thread::sleep(CAPTURE_BACKOFF);
        }
    }
    None
}
