//! Capture → detect → plan, and the guard against overlapping detections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::capture::{ScreenCapture, capture_with_retry};
use crate::config::{Preferences, ScreenRect};
use crate::crop::{CropType, PlanterType};
use crate::diagnostics::DiagnosticSink;
use crate::ocr::{Detection, Detector, OcrEngine};
use crate::timer::StageMachine;
use crate::timer::duration::remaining_seconds;

/// What the timer should be started with.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerPlan {
    pub seconds: u32,
    /// Detected growth, or 0 after a failed detection
    pub percentage: f64,
    pub crop: CropType,
    pub planter: PlanterType,
    /// True when no percentage was detected and 0% was assumed
    pub fell_back: bool,
    pub method: Option<String>,
}

impl TimerPlan {
    pub fn start_on(&self, machine: &mut StageMachine) {
        machine.start(self.seconds, self.crop, self.planter);
    }
}

impl std::fmt::Display for TimerPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) at {}% -> {:02}:{:02}",
            self.crop.display_name(),
            self.planter.display_name(),
            self.percentage,
            self.seconds / 60,
            self.seconds % 60
        )?;
        match (&self.method, self.fell_back) {
            (_, true) => write!(f, " [no detection, default timer]"),
            (Some(method), false) => write!(f, " [{}]", method),
            (None, false) => Ok(()),
        }
    }
}

/// Turns a detection result into a timer plan.
///
/// A detected crop label replaces the configured crop when auto-detection is
/// on. Without a detection the plan assumes 0% grown.
pub fn plan_timer(detection: Option<&Detection>, prefs: &Preferences) -> TimerPlan {
    let crop = detection
        .and_then(|d| d.crop_label)
        .filter(|_| prefs.auto_detect_crop)
        .unwrap_or(prefs.crop_type);
    let percentage = detection.map_or(0.0, |d| d.percentage);

    TimerPlan {
        seconds: remaining_seconds(percentage, crop, prefs.planter_type),
        percentage,
        crop,
        planter: prefs.planter_type,
        fell_back: detection.is_none(),
        method: detection.map(|d| d.method.clone()),
    }
}

/// Captures the configured area, runs detection and plans the timer.
///
/// Never fails: a capture or detection failure yields the 0% plan.
pub fn detect_and_plan<E: OcrEngine>(
    source: &dyn ScreenCapture,
    area: Option<ScreenRect>,
    detector: &Detector<E>,
    prefs: &Preferences,
    sink: &dyn DiagnosticSink,
) -> TimerPlan {
    let detection = capture_with_retry(source, area, sink)
        .and_then(|image| detector.detect_with(&image, prefs.auto_detect_crop));
    plan_timer(detection.as_ref(), prefs)
}

/// Allows one detection at a time.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    busy: AtomicBool,
}

impl InFlightGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the guard. `None` while another token is alive.
    pub fn try_begin(self: &Arc<Self>) -> Option<InFlightToken> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(InFlightToken {
            guard: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct InFlightToken {
    guard: Arc<InFlightGuard>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopSink;
    use crate::ocr::engine::{OcrConfig, OcrText};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Mutex;

    struct FixedSource(Option<DynamicImage>);

    impl ScreenCapture for FixedSource {
        fn capture_region(&self, _rect: ScreenRect) -> Option<DynamicImage> {
            self.0.clone()
        }

        fn capture_full_screen(&self) -> Option<DynamicImage> {
            self.0.clone()
        }
    }

    struct BrokenEngine;

    impl OcrEngine for BrokenEngine {
        fn recognize(&self, _image: &DynamicImage, _config: &OcrConfig) -> OcrText {
            OcrText::failed("tesseract not found")
        }
    }

    /// Answers the first call, then reads nothing.
    struct OnceEngine(Mutex<Option<String>>);

    impl OcrEngine for OnceEngine {
        fn recognize(&self, _image: &DynamicImage, _config: &OcrConfig) -> OcrText {
            match self.0.lock().unwrap().take() {
                Some(text) => OcrText::ok(text),
                None => OcrText::default(),
            }
        }
    }

    fn screen() -> FixedSource {
        FixedSource(Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            20,
            8,
            Rgb([10, 10, 10]),
        ))))
    }

    fn detection(percentage: f64, label: Option<CropType>) -> Detection {
        Detection {
            percentage,
            crop_label: label,
            method: "enhanced".to_string(),
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_detected_label_overrides_crop() {
        let prefs = Preferences {
            crop_type: CropType::Marijuana,
            planter_type: PlanterType::Basic,
            auto_detect_crop: true,
        };
        let plan = plan_timer(Some(&detection(7.0, Some(CropType::Coca))), &prefs);
        assert_eq!(plan.crop, CropType::Coca);
        // 38 * 60 * 0.93 = 2120.4
        assert_eq!(plan.seconds, 2120);
        assert!(!plan.fell_back);
        assert_eq!(plan.method.as_deref(), Some("enhanced"));
    }

    #[test]
    fn test_label_ignored_without_auto_detect() {
        let prefs = Preferences {
            crop_type: CropType::Marijuana,
            planter_type: PlanterType::Basic,
            auto_detect_crop: false,
        };
        let plan = plan_timer(Some(&detection(7.0, Some(CropType::Coca))), &prefs);
        assert_eq!(plan.crop, CropType::Marijuana);
        // 19 * 60 * 0.93 = 1060.2
        assert_eq!(plan.seconds, 1060);
    }

    #[test]
    fn test_no_detection_falls_back_to_zero_percent() {
        let plan = plan_timer(None, &Preferences::default());
        assert_eq!(plan.seconds, 2280);
        assert_eq!(plan.percentage, 0.0);
        assert!(plan.fell_back);
        assert!(plan.to_string().contains("default timer"));
    }

    #[test]
    fn test_engine_failure_plans_default_timer() {
        let detector = Detector::new(BrokenEngine, Arc::new(NoopSink));
        let plan = detect_and_plan(
            &screen(),
            None,
            &detector,
            &Preferences::default(),
            &NoopSink,
        );
        assert!(plan.fell_back);
        assert_eq!(plan.seconds, 2280);
        assert_eq!(plan.crop, CropType::Coca);
    }

    #[test]
    fn test_capture_failure_plans_default_timer() {
        let detector = Detector::new(OnceEngine(Mutex::new(Some("50%".into()))), Arc::new(NoopSink));
        let plan = detect_and_plan(
            &FixedSource(None),
            Some(ScreenRect::default()),
            &detector,
            &Preferences::default(),
            &NoopSink,
        );
        assert!(plan.fell_back);
        assert_eq!(plan.seconds, 2280);
    }

    #[test]
    fn test_detect_and_plan_uses_label() {
        let detector = Detector::new(
            OnceEngine(Mutex::new(Some("Cannabis 50%".into()))),
            Arc::new(NoopSink),
        );
        let prefs = Preferences {
            planter_type: PlanterType::PlanterBox,
            ..Preferences::default()
        };
        let plan = detect_and_plan(&screen(), None, &detector, &prefs, &NoopSink);
        assert_eq!(plan.crop, CropType::Marijuana);
        assert_eq!(plan.percentage, 50.0);
        assert_eq!(plan.seconds, 540);
    }

    #[test]
    fn test_in_flight_guard() {
        let guard = InFlightGuard::new();
        let token = guard.try_begin();
        assert!(token.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_begin().is_none());

        drop(token);
        assert!(!guard.is_busy());
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn test_in_flight_guard_released_by_panicking_worker() {
        let guard = InFlightGuard::new();
        let token = guard.try_begin().unwrap();
        let worker = std::thread::spawn(move || {
            let _token = token;
            panic!("detection worker died");
        });
        assert!(worker.join().is_err());
        assert!(!guard.is_busy());
    }
}
