//! Always-on-top overlay showing the crop timer.
//!
//! The overlay is the passive display sink of the stage machine. Detection
//! runs on a worker thread; its plan comes back over a channel and the UI
//! thread starts the timer.

pub mod render;
pub mod state;

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Vec2};

use crate::capture;
use crate::config::AppConfig;
use crate::diagnostics::DiagnosticSink;
use crate::launch::{InFlightGuard, TimerPlan, detect_and_plan};
use crate::ocr::{Detector, TesseractEngine};
use crate::timer::{StageMachine, TimerUpdate};

use render::Actions;
use state::{DetectionStatus, GuiState, background_color};

pub struct OverlayApp {
    state: GuiState,
    machine: StageMachine,
    detector: Arc<Detector<TesseractEngine>>,
    sink: Arc<dyn DiagnosticSink>,
    guard: Arc<InFlightGuard>,
    updates: Receiver<TimerUpdate>,
    plans_tx: Sender<TimerPlan>,
    plans_rx: Receiver<TimerPlan>,
}

impl OverlayApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        detector: Detector<TesseractEngine>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel();
        let ctx = cc.egui_ctx.clone();
        let machine = StageMachine::new(
            move |update: &TimerUpdate| {
                let _ = updates_tx.send(update.clone());
                ctx.request_repaint();
            },
            sink.clone(),
        );
        let (plans_tx, plans_rx) = mpsc::channel();

        Self {
            state: GuiState::new(config),
            machine,
            detector: Arc::new(detector),
            sink,
            guard: InFlightGuard::new(),
            updates: updates_rx,
            plans_tx,
            plans_rx,
        }
    }

    /// Starts a detection on a worker thread unless one is in flight.
    fn handle_detect(&mut self, ctx: &egui::Context) {
        let Some(token) = self.guard.try_begin() else {
            crate::log("GUI: Detection already running");
            return;
        };
        self.state.status = DetectionStatus::Detecting;

        let config = &self.state.config;
        let source = capture::source_for(config);
        let area = config.capture_area();
        let prefs = config.preferences;
        let detector = self.detector.clone();
        let sink = self.sink.clone();
        let tx = self.plans_tx.clone();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let _token = token;
            let plan = detect_and_plan(
                source.as_ref(),
                area,
                detector.as_ref(),
                &prefs,
                sink.as_ref(),
            );
            let _ = tx.send(plan);
            ctx.request_repaint();
        });
    }

    fn poll_plans(&mut self) {
        while let Ok(plan) = self.plans_rx.try_recv() {
            crate::log(&format!("GUI: Starting timer: {}", plan));
            self.state.detected_percent = plan.percentage;
            self.state.last_alert = None;
            plan.start_on(&mut self.machine);
            self.state.status = DetectionStatus::Planned(plan);
        }
    }

    fn poll_updates(&mut self) {
        while let Ok(update) = self.updates.try_recv() {
            if let Some(alert) = update.alerts.last() {
                self.state.last_alert = Some(*alert);
            }
            self.state.last_label = Some(update.label);
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.state.config.save(&crate::paths::get_config_path()) {
            crate::log(&format!("GUI: Failed to save config: {}", e));
        }
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let worker_busy = self.guard.is_busy();
        self.poll_plans();
        if self.state.settle_detection(worker_busy) {
            crate::log("GUI: Detection worker ended without a plan");
        }
        self.poll_updates();

        let snapshot = self.machine.snapshot();
        let running = self.machine.is_running();
        if running {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        let mut actions = Actions::default();
        let frame = egui::Frame::default()
            .fill(background_color(snapshot.stage, snapshot.time_left))
            .inner_margin(8.0);

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            render::render_timer(ui, &self.state, &snapshot);
            ui.add_space(4.0);
            render::render_controls(ui, &mut self.state, running, &mut actions);
            if self.state.show_settings {
                render::render_settings(ui, &mut self.state, &mut actions);
            }
        });

        if actions.detect {
            self.handle_detect(ctx);
        }
        if actions.stop {
            self.machine.stop();
        }
        if actions.reset {
            self.state.last_alert = None;
            self.machine.reset();
        }
        if actions.settings_changed {
            self.save_settings();
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }
}

/// Runs the overlay. Blocks until the window is closed.
pub fn run_gui(
    config: AppConfig,
    detector: Detector<TesseractEngine>,
    sink: Arc<dyn DiagnosticSink>,
) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(280.0, 170.0))
            .with_min_inner_size(Vec2::new(220.0, 120.0))
            .with_title("Coca Timer")
            .with_always_on_top()
            .with_transparent(true),
        ..Default::default()
    };

    crate::log("GUI: Starting overlay");
    eframe::run_native(
        "Coca Timer",
        options,
        Box::new(|cc| Ok(Box::new(OverlayApp::new(cc, config, detector, sink)))),
    )
}
