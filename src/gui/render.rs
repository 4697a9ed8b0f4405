//! Overlay layout.

use eframe::egui::{self, Color32, RichText};

use super::state::{GuiState, alert_text};
use crate::crop::{CropType, PlanterType};
use crate::timer::TimerSnapshot;

/// Which controls were clicked this frame.
#[derive(Debug, Default)]
pub struct Actions {
    pub detect: bool,
    pub stop: bool,
    pub reset: bool,
    pub settings_changed: bool,
}

/// Crop, stage, countdown and live growth.
pub fn render_timer(ui: &mut egui::Ui, state: &GuiState, snapshot: &TimerSnapshot) {
    ui.horizontal(|ui| {
        ui.label(RichText::new(snapshot.crop.display_name()).strong().size(16.0));
        let label = state.last_label.unwrap_or(snapshot.stage.label());
        ui.label(RichText::new(label).size(16.0));
    });

    ui.label(
        RichText::new(snapshot.time_left.to_string())
            .size(32.0)
            .monospace()
            .color(Color32::WHITE),
    );

    let growth = snapshot.growth_percent(state.detected_percent);
    ui.add(egui::ProgressBar::new((growth / 100.0) as f32).text(format!("{:.1}%", growth)));

    if let Some(alert) = state.last_alert {
        ui.label(RichText::new(alert_text(alert)).strong());
    }
    ui.label(RichText::new(state.status.status_text()).small());
}

/// Detect & Start, Stop, Reset and the settings toggle.
pub fn render_controls(
    ui: &mut egui::Ui,
    state: &mut GuiState,
    running: bool,
    actions: &mut Actions,
) {
    ui.horizontal(|ui| {
        ui.add_enabled_ui(!state.status.is_detecting(), |ui| {
            if ui.button("▶ Detect & Start").clicked() {
                actions.detect = true;
            }
        });
        ui.add_enabled_ui(running, |ui| {
            if ui.button("◼ Stop").clicked() {
                actions.stop = true;
            }
        });
        if ui.button("⟲ Reset").clicked() {
            actions.reset = true;
        }
        ui.toggle_value(&mut state.show_settings, "⚙");
    });
}

/// Preferences and capture area. Sets `settings_changed` on any edit.
pub fn render_settings(ui: &mut egui::Ui, state: &mut GuiState, actions: &mut Actions) {
    let mut changed = false;
    let prefs = &mut state.config.preferences;

    ui.separator();
    egui::ComboBox::from_label("Crop")
        .selected_text(prefs.crop_type.display_name())
        .show_ui(ui, |ui| {
            for crop in CropType::ALL {
                changed |= ui
                    .selectable_value(&mut prefs.crop_type, crop, crop.display_name())
                    .changed();
            }
        });
    egui::ComboBox::from_label("Planter")
        .selected_text(prefs.planter_type.display_name())
        .show_ui(ui, |ui| {
            for planter in PlanterType::ALL {
                changed |= ui
                    .selectable_value(&mut prefs.planter_type, planter, planter.display_name())
                    .changed();
            }
        });
    changed |= ui
        .checkbox(&mut prefs.auto_detect_crop, "Detect crop from label")
        .changed();

    let mut area = state.config.selected_area.unwrap_or_default();
    let mut area_changed = false;
    ui.horizontal(|ui| {
        ui.label("Area");
        area_changed |= ui.add(egui::DragValue::new(&mut area.x).prefix("x ")).changed();
        area_changed |= ui.add(egui::DragValue::new(&mut area.y).prefix("y ")).changed();
    });
    ui.horizontal(|ui| {
        ui.label("Size");
        area_changed |= ui
            .add(egui::DragValue::new(&mut area.width).range(0..=8192).prefix("w "))
            .changed();
        area_changed |= ui
            .add(egui::DragValue::new(&mut area.height).range(0..=8192).prefix("h "))
            .changed();
    });
    if area_changed {
        state.config.selected_area = Some(area);
        changed = true;
    }
    if state.config.selected_area.is_some() && state.config.capture_area().is_none() {
        ui.label(RichText::new("Empty area, full screen will be captured").small());
    }

    actions.settings_changed |= changed;
}
