// src/gui.rs
use eframe::egui;
use egui::{Color32, Pos2, Rounding, Shape, Stroke, Vec2};
use egui_plot::{Line, Plot, PlotPoints};
use log::{info, warn};

use crate::config::MonitorConfig;
use crate::monitor::{
    FrameToken, ParameterModel, SegmentField, SegmentOverrides, SweepRenderer, WaveformSynthesizer,
};
use crate::types::{DisplayGeometry, Point, Scene, SweepPhase};

const MAX_LOG_LINES: usize = 8;

pub struct MonitorApp {
    // 表单中正在编辑的参数 (点击 Apply 之前不生效)
    draft: MonitorConfig,
    renderer: SweepRenderer,
    // 下一帧的许可 (apply 或 teardown 之后自动失效)
    pending_frame: Option<FrameToken>,
    log_messages: Vec<String>,
}

impl MonitorApp {
    pub fn new(config: MonitorConfig, model: ParameterModel, geometry: DisplayGeometry) -> Self {
        let renderer = SweepRenderer::new(model, geometry);
        let pending_frame = renderer.request_frame().ok();
        Self {
            draft: config,
            renderer,
            pending_frame,
            log_messages: vec!["ECG monitor ready.".to_owned()],
        }
    }

    fn log(&mut self, msg: &str) {
        info!("{msg}");
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > MAX_LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    /// Validate the draft and hand it to the renderer.
    fn apply_draft(&mut self) {
        let model = match ParameterModel::commit(&self.draft) {
            Ok(model) => model,
            Err(err) => {
                warn!("rejected parameters: {err}");
                self.log(&format!("Invalid: {err}"));
                return;
            }
        };
        let bpm = model.heart_rate.effective_bpm();
        match self.renderer.apply(model) {
            Ok(()) => {
                self.pending_frame = self.renderer.request_frame().ok();
                let generation = self.renderer.generation();
                self.log(&format!("Applied: {:.0} bpm (generation {})", bpm, generation));
            }
            Err(err) => self.log(&format!("Apply failed: {err}")),
        }
    }

    /// Seed the list from the current draft shape. Only allowed while empty.
    fn add_custom_beat(&mut self) -> bool {
        if !self.draft.custom_beats.is_empty() {
            return false;
        }
        self.draft
            .custom_beats
            .push(SegmentOverrides::from(self.draft.segments));
        true
    }

    fn remove_custom_beat(&mut self, index: usize) {
        if index < self.draft.custom_beats.len() {
            self.draft.custom_beats.remove(index);
            self.draft.custom_beats_enabled = false;
        }
    }

    fn tick(&mut self, now_secs: f64) {
        let Some(token) = self.pending_frame.take() else {
            return;
        };
        match self.renderer.on_frame(token, now_secs) {
            Ok(report) => {
                if report.entered_steady_state {
                    self.log("First sweep complete");
                }
            }
            Err(err) => warn!("frame dropped: {err}"),
        }
        self.pending_frame = self.renderer.request_frame().ok();
    }

    fn draw_form(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("rate_grid").num_columns(2).show(ui, |ui| {
            ui.label("Heart Rate (bpm)");
            ui.add(
                egui::DragValue::new(&mut self.draft.heart_rate_bpm)
                    .speed(1.0)
                    .clamp_range(0.0..=600.0),
            );
            ui.end_row();
            ui.label("Pixels per mV");
            ui.add(
                egui::DragValue::new(&mut self.draft.pixels_per_mv)
                    .speed(1.0)
                    .clamp_range(1.0..=1000.0),
            );
            ui.end_row();
        });

        ui.collapsing("Wave Segments", |ui| {
            egui::Grid::new("segment_grid")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui| {
                    for field in SegmentField::ALL {
                        ui.label(field.title());
                        ui.add(segment_drag(self.draft.segments.get_mut(field), field));
                        ui.end_row();
                    }
                    ui.label("P Pulses (n_p)");
                    let mut n_p = self.draft.segments.nominal_p_count();
                    if ui
                        .add(egui::DragValue::new(&mut n_p).clamp_range(1..=10))
                        .changed()
                    {
                        self.draft.segments.n_p = Some(n_p);
                    }
                    ui.end_row();
                });
        });

        ui.collapsing("Beat Patterns", |ui| {
            for (name, rule) in [("R", &mut self.draft.r_wave), ("P", &mut self.draft.p_wave)] {
                ui.checkbox(&mut rule.enabled, format!("{name} wave pattern"));
                ui.add_enabled_ui(rule.enabled, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("count");
                        ui.add(egui::DragValue::new(&mut rule.override_count).clamp_range(1..=10));
                        ui.label("every");
                        ui.add(egui::DragValue::new(&mut rule.every_n_beats).clamp_range(1..=100));
                        ui.label("beats");
                    });
                });
            }
        });

        ui.collapsing("Custom Beats", |ui| {
            ui.checkbox(&mut self.draft.custom_beats_enabled, "Enable custom sequence");
            ui.horizontal(|ui| {
                ui.label("Repeat every");
                ui.add(egui::DragValue::new(&mut self.draft.repeat_interval).clamp_range(0..=100));
                ui.label("normal beats");
            });
            let mut remove = None;
            for (index, beat) in self.draft.custom_beats.iter_mut().enumerate() {
                ui.collapsing(format!("Custom Beat {}", index + 1), |ui| {
                    egui::Grid::new(("custom_grid", index))
                        .num_columns(2)
                        .show(ui, |ui| {
                            for field in SegmentField::ALL {
                                if let Some(value) = beat.get_mut(field) {
                                    ui.label(field.title());
                                    ui.add(segment_drag(value, field));
                                    ui.end_row();
                                }
                            }
                            ui.label("P Pulses (n_p)");
                            let mut n_p = beat.n_p.filter(|&n| n > 0).unwrap_or(1);
                            if ui
                                .add(egui::DragValue::new(&mut n_p).clamp_range(1..=10))
                                .changed()
                            {
                                beat.n_p = Some(n_p);
                            }
                            ui.end_row();
                        });
                    if ui.button("Remove").clicked() {
                        remove = Some(index);
                    }
                });
            }
            if let Some(index) = remove {
                self.remove_custom_beat(index);
                self.log(&format!("Removed custom beat {}", index + 1));
            }
            let can_add = self.draft.custom_beats.is_empty();
            if ui
                .add_enabled(can_add, egui::Button::new("+ Add Custom Beat"))
                .clicked()
                && self.add_custom_beat()
            {
                self.log("Added custom beat");
            }
        });
    }

    fn draw_preview(&self, ui: &mut egui::Ui) {
        let model = match ParameterModel::commit(&self.draft) {
            Ok(model) => model,
            Err(err) => {
                ui.label(egui::RichText::new(err.to_string()).color(Color32::YELLOW).small());
                return;
            }
        };
        let points: Vec<[f64; 2]> = WaveformSynthesizer::new(&model)
            .preview_beat(&model)
            .into_iter()
            .map(|s| [s.time, s.amplitude_mv])
            .collect();
        Plot::new("beat_preview")
            .height(160.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .include_y(-0.5)
            .include_y(1.5)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(points))
                        .name("mV")
                        .color(Color32::from_rgb(0, 255, 255)),
                );
            });
    }
}

fn segment_drag(value: &mut f64, field: SegmentField) -> egui::DragValue<'_> {
    let drag = egui::DragValue::new(value).speed(field.step()).max_decimals(3);
    if field.is_duration() {
        drag.clamp_range(0.0..=2.0).suffix(" s")
    } else {
        drag.clamp_range(-5.0..=5.0).suffix(" mV")
    }
}

// 在 egui 画布上绘制监护仪画面
fn paint_scene(ui: &mut egui::Ui, scene: &Scene) {
    let size = Vec2::new(scene.geometry.width as f32, scene.geometry.height as f32);
    let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
    let rect = response.rect;
    let to_screen = |p: Point| Pos2::new(rect.min.x + p.x as f32, rect.min.y + p.y as f32);

    painter.rect_filled(rect, Rounding::same(0.0), Color32::WHITE);

    let grid = Stroke::new(1.0, Color32::from_rgb(0xee, 0xee, 0xee));
    let pitch = scene.grid_pitch.max(1.0) as f32;
    let mut x = rect.min.x;
    while x <= rect.max.x {
        painter.line_segment([Pos2::new(x, rect.min.y), Pos2::new(x, rect.max.y)], grid);
        x += pitch;
    }
    let mut y = rect.min.y;
    while y <= rect.max.y {
        painter.line_segment([Pos2::new(rect.min.x, y), Pos2::new(rect.max.x, y)], grid);
        y += pitch;
    }

    let trace = Stroke::new(2.0, Color32::from_rgb(0x2c, 0x3e, 0x50));
    for run in &scene.trace {
        painter.add(Shape::line(run.iter().map(|&p| to_screen(p)).collect(), trace));
    }

    if let Some(pointer) = scene.pointer {
        painter.circle(
            to_screen(pointer),
            scene.pointer_radius as f32,
            Color32::WHITE,
            Stroke::new(1.0, Color32::BLACK),
        );
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 用帧时间戳推进扫描
        let now = ctx.input(|i| i.time);
        self.tick(now);
        if self.pending_frame.is_some() {
            ctx.request_repaint();
        }

        // 2. UI 绘制
        ctx.set_visuals(egui::Visuals::dark());

        egui::SidePanel::left("L").min_width(320.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("ECG Monitor");
            ui.label("Sweeping trace simulator");
            ui.separator();

            egui::ScrollArea::vertical()
                .max_height((ui.available_height() - 320.0).max(120.0))
                .show(ui, |ui| self.draw_form(ui));

            ui.separator();
            if ui.button("Apply Changes").clicked() {
                self.apply_draft();
            }

            ui.add_space(10.0);
            ui.label("BEAT PREVIEW");
            self.draw_preview(ui);

            ui.add_space(10.0);
            egui::ScrollArea::vertical()
                .id_source("log")
                .max_height(100.0)
                .show(ui, |ui| {
                    for m in &self.log_messages {
                        ui.monospace(m);
                    }
                });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let phase = match self.renderer.phase() {
                    SweepPhase::FirstSweep => "first sweep",
                    SweepPhase::SteadyState => "steady state",
                };
                ui.label(
                    egui::RichText::new(format!(
                        "{:.0} bpm | {} at {:.0}px | sweeps {} | beats {}",
                        self.renderer.model().heart_rate.effective_bpm(),
                        phase,
                        self.renderer.state().pointer_position,
                        self.renderer.sweeps(),
                        self.renderer.beats_consumed()
                    ))
                    .strong(),
                );
            });
            egui::ScrollArea::both().show(ui, |ui| {
                paint_scene(ui, &self.renderer.scene());
            });
        });
    }
}

impl Drop for MonitorApp {
    fn drop(&mut self) {
        self.pending_frame = None;
        self.renderer.teardown();
    }
}
