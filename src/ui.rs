use egui::load::SizedTexture;

use crate::controller::{PauseLabel, RunController};
use crate::settings::{Color, Speed, ARC_COLORS, BACKGROUND_COLORS, POINT_COLORS};

const HELP_TEXT: &str = "This is a PI estimator using the Monte Carlo method.\n\
In the bottom left corner you can see the current PI estimation.\n\
You can choose point, arc and background colors and RESTART the whole\n\
process by clicking the DRAW button. You can PAUSE and CONTINUE the\n\
current run by clicking the PAUSE button.";

pub struct UiState {
    pub show_ui: bool,
    pub show_help: bool,
    pub quit_requested: bool,
    pub pause_label: PauseLabel,
    pub speed: Speed,
    arc_choice: usize,
    point_choice: usize,
    background_choice: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_ui: true,
            show_help: false,
            quit_requested: false,
            pause_label: PauseLabel::Pause,
            speed: Speed::Fast,
            arc_choice: 0,
            point_choice: 0,
            background_choice: 0,
        }
    }
}

pub fn draw_ui(
    ctx: &egui::Context,
    ui_state: &mut UiState,
    controller: &RunController,
    scene: &egui::TextureHandle,
    estimate: &str,
) {
    egui::TopBottomPanel::top("menu").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                ui.menu_button("Speed", |ui| {
                    for speed in Speed::ALL {
                        if ui.radio(ui_state.speed == speed, speed.name()).clicked() {
                            ui_state.speed = speed;
                            controller.set_speed(speed.delay_ms());
                            ui.close_menu();
                        }
                    }
                });
                ui.separator();
                if ui.add(egui::Button::new("Help").shortcut_text("Ctrl+H")).clicked() {
                    ui_state.show_help = true;
                    ui.close_menu();
                }
                ui.separator();
                if ui.add(egui::Button::new("Quit").shortcut_text("Ctrl+E")).clicked() {
                    ui_state.quit_requested = true;
                    ui.close_menu();
                }
            });
        });
    });

    if ui_state.show_ui {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(estimate).strong().size(15.0));

                if let Some(color) =
                    color_list(ui, "Points", &POINT_COLORS, &mut ui_state.point_choice)
                {
                    controller.set_point_color(color);
                }
                if let Some(color) = color_list(ui, "Arc", &ARC_COLORS, &mut ui_state.arc_choice) {
                    controller.set_arc_color(color);
                }
                if let Some(color) = color_list(
                    ui,
                    "Background",
                    &BACKGROUND_COLORS,
                    &mut ui_state.background_choice,
                ) {
                    controller.set_background_color(color);
                }

                if ui.button("Draw").clicked() {
                    if controller.is_paused() {
                        ui_state.pause_label = controller.resume();
                    }
                    if let Err(e) = controller.start() {
                        log::error!("{e}");
                    }
                }
                let pause = egui::Button::new(ui_state.pause_label.as_str());
                if ui.add_enabled(controller.is_running(), pause).clicked() {
                    ui_state.pause_label = controller.toggle_pause();
                }
            });
        });
    }

    egui::CentralPanel::default()
        .frame(egui::Frame::default())
        .show(ctx, |ui| {
            ui.add(egui::Image::from_texture(SizedTexture::from_handle(scene)));
        });

    egui::Window::new("Help")
        .open(&mut ui_state.show_help)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label(HELP_TEXT);
        });
}

/// Combo box over a palette. Returns the newly picked color.
fn color_list(
    ui: &mut egui::Ui,
    id: &str,
    choices: &[(&str, Color)],
    selected: &mut usize,
) -> Option<Color> {
    let before = *selected;
    egui::ComboBox::from_id_salt(id)
        .selected_text(choices[*selected].0)
        .show_ui(ui, |ui| {
            for (i, (name, _)) in choices.iter().enumerate() {
                ui.selectable_value(selected, i, *name);
            }
        });
    (*selected != before).then(|| choices[*selected].1)
}
