use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::model::FilterField;
use crate::data::views::ViewSection;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – section navigation and filter widgets
// ---------------------------------------------------------------------------

/// Render the navigation radio and the per-dimension filter multiselects.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Dashboard Navigation");
    ui.separator();

    for section in ViewSection::ALL {
        if ui
            .radio(state.section == section, section.label())
            .clicked()
        {
            state.set_section(section);
        }
    }

    ui.add_space(8.0);
    ui.heading("Filters");
    ui.separator();

    let Some(table) = &state.table else {
        ui.label("No dataset loaded.");
        return;
    };

    // Clone the value index so we can mutate state inside the loop.
    let unique = table.unique_values.clone();
    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for field in FilterField::ALL {
                let Some(all_values) = unique.get(&field) else {
                    continue;
                };

                let selected = state.filters.entry(field).or_default();
                let header_text = if selected.is_empty() {
                    format!("{} (all)", field.label())
                } else {
                    format!("{} ({}/{})", field.label(), selected.len(), all_values.len())
                };

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(field.label())
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(field);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(field);
                            }
                        });

                        // Re-borrow after potential mutation from All/None.
                        let selected = state.filters.entry(field).or_default();
                        for value in all_values {
                            let mut checked = selected.contains(value);
                            if ui.checkbox(&mut checked, value).changed() {
                                if checked {
                                    selected.insert(value.clone());
                                } else {
                                    selected.remove(value);
                                }
                                changed = true;
                            }
                        }
                    });
            }
        });

    // One recomputation pass per interaction, not per frame.
    if changed {
        state.recompute();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(table) = &state.table {
            ui.label(format!(
                "{} observations loaded, {} visible",
                table.len(),
                state.visible_indices.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open observation data")
        .add_filter("Supported files", &["db", "sqlite", "sqlite3", "csv", "json"])
        .add_filter("SQLite database", &["db", "sqlite", "sqlite3"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_file(&path) {
            Ok(table) => {
                log::info!("Loaded {} observations from {}", table.len(), path.display());
                state.set_table(table);
            }
            Err(e) => {
                log::error!("Failed to load file: {e}");
                state.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}
