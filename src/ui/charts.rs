use eframe::egui::{
    self, Align2, Color32, CornerRadius, Pos2, Rect, RichText, ScrollArea, Sense, Stroke, Ui, Vec2,
};
use egui_plot::{Bar, BarChart as PlotBars, Legend, Line, Plot, PlotPoints, Points};

use crate::color::{generate_palette, heat_color};
use crate::data::error::DataError;
use crate::data::views::{
    BarChart, ChartData, HeatmapChart, LineChart, PieChart, ScatterChart, StackedBarChart, Summary,
    TableData,
};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Central panel – summary metrics and the current section's blocks
// ---------------------------------------------------------------------------

/// Render the dashboard body: summary row, then every block of the selected
/// section. All aggregation happened in the data layer; this only draws.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    let Some(table) = &state.table else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a data file to explore observations  (File → Open…)");
        });
        return;
    };
    if table.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("The loaded table contains no observations.");
        });
        return;
    }

    if state.empty_selection {
        ui.add_space(24.0);
        ui.vertical_centered(|ui: &mut Ui| {
            ui.label(
                RichText::new(DataError::EmptyResult.to_string())
                    .color(ui.visuals().warn_fg_color)
                    .size(16.0),
            );
        });
        return;
    }

    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading("Species Observation Analysis Dashboard");
    });
    ui.add_space(6.0);
    if let Some(summary) = &state.summary {
        summary_row(ui, summary);
    }
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (idx, block) in state.blocks.iter().enumerate() {
                ui.add_space(10.0);
                ui.strong(&block.title);
                ui.add_space(4.0);
                render_chart(ui, idx, &block.chart);
            }
            ui.add_space(16.0);
        });
}

fn summary_row(ui: &mut Ui, summary: &Summary) {
    let avg_temp = summary
        .avg_temperature
        .map(|t| format!("{t:.1}"))
        .unwrap_or_else(|| "–".to_owned());
    let most_common = summary
        .most_common_species
        .clone()
        .unwrap_or_else(|| "–".to_owned());
    ui.columns(4, |cols: &mut [Ui]| {
        metric(&mut cols[0], "Total Sightings", &summary.total_sightings.to_string());
        metric(&mut cols[1], "Unique Species", &summary.unique_species.to_string());
        metric(&mut cols[2], "Most Seen Species", &most_common);
        metric(&mut cols[3], "Avg Temp (°C)", &avg_temp);
    });
}

fn metric(ui: &mut Ui, label: &str, value: &str) {
    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.vertical(|ui: &mut Ui| {
            ui.label(label);
            ui.label(RichText::new(value).strong().size(18.0));
        });
    });
}

// ---------------------------------------------------------------------------
// Chart dispatch
// ---------------------------------------------------------------------------

fn render_chart(ui: &mut Ui, idx: usize, chart: &ChartData) {
    match chart {
        ChartData::Line(c) => line_chart(ui, idx, c),
        ChartData::Bar(c) => bar_chart(ui, idx, c),
        ChartData::StackedBar(c) => stacked_bar_chart(ui, idx, c),
        ChartData::Scatter(c) => scatter_chart(ui, idx, c),
        ChartData::Pie(c) => pie_chart(ui, c),
        ChartData::Heatmap(c) => heatmap_chart(ui, c),
        ChartData::Table(c) => table_view(ui, idx, c),
        ChartData::Notice(text) => {
            ui.label(RichText::new(text).italics());
        }
        ChartData::Error(msg) => {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    }
}

/// Label for an integer category position; blank between categories.
fn label_at(labels: &[String], value: f64) -> String {
    let nearest = value.round();
    if (value - nearest).abs() > 0.05 || nearest < 0.0 {
        return String::new();
    }
    labels.get(nearest as usize).cloned().unwrap_or_default()
}

fn palette_color(palette: &[Color32], i: usize) -> Color32 {
    palette.get(i).copied().unwrap_or(Color32::GRAY)
}

fn truncated(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

// ---------------------------------------------------------------------------
// egui_plot charts
// ---------------------------------------------------------------------------

fn line_chart(ui: &mut Ui, idx: usize, chart: &LineChart) {
    let ticks = chart.x_ticks.clone();
    let mut plot = Plot::new(("line", idx))
        .legend(Legend::default())
        .height(320.0)
        .x_axis_label(&chart.x_label)
        .y_axis_label(&chart.y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(false)
        .allow_zoom(true);
    if !ticks.is_empty() {
        plot = plot.x_axis_formatter(move |mark, _range| label_at(&ticks, mark.value));
    }

    let palette = generate_palette(chart.series.len());
    plot.show(ui, |plot_ui| {
        for (i, series) in chart.series.iter().enumerate() {
            let points: PlotPoints = series.points.iter().copied().collect();
            let line = Line::new(points)
                .name(&series.name)
                .color(palette_color(&palette, i))
                .width(1.5);
            plot_ui.line(line);
        }
    });
}

fn scatter_chart(ui: &mut Ui, idx: usize, chart: &ScatterChart) {
    let plot = Plot::new(("scatter", idx))
        .legend(Legend::default())
        .height(320.0)
        .x_axis_label(&chart.x_label)
        .y_axis_label(&chart.y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(false)
        .allow_zoom(true);

    let palette = generate_palette(chart.series.len());
    plot.show(ui, |plot_ui| {
        for (i, series) in chart.series.iter().enumerate() {
            let points: PlotPoints = series.points.iter().copied().collect();
            let points = Points::new(points)
                .name(&series.name)
                .color(palette_color(&palette, i))
                .radius(3.0);
            plot_ui.points(points);
        }
    });
}

fn bar_chart(ui: &mut Ui, idx: usize, chart: &BarChart) {
    let labels: Vec<String> = chart.bars.iter().map(|(n, _)| n.clone()).collect();
    let bars: Vec<Bar> = chart
        .bars
        .iter()
        .enumerate()
        .map(|(i, (name, value))| Bar::new(i as f64, *value).name(name).width(0.6))
        .collect();
    let mut plot_bars = PlotBars::new(bars).color(Color32::LIGHT_BLUE);
    if chart.horizontal {
        plot_bars = plot_bars.horizontal();
    }

    let height = if chart.horizontal {
        (chart.bars.len() as f32 * 22.0).clamp(200.0, 900.0)
    } else {
        320.0
    };
    let mut plot = Plot::new(("bar", idx))
        .height(height)
        .x_axis_label(&chart.x_label)
        .y_axis_label(&chart.y_label)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false);
    plot = if chart.horizontal {
        plot.y_axis_formatter(move |mark, _range| truncated(&label_at(&labels, mark.value), 24))
    } else {
        plot.x_axis_formatter(move |mark, _range| truncated(&label_at(&labels, mark.value), 16))
    };

    plot.show(ui, |plot_ui| {
        plot_ui.bar_chart(plot_bars);
    });
}

fn stacked_bar_chart(ui: &mut Ui, idx: usize, chart: &StackedBarChart) {
    let labels = chart.categories.clone();
    let plot = Plot::new(("stacked", idx))
        .legend(Legend::default())
        .height(320.0)
        .x_axis_label(&chart.x_label)
        .y_axis_label(&chart.y_label)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .x_axis_formatter(move |mark, _range| truncated(&label_at(&labels, mark.value), 16));

    let palette = generate_palette(chart.stacks.len());
    plot.show(ui, |plot_ui| {
        let mut drawn: Vec<PlotBars> = Vec::new();
        for (i, (name, values)) in chart.stacks.iter().enumerate() {
            let bars: Vec<Bar> = values
                .iter()
                .enumerate()
                .map(|(c, v)| Bar::new(c as f64, *v).width(0.6))
                .collect();
            let mut plot_bars = PlotBars::new(bars)
                .name(name)
                .color(palette_color(&palette, i));
            {
                let below: Vec<&PlotBars> = drawn.iter().collect();
                plot_bars = plot_bars.stack_on(&below);
            }
            drawn.push(plot_bars);
        }
        for plot_bars in drawn {
            plot_ui.bar_chart(plot_bars);
        }
    });
}

// ---------------------------------------------------------------------------
// Painter-drawn charts (no pie/heatmap in egui_plot)
// ---------------------------------------------------------------------------

fn pie_chart(ui: &mut Ui, chart: &PieChart) {
    let total: f64 = chart.slices.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        ui.label(RichText::new("No data to chart.").italics());
        return;
    }

    let palette = generate_palette(chart.slices.len());
    let desired = Vec2::new(ui.available_width().min(460.0), 240.0);
    let (rect, _response) = ui.allocate_exact_size(desired, Sense::hover());
    if !ui.is_rect_visible(rect) {
        return;
    }
    let painter = ui.painter_at(rect);
    let radius = (rect.height() * 0.45).min(rect.width() * 0.3);
    let center = Pos2::new(rect.left() + radius + 10.0, rect.center().y);

    let mut angle = -std::f32::consts::FRAC_PI_2;
    for (i, (_, value)) in chart.slices.iter().enumerate() {
        let sweep = (value / total) as f32 * std::f32::consts::TAU;
        if sweep <= 0.0 {
            continue; // zero-count slices keep their legend entry only
        }
        let steps = ((sweep / 0.05).ceil() as usize).max(2);
        let mut points = vec![center];
        for s in 0..=steps {
            let a = angle + sweep * s as f32 / steps as f32;
            points.push(center + radius * Vec2::new(a.cos(), a.sin()));
        }
        painter.add(egui::Shape::convex_polygon(
            points,
            palette_color(&palette, i),
            Stroke::NONE,
        ));
        angle += sweep;
    }

    let font = egui::TextStyle::Body.resolve(ui.style());
    let text_color = ui.visuals().text_color();
    let legend_x = center.x + radius + 18.0;
    let mut y = rect.top() + 14.0;
    for (i, (label, value)) in chart.slices.iter().enumerate() {
        let swatch = Rect::from_min_size(Pos2::new(legend_x, y), Vec2::splat(10.0));
        painter.rect_filled(swatch, CornerRadius::same(2), palette_color(&palette, i));
        let pct = value / total * 100.0;
        painter.text(
            Pos2::new(legend_x + 16.0, y + 5.0),
            Align2::LEFT_CENTER,
            format!("{label} — {value:.0} ({pct:.1}%)"),
            font.clone(),
            text_color,
        );
        y += 18.0;
    }
}

fn heatmap_chart(ui: &mut Ui, map: &HeatmapChart) {
    let n_rows = map.rows.len();
    let n_cols = map.cols.len();
    if n_rows == 0 || n_cols == 0 {
        ui.label(RichText::new("No data to chart.").italics());
        return;
    }
    let max = map
        .values
        .iter()
        .flatten()
        .copied()
        .fold(0.0_f64, f64::max);

    let row_label_w = 150.0_f32;
    let col_label_h = 76.0_f32;
    let cell_h = 18.0_f32;
    let cell_w = ((ui.available_width() - row_label_w - 16.0) / n_cols as f32).clamp(16.0, 64.0);

    let size = Vec2::new(
        row_label_w + cell_w * n_cols as f32 + 4.0,
        col_label_h + cell_h * n_rows as f32 + 4.0,
    );
    let (rect, response) = ui.allocate_exact_size(size, Sense::hover());
    if !ui.is_rect_visible(rect) {
        return;
    }
    let painter = ui.painter_at(rect);
    let origin = Pos2::new(rect.left() + row_label_w, rect.top() + col_label_h);
    let font = egui::TextStyle::Small.resolve(ui.style());
    let text_color = ui.visuals().text_color();

    // Column labels, drawn vertically above their column.
    for (c, col) in map.cols.iter().enumerate() {
        let galley = painter.layout_no_wrap(truncated(col, 14), font.clone(), text_color);
        let pos = Pos2::new(
            origin.x + (c as f32 + 0.5) * cell_w - galley.size().y * 0.5,
            origin.y - 6.0,
        );
        let mut shape = egui::epaint::TextShape::new(pos, galley, text_color);
        shape.angle = -std::f32::consts::FRAC_PI_2;
        painter.add(shape);
    }

    for (r, row) in map.rows.iter().enumerate() {
        let y_center = origin.y + (r as f32 + 0.5) * cell_h;
        painter.text(
            Pos2::new(origin.x - 8.0, y_center),
            Align2::RIGHT_CENTER,
            truncated(row, 22),
            font.clone(),
            text_color,
        );
        for c in 0..n_cols {
            let value = map.values[r][c];
            let t = if max > 0.0 { value / max } else { 0.0 };
            let cell = Rect::from_min_size(
                Pos2::new(origin.x + c as f32 * cell_w, origin.y + r as f32 * cell_h),
                Vec2::new(cell_w - 1.0, cell_h - 1.0),
            );
            painter.rect_filled(cell, CornerRadius::ZERO, heat_color(t));
        }
    }

    if let Some(pos) = response.hover_pos() {
        let c = ((pos.x - origin.x) / cell_w).floor() as isize;
        let r = ((pos.y - origin.y) / cell_h).floor() as isize;
        if (0..n_cols as isize).contains(&c) && (0..n_rows as isize).contains(&r) {
            let (r, c) = (r as usize, c as usize);
            response.on_hover_text(format!(
                "{} / {}: {:.0} sightings",
                map.rows[r], map.cols[c], map.values[r][c]
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tabular listings
// ---------------------------------------------------------------------------

fn table_view(ui: &mut Ui, idx: usize, data: &TableData) {
    use egui_extras::{Column, TableBuilder};

    if data.rows.is_empty() {
        ui.label(RichText::new("No rows.").italics());
        return;
    }
    ui.push_id(("table", idx), |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .vscroll(false)
            .columns(Column::auto().at_least(90.0), data.columns.len())
            .header(20.0, |mut header| {
                for col in &data.columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(col);
                    });
                }
            })
            .body(|mut body| {
                for row in &data.rows {
                    body.row(18.0, |mut table_row| {
                        for cell in row {
                            table_row.col(|ui: &mut Ui| {
                                ui.label(cell.to_string());
                            });
                        }
                    });
                }
            });
    });
}
