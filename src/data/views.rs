use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::error::DataError;
use super::filter::FilteredView;
use super::model::{
    CellValue, Observation, MONTH_ORDER, hour_bin, hour_bin_label, hour_bin_labels, month_index,
};

// ---------------------------------------------------------------------------
// Chart data – what a view hands to the rendering surface
// ---------------------------------------------------------------------------

/// A named point series (line or scatter).
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone)]
pub struct LineChart {
    pub x_label: String,
    pub y_label: String,
    /// Tick labels for integer x positions (empty = plain numeric axis).
    pub x_ticks: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone)]
pub struct BarChart {
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<(String, f64)>,
    pub horizontal: bool,
}

/// Bars stacked per category: `stacks[s].1[c]` is series `s`'s value at
/// category `c`.
#[derive(Debug, Clone)]
pub struct StackedBarChart {
    pub x_label: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub stacks: Vec<(String, Vec<f64>)>,
}

#[derive(Debug, Clone)]
pub struct ScatterChart {
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

/// Slices keep their construction order; the conservation quadrants rely on
/// that (fixed label order, never value-sorted).
#[derive(Debug, Clone)]
pub struct PieChart {
    pub slices: Vec<(String, f64)>,
}

/// A row×column cross-tabulation with absent cells filled with zero.
#[derive(Debug, Clone)]
pub struct HeatmapChart {
    pub x_label: String,
    pub y_label: String,
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    /// `values[r][c]`, dimensions `rows.len() × cols.len()`.
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// A presentation-ready derived table or scalar set, tagged with the chart
/// type the UI should draw it with. The data layer never renders.
#[derive(Debug, Clone)]
pub enum ChartData {
    Line(LineChart),
    Bar(BarChart),
    StackedBar(StackedBarChart),
    Scatter(ScatterChart),
    Pie(PieChart),
    Heatmap(HeatmapChart),
    Table(TableData),
    /// Informational text (e.g. a most-common-species readout, or the
    /// no-data placeholder).
    Notice(String),
    /// A view computation failed; shown inline without affecting siblings.
    Error(String),
}

/// One titled chart within a section.
#[derive(Debug, Clone)]
pub struct ViewBlock {
    pub title: String,
    pub chart: ChartData,
}

const NO_DATA: &str = "No data for this view with the current filters.";

fn block(title: &str, result: Result<ChartData, DataError>) -> ViewBlock {
    let chart = match result {
        Ok(chart) => chart,
        Err(e) => ChartData::Error(e.to_string()),
    };
    ViewBlock {
        title: title.to_owned(),
        chart,
    }
}

// ---------------------------------------------------------------------------
// Summary metrics (shown above every section)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_sightings: usize,
    pub unique_species: usize,
    /// Most frequently observed species; ties broken by the first value in
    /// ascending order.
    pub most_common_species: Option<String>,
    /// Mean temperature rounded to one decimal.
    pub avg_temperature: Option<f64>,
}

pub fn summary(view: &FilteredView<'_>) -> Summary {
    let species = || view.rows().iter().filter_map(|o| o.common_name.as_deref());
    let unique_species = species().collect::<BTreeSet<_>>().len();
    let most_common_species = modes(species()).into_iter().next();
    let avg_temperature = mean(view.rows().iter().filter_map(|o| o.temperature))
        .map(|m| (m * 10.0).round() / 10.0);
    Summary {
        total_sightings: view.len(),
        unique_species,
        most_common_species,
        avg_temperature,
    }
}

// ---------------------------------------------------------------------------
// ViewSection – tagged dispatch over the dashboard's pages
// ---------------------------------------------------------------------------

/// The navigable sections, one per radio entry. Each computes an ordered
/// list of chart blocks from the filtered view; a failure inside one block
/// is reported in place and never aborts the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSection {
    SightingsOverMonths,
    TopSpecies,
    SightingsOverTemperature,
    EnvironmentalConditions,
    SightingsOverObserver,
    HighActivityRegions,
    IntervalAndDistance,
    MaleFemaleRatio,
}

impl ViewSection {
    pub const ALL: [ViewSection; 8] = [
        ViewSection::SightingsOverMonths,
        ViewSection::TopSpecies,
        ViewSection::SightingsOverTemperature,
        ViewSection::EnvironmentalConditions,
        ViewSection::SightingsOverObserver,
        ViewSection::HighActivityRegions,
        ViewSection::IntervalAndDistance,
        ViewSection::MaleFemaleRatio,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViewSection::SightingsOverMonths => "Sightings Over Months",
            ViewSection::TopSpecies => "Top Species",
            ViewSection::SightingsOverTemperature => "Sightings Over Temp",
            ViewSection::EnvironmentalConditions => "Environmental Conditions",
            ViewSection::SightingsOverObserver => "Sightings Over Observer",
            ViewSection::HighActivityRegions => "High-Activity Regions",
            ViewSection::IntervalAndDistance => "Interval & Distance",
            ViewSection::MaleFemaleRatio => "Male : Female Ratio",
        }
    }

    /// Compute every block of this section from the filtered view.
    pub fn compute(self, view: &FilteredView<'_>) -> Vec<ViewBlock> {
        match self {
            ViewSection::SightingsOverMonths => {
                vec![block("Sightings Over Months", time_series(view))]
            }
            ViewSection::TopSpecies => vec![
                block("Top Observed Species", top_species(view)),
                block("Species Overlap Between Locations", species_overlap(view)),
                block("Species by Disturbance", disturbance_by_species(view)),
                block("Species by Hours", species_by_hours(view)),
                block("Species by Visit", species_by_visit(view)),
            ],
            ViewSection::SightingsOverTemperature => vec![
                block("Temperature vs Sightings", temperature_vs_sightings(view)),
                block(
                    "Sightings vs Temperature by Species",
                    sightings_by_species_temperature(view),
                ),
            ],
            ViewSection::EnvironmentalConditions => vec![
                block(
                    "Temperature vs Humidity (Sky)",
                    conditions_scatter(view, |o| o.sky.as_deref()),
                ),
                block(
                    "Temperature vs Humidity (Wind)",
                    conditions_scatter(view, |o| o.wind.as_deref()),
                ),
                block(
                    "Aggregate by Species and Environmental Features",
                    environmental_aggregate(view),
                ),
            ],
            ViewSection::SightingsOverObserver => vec![
                block("Observer by Admin Unit", observer_by_admin_unit(view)),
                block("Observer by Species", observer_by_species(view)),
                block("Observer by Hours", observer_by_hours(view)),
            ],
            ViewSection::HighActivityRegions => {
                let mut blocks = vec![
                    block("High-Activity Regions by Month", regions_by_month(view)),
                    block(
                        "Species Watchlist & Stewardship Overlap",
                        conservation_overlap(view),
                    ),
                ];
                blocks.extend(species_per_conservation_category(view));
                blocks.push(block(
                    "Most Frequently Observed PIF Watchlist Species",
                    most_common_flagged(view, "PIF Watchlist", |o| o.pif_watchlist),
                ));
                blocks.push(block(
                    "Most Frequently Observed Regional Stewardship Species",
                    most_common_flagged(view, "Regional Stewardship", |o| o.regional_stewardship),
                ));
                blocks
            }
            ViewSection::IntervalAndDistance => vec![
                block(
                    "Species by Average Observation Distance",
                    distance_by_species(view),
                ),
                block(
                    "Species Activity Types by Interval Duration",
                    id_method_by_interval(view),
                ),
            ],
            ViewSection::MaleFemaleRatio => vec![
                block("Ratio of Male to Female", male_female_ratio(view)),
                block("Count of Male & Female by Location", sex_by_location(view)),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Individual views
// ---------------------------------------------------------------------------

/// Sightings per (year, month), one line per year, months in calendar order.
/// Months without sightings in an observed year count as zero so the year
/// lines stay continuous.
fn time_series(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts: BTreeMap<(i32, usize), u64> = BTreeMap::new();
    for obs in view.rows() {
        let month = obs.month_name.as_deref().and_then(month_index);
        if let (Some(year), Some(month)) = (obs.year, month) {
            *counts.entry((year, month)).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }

    let years: BTreeSet<i32> = counts.keys().map(|&(y, _)| y).collect();
    let series = years
        .into_iter()
        .map(|year| Series {
            name: year.to_string(),
            points: (0..MONTH_ORDER.len())
                .map(|m| {
                    let n = counts.get(&(year, m)).copied().unwrap_or(0);
                    [m as f64, n as f64]
                })
                .collect(),
        })
        .collect();

    Ok(ChartData::Line(LineChart {
        x_label: "Month".to_owned(),
        y_label: "Sightings".to_owned(),
        x_ticks: MONTH_ORDER.iter().map(|m| (*m).to_owned()).collect(),
        series,
    }))
}

/// Ten most observed species, descending; ties keep table order.
fn top_species(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts =
        counts_in_table_order(view.rows().iter().filter_map(|o| o.common_name.as_deref()));
    if counts.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(10);
    Ok(ChartData::Bar(BarChart {
        x_label: "Species".to_owned(),
        y_label: "Count".to_owned(),
        bars: counts.into_iter().map(|(n, c)| (n, c as f64)).collect(),
        horizontal: false,
    }))
}

/// Shared / exclusive species between the two location types. The pie only
/// has meaning for exactly two locations; any other count is rejected as a
/// per-view error.
fn species_overlap(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut by_location: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for obs in view.rows() {
        if let (Some(loc), Some(name)) = (obs.location_type.as_deref(), obs.common_name.as_deref())
        {
            by_location.entry(loc).or_default().insert(name);
        }
    }
    if by_location.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    if by_location.len() != 2 {
        return Err(DataError::view(
            "Species Overlap Between Locations",
            format!(
                "species overlap needs exactly two location types, found {}",
                by_location.len()
            ),
        ));
    }

    let mut locations = by_location.iter();
    let (loc_a, set_a) = locations.next().expect("two entries");
    let (loc_b, set_b) = locations.next().expect("two entries");
    let shared = set_a.intersection(set_b).count();
    let only_a = set_a.difference(set_b).count();
    let only_b = set_b.difference(set_a).count();

    Ok(ChartData::Pie(PieChart {
        slices: vec![
            (format!("Shared ({shared})"), shared as f64),
            (format!("Only {loc_a} ({only_a})"), only_a as f64),
            (format!("Only {loc_b} ({only_b})"), only_b as f64),
        ],
    }))
}

fn disturbance_by_species(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.common_name.as_deref(), |o| {
        o.disturbance.as_deref().map(str::to_owned)
    });
    Ok(pivot_heatmap("Disturbance", "Common Name", pairs, None))
}

fn species_by_hours(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.common_name.as_deref(), |o| {
        o.mid_hour.and_then(hour_bin).map(hour_bin_label)
    });
    Ok(pivot_heatmap(
        "Hours",
        "Common Name",
        pairs,
        Some(hour_bin_labels()),
    ))
}

fn species_by_visit(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.common_name.as_deref(), |o| {
        o.visit.map(|v| v.to_string())
    });
    // Visit numbers sort numerically, not lexically.
    let visits: BTreeSet<i64> = view.rows().iter().filter_map(|o| o.visit).collect();
    let order: Vec<String> = visits.into_iter().map(|v| v.to_string()).collect();
    Ok(pivot_heatmap("Visit", "Common Name", pairs, Some(order)))
}

/// Sightings count at each observed temperature.
fn temperature_vs_sightings(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let temps = sorted_finite(view.rows().iter().filter_map(|o| o.temperature));
    if temps.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    let mut points: Vec<[f64; 2]> = Vec::new();
    for t in temps {
        match points.last_mut() {
            Some(last) if last[0] == t => last[1] += 1.0,
            _ => points.push([t, 1.0]),
        }
    }
    Ok(ChartData::Scatter(ScatterChart {
        x_label: "Temperature".to_owned(),
        y_label: "Sightings".to_owned(),
        series: vec![Series {
            name: "Sightings".to_owned(),
            points,
        }],
    }))
}

/// Sightings per temperature, stacked by species.
fn sightings_by_species_temperature(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut temps: Vec<f64> = Vec::new();
    for obs in view.rows() {
        if let (Some(name), Some(t)) = (obs.common_name.as_deref(), obs.temperature) {
            if !t.is_finite() {
                continue;
            }
            temps.push(t);
            *counts
                .entry((name.to_owned(), format!("{t}")))
                .or_default() += 1;
        }
    }
    if counts.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    // Temperature categories keep numeric order, not lexical.
    let mut categories: Vec<String> = Vec::new();
    for t in sorted_finite(temps.into_iter()) {
        let label = format!("{t}");
        if categories.last() != Some(&label) {
            categories.push(label);
        }
    }
    let species = dedup_sorted(counts.keys().map(|(s, _)| s.clone()).collect());
    Ok(ChartData::StackedBar(stacked_bars(
        "Temperature",
        "Sightings",
        categories,
        species,
        &counts,
    )))
}

/// Raw (temperature, humidity) points grouped by a condition column.
fn conditions_scatter(
    view: &FilteredView<'_>,
    condition: impl Fn(&Observation) -> Option<&str>,
) -> Result<ChartData, DataError> {
    let mut by_condition: BTreeMap<String, Vec<[f64; 2]>> = BTreeMap::new();
    for obs in view.rows() {
        if let (Some(cond), Some(t), Some(h)) = (condition(obs), obs.temperature, obs.humidity) {
            by_condition.entry(cond.to_owned()).or_default().push([t, h]);
        }
    }
    if by_condition.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    Ok(ChartData::Scatter(ScatterChart {
        x_label: "Temperature".to_owned(),
        y_label: "Humidity".to_owned(),
        series: by_condition
            .into_iter()
            .map(|(name, points)| Series { name, points })
            .collect(),
    }))
}

/// Per-species modes and means over the environmental columns. Modes are
/// comma-joined strings of every modal value, ascending.
fn environmental_aggregate(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut species: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for obs in view.rows() {
        if let Some(name) = obs.common_name.as_deref() {
            species.entry(name).or_default().push(obs);
        }
    }
    if species.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }

    let mode_cell = |values: Vec<&str>| -> CellValue {
        let joined = modes(values.into_iter()).join(", ");
        if joined.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(joined)
        }
    };
    let mean_cell = |values: Vec<f64>| -> CellValue {
        match mean(values.into_iter()) {
            Some(m) => CellValue::Float(m),
            None => CellValue::Null,
        }
    };

    let rows = species
        .into_iter()
        .map(|(name, group)| {
            vec![
                CellValue::Text(name.to_owned()),
                mode_cell(group.iter().filter_map(|o| o.plot_name.as_deref()).collect()),
                mean_cell(group.iter().filter_map(|o| o.temperature).collect()),
                mean_cell(group.iter().filter_map(|o| o.humidity).collect()),
                mode_cell(group.iter().filter_map(|o| o.sky.as_deref()).collect()),
                mode_cell(group.iter().filter_map(|o| o.wind.as_deref()).collect()),
            ]
        })
        .collect();

    Ok(ChartData::Table(TableData {
        columns: vec![
            "Common Name".to_owned(),
            "Plot Name".to_owned(),
            "Temperature".to_owned(),
            "Humidity".to_owned(),
            "Sky".to_owned(),
            "Wind".to_owned(),
        ],
        rows,
    }))
}

fn observer_by_admin_unit(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.observer.as_deref(), |o| {
        o.admin_unit_code.as_deref().map(str::to_owned)
    });
    Ok(pivot_heatmap("Admin Unit", "Observer", pairs, None))
}

fn observer_by_species(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.common_name.as_deref(), |o| {
        o.observer.as_deref().map(str::to_owned)
    });
    Ok(pivot_heatmap("Observer", "Common Name", pairs, None))
}

fn observer_by_hours(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.observer.as_deref(), |o| {
        o.mid_hour.and_then(hour_bin).map(hour_bin_label)
    });
    Ok(pivot_heatmap(
        "Hours",
        "Observer",
        pairs,
        Some(hour_bin_labels()),
    ))
}

/// Sightings per plot, stacked by month in calendar order.
fn regions_by_month(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for obs in view.rows() {
        if let (Some(plot), Some(month)) = (obs.plot_name.as_deref(), obs.month_name.as_deref()) {
            *counts
                .entry((month.to_owned(), plot.to_owned()))
                .or_default() += 1;
        }
    }
    if counts.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    let plots: Vec<String> = dedup_sorted(counts.keys().map(|(_, p)| p.clone()).collect());
    let observed_months: BTreeSet<&String> = counts.keys().map(|(m, _)| m).collect();
    // Month stacks in calendar order, not alphabetical.
    let months: Vec<String> = MONTH_ORDER
        .iter()
        .map(|m| (*m).to_owned())
        .filter(|m| observed_months.contains(m))
        .collect();

    Ok(ChartData::StackedBar(stacked_bars(
        "Plot", "Sightings", plots, months, &counts,
    )))
}

/// Fixed order of the conservation quadrants: the pie and the per-category
/// species listings both present them this way, never sorted by value.
const CONSERVATION_CATEGORIES: [&str; 4] = ["Neither", "Regional Only", "PIF Only", "Both"];

/// Quadrant index for a row, if both flags are present.
fn conservation_quadrant(obs: &Observation) -> Option<usize> {
    match (obs.pif_watchlist?, obs.regional_stewardship?) {
        (false, false) => Some(0),
        (false, true) => Some(1),
        (true, false) => Some(2),
        (true, true) => Some(3),
    }
}

fn conservation_overlap(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts = [0u64; 4];
    for obs in view.rows() {
        if let Some(q) = conservation_quadrant(obs) {
            counts[q] += 1;
        }
    }
    if counts.iter().all(|&c| c == 0) {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    Ok(ChartData::Pie(PieChart {
        slices: CONSERVATION_CATEGORIES
            .iter()
            .zip(counts)
            .map(|(label, count)| ((*label).to_owned(), count as f64))
            .collect(),
    }))
}

/// One listing block per quadrant: the distinct species observed in it, in
/// first-encounter order.
fn species_per_conservation_category(view: &FilteredView<'_>) -> Vec<ViewBlock> {
    CONSERVATION_CATEGORIES
        .iter()
        .enumerate()
        .map(|(quadrant, label)| {
            let mut seen = BTreeSet::new();
            let mut names: Vec<String> = Vec::new();
            for obs in view.rows() {
                if conservation_quadrant(obs) != Some(quadrant) {
                    continue;
                }
                if let Some(name) = obs.common_name.as_deref() {
                    if seen.insert(name) {
                        names.push(name.to_owned());
                    }
                }
            }
            let title = format!("{label} ({} species)", names.len());
            let chart = ChartData::Table(TableData {
                columns: vec!["Common Name".to_owned()],
                rows: names
                    .into_iter()
                    .map(|n| vec![CellValue::Text(n)])
                    .collect(),
            });
            ViewBlock { title, chart }
        })
        .collect()
}

/// Most frequently observed species among rows with the given flag set.
/// An empty subset is an expected condition, not an error.
fn most_common_flagged(
    view: &FilteredView<'_>,
    label: &str,
    flag: impl Fn(&Observation) -> Option<bool>,
) -> Result<ChartData, DataError> {
    let counts = counts_in_table_order(
        view.rows()
            .iter()
            .filter(|o| flag(o) == Some(true))
            .filter_map(|o| o.common_name.as_deref()),
    );
    // min over Reverse(count) keeps the first-encountered species on ties.
    match counts.iter().min_by_key(|(_, c)| std::cmp::Reverse(*c)) {
        Some((name, count)) => Ok(ChartData::Notice(format!(
            "{name} was observed {count} times."
        ))),
        None => Ok(ChartData::Notice(format!(
            "No {label} species observations found."
        ))),
    }
}

/// Male-to-female sighting ratio per species, top 20 descending. A species
/// with no female sightings has no defined ratio and is excluded outright —
/// neither infinite nor zero.
fn male_female_ratio(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, (u64, u64)> = HashMap::new();
    for obs in view.rows() {
        let (Some(name), Some(sex)) = (obs.common_name.as_deref(), obs.sex.as_deref()) else {
            continue;
        };
        let entry = counts.entry(name.to_owned()).or_insert_with(|| {
            order.push(name.to_owned());
            (0, 0)
        });
        match sex {
            "Male" => entry.0 += 1,
            "Female" => entry.1 += 1,
            _ => {}
        }
    }

    let mut ratios: Vec<(String, f64)> = order
        .into_iter()
        .filter_map(|name| {
            let &(males, females) = counts.get(&name)?;
            (females > 0).then(|| (name, males as f64 / females as f64))
        })
        .collect();
    if ratios.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    ratios.sort_by(|a, b| b.1.total_cmp(&a.1));
    ratios.truncate(20);
    Ok(ChartData::Bar(BarChart {
        x_label: "Species".to_owned(),
        y_label: "Male : Female Ratio".to_owned(),
        bars: ratios,
        horizontal: false,
    }))
}

fn sex_by_location(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let pairs = string_pairs(view, |o| o.location_type.as_deref(), |o| {
        o.sex.as_deref().map(str::to_owned)
    });
    Ok(pivot_heatmap("Gender", "Location", pairs, None))
}

/// Mean observation distance per species, ascending. Species without any
/// distance reading are excluded rather than charted as zero.
fn distance_by_species(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut distances: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for obs in view.rows() {
        if let (Some(name), Some(d)) = (obs.common_name.as_deref(), obs.distance_mid) {
            distances.entry(name).or_default().push(d);
        }
    }
    let mut bars: Vec<(String, f64)> = distances
        .into_iter()
        .filter_map(|(name, ds)| mean(ds.into_iter()).map(|m| (name.to_owned(), m)))
        .collect();
    if bars.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    bars.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(ChartData::Bar(BarChart {
        x_label: "Avg Observation Distance".to_owned(),
        y_label: "Common Name".to_owned(),
        bars,
        horizontal: true,
    }))
}

/// Sightings per identification method, stacked by interval duration.
fn id_method_by_interval(view: &FilteredView<'_>) -> Result<ChartData, DataError> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for obs in view.rows() {
        if let (Some(method), Some(interval)) =
            (obs.id_method.as_deref(), obs.interval_duration.as_deref())
        {
            *counts
                .entry((interval.to_owned(), method.to_owned()))
                .or_default() += 1;
        }
    }
    if counts.is_empty() {
        return Ok(ChartData::Notice(NO_DATA.to_owned()));
    }
    let methods: Vec<String> = dedup_sorted(counts.keys().map(|(_, m)| m.clone()).collect());
    let intervals: Vec<String> = dedup_sorted(counts.keys().map(|(i, _)| i.clone()).collect());
    Ok(ChartData::StackedBar(stacked_bars(
        "ID Method",
        "Count",
        methods,
        intervals,
        &counts,
    )))
}

// ---------------------------------------------------------------------------
// Aggregation helpers
// ---------------------------------------------------------------------------

/// Counts per value, keyed in first-encounter order so descending sorts keep
/// table order for ties.
fn counts_in_table_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, u64)> {
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for value in values {
        match index.get(value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value.to_owned(), order.len());
                order.push((value.to_owned(), 1));
            }
        }
    }
    order
}

/// All modal values, ascending. "The" mode is the first entry.
fn modes<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let Some(&max) = counts.values().max() else {
        return Vec::new();
    };
    counts
        .into_iter()
        .filter(|&(_, c)| c == max)
        .map(|(v, _)| v.to_owned())
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (mut sum, mut n) = (0.0, 0u64);
    for v in values.filter(|v| v.is_finite()) {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

/// Finite values, ascending. NaN never forms a group key.
fn sorted_finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

fn dedup_sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// Collect (row, column) label pairs for a pivot, skipping rows where
/// either side is missing.
fn string_pairs<'a>(
    view: &FilteredView<'a>,
    row_key: impl Fn(&'a Observation) -> Option<&'a str>,
    col_key: impl Fn(&'a Observation) -> Option<String>,
) -> Vec<(String, String)> {
    view.rows()
        .iter()
        .copied()
        .filter_map(|obs| {
            let row = row_key(obs)?;
            let col = col_key(obs)?;
            Some((row.to_owned(), col))
        })
        .collect()
}

/// Cross-tabulate counts of (row, column) pairs into a zero-filled grid.
/// Rows sort ascending; columns sort ascending unless an explicit order is
/// given (hour bins, visit numbers), which is then restricted to the
/// columns actually observed.
fn pivot_heatmap(
    x_label: &str,
    y_label: &str,
    pairs: Vec<(String, String)>,
    col_order: Option<Vec<String>>,
) -> ChartData {
    if pairs.is_empty() {
        return ChartData::Notice(NO_DATA.to_owned());
    }
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for (row, col) in pairs {
        *counts.entry((row, col)).or_default() += 1;
    }
    let rows: Vec<String> = dedup_sorted(counts.keys().map(|(r, _)| r.clone()).collect());
    let observed: BTreeSet<String> = counts.keys().map(|(_, c)| c.clone()).collect();
    let cols: Vec<String> = match col_order {
        Some(order) => order.into_iter().filter(|c| observed.contains(c)).collect(),
        None => observed.into_iter().collect(),
    };
    let values = rows
        .iter()
        .map(|row| {
            cols.iter()
                .map(|col| {
                    counts
                        .get(&(row.clone(), col.clone()))
                        .copied()
                        .unwrap_or(0) as f64
                })
                .collect()
        })
        .collect();
    ChartData::Heatmap(HeatmapChart {
        x_label: x_label.to_owned(),
        y_label: y_label.to_owned(),
        rows,
        cols,
        values,
    })
}

/// Assemble a stacked bar chart from counts keyed (series, category), with
/// explicit orderings for both axes.
fn stacked_bars(
    x_label: &str,
    y_label: &str,
    categories: Vec<String>,
    series: Vec<String>,
    counts: &BTreeMap<(String, String), u64>,
) -> StackedBarChart {
    let stacks = series
        .into_iter()
        .map(|name| {
            let values = categories
                .iter()
                .map(|cat| {
                    counts
                        .get(&(name.clone(), cat.clone()))
                        .copied()
                        .unwrap_or(0) as f64
                })
                .collect();
            (name, values)
        })
        .collect();
    StackedBarChart {
        x_label: x_label.to_owned(),
        y_label: y_label.to_owned(),
        categories,
        stacks,
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{FilteredView, empty_filter_state, filtered_indices};
    use crate::data::model::ObservationTable;

    fn obs(name: &str, temp: f64) -> Observation {
        Observation {
            common_name: Some(name.into()),
            temperature: Some(temp),
            ..Default::default()
        }
    }

    fn view_of(table: &ObservationTable) -> FilteredView<'_> {
        let indices: Vec<usize> = (0..table.len()).collect();
        FilteredView::new(table, &indices)
    }

    // -- summary --

    #[test]
    fn summary_on_known_five_row_table() {
        let table = ObservationTable::from_rows(vec![
            obs("Wood Thrush", 21.5),
            obs("Wood Thrush", 22.5),
            obs("Ovenbird", 23.0),
            obs("Acadian Flycatcher", 20.0),
            obs("Acadian Flycatcher", 21.0),
        ]);
        let s = summary(&view_of(&table));
        assert_eq!(s.total_sightings, 5);
        assert_eq!(s.unique_species, 3);
        // Two species tie at 2 sightings; first in ascending order wins.
        assert_eq!(s.most_common_species.as_deref(), Some("Acadian Flycatcher"));
        assert_eq!(s.avg_temperature, Some(21.6));
    }

    #[test]
    fn summary_of_empty_view_has_no_metrics() {
        let table = ObservationTable::from_rows(Vec::new());
        let s = summary(&view_of(&table));
        assert_eq!(s.total_sightings, 0);
        assert_eq!(s.unique_species, 0);
        assert_eq!(s.most_common_species, None);
        assert_eq!(s.avg_temperature, None);
    }

    // -- time series --

    #[test]
    fn time_series_uses_calendar_month_order_with_zero_fill() {
        let mut rows = Vec::new();
        for month in ["March", "January", "March"] {
            rows.push(Observation {
                year: Some(2018),
                month_name: Some(month.into()),
                ..Default::default()
            });
        }
        let table = ObservationTable::from_rows(rows);
        let chart = time_series(&view_of(&table)).unwrap();
        let ChartData::Line(line) = chart else {
            panic!("expected line chart");
        };
        assert_eq!(line.x_ticks[0], "January");
        assert_eq!(line.series.len(), 1);
        let points = &line.series[0].points;
        assert_eq!(points.len(), 12);
        assert_eq!(points[0], [0.0, 1.0]); // January
        assert_eq!(points[1], [1.0, 0.0]); // February, zero-filled
        assert_eq!(points[2], [2.0, 2.0]); // March
    }

    // -- top species --

    #[test]
    fn top_species_sorts_descending_and_keeps_table_order_for_ties() {
        let table = ObservationTable::from_rows(vec![
            obs("Veery", 0.0),
            obs("Ovenbird", 0.0),
            obs("Ovenbird", 0.0),
            obs("Acadian Flycatcher", 0.0),
        ]);
        let ChartData::Bar(bar) = top_species(&view_of(&table)).unwrap() else {
            panic!("expected bar chart");
        };
        let names: Vec<&str> = bar.bars.iter().map(|(n, _)| n.as_str()).collect();
        // Ovenbird leads on count; Veery precedes Acadian Flycatcher because
        // it appears first in the table.
        assert_eq!(names, ["Ovenbird", "Veery", "Acadian Flycatcher"]);
    }

    #[test]
    fn top_species_truncates_to_ten() {
        let rows: Vec<Observation> = (0..15).map(|i| obs(&format!("Species {i:02}"), 0.0)).collect();
        let table = ObservationTable::from_rows(rows);
        let ChartData::Bar(bar) = top_species(&view_of(&table)).unwrap() else {
            panic!("expected bar chart");
        };
        assert_eq!(bar.bars.len(), 10);
    }

    // -- species overlap --

    fn located(name: &str, location: &str) -> Observation {
        Observation {
            common_name: Some(name.into()),
            location_type: Some(location.into()),
            ..Default::default()
        }
    }

    #[test]
    fn species_overlap_between_two_locations() {
        let table = ObservationTable::from_rows(vec![
            located("A", "Forest"),
            located("B", "Forest"),
            located("C", "Forest"),
            located("B", "Grassland"),
            located("C", "Grassland"),
            located("D", "Grassland"),
        ]);
        let ChartData::Pie(pie) = species_overlap(&view_of(&table)).unwrap() else {
            panic!("expected pie chart");
        };
        assert_eq!(pie.slices[0], ("Shared (2)".to_owned(), 2.0));
        assert_eq!(pie.slices[1], ("Only Forest (1)".to_owned(), 1.0));
        assert_eq!(pie.slices[2], ("Only Grassland (1)".to_owned(), 1.0));
    }

    #[test]
    fn species_overlap_rejects_other_location_counts() {
        let one = ObservationTable::from_rows(vec![located("A", "Forest")]);
        assert!(matches!(
            species_overlap(&view_of(&one)),
            Err(DataError::ViewComputation { .. })
        ));

        let three = ObservationTable::from_rows(vec![
            located("A", "Forest"),
            located("B", "Grassland"),
            located("C", "Wetland"),
        ]);
        let err = species_overlap(&view_of(&three)).unwrap_err();
        assert!(err.to_string().contains("found 3"));
    }

    // -- pivots --

    #[test]
    fn pivot_fills_missing_cells_with_zero() {
        let pairs = vec![
            ("Ovenbird".to_owned(), "No effect".to_owned()),
            ("Ovenbird".to_owned(), "Slight effect".to_owned()),
            ("Veery".to_owned(), "No effect".to_owned()),
        ];
        let ChartData::Heatmap(map) = pivot_heatmap("Disturbance", "Common Name", pairs, None)
        else {
            panic!("expected heatmap");
        };
        assert_eq!(map.rows, ["Ovenbird", "Veery"]);
        assert_eq!(map.cols, ["No effect", "Slight effect"]);
        assert_eq!(map.values, [[1.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn hour_pivot_orders_bins_chronologically() {
        let mut rows = Vec::new();
        for hour in [11.5, 4.2, 9.0] {
            rows.push(Observation {
                common_name: Some("Ovenbird".into()),
                mid_hour: Some(hour),
                ..Default::default()
            });
        }
        // Outside the 4:00–12:00 window: contributes to no bin.
        rows.push(Observation {
            common_name: Some("Ovenbird".into()),
            mid_hour: Some(13.0),
            ..Default::default()
        });
        let table = ObservationTable::from_rows(rows);
        let ChartData::Heatmap(map) = species_by_hours(&view_of(&table)).unwrap() else {
            panic!("expected heatmap");
        };
        assert_eq!(map.cols, ["4:00–5:00", "9:00–10:00", "11:00–12:00"]);
        assert_eq!(map.values, [[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn visit_columns_sort_numerically() {
        let mut rows = Vec::new();
        for visit in [10, 2, 1] {
            rows.push(Observation {
                common_name: Some("Veery".into()),
                visit: Some(visit),
                ..Default::default()
            });
        }
        let table = ObservationTable::from_rows(rows);
        let ChartData::Heatmap(map) = species_by_visit(&view_of(&table)).unwrap() else {
            panic!("expected heatmap");
        };
        assert_eq!(map.cols, ["1", "2", "10"]);
    }

    // -- conservation quadrants --

    fn flagged(name: &str, pif: bool, regional: bool) -> Observation {
        Observation {
            common_name: Some(name.into()),
            pif_watchlist: Some(pif),
            regional_stewardship: Some(regional),
            ..Default::default()
        }
    }

    #[test]
    fn conservation_pie_keeps_fixed_quadrant_order() {
        let table = ObservationTable::from_rows(vec![
            flagged("A", true, true),
            flagged("B", true, true),
            flagged("C", false, false),
            flagged("D", true, false),
            Observation::default(), // null flags: no quadrant
        ]);
        let ChartData::Pie(pie) = conservation_overlap(&view_of(&table)).unwrap() else {
            panic!("expected pie chart");
        };
        let labels: Vec<&str> = pie.slices.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["Neither", "Regional Only", "PIF Only", "Both"]);
        let values: Vec<f64> = pie.slices.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, [1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn species_listing_per_quadrant_is_distinct_in_table_order() {
        let table = ObservationTable::from_rows(vec![
            flagged("Veery", true, true),
            flagged("Ovenbird", true, true),
            flagged("Veery", true, true),
        ]);
        let blocks = species_per_conservation_category(&view_of(&table));
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[3].title, "Both (2 species)");
        let ChartData::Table(listing) = &blocks[3].chart else {
            panic!("expected table");
        };
        assert_eq!(listing.rows.len(), 2);
        assert_eq!(listing.rows[0][0], CellValue::Text("Veery".into()));
        assert_eq!(listing.rows[1][0], CellValue::Text("Ovenbird".into()));
    }

    #[test]
    fn most_common_flagged_reports_empty_subset_as_notice() {
        let table = ObservationTable::from_rows(vec![flagged("Veery", false, false)]);
        let chart = most_common_flagged(&view_of(&table), "PIF Watchlist", |o| o.pif_watchlist)
            .unwrap();
        let ChartData::Notice(text) = chart else {
            panic!("expected notice");
        };
        assert!(text.contains("No PIF Watchlist species observations"));
    }

    #[test]
    fn most_common_flagged_reports_value_and_count() {
        let table = ObservationTable::from_rows(vec![
            flagged("Veery", true, false),
            flagged("Veery", true, false),
            flagged("Ovenbird", true, false),
        ]);
        let chart = most_common_flagged(&view_of(&table), "PIF Watchlist", |o| o.pif_watchlist)
            .unwrap();
        let ChartData::Notice(text) = chart else {
            panic!("expected notice");
        };
        assert_eq!(text, "Veery was observed 2 times.");
    }

    // -- male : female ratio --

    fn sexed(name: &str, sex: &str) -> Observation {
        Observation {
            common_name: Some(name.into()),
            sex: Some(sex.into()),
            ..Default::default()
        }
    }

    #[test]
    fn ratio_excludes_species_without_female_sightings() {
        let mut rows = Vec::new();
        for _ in 0..10 {
            rows.push(sexed("Veery", "Male"));
        }
        for _ in 0..4 {
            rows.push(sexed("Ovenbird", "Male"));
        }
        for _ in 0..2 {
            rows.push(sexed("Ovenbird", "Female"));
        }
        let table = ObservationTable::from_rows(rows);
        let ChartData::Bar(bar) = male_female_ratio(&view_of(&table)).unwrap() else {
            panic!("expected bar chart");
        };
        // Veery (10 males, no females) has no defined ratio.
        assert_eq!(bar.bars, vec![("Ovenbird".to_owned(), 2.0)]);
    }

    // -- environmental aggregate --

    #[test]
    fn environmental_modes_join_all_modal_values_ascending() {
        let mut rows = Vec::new();
        for plot in ["Plot-2", "Plot-1"] {
            rows.push(Observation {
                common_name: Some("Veery".into()),
                plot_name: Some(plot.into()),
                temperature: Some(20.0),
                humidity: Some(60.0),
                ..Default::default()
            });
        }
        let table = ObservationTable::from_rows(rows);
        let ChartData::Table(data) = environmental_aggregate(&view_of(&table)).unwrap() else {
            panic!("expected table");
        };
        assert_eq!(data.rows.len(), 1);
        // Both plots tie at one sighting: every modal value, ascending.
        assert_eq!(data.rows[0][1], CellValue::Text("Plot-1, Plot-2".into()));
        assert_eq!(data.rows[0][2], CellValue::Float(20.0));
        assert_eq!(data.rows[0][5], CellValue::Null);
    }

    // -- distance --

    #[test]
    fn distance_by_species_sorts_ascending_and_skips_unmeasured() {
        let mut rows = vec![
            Observation {
                common_name: Some("Veery".into()),
                distance_mid: Some(50.0),
                ..Default::default()
            },
            Observation {
                common_name: Some("Ovenbird".into()),
                distance_mid: Some(10.0),
                ..Default::default()
            },
            Observation {
                common_name: Some("Ovenbird".into()),
                distance_mid: Some(30.0),
                ..Default::default()
            },
        ];
        rows.push(Observation {
            common_name: Some("Acadian Flycatcher".into()),
            ..Default::default()
        });
        let table = ObservationTable::from_rows(rows);
        let ChartData::Bar(bar) = distance_by_species(&view_of(&table)).unwrap() else {
            panic!("expected bar chart");
        };
        assert!(bar.horizontal);
        assert_eq!(
            bar.bars,
            vec![("Ovenbird".to_owned(), 20.0), ("Veery".to_owned(), 50.0)]
        );
    }

    // -- empty view robustness --

    #[test]
    fn every_section_tolerates_an_empty_view() {
        let table = ObservationTable::from_rows(Vec::new());
        let mut filters = empty_filter_state();
        filters.insert(
            crate::data::model::FilterField::Month,
            ["January".to_owned()].into(),
        );
        let indices = filtered_indices(&table, &filters);
        let view = FilteredView::new(&table, &indices);
        for section in ViewSection::ALL {
            let blocks = section.compute(&view);
            assert!(!blocks.is_empty(), "{} produced no blocks", section.label());
            for b in blocks {
                // Empty data is a notice or an empty listing, never a panic;
                // the overlap view may report its two-location requirement.
                match b.chart {
                    ChartData::Notice(_) | ChartData::Table(_) | ChartData::Error(_) => {}
                    other => panic!("{}: unexpected chart {other:?}", b.title),
                }
            }
        }
    }
}
