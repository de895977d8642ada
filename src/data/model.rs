use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell in a derived output table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell for derived tables handed to the UI
/// (e.g. the per-species environmental aggregate mixes text and means).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.2}"),
            CellValue::Null => write!(f, "–"),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the Species_analysis table
// ---------------------------------------------------------------------------

/// A single observation event. Every column is nullable in the source
/// table, so almost everything is an `Option`.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub year: Option<i32>,
    pub month_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub sex: Option<String>,
    pub location_type: Option<String>,
    pub id_method: Option<String>,
    pub observer: Option<String>,
    pub admin_unit_code: Option<String>,
    pub plot_name: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub sky: Option<String>,
    pub wind: Option<String>,
    pub disturbance: Option<String>,
    pub visit: Option<i64>,
    pub mid_hour: Option<f64>,
    pub distance_mid: Option<f64>,
    pub interval_duration: Option<String>,
    pub pif_watchlist: Option<bool>,
    pub regional_stewardship: Option<bool>,
}

// ---------------------------------------------------------------------------
// FilterField – the filterable dimensions, in UI presentation order
// ---------------------------------------------------------------------------

/// The five filterable columns. Declaration order is presentation order,
/// and `Ord` follows it, so `BTreeMap<FilterField, _>` iterates the way the
/// sidebar lists the widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    Month,
    CommonName,
    Gender,
    Location,
    IdMethod,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        FilterField::Month,
        FilterField::CommonName,
        FilterField::Gender,
        FilterField::Location,
        FilterField::IdMethod,
    ];

    /// Widget label shown in the sidebar.
    pub fn label(self) -> &'static str {
        match self {
            FilterField::Month => "Month",
            FilterField::CommonName => "Common Name",
            FilterField::Gender => "Gender",
            FilterField::Location => "Location",
            FilterField::IdMethod => "Identify Method",
        }
    }

    /// The row's value for this dimension, if present.
    pub fn value<'a>(self, obs: &'a Observation) -> Option<&'a str> {
        match self {
            FilterField::Month => obs.month_name.as_deref(),
            FilterField::CommonName => obs.common_name.as_deref(),
            FilterField::Gender => obs.sex.as_deref(),
            FilterField::Location => obs.location_type.as_deref(),
            FilterField::IdMethod => obs.id_method.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full loaded table plus the per-dimension unique value index used to
/// populate the filter widgets. The index is built once from the unfiltered
/// base table and never changes while the session holds the dataset.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    /// All observation rows, in source order.
    pub rows: Vec<Observation>,
    /// Sorted unique non-null values per filter dimension.
    pub unique_values: BTreeMap<FilterField, BTreeSet<String>>,
}

impl ObservationTable {
    /// Build the unique-value index from the loaded rows.
    pub fn from_rows(rows: Vec<Observation>) -> Self {
        let mut unique_values: BTreeMap<FilterField, BTreeSet<String>> = BTreeMap::new();
        for field in FilterField::ALL {
            let values: BTreeSet<String> = rows
                .iter()
                .filter_map(|obs| field.value(obs))
                .map(str::to_owned)
                .collect();
            unique_values.insert(field, values);
        }
        ObservationTable {
            rows,
            unique_values,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Calendar months
// ---------------------------------------------------------------------------

/// Month names in calendar order. The time-series and stacked-month charts
/// order by this, not alphabetically.
pub const MONTH_ORDER: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar position of a month name (0 = January).
pub fn month_index(name: &str) -> Option<usize> {
    MONTH_ORDER.iter().position(|m| *m == name)
}

// ---------------------------------------------------------------------------
// Hour bins
// ---------------------------------------------------------------------------

/// Survey hours run 4:00–12:00; `Mid_Hour` is bucketed into one-hour bins,
/// right-exclusive. Values outside the window belong to no bin.
pub const HOUR_BIN_START: usize = 4;
pub const HOUR_BIN_END: usize = 12;

/// Starting hour of the bin containing `mid_hour`, if it falls in the window.
pub fn hour_bin(mid_hour: f64) -> Option<usize> {
    if mid_hour >= HOUR_BIN_START as f64 && mid_hour < HOUR_BIN_END as f64 {
        Some(mid_hour.floor() as usize)
    } else {
        None
    }
}

/// Display label for the bin starting at `hour`, e.g. `4:00–5:00`.
pub fn hour_bin_label(hour: usize) -> String {
    format!("{hour}:00–{}:00", hour + 1)
}

/// All bin labels in chronological order.
pub fn hour_bin_labels() -> Vec<String> {
    (HOUR_BIN_START..HOUR_BIN_END).map(hour_bin_label).collect()
}

// ---------------------------------------------------------------------------
