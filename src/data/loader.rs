use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, types::Value as SqlValue};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::error::DataError;
use super::model::{CellValue, Observation, ObservationTable};

/// The one query the dashboard issues. The schema is fixed at build time;
/// everything downstream addresses columns by these names.
const OBSERVATION_QUERY: &str = "SELECT * FROM Species_analysis";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the observation table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.db` / `.sqlite` / `.sqlite3` – SQLite database holding the
///   `Species_analysis` table (recommended)
/// * `.csv`  – header row with the table's column names
/// * `.json` – records-oriented array (`df.to_json(orient='records')`)
///
/// One connection (or file handle) is opened and closed per call; a failure
/// anywhere is terminal for the load and propagates to the caller.
pub fn load_file(path: &Path) -> Result<ObservationTable, DataError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => load_sqlite(path),
        "csv" => load_csv(path),
        "json" => load_json(path),
        other => Err(anyhow::anyhow!("Unsupported file extension: .{other}")),
    }?;
    Ok(table)
}

// ---------------------------------------------------------------------------
// SQLite loader
// ---------------------------------------------------------------------------

fn load_sqlite(path: &Path) -> Result<ObservationTable> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("opening database {}", path.display()))?;
    let rows = read_observations(&conn)?;
    // Close explicitly so a failure surfaces instead of vanishing in Drop.
    conn.close()
        .map_err(|(_, e)| e)
        .context("closing database connection")?;
    Ok(ObservationTable::from_rows(rows))
}

/// Run the fixed query against an open connection and map every row.
fn read_observations(conn: &Connection) -> Result<Vec<Observation>> {
    let mut stmt = conn
        .prepare(OBSERVATION_QUERY)
        .context("preparing observation query")?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let mut rows = stmt.query([]).context("querying observation table")?;
    let mut observations = Vec::new();
    while let Some(row) = rows.next().context("reading observation row")? {
        let mut record: BTreeMap<String, CellValue> = BTreeMap::new();
        for (idx, name) in columns.iter().enumerate() {
            let value: SqlValue = row
                .get(idx)
                .with_context(|| format!("reading column {name}"))?;
            record.insert(name.clone(), sql_to_cell(value));
        }
        observations.push(observation_from_record(&record));
    }
    Ok(observations)
}

fn sql_to_cell(value: SqlValue) -> CellValue {
    match value {
        SqlValue::Null => CellValue::Null,
        SqlValue::Integer(i) => CellValue::Integer(i),
        SqlValue::Real(r) => CellValue::Float(r),
        SqlValue::Text(s) => CellValue::Text(s),
        // No column of Species_analysis is a blob; treat one as missing.
        SqlValue::Blob(_) => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// One raw CSV row, column names exactly as in the source table. Empty
/// cells deserialize to `None`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Year")]
    year: Option<i32>,
    #[serde(rename = "MonthName")]
    month_name: Option<String>,
    #[serde(rename = "Common_Name")]
    common_name: Option<String>,
    #[serde(rename = "Scientific_Name")]
    scientific_name: Option<String>,
    #[serde(rename = "Sex")]
    sex: Option<String>,
    #[serde(rename = "Location_Type")]
    location_type: Option<String>,
    #[serde(rename = "ID_Method")]
    id_method: Option<String>,
    #[serde(rename = "Observer")]
    observer: Option<String>,
    #[serde(rename = "Admin_Unit_Code")]
    admin_unit_code: Option<String>,
    #[serde(rename = "Plot_Name")]
    plot_name: Option<String>,
    #[serde(rename = "Temperature")]
    temperature: Option<f64>,
    #[serde(rename = "Humidity")]
    humidity: Option<f64>,
    #[serde(rename = "Sky")]
    sky: Option<String>,
    #[serde(rename = "Wind")]
    wind: Option<String>,
    #[serde(rename = "Disturbance")]
    disturbance: Option<String>,
    #[serde(rename = "Visit")]
    visit: Option<i64>,
    #[serde(rename = "Mid_Hour")]
    mid_hour: Option<f64>,
    #[serde(rename = "Distance_Mid")]
    distance_mid: Option<f64>,
    #[serde(rename = "Interval_Duration")]
    interval_duration: Option<String>,
    // Flag columns may arrive as "1" or "1.0" depending on the exporter.
    #[serde(rename = "PIF_Watchlist_Status")]
    pif_watchlist: Option<f64>,
    #[serde(rename = "Regional_Stewardship_Status")]
    regional_stewardship: Option<f64>,
}

impl From<CsvRow> for Observation {
    fn from(row: CsvRow) -> Self {
        Observation {
            year: row.year,
            month_name: row.month_name,
            common_name: row.common_name,
            scientific_name: row.scientific_name,
            sex: row.sex,
            location_type: row.location_type,
            id_method: row.id_method,
            observer: row.observer,
            admin_unit_code: row.admin_unit_code,
            plot_name: row.plot_name,
            temperature: row.temperature,
            humidity: row.humidity,
            sky: row.sky,
            wind: row.wind,
            disturbance: row.disturbance,
            visit: row.visit,
            mid_hour: row.mid_hour,
            distance_mid: row.distance_mid,
            interval_duration: row.interval_duration,
            pif_watchlist: row.pif_watchlist.map(|v| v != 0.0),
            regional_stewardship: row.regional_stewardship.map(|v| v != 0.0),
        }
    }
}

fn load_csv(path: &Path) -> Result<ObservationTable> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    parse_csv(reader)
}

fn parse_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<ObservationTable> {
    let mut rows = Vec::new();
    for (row_no, result) in reader.deserialize::<CsvRow>().enumerate() {
        let raw = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(Observation::from(raw));
    }
    Ok(ObservationTable::from_rows(rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<ObservationTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json_records(&text)
}

/// Records-oriented export: `[{ "Year": 2018, "Common_Name": "...", ... }]`.
fn parse_json_records(text: &str) -> Result<ObservationTable> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root
        .as_array()
        .context("expected a top-level JSON array of records")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("record {i} is not a JSON object"))?;
        let record: BTreeMap<String, CellValue> = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_cell(val)))
            .collect();
        rows.push(observation_from_record(&record));
    }
    Ok(ObservationTable::from_rows(rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Integer(i64::from(*b)),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Record → Observation mapping (shared by the SQLite and JSON paths)
// ---------------------------------------------------------------------------

fn observation_from_record(rec: &BTreeMap<String, CellValue>) -> Observation {
    Observation {
        year: int_field(rec, "Year").map(|v| v as i32),
        month_name: text_field(rec, "MonthName"),
        common_name: text_field(rec, "Common_Name"),
        scientific_name: text_field(rec, "Scientific_Name"),
        sex: text_field(rec, "Sex"),
        location_type: text_field(rec, "Location_Type"),
        id_method: text_field(rec, "ID_Method"),
        observer: text_field(rec, "Observer"),
        admin_unit_code: text_field(rec, "Admin_Unit_Code"),
        plot_name: text_field(rec, "Plot_Name"),
        temperature: float_field(rec, "Temperature"),
        humidity: float_field(rec, "Humidity"),
        sky: text_field(rec, "Sky"),
        wind: text_field(rec, "Wind"),
        disturbance: text_field(rec, "Disturbance"),
        visit: int_field(rec, "Visit"),
        mid_hour: float_field(rec, "Mid_Hour"),
        distance_mid: float_field(rec, "Distance_Mid"),
        interval_duration: text_field(rec, "Interval_Duration"),
        pif_watchlist: flag_field(rec, "PIF_Watchlist_Status"),
        regional_stewardship: flag_field(rec, "Regional_Stewardship_Status"),
    }
}

/// Categorical columns: numbers are kept as their text form (sky/wind codes
/// are plain integers in some exports).
fn text_field(rec: &BTreeMap<String, CellValue>, name: &str) -> Option<String> {
    match rec.get(name)? {
        CellValue::Text(s) if !s.is_empty() => Some(s.clone()),
        CellValue::Integer(i) => Some(i.to_string()),
        CellValue::Float(v) => Some(format!("{v}")),
        _ => None,
    }
}

fn float_field(rec: &BTreeMap<String, CellValue>, name: &str) -> Option<f64> {
    match rec.get(name)? {
        CellValue::Float(v) => Some(*v),
        CellValue::Integer(i) => Some(*i as f64),
        CellValue::Text(s) => s.trim().parse().ok(),
        CellValue::Null => None,
    }
}

fn int_field(rec: &BTreeMap<String, CellValue>, name: &str) -> Option<i64> {
    match rec.get(name)? {
        CellValue::Integer(i) => Some(*i),
        CellValue::Float(v) => Some(*v as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        CellValue::Null => None,
    }
}

fn flag_field(rec: &BTreeMap<String, CellValue>, name: &str) -> Option<bool> {
    int_field(rec, name).map(|v| v != 0)
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Species_analysis (
                Year INTEGER,
                MonthName TEXT,
                Common_Name TEXT,
                Scientific_Name TEXT,
                Sex TEXT,
                Location_Type TEXT,
                ID_Method TEXT,
                Observer TEXT,
                Admin_Unit_Code TEXT,
                Plot_Name TEXT,
                Temperature REAL,
                Humidity REAL,
                Sky TEXT,
                Wind TEXT,
                Disturbance TEXT,
                Visit INTEGER,
                Mid_Hour REAL,
                Distance_Mid REAL,
                Interval_Duration TEXT,
                PIF_Watchlist_Status INTEGER,
                Regional_Stewardship_Status INTEGER
            );
            INSERT INTO Species_analysis VALUES
                (2018, 'May', 'Wood Thrush', 'Hylocichla mustelina', 'Male',
                 'Forest', 'Singing', 'E. Oberg', 'ANTI', 'Plot-1', 21.5, 60.0,
                 '1', 'Calm', 'No effect', 1, 6.5, 35.0, '0-2.5 min', 1, 0),
                (2018, 'June', NULL, NULL, NULL,
                 'Grassland', NULL, NULL, NULL, NULL, NULL, NULL,
                 NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn sqlite_rows_map_to_observations() {
        let conn = fixture_connection();
        let rows = read_observations(&conn).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.year, Some(2018));
        assert_eq!(first.common_name.as_deref(), Some("Wood Thrush"));
        assert_eq!(first.temperature, Some(21.5));
        assert_eq!(first.sky.as_deref(), Some("1"));
        assert_eq!(first.visit, Some(1));
        assert_eq!(first.pif_watchlist, Some(true));
        assert_eq!(first.regional_stewardship, Some(false));

        let second = &rows[1];
        assert_eq!(second.common_name, None);
        assert_eq!(second.temperature, None);
        assert_eq!(second.pif_watchlist, None);
    }

    #[test]
    fn missing_table_is_a_load_error() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(read_observations(&conn).is_err());
    }

    #[test]
    fn csv_round_trip() {
        let csv_text = "\
Year,MonthName,Common_Name,Scientific_Name,Sex,Location_Type,ID_Method,Observer,Admin_Unit_Code,Plot_Name,Temperature,Humidity,Sky,Wind,Disturbance,Visit,Mid_Hour,Distance_Mid,Interval_Duration,PIF_Watchlist_Status,Regional_Stewardship_Status
2018,May,Wood Thrush,Hylocichla mustelina,Male,Forest,Singing,E. Oberg,ANTI,Plot-1,21.5,60,1,Calm,No effect,1,6.5,35,0-2.5 min,1,0
2019,June,,,,Grassland,,,,,,,,,,,,,,,
";
        let reader = csv::Reader::from_reader(csv_text.as_bytes());
        let table = parse_csv(reader).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].common_name.as_deref(), Some("Wood Thrush"));
        assert_eq!(table.rows[0].pif_watchlist, Some(true));
        assert_eq!(table.rows[1].common_name, None);
        assert_eq!(table.rows[1].location_type.as_deref(), Some("Grassland"));
    }

    #[test]
    fn json_records_round_trip() {
        let text = r#"[
            {"Year": 2018, "MonthName": "May", "Common_Name": "Wood Thrush",
             "Temperature": 21.5, "Sky": 1, "Visit": 1,
             "PIF_Watchlist_Status": 1, "Regional_Stewardship_Status": 0},
            {"Year": 2019, "MonthName": null, "Common_Name": null,
             "Temperature": null}
        ]"#;
        let table = parse_json_records(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].sky.as_deref(), Some("1"));
        assert_eq!(table.rows[0].pif_watchlist, Some(true));
        assert_eq!(table.rows[1].month_name, None);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_file(Path::new("species.parquet")).unwrap_err();
        assert!(err.to_string().contains("parquet"));
    }
}
