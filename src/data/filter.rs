use std::collections::{BTreeMap, BTreeSet};

use super::model::{FilterField, Observation, ObservationTable};

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per dimension
// ---------------------------------------------------------------------------

/// Per-dimension selection state: filter field → set of selected values.
///
/// An empty set means "no restriction" — the multiselect widgets start empty
/// and only constrain once the user picks something. Across fields the
/// selections combine conjunctively; within a field a row passes if its
/// value is any of the selected ones.
pub type FilterState = BTreeMap<FilterField, BTreeSet<String>>;

/// A [`FilterState`] with every dimension unrestricted.
pub fn empty_filter_state() -> FilterState {
    FilterField::ALL
        .into_iter()
        .map(|field| (field, BTreeSet::new()))
        .collect()
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a dimension when:
/// * the dimension's selection set is empty → passes (no constraint)
/// * the row's value for that dimension is in the selected set → passes
/// * the row has no value for that dimension → fails (a null can never be a
///   member of the selection)
pub fn filtered_indices(table: &ObservationTable, filters: &FilterState) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, obs)| row_passes(obs, filters))
        .map(|(i, _)| i)
        .collect()
}

fn row_passes(obs: &Observation, filters: &FilterState) -> bool {
    for (field, selected) in filters {
        if selected.is_empty() {
            continue;
        }
        match field.value(obs) {
            Some(value) if selected.contains(value) => {}
            _ => return false,
        }
    }
    true
}

// ---------------------------------------------------------------------------
// FilteredView – the rows surviving the current selection
// ---------------------------------------------------------------------------

/// A borrowed view of the rows passing the current filters. Built once per
/// interaction, handed to every view computation, then discarded.
pub struct FilteredView<'a> {
    rows: Vec<&'a Observation>,
}

impl<'a> FilteredView<'a> {
    pub fn new(table: &'a ObservationTable, indices: &[usize]) -> Self {
        FilteredView {
            rows: indices.iter().map(|&i| &table.rows[i]).collect(),
        }
    }

    pub fn rows(&self) -> &[&'a Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FilterField::*;

    fn obs(month: &str, name: &str, sex: &str) -> Observation {
        Observation {
            month_name: Some(month.into()),
            common_name: Some(name.into()),
            sex: Some(sex.into()),
            ..Default::default()
        }
    }

    fn fixture() -> ObservationTable {
        ObservationTable::from_rows(vec![
            obs("May", "Wood Thrush", "Male"),
            obs("May", "Ovenbird", "Female"),
            obs("June", "Wood Thrush", "Female"),
            Observation::default(), // all nulls
        ])
    }

    fn select(filters: &mut FilterState, field: FilterField, values: &[&str]) {
        filters.insert(field, values.iter().map(|v| v.to_string()).collect());
    }

    #[test]
    fn empty_selections_impose_no_restriction() {
        let table = fixture();
        let indices = filtered_indices(&table, &empty_filter_state());
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn selections_are_conjunctive_across_fields() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, Month, &["May"]);
        select(&mut filters, CommonName, &["Wood Thrush"]);
        assert_eq!(filtered_indices(&table, &filters), vec![0]);
    }

    #[test]
    fn selections_are_disjunctive_within_a_field() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, CommonName, &["Wood Thrush", "Ovenbird"]);
        assert_eq!(filtered_indices(&table, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn null_values_never_match_an_active_selection() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, Month, &["May", "June"]);
        // The all-null row is excluded.
        assert_eq!(filtered_indices(&table, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn output_rows_satisfy_every_active_selection() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, Gender, &["Female"]);
        select(&mut filters, Month, &["May", "June"]);

        let indices = filtered_indices(&table, &filters);
        assert!(indices.iter().all(|&i| i < table.len()));
        for &i in &indices {
            let row = &table.rows[i];
            for (field, selected) in &filters {
                if selected.is_empty() {
                    continue;
                }
                let value = field.value(row).expect("filtered row has a value");
                assert!(selected.contains(value));
            }
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, Gender, &["Female"]);

        let once = filtered_indices(&table, &filters);
        let narrowed = ObservationTable::from_rows(
            once.iter().map(|&i| table.rows[i].clone()).collect(),
        );
        let twice = filtered_indices(&narrowed, &filters);
        assert_eq!(twice.len(), once.len());
        assert_eq!(twice, (0..once.len()).collect::<Vec<_>>());
    }

    #[test]
    fn exhaustive_selection_yields_empty_result() {
        let table = fixture();
        let mut filters = empty_filter_state();
        select(&mut filters, Month, &["January"]);
        let indices = filtered_indices(&table, &filters);
        assert!(indices.is_empty());
        assert!(FilteredView::new(&table, &indices).is_empty());
    }
}
