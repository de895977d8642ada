use std::collections::BTreeSet;

use crate::data::filter::{FilterState, FilteredView, empty_filter_state, filtered_indices};
use crate::data::model::{FilterField, ObservationTable};
use crate::data::views::{Summary, ViewBlock, ViewSection, summary};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session state, independent of rendering. The loaded table is
/// owned here and passed into every aggregation call; nothing is ambient.
pub struct AppState {
    /// Loaded dataset (None until the user opens a file).
    pub table: Option<ObservationTable>,

    /// Per-dimension filter selections (empty set = unrestricted).
    pub filters: FilterState,

    /// Indices of rows passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Currently selected dashboard section.
    pub section: ViewSection,

    /// Summary metrics of the last recomputation.
    pub summary: Option<Summary>,

    /// Chart blocks of the last recomputation, for the current section.
    pub blocks: Vec<ViewBlock>,

    /// The active filters excluded every row; charts are skipped and the UI
    /// shows the no-data warning instead.
    pub empty_selection: bool,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            table: None,
            filters: empty_filter_state(),
            visible_indices: Vec::new(),
            section: ViewSection::SightingsOverMonths,
            summary: None,
            blocks: Vec::new(),
            empty_selection: false,
            status_message: None,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded table, reset the filters and recompute.
    pub fn set_table(&mut self, table: ObservationTable) {
        self.filters = empty_filter_state();
        self.table = Some(table);
        self.status_message = None;
        self.recompute();
    }

    /// Switch the active section and recompute its blocks.
    pub fn set_section(&mut self, section: ViewSection) {
        if self.section != section {
            self.section = section;
            self.recompute();
        }
    }

    /// One full recomputation pass: filter → summary → the current
    /// section's blocks. The filtered view lives only for this call.
    pub fn recompute(&mut self) {
        self.summary = None;
        self.blocks.clear();
        self.empty_selection = false;

        let Some(table) = &self.table else {
            self.visible_indices.clear();
            return;
        };
        self.visible_indices = filtered_indices(table, &self.filters);
        let view = FilteredView::new(table, &self.visible_indices);
        if view.is_empty() {
            self.empty_selection = true;
            return;
        }
        self.summary = Some(summary(&view));
        self.blocks = self.section.compute(&view);
        log::debug!(
            "recomputed {} with {} of {} rows",
            self.section.label(),
            self.visible_indices.len(),
            table.len()
        );
    }

    /// Toggle a single value in a dimension's selection.
    pub fn toggle_filter_value(&mut self, field: FilterField, value: &str) {
        let selected = self.filters.entry(field).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_owned());
        }
        self.recompute();
    }

    /// Select every value of a dimension.
    pub fn select_all(&mut self, field: FilterField) {
        if let Some(table) = &self.table {
            if let Some(all_values) = table.unique_values.get(&field) {
                self.filters.insert(field, all_values.clone());
                self.recompute();
            }
        }
    }

    /// Clear a dimension's selection (back to unrestricted).
    pub fn select_none(&mut self, field: FilterField) {
        self.filters.insert(field, BTreeSet::new());
        self.recompute();
    }
}

// ---------------------------------------------------------------------------
