use thiserror::Error;

// ---------------------------------------------------------------------------
// Failure kinds
// ---------------------------------------------------------------------------

/// Everything that can go wrong between the data source and a rendered
/// chart. Each variant is terminal for its own scope and is surfaced to the
/// user rather than retried:
///
/// * [`DataError::DataSource`] – the load failed; fatal for the session's
///   dataset, shown in the top bar.
/// * [`DataError::EmptyResult`] – the active filters exclude every row;
///   recoverable, shown as a warning, downstream aggregation skipped.
/// * [`DataError::ViewComputation`] – one view's aggregation failed; caught
///   per block and reported inline without disturbing sibling views.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to load observation data: {0:#}")]
    DataSource(#[from] anyhow::Error),

    #[error("No data found for the selected combination. Try adjusting your filters.")]
    EmptyResult,

    #[error("{view}: {message}")]
    ViewComputation { view: String, message: String },
}

impl DataError {
    /// Per-view failure with the label the block is rendered under.
    pub fn view(view: impl Into<String>, message: impl Into<String>) -> Self {
        DataError::ViewComputation {
            view: view.into(),
            message: message.into(),
        }
    }
}
