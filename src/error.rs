use thiserror::Error;

// ---------------------------------------------------------------------------
// AnalysisError – recoverable, caller-branchable outcomes
// ---------------------------------------------------------------------------

/// Non-fatal analysis failures.
///
/// Every variant here is a data-content problem the caller recovers from by
/// changing its selection (different entity, variables, or year). Load-time
/// structural problems are *not* represented here; the loader reports those
/// fatally through `anyhow`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The requested entity has no table in the registry (or is the
    /// reserved aggregate, which is never selectable).
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// A requested variable is not a numeric column of the table.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// The composite-index schema is incomplete for the requested slice.
    #[error("missing required composite-index columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// No rows survived transformation / complete-case / year filtering.
    /// Distinct from a computed-but-trivial result.
    #[error("no valid data after filtering")]
    EmptyAfterFilter,
}
