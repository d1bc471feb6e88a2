//! Exploratory analytics for bilateral trade and trade-quality indicators.
//!
//! One annual series per partner entity, loaded once into an immutable
//! [`data::registry::TableRegistry`]; every analysis is a stateless,
//! synchronous recomputation over it:
//!
//! * [`analysis::transform`] – identity / percent change / first difference,
//!   with a zero-guard and optional natural log
//! * [`analysis::correlate`] – complete-case Pearson correlation matrix
//! * [`analysis::describe`] – summary statistics and coefficient of variation
//! * [`analysis::composite`] – cross-entity Grubel-Lloyd ("IGL") index
//!   aggregation, maximum observation, and component ranking
//!
//! Selection UI, chart rendering, and workbook conversion to the supported
//! formats live outside this crate; the interface is
//! [`data::loader::load_workbook`] in and plain result structs out.

pub mod analysis;
pub mod data;
pub mod error;

pub use analysis::composite::{
    aggregate, CompositeAnalysis, CompositeRecord, YearFilter, COMPOSITE_COMPONENTS,
    COMPOSITE_TOTAL,
};
pub use analysis::correlate::{correlate, CorrelationMatrix};
pub use analysis::describe::{describe, DescriptiveStats};
pub use analysis::transform::{transform, TransformKind, TransformSpec};
pub use analysis::{run, AnalysisReport, AnalysisRequest};
pub use data::loader::load_workbook;
pub use data::model::{EntityTable, SeriesPoint};
pub use data::registry::{TableRegistry, AGGREGATE_ENTITY};
pub use error::AnalysisError;
