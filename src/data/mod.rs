//! Data layer: core types, workbook loading, and the session registry.
//!
//! Architecture:
//! ```text
//!  .parquet / .json / dir of .csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse workbook → one EntityTable per sheet
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────────┐
//!   │ TableRegistry  │  immutable, keyed by entity, "TOTAL" not selectable
//!   └───────────────┘
//!        │
//!        ▼
//!   analysis layer (transform / correlate / describe / composite)
//! ```

pub mod loader;
pub mod model;
pub mod registry;
