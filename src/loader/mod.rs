//! Declarations loader module
//!
//! Reads what a job needs harvested.
//!
//! # Overview
//!
//! The loader module provides:
//! - CSV parsing of source (`source,url`) and partition (`source,partition`) files
//! - `UnitDecl` - Inline declarations for the job file
//! - `Declarations` - Both lists, expandable into required work units
//! - Source id normalization and validation

mod parser;
mod types;

pub use parser::{
    load_declarations, normalize_source_id, read_partitions, read_sources, validate_source_id,
};
pub use types::{DeclarationColumns, Declarations, UnitDecl};
