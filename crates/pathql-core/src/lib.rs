//! Core types for pathql
//!
//! This crate provides the fact-base types shared by the pathql crates:
//!
//! - [`Value`] - A tagged attribute value (string, number, bool, list, null)
//! - [`Row`] - One entity instance as a flat attribute mapping
//! - [`EntityData`] - Entity type name to its ordered rows
//!
//! # Example
//!
//! ```
//! use pathql_core::{row, row_identity, EntityData};
//!
//! let mut data = EntityData::new();
//! data.insert("class".to_string(), vec![row! { "id" => 1, "name" => "MyClass" }]);
//!
//! let class = &data["class"][0];
//! assert_eq!(row_identity(class).as_deref(), Some("1"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod row;
pub mod value;

pub use row::{foreign_key, merge_rows, references, row_identity, EntityData, Row, ID_FIELD};
pub use value::Value;
