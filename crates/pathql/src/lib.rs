//! pathql CLI tools.
//!
//! This crate provides the `pathql-query` command, which runs queries
//! against a JSON fact base describing code entities and their
//! relationships.
//!
//! # Example Usage
//!
//! ```bash
//! pathql-query facts.json 'FROM class AS c WHERE c.methodCount > 10 SELECT c'
//! pathql-query facts.json -F query.pql --format json
//! pathql-query facts.json  # Interactive mode
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod facts;
pub mod report;
