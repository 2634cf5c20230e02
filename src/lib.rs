//! Loads a typed delimited text file into a destination table.
//!
//! The first row of the input names the columns and the second row declares
//! their types (`int64`, `float64`, `bool`, `string`, `date`, `timestamp`).
//! Every following row is decoded into a typed record, and all records are
//! upserted in one transaction. Any bad row aborts the load before anything
//! is written.

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod source;
pub mod util;
