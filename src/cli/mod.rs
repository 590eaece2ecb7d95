//! Command line support for the `ingest-sql` binary

pub mod commands;
pub mod error;
