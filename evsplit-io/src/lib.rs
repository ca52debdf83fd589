//! evsplit-io: File input and output for evsplit.
//!
//! This crate loads event workspaces, splitters and configurations from
//! JSON, calibration tables from CSV, and writes filter results as CSV
//! plus a JSON summary.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{
    parse_calibration, parse_config, parse_splitter, parse_workspace, read_calibration,
    read_config, read_splitter, read_workspace, SplitterFile,
};
pub use writer::{OutputWriter, CORRECTIONS_FILE, SUMMARY_FILE};
