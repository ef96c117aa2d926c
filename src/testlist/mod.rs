// src/testlist/mod.rs
// =============================================================================
// This module handles test lists: the CSV files of URLs we measure.
//
// Submodules:
// - reader: Parses one CSV file into rows
// - source: Turns the rows of one file into URL entries on the URL channel
// =============================================================================

mod reader;
mod source;

pub use source::{base_name, is_legend, spawn_reader, UrlEntry};
