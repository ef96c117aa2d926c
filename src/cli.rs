// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The interface is deliberately tiny: a list of test-list files and nothing
// else. Worker count, timeout and hop cap are fixed in PipelineConfig.
//
// Example:
//   url-reach lists/global.csv lists/it.csv lists/00-LEGEND-category_codes.csv
//
// Files whose name contains "00-LEGEND-" are skipped, so a whole directory
// can be passed with a shell glob.
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "url-reach",
    version,
    about = "Measure reachability of test-list URLs by walking their redirect chains",
    long_about = "url-reach reads one or more test-list CSV files, fetches every URL, follows \
                  redirects hop by hop and writes one JSON line per URL to results.jsonl."
)]
pub struct Cli {
    /// Test-list CSV files (six columns: url, category_code,
    /// category_description, date_added, source, notes)
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_positional_files() {
        let cli = Cli::try_parse_from(["url-reach", "a.csv", "dir/b.csv"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.csv"), PathBuf::from("dir/b.csv")]);
    }

    #[test]
    fn test_requires_at_least_one_file() {
        assert!(Cli::try_parse_from(["url-reach"]).is_err());
    }

    #[test]
    fn test_has_no_flags() {
        assert!(Cli::try_parse_from(["url-reach", "--workers", "5", "a.csv"]).is_err());
    }
}
