// src/testlist/reader.rs
// =============================================================================
// This module parses test-list files.
//
// A test list is a CSV table with exactly six columns per row:
//   url, category_code, category_description, date_added, source, notes
//
// Most published lists start with a header row naming those columns. We skip
// it instead of trying to measure a URL called "url".
//
// A row with any other number of fields means the file is broken, and we
// refuse the whole file rather than guessing which column is which.
// =============================================================================

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of columns every row must have
pub const FIELD_COUNT: usize = 6;

const HEADER: [&str; FIELD_COUNT] = [
    "url",
    "category_code",
    "category_description",
    "date_added",
    "source",
    "notes",
];

// One row of a test list. Only `url` is measured, the other columns are
// carried into the per-entry debug log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestListEntry {
    pub url: String,
    pub category_code: String,
    pub category_description: String,
    pub date_added: String,
    pub source: String,
    pub notes: String,
}

impl TestListEntry {
    fn from_record(record: &StringRecord) -> Self {
        Self {
            url: record[0].to_string(),
            category_code: record[1].to_string(),
            category_description: record[2].to_string(),
            date_added: record[3].to_string(),
            source: record[4].to_string(),
            notes: record[5].to_string(),
        }
    }
}

/// Reads and parses the test list at `path`
pub fn read_test_list(path: &Path) -> Result<Vec<TestListEntry>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open test list {}", path.display()))?;

    parse_test_list(file).with_context(|| format!("malformed test list {}", path.display()))
}

/// Parses test-list rows from any reader
pub fn parse_test_list<R: Read>(input: R) -> Result<Vec<TestListEntry>> {
    // flexible(true) lets us report the bad row ourselves with a clear message
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut entries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;

        if record.len() != FIELD_COUNT {
            let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 1);
            bail!(
                "line {}: expected {} fields, found {}",
                line,
                FIELD_COUNT,
                record.len()
            );
        }

        if i == 0 && is_header(&record) {
            continue;
        }

        entries.push(TestListEntry::from_record(&record));
    }

    Ok(entries)
}

fn is_header(record: &StringRecord) -> bool {
    record.iter().map(str::trim).eq(HEADER.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_single_row() {
        let input = "http://x/a,CAT,desc,2020-01-01,tester,note\n";
        let entries = parse_test_list(input.as_bytes()).unwrap();

        assert_eq!(
            entries,
            vec![TestListEntry {
                url: "http://x/a".to_string(),
                category_code: "CAT".to_string(),
                category_description: "desc".to_string(),
                date_added: "2020-01-01".to_string(),
                source: "tester".to_string(),
                notes: "note".to_string(),
            }]
        );
    }

    #[test]
    fn test_header_row_is_skipped() {
        let input = "url,category_code,category_description,date_added,source,notes\n\
                     http://x/a,NEWS,News Media,2017-04-12,citizenlab,\n\
                     http://x/b,NEWS,News Media,2017-04-12,citizenlab,\n";
        let entries = parse_test_list(input.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "http://x/a");
        assert_eq!(entries[1].url, "http://x/b");
    }

    #[test]
    fn test_quoted_fields_may_contain_commas() {
        let input = "http://x/a,CAT,\"desc, with comma\",2020-01-01,tester,\"a, b\"\n";
        let entries = parse_test_list(input.as_bytes()).unwrap();

        assert_eq!(entries[0].category_description, "desc, with comma");
        assert_eq!(entries[0].notes, "a, b");
    }

    #[test]
    fn test_wrong_field_count_is_an_error() {
        let input = "http://x/a,CAT,desc,2020-01-01,tester,note\n\
                     http://x/b,CAT,desc,2020-01-01,tester\n";
        let err = parse_test_list(input.as_bytes()).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("expected 6 fields, found 5"), "{}", message);
        assert!(message.contains("line 2"), "{}", message);
    }

    #[test]
    fn test_empty_file_has_no_entries() {
        let entries = parse_test_list("".as_bytes()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.org/,GRP,Group,2019-01-01,me,").unwrap();

        let entries = read_test_list(file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://example.org/");
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_test_list(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }
}
