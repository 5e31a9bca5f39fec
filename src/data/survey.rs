//! Raw survey tables read from delimited text.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::ItemColumns;
use crate::errors::{Result, StudyError};

/// Header plus string records, exactly as read from the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based data row number of each record in the source file
    source_rows: Vec<usize>,
}

impl SurveyTable {
    pub fn from_path(path: &Path, delimiter: char) -> Result<Self> {
        let file = File::open(path).map_err(|e| StudyError::io_with_path(e, path))?;
        log::debug!("Reading survey table from {}", path.display());
        Self::from_reader(file, delimiter)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: char) -> Result<Self> {
        let delimiter = ascii_delimiter(delimiter)?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(StudyError::data_shape("input has no header row"));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        let source_rows = (1..=rows.len()).collect();
        Ok(Self {
            headers,
            rows,
            source_rows,
        })
    }

    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != headers.len())
        {
            return Err(StudyError::data_shape(format!(
                "row {} has {} fields, header has {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        let source_rows = (1..=rows.len()).collect();
        Ok(Self {
            headers,
            rows,
            source_rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 1-based row number of record `index` in the original file.
    pub fn source_row(&self, index: usize) -> usize {
        self.source_rows.get(index).copied().unwrap_or(index + 1)
    }

    /// Index of the column with the given header.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                StudyError::data_shape(format!(
                    "column '{}' not found (available: {})",
                    name,
                    self.headers.join(", ")
                ))
            })
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Resolve an item selection to column indices, in item order.
    pub fn resolve_items(&self, items: &ItemColumns) -> Result<Vec<usize>> {
        match items {
            ItemColumns::Positions { first, last } => {
                if *first == 0 || *last > self.headers.len() || first > last {
                    return Err(StudyError::data_shape(format!(
                        "item columns {}..={} are outside the table's {} columns",
                        first,
                        last,
                        self.headers.len()
                    )));
                }
                Ok((*first - 1..*last).collect())
            }
            ItemColumns::Named { columns } => {
                let lookup: HashMap<&str, usize> = self
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.as_str(), i))
                    .collect();
                let missing: Vec<&str> = columns
                    .iter()
                    .filter(|c| !lookup.contains_key(c.as_str()))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(StudyError::data_shape(format!(
                        "item columns not found: {}",
                        missing.join(", ")
                    )));
                }
                Ok(columns.iter().map(|c| lookup[c.as_str()]).collect())
            }
        }
    }

    /// New table holding only the rows at `keep`, in that order.
    pub fn select_rows(&self, keep: &[usize]) -> SurveyTable {
        SurveyTable {
            headers: self.headers.clone(),
            rows: keep.iter().map(|&i| self.rows[i].clone()).collect(),
            source_rows: keep.iter().map(|&i| self.source_row(i)).collect(),
        }
    }
}

fn ascii_delimiter(delimiter: char) -> Result<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(StudyError::config(format!(
            "delimiter '{}' is not an ASCII character",
            delimiter
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn sample() -> SurveyTable {
        let text = indoc! {"
            id,consent,q1,q2
            1,Yes,3,4
            2,No,1,2
            3,Yes,5,5
        "};
        SurveyTable::from_reader(text.as_bytes(), ',').unwrap()
    }

    #[test]
    fn test_reads_headers_and_rows() {
        let table = sample();
        assert_eq!(table.headers(), &["id", "consent", "q1", "q2"]);
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column("consent").unwrap(), vec!["Yes", "No", "Yes"]);
    }

    #[test]
    fn test_missing_column_is_data_shape() {
        let err = sample().column("age").unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_resolve_positions_and_names() {
        let table = sample();
        let by_pos = table
            .resolve_items(&ItemColumns::Positions { first: 3, last: 4 })
            .unwrap();
        assert_eq!(by_pos, vec![2, 3]);

        let by_name = table
            .resolve_items(&ItemColumns::Named {
                columns: vec!["q2".into(), "q1".into()],
            })
            .unwrap();
        assert_eq!(by_name, vec![3, 2]);
    }

    #[test]
    fn test_positions_beyond_table_rejected() {
        let err = sample()
            .resolve_items(&ItemColumns::Positions { first: 3, last: 9 })
            .unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let text = "a,b\n1,2\n3\n";
        assert!(SurveyTable::from_reader(text.as_bytes(), ',').is_err());
    }

    #[test]
    fn test_select_rows_keeps_source_numbers() {
        let table = sample().select_rows(&[0, 2]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.source_row(1), 3);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let table = SurveyTable::from_reader("a;b\n1;2\n".as_bytes(), ';').unwrap();
        assert_eq!(table.column("b").unwrap(), vec!["2"]);
    }
}
