//! Header-addressed CSV tables
//!
//! The raw Transfermarkt and FBref exports vary in column order and coverage,
//! so the preparation steps work on loosely-typed rows keyed by header name
//! and only convert to domain records once the columns are known.

use crate::{Result, TransferError};
use std::collections::HashMap;
use std::path::Path;

/// An in-memory CSV table with string cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Read a CSV file; duplicate headers get `.1`, `.2` suffixes and short
    /// rows are padded with empty cells
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path.as_ref())?;

        let headers = dedupe_headers(reader.headers()?.iter());
        let width = headers.len();
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Table { headers, rows })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Exact header match first, then ASCII case-insensitive
    pub fn column_ignore_case(&self, name: &str) -> Option<usize> {
        self.column(name).or_else(|| {
            self.headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        })
    }

    /// Column index, or a `MissingColumn` error naming `source`
    pub fn require(&self, name: &str, source: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| TransferError::MissingColumn {
            column: name.to_string(),
            source_name: source.to_string(),
        })
    }

    /// Trimmed, non-empty cell value
    pub fn cell(&self, row: usize, col: Option<usize>) -> Option<&str> {
        let value = self.rows.get(row)?.get(col?)?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("nan") {
            None
        } else {
            Some(value)
        }
    }

    pub fn number(&self, row: usize, col: Option<usize>) -> Option<f64> {
        self.cell(row, col).and_then(parse_number)
    }

    /// Remove columns where every cell is empty
    pub fn drop_empty_columns(&mut self) {
        let keep: Vec<bool> = (0..self.headers.len())
            .map(|c| {
                self.rows
                    .iter()
                    .any(|row| row.get(c).is_some_and(|v| !v.trim().is_empty()))
            })
            .collect();
        self.retain_columns(|idx, _| keep[idx]);
    }

    /// Remove exported index columns such as `Unnamed: 0`
    pub fn drop_unnamed_columns(&mut self) {
        self.retain_columns(|_, name| !name.contains("Unnamed"));
    }

    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, &str) -> bool,
    {
        let mask: Vec<bool> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| keep(idx, name))
            .collect();

        if mask.iter().all(|&k| k) {
            return;
        }

        self.headers = retain_by_mask(std::mem::take(&mut self.headers), &mask);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &mask);
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Set a column to the same value on every row, adding it if absent
    pub fn set_constant(&mut self, name: &str, value: &str) {
        let idx = match self.column(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for row in &mut self.rows {
            row[idx] = value.to_string();
        }
    }

    /// Stack another table below this one, taking the union of columns
    pub fn append(&mut self, other: Table) {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        for header in &other.headers {
            if self.column(header).is_none() {
                self.headers.push(header.clone());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }

        let positions: Vec<usize> = other
            .headers
            .iter()
            .filter_map(|h| self.column(h))
            .collect();
        let width = self.headers.len();

        for row in other.rows {
            let mut merged = vec![String::new(); width];
            for (value, &pos) in row.into_iter().zip(positions.iter()) {
                merged[pos] = value;
            }
            self.rows.push(merged);
        }
    }

    /// Count of rows per distinct value in a column, largest first
    pub fn value_counts(&self, name: &str) -> Vec<(String, usize)> {
        let Some(col) = self.column(name) else {
            return Vec::new();
        };
        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in 0..self.len() {
            if let Some(value) = self.cell(row, Some(col)) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

fn retain_by_mask<T>(items: Vec<T>, mask: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(mask.iter())
        .filter_map(|(item, &keep)| keep.then_some(item))
        .collect()
}

fn dedupe_headers<'a, I>(headers: I) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .map(|h| {
            let count = seen.entry(h.to_string()).or_insert(0);
            let name = if *count == 0 {
                h.to_string()
            } else {
                format!("{}.{}", h, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Parse a numeric cell, tolerating thousands separators and stray spaces
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Format a float for CSV output without trailing noise
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number(" 2 500 "), Some(2500.0));
        assert_eq!(parse_number("0.45"), Some(0.45));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_read_dedupes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Player,Gls,Ast,Gls").unwrap();
        writeln!(file, "A,3,1,0.2").unwrap();
        writeln!(file, "B,5").unwrap();

        let table = Table::read(&path).unwrap();
        assert_eq!(table.headers, vec!["Player", "Gls", "Ast", "Gls.1"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, table.column("Ast")), None);
    }

    #[test]
    fn test_drop_empty_and_unnamed_columns() {
        let mut t = table(
            &["Unnamed: 0", "Player", "Empty", "Fee"],
            &[&["0", "A", "", "10"], &["1", "B", " ", "20"]],
        );
        t.drop_empty_columns();
        t.drop_unnamed_columns();
        assert_eq!(t.headers, vec!["Player", "Fee"]);
        assert_eq!(t.rows[1], vec!["B", "20"]);
    }

    #[test]
    fn test_append_unions_columns() {
        let mut a = table(&["Player", "Fee"], &[&["A", "10"]]);
        let b = table(&["Fee", "Player", "Age"], &[&["20", "B", "23"]]);
        a.append(b);
        assert_eq!(a.headers, vec!["Player", "Fee", "Age"]);
        assert_eq!(a.rows[0], vec!["A", "10", ""]);
        assert_eq!(a.rows[1], vec!["B", "20", "23"]);
    }

    #[test]
    fn test_value_counts() {
        let t = table(&["League"], &[&["Serie A"], &["La Liga"], &["Serie A"]]);
        let counts = t.value_counts("League");
        assert_eq!(counts[0], ("Serie A".to_string(), 2));
        assert_eq!(counts[1], ("La Liga".to_string(), 1));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let t = table(&["Player", "Club"], &[&["A, Jr", "X"]]);
        t.write(&path).unwrap();
        assert_eq!(Table::read(&path).unwrap(), t);
    }
}
