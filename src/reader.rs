use crate::config::CSV_DELIMITER;
use anyhow::{Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One spreadsheet row keyed by column header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: FxHashMap<String, String>,
}

impl Record {
    fn from_parts(headers: &StringRecord, row: &StringRecord) -> Self {
        let values = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    /// Raw cell value, untouched
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Trimmed cell value, `None` when the column is absent or blank
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A `;`-delimited sheet loaded from disk.
///
/// A missing or whitespace-only file opens as an empty sheet. Iteration is
/// lazy and [`Sheet::records`] can be called any number of times; each call
/// starts again from the first data row.
#[derive(Debug)]
pub struct Sheet {
    path: PathBuf,
    content: Option<String>,
}

impl Sheet {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!(path = %path.display(), "Sheet not found, treating as empty");
            return Ok(Self {
                path,
                content: None,
            });
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sheet: {}", path.display()))?;
        let raw = match raw.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => raw,
        };

        let content = if raw.trim().is_empty() {
            debug!(path = %path.display(), "Sheet is blank, treating as empty");
            None
        } else {
            Some(raw)
        };

        Ok(Self { path, content })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    pub fn records(&self) -> Records<'_> {
        let state = match self.content {
            Some(_) => State::Pending,
            None => State::Done,
        };
        Records { sheet: self, state }
    }
}

enum State<'a> {
    Pending,
    Reading {
        reader: Reader<&'a [u8]>,
        headers: StringRecord,
    },
    Done,
}

/// Iterator over the data rows of a [`Sheet`]
pub struct Records<'a> {
    sheet: &'a Sheet,
    state: State<'a>,
}

impl<'a> Records<'a> {
    fn start(&mut self) -> Result<()> {
        let sheet = self.sheet;
        let content = sheet.content.as_deref().unwrap_or_default();
        let mut reader = ReaderBuilder::new()
            .delimiter(CSV_DELIMITER)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", sheet.path.display()))?
            .clone();
        self.state = State::Reading { reader, headers };
        Ok(())
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, State::Pending) {
            if let Err(e) = self.start() {
                self.state = State::Done;
                return Some(Err(e));
            }
        }

        let State::Reading { reader, headers } = &mut self.state else {
            return None;
        };

        let mut row = StringRecord::new();
        match reader.read_record(&mut row) {
            Ok(true) => Some(Ok(Record::from_parts(headers, &row))),
            Ok(false) => {
                self.state = State::Done;
                None
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                let path = self.sheet.path.display().to_string();
                self.state = State::Done;
                Some(Err(anyhow::Error::new(e)
                    .context(format!("Malformed row near line {line} of {path}"))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_sheet(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let sheet = Sheet::open(dir.path().join("nope.csv"))?;
        assert!(sheet.is_empty());
        assert_eq!(sheet.records().count(), 0);
        Ok(())
    }

    #[test]
    fn whitespace_file_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "blank.csv", "  \n\n \t\n");
        let sheet = Sheet::open(path)?;
        assert!(sheet.is_empty());
        assert_eq!(sheet.records().count(), 0);
        Ok(())
    }

    #[test]
    fn reads_semicolon_rows_with_header() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(
            &dir,
            "Eventi.csv",
            "form_record_id;Titolo;Data\n1;Concerto;2024-05-01\n2;Mostra;\n",
        );
        let sheet = Sheet::open(path)?;
        let rows: Vec<Record> = sheet.records().collect::<Result<_>>()?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Titolo"), Some("Concerto"));
        assert_eq!(rows[0].get("Data"), Some("2024-05-01"));
        assert_eq!(rows[1].get("Data"), Some(""));
        assert_eq!(rows[1].text("Data"), None);
        Ok(())
    }

    #[test]
    fn records_restart_from_the_top() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "a.csv", "Nome\nA\nB\n");
        let sheet = Sheet::open(path)?;

        let first: Vec<_> = sheet.records().collect::<Result<_>>()?;
        let second: Vec<_> = sheet.records().collect::<Result<_>>()?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        Ok(())
    }

    #[test]
    fn strips_bom_and_trims_headers() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "bom.csv", "\u{feff}form_record_id ; Nome\n7;Maria\n");
        let sheet = Sheet::open(path)?;
        let rows: Vec<Record> = sheet.records().collect::<Result<_>>()?;

        assert_eq!(rows[0].get("form_record_id"), Some("7"));
        assert_eq!(rows[0].get("Nome"), Some("Maria"));
        Ok(())
    }

    #[test]
    fn quoted_fields_keep_delimiters() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "q.csv", "Titolo;Tag\n\"Uno; due\";\"jazz, rock\"\n");
        let sheet = Sheet::open(path)?;
        let rows: Vec<Record> = sheet.records().collect::<Result<_>>()?;

        assert_eq!(rows[0].get("Titolo"), Some("Uno; due"));
        assert_eq!(rows[0].get("Tag"), Some("jazz, rock"));
        Ok(())
    }

    #[test]
    fn short_rows_leave_columns_absent() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "short.csv", "a;b;c\n1;2\n");
        let sheet = Sheet::open(path)?;
        let rows: Vec<Record> = sheet.records().collect::<Result<_>>()?;

        assert_eq!(rows[0].get("b"), Some("2"));
        assert_eq!(rows[0].get("c"), None);
        Ok(())
    }

    #[test]
    fn skips_blank_lines() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_sheet(&dir, "gaps.csv", "Nome\nA\n\nB\n\n");
        let sheet = Sheet::open(path)?;
        assert_eq!(sheet.records().count(), 2);
        Ok(())
    }
}
