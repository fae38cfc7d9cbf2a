//! Dataset loading
//!
//! CSV is the canonical on-disk form. Excel uploads are converted to CSV as
//! soon as they arrive so training never reads a workbook directly.

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::{ColumnData, Dataset};
use crate::error::{AutomlError, Result};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Detect the format from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "xlsx" | "xls" => Some(FileFormat::Excel),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension_of(path);
        Self::from_extension(&ext)
            .ok_or_else(|| AutomlError::UnsupportedFormat(format!("Unsupported file format: {}", ext)))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// A dataset together with the canonical CSV it was read from
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub path: PathBuf,
}

/// Loads uploaded files into datasets
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    uploads_dir: PathBuf,
}

impl DatasetLoader {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Store uploaded bytes under a fresh unique name, keeping the extension.
    pub fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let ext = extension_of(Path::new(file_name));
        if FileFormat::from_extension(&ext).is_none() {
            return Err(AutomlError::UnsupportedFormat(
                "Only CSV and Excel files are supported".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.uploads_dir)?;
        let path = self.uploads_dir.join(format!("{}{}", Uuid::new_v4(), ext));
        std::fs::write(&path, bytes)?;

        info!(path = %path.display(), size_bytes = bytes.len(), "Saved uploaded file");
        Ok(path)
    }

    /// Load a file, converting Excel to CSV first.
    pub fn ingest(&self, path: &Path) -> Result<LoadedDataset> {
        let csv_path = match FileFormat::from_path(path)? {
            FileFormat::Csv => path.to_path_buf(),
            FileFormat::Excel => self.convert_excel_to_csv(path)?,
        };

        let dataset = Self::read_csv(&csv_path)?;
        info!(
            path = %csv_path.display(),
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            "Loaded dataset"
        );
        Ok(LoadedDataset { dataset, path: csv_path })
    }

    /// Load a file in place without writing a converted copy.
    pub fn load(path: &Path) -> Result<Dataset> {
        match FileFormat::from_path(path)? {
            FileFormat::Csv => Self::read_csv(path),
            FileFormat::Excel => Self::read_excel(path),
        }
    }

    /// Convert the first sheet of a workbook to `<uploads>/<uuid>.csv`.
    pub fn convert_excel_to_csv(&self, path: &Path) -> Result<PathBuf> {
        let dataset = Self::read_excel(path)?;

        std::fs::create_dir_all(&self.uploads_dir)?;
        let csv_path = self.uploads_dir.join(format!("{}.csv", Uuid::new_v4()));
        dataset.write_csv(&csv_path)?;

        info!(source = %path.display(), csv = %csv_path.display(), "Converted Excel to CSV");
        Ok(csv_path)
    }

    pub fn read_csv(path: &Path) -> Result<Dataset> {
        if std::fs::metadata(path)?.len() == 0 {
            return Ok(Dataset::from_frame(DataFrame::empty()));
        }

        let file = File::open(path)?;
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .into_reader_with_file_handle(file)
            .finish()?;

        Ok(Dataset::from_frame(frame))
    }

    /// Read the first sheet; a column is numeric when every non-empty cell is.
    pub fn read_excel(path: &Path) -> Result<Dataset> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AutomlError::Data("Excel workbook has no sheets".to_string()))?;
        let range = workbook.worksheet_range(&sheet)?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(cells) => cells
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell {
                    Data::Empty => format!("column_{}", i),
                    other => other.to_string(),
                })
                .collect(),
            None => return Ok(Dataset::from_frame(DataFrame::empty())),
        };
        let body: Vec<&[Data]> = rows.collect();

        let columns = header
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<&Data> = body
                    .iter()
                    .map(|row| row.get(idx).unwrap_or(&Data::Empty))
                    .collect();
                (name, excel_column(&cells))
            })
            .collect();

        Dataset::from_columns(columns)
    }
}

fn excel_column(cells: &[&Data]) -> ColumnData {
    let numeric = cells
        .iter()
        .all(|c| matches!(c, Data::Int(_) | Data::Float(_) | Data::Bool(_) | Data::Empty));

    if numeric {
        ColumnData::Numeric(
            cells
                .iter()
                .map(|c| match c {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                })
                .collect(),
        )
    } else {
        ColumnData::Text(
            cells
                .iter()
                .map(|c| match c {
                    Data::Empty => None,
                    Data::String(s) if s.is_empty() => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension(".csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("XLSX"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension(".xls"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension(".parquet"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = FileFormat::from_path(Path::new("data.txt")).unwrap_err();
        assert!(matches!(err, AutomlError::UnsupportedFormat(_)));
        assert_eq!(err.to_string(), "Unsupported file format: .txt");
    }

    #[test]
    fn test_save_upload_rejects_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let err = loader.save_upload("notes.json", b"{}").unwrap_err();
        assert_eq!(err.to_string(), "Only CSV and Excel files are supported");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_and_ingest_csv() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let path = loader
            .save_upload("Loans.CSV", b"age,income,approved\n30,50000,1\n41,62000,0\n")
            .unwrap();
        assert_eq!(extension_of(&path), ".csv");

        let loaded = loader.ingest(&path).unwrap();
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.dataset.n_rows(), 2);
        assert_eq!(loaded.dataset.column_names(), vec!["age", "income", "approved"]);
    }

    #[test]
    fn test_empty_csv_loads_as_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, b"").unwrap();
        assert!(DatasetLoader::read_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_ingest_excel_converts_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let bytes = std::fs::read(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/cities.xlsx"),
        )
        .unwrap();
        let source = loader.save_upload("cities.xlsx", &bytes).unwrap();

        let loaded = loader.ingest(&source).unwrap();
        assert_eq!(extension_of(&loaded.path), ".csv");
        assert_eq!(loaded.path.parent(), Some(dir.path()));
        assert_ne!(loaded.path, source);
        assert!(loaded.path.exists());
        assert!(source.exists());

        assert_eq!(loaded.dataset.column_names(), vec!["x", "city", "y"]);
        assert_eq!(loaded.dataset.n_rows(), 20);
        assert!(loaded.dataset.column("x").unwrap().is_numeric());
        assert!(!loaded.dataset.column("city").unwrap().is_numeric());

        // The converted file reads back the same as the workbook
        let reread = DatasetLoader::read_csv(&loaded.path).unwrap();
        assert_eq!(reread.column_names(), loaded.dataset.column_names());
        assert_eq!(reread.n_rows(), 20);
    }

    #[test]
    fn test_excel_column_typing() {
        let a = Data::Int(3);
        let b = Data::Float(2.5);
        let e = Data::Empty;
        assert_eq!(
            excel_column(&[&a, &b, &e]),
            ColumnData::Numeric(vec![Some(3.0), Some(2.5), None])
        );

        let s = Data::String("yes".to_string());
        assert_eq!(
            excel_column(&[&s, &a]),
            ColumnData::Text(vec![Some("yes".to_string()), Some("3".to_string())])
        );
    }
}
