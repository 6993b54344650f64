//! Workbook abstraction over spreadsheet and delimited-text files.
//!
//! Spreadsheets (xlsx, xlsm, xlsb, xls, ods) are read with calamine;
//! delimited text (csv, tsv, txt) goes through the auto-detecting parser and
//! yields a single sheet named after the file stem.

use calamine::{Data, Range, Reader};
use chrono::Timelike;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;

use super::parse_delimited_auto;
use crate::error::{WorkbookError, WorkbookResult};
use crate::models::{CellValue, RawGrid};

/// How a file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbookFormat {
    Spreadsheet,
    Delimited,
}

/// Pick the reader from the file extension.
pub fn format_for(file_name: &str) -> WorkbookResult<WorkbookFormat> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(WorkbookFormat::Spreadsheet),
        "csv" | "tsv" | "txt" => Ok(WorkbookFormat::Delimited),
        _ => Err(WorkbookError::UnsupportedFormat(file_name.to_string())),
    }
}

/// One named sheet and its raw grid.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: RawGrid,
}

/// A loaded workbook. Immutable once read.
#[derive(Debug, Clone)]
pub struct Workbook {
    file_name: String,
    format: WorkbookFormat,
    sheets: Vec<Sheet>,
    /// Detected text encoding (delimited files only)
    pub encoding: Option<String>,
    /// Detected delimiter (delimited files only)
    pub delimiter: Option<char>,
}

impl Workbook {
    /// Build a workbook from already-read sheets. At least one sheet is required.
    pub fn new(
        file_name: impl Into<String>,
        format: WorkbookFormat,
        sheets: Vec<Sheet>,
    ) -> WorkbookResult<Self> {
        if sheets.is_empty() {
            return Err(WorkbookError::NoSheets);
        }
        Ok(Self {
            file_name: file_name.into(),
            format,
            sheets,
            encoding: None,
            delimiter: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> WorkbookFormat {
        self.format
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn first_sheet_name(&self) -> &str {
        // `new` guarantees at least one sheet
        self.sheets.first().map(|s| s.name.as_str()).unwrap_or_default()
    }

    /// Raw grid of a sheet, by name.
    pub fn grid(&self, sheet_name: &str) -> Option<&RawGrid> {
        self.sheets
            .iter()
            .find(|s| s.name == sheet_name)
            .map(|s| &s.grid)
    }
}

/// Read a workbook from memory. The file name selects the reader.
pub fn read_workbook_bytes(bytes: &[u8], file_name: &str) -> WorkbookResult<Workbook> {
    if bytes.is_empty() {
        return Err(WorkbookError::EmptyFile);
    }

    match format_for(file_name)? {
        WorkbookFormat::Spreadsheet => read_spreadsheet(bytes, file_name),
        WorkbookFormat::Delimited => {
            let parsed = parse_delimited_auto(bytes)?;
            let sheet_name = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("Sheet1")
                .to_string();

            let mut workbook = Workbook::new(
                file_name,
                WorkbookFormat::Delimited,
                vec![Sheet {
                    name: sheet_name,
                    grid: parsed.grid,
                }],
            )?;
            workbook.encoding = Some(parsed.encoding);
            workbook.delimiter = Some(parsed.delimiter);
            Ok(workbook)
        }
    }
}

/// Read a workbook from disk.
pub fn read_workbook_file<P: AsRef<Path>>(path: P) -> WorkbookResult<Workbook> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    read_workbook_bytes(&bytes, file_name)
}

fn read_spreadsheet(bytes: &[u8], file_name: &str) -> WorkbookResult<Workbook> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        sheets.push(Sheet {
            grid: range_to_grid(&range),
            name,
        });
    }

    Workbook::new(file_name, WorkbookFormat::Spreadsheet, sheets)
}

/// Copy a calamine range into a grid anchored at A1.
///
/// calamine trims leading blank rows and columns; they are restored as empty
/// cells so header-row indices count from the top of the sheet.
fn range_to_grid(range: &Range<Data>) -> RawGrid {
    let Some((end_row, end_col)) = range.end() else {
        return Vec::new();
    };

    (0..=end_row)
        .map(|r| {
            (0..=end_col)
                .map(|c| range.get_value((r, c)).map(cell_from_data).unwrap_or_default())
                .collect()
        })
        .collect()
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.num_seconds_from_midnight() == 0 && ndt.nanosecond() == 0 => {
                CellValue::String(ndt.format("%Y-%m-%d").to_string())
            }
            Some(ndt) => CellValue::String(ndt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_for("a.XLSX").unwrap(), WorkbookFormat::Spreadsheet);
        assert_eq!(format_for("a.ods").unwrap(), WorkbookFormat::Spreadsheet);
        assert_eq!(format_for("a.csv").unwrap(), WorkbookFormat::Delimited);
        assert!(matches!(
            format_for("a.pdf"),
            Err(WorkbookError::UnsupportedFormat(_))
        ));
        assert!(format_for("noext").is_err());
    }

    #[test]
    fn test_csv_workbook_has_one_sheet() {
        let wb = read_workbook_bytes(b"id;name\n1;Alice", "people.csv").unwrap();

        assert_eq!(wb.sheet_names(), vec!["people".to_string()]);
        assert_eq!(wb.first_sheet_name(), "people");
        assert_eq!(wb.format(), WorkbookFormat::Delimited);
        assert_eq!(wb.delimiter, Some(';'));
        assert_eq!(wb.grid("people").unwrap().len(), 2);
        assert!(wb.grid("Sheet2").is_none());
    }

    #[test]
    fn test_csv_header_row_counts_blank_lines() {
        let wb = read_workbook_bytes(b"Report\n\nName,Age\nAnn,3\n", "r.csv").unwrap();
        let grid = wb.grid("r").unwrap();
        assert_eq!(grid.len(), 4);

        let table = crate::parser::normalize(grid, 2, wb.file_name());
        assert_eq!(table.headers, vec!["Name", "Age"]);
        assert_eq!(table.rows[0].get("Age"), Some(&CellValue::from("3")));
    }

    #[test]
    fn test_empty_file_is_parse_failure() {
        assert!(matches!(
            read_workbook_bytes(b"", "x.csv"),
            Err(WorkbookError::EmptyFile)
        ));
    }

    #[test]
    fn test_corrupt_spreadsheet_is_parse_failure() {
        let result = read_workbook_bytes(b"definitely not a zip archive", "broken.xlsx");
        assert!(matches!(result, Err(WorkbookError::Spreadsheet(_))));
    }

    #[test]
    fn test_workbook_requires_sheets() {
        let result = Workbook::new("x.xlsx", WorkbookFormat::Spreadsheet, Vec::new());
        assert!(matches!(result, Err(WorkbookError::NoSheets)));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"order,qty\nA1,3\n").unwrap();

        let wb = read_workbook_file(&path).unwrap();
        assert_eq!(wb.file_name(), "orders.csv");
        assert_eq!(wb.grid("orders").unwrap()[1][1], CellValue::from("3"));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(cell_from_data(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(cell_from_data(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2024-01-02".into())),
            CellValue::from("2024-01-02")
        );
    }

    #[test]
    fn test_range_anchored_at_a1() {
        let mut range = Range::new((1, 1), (2, 2));
        range.set_value((1, 1), Data::String("h".into()));
        range.set_value((2, 2), Data::Float(1.5));

        let grid = range_to_grid(&range);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec![CellValue::Empty; 3]);
        assert_eq!(grid[1][1], CellValue::from("h"));
        assert_eq!(grid[2][2], CellValue::Number(1.5));
    }
}
