//! Workbook reading and sheet normalization.
//!
//! - [`workbook`] - Spreadsheet (calamine) and delimited-text readers
//! - [`normalize`] - Raw grid + header row → [`CanonicalTable`](crate::models::CanonicalTable)
//!
//! Delimited text goes through encoding and delimiter auto-detection before
//! being split into a [`RawGrid`].

pub mod normalize;
pub mod workbook;

pub use normalize::normalize;
pub use workbook::{
    format_for, read_workbook_bytes, read_workbook_file, Sheet, Workbook, WorkbookFormat,
};

use crate::error::{WorkbookError, WorkbookResult};
use crate::models::{CellValue, RawGrid};

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown labels fall back to lossy UTF-8. A leading byte-order mark is
/// dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the first line has none of the candidates.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Split delimited text into a raw grid.
///
/// Quoted fields are honoured, rows may have different lengths and empty
/// fields become [`CellValue::Empty`]. Values are kept untrimmed.
///
/// Blank lines become empty rows so row indices count lines from the top
/// of the file. Trailing blank lines are dropped.
pub fn parse_delimited(content: &str, delimiter: char) -> WorkbookResult<RawGrid> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            WorkbookError::UnsupportedFormat(format!("non-ASCII delimiter '{}'", delimiter))
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    // The csv reader skips blank lines; walk the lines alongside it and put
    // them back.
    let mut records = reader.records();
    let mut grid = Vec::new();
    for line in record_lines(content, char::from(delimiter)) {
        if line.is_empty() {
            grid.push(Vec::new());
            continue;
        }
        match records.next() {
            Some(record) => grid.push(row_from_record(&record?)),
            None => break,
        }
    }
    for record in records {
        grid.push(row_from_record(&record?));
    }

    while grid.last().is_some_and(Vec::is_empty) {
        grid.pop();
    }

    Ok(grid)
}

fn row_from_record(record: &csv::StringRecord) -> Vec<CellValue> {
    record
        .iter()
        .map(|field| {
            if field.is_empty() {
                CellValue::Empty
            } else {
                CellValue::from(field)
            }
        })
        .collect()
}

/// Split text into record lines, without terminators.
///
/// `\n`, `\r\n` and `\r` end a line unless inside a quoted field. A quote
/// only opens a field at its start, as the csv reader does.
fn record_lines(content: &str, delimiter: char) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = content.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek().is_some_and(|&(_, next)| next == '"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }

        match c {
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
            }
            '\n' | '\r' => {
                lines.push(&content[start..i]);
                let mut end = i + 1;
                if c == '\r' {
                    if let Some(&(j, '\n')) = chars.peek() {
                        chars.next();
                        end = j + 1;
                    }
                }
                start = end;
                field_start = true;
            }
            c if c == delimiter => field_start = true,
            _ => field_start = false,
        }
    }

    if start < content.len() {
        lines.push(&content[start..]);
    }
    lines
}

/// Decoded delimited text with the settings that were detected.
#[derive(Debug, Clone)]
pub struct DelimitedText {
    pub grid: RawGrid,
    pub encoding: String,
    pub delimiter: char,
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_delimited_auto(bytes: &[u8]) -> WorkbookResult<DelimitedText> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let grid = parse_delimited(&content, delimiter)?;

    Ok(DelimitedText {
        grid,
        encoding,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_grid() {
        let grid = parse_delimited("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec![CellValue::from("name"), CellValue::from("age")]);
        assert_eq!(grid[2][1], CellValue::from("25"));
    }

    #[test]
    fn test_quoted_values() {
        let grid = parse_delimited("name,value\n\"Smith, Alice\",\"Hello World\"", ',').unwrap();

        assert_eq!(grid[1][0], CellValue::from("Smith, Alice"));
        assert_eq!(grid[1][1], CellValue::from("Hello World"));
    }

    #[test]
    fn test_missing_values_are_empty() {
        let grid = parse_delimited("a;b;c\n1;;3", ';').unwrap();

        assert_eq!(grid[1][0], CellValue::from("1"));
        assert_eq!(grid[1][1], CellValue::Empty);
        assert_eq!(grid[1][2], CellValue::from("3"));
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let grid = parse_delimited("a;b\n1\n1;2;3;4", ';').unwrap();

        assert_eq!(grid[1].len(), 1);
        assert_eq!(grid[2].len(), 4);
    }

    #[test]
    fn test_blank_lines_keep_row_indices() {
        let grid = parse_delimited("Report\n\nName,Age\nAnn,3\n", ',').unwrap();

        assert_eq!(grid.len(), 4);
        assert!(grid[1].is_empty());
        assert_eq!(grid[2], vec![CellValue::from("Name"), CellValue::from("Age")]);
        assert_eq!(grid[3][1], CellValue::from("3"));
    }

    #[test]
    fn test_blank_lines_with_crlf_and_quoted_newlines() {
        let content = "a,b\r\n\"x\n\ny\",2\r\n\r\nc,3\r\n\r\n";
        let grid = parse_delimited(content, ',').unwrap();

        assert_eq!(grid.len(), 4);
        assert_eq!(grid[1][0], CellValue::from("x\n\ny"));
        assert!(grid[2].is_empty());
        assert_eq!(grid[3], vec![CellValue::from("c"), CellValue::from("3")]);
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let grid = parse_delimited("size,qty\n5\",1\n\n6,2", ',').unwrap();

        assert_eq!(grid.len(), 4);
        assert_eq!(grid[1][0], CellValue::from("5\""));
        assert!(grid[2].is_empty());
        assert_eq!(grid[3][0], CellValue::from("6"));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(parse_delimited("a，b", '，').is_err());
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_detect_delimiter_single_column() {
        assert_eq!(detect_delimiter("name\nAlice"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_delimited_auto("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.grid.len(), 3);
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFid,name\n1,x";
        let result = parse_delimited_auto(bytes).unwrap();
        assert_eq!(result.grid[0][0], CellValue::from("id"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }
}
