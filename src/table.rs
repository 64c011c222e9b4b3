use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};

use crate::error::LoadError;
use crate::office::{read_ods_sheet, read_xlsx_sheet};

/// Delimiters tried in order; the first one that parses wins.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Column name used when every line is read as a single text cell.
pub const WHOLE_LINE_COLUMN: &str = "texto_completo";

const PREVIEW_LINES: usize = 10;
const TRIAL_ROWS: usize = 5;
const SNIFF_LINES: usize = 20;
const SNIFF_CANDIDATES: [u8; 6] = [b',', b';', b'\t', b'|', b':', b' '];

/// Cell values treated as missing, matching common dataframe defaults.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A loaded sheet: header names plus rows of optional cells (`None` = missing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding short rows with missing cells.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Cells of the named column, top to bottom. `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).and_then(|c| c.as_deref()))
                .collect(),
        )
    }
}

pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

fn to_cell(raw: &str) -> Option<String> {
    if is_missing(raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Loads a table by extension: delimited text goes through delimiter detection and
/// its fallbacks, `.xlsx`/`.xlsm`/`.ods` are read as spreadsheets.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => load_delimited(path),
        "xlsx" | "xlsm" => read_xlsx_sheet(path, sheet).map_err(LoadError::Spreadsheet),
        "ods" => read_ods_sheet(path, sheet).map_err(LoadError::Spreadsheet),
        other => Err(LoadError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{other}")
        })),
    }
}

fn load_delimited(path: &Path) -> Result<Table, LoadError> {
    match detect_delimiter(path) {
        Some(delim) => read_delimited(path, delim),
        None => {
            info!("=== Trying permissive read ===");
            match read_sniffed(path) {
                Ok(table) => Ok(table),
                Err(e) => {
                    warn!("Permissive read failed ({e}); reading each line as one cell");
                    read_lines(path)
                }
            }
        }
    }
}

///Tries each candidate delimiter on the header and first rows of the file and
///returns the first one that parses. No scoring: a file that parses with both
///`,` and `;` yields `,`.
pub fn detect_delimiter(path: &Path) -> Option<u8> {
    info!("=== Checking delimited file {} ===", path.display());
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not read file: {e}");
            return None;
        }
    };
    info!("First lines of the file:");
    for (i, line) in content.split_inclusive('\n').take(PREVIEW_LINES).enumerate() {
        info!("Line {}: {:?}", i + 1, line);
    }

    for delim in CANDIDATE_DELIMITERS {
        match parse_with(&content, delim, Some(TRIAL_ROWS)) {
            Ok(table) => {
                info!("Parsed with delimiter {:?}", delim as char);
                info!("Columns found: {:?}", table.columns);
                info!("Shape: ({}, {})", table.len(), table.columns.len());
                return Some(delim);
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(
                    "Delimiter {:?} failed: {}",
                    delim as char,
                    msg.chars().take(100).collect::<String>()
                );
            }
        }
    }
    None
}

/// Reads the whole file with a known delimiter. Rows longer than the header fail the read.
pub fn read_delimited(path: &Path, delim: u8) -> Result<Table, LoadError> {
    let content = fs::read_to_string(path)?;
    parse_with(&content, delim, None)
}

fn parse_with(content: &str, delim: u8, max_rows: Option<usize>) -> Result<Table, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(LoadError::Empty);
    }
    let mut table = Table::new(header_names(&headers));

    let mut record = StringRecord::new();
    let mut row = 0;
    while max_rows.is_none_or(|max| row < max) && rdr.read_record(&mut record)? {
        row += 1;
        if record.len() > table.columns.len() {
            return Err(LoadError::TooManyFields {
                row,
                expected: table.columns.len(),
                found: record.len(),
            });
        }
        table.push_row(record.iter().map(to_cell).collect());
    }

    // the csv reader closes an unterminated quote at end of input instead of failing
    let consumed = (rdr.position().byte() as usize).min(content.len());
    if let Some(line) = unterminated_quote(&content.as_bytes()[..consumed], delim) {
        return Err(LoadError::UnterminatedQuote { line });
    }
    Ok(table)
}

/// Line (1-based) of a quoted field that is still open at the end of `bytes`.
/// Quotes only open a field at its start; `""` inside a quoted field is an escaped quote.
fn unterminated_quote(bytes: &[u8], delim: u8) -> Option<usize> {
    let mut line = 1;
    let mut opened_at = None;
    let mut field_start = true;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            line += 1;
        }
        match opened_at {
            Some(_) if b == b'"' => {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    opened_at = None;
                }
            }
            Some(_) => {}
            None if field_start && b == b'"' => {
                opened_at = Some(line);
                field_start = false;
            }
            None => field_start = b == delim || b == b'\n' || b == b'\r',
        }
        i += 1;
    }
    opened_at
}

fn header_names(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("Unnamed: {i}")
            } else {
                h.to_string()
            }
        })
        .collect()
}

///Guesses the delimiter by how consistently it appears per line.
///Returns `None` when no candidate occurs on the sampled lines.
pub fn sniff_delimiter(content: &str) -> Option<u8> {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return None;
    }

    let mut best: Option<(u8, f64)> = None;
    for delim in SNIFF_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|l| l.bytes().filter(|&b| b == delim).count())
            .collect();
        let Some(mode) = modal_count(&counts) else {
            continue;
        };
        if mode == 0 {
            continue;
        }
        let agree = counts.iter().filter(|&&c| c == mode).count();
        let consistency = agree as f64 / counts.len() as f64;
        if best.is_none_or(|(_, score)| consistency > score) {
            best = Some((delim, consistency));
        }
    }
    best.map(|(d, _)| d)
}

fn modal_count(counts: &[usize]) -> Option<usize> {
    let mut freq: Vec<(usize, usize)> = Vec::new();
    for &c in counts {
        match freq.iter_mut().find(|(v, _)| *v == c) {
            Some((_, n)) => *n += 1,
            None => freq.push((c, 1)),
        }
    }
    // ties go to the larger count so a delimiter seen on most lines beats "absent"
    freq.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(v, _)| v)
}

///Permissive read: sniffed delimiter, leading whitespace trimmed from fields,
///rows with more fields than the header skipped.
pub fn read_sniffed(path: &Path) -> Result<Table, LoadError> {
    let content = fs::read_to_string(path)?;
    let delim = sniff_delimiter(&content).ok_or(LoadError::NoDelimiter)?;
    info!("Sniffed delimiter {:?}", delim as char);

    let mut rdr = ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = rdr.headers()?.clone();
    let trimmed: StringRecord = headers.iter().map(str::trim_start).collect();
    let mut table = Table::new(header_names(&trimmed));

    let mut skipped = 0usize;
    for record in rdr.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                warn!("Skipping unreadable row: {e}");
                continue;
            }
        };
        if record.len() > table.columns.len() {
            skipped += 1;
            continue;
        }
        table.push_row(record.iter().map(|f| to_cell(f.trim_start())).collect());
    }
    if skipped > 0 {
        warn!("Skipped {skipped} malformed row(s)");
    }
    Ok(table)
}

/// Last resort: every non-blank line becomes one cell of [`WHOLE_LINE_COLUMN`].
pub fn read_lines(path: &Path) -> Result<Table, LoadError> {
    let content = fs::read_to_string(path)?;
    let mut table = Table::new(vec![WHOLE_LINE_COLUMN.to_string()]);
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        table.push_row(vec![to_cell(line)]);
    }
    Ok(table)
}
