use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use crate::table::{Table, is_missing};

/// Reads one sheet of an `.xlsx` workbook (the first one unless `sheet` names another).
/// The first row is the header.
pub fn read_xlsx_sheet(p: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let file = File::open(p).map_err(|e| format!("Open .xlsx failed: {e}"))?;
    let mut zip = ZipArchive::new(file).map_err(|e| format!("Open .xlsx zip failed: {e}"))?;

    let workbook = read_entry(&mut zip, "xl/workbook.xml")?
        .ok_or_else(|| "Missing xl/workbook.xml".to_string())?;
    let sheets = parse_workbook_sheets(&workbook)?;
    let index = match sheet {
        Some(name) => sheets
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| format!("Sheet '{name}' not found; available: {:?}", sheet_names(&sheets)))?,
        None if sheets.is_empty() => return Err("Workbook has no sheets".to_string()),
        None => 0,
    };

    let rels = read_entry(&mut zip, "xl/_rels/workbook.xml.rels")?;
    let target = rels
        .as_deref()
        .map(parse_relationships)
        .transpose()?
        .and_then(|rels| {
            rels.into_iter()
                .find(|(id, _)| *id == sheets[index].1)
                .map(|(_, target)| resolve_target(&target))
        })
        .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

    let shared = match read_entry(&mut zip, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_xml = read_entry(&mut zip, &target)?.ok_or_else(|| format!("Missing {target}"))?;
    let grid = parse_xlsx_sheet_xml(&sheet_xml, &shared)?;
    Ok(grid_to_table(grid))
}

/// Reads one table of an `.ods` document (the first one unless `sheet` names another).
/// The first row is the header.
pub fn read_ods_sheet(p: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let file = File::open(p).map_err(|e| format!("Open .ods failed: {e}"))?;
    let mut zip = ZipArchive::new(file).map_err(|e| format!("Open .ods zip failed: {e}"))?;
    let xml = read_entry(&mut zip, "content.xml")?.ok_or_else(|| "Missing content.xml".to_string())?;
    let grid = parse_ods_xml(&xml, sheet)?;
    Ok(grid_to_table(grid))
}

// ---- Internal helpers ----

type Grid = Vec<Vec<Option<String>>>;

/// Widest sheet a workbook can hold (column `XFD`).
const MAX_COLUMNS: usize = 16_384;

fn read_entry(zip: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, String> {
    let mut entry = match zip.by_name(name) {
        Ok(e) => e,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("Read {name} failed: {e}")),
    };
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("Read {name} failed: {e}"))?;
    Ok(Some(xml))
}

fn sheet_names(sheets: &[(String, String)]) -> Vec<&str> {
    sheets.iter().map(|(n, _)| n.as_str()).collect()
}

/// `(name, relationship id)` for each `<sheet>` in workbook order.
fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"sheet" => {
                let name = attr(&reader, &e, b"name")?.unwrap_or_default();
                let id = attr(&reader, &e, b"id")?.unwrap_or_default();
                sheets.push((name, id));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse workbook.xml failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// `(Id, Target)` pairs from a relationships part.
fn parse_relationships(xml: &str) -> Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let id = attr(&reader, &e, b"Id")?.unwrap_or_default();
                let target = attr(&reader, &e, b"Target")?.unwrap_or_default();
                rels.push((id, target));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse workbook.xml.rels failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{target}"),
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    // phonetic runs repeat the text in another script
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"si" => current.clear(),
                b"t" => in_t = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_t && !in_phonetic => {
                current.push_str(&decode(&reader, &t)?);
            }
            Ok(Event::GeneralRef(r)) if in_t && !in_phonetic => {
                current.push_str(&resolve_entity(&decode(&reader, &r)?));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse sharedStrings.xml failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Default)]
struct XlsxCell {
    col: usize,
    kind: String,
    value: String,
    in_value: bool,
}

fn parse_xlsx_sheet_xml(xml: &str, shared: &[String]) -> Result<Grid, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut grid: Grid = Vec::new();
    let mut row: Vec<Option<String>> = Vec::new();
    let mut row_index: Option<usize> = None;
    let mut cell: Option<XlsxCell> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"row" => {
                    row.clear();
                    row_index = attr(&reader, &e, b"r")?.and_then(|r| r.parse::<usize>().ok());
                }
                b"c" => cell = Some(start_cell(&reader, &e, row.len())?),
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"c" => {
                // a styled but empty cell only advances the column
                let c = start_cell(&reader, &e, row.len())?;
                place(&mut row, c.col, None);
            }
            Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"row" => {
                let r = attr(&reader, &e, b"r")?.and_then(|r| r.parse::<usize>().ok());
                push_row(&mut grid, Vec::new(), r);
            }
            Ok(Event::Text(t)) => {
                if let Some(c) = cell.as_mut().filter(|c| c.in_value) {
                    c.value.push_str(&decode(&reader, &t)?);
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let Some(c) = cell.as_mut().filter(|c| c.in_value) {
                    c.value.push_str(&resolve_entity(&decode(&reader, &r)?));
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = false;
                    }
                }
                b"c" => {
                    if let Some(c) = cell.take() {
                        let value = cell_value(&c, shared)?;
                        place(&mut row, c.col, value);
                    }
                }
                b"row" => push_row(&mut grid, std::mem::take(&mut row), row_index.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse worksheet XML failed: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

fn start_cell(reader: &Reader<&[u8]>, e: &BytesStart, next_col: usize) -> Result<XlsxCell, String> {
    let col = attr(reader, e, b"r")?
        .and_then(|r| column_index(&r))
        .unwrap_or(next_col);
    let kind = attr(reader, e, b"t")?.unwrap_or_else(|| "n".to_string());
    Ok(XlsxCell {
        col,
        kind,
        ..Default::default()
    })
}

fn cell_value(c: &XlsxCell, shared: &[String]) -> Result<Option<String>, String> {
    let raw = c.value.as_str();
    let value = match c.kind.as_str() {
        "s" => {
            let idx: usize = raw
                .trim()
                .parse()
                .map_err(|_| format!("Bad shared string index '{raw}'"))?;
            shared
                .get(idx)
                .cloned()
                .ok_or_else(|| format!("Shared string {idx} out of range"))?
        }
        "b" => (if raw.trim() == "1" { "True" } else { "False" }).to_string(),
        _ => raw.to_string(),
    };
    Ok(if is_missing(&value) { None } else { Some(value) })
}

/// Column letters of an `A1` reference to a zero-based index.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters.bytes().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A') as usize + 1)
            .filter(|&n| n <= MAX_COLUMNS)
    })?;
    Some(n - 1)
}

fn place(row: &mut Vec<Option<String>>, col: usize, value: Option<String>) {
    if row.len() <= col {
        row.resize(col + 1, None);
    }
    row[col] = value;
}

/// Rows are 1-based in the sheet; gaps become empty rows.
fn push_row(grid: &mut Grid, row: Vec<Option<String>>, index: Option<usize>) {
    if let Some(r) = index {
        while grid.len() + 1 < r {
            grid.push(Vec::new());
        }
    }
    grid.push(row);
}

fn parse_ods_xml(xml: &str, sheet: Option<&str>) -> Result<Grid, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut grid: Grid = Vec::new();
    let mut found = false;
    let mut in_target = false;
    let mut done = false;

    let mut row: Vec<Option<String>> = Vec::new();
    let mut row_repeat = 1usize;
    let mut pending_rows = 0usize;
    let mut pending_cells = 0usize;
    let mut cell: Option<(String, usize)> = None;
    let mut paragraphs = 0usize;

    while !done {
        buf.clear();
        let event = reader.read_event_into(&mut buf);
        let empty = matches!(event, Ok(Event::Empty(_)));
        match event {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match local_name(e.name().as_ref()) {
                    b"table" if !found => {
                        let name = attr(&reader, &e, b"name")?.unwrap_or_default();
                        if sheet.is_none_or(|s| s == name) {
                            found = true;
                            in_target = !empty;
                            done = empty;
                        }
                    }
                    b"table-row" if in_target => {
                        row.clear();
                        pending_cells = 0;
                        row_repeat = repeat_attr(&reader, &e, b"number-rows-repeated")?;
                        if empty {
                            pending_rows += row_repeat;
                        }
                    }
                    b"table-cell" | b"covered-table-cell" if in_target => {
                        let repeat = repeat_attr(&reader, &e, b"number-columns-repeated")?;
                        if empty {
                            pending_cells += repeat;
                        } else {
                            cell = Some((String::new(), repeat));
                            paragraphs = 0;
                        }
                    }
                    b"p" if cell.is_some() && !empty => {
                        if let Some((text, _)) = cell.as_mut() {
                            if paragraphs > 0 {
                                text.push('\n');
                            }
                        }
                        paragraphs += 1;
                    }
                    b"s" if empty => {
                        if let Some((text, _)) = cell.as_mut() {
                            let n = repeat_attr(&reader, &e, b"c")?;
                            text.extend(std::iter::repeat_n(' ', n));
                        }
                    }
                    b"tab" if empty => {
                        if let Some((text, _)) = cell.as_mut() {
                            text.push('\t');
                        }
                    }
                    b"line-break" if empty => {
                        if let Some((text, _)) = cell.as_mut() {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((text, _)) = cell.as_mut() {
                    text.push_str(&decode(&reader, &t)?);
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let Some((text, _)) = cell.as_mut() {
                    text.push_str(&resolve_entity(&decode(&reader, &r)?));
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"table-cell" | b"covered-table-cell" if in_target => {
                    if let Some((text, repeat)) = cell.take() {
                        if is_missing(&text) {
                            pending_cells += repeat;
                        } else {
                            // empty cells only materialize when something follows them
                            row.extend(std::iter::repeat_n(None, pending_cells));
                            pending_cells = 0;
                            row.extend(std::iter::repeat_n(Some(text), repeat));
                        }
                    }
                }
                b"table-row" if in_target => {
                    if row.is_empty() {
                        pending_rows += row_repeat;
                    } else {
                        for _ in 0..pending_rows {
                            grid.push(Vec::new());
                        }
                        pending_rows = 0;
                        for _ in 0..row_repeat {
                            grid.push(row.clone());
                        }
                    }
                    row.clear();
                }
                b"table" if in_target => {
                    in_target = false;
                    done = true;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Parse .ods XML failed: {e}")),
            _ => {}
        }
    }

    match (found, sheet) {
        (true, _) => Ok(grid),
        (false, Some(name)) => Err(format!("Sheet '{name}' not found")),
        (false, None) => Err("Document has no tables".to_string()),
    }
}

fn repeat_attr(reader: &Reader<&[u8]>, e: &BytesStart, key: &[u8]) -> Result<usize, String> {
    Ok(attr(reader, e, key)?
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1))
}

fn grid_to_table(mut grid: Grid) -> Table {
    if grid.is_empty() {
        return Table::default();
    }
    let header = grid.remove(0);
    let width = grid.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
    let columns = (0..width)
        .map(|i| match header.get(i).cloned().flatten() {
            Some(name) => name,
            None => format!("Unnamed: {i}"),
        })
        .collect();
    let mut table = Table::new(columns);
    for row in grid {
        table.push_row(row);
    }
    table
}

/// Value of the attribute whose local name is `key`, unescaped.
fn attr(reader: &Reader<&[u8]>, e: &BytesStart, key: &[u8]) -> Result<Option<String>, String> {
    for a in e.attributes() {
        let a = a.map_err(|e| format!("Bad XML attribute: {e}"))?;
        if local_name(a.key.as_ref()) == key {
            let raw = decode(reader, &a.value)?;
            let value = quick_xml::escape::unescape(&raw).map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn decode(reader: &Reader<&[u8]>, bytes: &[u8]) -> Result<String, String> {
    reader
        .decoder()
        .decode(bytes)
        .map(|s| s.into_owned())
        .map_err(|e| e.to_string())
}

/// Text for a `&name;` or `&#nn;` reference.
fn resolve_entity(name: &str) -> String {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        return parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default();
    }
    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => "",
    }
    .to_string()
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}
