use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;

use crate::config::ExportFormat;

/// One ranked token. `relative` is over all tokens of the text, not only the ranked ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRecord {
    #[serde(rename = "Palavra")]
    pub token: String,
    #[serde(rename = "Frequência Absoluta")]
    pub absolute: usize,
    #[serde(rename = "Frequência Relativa")]
    pub relative: f64,
    #[serde(rename = "Frequência Acumulada")]
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyTable {
    pub total_tokens: usize,
    pub records: Vec<FrequencyRecord>,
}

///Counts whitespace-separated tokens and ranks them by count, highest first.
///Ties keep the order in which the tokens first appeared.
/// # Example
/// ```
/// use text_cloud::count_words;
/// let ranked = count_words("febre tosse febre dor tosse febre");
/// let expected = vec![
///     ("febre".to_string(), 3),
///     ("tosse".to_string(), 2),
///     ("dor".to_string(), 1),
/// ];
/// assert_eq!(ranked, expected);
/// ```
pub fn count_words(text: &str) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counted: Vec<(String, usize)> = Vec::new();
    for word in text.split_whitespace() {
        match index.get(word) {
            Some(&i) => counted[i].1 += 1,
            None => {
                index.insert(word, counted.len());
                counted.push((word.to_string(), 1));
            }
        }
    }
    // stable sort keeps first-seen order among equal counts
    counted.sort_by(|a, b| b.1.cmp(&a.1));
    counted
}

///Top `top_n` tokens with absolute, relative and cumulative frequency.
pub fn build_frequency_table(text: &str, top_n: usize) -> FrequencyTable {
    let ranked = count_words(text);
    let total: usize = ranked.iter().map(|(_, c)| c).sum();

    let mut cumulative = 0.0;
    let records = ranked
        .into_iter()
        .take(top_n)
        .map(|(token, absolute)| {
            let relative = absolute as f64 / total as f64;
            cumulative += relative;
            FrequencyRecord {
                token,
                absolute,
                relative,
                cumulative,
            }
        })
        .collect();

    FrequencyTable {
        total_tokens: total,
        records,
    }
}

///Writes the table without a row index: CSV/TSV with a header row, or a JSON array.
pub fn write_frequency_table(
    table: &FrequencyTable,
    path: &Path,
    format: ExportFormat,
) -> std::io::Result<()> {
    match format {
        ExportFormat::Csv | ExportFormat::Tsv => {
            let delimiter = if format == ExportFormat::Tsv { b'\t' } else { b',' };
            let mut wtr = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
            for record in &table.records {
                wtr.serialize(record)?;
            }
            if table.records.is_empty() {
                wtr.write_record(HEADERS)?;
            }
            wtr.flush()?;
        }
        ExportFormat::Json => {
            let mut file = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut file, &table.records)?;
            file.flush()?;
        }
    }
    Ok(())
}

const HEADERS: [&str; 4] = [
    "Palavra",
    "Frequência Absoluta",
    "Frequência Relativa",
    "Frequência Acumulada",
];

impl fmt::Display for FrequencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .records
            .iter()
            .map(|r| r.token.chars().count())
            .chain(std::iter::once(HEADERS[0].len()))
            .max()
            .unwrap_or(0);
        writeln!(
            f,
            "{:>3}  {:<width$}  {:>19}  {:>19}  {:>20}",
            "", HEADERS[0], HEADERS[1], HEADERS[2], HEADERS[3]
        )?;
        for (i, r) in self.records.iter().enumerate() {
            writeln!(
                f,
                "{:>3}  {:<width$}  {:>19}  {:>19.6}  {:>20.6}",
                i, r.token, r.absolute, r.relative, r.cumulative
            )?;
        }
        Ok(())
    }
}
