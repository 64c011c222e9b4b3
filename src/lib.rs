//! # text_cloud
//!
//! Word clouds and word-frequency tables from one text column of a CSV or
//! spreadsheet file, with Portuguese stopword filtering.
//!
//! The pipeline is linear: load the table, pick the column, join and clean the
//! text, drop stopwords, write the top-N frequency table, lay out and render
//! the cloud, save (and optionally display) the image.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use log::{error, info};

pub mod cloud;
pub mod config;
pub mod error;
pub mod frequency;
pub mod office;
pub mod stopwords;
pub mod table;
pub mod text;

pub use cloud::{
    CloudOptions, FontMeasure, Orientation, PlacedWord, TextMeasure, WordCloud, display_image,
    generate_cloud, load_font, render_cloud, save_cloud, viridis,
};
pub use config::{ExportFormat, JobConfig, default_jobs, load_jobs};
pub use error::{ConfigError, LoadError, PipelineError, RenderError};
pub use frequency::{
    FrequencyRecord, FrequencyTable, build_frequency_table, count_words, write_frequency_table,
};
pub use office::{read_ods_sheet, read_xlsx_sheet};
pub use stopwords::STOPWORDS_PT;
pub use table::{
    Table, detect_delimiter, load_table, read_delimited, read_lines, read_sniffed, sniff_delimiter,
};
pub use text::{
    check_language, clean_text, load_stopword_file, normalize_stopwords, remove_stopwords,
    stem_tokens,
};

const SAMPLE_ROWS: usize = 3;
const SAMPLE_CHARS: usize = 100;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct WordCloudReport {
    pub rows: usize,
    pub filtered_text: String,
    pub frequencies: FrequencyTable,
    pub cloud: WordCloud,
    pub frequency_path: PathBuf,
    pub image_path: Option<PathBuf>,
}

///Runs the whole pipeline for one job and reports the first failure as a tagged error.
///The frequency table is written before rendering and is left on disk if rendering fails.
pub fn generate_word_cloud(job: &JobConfig) -> Result<WordCloudReport, PipelineError> {
    let table = load_table(&job.input, job.sheet.as_deref()).map_err(|source| {
        PipelineError::Load {
            path: job.input.clone(),
            source,
        }
    })?;
    info!("Table loaded: {} rows", table.len());
    info!("Available columns: {:?}", table.columns);

    let cells = table
        .column(&job.column)
        .ok_or_else(|| PipelineError::MissingColumn {
            column: job.column.clone(),
            available: table.columns.clone(),
        })?;

    info!("=== Data sample ===");
    for (i, cell) in cells.iter().take(SAMPLE_ROWS).enumerate() {
        let sample: String = cell.unwrap_or("").chars().take(SAMPLE_CHARS).collect();
        info!("Row {}: {}...", i + 1, sample);
    }

    let combined = join_cells(&cells);
    info!("Combined text has {} characters", combined.chars().count());
    check_language(&combined);

    let extra = collect_stopwords(job)?;
    let cleaned = clean_text(Some(&combined));
    let mut filtered = remove_stopwords(&cleaned, &extra);
    if job.stem {
        filtered = stem_tokens(&filtered, &extra);
    }
    if filtered.trim().is_empty() {
        return Err(PipelineError::EmptyText);
    }

    let frequencies = build_frequency_table(&filtered, job.top_n);
    write_frequency_table(&frequencies, &job.frequency_output, job.resolved_format()).map_err(
        |e| PipelineError::Save {
            path: job.frequency_output.clone(),
            reason: e.to_string(),
        },
    )?;
    info!("Frequency table saved to {}", job.frequency_output.display());
    println!("\nTop {} words:\n{}", frequencies.records.len(), frequencies);

    let font = load_font(job.cloud.font.as_deref())?;
    let ranked = count_words(&filtered);
    let cloud = generate_cloud(&ranked, &job.cloud, &FontMeasure::new(&font))?;
    let image = render_cloud(&cloud, &font, &job.cloud, &job.title);

    let image_path = if job.save_image {
        save_cloud(&image, &job.image_output).map_err(|e| PipelineError::Save {
            path: job.image_output.clone(),
            reason: e.to_string(),
        })?;
        info!("Word cloud saved to {}", job.image_output.display());
        Some(job.image_output.clone())
    } else {
        None
    };

    if job.display {
        match &image_path {
            Some(p) => display_image(p),
            None => info!("Image not saved; nothing to display"),
        }
    }

    Ok(WordCloudReport {
        rows: table.len(),
        filtered_text: filtered,
        frequencies,
        cloud,
        frequency_path: job.frequency_output.clone(),
        image_path,
    })
}

///Runs one job and turns any failure into `None` after logging it.
pub fn run_job(job: &JobConfig) -> Option<WordCloudReport> {
    match generate_word_cloud(job) {
        Ok(report) => Some(report),
        Err(e) => {
            error!("Failed to process {}: {}", job.input.display(), e);
            None
        }
    }
}

/// Joins a column into one text; missing cells contribute an empty string.
pub fn join_cells(cells: &[Option<&str>]) -> String {
    cells
        .iter()
        .map(|c| c.unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_stopwords(job: &JobConfig) -> Result<HashSet<String>, PipelineError> {
    let mut extra = normalize_stopwords(&job.extra_stopwords);
    if let Some(path) = &job.stopwords_file {
        let from_file = load_stopword_file(path).map_err(|e| PipelineError::Load {
            path: path.clone(),
            source: LoadError::Io(e),
        })?;
        extra.extend(from_file);
    }
    Ok(extra)
}

///Output path next to the working directory, named after the input and the current time,
///e.g. `notas_20261016_143000_wordcloud.png`.
pub fn timestamped_output(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let local: DateTime<Local> = Local::now();
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    PathBuf::from(format!(
        "{}_{}_{}.{}",
        stem,
        local.format("%Y%m%d_%H%M%S"),
        suffix,
        extension
    ))
}
