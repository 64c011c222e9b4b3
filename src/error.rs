use std::path::PathBuf;

/// Failure while turning an input file into a [`crate::table::Table`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} has {found} fields but the header has {expected}")]
    TooManyFields {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("quoted field opened on line {line} is never closed")]
    UnterminatedQuote { line: usize },
    #[error("no delimiter could be determined")]
    NoDelimiter,
    #[error("file is empty")]
    Empty,
    #[error("{0}")]
    Spreadsheet(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Failure while laying out, drawing or encoding the word cloud.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no room to draw any word; the canvas is too small")]
    NoSpace,
    #[error("invalid font {path}: {reason}")]
    InvalidFont { path: PathBuf, reason: String },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tagged cause of a failed pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("column '{column}' not found; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("no valid text left after cleaning and stopword removal")]
    EmptyText,
    #[error("failed to render word cloud: {0}")]
    Render(#[from] RenderError),
    #[error("failed to save {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

/// Failure while reading a batch job file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read job file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
