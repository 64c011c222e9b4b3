use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;

use crate::cloud::CloudOptions;
use crate::error::ConfigError;

/// Output format of the frequency table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    /// Format implied by a file extension; anything unknown is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") => ExportFormat::Tsv,
            Some("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }
}

/// One pipeline run: which column of which file, and where the outputs go.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub input: PathBuf,
    pub column: String,
    pub title: String,
    pub extra_stopwords: Vec<String>,
    pub stopwords_file: Option<PathBuf>,
    pub sheet: Option<String>,
    pub save_image: bool,
    pub image_output: PathBuf,
    pub frequency_output: PathBuf,
    pub export_format: Option<ExportFormat>,
    pub top_n: usize,
    pub stem: bool,
    pub display: bool,
    pub cloud: CloudOptions,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            column: String::new(),
            title: String::new(),
            extra_stopwords: Vec::new(),
            stopwords_file: None,
            sheet: None,
            save_image: true,
            image_output: PathBuf::from("wordcloud.png"),
            frequency_output: PathBuf::from("frequencies.csv"),
            export_format: None,
            top_n: 10,
            stem: false,
            display: false,
            cloud: CloudOptions::default(),
        }
    }
}

impl JobConfig {
    pub fn new(input: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            column: column.into(),
            ..Default::default()
        }
    }

    /// Explicit format if set, otherwise the one implied by the table path.
    pub fn resolved_format(&self) -> ExportFormat {
        self.export_format
            .unwrap_or_else(|| ExportFormat::from_path(&self.frequency_output))
    }
}

/// The two fixed runs of the clinical-notes analysis: patient records and complaints.
pub fn default_jobs() -> Vec<JobConfig> {
    vec![
        JobConfig {
            title: "Prontuários".to_string(),
            image_output: PathBuf::from("paciente_nuvem.png"),
            frequency_output: PathBuf::from("frequencias_prontuario.csv"),
            display: true,
            ..JobConfig::new("coluna_dados_paciente_limpo.csv", "Table 1")
        },
        JobConfig {
            title: "Queixas".to_string(),
            image_output: PathBuf::from("prontuario_nuvem.png"),
            frequency_output: PathBuf::from("frequencias_queixas.csv"),
            display: true,
            ..JobConfig::new("teste_coluna_limpo.csv", "texto")
        },
    ]
}

/// Reads a JSON array of jobs. Omitted fields take their defaults.
pub fn load_jobs(path: &Path) -> Result<Vec<JobConfig>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
