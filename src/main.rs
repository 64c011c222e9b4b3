#![forbid(unsafe_code)]
//! # text_cloud CLI
//!
//! Builds a word cloud and a top-10 frequency table from one text column of a
//! CSV or spreadsheet file.
//!
//! Without arguments it runs the two built-in clinical-notes jobs. With an
//! input file it runs a single job described by the flags; `--jobs` runs every
//! job of a JSON file in order.
//!
//! ## Example
//! ```bash
//! cargo run --release -- notas.csv --column texto --title Queixas --stopword febre
//! ```
//!
//! See `--help` for all available options.

use clap::Parser;
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use std::process;
use text_cloud::{ExportFormat, JobConfig, default_jobs, load_jobs, run_job, timestamped_output};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// CSV or spreadsheet file to analyze (omit to run the built-in jobs)
    input: Option<PathBuf>,

    /// Name of the text column
    #[arg(long, requires = "input")]
    column: Option<String>,

    /// Title drawn above the word cloud
    #[arg(long, default_value = "")]
    title: String,

    /// Where to save the word-cloud image (default: <input>_<timestamp>_wordcloud.png)
    #[arg(long)]
    image_out: Option<PathBuf>,

    /// Where to save the frequency table (default: <input>_<timestamp>_frequencies.<format>)
    #[arg(long)]
    freq_out: Option<PathBuf>,

    /// Frequency table format (csv, tsv, json); inferred from --freq-out when omitted
    #[arg(long)]
    export_format: Option<ExportFormat>,

    /// Optional path to additional stopword file (.txt, one word per line)
    #[arg(long)]
    stopwords: Option<PathBuf>,

    /// Additional stopword (repeatable)
    #[arg(long = "stopword")]
    extra_stopwords: Vec<String>,

    /// Sheet to read from a spreadsheet (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Reduce words to their Portuguese stem before counting
    #[arg(long, default_value_t = false)]
    stem: bool,

    /// Open the saved image in the system viewer
    #[arg(long, default_value_t = false)]
    display: bool,

    /// Only write the frequency table and render, without saving the image
    #[arg(long, default_value_t = false)]
    no_image: bool,

    /// Seed for a reproducible layout
    #[arg(long)]
    seed: Option<u64>,

    /// TrueType/OpenType font for the cloud (default: a system font)
    #[arg(long)]
    font: Option<PathBuf>,

    /// JSON file with a list of jobs to run in order
    #[arg(long, conflicts_with = "input")]
    jobs: Option<PathBuf>,
}

impl Cli {
    fn into_job(self, input: PathBuf) -> Result<JobConfig, String> {
        let column = self
            .column
            .ok_or_else(|| "--column is required when an input file is given".to_string())?;
        let export_format = self.export_format;
        let frequency_output = match self.freq_out {
            Some(p) => p,
            None => timestamped_output(
                &input,
                "frequencies",
                export_format.unwrap_or(ExportFormat::Csv).extension(),
            ),
        };
        let image_output = self
            .image_out
            .unwrap_or_else(|| timestamped_output(&input, "wordcloud", "png"));

        let mut job = JobConfig::new(input, column);
        job.title = self.title;
        job.image_output = image_output;
        job.frequency_output = frequency_output;
        job.export_format = export_format;
        job.stopwords_file = self.stopwords;
        job.extra_stopwords = self.extra_stopwords;
        job.sheet = self.sheet;
        job.stem = self.stem;
        job.display = self.display;
        job.save_image = !self.no_image;
        job.cloud.seed = self.seed;
        job.cloud.font = self.font;
        Ok(job)
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let jobs = if let Some(path) = &cli.jobs {
        match load_jobs(path) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Error: {}", e);
                process::exit(1);
            }
        }
    } else if let Some(input) = cli.input.clone() {
        match cli.into_job(input) {
            Ok(job) => vec![job],
            Err(e) => {
                error!("Error: {}", e);
                process::exit(2);
            }
        }
    } else {
        default_jobs()
    };

    // run every job even if an earlier one failed
    let failures = jobs.iter().filter(|job| run_job(job).is_none()).count();
    if failures > 0 {
        error!("{} of {} job(s) failed", failures, jobs.len());
        process::exit(1);
    }
}
