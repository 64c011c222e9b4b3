//! Integration tests for `text_cloud`.
//
// This suite verifies:
// - Library pipeline (load -> clean -> filter -> frequency table -> cloud)
// - Failure tags for missing files, missing columns and empty text
// - CLI behavior including export formats, stopword files and batch jobs
//
// Notes:
// - Rendering uses the bundled font, so every run renders and saves its image.
// - CLI tests run the binary with a per-process working directory.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use serde_json::Value as Json;
use tempfile::tempdir;

use text_cloud::{
    CloudOptions, ExportFormat, JobConfig, PipelineError, generate_word_cloud, run_job,
};

// --------------------- helpers ---------------------

/// Create a file with content in a temp dir.
fn write_file(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let f = dir.child(name);
    f.write_str(content).unwrap();
    f.path().to_path_buf()
}

/// Small, seeded canvas so layout stays fast in debug builds.
fn quick_cloud() -> CloudOptions {
    CloudOptions {
        width: 300,
        height: 150,
        dpi: 100,
        seed: Some(7),
        ..Default::default()
    }
}

fn job_in(dir: &Path, input: &Path, column: &str) -> JobConfig {
    let mut job = JobConfig::new(input, column);
    job.title = "Queixas".to_string();
    job.image_output = dir.join("nuvem.png");
    job.frequency_output = dir.join("frequencias.csv");
    job.cloud = quick_cloud();
    job
}

fn read_csv_rows(p: &Path) -> Vec<Vec<String>> {
    let mut rdr = csv::Reader::from_path(p).unwrap();
    rdr.records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}

/// Run CLI expecting failure with a specific working directory.
fn run_cli_fail_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_cloud").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().failure()
}

/// Run CLI successfully with a specific working directory.
fn run_cli_ok_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_cloud").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().success()
}

// --------------------- library tests ---------------------

#[test]
fn lib_scenario_end_to_end() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(
        &td,
        "notas.csv",
        "id,texto\n1,\"O paciente relatou dor. Dor intensa!!! 123\"\n",
    );
    let job = job_in(td.path(), &input, "texto");
    let report = generate_word_cloud(&job).expect("pipeline should succeed");

    let rows = read_csv_rows(&job.frequency_output);
    assert_eq!(rows[0][0], "dor");
    assert_eq!(rows[0][1], "2");
    let rel: f64 = rows[0][2].parse().unwrap();
    assert!((rel - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(rows[1][0], "intensa");

    assert_eq!(report.filtered_text, "dor dor intensa");
    assert_eq!(report.rows, 1);
    assert_eq!(report.image_path.as_deref(), Some(job.image_output.as_path()));
    assert!(job.image_output.is_file());
    assert!(report.cloud.words.iter().any(|w| w.word == "dor"));
    let img = image::open(&job.image_output).unwrap();
    assert_eq!(img.width(), 300);
    assert!(img.height() > 150, "title band expected above the cloud");
}

#[test]
fn lib_all_missing_column_aborts_without_outputs() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(&td, "vazio.csv", "id,texto\n1,NA\n2,\n3,nan\n");
    let job = job_in(td.path(), &input, "texto");

    let err = generate_word_cloud(&job).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyText), "{err}");
    assert!(!job.image_output.exists());
    assert!(!job.frequency_output.exists());
    assert!(run_job(&job).is_none());
}

#[test]
fn lib_only_stopwords_aborts() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(&td, "curto.csv", "texto\nde para com\n12 !!\n");
    let job = job_in(td.path(), &input, "texto");
    assert!(matches!(
        generate_word_cloud(&job),
        Err(PipelineError::EmptyText)
    ));
}

#[test]
fn lib_missing_column_lists_available() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(&td, "notas.csv", "id,queixa\n1,febre alta\n");
    let job = job_in(td.path(), &input, "texto");
    match generate_word_cloud(&job) {
        Err(PipelineError::MissingColumn { column, available }) => {
            assert_eq!(column, "texto");
            assert_eq!(available, vec!["id", "queixa"]);
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn lib_missing_file_is_load_error() {
    let td = tempdir().unwrap();
    let missing = td.path().join("nao_existe.csv");
    let job = job_in(td.path(), &missing, "texto");
    assert!(matches!(
        generate_word_cloud(&job),
        Err(PipelineError::Load { .. })
    ));
    assert!(run_job(&job).is_none());
}

#[test]
fn lib_semicolon_file_with_commas_in_text() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(
        &td,
        "queixas.csv",
        "id;texto\n1;cefaleia, febre, tosse\n2;febre persistente\n3;NA\n",
    );
    let job = job_in(td.path(), &input, "texto");
    generate_word_cloud(&job).expect("pipeline should succeed");

    let rows = read_csv_rows(&job.frequency_output);
    assert_eq!(rows[0][0], "febre");
    assert_eq!(rows[0][1], "2");
    let tokens: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(tokens, vec!["febre", "cefaleia", "tosse", "persistente"]);
}

#[test]
fn lib_extra_stopwords_and_file_are_applied() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(&td, "notas.csv", "texto\nfebre tosse cansaço febre\n");
    let stop = write_file(&td, "stop.txt", "# comentário\nTOSSE\n\n");
    let mut job = job_in(td.path(), &input, "texto");
    job.extra_stopwords = vec!["Cansaço".to_string()];
    job.stopwords_file = Some(stop);
    generate_word_cloud(&job).expect("pipeline should succeed");

    let rows = read_csv_rows(&job.frequency_output);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "febre");
    let cum: f64 = rows[0][3].parse().unwrap();
    assert!((cum - 1.0).abs() < 1e-12);
}

#[test]
fn lib_top_ten_cumulative_is_monotonic_and_bounded() {
    let td = assert_fs::TempDir::new().unwrap();
    let text: Vec<String> = (0..15).map(|i| format!("termo{}", "x".repeat(i))).collect();
    let input = write_file(
        &td,
        "muitos.csv",
        &format!("texto\n{}\ntermo termo\n", text.join(" ")),
    );
    let job = job_in(td.path(), &input, "texto");
    generate_word_cloud(&job).expect("pipeline should succeed");

    let rows = read_csv_rows(&job.frequency_output);
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0][0], "termo");
    assert_eq!(rows[0][1], "3");
    let mut prev = 0.0;
    for r in &rows {
        let cum: f64 = r[3].parse().unwrap();
        assert!(cum >= prev && cum <= 1.0);
        prev = cum;
    }
    // 17 tokens in total, only 12 of them in the top ten
    assert!((prev - 12.0 / 17.0).abs() < 1e-9);
}

#[test]
fn lib_json_export_and_no_image() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(&td, "notas.csv", "texto\nfebre febre tosse\n");
    let mut job = job_in(td.path(), &input, "texto");
    job.frequency_output = td.path().join("freq.json");
    job.save_image = false;
    let report = generate_word_cloud(&job).expect("pipeline should succeed");

    let v: Json = serde_json::from_str(&fs::read_to_string(&job.frequency_output).unwrap()).unwrap();
    assert_eq!(v[0]["Palavra"], "febre");
    assert_eq!(v[0]["Frequência Absoluta"], 2);
    assert!(!job.image_output.exists());
    assert!(report.image_path.is_none());
}

#[test]
fn lib_unterminated_quote_does_not_swallow_other_columns() {
    let td = assert_fs::TempDir::new().unwrap();
    let input = write_file(
        &td,
        "aspas.csv",
        "id,texto,medico\n1,\"dor intensa,dra ana\n2,febre,dr joao\n3,tosse,dra ana\n",
    );
    let job = job_in(td.path(), &input, "texto");
    // ',' is rejected, ';' reads each line as one cell of a single column
    match generate_word_cloud(&job) {
        Err(PipelineError::MissingColumn { available, .. }) => {
            assert_eq!(available, vec!["id,texto,medico"]);
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
    assert!(!job.frequency_output.exists());
}

// --------------------- CLI tests ---------------------

#[test]
fn cli_nonexistent_path_fails() {
    let td = tempdir().unwrap();
    let bad = td.path().join("does_not_exist_here.csv");
    run_cli_fail_in(
        td.path(),
        &[bad.to_string_lossy().as_ref(), "--column", "texto"],
    );
}

#[test]
fn cli_missing_column_flag_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = write_file(&td, "notas.csv", "texto\nfebre\n");
    run_cli_fail_in(td.path(), &[f.to_string_lossy().as_ref()]);
}

#[test]
fn cli_unknown_column_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = write_file(&td, "notas.csv", "texto\nfebre\n");
    run_cli_fail_in(
        td.path(),
        &[f.to_string_lossy().as_ref(), "--column", "queixa"],
    )
    .stderr(predicate::str::contains("queixa"));
}

#[test]
fn cli_basic_run_csv_with_default_names() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = write_file(
        &td,
        "notas.csv",
        "id,texto\n1,Febre alta e tosse seca\n2,Tosse persistente\n",
    );
    let stop = write_file(&td, "stop.txt", "seca\n");

    run_cli_ok_in(
        td.path(),
        &[
            f.to_string_lossy().as_ref(),
            "--column",
            "texto",
            "--stopwords",
            stop.to_str().unwrap(),
            "--seed",
            "3",
        ],
    );

    let re = Regex::new(r"^notas_\d{8}_\d{6}_frequencies\.csv$").unwrap();
    let table = fs::read_dir(td.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| re.is_match(e.file_name().to_string_lossy().as_ref()))
        .expect("Expected notas_*_frequencies.csv in temp dir");
    let rows = read_csv_rows(&table.path());
    assert_eq!(rows[0][0], "tosse");
    assert!(rows.iter().all(|r| r[0] != "seca"));

    let re_png = Regex::new(r"^notas_\d{8}_\d{6}_wordcloud\.png$").unwrap();
    let has_png = fs::read_dir(td.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| re_png.is_match(e.file_name().to_string_lossy().as_ref()));
    assert!(has_png, "Expected notas_*_wordcloud.png in temp dir");
}

#[test]
fn cli_export_tsv_and_stdout_table() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = write_file(&td, "notas.csv", "texto\nfebre febre tosse\n");
    let mut cmd = assert_cmd::Command::cargo_bin("text_cloud").unwrap();
    cmd.current_dir(td.path()).args([
        f.to_string_lossy().as_ref(),
        "--column",
        "texto",
        "--freq-out",
        "freq.tsv",
        "--image-out",
        "nuvem.png",
        "--seed",
        "1",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("febre"));
    assert!(td.path().join("nuvem.png").is_file());

    let content = fs::read_to_string(td.path().join("freq.tsv")).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Palavra\tFrequência Absoluta\tFrequência Relativa\tFrequência Acumulada"
    );
    assert!(lines.next().unwrap().starts_with("febre\t2\t"));
}

#[test]
fn cli_export_format_flag_overrides_extension() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = write_file(&td, "notas.csv", "texto\nfebre febre tosse\n");
    run_cli_ok_in(
        td.path(),
        &[
            f.to_string_lossy().as_ref(),
            "--column",
            "texto",
            "--freq-out",
            "freq.out",
            "--export-format",
            "json",
            "--no-image",
        ],
    );
    let v: Json =
        serde_json::from_str(&fs::read_to_string(td.path().join("freq.out")).unwrap()).unwrap();
    assert!(v.as_array().unwrap().len() == 2);
}

#[test]
fn cli_jobs_file_runs_each_job() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "a.csv", "texto\nfebre tosse febre\n");
    write_file(&td, "b.csv", "queixa\ndor lombar\n");
    let jobs = format!(
        r#"[
            {{"input": "a.csv", "column": "texto", "frequency_output": "fa.csv",
              "image_output": "a.png", "cloud": {{"width": 200, "height": 100, "dpi": 100, "seed": 1}}}},
            {{"input": "b.csv", "column": "queixa", "frequency_output": "fb.{}",
              "image_output": "b.png", "cloud": {{"width": 200, "height": 100, "dpi": 100, "seed": 1}}}}
        ]"#,
        ExportFormat::Tsv.extension()
    );
    let jobs_path = write_file(&td, "jobs.json", &jobs);
    run_cli_ok_in(td.path(), &["--jobs", jobs_path.to_str().unwrap()]);

    assert!(td.path().join("fa.csv").is_file());
    assert!(td.path().join("fb.tsv").is_file());
    assert!(td.path().join("a.png").is_file());
    assert!(td.path().join("b.png").is_file());
}

#[test]
fn cli_jobs_file_keeps_going_after_failure() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "ok.csv", "texto\nfebre tosse febre\n");
    let jobs = r#"[
        {"input": "falta.csv", "column": "texto", "frequency_output": "f1.csv"},
        {"input": "ok.csv", "column": "texto", "frequency_output": "f2.csv",
         "save_image": false, "cloud": {"width": 200, "height": 100, "dpi": 100}}
    ]"#;
    let jobs_path = write_file(&td, "jobs.json", jobs);
    run_cli_fail_in(td.path(), &["--jobs", jobs_path.to_str().unwrap()]);
    assert!(!td.path().join("f1.csv").exists());
    assert!(td.path().join("f2.csv").is_file());
}

#[test]
fn cli_default_jobs_fail_cleanly_without_inputs() {
    // the built-in jobs read fixed file names from the working directory
    let td = tempdir().unwrap();
    run_cli_fail_in(td.path(), &[]).stderr(predicate::str::contains("job(s) failed"));
}
