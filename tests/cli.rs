use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const TABLE: &str = "locus tag,product,s1,s2,s3,s4\n\
                     A1,kinase,\"1,5\",2.0,3.1,4.2\n\
                     A2,ligase,2.0,4.5,6.1,8.0\n\
                     A3,unknown,9.0,3.0,1.0,0.5\n\
                     A4,kinase,1.0,n/a,1.0,1.0\n\
                     A5,porin,5.0,5.5,4.0,7.0\n";

fn pcakit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pcakit"))
        .args(args)
        .args(["--log-level", "warn"])
        .output()
        .expect("failed to run pcakit")
}

fn write_table(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write table");
    path.to_str().expect("utf-8 path").to_string()
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "pcakit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_scatter_prints_sample_coordinates() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let json = stdout_json(&pcakit(&["scatter", "--input", &input]));
    let points = json["points"].as_array().expect("points");
    assert_eq!(points.len(), 4);
    assert_eq!(points[0]["sampleId"], "s1");
    assert_eq!(points[0]["coordinates"].as_array().expect("coords").len(), 2);
    assert!(json["axisLabels"][0]
        .as_str()
        .expect("label")
        .starts_with("PC1 ("));
}

#[test]
fn test_scree_reports_crossing() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let json = stdout_json(&pcakit(&["scree", "--input", &input, "--threshold", "100"]));
    let cumulative = json["cumulativeVariancePct"].as_array().expect("series");
    assert_eq!(cumulative.len(), 3);
    assert_eq!(cumulative[2], 100.0);
    assert_eq!(json["thresholdCrossingIndex"], 2);
}

#[test]
fn test_loadings_records_keyed_by_identifier() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let json = stdout_json(&pcakit(&["loadings", "--input", &input, "--records"]));
    let records = json.as_array().expect("records");
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["locus tag"], "A1");
    assert!(records[0]["PC1"].is_f64());
}

#[test]
fn test_contributors_with_bottom_list() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let json = stdout_json(&pcakit(&[
        "contributors",
        "--input",
        &input,
        "--top-k",
        "2",
        "--bottom",
    ]));
    // 3 components x 2 contributors
    assert_eq!(json["top"].as_array().expect("top").len(), 6);
    assert_eq!(json["bottom"].as_array().expect("bottom").len(), 6);
}

#[test]
fn test_too_many_components_fails() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let output = pcakit(&["scree", "--input", &input, "--components", "5"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
}

#[test]
fn test_store_lookup_by_id() {
    let dir = TempDir::new().expect("temp dir");
    write_table(dir.path(), "liver.csv", TABLE);
    let store = dir.path().to_str().expect("utf-8 path");

    let json = stdout_json(&pcakit(&[
        "loadings", "--store", store, "--table-id", "liver",
    ]));
    assert_eq!(json["featureColumn"], "locus tag");

    let missing = pcakit(&["loadings", "--store", store, "--table-id", "heart"]);
    assert!(!missing.status.success());
}

#[test]
fn test_analyze_writes_all_outputs() {
    let dir = TempDir::new().expect("temp dir");
    let liver = write_table(dir.path(), "liver.csv", TABLE);
    let kidney = write_table(
        dir.path(),
        "kidney.json",
        r#"{"index": ["g1", "g2", "g3"], "columns": ["a", "b"], "data": [[1, 2], [3, 1], [0.5, 0.7]]}"#,
    );
    let out = dir.path().join("out");
    let out_str = out.to_str().expect("utf-8 path");

    let output = pcakit(&[
        "analyze",
        "--input",
        &liver,
        "--input",
        &kidney,
        "--output-dir",
        out_str,
    ]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    for file in [
        "scatter2d.json",
        "scatter3d.json",
        "scree.json",
        "loadings.json",
        "contributors.json",
        "summary.txt",
    ] {
        assert!(out.join("liver").join(file).exists(), "missing liver/{file}");
    }

    // 2 samples give a single component: no scatter files
    assert!(!out.join("kidney").join("scatter2d.json").exists());
    assert!(out.join("kidney").join("scree.json").exists());
    let summary = std::fs::read_to_string(out.join("liver").join("summary.txt")).expect("read");
    assert!(summary.contains("1 dropped"));
}

#[test]
fn test_demo_data_is_reproducible_and_analyzable() {
    let dir = TempDir::new().expect("temp dir");
    let first = dir.path().join("demo1.csv");
    let second = dir.path().join("demo2.csv");

    for path in [&first, &second] {
        let output = pcakit(&[
            "demo-data",
            "--features",
            "30",
            "--samples",
            "8",
            "--seed",
            "11",
            "--output",
            path.to_str().expect("utf-8 path"),
        ]);
        assert!(output.status.success());
    }
    let a = std::fs::read_to_string(&first).expect("read");
    let b = std::fs::read_to_string(&second).expect("read");
    assert_eq!(a, b);
    assert!(a.starts_with("locus tag,product,sample1"));

    let json = stdout_json(&pcakit(&[
        "scatter",
        "--input",
        first.to_str().expect("utf-8 path"),
        "--dims",
        "3",
    ]));
    assert_eq!(json["points"].as_array().expect("points").len(), 8);
}

#[test]
fn test_invalid_threshold_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_table(dir.path(), "liver.csv", TABLE);

    let output = pcakit(&["scree", "--input", &input, "--threshold", "0"]);
    assert!(!output.status.success());
}
