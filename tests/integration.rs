use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn homedocs_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("homedocs");
    path
}

fn sample_jpeg(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 180])
    }));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .unwrap();
    out
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("w2.jpg"), sample_jpeg(640, 480)).unwrap();
    fs::write(files_dir.join("receipt.jpg"), sample_jpeg(200, 600)).unwrap();
    fs::write(files_dir.join("broken.jpg"), b"this is not an image").unwrap();

    let config_content = format!(
        r#"app-name = "HomeDocs"
app-version = "1.0"
config-version = "0.1"

[app]
page_title = "HomeDocs"
page_icon = ":shark:"
layout = "centered"
data_path_root = "{}/data"

[summarize]
provider = "lead"
"#,
        root.display()
    );

    let config_path = root.join("config.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_homedocs(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = homedocs_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run homedocs binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_index(config_path: &Path) -> serde_json::Value {
    let data = config_path.parent().unwrap().join("data").join("map.json");
    serde_json::from_str(&fs::read_to_string(data).unwrap()).unwrap()
}

#[test]
fn test_init_builds_tree_and_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_homedocs(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Shard dirs:  4096 created"));
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/f/f/f").is_dir());
    assert_eq!(read_index(&config_path), serde_json::json!({}));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_homedocs(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (stdout, _, success2) = run_homedocs(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
    assert!(stdout.contains("Shard dirs:  0 created"));
}

#[test]
fn test_missing_config_is_created() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config.toml");

    let output = Command::new(homedocs_binary())
        .current_dir(tmp.path())
        .args(["--config", "config.toml", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("data_path_root = \"data\""));
    assert!(written.contains("page_icon = \":shark:\""));
}

#[test]
fn test_ingest_records_tags_and_paths() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/w2.jpg");

    let (stdout, stderr, success) = run_homedocs(
        &config_path,
        &[
            "ingest",
            file.to_str().unwrap(),
            "--tags",
            "2023 1099 tax form",
            "--progress",
            "off",
        ],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingested: 1"));

    let index = read_index(&config_path);
    let entries = index.as_object().unwrap();
    assert_eq!(entries.len(), 1);
    let record = &index["0"];
    assert_eq!(record["tags"], "2023 1099 tax form");
    assert_eq!(record["original_filename"], "w2.jpg");
    assert_eq!(record["extension"], ".jpg");
    assert_eq!(record["upload_time_zone"], "utc");

    let data = tmp.path().join("data");
    let id = record["id"].as_str().unwrap();
    let full_path = PathBuf::from(record["full_path"].as_str().unwrap());
    let expected = data
        .join(&id[0..1])
        .join(&id[1..2])
        .join(&id[2..3])
        .join(format!("{}.jpg", id));
    assert_eq!(full_path, expected);
    assert_eq!(fs::read(&full_path).unwrap(), fs::read(&file).unwrap());

    let thumb = PathBuf::from(record["thumbnail_path"].as_str().unwrap());
    assert_eq!(thumb.parent().unwrap(), data.join("previews"));
    assert!(thumb.exists());

    // OCR is disabled in this config
    assert!(record.get("ocr_text").is_none());
    assert!(record.get("summary_text").is_none());
}

#[test]
fn test_sequential_ingests_use_keys_zero_and_one() {
    let (tmp, config_path) = setup_test_env();
    let a = tmp.path().join("files/w2.jpg");
    let b = tmp.path().join("files/receipt.jpg");

    let (stdout, stderr, success) = run_homedocs(
        &config_path,
        &["ingest", a.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success, "stdout={}, stderr={}", stdout, stderr);
    let (_, _, success) = run_homedocs(
        &config_path,
        &["ingest", b.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success);

    let index = read_index(&config_path);
    assert_eq!(index.as_object().unwrap().len(), 2);
    assert_eq!(index["0"]["original_filename"], "w2.jpg");
    assert_eq!(index["1"]["original_filename"], "receipt.jpg");
    assert_ne!(index["0"]["id"], index["1"]["id"]);
}

#[test]
fn test_failed_file_reports_error_and_keeps_others() {
    let (tmp, config_path) = setup_test_env();
    let good = tmp.path().join("files/w2.jpg");
    let bad = tmp.path().join("files/broken.jpg");

    let (stdout, stderr, success) = run_homedocs(
        &config_path,
        &[
            "ingest",
            bad.to_str().unwrap(),
            good.to_str().unwrap(),
            "--progress",
            "json",
        ],
    );
    assert!(!success);
    assert!(stdout.contains("ingested: 1"));
    assert!(stdout.contains("failed: 1"));
    assert!(stderr.contains("\"phase\":\"failed\""));
    assert!(stderr.contains("broken.jpg"));

    let index = read_index(&config_path);
    assert_eq!(index.as_object().unwrap().len(), 1);
    assert_eq!(index["0"]["original_filename"], "w2.jpg");
}

#[test]
fn test_list_and_get() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/receipt.jpg");
    run_homedocs(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--tags", "grocery receipt", "--progress", "off"],
    );

    let (stdout, _, success) = run_homedocs(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("receipt.jpg"));
    assert!(stdout.contains("grocery, receipt"));
    assert!(stdout.contains("1 document(s)"));

    let (stdout, _, success) = run_homedocs(&config_path, &["list", "--json"]);
    assert!(success);
    let listed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(listed[0]["key"], 0);
    assert_eq!(listed[0]["missing_files"], serde_json::json!([]));

    let (stdout, _, success) = run_homedocs(&config_path, &["get", "0"]);
    assert!(success);
    assert!(stdout.contains("original_filename: receipt.jpg"));
    assert!(stdout.contains("(no OCR text)"));

    let (_, stderr, success) = run_homedocs(&config_path, &["get", "99"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_list_tolerates_deleted_thumbnail() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/w2.jpg");
    run_homedocs(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--progress", "off"],
    );
    let index = read_index(&config_path);
    fs::remove_file(index["0"]["thumbnail_path"].as_str().unwrap()).unwrap();

    let (stdout, stderr, success) = run_homedocs(&config_path, &["list"]);
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("[missing files]"));

    let (stdout, _, success) = run_homedocs(&config_path, &["check"]);
    assert!(!success);
    assert!(stdout.contains("Missing thumbnails: 1"));
}

#[test]
fn test_check_passes_after_ingest() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/w2.jpg");
    run_homedocs(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--progress", "off"],
    );

    let (stdout, stderr, success) = run_homedocs(&config_path, &["check"]);
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Documents:   1"));
    assert!(stdout.contains("Shard dirs:  4096 / 4096"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_corrupt_index_fails_loudly() {
    let (tmp, config_path) = setup_test_env();
    run_homedocs(&config_path, &["init"]);
    let map = tmp.path().join("data/map.json");
    fs::write(&map, "[1, 2").unwrap();

    let file = tmp.path().join("files/w2.jpg");
    let (_, stderr, success) = run_homedocs(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("corrupt"));
    assert_eq!(fs::read_to_string(&map).unwrap(), "[1, 2");
}
