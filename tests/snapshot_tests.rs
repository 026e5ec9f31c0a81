//! Tests for snapshot file selection, hashing and the lockfile format.
//!
//! Network-touching paths are exercised manually; everything below runs
//! against local fixtures.

use candle_studio::snapshot::{
    lock_path_for, parse_patterns, selected, sha256_file, FileRecord, Lockfile,
};
use glob::Pattern;
use std::path::Path;

fn patterns(list: &[&str]) -> Vec<Pattern> {
    list.iter().map(|p| Pattern::new(p).unwrap()).collect()
}

#[test]
fn include_filter_selects_matching_files() {
    let include = patterns(&["*.safetensors", "*.json"]);
    let exclude = patterns(&[]);

    assert!(selected("model.safetensors", &include, &exclude));
    assert!(selected("config.json", &include, &exclude));
    assert!(!selected("pytorch_model.bin", &include, &exclude));
    assert!(!selected("README.md", &include, &exclude));
}

#[test]
fn empty_include_means_everything() {
    let include = patterns(&[]);
    let exclude = patterns(&["*.bin"]);

    assert!(selected("anything.txt", &include, &exclude));
    assert!(!selected("weights.bin", &include, &exclude));
}

#[test]
fn exclude_wins_over_include() {
    let include = patterns(&["*.json"]);
    let exclude = patterns(&["tokenizer*"]);

    assert!(selected("config.json", &include, &exclude));
    assert!(!selected("tokenizer.json", &include, &exclude));
}

#[test]
fn pattern_csv_parsing_matches_cli_contract() {
    assert_eq!(
        parse_patterns("*.safetensors,*.json"),
        vec!["*.safetensors", "*.json"]
    );
    assert_eq!(parse_patterns(" a , , b "), vec!["a", "b"]);
    assert!(parse_patterns("").is_empty());
}

#[test]
fn sha256_matches_known_vector() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("hello.txt");
    std::fs::write(&path, b"hello world")?;

    // sha256("hello world")
    assert_eq!(
        sha256_file(&path)?,
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
    Ok(())
}

#[test]
fn sha256_streams_large_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("big.bin");
    // Larger than one hashing buffer to cover the chunked read path.
    std::fs::write(&path, vec![0xabu8; 3 * 1024 * 1024])?;

    let once = sha256_file(&path)?;
    let twice = sha256_file(&path)?;
    assert_eq!(once, twice);
    assert_eq!(once.len(), 64);
    Ok(())
}

#[test]
fn lockfile_round_trips_through_json() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("name.lock.json");

    let lock = Lockfile {
        repo: "org/name".to_string(),
        revision: "main".to_string(),
        resolved_commit: "5c9d0c0e".to_string(),
        include_patterns: vec!["*.safetensors".to_string()],
        exclude_patterns: vec![],
        dest: "models/org/name".to_string(),
        files: vec![FileRecord {
            path: "model.safetensors".to_string(),
            sha256: "00".repeat(32),
            size: 1234,
        }],
    };
    lock.write(&path)?;

    let loaded = Lockfile::load(&path)?;
    assert_eq!(loaded, lock);

    // The on-disk form stays readable by plain JSON tooling.
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw["resolved_commit"], "5c9d0c0e");
    assert_eq!(raw["files"][0]["size"], 1234);
    Ok(())
}

#[test]
fn lock_path_is_a_sibling_of_the_snapshot_dir() {
    assert_eq!(
        lock_path_for(Path::new("models/stabilityai/stable-diffusion-2-1")),
        Path::new("models/stabilityai/stable-diffusion-2-1.lock.json")
    );
}
