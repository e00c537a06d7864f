#![allow(clippy::option_if_let_else)]

//! Shared helpers for the integration tests: workspace discovery, golden
//! disassembly fixtures under `test_data/` and logging setup.

use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Set to rewrite golden fixtures with the actual output instead of comparing
pub const BLESS_ENV: &str = "TINCTURE_BLESS";

pub(crate) static WORKSPACE_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let mut current = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    loop {
        if current.join("Cargo.toml").exists() {
            let cargo_toml = std::fs::read_to_string(current.join("Cargo.toml"))
                .expect("Failed to read Cargo.toml");
            if cargo_toml.contains("[workspace]") {
                return current;
            }
        }

        current = current
            .parent()
            .expect("Could not find workspace root")
            .to_path_buf();
    }
});

pub fn test_data_path() -> PathBuf {
    WORKSPACE_ROOT.join("test_data")
}

/// Get the path to a test fixture file relative to the test_data directory
///
/// ## Arguments
/// * `name` - The relative path to the fixture file (e.g., "matrix/add_mat2x3.ir")
pub fn fixture_path(name: &str) -> PathBuf {
    test_data_path().join(name)
}

/// Read the contents of a test fixture file
pub fn read_fixture(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", path.display(), e))
}

/// List the `.ir` fixtures in a subdirectory of test_data, sorted by name
pub fn list_fixtures(subdir: &str) -> Vec<String> {
    let dir_path = test_data_path().join(subdir);

    let mut fixtures: Vec<String> = std::fs::read_dir(&dir_path)
        .unwrap_or_else(|e| panic!("Failed to read directory '{}': {}", dir_path.display(), e))
        .filter_map(|entry| {
            entry.ok().and_then(|e| {
                let path = e.path();
                if path.extension()?.to_str()? == "ir" {
                    path.file_name()?.to_str().map(String::from)
                } else {
                    None
                }
            })
        })
        .collect();
    fixtures.sort();
    fixtures
}

/// Compare `actual` against the golden fixture `name`.
///
/// With `TINCTURE_BLESS` set, the fixture is (re)written instead.
pub fn assert_golden(name: &str, actual: &str) {
    let path = fixture_path(name);
    if std::env::var_os(BLESS_ENV).is_some() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("Failed to create '{}': {}", parent.display(), e));
        }
        std::fs::write(&path, actual)
            .unwrap_or_else(|e| panic!("Failed to write fixture '{}': {}", path.display(), e));
        return;
    }
    let expected = read_fixture(name);
    assert!(
        expected == actual,
        "golden mismatch for '{name}'\n--- expected\n{expected}\n--- actual\n{actual}"
    );
}

/// Route `log` records from the crates under test to the test output.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}
