//! Test helpers for seeding GeoJSON stores and invoking subcommands.

use super::*;
use serde_json::Value;
use std::io::Cursor;
use tempfile::TempDir;

pub(super) const DINAGAT: &str = r#"{
    "type": "Feature",
    "id": "123-456",
    "geometry": {"type": "Point", "coordinates": [125.6, 10.1]},
    "properties": {"name": "Dinagat Islands", "pop": 7000}
}"#;

pub(super) const NULL_ISLAND: &str = r#"{
    "type": "Feature",
    "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
    "properties": {"name": "Null Island", "pop": 0}
}"#;

/// Temporary directory holding a GeoJSON store seeded with the Dinagat
/// Islands.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let workspace = Self { _dir: dir, root };
        let document = format!(r#"{{"type": "FeatureCollection", "features": [{DINAGAT}]}}"#);
        workspace.write("islands.geojson", &document);
        workspace
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write workspace file");
        path
    }

    pub(super) fn store(&self) -> Utf8PathBuf {
        self.path("islands.geojson")
    }

    /// Run `subcommand` against the seeded store with `extra` arguments.
    pub(super) fn run(
        &self,
        subcommand: &str,
        extra: &[&str],
        stdin: &str,
    ) -> Result<Value, CliError> {
        let store = self.store();
        let mut args = vec![subcommand, "--type", "GeoJSON", "--data", store.as_str()];
        args.extend_from_slice(extra);
        invoke(&args, stdin)
    }
}

/// Parse `args` as a command line and run it with `stdin` as input.
pub(super) fn invoke(args: &[&str], stdin: &str) -> Result<Value, CliError> {
    let cli = Cli::try_parse_from(std::iter::once("geoprovider").chain(args.iter().copied()))?;
    let mut input = Cursor::new(stdin.as_bytes().to_vec());
    let mut output = Vec::new();
    run_command(cli.command, &mut input, &mut output)?;
    assert!(output.ends_with(b"\n"), "output should end with a newline");
    Ok(serde_json::from_slice(&output).expect("CLI output should be JSON"))
}

pub(super) fn names(collection: &Value) -> Vec<String> {
    collection["features"]
        .as_array()
        .map(|features| {
            features
                .iter()
                .filter_map(|feature| feature["properties"]["name"].as_str())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
