//! Helper functions for tempfile usage in tests

use anyhow::Context;
use graph_runtime_debug::graph::GraphJson;
use std::io::Write;

/// Create a named temp file with a helpful error message.
pub fn create_temp_file() -> anyhow::Result<tempfile::NamedTempFile> {
    tempfile::NamedTempFile::new().context("Failed to create temporary file for test")
}

/// Serialize `graph` into a fresh `.json` temp file.
///
/// The file is removed when the returned handle is dropped.
pub fn write_graph_file(graph: &GraphJson) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::with_suffix(".json")
        .context("Failed to create temporary graph file")?;
    file.write_all(graph.to_json()?.as_bytes())
        .context("Failed to write graph JSON")?;
    file.flush()?;
    Ok(file)
}
