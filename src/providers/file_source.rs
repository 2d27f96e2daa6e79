use crate::core::table::{Record, TableSource};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads configuration tables from a local YAML (or JSON) document of the
/// form `{ <table>: [ {column: value, ...}, ... ] }`.
///
/// The file is re-read on every fetch so edits show up once the
/// configuration cache expires.
pub struct FileTableSource {
    path: PathBuf,
}

impl FileTableSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TableSource for FileTableSource {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Record>> {
        debug!("Reading table {} from {}", table, self.path.display());
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read table file: {}", self.path.display()))?;

        let mut document: Map<String, Value> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse table file: {}", self.path.display()))?;

        let rows = match document.remove(table) {
            Some(Value::Array(rows)) => rows,
            Some(_) => return Err(anyhow!("Table {} is not a list of rows", table)),
            None => return Err(anyhow!("Table {} not found in {}", table, self.path.display())),
        };

        rows.into_iter()
            .enumerate()
            .map(|(index, row)| match row {
                Value::Object(record) => Ok(record),
                _ => Err(anyhow!("Row {} of table {} is not a mapping", index, table)),
            })
            .collect()
    }
}
