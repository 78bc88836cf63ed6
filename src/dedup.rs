// ===============================
// src/dedup.rs
// ===============================
//
// Durable set of order ids already relayed to the primary channel.
// - plain text, one id per line
// - load: missing file -> empty set
// - save: full overwrite (no merge)
//
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::RelayError;

#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<HashSet<String>, RelayError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "dedup: no file yet, starting empty");
                return Ok(HashSet::new());
            }
            Err(e) => return Err(e.into()),
        };
        let set: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        info!(path = %self.path.display(), entries = set.len(), "dedup: loaded");
        Ok(set)
    }

    pub async fn save(&self, ids: &HashSet<String>) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut out = String::with_capacity(ids.len() * 8);
        for id in ids {
            out.push_str(id);
            out.push('\n');
        }
        fs::write(&self.path, out).await?;
        debug!(entries = ids.len(), "dedup: saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("sent_orders.txt"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("nested/sent_orders.txt"));

        let first: HashSet<String> = ["1", "2", "3"].into_iter().map(String::from).collect();
        store.save(&first).await.unwrap();
        let second: HashSet<String> = ["9"].into_iter().map(String::from).collect();
        store.save(&second).await.unwrap();

        assert_eq!(store.load().await.unwrap(), second);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "9\n");
    }

    #[tokio::test]
    async fn load_trims_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_orders.txt");
        std::fs::write(&path, "101\n  202 \n\n303").unwrap();
        let set = DedupStore::new(&path).load().await.unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("202"));
    }
}
