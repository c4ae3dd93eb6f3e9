//! Blank-node identifier allocation.
//!
//! Every `(table, primary value)` pair maps to exactly one blank-node
//! label of the form `_:<table>_<value>`, minted on first use and stable
//! for the rest of the run. The map is the only shared mutable structure
//! touched during row processing: readers take the shared lock, a miss
//! upgrades to the exclusive lock and rechecks before inserting.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;

/// Allocator persistence errors
#[derive(Error, Debug)]
pub enum UidError {
    #[error("failed to persist identifier map: {0}")]
    Io(#[from] io::Error),
}

pub type UidResult<T> = Result<T, UidError>;

/// Thread-safe minting of stable blank-node labels.
#[derive(Debug, Default)]
pub struct UidAllocator {
    labels: RwLock<HashMap<String, String>>,
}

impl UidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the label for `(table, value)`, minting it on first use.
    ///
    /// Never blocks on I/O; may briefly wait on the lock under
    /// contention. A poisoned lock is recovered — the map holds only
    /// owned strings, so its contents stay coherent across a panic.
    pub fn get_or_create(&self, table: &str, value: &str) -> String {
        let key = format!("{table}:{value}");

        if let Some(label) = self
            .labels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return label.clone();
        }

        let mut labels = self
            .labels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Recheck after the upgrade: another worker may have minted the
        // label between our read unlock and write lock.
        if let Some(label) = labels.get(&key) {
            return label.clone();
        }

        let label = mint_label(table, value);
        labels.insert(key, label.clone());
        label
    }

    /// Number of labels minted so far.
    pub fn len(&self) -> usize {
        self.labels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the map as newline-delimited `table:key=label` entries,
    /// sorted for determinism. Tables that use a first-column surrogate
    /// key are documented in a comment header.
    pub fn persist(&self, path: &Path, surrogate_tables: &[&str]) -> UidResult<usize> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        for table in surrogate_tables {
            writeln!(writer, "# {table}: no primary key, first column used as surrogate")?;
        }

        let labels = self
            .labels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries: Vec<(&String, &String)> = labels.iter().collect();
        entries.sort();

        for (key, label) in &entries {
            writeln!(writer, "{key}={label}")?;
        }
        writer.flush()?;

        info!(count = entries.len(), path = %path.display(), "identifier map persisted");
        Ok(entries.len())
    }
}

/// Mint `_:<table>_<value>` with both parts sanitized to the blank-node
/// alphabet `[A-Za-z0-9_]`; every rejected byte is hex-encoded as `_xNN`
/// so distinct raw values keep distinct labels.
fn mint_label(table: &str, value: &str) -> String {
    format!("_:{}_{}", sanitize(table), sanitize(value))
}

fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_x{byte:02x}"));
        }
    }
    out
}
