//! Chunked serial sink.
//!
//! All workers write through one mutex-guarded buffered writer, which is
//! both the line-atomicity guarantee and the pipeline's sole
//! backpressure mechanism. Output rolls to a new chunk file every
//! `chunk_threshold` records; closed chunks are immutable and recorded
//! in an ordered manifest.

use crate::rdf::Triple;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// File I/O error — fatal, there is no reliable recovery path
    #[error("output write failed: {0}")]
    Io(#[from] io::Error),

    /// Manifest serialization error
    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Write attempted after finalize
    #[error("sink already finalized")]
    Finalized,
}

pub type SinkResult<T> = Result<T, SinkError>;

/// One closed chunk in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub index: u32,
    pub filename: String,
    pub record_count: u64,
    pub byte_size: u64,
}

/// Sink configuration.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Output directory (created if missing).
    pub directory: PathBuf,
    /// Base RDF file name supplying the chunk-file stem.
    pub rdf_file: String,
    /// Records per chunk before rolling.
    pub chunk_threshold: u64,
    /// Count records without touching disk.
    pub dry_run: bool,
}

/// Name of chunk `index` for a configured RDF file name:
/// `data.rdf` → `data_chunk_1.rdf`.
pub fn chunk_file_name(rdf_file: &str, index: u32) -> String {
    match rdf_file.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_chunk_{index}.{ext}"),
        None => format!("{rdf_file}_chunk_{index}"),
    }
}

/// Name of the manifest file for a configured RDF file name.
pub fn manifest_file_name(rdf_file: &str) -> String {
    let stem = rdf_file
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(rdf_file);
    format!("{stem}_chunks.json")
}

struct SinkState {
    writer: Option<BufWriter<File>>,
    chunk_index: u32,
    chunk_records: u64,
    chunk_bytes: u64,
    manifest: Vec<ChunkRecord>,
    total_records: u64,
    finalized: bool,
}

/// Mutex-guarded chunked writer shared by all workers.
pub struct ChunkedSink {
    options: SinkOptions,
    state: Mutex<SinkState>,
}

impl ChunkedSink {
    /// Create the sink, the output directory, and the first chunk file.
    pub fn create(options: SinkOptions) -> SinkResult<Self> {
        fs::create_dir_all(&options.directory)?;

        let writer = if options.dry_run {
            None
        } else {
            Some(open_chunk(&options, 1)?)
        };

        Ok(Self {
            options,
            state: Mutex::new(SinkState {
                writer,
                chunk_index: 1,
                chunk_records: 0,
                chunk_bytes: 0,
                manifest: Vec::new(),
                total_records: 0,
                finalized: false,
            }),
        })
    }

    /// Write one row's triples as a contiguous block.
    ///
    /// The lock is held for the whole block, so lines from different
    /// rows never interleave. Chunk rolls happen per record; a block may
    /// therefore span a chunk boundary, but each triple lands in exactly
    /// one chunk.
    pub fn write_block(&self, triples: &[Triple]) -> SinkResult<()> {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let state = &mut *guard;
        if state.finalized {
            return Err(SinkError::Finalized);
        }

        for triple in triples {
            if let Some(writer) = state.writer.as_mut() {
                let line = triple.to_string();
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
                state.chunk_bytes += line.len() as u64 + 1;
            }
            state.chunk_records += 1;
            state.total_records += 1;

            if state.chunk_records >= self.options.chunk_threshold {
                self.roll(state)?;
            }
        }
        Ok(())
    }

    /// Total records written (or counted, in dry-run mode) so far.
    pub fn total_records(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .total_records
    }

    /// Flush and close the current chunk, write the manifest, and return
    /// it. Safe to call from both normal and cancelled shutdown paths;
    /// subsequent calls return the same manifest.
    pub fn finalize(&self) -> SinkResult<Vec<ChunkRecord>> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.finalized {
            return Ok(state.manifest.clone());
        }

        if state.chunk_records > 0 || state.manifest.is_empty() {
            self.close_chunk(&mut state)?;
        }
        state.finalized = true;

        if !self.options.dry_run {
            let manifest_path = self
                .options
                .directory
                .join(manifest_file_name(&self.options.rdf_file));
            let json = serde_json::to_string_pretty(&state.manifest)?;
            fs::write(&manifest_path, json)?;
            info!(
                chunks = state.manifest.len(),
                records = state.total_records,
                manifest = %manifest_path.display(),
                "output finalized"
            );
        }

        Ok(state.manifest.clone())
    }

    /// Path of the chunk file with the given index.
    pub fn chunk_path(&self, index: u32) -> PathBuf {
        self.options
            .directory
            .join(chunk_file_name(&self.options.rdf_file, index))
    }

    fn roll(&self, state: &mut SinkState) -> SinkResult<()> {
        self.close_chunk(state)?;
        let next = state.chunk_index + 1;
        if !self.options.dry_run {
            state.writer = Some(open_chunk(&self.options, next)?);
        }
        state.chunk_index = next;
        state.chunk_records = 0;
        state.chunk_bytes = 0;
        debug!(chunk = next, "rolled to next output chunk");
        Ok(())
    }

    fn close_chunk(&self, state: &mut SinkState) -> SinkResult<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        state.manifest.push(ChunkRecord {
            index: state.chunk_index,
            filename: chunk_file_name(&self.options.rdf_file, state.chunk_index),
            record_count: state.chunk_records,
            byte_size: state.chunk_bytes,
        });
        Ok(())
    }
}

fn open_chunk(options: &SinkOptions, index: u32) -> SinkResult<BufWriter<File>> {
    let path = options
        .directory
        .join(chunk_file_name(&options.rdf_file, index));
    let file = File::create(&path)?;
    debug!(path = %path.display(), "opened chunk file");
    Ok(BufWriter::with_capacity(64 * 1024, file))
}
