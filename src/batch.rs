use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::FighterRecord;
use crate::pipeline::PartitionSource;

/// Everything gathered so far in one run. Owned by the orchestrator.
#[derive(Debug, Default)]
pub struct AggregateBatch {
    records: Vec<FighterRecord>,
    last_checkpoint: usize,
}

impl AggregateBatch {
    pub fn extend(&mut self, partition: Vec<FighterRecord>) {
        self.records.extend(partition);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FighterRecord] {
        &self.records
    }

    /// True once `threshold` records have arrived since the last checkpoint.
    pub fn checkpoint_due(&self, threshold: usize) -> bool {
        self.records.len() - self.last_checkpoint >= threshold
    }

    fn mark_checkpoint(&mut self) {
        self.last_checkpoint = self.records.len();
    }
}

/// Where checkpoints go. Each write replaces whatever was written before.
pub trait CheckpointSink {
    fn write(&mut self, batch: &[FighterRecord]) -> Result<()>;
}

/// Pretty JSON array on disk, four-space indent, rewritten in full each time.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CheckpointSink for JsonFileSink {
    /// Writes a sibling `.tmp` file and renames it over the target, so a
    /// crash mid-write leaves the previous checkpoint intact.
    fn write(&mut self, batch: &[FighterRecord]) -> Result<()> {
        let tmp = self.tmp_path();
        let file = File::create(&tmp).with_context(|| format!("Failed to create {:?}", tmp))?;
        let mut out = BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        batch
            .serialize(&mut ser)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        out.flush()?;
        drop(out);

        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {:?} to {:?}", tmp, self.path))?;
        Ok(())
    }
}

/// Read a checkpoint file back.
pub fn load_batch(path: &Path) -> Result<Vec<FighterRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(records)
}

/// Partition keys to walk: `a..=z` unless the user names a subset.
pub fn partition_keys(selection: Option<&str>) -> Result<Vec<char>> {
    let Some(sel) = selection else {
        return Ok(('a'..='z').collect());
    };

    let mut keys = Vec::new();
    for c in sel.chars().filter(char::is_ascii_alphabetic) {
        let c = c.to_ascii_lowercase();
        if !keys.contains(&c) {
            keys.push(c);
        }
    }
    if keys.is_empty() {
        bail!("No letters in key selection {:?}", sel);
    }
    Ok(keys)
}

/// Run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub partitions: usize,
    pub records: usize,
    pub checkpoints: usize,
}

/// Walk the keys in order, one partition at a time, checkpointing as the
/// batch grows and once more at the end.
///
/// Only sink failures are errors; they abort the run.
pub async fn run_batch(
    source: &dyn PartitionSource,
    keys: &[char],
    sink: &mut dyn CheckpointSink,
    checkpoint_threshold: usize,
) -> Result<(AggregateBatch, BatchStats)> {
    let threshold = checkpoint_threshold.max(1);
    let mut batch = AggregateBatch::default();
    let mut checkpoints = 0usize;

    let pb = ProgressBar::new(keys.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    for &key in keys {
        pb.set_message(format!("char={}", key));
        let fighters = source.fetch_partition(key).await;
        batch.extend(fighters);

        if batch.checkpoint_due(threshold) {
            sink.write(batch.records())?;
            batch.mark_checkpoint();
            checkpoints += 1;
            info!("Saved {} fighters so far...", batch.len());
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if batch.is_empty() {
        warn!("No fighters scraped from {} letters", keys.len());
    }
    sink.write(batch.records())?;
    batch.mark_checkpoint();
    checkpoints += 1;
    info!("Scraped {} fighters in total", batch.len());

    let stats = BatchStats {
        partitions: keys.len(),
        records: batch.len(),
        checkpoints,
    };
    Ok((batch, stats))
}
