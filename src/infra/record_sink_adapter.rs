use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::app::ports::RecordSink;
use crate::error::{ExtractError, Result};
use crate::pipeline::processing::quality_gate::{BatchOutcome, ValidatedRecord};

/// Appends each bucket of a validated batch to its own NDJSON file:
/// `<stem>_valid.ndjson`, `<stem>_needs_review.ndjson`, `<stem>_invalid.ndjson`
pub struct NdjsonRecordSink {
    valid: Mutex<BufWriter<File>>,
    needs_review: Mutex<BufWriter<File>>,
    invalid: Mutex<BufWriter<File>>,
}

impl NdjsonRecordSink {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base = base_path.as_ref();
        let dir = base.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let stem = base
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("positions");
        let path_for = |bucket: &str| dir.join(format!("{}_{}.ndjson", stem, bucket));

        info!("NdjsonRecordSink: writing to {}/{}_*.ndjson", dir.display(), stem);
        Ok(Self {
            valid: Mutex::new(open_append(&path_for("valid"))?),
            needs_review: Mutex::new(open_append(&path_for("needs_review"))?),
            invalid: Mutex::new(open_append(&path_for("invalid"))?),
        })
    }
}

fn open_append(path: &PathBuf) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_bucket(writer: &Mutex<BufWriter<File>>, records: &[ValidatedRecord]) -> Result<()> {
    let mut writer = writer
        .lock()
        .map_err(|_| ExtractError::Config("record sink lock poisoned".to_string()))?;
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

impl RecordSink for NdjsonRecordSink {
    fn write_batch(&self, batch: &BatchOutcome) -> Result<()> {
        write_bucket(&self.valid, &batch.valid)?;
        write_bucket(&self.needs_review, &batch.needs_review)?;
        write_bucket(&self.invalid, &batch.invalid)?;
        Ok(())
    }
}
