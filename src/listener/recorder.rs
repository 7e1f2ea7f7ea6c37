//! JSON Lines recording of readings
//!
//! Each reading becomes one line:
//!
//! ```text
//! {"seq":0,"received_at":"2026-10-16T09:12:03.120Z","values":{"count":3,"temp":21.5}}
//! ```

use super::ReadingListener;
use crate::error::{Result, ResultExt};
use crate::types::Reading;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends every reading to a JSON Lines file
pub struct JsonLinesRecorder {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    path: Option<PathBuf>,
}

impl JsonLinesRecorder {
    /// Open (or create) a recording file
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create recording directory {:?}", parent))?;
        }

        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("Failed to open recording file {:?}", path))?;

        tracing::info!("Recording readings to {:?}", path);

        Ok(Self {
            writer: Mutex::new(BufWriter::new(Box::new(file))),
            path: Some(path.to_path_buf()),
        })
    }

    /// Record into an arbitrary writer
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(Box::new(writer))),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ReadingListener for JsonLinesRecorder {
    fn accept(&self, reading: &Reading) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("recorder writer lock poisoned"))?;
        serde_json::to_writer(&mut *writer, reading)?;
        writer.write_all(b"\n")?;
        // Flush per reading; frames arrive at the sensor sampling rate
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-lines-recorder"
    }
}
