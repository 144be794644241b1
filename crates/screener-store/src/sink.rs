//! JSON report files with atomic writes

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use screener_pipeline::{ReportSink, RunReport};

use crate::hash::{report_fingerprint, short_hash};

/// Writes `report_YYYYmmddHHMM.json` into a directory, created on demand.
///
/// The file is written to `<name>.tmp` and renamed into place, so readers
/// never see a partial report.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a report, in local time.
    pub fn file_name(report: &RunReport) -> String {
        report
            .generated_at
            .with_timezone(&Local)
            .format("report_%Y%m%d%H%M.json")
            .to_string()
    }

    /// Remove `.tmp` files left behind by an interrupted write.
    pub fn cleanup_tmp(&self) -> io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".tmp") && entry.path().is_file() {
                log::info!("cleaning stale tmp: {name}");
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ReportSink for JsonReportSink {
    async fn write(&self, report: &RunReport) -> io::Result<PathBuf> {
        let json = report.to_json().map_err(io::Error::other)?;
        let fingerprint = report_fingerprint(report).map_err(io::Error::other)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let name = Self::file_name(report);
        let final_path = self.dir.join(&name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));

        tokio::fs::write(&tmp_path, json.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        log::debug!(
            "store: wrote {} ({} bytes, content {})",
            final_path.display(),
            json.len(),
            short_hash(&fingerprint)
        );
        Ok(final_path)
    }
}
