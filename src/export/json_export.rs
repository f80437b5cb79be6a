use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::export::Exporter;
use crate::pipeline::PageReport;

/// Writes the full report and the final assignment as separate files;
/// downstream consumers usually want only the assignment.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    out_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, report: &PageReport) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;

        let report_path = self.out_dir.join("report.json");
        fs::write(report_path, serde_json::to_string_pretty(report)?)?;

        let assignment_path = self.out_dir.join("assignment.json");
        fs::write(
            assignment_path,
            serde_json::to_string_pretty(&report.assignment)?,
        )?;

        Ok(())
    }
}
