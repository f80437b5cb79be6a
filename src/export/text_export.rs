use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::assign::{ReassignReason, SequenceGap};
use crate::export::Exporter;
use crate::pipeline::PageReport;

#[derive(Debug, Clone)]
pub struct TextExporter {
    out_dir: PathBuf,
}

impl TextExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn format_report(report: &PageReport) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "=== Page {} ===", report.image_id);
        let _ = writeln!(
            text,
            "elements: {} total, {} valid ({:.1}%)",
            report.stats.total,
            report.stats.valid,
            report.stats.valid_percentage()
        );
        let _ = writeln!(text, "questions: {}", report.assignment.question_count());

        for gap in &report.validation.sequence_gaps {
            match gap {
                SequenceGap::MissingQuestions { after, before, missing } => {
                    let _ = writeln!(
                        text,
                        "[GAP] numbering jumps {} -> {} (missing {:?})",
                        after, before, missing
                    );
                }
                SequenceGap::StrayElement {
                    question,
                    element_id,
                    distance,
                } => {
                    let _ = writeln!(
                        text,
                        "[STRAY] {} sits {:.0}px outside question {}",
                        element_id, distance, question
                    );
                }
            }
        }

        for conflict in &report.validation.range_conflicts {
            let _ = writeln!(
                text,
                "[CONFLICT] q{}/q{} metric {:.1} ({} contested)",
                conflict.lower_question,
                conflict.upper_question,
                conflict.conflict_metric,
                conflict.contested.len()
            );
        }

        for log in &report.reassignment.logs {
            let reason = match log.reason {
                ReassignReason::IouBased => "iou",
                ReassignReason::DistanceBased => "distance",
            };
            let _ = writeln!(
                text,
                "[MOVE] {} q{} -> q{} ({})",
                log.element_id, log.from_question, log.to_question, reason
            );
        }

        if report.validation.is_clean() {
            let _ = writeln!(text, "no gaps or conflicts");
        }

        text
    }
}

impl Exporter for TextExporter {
    fn export(&self, report: &PageReport) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join("summary.txt");
        fs::write(path, Self::format_report(report))?;
        Ok(())
    }
}
