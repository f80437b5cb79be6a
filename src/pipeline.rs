use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assign::{
    resolve_conflicts, validate_assignment, AssignParams, ReassignmentResult, ResolutionStrategy,
    ValidationResult,
};
use crate::core::model::QuestionAssignment;
use crate::evaluate::GroundTruth;
use crate::normalize::{clamp_to_page, scale_elements, validate_batch, BatchStats};

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisConfig {
    pub strategy: ResolutionStrategy,
    pub params: AssignParams,
}

/// One page of detector output plus the initial question assignment
/// handed over by the upstream spatial-analysis service. Detector
/// coordinates may be in a different scale than the page dimensions;
/// scale_x/scale_y map them into page space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInput {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    pub questions: QuestionAssignment,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub stats: BatchStats,
    pub validation: ValidationResult,
    pub reassignment: ReassignmentResult,
    pub assignment: QuestionAssignment,
}

/// Runs the full pass over one page: normalize coordinates, validate
/// the assignment, resolve boundary conflicts, apply the moves.
pub fn analyze_page(input: &PageInput, config: &AnalysisConfig) -> PageReport {
    let mut assignment = QuestionAssignment::new();
    let mut stats = BatchStats::default();

    for (question, elements) in input.questions.iter() {
        let scaled = scale_elements(elements, input.scale_x, input.scale_y);
        let batch = validate_batch(&scaled, input.width, input.height);
        stats = merge_stats(stats, batch);
        for element in &scaled {
            assignment.push(question, clamp_to_page(element, input.width, input.height));
        }
    }
    assignment.sort_vertically();
    debug!(
        image = %input.image_id,
        total = stats.total,
        valid_pct = stats.valid_percentage(),
        "elements normalized"
    );

    let validation = validate_assignment(&assignment, &config.params);
    let reassignment = resolve_conflicts(&validation, &assignment, config.strategy, &config.params);
    assignment.apply_moves(&reassignment.moves);

    info!(
        image = %input.image_id,
        conflicts = validation.range_conflicts.len(),
        resolved = reassignment.conflicts_resolved,
        moves = reassignment.moves.len(),
        "page analyzed"
    );

    PageReport {
        image_id: input.image_id.clone(),
        width: input.width,
        height: input.height,
        stats,
        validation,
        reassignment,
        assignment,
    }
}

fn merge_stats(a: BatchStats, b: BatchStats) -> BatchStats {
    BatchStats {
        total: a.total + b.total,
        valid: a.valid + b.valid,
        missing_box: a.missing_box + b.missing_box,
        inverted_box: a.inverted_box + b.inverted_box,
        out_of_bounds: a.out_of_bounds + b.out_of_bounds,
    }
}

pub fn load_page_input(path: &Path) -> Result<PageInput> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read page input: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse page input JSON: {}", path.display()))
}

pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read ground truth: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse ground truth JSON: {}", path.display()))
}

pub fn load_assignment(path: &Path) -> Result<QuestionAssignment> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read assignment: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse assignment JSON: {}", path.display()))
}
