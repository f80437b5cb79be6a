use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assign::{union_region, AssignParams, ResolutionStrategy};
use crate::assign::validate::ValidationResult;
use crate::core::geometry::BBox;
use crate::core::model::{ElementMove, QuestionAssignment};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReassignReason {
    IouBased,
    DistanceBased,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReassignmentLog {
    pub element_id: String,
    pub from_question: u32,
    pub to_question: u32,
    pub reason: ReassignReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReassignmentResult {
    pub moves: Vec<ElementMove>,
    pub logs: Vec<ReassignmentLog>,
    /// Conflicts in which at least one contested element actually moved.
    pub conflicts_resolved: usize,
}

impl ReassignmentResult {
    pub fn has_reassignments(&self) -> bool {
        !self.moves.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

/// Adjudicates every contested element of every reported conflict.
/// Pure over its inputs: the caller's assignment is never modified;
/// callers apply the returned moves themselves.
pub fn resolve_conflicts(
    validation: &ValidationResult,
    assignment: &QuestionAssignment,
    strategy: ResolutionStrategy,
    params: &AssignParams,
) -> ReassignmentResult {
    if validation.range_conflicts.is_empty() {
        return ReassignmentResult::default();
    }

    let mut result = ReassignmentResult::default();
    for conflict in &validation.range_conflicts {
        let contested_ids: HashSet<&str> =
            conflict.contested.iter().map(|e| e.id.as_str()).collect();

        // Each side is represented by the union box of its settled
        // (non-contested) elements. A side with nothing settled has no
        // region: IoU 0, distance infinite.
        let lower_region =
            representative_region(assignment, conflict.lower_question, &contested_ids);
        let upper_region =
            representative_region(assignment, conflict.upper_question, &contested_ids);

        let mut moved = false;
        for element in &conflict.contested {
            // Malformed geometry must never abort the batch.
            let Some(bbox) = element.bbox else { continue };
            let Some(owner) = assignment.owner_of(&element.id) else {
                continue;
            };

            let decision = match strategy {
                ResolutionStrategy::IouFirst => {
                    decide_iou_first(&bbox, lower_region, upper_region, params.iou_margin)
                }
                ResolutionStrategy::NearestCenter => {
                    decide_nearest(&bbox, lower_region, upper_region)
                }
            };
            let Some((side, reason)) = decision else { continue };

            let target = match side {
                Side::Lower => conflict.lower_question,
                Side::Upper => conflict.upper_question,
            };
            if target == owner {
                continue;
            }

            debug!(
                element = %element.id,
                from = owner,
                to = target,
                ?reason,
                "reassigning contested element"
            );
            result.moves.push(ElementMove {
                element_id: element.id.clone(),
                from_question: owner,
                to_question: target,
            });
            result.logs.push(ReassignmentLog {
                element_id: element.id.clone(),
                from_question: owner,
                to_question: target,
                reason,
            });
            moved = true;
        }
        if moved {
            result.conflicts_resolved += 1;
        }
    }
    result
}

fn representative_region(
    assignment: &QuestionAssignment,
    question: u32,
    contested_ids: &HashSet<&str>,
) -> Option<BBox> {
    let elements = assignment.elements(question)?;
    union_region(
        elements
            .iter()
            .filter(|e| !contested_ids.contains(e.id.as_str())),
    )
}

/// Overlap evidence dominates: a material IoU difference decides
/// outright; otherwise proximity breaks the tie.
fn decide_iou_first(
    bbox: &BBox,
    lower: Option<BBox>,
    upper: Option<BBox>,
    iou_margin: f64,
) -> Option<(Side, ReassignReason)> {
    let iou_lower = lower.map(|r| bbox.iou(&r)).unwrap_or(0.0);
    let iou_upper = upper.map(|r| bbox.iou(&r)).unwrap_or(0.0);

    if (iou_lower - iou_upper).abs() > iou_margin {
        let side = if iou_lower > iou_upper {
            Side::Lower
        } else {
            Side::Upper
        };
        return Some((side, ReassignReason::IouBased));
    }
    decide_nearest(bbox, lower, upper)
}

fn decide_nearest(
    bbox: &BBox,
    lower: Option<BBox>,
    upper: Option<BBox>,
) -> Option<(Side, ReassignReason)> {
    // Distance is only meaningful with a center on both sides; with a
    // region missing the element stays put unless overlap already
    // decided above.
    let (lower, upper) = match (lower, upper) {
        (Some(l), Some(u)) => (l, u),
        _ => return None,
    };
    let to_lower = bbox.center_distance(&lower);
    let to_upper = bbox.center_distance(&upper);
    let side = if to_lower <= to_upper {
        Side::Lower
    } else {
        Side::Upper
    };
    Some((side, ReassignReason::DistanceBased))
}
