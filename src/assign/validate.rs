use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assign::{union_region, AssignParams};
use crate::core::geometry::BBox;
use crate::core::model::{DetectedElement, QuestionAssignment};

/// A structural break in the expected question layout. Reported only;
/// the reassignment engine never acts on gaps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceGap {
    /// Question numbering jumps over one or more numbers.
    MissingQuestions {
        after: u32,
        before: u32,
        missing: Vec<u32>,
    },
    /// An element sits far outside the vertical range occupied by the
    /// rest of its question.
    StrayElement {
        question: u32,
        element_id: String,
        distance: f64,
    },
}

/// Boundary ambiguity between two vertically adjacent questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeConflict {
    pub lower_question: u32,
    pub upper_question: u32,
    /// Summed per-element severity in pixels: vertical overlap with the
    /// neighbor's region, or remaining proximity margin when merely near.
    pub conflict_metric: f64,
    pub contested: Vec<DetectedElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub sequence_gaps: Vec<SequenceGap>,
    pub range_conflicts: Vec<RangeConflict>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.sequence_gaps.is_empty() && self.range_conflicts.is_empty()
    }
}

/// Inspects an assignment for numbering gaps, stray elements and
/// boundary conflicts between adjacent questions. Read-only: the
/// assignment is never modified.
pub fn validate_assignment(
    assignment: &QuestionAssignment,
    params: &AssignParams,
) -> ValidationResult {
    let mut sequence_gaps = find_numbering_gaps(assignment);
    sequence_gaps.extend(find_stray_elements(assignment, params));
    let range_conflicts = find_range_conflicts(assignment, params);

    debug!(
        gaps = sequence_gaps.len(),
        conflicts = range_conflicts.len(),
        "assignment validated"
    );

    ValidationResult {
        sequence_gaps,
        range_conflicts,
    }
}

fn find_numbering_gaps(assignment: &QuestionAssignment) -> Vec<SequenceGap> {
    let ids: Vec<u32> = assignment.question_ids().collect();
    ids.windows(2)
        .filter(|pair| pair[1] > pair[0] + 1)
        .map(|pair| SequenceGap::MissingQuestions {
            after: pair[0],
            before: pair[1],
            missing: (pair[0] + 1..pair[1]).collect(),
        })
        .collect()
}

fn find_stray_elements(
    assignment: &QuestionAssignment,
    params: &AssignParams,
) -> Vec<SequenceGap> {
    let mut strays = Vec::new();
    for (question, elements) in assignment.iter() {
        if elements.len() < 2 {
            continue;
        }
        for (idx, element) in elements.iter().enumerate() {
            let Some(bbox) = element.bbox else { continue };
            let rest = union_region(
                elements
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != idx)
                    .map(|(_, e)| e),
            );
            let Some(rest) = rest else { continue };
            let distance = bbox.vertical_gap(&rest) as f64;
            if distance > params.stray_margin {
                strays.push(SequenceGap::StrayElement {
                    question,
                    element_id: element.id.clone(),
                    distance,
                });
            }
        }
    }
    strays
}

fn find_range_conflicts(
    assignment: &QuestionAssignment,
    params: &AssignParams,
) -> Vec<RangeConflict> {
    // Questions ordered top-to-bottom by the center of their occupied
    // region; questions without any boxed element cannot conflict.
    let mut ordered: Vec<(u32, BBox)> = assignment
        .iter()
        .filter_map(|(q, els)| union_region(els).map(|region| (q, region)))
        .collect();
    ordered.sort_by(|a, b| {
        let ca = a.1.center().1;
        let cb = b.1.center().1;
        ca.total_cmp(&cb)
    });

    let mut conflicts = Vec::new();
    for pair in ordered.windows(2) {
        let (question_a, _) = pair[0];
        let (question_b, _) = pair[1];

        let mut contested = Vec::new();
        let mut conflict_metric = 0.0;

        for (question, neighbor) in [(question_b, question_a), (question_a, question_b)] {
            let Some(elements) = assignment.elements(question) else {
                continue;
            };
            let Some(neighbor_elements) = assignment.elements(neighbor) else {
                continue;
            };
            for (idx, element) in elements.iter().enumerate() {
                let Some(bbox) = element.bbox else { continue };

                // The element's own question, without the element itself.
                // A lone element has no settled context to contest from.
                let own_region = union_region(
                    elements
                        .iter()
                        .enumerate()
                        .filter(|(other, _)| *other != idx)
                        .map(|(_, e)| e),
                );
                let Some(own_region) = own_region else { continue };

                // Neighbor territory is measured only from neighbor
                // elements clear of this question's settled band.
                let neighbor_region = union_region(neighbor_elements.iter().filter(|n| {
                    n.bbox
                        .is_some_and(|nb| nb.vertical_overlap(&own_region) == 0)
                }));
                let Some(neighbor_region) = neighbor_region else {
                    continue;
                };

                if let Some(severity) = contest_severity(&bbox, &neighbor_region, params) {
                    conflict_metric += severity;
                    contested.push(element.clone());
                }
            }
        }

        if !contested.is_empty() {
            conflicts.push(RangeConflict {
                lower_question: question_a.min(question_b),
                upper_question: question_a.max(question_b),
                conflict_metric,
                contested,
            });
        }
    }
    conflicts
}

/// Severity of an element intruding on a neighbor question's region:
/// the vertical overlap in pixels, or the remaining proximity margin
/// when the element is merely near. None when not contested.
fn contest_severity(bbox: &BBox, neighbor_region: &BBox, params: &AssignParams) -> Option<f64> {
    let overlap = bbox.vertical_overlap(neighbor_region);
    if overlap > 0 {
        return Some(overlap as f64);
    }
    let gap = bbox.vertical_gap(neighbor_region) as f64;
    if gap < params.proximity_margin {
        Some(params.proximity_margin - gap)
    } else {
        None
    }
}
