pub mod reassign;
pub mod validate;

use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;
use crate::core::model::DetectedElement;

pub use reassign::{resolve_conflicts, ReassignReason, ReassignmentLog, ReassignmentResult};
pub use validate::{validate_assignment, RangeConflict, SequenceGap, ValidationResult};

/// How contested elements are adjudicated. Each variant maps to a pure
/// decision function in `reassign`; selection is plain data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Overlap evidence first, center distance only as the fallback.
    #[default]
    IouFirst,
    /// Legacy behavior: nearest representative center always wins.
    NearestCenter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AssignParams {
    /// An element closer than this (in pixels) to a neighbor question's
    /// occupied region counts as contested.
    pub proximity_margin: f64,
    /// An element farther than this from the rest of its own question
    /// is reported as a stray.
    pub stray_margin: f64,
    /// IoU differences at or below this are inconclusive and fall back
    /// to center distance.
    pub iou_margin: f64,
}

impl Default for AssignParams {
    fn default() -> Self {
        Self {
            proximity_margin: 16.0,
            stray_margin: 160.0,
            iou_margin: 0.1,
        }
    }
}

/// Union box over the boxed elements of an iterator; None when nothing
/// carries geometry.
pub(crate) fn union_region<'a, I>(elements: I) -> Option<BBox>
where
    I: IntoIterator<Item = &'a DetectedElement>,
{
    elements
        .into_iter()
        .filter_map(|e| e.bbox)
        .reduce(|acc, b| acc.union(&b))
}
