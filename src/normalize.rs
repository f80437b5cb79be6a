use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::geometry::BBox;
use crate::core::model::DetectedElement;

/// Scale factors this close to 1.0 are treated as identity.
const SCALE_NOOP_EPSILON: f64 = 1e-3;

/// Scales element boxes from detector space into canonical page space.
/// Coordinates round half-up; elements without a box pass through
/// unchanged. Always returns new elements.
pub fn scale_elements(
    elements: &[DetectedElement],
    scale_x: f64,
    scale_y: f64,
) -> Vec<DetectedElement> {
    if (scale_x - 1.0).abs() < SCALE_NOOP_EPSILON && (scale_y - 1.0).abs() < SCALE_NOOP_EPSILON {
        return elements.to_vec();
    }
    debug!(scale_x, scale_y, count = elements.len(), "scaling elements");
    elements
        .iter()
        .map(|element| {
            let bbox = element.bbox.map(|b| {
                BBox::new(
                    round_half_up(b.x1 as f64 * scale_x),
                    round_half_up(b.y1 as f64 * scale_y),
                    round_half_up(b.x2 as f64 * scale_x),
                    round_half_up(b.y2 as f64 * scale_y),
                )
            });
            DetectedElement {
                bbox,
                ..element.clone()
            }
        })
        .collect()
}

fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// True when the element has a well-formed box lying fully inside the
/// page rectangle [0,width] x [0,height].
pub fn is_valid(element: &DetectedElement, image_width: u32, image_height: u32) -> bool {
    match element.bbox {
        None => false,
        Some(b) => {
            b.is_well_formed()
                && b.x1 >= 0
                && b.y1 >= 0
                && b.x2 <= image_width as i32
                && b.y2 <= image_height as i32
        }
    }
}

/// Clamps the element's box into the page rectangle. The output box is
/// non-degenerate for any input box, including inverted ones; a missing
/// box passes through. Returns a new element.
pub fn clamp_to_page(
    element: &DetectedElement,
    image_width: u32,
    image_height: u32,
) -> DetectedElement {
    let Some(b) = element.bbox else {
        return element.clone();
    };
    let width = image_width as i32;
    let height = image_height as i32;

    let x1 = b.x1.clamp(0, (width - 1).max(0));
    let y1 = b.y1.clamp(0, (height - 1).max(0));
    let x2 = b.x2.min(width).max(x1 + 1);
    let y2 = b.y2.min(height).max(y1 + 1);

    DetectedElement {
        bbox: Some(BBox::new(x1, y1, x2, y2)),
        ..element.clone()
    }
}

/// Per-batch geometry quality counters. Every element lands in exactly
/// one bucket: missing box, inverted order, out of bounds, or valid.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub valid: usize,
    pub missing_box: usize,
    pub inverted_box: usize,
    pub out_of_bounds: usize,
}

impl BatchStats {
    pub fn valid_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64 * 100.0
        }
    }
}

pub fn validate_batch(
    elements: &[DetectedElement],
    image_width: u32,
    image_height: u32,
) -> BatchStats {
    let mut stats = BatchStats::default();
    for element in elements {
        stats.total += 1;
        match element.bbox {
            None => stats.missing_box += 1,
            Some(b) if !b.is_well_formed() => stats.inverted_box += 1,
            Some(b)
                if b.x1 < 0
                    || b.y1 < 0
                    || b.x2 > image_width as i32
                    || b.y2 > image_height as i32 =>
            {
                stats.out_of_bounds += 1
            }
            Some(_) => stats.valid += 1,
        }
    }
    stats
}
