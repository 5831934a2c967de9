//! Decoding of YOLOv8-style detection heads.
//!
//! The head emits `4 + classes` attributes per anchor: box centre, box size,
//! then one score per class. There is no separate objectness score.

use crate::models::RawBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: RawBox,
}

/// Layout of the flattened output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[attributes, anchors]`, the default export
    AttributesFirst,
    /// `[anchors, attributes]`
    AnchorsFirst,
}

impl OutputLayout {
    /// Guess the layout from the two trailing dimensions of the output.
    /// Anchors always outnumber attributes for real models.
    pub fn infer(dim1: usize, dim2: usize) -> (Self, usize, usize) {
        if dim1 <= dim2 {
            (OutputLayout::AttributesFirst, dim1, dim2)
        } else {
            (OutputLayout::AnchorsFirst, dim2, dim1)
        }
    }
}

/// Best class per anchor, dropping anchors scored below `confidence`
pub fn decode(
    data: &[f32],
    layout: OutputLayout,
    num_attrs: usize,
    num_anchors: usize,
    confidence: f32,
) -> Vec<Candidate> {
    if num_attrs <= 4 || data.len() < num_attrs * num_anchors {
        return Vec::new();
    }

    let at = |attr: usize, anchor: usize| match layout {
        OutputLayout::AttributesFirst => data[attr * num_anchors + anchor],
        OutputLayout::AnchorsFirst => data[anchor * num_attrs + attr],
    };

    let mut candidates = Vec::new();
    for anchor in 0..num_anchors {
        let (class_id, score) = (4..num_attrs)
            .map(|attr| (attr - 4, at(attr, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        // NaN scores never pass
        if !(score >= confidence) {
            continue;
        }

        candidates.push(Candidate {
            class_id,
            confidence: score,
            bbox: RawBox::from_center(
                at(0, anchor),
                at(1, anchor),
                at(2, anchor),
                at(3, anchor),
            ),
        });
    }
    candidates
}

/// Class-aware non-maximum suppression. Output is sorted by confidence.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
