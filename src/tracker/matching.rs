//! Cost matrices between predicted tracks and detections.

use std::fmt::Debug;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracker::detection::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;

/// Cost assigned to gated pairs. The solver never accepts it.
pub const UNMATCHABLE: f32 = 1e5;

/// Compute IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    let mut dists = Array2::zeros((track_boxes.len(), det_boxes.len()));
    for (i, t) in track_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            dists[[i, j]] = 1.0 - t.iou(d);
        }
    }
    dists
}

/// Weight IoU similarity by detection confidence: `1 - iou * score`.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, scores: &[f32]) {
    let (rows, cols) = cost_matrix.dim();
    debug_assert_eq!(cols, scores.len());
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            let fused_sim = iou_sim * scores[j];
            cost_matrix[[i, j]] = 1.0 - fused_sim;
        }
    }
}

/// Mark every entry whose base cost exceeds `thresh` as [`UNMATCHABLE`].
pub fn gate(cost_matrix: &mut Array2<f32>, base: &Array2<f32>, thresh: f32) {
    debug_assert_eq!(cost_matrix.dim(), base.dim());
    for (cost, base_cost) in cost_matrix.iter_mut().zip(base.iter()) {
        if *base_cost > thresh {
            *cost = UNMATCHABLE;
        }
    }
}

/// Scale a vector to unit length. `None` for zero or non-finite vectors.
pub fn l2_normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

/// Distance between two unit-length appearance descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl EmbeddingMetric {
    /// Distance in [0, 1] between two normalised vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let d = match self {
            Self::Cosine => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        };
        (d / 2.0).clamp(0.0, 1.0)
    }
}

/// Pairwise appearance distance between track and detection descriptors.
///
/// Descriptors are L2-normalised first; pairs where either side cannot be
/// normalised or the lengths differ get the maximum distance of 1.
pub fn embedding_distance(
    track_embeddings: &[&[f32]],
    det_embeddings: &[&[f32]],
    metric: EmbeddingMetric,
) -> Array2<f32> {
    let tracks: Vec<Option<Vec<f32>>> = track_embeddings.iter().map(|e| l2_normalize(e)).collect();
    let dets: Vec<Option<Vec<f32>>> = det_embeddings.iter().map(|e| l2_normalize(e)).collect();
    let mut dists = Array2::ones((tracks.len(), dets.len()));
    for (i, t) in tracks.iter().enumerate() {
        for (j, d) in dets.iter().enumerate() {
            if let (Some(t), Some(d)) = (t, d) {
                if t.len() == d.len() {
                    dists[[i, j]] = metric.distance(t, d);
                }
            }
        }
    }
    dists
}

/// Builds a gated cost matrix for one association stage.
pub trait CostMetric: Debug + Send + Sync {
    fn cost_matrix(&self, tracks: &[&Track], detections: &[&Detection]) -> Array2<f32>;
}

fn base_cost(tracks: &[&Track], detections: &[&Detection]) -> Array2<f32> {
    let track_rects: Vec<Rect> = tracks.iter().map(|t| t.rect()).collect();
    let det_rects: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
    iou_distance(&track_rects, &det_rects)
}

fn scores(detections: &[&Detection]) -> Vec<f32> {
    detections.iter().map(|d| d.score).collect()
}

/// `1 - IoU`, gated at `gate`.
#[derive(Debug, Clone)]
pub struct IouCost {
    pub gate: f32,
}

impl CostMetric for IouCost {
    fn cost_matrix(&self, tracks: &[&Track], detections: &[&Detection]) -> Array2<f32> {
        let base = base_cost(tracks, detections);
        let mut costs = base.clone();
        gate(&mut costs, &base, self.gate);
        costs
    }
}

/// IoU fused with detection confidence, gated on the plain IoU cost.
#[derive(Debug, Clone)]
pub struct ScoreFusedIouCost {
    pub gate: f32,
}

impl CostMetric for ScoreFusedIouCost {
    fn cost_matrix(&self, tracks: &[&Track], detections: &[&Detection]) -> Array2<f32> {
        let base = base_cost(tracks, detections);
        let mut costs = base.clone();
        fuse_score(&mut costs, &scores(detections));
        gate(&mut costs, &base, self.gate);
        costs
    }
}

/// Geometric cost blended with appearance distance.
///
/// `cost = (1 - weight) * geometric + weight * appearance`. Appearance
/// distances above `appearance_thresh`, and pairs whose IoU cost exceeds
/// `proximity_thresh`, count as appearance distance 1. Pairs without an
/// embedding on both sides use the geometric cost alone. Gating uses the
/// plain IoU cost against `gate`.
#[derive(Debug, Clone)]
pub struct AppearanceCost {
    pub gate: f32,
    pub proximity_thresh: f32,
    pub appearance_thresh: f32,
    pub weight: f32,
    pub metric: EmbeddingMetric,
    pub fuse_score: bool,
}

impl CostMetric for AppearanceCost {
    fn cost_matrix(&self, tracks: &[&Track], detections: &[&Detection]) -> Array2<f32> {
        let base = base_cost(tracks, detections);
        let mut costs = base.clone();
        if self.fuse_score {
            fuse_score(&mut costs, &scores(detections));
        }

        let det_embeddings: Vec<Option<Vec<f32>>> = detections
            .iter()
            .map(|d| d.embedding.as_deref().and_then(l2_normalize))
            .collect();

        for (i, track) in tracks.iter().enumerate() {
            let Some(track_emb) = track.embedding.as_deref() else {
                continue;
            };
            for (j, det_emb) in det_embeddings.iter().enumerate() {
                let Some(det_emb) = det_emb.as_deref() else {
                    continue;
                };
                if det_emb.len() != track_emb.len() {
                    continue;
                }
                let mut appearance = self.metric.distance(track_emb, det_emb);
                if appearance > self.appearance_thresh || base[[i, j]] > self.proximity_thresh {
                    appearance = 1.0;
                }
                costs[[i, j]] = (1.0 - self.weight) * costs[[i, j]] + self.weight * appearance;
            }
        }

        gate(&mut costs, &base, self.gate);
        costs
    }
}
