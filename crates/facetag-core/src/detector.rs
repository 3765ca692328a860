//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the SCRFD anchor-free detection family (scrfd_500m_bnkps, det_10g)
//! on RGB still images: letterbox resize, 3-stride decoding, and NMS
//! post-processing. Detections carry five-point landmarks for alignment.

use crate::types::BoundingBox;
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECTOR_INPUT_SIZE: u32 = 640;
const DETECTOR_MEAN: f32 = 127.5;
const DETECTOR_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector model not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// Mapping from the letterboxed input square back to source image coordinates.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(src_w: u32, src_h: u32, dst: u32) -> Self {
        let scale = (dst as f32 / src_w as f32).min(dst as f32 / src_h as f32);
        let new_w = (src_w as f32 * scale).round();
        let new_h = (src_h as f32 * scale).round();
        Self {
            scale,
            pad_x: (dst as f32 - new_w) / 2.0,
            pad_y: (dst as f32 - new_h) / 2.0,
        }
    }

    /// Map a point in letterboxed space back to source image space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// SCRFD-based face detector for RGB images.
pub struct FaceDetector {
    session: Session,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load an SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_indices,
        })
    }

    /// Detect faces in an RGB image, returning bounding boxes sorted by confidence.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let letterbox = Letterbox::fit(image.width(), image.height(), DETECTOR_INPUT_SIZE);
        let input = preprocess(image, &letterbox);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();

        for (stride_pos, &stride) in STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(
                StrideOutputs { scores, bboxes, kps },
                stride,
                &letterbox,
                &mut detections,
            );
        }

        let mut result = nms(detections, NMS_IOU_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Letterbox an RGB image into a normalized NCHW float tensor.
///
/// The image is resized with bilinear filtering to fit the input square,
/// centered, and padded with the model mean (which normalizes to 0.0).
fn preprocess(image: &RgbImage, letterbox: &Letterbox) -> Array4<f32> {
    let size = DETECTOR_INPUT_SIZE as usize;
    let new_w = (image.width() as f32 * letterbox.scale).round() as u32;
    let new_h = (image.height() as f32 * letterbox.scale).round() as u32;

    let resized = imageops::resize(image, new_w.max(1), new_h.max(1), imageops::FilterType::Triangle);

    let pad_x = letterbox.pad_x.floor() as usize;
    let pad_y = letterbox.pad_y.floor() as usize;

    // Pad value sits at the mean, so padding normalizes to ~0.
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let inside = y >= pad_y
                && y < pad_y + new_h as usize
                && x >= pad_x
                && x < pad_x + new_w as usize;

            let rgb = if inside {
                resized.get_pixel((x - pad_x) as u32, (y - pad_y) as u32).0
            } else {
                [DETECTOR_MEAN as u8; 3]
            };

            for (c, &value) in rgb.iter().enumerate() {
                tensor[[0, c, y, x]] = (value as f32 - DETECTOR_MEAN) / DETECTOR_STD;
            }
        }
    }

    tensor
}

/// Raw output slices for a single stride level.
struct StrideOutputs<'a> {
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

/// Decode anchor-free detections for one stride into source-image coordinates.
fn decode_stride(
    out: StrideOutputs<'_>,
    stride: usize,
    letterbox: &Letterbox,
    detections: &mut Vec<BoundingBox>,
) {
    let grid = DETECTOR_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let score = out.scores.get(idx).copied().unwrap_or(0.0);
        if score <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        // bbox: [left, top, right, bottom] offsets from the anchor center, in strides.
        let b = idx * 4;
        if b + 3 >= out.bboxes.len() {
            continue;
        }
        let (x1, y1) = letterbox.unmap(
            anchor_cx - out.bboxes[b] * stride as f32,
            anchor_cy - out.bboxes[b + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.unmap(
            anchor_cx + out.bboxes[b + 2] * stride as f32,
            anchor_cy + out.bboxes[b + 3] * stride as f32,
        );

        // kps: five (x, y) offsets from the anchor center, in strides.
        let k = idx * 10;
        let landmarks = if k + 9 < out.kps.len() {
            let mut lms = [(0.0f32, 0.0f32); 5];
            for (i, lm) in lms.iter_mut().enumerate() {
                *lm = letterbox.unmap(
                    anchor_cx + out.kps[k + i * 2] * stride as f32,
                    anchor_cy + out.kps[k + i * 2 + 1] * stride as f32,
                );
            }
            Some(lms)
        } else {
            None
        };

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Discover output tensor ordering by name.
///
/// SCRFD exports may name tensors "score_8", "bbox_16", "kps_32", ... or use
/// generic numeric names. Falls back to the standard positional ordering:
/// [0-2] = scores, [3-5] = bboxes, [6-8] = kps, each for strides 8/16/32.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = STRIDES.iter().all(|&stride| {
        find("score", stride).is_some()
            && find("bbox", stride).is_some()
            && find("kps", stride).is_some()
    });

    if named {
        std::array::from_fn(|i| {
            let stride = STRIDES[i];
            (
                find("score", stride).unwrap(),
                find("bbox", stride).unwrap(),
                find("kps", stride).unwrap(),
            )
        })
    } else {
        tracing::info!(
            ?names,
            "SCRFD output names not recognized, using positional mapping"
        );
        [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
    }
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();

    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }

    keep
}

/// Intersection-over-Union between two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
            landmarks: None,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_bbox(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_bbox(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_bbox(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        let expected = 50.0 / 150.0;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_bbox(0.0, 0.0, 100.0, 100.0, 0.9),
            make_bbox(5.0, 5.0, 100.0, 100.0, 0.8),
            make_bbox(200.0, 200.0, 50.0, 50.0, 0.7),
        ];
        let result = nms(detections, 0.4);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_roundtrip() {
        let lb = Letterbox::fit(320, 240, 640);

        let (orig_x, orig_y) = (100.0f32, 50.0f32);
        let boxed_x = orig_x * lb.scale + lb.pad_x;
        let boxed_y = orig_y * lb.scale + lb.pad_y;
        let (rx, ry) = lb.unmap(boxed_x, boxed_y);

        assert!((rx - orig_x).abs() < 0.1, "x: {rx} vs {orig_x}");
        assert!((ry - orig_y).abs() < 0.1, "y: {ry} vs {orig_y}");
    }

    #[test]
    fn test_letterbox_landscape_pads_vertically() {
        let lb = Letterbox::fit(640, 320, 640);
        assert!((lb.scale - 1.0).abs() < 1e-6);
        assert!(lb.pad_x.abs() < 1e-6);
        assert!((lb.pad_y - 160.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = RgbImage::from_pixel(100, 50, image::Rgb([200, 100, 50]));
        let lb = Letterbox::fit(100, 50, DETECTOR_INPUT_SIZE);
        let tensor = preprocess(&image, &lb);

        assert_eq!(
            tensor.shape(),
            &[1, 3, DETECTOR_INPUT_SIZE as usize, DETECTOR_INPUT_SIZE as usize]
        );

        // Top-left corner lies in the letterbox padding: normalizes to ~0.
        assert!(tensor[[0, 0, 0, 0]].abs() < 0.01);
        // Center of the image area: channel 0 carries the red value.
        let cy = DETECTOR_INPUT_SIZE as usize / 2;
        let expected_r = (200.0 - DETECTOR_MEAN) / DETECTOR_STD;
        assert!((tensor[[0, 0, cy, cy]] - expected_r).abs() < 0.05);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8",
            "kps_16", "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices[0], (0, 3, 6));
        assert_eq!(indices[1], (1, 4, 7));
        assert_eq!(indices[2], (2, 5, 8));
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32",
            "kps_32", "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices[0], (2, 0, 1));
        assert_eq!(indices[1], (5, 3, 4));
        assert_eq!(indices[2], (8, 6, 7));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(0, 3, 6), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn test_decode_stride_empty_below_threshold() {
        let grid = DETECTOR_INPUT_SIZE as usize / 32;
        let n = grid * grid * ANCHORS_PER_CELL;
        let scores = vec![0.1f32; n];
        let bboxes = vec![1.0f32; n * 4];
        let kps = vec![0.0f32; n * 10];
        let lb = Letterbox::fit(640, 640, DETECTOR_INPUT_SIZE);

        let mut dets = Vec::new();
        decode_stride(
            StrideOutputs {
                scores: &scores,
                bboxes: &bboxes,
                kps: &kps,
            },
            32,
            &lb,
            &mut dets,
        );
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_stride_produces_landmarks() {
        let grid = DETECTOR_INPUT_SIZE as usize / 32;
        let n = grid * grid * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; n];
        scores[0] = 0.9;
        let bboxes = vec![1.0f32; n * 4];
        let kps = vec![0.5f32; n * 10];
        let lb = Letterbox::fit(640, 640, DETECTOR_INPUT_SIZE);

        let mut dets = Vec::new();
        decode_stride(
            StrideOutputs {
                scores: &scores,
                bboxes: &bboxes,
                kps: &kps,
            },
            32,
            &lb,
            &mut dets,
        );
        assert_eq!(dets.len(), 1);
        assert!(dets[0].landmarks.is_some());
        // bbox offsets of 1 stride on each side → 64 px square
        assert!((dets[0].width - 64.0).abs() < 1e-4);
        assert!((dets[0].height - 64.0).abs() < 1e-4);
    }
}
