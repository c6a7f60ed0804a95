// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 tensor layout
// input:  [1, 3, S, S] RGB / 255, image resized into the top-left corner
// output: [1, 4 + nc, anchors] (cx, cy, w, h, class scores...)

use anyhow::{anyhow, Result};
use fast_image_resize as fr;
use ndarray::{s, Array, Array4, ArrayView2, Axis};

use crate::detection::{BBox, Detection, Frame};

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 114.0 / 255.0; // letterbox fill (gray)

/// Model input tensor + scale back to frame pixels
pub struct Letterbox {
    pub tensor: Array4<f32>,
    pub ratio: f32,
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round().max(1.0), (h0 * r).round().max(1.0))
}

/// Resize `frame` (keeping aspect ratio) into a `size` x `size` NCHW tensor
pub fn letterbox(frame: &Frame, size: u32) -> Result<Letterbox> {
    let (w0, h0) = frame.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(anyhow!("empty frame {}x{}", w0, h0));
    }
    if size == 0 {
        return Err(anyhow!("model input size must be positive"));
    }
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
    let (w_new, h_new) = (w_new as u32, h_new as u32);

    // fast_image_resize: bilinear, RGB8
    let src = fr::images::Image::from_vec_u8(w0, h0, frame.as_raw().clone(), fr::PixelType::U8x3)?;
    let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src,
        &mut dst,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    let mut tensor = Array::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
    for (i, px) in dst.buffer().chunks_exact(3).enumerate() {
        let x = i % w_new as usize;
        let y = i / w_new as usize;
        tensor[[0, 0, y, x]] = px[0] as f32 / 255.0;
        tensor[[0, 1, y, x]] = px[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = px[2] as f32 / 255.0;
    }

    Ok(Letterbox { tensor, ratio })
}

/// Decode one image's predictions `[4 + nc, anchors]` into frame-space detections
///
/// Anchors below `conf` are dropped, then class-aware NMS is applied.
pub fn decode_predictions(
    preds: ArrayView2<f32>,
    names: &[String],
    ratio: f32,
    frame_size: (u32, u32),
    conf: f32,
    iou: f32,
) -> Vec<Detection> {
    let (width_original, height_original) = (frame_size.0 as f32, frame_size.1 as f32);
    let nc = preds.nrows().saturating_sub(CXYWH_OFFSET);
    if nc == 0 || ratio <= 0.0 {
        return vec![];
    }

    let mut data: Vec<(usize, Detection)> = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        if confidence < conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x1 = (cx - w / 2.).clamp(0.0, width_original);
        let y1 = (cy - h / 2.).clamp(0.0, height_original);
        let x2 = (cx + w / 2.).clamp(0.0, width_original);
        let y2 = (cy + h / 2.).clamp(0.0, height_original);

        let class_name = names
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", id));
        data.push((id, Detection::new(class_name, confidence, BBox::new(x1, y1, x2, y2))));
    }

    non_max_suppression(&mut data, iou);
    data.into_iter().map(|(_, d)| d).collect()
}

/// Greedy class-aware NMS, highest confidence first
pub fn non_max_suppression(xs: &mut Vec<(usize, Detection)>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].0 == xs[index].0
                && xs[prev_index].1.bbox.iou(&xs[index].1.bbox) > iou_threshold
            {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn names() -> Vec<String> {
        vec!["person".into(), "car".into(), "bear".into()]
    }

    #[test]
    fn test_letterbox_shape_and_ratio() {
        let frame = Frame::from_pixel(1280, 720, image::Rgb([255, 0, 0]));
        let lb = letterbox(&frame, 640).unwrap();
        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert!((lb.ratio - 0.5).abs() < 1e-6);
        // image content top-left, padding below row 360
        assert!((lb.tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!((lb.tensor[[0, 0, 600, 10]] - PAD_VALUE).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_rejects_empty_frame() {
        assert!(letterbox(&Frame::new(0, 0), 640).is_err());
    }

    #[test]
    fn test_letterbox_rejects_zero_size() {
        assert!(letterbox(&Frame::new(64, 48), 0).is_err());
    }

    #[test]
    fn test_decode_scales_and_thresholds() {
        // 3 classes, 3 anchors
        let mut preds = Array2::<f32>::zeros((7, 3));
        // anchor 0: bear at (100,100) 40x40 in model space, conf 0.9
        preds.column_mut(0).assign(&ndarray::arr1(&[100., 100., 40., 40., 0.0, 0.1, 0.9]));
        // anchor 1: person below conf
        preds.column_mut(1).assign(&ndarray::arr1(&[50., 50., 10., 10., 0.2, 0.0, 0.0]));
        // anchor 2: car partly outside the frame
        preds.column_mut(2).assign(&ndarray::arr1(&[5., 5., 20., 20., 0.0, 0.8, 0.0]));

        let dets = decode_predictions(preds.view(), &names(), 0.5, (400, 300), 0.25, 0.45);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_name, "bear");
        assert_eq!(dets[0].bbox, BBox::new(160., 160., 240., 240.));
        assert_eq!(dets[1].class_name, "car");
        assert_eq!(dets[1].bbox.x1, 0.0);
        assert_eq!(dets[1].bbox.y1, 0.0);
    }

    #[test]
    fn test_nms_is_class_aware() {
        let b = BBox::new(0., 0., 10., 10.);
        let mut xs = vec![
            (0, Detection::new("person", 0.6, b)),
            (0, Detection::new("person", 0.9, BBox::new(1., 1., 10., 10.))),
            (2, Detection::new("bear", 0.7, b)),
        ];
        non_max_suppression(&mut xs, 0.45);
        let kept: Vec<_> = xs.iter().map(|(_, d)| (d.class_name.as_str(), d.confidence)).collect();
        assert_eq!(kept, vec![("person", 0.9), ("bear", 0.7)]);
    }

    #[test]
    fn test_unknown_class_id_gets_placeholder_name() {
        let mut preds = Array2::<f32>::zeros((5, 1));
        preds.column_mut(0).assign(&ndarray::arr1(&[10., 10., 4., 4., 0.9]));
        let dets = decode_predictions(preds.view(), &[], 1.0, (100, 100), 0.25, 0.45);
        assert_eq!(dets[0].class_name, "class0");
    }
}
