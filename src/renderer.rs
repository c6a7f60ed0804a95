// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Detection overlay drawn in place on the frame
//!
//! Per detection: 3 px box in the class color, filled label tab above the box
//! (`BEAR: 0.91`, white text). When the alert fires, a red
//! `WARNING: BEAR DETECTED!` line at (50, 50). Everything outside the frame is
//! clipped by imageproc.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::config::TargetClasses;
use crate::detection::{Detection, Frame};

const BOX_THICKNESS: i32 = 3;
const LABEL_SCALE: f32 = 18.0;
const WARNING_SCALE: f32 = 36.0;
const LABEL_PAD: i32 = 10; // gap between label baseline and box top
const WARNING_POS: (i32, i32) = (50, 50);

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    /// Load the label font; a missing/broken font only disables text
    pub fn new(font_path: &Path) -> Self {
        let font = match std::fs::read(font_path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    info!("🔤 Font loaded: {}", font_path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ invalid font {}: {}, labels without text", font_path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ font {} not readable: {}, labels without text", font_path.display(), e);
                None
            }
        };
        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        kept: &[Detection],
        colors: &TargetClasses,
        alert_triggered: bool,
        alert_class: &str,
    ) {
        for det in kept {
            let color = colors.color(&det.class_name).unwrap_or(WHITE);
            let x1 = det.bbox.x1.round() as i32;
            let y1 = det.bbox.y1.round() as i32;
            let w = det.bbox.width().round() as i32;
            let h = det.bbox.height().round() as i32;

            draw_thick_rect(frame, x1, y1, w, h, BOX_THICKNESS, color);

            let label = det.label();
            let (tw, th) = self.measure(LABEL_SCALE, &label);
            // tab above the box, pushed down onto the box at the top edge
            let tab_y = (y1 - th - LABEL_PAD).max(0);
            let tab_h = th + LABEL_PAD;
            if let Some(tab) = rect(x1, tab_y, tw, tab_h) {
                draw_filled_rect_mut(frame, tab, color);
            }
            if let Some(font) = &self.font {
                draw_text_mut(frame, WHITE, x1, tab_y + LABEL_PAD / 2, PxScale::from(LABEL_SCALE), font, &label);
            }
        }

        if alert_triggered {
            let text = format!("WARNING: {} DETECTED!", alert_class.to_uppercase());
            let (x, y) = WARNING_POS;
            match &self.font {
                Some(font) => draw_text_mut(frame, RED, x, y, PxScale::from(WARNING_SCALE), font, &text),
                None => {
                    // no glyphs available, mark the spot
                    let (tw, th) = self.measure(WARNING_SCALE, &text);
                    if let Some(bar) = rect(x, y, tw, th) {
                        draw_filled_rect_mut(frame, bar, RED);
                    }
                }
            }
        }
    }

    /// Text extent in pixels; estimated from the scale without a font
    fn measure(&self, scale: f32, text: &str) -> (i32, i32) {
        match &self.font {
            Some(font) => {
                let (w, h) = text_size(PxScale::from(scale), font, text);
                (w as i32, h as i32)
            }
            None => (
                (text.chars().count() as f32 * scale * 0.55).round() as i32,
                (scale * 0.75).round() as i32,
            ),
        }
    }
}

/// `Rect` rejects empty sizes
fn rect(x: i32, y: i32, w: i32, h: i32) -> Option<Rect> {
    if w <= 0 || h <= 0 {
        return None;
    }
    Some(Rect::at(x, y).of_size(w as u32, h as u32))
}

fn draw_thick_rect(frame: &mut Frame, x: i32, y: i32, w: i32, h: i32, thickness: i32, color: Rgb<u8>) {
    let (w, h) = (w.max(1), h.max(1));
    for offset in 0..thickness {
        if let Some(r) = rect(x - offset, y - offset, w + offset * 2, h + offset * 2) {
            draw_hollow_rect_mut(frame, r, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn bear(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new("bear", 0.91, BBox::new(x1, y1, x2, y2))
    }

    #[test]
    fn test_box_drawn_in_class_color() {
        let mut frame = Frame::new(200, 150);
        let dets = vec![
            bear(40., 60., 100., 120.),
            Detection::new("car", 0.7, BBox::new(120., 60., 180., 120.)),
        ];
        OverlayRenderer::without_font().render(&mut frame, &dets, &TargetClasses::default(), false, "bear");

        assert_eq!(*frame.get_pixel(40, 90), Rgb([255, 0, 0])); // bear left edge
        assert_eq!(*frame.get_pixel(38, 90), Rgb([255, 0, 0])); // 3 px thick
        assert_eq!(*frame.get_pixel(120, 90), Rgb([0, 255, 0])); // car left edge
        assert_eq!(*frame.get_pixel(70, 90), BLACK); // inside untouched
    }

    #[test]
    fn test_label_tab_above_box() {
        let mut frame = Frame::new(200, 150);
        OverlayRenderer::without_font().render(&mut frame, &[bear(40., 80., 100., 120.)], &TargetClasses::default(), false, "bear");
        // tab spans [80 - th - 10, 80)
        assert_eq!(*frame.get_pixel(45, 75), Rgb([255, 0, 0]));
        assert_eq!(*frame.get_pixel(45, 30), BLACK);
    }

    #[test]
    fn test_top_edge_and_out_of_bounds_do_not_panic() {
        let mut frame = Frame::new(64, 48);
        let dets = vec![
            bear(0., 0., 20., 20.),
            bear(-30., -30., 10., 10.),
            bear(50., 40., 200., 300.),
            bear(10., 10., 10., 10.), // degenerate
        ];
        let renderer = OverlayRenderer::without_font();
        renderer.render(&mut frame, &dets, &TargetClasses::default(), true, "bear");
        // label tab clamped to the top edge
        assert_eq!(*frame.get_pixel(2, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_warning_only_when_triggered() {
        let renderer = OverlayRenderer::without_font();
        let targets = TargetClasses::default();

        let mut quiet = Frame::new(400, 200);
        renderer.render(&mut quiet, &[], &targets, false, "bear");
        assert!(quiet.pixels().all(|p| *p == BLACK));

        let mut alert = Frame::new(400, 200);
        renderer.render(&mut alert, &[], &targets, true, "bear");
        assert_eq!(*alert.get_pixel(55, 55), RED);
    }

    #[test]
    fn test_unknown_class_drawn_white() {
        let mut frame = Frame::new(100, 100);
        let det = Detection::new("dog", 0.8, BBox::new(30., 40., 60., 80.));
        OverlayRenderer::without_font().render(&mut frame, &[det], &TargetClasses::default(), false, "bear");
        assert_eq!(*frame.get_pixel(30, 60), WHITE);
    }

    #[test]
    fn test_missing_font_is_not_fatal() {
        let renderer = OverlayRenderer::new(Path::new("/nonexistent/font.ttf"));
        assert!(!renderer.has_font());
    }
}
