use crate::alert::Alert;
use crate::config::Config;
use crate::detection::Detection;
use crate::error::Error;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const ZONE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const ALERT_RADIUS: i32 = 20;
const TOP_SCORES: usize = 5;

/// red at high-risk level, orange from 3.0, yellow below
pub fn score_color(score: f32) -> Rgb<u8> {
    if score >= 5.0 {
        Rgb([255, 0, 0])
    } else if score >= 3.0 {
        Rgb([255, 165, 0])
    } else {
        Rgb([255, 255, 0])
    }
}

/// Draws tracking overlays. Labels need a font; without one only shapes
/// are drawn.
#[derive(Debug, Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            scale: PxScale::from(18.0),
        }
    }
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            ..Self::default()
        }
    }

    pub fn load_font<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let bytes = std::fs::read(path)?;

        Ok(Self::with_font(FontArc::try_from_vec(bytes)?))
    }

    pub fn annotate(
        &self,
        frame: &mut RgbImage,
        detections: &[Detection],
        alerts: &[Alert],
        config: &Config,
        top_scores: &[(i32, f32)],
    ) {
        for det in detections {
            let bbox = &det.bbox;
            let rect = Rect::at(bbox.left() as i32, bbox.top() as i32)
                .of_size((bbox.width() as u32).max(1), (bbox.height() as u32).max(1));
            draw_hollow_rect_mut(frame, rect, BOX_COLOR);

            if let Some(id) = det.track_id {
                self.label(
                    frame,
                    bbox.left() as i32,
                    bbox.top() as i32 - 20,
                    BOX_COLOR,
                    &format!("ID {} {:.2}", id, det.confidence),
                );
            }
        }

        for alert in alerts {
            let p = alert.location();
            let (x, y) = (p.x as i32, p.y as i32);
            draw_filled_circle_mut(frame, (x, y), ALERT_RADIUS, score_color(alert.suspicion_score));

            self.label(
                frame,
                x - 10,
                y - 45,
                TEXT_COLOR,
                &format!(
                    "{}: ID {} ({:.1})",
                    alert.alert_type().as_str().to_uppercase(),
                    alert.track_id,
                    alert.suspicion_score
                ),
            );
        }

        for (idx, zone) in config.active_zones() {
            let n = zone.points.len();
            for i in 0..n {
                let [x1, y1] = zone.points[i];
                let [x2, y2] = zone.points[(i + 1) % n];
                draw_line_segment_mut(frame, (x1, y1), (x2, y2), ZONE_COLOR);
            }

            let [x0, y0] = zone.points[0];
            self.label(frame, x0 as i32, y0 as i32 - 24, ZONE_COLOR, &zone.display_name(idx));
        }

        if self.font.is_some() && !top_scores.is_empty() {
            let mut y = 10;
            self.label(frame, 10, y, TEXT_COLOR, "Suspicion Scores:");

            for (id, score) in top_scores.iter().take(TOP_SCORES) {
                y += 25;
                self.label(frame, 10, y, score_color(*score), &format!("ID {}: {:.1}", id, score));
            }
        }
    }

    fn label(&self, frame: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(frame, color, x, y, self.scale, font, text);
        }
    }
}
