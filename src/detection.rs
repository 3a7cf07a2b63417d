use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

use nalgebra as na;

pub const PERSON_CLASS: i32 = 0;

/// One detector output. `track_id` is absent until the detector's tracker
/// has settled on an identity for the box.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    #[serde(rename = "id", default)]
    pub track_id: Option<i32>,
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "c")]
    pub class: i32,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    pub fn new(track_id: Option<i32>, bbox: BBox<Ltrb>, class: i32, confidence: f32) -> Self {
        Self {
            track_id,
            bbox,
            class,
            confidence,
        }
    }

    #[inline(always)]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox.center()
    }

    #[inline]
    pub fn is_person(&self) -> bool {
        self.class == PERSON_CLASS
    }

    /// Person with an identity and at least the required confidence.
    #[inline]
    pub fn is_trackable(&self, confidence_threshold: f32) -> bool {
        self.is_person() && self.track_id.is_some() && self.confidence >= confidence_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_json_format() {
        let det: Detection =
            serde_json::from_str(r#"{"id": 3, "bbox": [10, 20, 30, 60], "c": 0, "p": 0.8}"#)
                .unwrap();

        assert_eq!(det.track_id, Some(3));
        assert_eq!(det.center(), na::Point2::new(20.0, 40.0));
        assert!(det.is_trackable(0.5));
        assert!(!det.is_trackable(0.9));
    }

    #[test]
    fn missing_identity_is_not_trackable() {
        let det: Detection =
            serde_json::from_str(r#"{"bbox": [0, 0, 1, 1], "c": 0, "p": 0.99}"#).unwrap();

        assert_eq!(det.track_id, None);
        assert!(!det.is_trackable(0.1));
    }

    #[test]
    fn other_classes_are_not_trackable() {
        let det = Detection::new(Some(1), BBox::ltrb(0.0, 0.0, 1.0, 1.0), 2, 0.99);
        assert!(!det.is_trackable(0.1));
    }
}
