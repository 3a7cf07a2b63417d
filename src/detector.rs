use crate::detection::Detection;
use crate::error::Error;

use image::RgbImage;
use std::collections::VecDeque;
use std::io::BufRead;

/// Object detector with tracking: given a frame and a confidence threshold,
/// returns the boxes it found. Identity continuity is the detector's job.
pub trait Detector {
    fn detect(&mut self, frame: &RgbImage, confidence_threshold: f32)
        -> Result<Vec<Detection>, Error>;
}

impl<F> Detector for F
where
    F: FnMut(&RgbImage, f32) -> Result<Vec<Detection>, Error>,
{
    #[inline]
    fn detect(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, Error> {
        self(frame, confidence_threshold)
    }
}

/// One line of a recorded detections file: `<unix_millis>:<json array>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionsRecord {
    pub timestamp_ms: u64,
    pub detections: Vec<Detection>,
}

impl DetectionsRecord {
    pub fn parse(line: &str, line_no: usize) -> Result<Self, Error> {
        let malformed = |reason: &str| Error::MalformedRecord {
            line: line_no,
            reason: reason.to_string(),
        };

        let idx = line.find(':').ok_or_else(|| malformed("missing ':' separator"))?;
        let (ts, vector) = line.split_at(idx);

        let timestamp_ms = ts
            .trim()
            .parse::<u64>()
            .map_err(|_| malformed("timestamp is not an integer"))?;

        let detections = serde_json::from_str(&vector[1..])
            .map_err(|err| malformed(&format!("parse json failed: {}", err)))?;

        Ok(Self {
            timestamp_ms,
            detections,
        })
    }
}

/// Reads every non-empty line of a recorded detections stream.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<DetectionsRecord>, Error> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        records.push(DetectionsRecord::parse(&line, idx + 1)?);
    }

    Ok(records)
}

/// Plays back recorded detections, one record per `detect` call. Once the
/// recording is exhausted every frame is empty.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: VecDeque<Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new<I: IntoIterator<Item = Vec<Detection>>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn from_records(records: &[DetectionsRecord]) -> Self {
        Self::new(records.iter().map(|r| r.detections.clone()))
    }
}

impl Detector for ReplayDetector {
    fn detect(
        &mut self,
        _frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, Error> {
        let mut detections = self.frames.pop_front().unwrap_or_default();
        detections.retain(|d| d.confidence >= confidence_threshold);

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    #[test]
    fn parses_recorded_line() {
        let record = DetectionsRecord::parse(
            r#"1700000000500:[{"id": 1, "bbox": [0, 0, 10, 10], "c": 0, "p": 0.9}]"#,
            1,
        )
        .unwrap();

        assert_eq!(record.timestamp_ms, 1_700_000_000_500);
        assert_eq!(record.detections.len(), 1);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            DetectionsRecord::parse("no separator", 4),
            Err(Error::MalformedRecord { line: 4, .. })
        ));
        assert!(DetectionsRecord::parse("abc:[]", 1).is_err());
        assert!(DetectionsRecord::parse("12:{not json", 1).is_err());
    }

    #[test]
    fn reads_stream_skipping_blank_lines() {
        let input = "1000:[]\n\n2000:[]\n";
        let records = read_records(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp_ms, 2000);
    }

    #[test]
    fn replay_serves_frames_in_order() {
        let low = Detection::new(Some(1), BBox::ltrb(0.0, 0.0, 1.0, 1.0), 0, 0.2);
        let high = Detection::new(Some(2), BBox::ltrb(0.0, 0.0, 1.0, 1.0), 0, 0.8);
        let mut detector = ReplayDetector::new(vec![vec![low, high], vec![]]);
        let frame = RgbImage::new(4, 4);

        let first = detector.detect(&frame, 0.5).unwrap();
        assert_eq!(first, vec![high]);
        assert!(detector.detect(&frame, 0.5).unwrap().is_empty());
        assert!(detector.detect(&frame, 0.5).unwrap().is_empty());
    }
}
