use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid font: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),

    #[error("Invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("Malformed detections record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Detector Error: {0}")]
    DetectorError(String),

    #[error("Channel closed")]
    ChannelClosed,
}
