pub mod alert;
pub mod annotate;
pub mod bbox;
pub mod behavior;
pub mod config;
pub mod detection;
pub mod detector;
pub mod effects;
pub mod engine;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod math;
pub mod scene;
pub mod scorer;
pub mod track;
pub mod worker;

mod circular_queue;

pub use alert::{Alert, AlertKind, AlertLog, AlertType};
pub use config::{Config, ConfigHandle, Zone};
pub use detection::Detection;
pub use detector::Detector;
pub use engine::{Engine, FrameOutput};
pub use error::Error;
pub use track::Track;
pub use worker::Worker;
