use crate::detection::Detection;

use std::collections::BTreeMap;
use std::fmt;

pub const NAMES: [&str; 8] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
];

const REGIONS: [&str; 3] = ["left", "center", "right"];

pub fn class_name(class: i32) -> String {
    usize::try_from(class)
        .ok()
        .and_then(|idx| NAMES.get(idx))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class {}", class))
}

/// Coarse description of what is in the frame: people by posture and
/// horizontal third, everything else by class count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub sitting: [u32; 3],
    pub standing: [u32; 3],
    pub objects: BTreeMap<i32, u32>,
}

impl SceneSummary {
    #[inline]
    pub fn people(&self) -> u32 {
        self.sitting.iter().chain(self.standing.iter()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.people() == 0 && self.objects.is_empty()
    }
}

fn region(x: f32, width: f32) -> usize {
    if x < width / 3.0 {
        0
    } else if x > 2.0 * width / 3.0 {
        2
    } else {
        1
    }
}

/// People whose box is shorter than a quarter of the frame count as sitting.
pub fn summarize(detections: &[Detection], width: u32, height: u32) -> SceneSummary {
    let (width, height) = (width as f32, height as f32);
    let mut summary = SceneSummary::default();

    for det in detections {
        if det.is_person() {
            let idx = region(det.center().x, width);

            if det.bbox.height() < height / 4.0 {
                summary.sitting[idx] += 1;
            } else {
                summary.standing[idx] += 1;
            }
        } else {
            *summary.objects.entry(det.class).or_insert(0) += 1;
        }
    }

    summary
}

fn plural(count: u32) -> &'static str {
    if count > 1 {
        "s"
    } else {
        ""
    }
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut desc = Vec::new();

        for (pose, counts) in [("sitting", &self.sitting), ("standing", &self.standing)] {
            for (count, region) in counts.iter().zip(REGIONS) {
                if *count > 0 {
                    desc.push(format!(
                        "{} person{} {} in the {}",
                        count,
                        plural(*count),
                        pose,
                        region
                    ));
                }
            }
        }

        for (class, count) in &self.objects {
            desc.push(format!("{} {}{}", count, class_name(*class), plural(*count)));
        }

        if desc.is_empty() {
            return write!(f, "No significant activity detected.");
        }

        write!(f, "Scene Summary: {}.", desc.join(", "))
    }
}
