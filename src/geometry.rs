use crate::config::Zone;
use nalgebra as na;

/// Ray-casting point-in-polygon test. Degenerate polygons (fewer than three
/// vertices) contain nothing.
pub fn in_bounds(p: na::Point2<f32>, poly: &[na::Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut p1 = poly[0];
    let mut xints = 0.0;

    for i in 1..=n {
        let p2 = poly[i % n];

        if p.y > f32::min(p1.y, p2.y) && p.y <= f32::max(p1.y, p2.y) && p.x <= f32::max(p1.x, p2.x)
        {
            // horizontal edges keep the previous intersection
            if (p1.y - p2.y).abs() > f32::EPSILON {
                xints = (p.y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x;
            }

            if (p1.x - p2.x).abs() < f32::EPSILON || p.x <= xints {
                inside = !inside;
            }
        }

        p1 = p2;
    }

    inside
}

/// Mean of the polygon vertices.
pub fn centroid(poly: &[na::Point2<f32>]) -> Option<na::Point2<f32>> {
    if poly.is_empty() {
        return None;
    }

    let sum = poly
        .iter()
        .fold(na::Vector2::zeros(), |acc: na::Vector2<f32>, p| acc + p.coords);

    Some((sum / poly.len() as f32).into())
}

/// First active, well-formed zone (in configuration order) containing `p`.
pub fn containing_zone(p: na::Point2<f32>, zones: &[Zone]) -> Option<(usize, &Zone)> {
    zones
        .iter()
        .enumerate()
        .filter(|(_, zone)| zone.active && zone.is_valid())
        .find(|(_, zone)| in_bounds(p, &zone.polygon()))
}
