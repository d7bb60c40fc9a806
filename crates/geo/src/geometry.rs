use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default ring radius, in degrees (roughly 2 km at French latitudes)
pub const DEFAULT_BUFFER_RADIUS_DEG: f64 = 0.02;

/// Points generated around each coordinate when synthesizing a zone boundary
const RING_POINTS: usize = 8;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Arithmetic mean of a set of coordinates, `None` when empty.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<LatLng> {
    let mut count = 0usize;
    let mut lat = 0.0;
    let mut lng = 0.0;
    for point in points {
        count += 1;
        lat += point.lat;
        lng += point.lng;
    }
    (count > 0).then(|| LatLng::new(lat / count as f64, lng / count as f64))
}

/// Cross-product orientation test: `true` when `p1 → p2 → p3` turns left.
pub fn is_left_turn(p1: &LatLng, p2: &LatLng, p3: &LatLng) -> bool {
    (p2.lng - p1.lng) * (p3.lat - p1.lat) - (p3.lng - p1.lng) * (p2.lat - p1.lat) > 0.0
}

/// Convex hull of a point set, counter-clockwise starting from the lowest point.
///
/// The pivot is the lowest-latitude point (lowest longitude on ties). The remaining
/// points are swept by polar angle around it, keeping only left turns; collinear
/// runs collapse to their extreme points. Fewer than 3 points are returned as-is.
pub fn convex_hull(points: &[LatLng]) -> Vec<LatLng> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let pivot_idx = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.lat
                .partial_cmp(&b.lat)
                .unwrap_or(Ordering::Equal)
                .then(a.lng.partial_cmp(&b.lng).unwrap_or(Ordering::Equal))
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let pivot = points[pivot_idx];

    let mut rest: Vec<LatLng> = points
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != pivot_idx)
        .map(|(_, point)| *point)
        .collect();

    let angle = |p: &LatLng| (p.lat - pivot.lat).atan2(p.lng - pivot.lng);
    let distance = |p: &LatLng| (p.lat - pivot.lat).powi(2) + (p.lng - pivot.lng).powi(2);
    rest.sort_by(|a, b| {
        angle(a)
            .partial_cmp(&angle(b))
            .unwrap_or(Ordering::Equal)
            .then(distance(a).partial_cmp(&distance(b)).unwrap_or(Ordering::Equal))
    });

    let mut hull = vec![pivot];
    for point in rest {
        while hull.len() >= 2 && !is_left_turn(&hull[hull.len() - 2], &hull[hull.len() - 1], &point)
        {
            hull.pop();
        }
        hull.push(point);
    }
    hull
}

/// Ring of points at 45° steps around `center`.
fn ring_around(center: &LatLng, radius: f64) -> impl Iterator<Item = LatLng> + '_ {
    (0..RING_POINTS).map(move |step| {
        let angle = step as f64 * std::f64::consts::TAU / RING_POINTS as f64;
        LatLng::new(
            center.lat + radius * angle.cos(),
            center.lng + radius * angle.sin(),
        )
    })
}

/// Synthesize a boundary around member coordinates: a ring of points around
/// each coordinate, plus the coordinates themselves, wrapped in a convex hull.
///
/// A single coordinate (or none) has no area to wrap and is returned unchanged.
pub fn buffered_hull(points: &[LatLng], radius: f64) -> Vec<LatLng> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let mut buffered: Vec<LatLng> = points
        .iter()
        .flat_map(|point| ring_around(point, radius))
        .collect();
    buffered.extend_from_slice(points);
    convex_hull(&buffered)
}

/// Centre of the bounding box of a boundary; `(0, 0)` for an empty boundary.
pub fn zone_center(boundary: &[LatLng]) -> LatLng {
    if boundary.is_empty() {
        return LatLng::new(0.0, 0.0);
    }
    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
    for point in boundary {
        min_lat = min_lat.min(point.lat);
        max_lat = max_lat.max(point.lat);
        min_lng = min_lng.min(point.lng);
        max_lng = max_lng.max(point.lng);
    }
    LatLng::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0)
}

/// Even-odd ray casting; points on the boundary may fall either way.
pub fn polygon_contains(polygon: &[LatLng], point: &LatLng) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let cross_lng = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < cross_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Rendering hints for zone polygons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStyle {
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
    pub weight: u32,
}

impl Default for ZoneStyle {
    fn default() -> Self {
        Self {
            color: "#fac142".to_string(),
            fill_color: "#fac142".to_string(),
            fill_opacity: 0.2,
            weight: 2,
        }
    }
}
