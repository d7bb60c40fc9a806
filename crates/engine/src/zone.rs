use crate::city::{City, CityAggregator};
use crate::config::DEFAULT_ZONE_COLOR;
use crate::membership::CodeMode;
use locator_geo::geometry::{buffered_hull, zone_center, DEFAULT_BUFFER_RADIUS_DEG};
use locator_geo::{
    resolve_department_code, same_department, zone_member_department_code, GeoIndex, LatLng,
    ZoneStyle,
};
use locator_records::Record;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Where a zone boundary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Precomputed contour rings of the member codes
    Contour,
    /// Synthesized hull around member centroids
    Hull,
}

/// An area covered by a record listing several codes
#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub codes: Vec<String>,
    #[serde(skip)]
    pub base_records: Vec<Arc<Record>>,
    pub boundary: Vec<LatLng>,
    pub boundary_kind: BoundaryKind,
    pub place_names: Vec<String>,
    pub color: String,
}

impl Zone {
    /// Centre of the boundary's bounding box, for labels.
    pub fn center(&self) -> LatLng {
        zone_center(&self.boundary)
    }

    pub fn style(&self) -> ZoneStyle {
        ZoneStyle {
            color: self.color.clone(),
            fill_color: self.color.clone(),
            ..Default::default()
        }
    }
}

/// Derives zones from multi-code records
pub struct ZoneBuilder<'a> {
    index: &'a GeoIndex,
    mode: CodeMode,
    buffer_radius: f64,
    color: String,
}

impl<'a> ZoneBuilder<'a> {
    pub fn new(index: &'a GeoIndex, mode: CodeMode) -> Self {
        Self {
            index,
            mode,
            buffer_radius: DEFAULT_BUFFER_RADIUS_DEG,
            color: DEFAULT_ZONE_COLOR.to_string(),
        }
    }

    pub fn buffer_radius(mut self, radius: f64) -> Self {
        self.buffer_radius = radius;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Member codes of a record, or `None` for records listing fewer than two codes.
    pub fn member_codes(&self, record: &Record) -> Option<Vec<String>> {
        let codes: Vec<String> = match self.mode {
            CodeMode::Postal => record.zip_codes(),
            CodeMode::Department => record
                .dept_codes()
                .iter()
                .map(|code| zone_member_department_code(code))
                .collect(),
        };
        (codes.len() > 1).then_some(codes)
    }

    /// City for a member code: exact code, then the code's first two characters,
    /// then (department mode) department equality.
    fn find_city<'c>(&self, cities: &'c CityAggregator, member: &str) -> Option<&'c City> {
        if let Some(city) = cities.get(member) {
            return Some(city);
        }
        if let Some(city) = member.get(..2).and_then(|prefix| cities.get(prefix)) {
            return Some(city);
        }
        if self.mode == CodeMode::Department {
            let dept = resolve_department_code(member)?;
            return cities.cities().iter().find(|city| {
                city.department_code
                    .as_deref()
                    .is_some_and(|code| same_department(code, &dept))
            });
        }
        None
    }

    fn build_zone(&self, record: &Arc<Record>, cities: &CityAggregator) -> Option<Zone> {
        let codes = self.member_codes(record)?;

        let mut seen = HashSet::new();
        let members: Vec<&City> = codes
            .iter()
            .filter_map(|code| self.find_city(cities, code))
            .filter(|city| seen.insert(city.code.as_str()))
            .collect();
        if members.len() < codes.len() {
            log::debug!(
                "Zone of record {}: {} of {} codes resolved",
                record.id(),
                members.len(),
                codes.len()
            );
        }

        let contours: Vec<&[LatLng]> = codes
            .iter()
            .filter_map(|code| self.index.contour(code))
            .collect();
        let (boundary, boundary_kind) = if contours.is_empty() {
            let centroids: Vec<LatLng> = members.iter().map(|city| city.position()).collect();
            (buffered_hull(&centroids, self.buffer_radius), BoundaryKind::Hull)
        } else {
            (contours.concat(), BoundaryKind::Contour)
        };

        Some(Zone {
            codes,
            base_records: vec![Arc::clone(record)],
            boundary,
            boundary_kind,
            place_names: members.iter().map(|city| city.name.clone()).collect(),
            color: self.color.clone(),
        })
    }

    /// One zone per record listing two or more codes. Members without a city are
    /// left out of the zone; the zone itself is still produced.
    pub fn build(&self, records: &[Arc<Record>], cities: &CityAggregator) -> Vec<Zone> {
        records
            .iter()
            .filter_map(|record| self.build_zone(record, cities))
            .collect()
    }
}

/// Zones whose codes or place names contain the keyword; an empty keyword selects none.
pub fn filter_zones<'a>(zones: &'a [Zone], keyword: &str) -> Vec<&'a Zone> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return Vec::new();
    }
    zones
        .iter()
        .filter(|zone| {
            zone.codes.iter().any(|code| code.contains(&keyword))
                || zone
                    .place_names
                    .iter()
                    .any(|name| name.to_lowercase().contains(&keyword))
        })
        .collect()
}
