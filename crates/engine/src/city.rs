use crate::membership::{CodeMembership, CodeMode};
use locator_geo::geometry::centroid;
use locator_geo::{resolve_department_code, GeoIndex, LatLng};
use locator_records::Record;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A named coordinate contributing to a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// One map pin: every place sharing a code, merged.
#[derive(Debug, Clone, Serialize)]
pub struct City {
    /// Postal code, or department-mode code (`<dept>000`)
    pub code: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub department_name: Option<String>,
    pub department_code: Option<String>,
    #[serde(skip)]
    pub base_records: Vec<Arc<Record>>,
    pub places: Vec<Place>,
}

impl City {
    fn new(code: &str, name: String, department_name: Option<String>) -> Self {
        Self {
            code: code.to_string(),
            lat: 0.0,
            lng: 0.0,
            name,
            department_name,
            department_code: resolve_department_code(code),
            base_records: Vec::new(),
            places: Vec::new(),
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Append a place; the centroid is recomputed on every append.
    ///
    /// Repeated places are kept and weigh in the mean like any other entry.
    pub fn push_place(&mut self, place: Place) {
        self.places.push(place);
        let positions: Vec<LatLng> = self.places.iter().map(Place::position).collect();
        if let Some(center) = centroid(&positions) {
            self.lat = center.lat;
            self.lng = center.lng;
        }
    }

    fn add_records(&mut self, records: impl IntoIterator<Item = Arc<Record>>) {
        for record in records {
            if !self.base_records.iter().any(|r| Arc::ptr_eq(r, &record)) {
                self.base_records.push(record);
            }
        }
    }

    pub fn has_record_with_access(&self) -> bool {
        self.base_records.iter().any(|r| r.has_access())
    }

    pub fn has_record_without_access(&self) -> bool {
        self.base_records.iter().any(|r| !r.has_access())
    }
}

/// Running collection of cities, one per code.
///
/// Feeding the same codes again is a no-op; places that appeared in the index since
/// the last call (remote geocoding) are merged into the existing city.
#[derive(Debug, Clone, Default)]
pub struct CityAggregator {
    cities: Vec<City>,
    positions: HashMap<String, usize>,
}

impl CityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cities for `codes`, computed without touching the running collection.
    ///
    /// Codes without any resolvable place yield nothing. For codes already merged,
    /// only the places appended to the index since then are returned; none means
    /// the code is skipped.
    pub fn resolve(
        &self,
        codes: &[String],
        index: &GeoIndex,
        membership: &CodeMembership,
    ) -> Vec<City> {
        let mut seen = HashSet::new();
        codes
            .iter()
            .filter(|code| seen.insert(*code))
            .filter_map(|code| {
                let mut places = places_for(code, membership.mode(), index);
                if places.is_empty() {
                    log::debug!("No geography for code {code}");
                    return None;
                }
                if let Some(existing) = self.get(code) {
                    // The index only ever appends places under a code.
                    if existing.places.len() >= places.len() {
                        return None;
                    }
                    places.drain(..existing.places.len());
                }
                let name = places[0].name.clone();
                let department_name = match membership.mode() {
                    CodeMode::Postal => index.department_name(code),
                    CodeMode::Department => Some(name.clone()),
                };
                let mut city = City::new(code, name, department_name);
                for place in places {
                    city.push_place(place);
                }
                city.add_records(membership.records_for(code));
                Some(city)
            })
            .collect()
    }

    /// Merge cities into the running collection, deduplicated by code.
    pub fn merge(&mut self, cities: Vec<City>) {
        for city in cities {
            match self.positions.get(&city.code) {
                Some(&pos) => {
                    let existing = &mut self.cities[pos];
                    for place in city.places {
                        existing.push_place(place);
                    }
                    existing.add_records(city.base_records);
                }
                None => {
                    self.positions.insert(city.code.clone(), self.cities.len());
                    self.cities.push(city);
                }
            }
        }
    }

    /// Resolve and merge in one step; returns the running collection.
    pub fn aggregate(
        &mut self,
        codes: &[String],
        index: &GeoIndex,
        membership: &CodeMembership,
    ) -> &[City] {
        let resolved = self.resolve(codes, index, membership);
        self.merge(resolved);
        &self.cities
    }

    pub fn get(&self, code: &str) -> Option<&City> {
        self.positions.get(code).map(|&pos| &self.cities[pos])
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn clear(&mut self) {
        self.cities.clear();
        self.positions.clear();
    }
}

/// Places for a code: the communes of a postal code, or the department centroid.
fn places_for(code: &str, mode: CodeMode, index: &GeoIndex) -> Vec<Place> {
    match mode {
        CodeMode::Postal => index
            .places(code)
            .iter()
            .map(|commune| Place {
                name: commune.name.clone(),
                lat: commune.lat,
                lng: commune.lng,
            })
            .collect(),
        CodeMode::Department => resolve_department_code(code)
            .and_then(|dept_code| index.department(&dept_code))
            .and_then(|dept| {
                dept.centroid().map(|center| Place {
                    name: dept.name.clone(),
                    lat: center.lat,
                    lng: center.lng,
                })
            })
            .into_iter()
            .collect(),
    }
}
