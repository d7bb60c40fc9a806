use crate::capitalize::capitalize_place_name;
use crate::code::{normalize_department_code, resolve_department_code};
use crate::geocode::{GeocodeRequest, GeocodedPlace, Geocoder};
use crate::geometry::LatLng;
use crate::tables::{CommuneRow, DepartmentRow, ReferenceCommuneRow};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Department metadata. Coordinates may be NaN when the source row was malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentInfo {
    pub code: String,
    pub name: String,
    pub region_code: Option<u32>,
    pub region_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl DepartmentInfo {
    /// Centroid, `None` if either coordinate failed to parse
    pub fn centroid(&self) -> Option<LatLng> {
        let point = LatLng::new(self.latitude, self.longitude);
        point.is_finite().then_some(point)
    }
}

/// A named place under a postal code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommuneInfo {
    pub postcode: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl CommuneInfo {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

fn parse_float(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Department index keyed by both the raw and the leading-zero-stripped code.
pub fn build_department_index(rows: &[DepartmentRow]) -> HashMap<String, DepartmentInfo> {
    let mut index = HashMap::with_capacity(rows.len() * 2);
    for row in rows {
        let code = row.code_departement.trim().to_string();
        if code.is_empty() {
            continue;
        }
        let info = DepartmentInfo {
            code: code.clone(),
            name: row.nom_departement.trim().to_string(),
            region_code: row.code_region.trim().parse::<u32>().ok(),
            region_name: row.nom_region.trim().to_string(),
            latitude: parse_float(&row.latitude),
            longitude: parse_float(&row.longitude),
        };
        let normalized = normalize_department_code(&code).to_string();
        if !normalized.is_empty() && normalized != code {
            index.insert(normalized, info.clone());
        }
        index.insert(code, info);
    }
    index
}

/// Commune index keyed by postal code. Rows without finite coordinates are skipped;
/// repeated postal codes accumulate.
pub fn build_commune_index(rows: &[CommuneRow]) -> HashMap<String, Vec<CommuneInfo>> {
    let mut index: HashMap<String, Vec<CommuneInfo>> = HashMap::new();
    let mut skipped = 0usize;
    for row in rows {
        let lat = parse_float(&row.latitude);
        let lng = parse_float(&row.longitude);
        let postcode = row.postcode.trim();
        if !lat.is_finite() || !lng.is_finite() || postcode.is_empty() {
            skipped += 1;
            continue;
        }
        index
            .entry(postcode.to_string())
            .or_default()
            .push(CommuneInfo {
                postcode: postcode.to_string(),
                name: row.commune.trim().to_string(),
                lat,
                lng,
            });
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} commune rows without usable coordinates");
    }
    index
}

/// Postal code and department lookup tables.
///
/// Built once from the reference tables; the commune table grows when missing
/// codes are resolved remotely. [`GeoIndex::revision`] changes on every mutation.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
    departments: HashMap<String, DepartmentInfo>,
    communes: HashMap<String, Vec<CommuneInfo>>,
    directory: HashMap<String, Vec<String>>,
    department_names: HashMap<String, String>,
    contours: HashMap<String, Vec<LatLng>>,
    revision: u64,
}

impl GeoIndex {
    pub fn new(departments: &[DepartmentRow], communes: &[CommuneRow]) -> Self {
        let index = Self {
            departments: build_department_index(departments),
            communes: build_commune_index(communes),
            ..Default::default()
        };
        log::info!(
            "Geo index ready: {} department keys, {} postal codes",
            index.departments.len(),
            index.communes.len()
        );
        index
    }

    /// Attach the postal directory used to name codes missing from the commune table.
    pub fn with_reference_communes(mut self, rows: &[ReferenceCommuneRow]) -> Self {
        for row in rows {
            let code = row.code_postal.trim();
            let name = row.nom_commune.trim();
            if code.is_empty() || name.is_empty() {
                continue;
            }
            self.directory
                .entry(code.to_string())
                .or_default()
                .push(name.to_string());
        }
        self
    }

    /// Attach fallback department names (`code → name`) for codes absent from the table.
    pub fn with_department_names(mut self, names: HashMap<String, String>) -> Self {
        self.department_names = names;
        self
    }

    /// Attach precomputed contour rings keyed by postal or department-mode code.
    pub fn with_contours(mut self, contours: HashMap<String, Vec<LatLng>>) -> Self {
        self.contours = contours;
        self
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Department by code, trying the raw form then the leading-zero-stripped form.
    pub fn department(&self, dept_code: &str) -> Option<&DepartmentInfo> {
        self.departments
            .get(dept_code)
            .or_else(|| self.departments.get(&*normalize_department_code(dept_code)))
    }

    /// Department name for a postal or department-mode code.
    pub fn department_name(&self, code: &str) -> Option<String> {
        let dept_code = resolve_department_code(code)?;
        if let Some(dept) = self.department(&dept_code) {
            return Some(dept.name.clone());
        }
        self.department_names
            .get(&dept_code)
            .or_else(|| {
                self.department_names
                    .get(&*normalize_department_code(&dept_code))
            })
            .cloned()
    }

    /// Places registered under a postal code (empty when unknown).
    pub fn places(&self, postcode: &str) -> &[CommuneInfo] {
        self.communes
            .get(postcode)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains_postcode(&self, postcode: &str) -> bool {
        self.communes.contains_key(postcode)
    }

    pub fn contour(&self, code: &str) -> Option<&[LatLng]> {
        self.contours.get(code).map(Vec::as_slice)
    }

    /// Codes without any local place, in input order, deduplicated.
    pub fn missing_codes<'a>(&self, codes: &'a [String]) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        codes
            .iter()
            .map(String::as_str)
            .filter(|code| !self.contains_postcode(code) && seen.insert(*code))
            .collect()
    }

    /// Geocoding requests for the missing codes, named from the postal directory.
    pub fn geocode_requests(&self, codes: &[String]) -> Vec<GeocodeRequest> {
        self.missing_codes(codes)
            .into_iter()
            .flat_map(|code| {
                self.directory
                    .get(code)
                    .into_iter()
                    .flatten()
                    .map(move |name| GeocodeRequest {
                        postcode: code.to_string(),
                        city: capitalize_place_name(name),
                    })
            })
            .collect()
    }

    /// Append geocoded places to the commune table. Returns how many were added.
    pub fn merge_geocoded(&mut self, places: Vec<GeocodedPlace>) -> usize {
        let mut added = 0usize;
        for place in places {
            if !place.lat.is_finite() || !place.lng.is_finite() {
                continue;
            }
            self.communes
                .entry(place.postcode.clone())
                .or_default()
                .push(CommuneInfo {
                    postcode: place.postcode,
                    name: place.name,
                    lat: place.lat,
                    lng: place.lng,
                });
            added += 1;
        }
        if added > 0 {
            self.revision += 1;
        }
        added
    }

    /// Resolve codes missing from the commune table through a remote geocoder.
    ///
    /// A failed remote call is logged and counts as zero new places.
    pub async fn resolve_missing_codes(&mut self, codes: &[String], geocoder: &dyn Geocoder) -> usize {
        let requests = self.geocode_requests(codes);
        if requests.is_empty() {
            return 0;
        }
        match geocoder.geocode(&requests).await {
            Ok(places) => {
                let added = self.merge_geocoded(places);
                log::debug!(
                    "Remote geocoding: {} requested, {added} places merged",
                    requests.len()
                );
                added
            }
            Err(err) => {
                log::warn!("Failed to geocode {} missing places: {err}", requests.len());
                0
            }
        }
    }
}
