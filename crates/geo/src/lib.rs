//! # Locator Geo
//!
//! Turns French postal and department codes into coordinates.
//!
//! ## Pipeline
//!
//! ```text
//! Postal / department code
//!     │
//!     ├──> Code conventions (department extraction, zero padding, overseas, Corsica)
//!     │
//!     ├──> GeoIndex lookup
//!     │      ├─> department table (raw + zero-stripped keys)
//!     │      └─> commune table (postal code → places)
//!     │
//!     └──> Remote geocoder fallback for codes missing locally
//!            └─> merged back into the commune table
//! ```
//!
//! Geometry helpers (centroid, convex hull, buffered zone boundary) live in
//! [`geometry`].
//!
//! ## Example
//!
//! ```rust
//! use locator_geo::{resolve_department_code, same_department, GeoIndex, DepartmentRow};
//!
//! assert_eq!(resolve_department_code("97411").as_deref(), Some("974"));
//! assert!(same_department("01", "1"));
//!
//! let rows = vec![DepartmentRow {
//!     code_departement: "01".to_string(),
//!     nom_departement: "Ain".to_string(),
//!     latitude: "46.09".to_string(),
//!     longitude: "5.35".to_string(),
//!     ..Default::default()
//! }];
//! let index = GeoIndex::new(&rows, &[]);
//! assert_eq!(index.department_name("01400").as_deref(), Some("Ain"));
//! ```

mod capitalize;
mod code;
mod error;
mod geocode;
pub mod geometry;
mod index;
mod tables;

pub use capitalize::capitalize_place_name;
pub use code::{
    extract_digits, format_zip_code, is_corsica, normalize_department_code,
    pad_department_code, resolve_department_code, same_department, split_codes,
    zone_member_department_code, DEPARTMENT_SUFFIX,
};
pub use error::{GeoError, Result};
pub use geocode::{
    encode_payload, parse_response, GeocodeRequest, GeocodedPlace, Geocoder, HttpGeocoder,
    DEFAULT_GEOCODE_ENDPOINT,
};
pub use geometry::{LatLng, ZoneStyle};
pub use index::{build_commune_index, build_department_index, CommuneInfo, DepartmentInfo, GeoIndex};
pub use tables::{
    load_commune_rows, load_department_rows, load_reference_communes, read_commune_rows,
    read_department_rows, read_reference_communes, CommuneRow, DepartmentRow,
    ReferenceCommuneRow,
};
