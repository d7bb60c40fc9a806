//! # Locator Engine
//!
//! Incremental aggregation of pet-locator records into map pins and zones.
//!
//! ## Load cycle
//!
//! ```text
//! Record set + mode (postal | department)
//!     │
//!     ├──> CodeMembership: unique codes, code → records
//!     │
//!     ├──> batches of `batch_size` codes, in order
//!     │      ├─> remote geocoding of missing postal codes (optional)
//!     │      └─> CityAggregator: one City per code, centroid = mean of places
//!     │
//!     ├──> ZoneBuilder: one Zone per multi-code record (contours or buffered hull)
//!     │
//!     └──> LoadProgress { done: true }
//! ```
//!
//! Filtering ([`filter_cities`], [`filter_zones`]) runs on read and never mutates
//! the engine.
//!
//! ## Example
//!
//! ```rust
//! use locator_engine::{Engine, EngineConfig, RecomputeTrigger, LoadOutcome};
//! use locator_geo::{CommuneRow, GeoIndex};
//! use locator_records::Record;
//!
//! # tokio_test_block(async {
//! let index = GeoIndex::new(&[], &[CommuneRow {
//!     postcode: "75001".to_string(),
//!     commune: "Paris".to_string(),
//!     latitude: "48.86".to_string(),
//!     longitude: "2.34".to_string(),
//! }]);
//! let config = EngineConfig { remote_fallback: false, ..Default::default() };
//! let mut engine = Engine::new(config, index)?;
//! engine.set_records(vec![Record { zip_code: Some("75001".to_string()), ..Default::default() }]);
//!
//! let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;
//! assert!(matches!(outcome, LoadOutcome::Completed { cities: 1, .. }));
//! assert!(engine.is_done());
//! # Ok::<(), locator_engine::EngineError>(())
//! # })?;
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! # Ok::<(), locator_engine::EngineError>(())
//! ```

mod city;
mod config;
mod error;
mod filter;
mod membership;
mod scheduler;
mod zone;

pub use city::{City, CityAggregator, Place};
pub use config::{EngineConfig, DEFAULT_BATCH_SIZE, DEFAULT_ZONE_COLOR};
pub use error::{EngineError, Result};
pub use filter::{filter_cities, FilterState, PinCategory};
pub use membership::{CodeMembership, CodeMode};
pub use scheduler::{Engine, EngineHandle, LoadOutcome, LoadProgress, RecomputeTrigger};
pub use zone::{filter_zones, BoundaryKind, Zone, ZoneBuilder};
