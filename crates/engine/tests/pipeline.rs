use async_trait::async_trait;
use locator_engine::{
    BoundaryKind, CodeMode, Engine, EngineConfig, EngineError, EngineHandle, FilterState,
    LoadOutcome, PinCategory, RecomputeTrigger,
};
use locator_geo::geometry::polygon_contains;
use locator_geo::{
    parse_response, CommuneRow, DepartmentRow, GeoError, GeoIndex, GeocodeRequest,
    GeocodedPlace, Geocoder, ReferenceCommuneRow,
};
use locator_records::{InMemoryRecordSource, Record, RecordSource, SourceSelector};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn commune(postcode: &str, name: &str, lat: f64, lng: f64) -> CommuneRow {
    CommuneRow {
        postcode: postcode.to_string(),
        commune: name.to_string(),
        latitude: lat.to_string(),
        longitude: lng.to_string(),
    }
}

fn department(code: &str, name: &str, lat: f64, lng: f64) -> DepartmentRow {
    DepartmentRow {
        code_departement: code.to_string(),
        nom_departement: name.to_string(),
        latitude: lat.to_string(),
        longitude: lng.to_string(),
        ..Default::default()
    }
}

fn reference(code: &str, name: &str) -> ReferenceCommuneRow {
    ReferenceCommuneRow {
        code_postal: code.to_string(),
        nom_commune: name.to_string(),
    }
}

fn geo_index() -> GeoIndex {
    GeoIndex::new(
        &[
            department("75", "Paris", 48.85, 2.35),
            department("01", "Ain", 46.1, 5.3),
        ],
        &[
            commune("75001", "Paris 1er Arrondissement", 48.862, 2.336),
            commune("75002", "Paris 2e Arrondissement", 48.868, 2.343),
            commune("01100", "Oyonnax", 46.25, 5.65),
        ],
    )
    .with_reference_communes(&[
        reference("01500", "AMBERIEU EN BUGEY"),
        reference("99999", "NULLE PART"),
    ])
}

fn record(id: &str, zip: &str, dept: &str, access: bool) -> Record {
    Record {
        id: Some(id.to_string()),
        zip_code: Some(zip.to_string()),
        dept: Some(dept.to_string()),
        access_icad: access,
        ..Default::default()
    }
}

fn config(remote_fallback: bool) -> EngineConfig {
    EngineConfig {
        batch_size: 2,
        remote_fallback,
        ..Default::default()
    }
}

/// Answers from a fixed table with a CSV body shaped like the address API's;
/// codes not in the table come back as `not-found` rows.
#[derive(Default)]
struct TableGeocoder {
    known: Vec<GeocodedPlace>,
    calls: Mutex<Vec<Vec<GeocodeRequest>>>,
}

impl TableGeocoder {
    fn response_body(&self, requests: &[GeocodeRequest]) -> String {
        let mut body = String::from("postcode,city,longitude,latitude,result_status\n");
        for request in requests {
            match self.known.iter().find(|place| place.postcode == request.postcode) {
                Some(place) => body.push_str(&format!(
                    "{},{},{},{},ok\n",
                    place.postcode, place.name, place.lng, place.lat
                )),
                None => body.push_str(&format!(
                    "{},{},,,not-found\n",
                    request.postcode, request.city
                )),
            }
        }
        body
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, requests: &[GeocodeRequest]) -> locator_geo::Result<Vec<GeocodedPlace>> {
        self.calls.lock().unwrap().push(requests.to_vec());
        Ok(parse_response(&self.response_body(requests)))
    }
}

struct FailingGeocoder;

#[async_trait]
impl Geocoder for FailingGeocoder {
    async fn geocode(&self, _requests: &[GeocodeRequest]) -> locator_geo::Result<Vec<GeocodedPlace>> {
        Err(GeoError::bad_status(503, "unavailable"))
    }
}

/// Invalidates the engine while the remote call is in flight.
struct InvalidatingGeocoder {
    handle: OnceLock<EngineHandle>,
}

#[async_trait]
impl Geocoder for InvalidatingGeocoder {
    async fn geocode(&self, requests: &[GeocodeRequest]) -> locator_geo::Result<Vec<GeocodedPlace>> {
        if let Some(handle) = self.handle.get() {
            handle.invalidate();
        }
        Ok(requests
            .iter()
            .map(|r| GeocodedPlace {
                postcode: r.postcode.clone(),
                name: r.city.clone(),
                lat: 45.95,
                lng: 5.35,
            })
            .collect())
    }
}

#[tokio::test]
async fn two_code_record_yields_two_cities_and_a_zone() {
    init_logging();
    let mut engine = Engine::new(config(false), geo_index()).unwrap();
    engine.set_records(vec![record("r1", "75001,75002", "", false)]);

    let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;
    assert_eq!(
        outcome,
        LoadOutcome::Completed {
            cities: 2,
            zones: 1,
            batches: 1
        }
    );

    let codes: Vec<&str> = engine.cities().iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["75001", "75002"]);
    for city in engine.cities() {
        assert_eq!(city.base_records.len(), 1);
        assert_eq!(city.base_records[0].id(), "r1");
        assert_eq!(city.department_name.as_deref(), Some("Paris"));
    }

    let zone = &engine.zones()[0];
    assert_eq!(zone.boundary_kind, BoundaryKind::Hull);
    assert_eq!(zone.codes, vec!["75001", "75002"]);
    for city in engine.cities() {
        assert!(polygon_contains(&zone.boundary, &city.position()));
    }
    assert!(engine.is_done());
}

#[tokio::test]
async fn not_found_geocode_row_drops_the_code() {
    init_logging();
    let geocoder = Arc::new(TableGeocoder {
        known: vec![GeocodedPlace {
            postcode: "01500".to_string(),
            name: "Amberieu en Bugey".to_string(),
            lat: 45.95,
            lng: 5.35,
        }],
        ..Default::default()
    });
    let mut engine = Engine::new(config(true), geo_index())
        .unwrap()
        .with_geocoder(geocoder.clone());
    engine.set_records(vec![
        record("r1", "01500", "", false),
        record("r2", "99999", "", false),
        record("r3", "75001", "", true),
    ]);
    let mut progress = engine.handle().subscribe();

    let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;

    assert!(matches!(outcome, LoadOutcome::Completed { cities: 2, batches: 2, .. }));
    let codes: Vec<&str> = engine.cities().iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["01500", "75001"]);
    assert_eq!(engine.cities()[0].name, "Amberieu en Bugey");
    assert_eq!(engine.cities()[0].department_name.as_deref(), Some("Ain"));

    let calls = geocoder.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let cities: Vec<&str> = calls[0].iter().map(|r| r.city.as_str()).collect();
    assert_eq!(cities, vec!["Amberieu en Bugey", "Nulle Part"]);

    progress
        .wait_for(|p| p.done)
        .await
        .expect("progress channel open");
}

#[tokio::test]
async fn geocoder_failure_degrades_to_local_matches() {
    init_logging();
    let mut engine = Engine::new(config(true), geo_index())
        .unwrap()
        .with_geocoder(Arc::new(FailingGeocoder));
    engine.set_records(vec![record("r1", "01500,75001", "", false)]);

    let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;

    assert!(matches!(outcome, LoadOutcome::Completed { cities: 1, zones: 1, .. }));
    assert_eq!(engine.zones()[0].place_names, vec!["Paris 1er Arrondissement"]);
    assert!(engine.is_done());
}

#[tokio::test]
async fn invalidation_mid_load_discards_the_batch() {
    init_logging();
    let geocoder = Arc::new(InvalidatingGeocoder {
        handle: OnceLock::new(),
    });
    let mut engine = Engine::new(config(true), geo_index())
        .unwrap()
        .with_geocoder(geocoder.clone());
    let _ = geocoder.handle.set(engine.handle());
    engine.set_records(vec![
        record("r1", "75001", "", false),
        record("r2", "01500", "", false),
    ]);

    let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;

    assert!(matches!(outcome, LoadOutcome::Superseded { .. }));
    assert!(engine.cities().is_empty());
    assert!(engine.zones().is_empty());
    assert!(!engine.is_done());
    assert!(!engine.index().contains_postcode("01500"));
}

#[tokio::test]
async fn source_and_mode_switches_recompute_from_scratch() {
    init_logging();
    let source = InMemoryRecordSource::new()
        .with_records(
            SourceSelector::FilloutBase,
            vec![
                record("a", "75001", "75", true),
                record("b", "01100", "01, 75", false),
            ],
        )
        .with_records(SourceSelector::DraftBase, vec![record("c", "75002", "75", false)]);
    let mut engine = Engine::new(config(false), geo_index()).unwrap();

    let outcome = engine
        .load_from_source(&source, SourceSelector::FilloutBase)
        .await
        .unwrap();
    assert!(matches!(outcome, LoadOutcome::Completed { cities: 2, zones: 0, .. }));

    engine.set_mode(CodeMode::Department);
    assert!(engine.cities().is_empty());
    engine.recompute(RecomputeTrigger::ModeChanged).await;
    let codes: Vec<&str> = engine.cities().iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["75000", "01000"]);
    assert_eq!(engine.zones().len(), 1);
    assert_eq!(engine.cities()[0].base_records.len(), 2);

    let paris = engine.filtered_cities(&FilterState::keyword("075"));
    assert_eq!(paris.len(), 1);
    assert_eq!(paris[0].name, "Paris");

    engine
        .load_from_source(&source, SourceSelector::DraftBase)
        .await
        .unwrap();
    assert_eq!(engine.source(), SourceSelector::DraftBase);
    let codes: Vec<&str> = engine.cities().iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["75000"]);
    assert_eq!(engine.records().len(), 1);
}

/// Serves a record set, invalidating the engine while the fetch is in flight.
struct InvalidatingSource {
    records: Vec<Record>,
    handle: OnceLock<EngineHandle>,
}

#[async_trait]
impl RecordSource for InvalidatingSource {
    async fn fetch_records(&self, _source: SourceSelector) -> locator_records::Result<Vec<Record>> {
        if let Some(handle) = self.handle.get() {
            handle.invalidate();
        }
        tokio::task::yield_now().await;
        Ok(self.records.clone())
    }
}

#[tokio::test]
async fn invalidation_during_fetch_drops_the_record_set() {
    init_logging();
    let source = InvalidatingSource {
        records: vec![record("a", "75001", "75", true)],
        handle: OnceLock::new(),
    };
    let mut engine = Engine::new(config(false), geo_index()).unwrap();
    let _ = source.handle.set(engine.handle());

    let outcome = engine
        .load_from_source(&source, SourceSelector::DraftBase)
        .await
        .unwrap();

    assert!(matches!(outcome, LoadOutcome::Superseded { .. }));
    assert!(engine.records().is_empty());
    assert!(engine.cities().is_empty());
    assert!(!engine.is_done());
}

#[tokio::test]
async fn failed_fetch_leaves_engine_empty() {
    init_logging();
    let source = InMemoryRecordSource::new()
        .with_records(SourceSelector::FilloutBase, vec![record("a", "75001", "75", true)]);
    let mut engine = Engine::new(config(false), geo_index()).unwrap();
    engine
        .load_from_source(&source, SourceSelector::FilloutBase)
        .await
        .unwrap();
    assert!(engine.is_done());

    let err = engine
        .load_from_source(&source, SourceSelector::DraftBase)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RecordError(_)));
    assert!(engine.cities().is_empty());
    assert!(engine.records().is_empty());
    assert!(!engine.is_done());
}

#[tokio::test]
async fn category_and_zone_filters_read_the_result_set() {
    init_logging();
    let mut engine = Engine::new(config(false), geo_index()).unwrap();
    engine.set_records(vec![
        record("a", "75001,75002", "", true),
        record("b", "01100", "", false),
    ]);
    engine.recompute(RecomputeTrigger::RecordsChanged).await;

    let with = engine.filtered_cities(&FilterState::categories([PinCategory::WithAccess]));
    assert_eq!(with.len(), 2);
    let without = engine.filtered_cities(&FilterState::categories([PinCategory::WithoutAccess]));
    assert_eq!(without.len(), 1);
    assert!(engine
        .filtered_cities(&FilterState::categories([PinCategory::Neutral]))
        .is_empty());

    assert_eq!(engine.filtered_zones("2e arr").len(), 1);
    assert!(engine.filtered_zones("oyonnax").is_empty());
}

#[tokio::test(start_paused = true)]
async fn batch_pause_spaces_out_batches() {
    init_logging();
    let config = EngineConfig {
        batch_size: 1,
        batch_pause_ms: 500,
        remote_fallback: false,
        ..Default::default()
    };
    let mut engine = Engine::new(config, geo_index()).unwrap();
    engine.set_records(vec![record("a", "75001,75002,01100", "", false)]);

    let started = tokio::time::Instant::now();
    let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;

    assert!(matches!(outcome, LoadOutcome::Completed { batches: 3, .. }));
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locator.toml");
    std::fs::write(&path, "batch_size = 25\nzone_color = \"#123456\"\n").unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let config = EngineConfig::from_toml_str(&raw).unwrap();
    assert_eq!(config.batch_size, 25);
    assert_eq!(config.zone_color, "#123456");
    assert!(config.remote_fallback);
}
