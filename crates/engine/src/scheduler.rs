use crate::city::{City, CityAggregator};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::filter::{filter_cities, FilterState};
use crate::membership::{CodeMembership, CodeMode};
use crate::zone::{filter_zones, Zone, ZoneBuilder};
use locator_geo::{GeoIndex, Geocoder, HttpGeocoder};
use locator_records::{Record, RecordSource, SourceSelector};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Where the current load cycle stands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadProgress {
    /// Load cycle this snapshot belongs to
    pub generation: u64,
    /// Last merged batch, `None` before the first one
    pub batch_index: Option<usize>,
    pub batch_count: usize,
    /// Set only once the last batch and the zones are in place
    pub done: bool,
}

impl LoadProgress {
    fn started(generation: u64, batch_count: usize) -> Self {
        Self {
            generation,
            batch_index: None,
            batch_count,
            done: false,
        }
    }
}

/// What changed since the previous recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTrigger {
    RecordsChanged,
    ModeChanged,
    GeoIndexChanged,
}

impl fmt::Display for RecomputeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecordsChanged => "records changed",
            Self::ModeChanged => "mode changed",
            Self::GeoIndexChanged => "geo index changed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed {
        cities: usize,
        zones: usize,
        batches: usize,
    },
    /// The cycle was invalidated while in flight; nothing it computed was kept.
    Superseded { generation: u64 },
}

/// Cloneable view of an [`Engine`] usable from other tasks.
///
/// [`EngineHandle::invalidate`] is how a host cancels a load in flight: the running
/// cycle notices at its next suspension point and drops its pending batch.
#[derive(Clone)]
pub struct EngineHandle {
    epoch: Arc<AtomicU64>,
    progress_tx: Arc<watch::Sender<LoadProgress>>,
}

impl EngineHandle {
    fn new() -> Self {
        let (progress_tx, _) = watch::channel(LoadProgress::default());
        Self {
            epoch: Arc::new(AtomicU64::new(0)),
            progress_tx: Arc::new(progress_tx),
        }
    }

    /// Start a new generation; returns its number.
    fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark any in-flight load as stale.
    pub fn invalidate(&self) -> u64 {
        let generation = self.advance();
        self.progress_tx.send_if_modified(|current| {
            if current.generation > generation {
                return false;
            }
            *current = LoadProgress::started(generation, 0);
            true
        });
        generation
    }

    pub fn generation(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadProgress> {
        self.progress_tx.subscribe()
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress_tx.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.progress_tx.borrow().done
    }

    /// Publish a snapshot unless its generation is no longer current.
    fn publish(&self, progress: LoadProgress) -> bool {
        self.progress_tx.send_if_modified(|current| {
            if progress.generation != self.generation() {
                return false;
            }
            *current = progress;
            true
        })
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("generation", &self.generation())
            .field("progress", &self.progress())
            .finish()
    }
}

/// Owns the record set, the geo index and the derived cities and zones.
///
/// Every recompute starts from batch zero; cities and zones of a previous
/// generation never survive into the next one.
pub struct Engine {
    config: EngineConfig,
    index: GeoIndex,
    geocoder: Option<Arc<dyn Geocoder>>,
    mode: CodeMode,
    source: SourceSelector,
    records: Vec<Arc<Record>>,
    cities: CityAggregator,
    zones: Vec<Zone>,
    handle: EngineHandle,
}

impl Engine {
    pub fn new(config: EngineConfig, index: GeoIndex) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            index,
            geocoder: None,
            mode: CodeMode::default(),
            source: SourceSelector::default(),
            records: Vec::new(),
            cities: CityAggregator::new(),
            zones: Vec::new(),
            handle: EngineHandle::new(),
        })
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Use the HTTP geocoder at the configured endpoint.
    pub fn with_http_geocoder(self) -> Self {
        let geocoder = HttpGeocoder::new(self.config.geocode_endpoint.clone());
        self.with_geocoder(Arc::new(geocoder))
    }

    pub fn with_mode(mut self, mode: CodeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    fn reset(&mut self) {
        self.handle.invalidate();
        self.cities.clear();
        self.zones.clear();
    }

    /// Replace the record set. Derived state is dropped until the next recompute.
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records.into_iter().map(Arc::new).collect();
        self.reset();
    }

    pub fn set_mode(&mut self, mode: CodeMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn set_index(&mut self, index: GeoIndex) {
        self.index = index;
        self.reset();
    }

    fn remote_enabled(&self) -> bool {
        self.config.remote_fallback && self.mode == CodeMode::Postal && self.geocoder.is_some()
    }

    /// Resolve postal codes of one batch that the commune table lacks.
    ///
    /// Returns `false` when the cycle was invalidated during the remote call; the
    /// response is then discarded.
    async fn resolve_remote(&mut self, batch: &[String], generation: u64) -> bool {
        let Some(geocoder) = self.geocoder.clone() else {
            return true;
        };
        let requests = self.index.geocode_requests(batch);
        if requests.is_empty() {
            return true;
        }
        log::debug!(
            "Generation {generation}: {} codes missing locally, {} geocode requests",
            self.index.missing_codes(batch).len(),
            requests.len()
        );

        let result = geocoder.geocode(&requests).await;
        if !self.handle.is_current(generation) {
            return false;
        }
        match result {
            Ok(places) => {
                let added = self.index.merge_geocoded(places);
                log::debug!("Generation {generation}: merged {added} geocoded places");
            }
            Err(e) => {
                log::warn!("Remote geocoding failed, continuing with local matches: {e}");
            }
        }
        true
    }

    async fn pause(&self) {
        let pause = self.config.batch_pause();
        if pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(pause).await;
        }
    }

    fn superseded(&mut self, generation: u64) -> LoadOutcome {
        log::warn!("Generation {generation} superseded, discarding in-flight batch");
        self.cities.clear();
        self.zones.clear();
        LoadOutcome::Superseded { generation }
    }

    /// Rebuild cities and zones from scratch, one batch at a time.
    pub async fn recompute(&mut self, trigger: RecomputeTrigger) -> LoadOutcome {
        let generation = self.handle.advance();
        self.cities.clear();
        self.zones.clear();

        let membership = CodeMembership::build(&self.records, self.mode);
        let batches: Vec<Vec<String>> = membership
            .codes()
            .chunks(self.config.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let batch_count = batches.len();
        log::info!(
            "Load {generation} started ({trigger}): {} records, {} codes, {batch_count} batches",
            self.records.len(),
            membership.codes().len()
        );
        if !self
            .handle
            .publish(LoadProgress::started(generation, batch_count))
        {
            return self.superseded(generation);
        }

        for (batch_index, batch) in batches.iter().enumerate() {
            if batch_index > 0 {
                self.pause().await;
                if !self.handle.is_current(generation) {
                    return self.superseded(generation);
                }
            }

            if self.remote_enabled() && !self.resolve_remote(batch, generation).await {
                return self.superseded(generation);
            }

            self.cities.aggregate(batch, &self.index, &membership);
            log::debug!(
                "Load {generation}: batch {}/{batch_count} merged, {} cities",
                batch_index + 1,
                self.cities.len()
            );
            let published = self.handle.publish(LoadProgress {
                generation,
                batch_index: Some(batch_index),
                batch_count,
                done: false,
            });
            if !published {
                return self.superseded(generation);
            }
        }

        if !self.handle.is_current(generation) {
            return self.superseded(generation);
        }
        self.zones = ZoneBuilder::new(&self.index, self.mode)
            .buffer_radius(self.config.buffer_radius_deg)
            .color(self.config.zone_color.clone())
            .build(&self.records, &self.cities);

        let published = self.handle.publish(LoadProgress {
            generation,
            batch_index: batch_count.checked_sub(1),
            batch_count,
            done: true,
        });
        if !published {
            return self.superseded(generation);
        }
        log::info!(
            "Load {generation} finished: {} cities, {} zones",
            self.cities.len(),
            self.zones.len()
        );
        LoadOutcome::Completed {
            cities: self.cities.len(),
            zones: self.zones.len(),
            batches: batch_count,
        }
    }

    /// Fetch a record set and recompute everything from it.
    ///
    /// A fetch failure leaves the engine empty and not done. An invalidation while
    /// the fetch is in flight drops the fetched records.
    pub async fn load_from_source(
        &mut self,
        source: &dyn RecordSource,
        selector: SourceSelector,
    ) -> Result<LoadOutcome> {
        self.source = selector;
        self.records.clear();
        self.reset();
        let generation = self.handle.generation();

        let records = source.fetch_records(selector).await.map_err(|e| {
            log::warn!("Fetching record set {selector} failed: {e}");
            e
        })?;
        if !self.handle.is_current(generation) {
            return Ok(self.superseded(generation));
        }
        log::info!("Fetched {} records from {selector}", records.len());
        self.set_records(records);
        Ok(self.recompute(RecomputeTrigger::RecordsChanged).await)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> CodeMode {
        self.mode
    }

    /// Record set selected by the last [`Engine::load_from_source`] call.
    pub fn source(&self) -> SourceSelector {
        self.source
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    /// Cities merged so far; partial until [`Engine::is_done`].
    pub fn cities(&self) -> &[City] {
        self.cities.cities()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn progress(&self) -> LoadProgress {
        self.handle.progress()
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn filtered_cities(&self, state: &FilterState) -> Vec<&City> {
        filter_cities(self.cities.cities(), self.mode, state)
    }

    pub fn filtered_zones(&self, keyword: &str) -> Vec<&Zone> {
        filter_zones(&self.zones, keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locator_geo::CommuneRow;
    use pretty_assertions::assert_eq;

    fn index() -> GeoIndex {
        let rows: Vec<CommuneRow> = (1..=5)
            .map(|n| CommuneRow {
                postcode: format!("7500{n}"),
                commune: format!("Paris {n}"),
                latitude: format!("48.8{n}"),
                longitude: "2.3".to_string(),
            })
            .collect();
        GeoIndex::new(&[], &rows)
    }

    fn record(id: &str, zip: &str) -> Record {
        Record {
            id: Some(id.to_string()),
            zip_code: Some(zip.to_string()),
            ..Default::default()
        }
    }

    fn engine(batch_size: usize) -> Engine {
        let config = EngineConfig {
            batch_size,
            remote_fallback: false,
            ..Default::default()
        };
        Engine::new(config, index()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(Engine::new(config, GeoIndex::default()).is_err());
    }

    #[tokio::test]
    async fn batches_cover_every_code() {
        let mut engine = engine(2);
        engine.set_records(vec![
            record("a", "75001,75002"),
            record("b", "75003"),
            record("c", "75004, 75005"),
        ]);
        assert!(!engine.is_done());

        let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;
        assert_eq!(
            outcome,
            LoadOutcome::Completed {
                cities: 5,
                zones: 2,
                batches: 3
            }
        );
        let progress = engine.progress();
        assert!(progress.done);
        assert_eq!(progress.batch_index, Some(2));
        assert_eq!(progress.batch_count, 3);
    }

    #[tokio::test]
    async fn empty_record_set_completes() {
        let mut engine = engine(50);
        let outcome = engine.recompute(RecomputeTrigger::RecordsChanged).await;
        assert_eq!(
            outcome,
            LoadOutcome::Completed {
                cities: 0,
                zones: 0,
                batches: 0
            }
        );
        assert!(engine.is_done());
        assert_eq!(engine.progress().batch_index, None);
    }

    #[tokio::test]
    async fn setters_clear_derived_state() {
        let mut engine = engine(50);
        engine.set_records(vec![record("a", "75001")]);
        engine.recompute(RecomputeTrigger::RecordsChanged).await;
        assert_eq!(engine.cities().len(), 1);
        let before = engine.handle().generation();

        engine.set_mode(CodeMode::Department);
        assert!(engine.cities().is_empty());
        assert!(!engine.is_done());
        assert!(engine.handle().generation() > before);
    }

    #[test]
    fn stale_snapshots_are_not_published() {
        let handle = EngineHandle::new();
        let stale = handle.advance();
        let current = handle.invalidate();

        let published = handle.publish(LoadProgress {
            generation: stale,
            batch_index: Some(0),
            batch_count: 1,
            done: true,
        });

        assert!(!published);
        assert_eq!(handle.progress(), LoadProgress::started(current, 0));
        assert!(!handle.is_done());
        assert!(handle.publish(LoadProgress::started(current, 3)));
        assert_eq!(handle.progress().batch_count, 3);
    }

    #[test]
    fn triggers_display() {
        assert_eq!(RecomputeTrigger::ModeChanged.to_string(), "mode changed");
    }
}
