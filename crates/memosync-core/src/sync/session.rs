//! One user's sync session: fetch, merge, cache and push.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use super::calendar::merge_calendar;
use super::canonical::ContentDigest;
use super::fingerprint::{Fingerprint, FingerprintStore};
use super::guard::{Admission, CycleGuard};
use super::merge::merge_collection;
use super::metadata::{SyncMetadataTracker, SyncStrategy};
use super::remote::RemoteStore;
use super::settings::{
    macros_document, macros_from_document, merge_macros, merge_settings, MACROS_DOC_ID,
    MACROS_ITEM_TYPE, SETTINGS_DOC_ID, SETTINGS_ITEM_TYPE,
};
use crate::config::SyncEngineConfig;
use crate::error::{Error, Result};
use crate::models::{Calendar, DataShape, DataType, Entity, SyncConflict, SCHEDULES_FIELD};
use crate::store::{KeyValueStore, LocalCache};
use crate::util::unix_millis_now;

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub data_type: DataType,
    /// True when the cycle was skipped because the previous one was too recent
    pub skipped: bool,
    /// Entities (or days) in the reconciled result
    pub merged: usize,
    pub conflicts: Vec<SyncConflict>,
    pub kept_local: Vec<String>,
    pub dropped: Vec<String>,
    /// Documents written back during the cycle
    pub pushed: usize,
    pub synced_at: Option<i64>,
}

impl CycleReport {
    fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            skipped: false,
            merged: 0,
            conflicts: Vec::new(),
            kept_local: Vec::new(),
            dropped: Vec::new(),
            pushed: 0,
            synced_at: None,
        }
    }

    fn skipped(data_type: DataType) -> Self {
        Self {
            skipped: true,
            ..Self::new(data_type)
        }
    }
}

/// Result of a single push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushOutcome {
    /// Written remotely and fingerprinted
    Written,
    /// Already identical to the last successful write
    Unchanged,
}

/// Result of a pending-upload sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

/// Sync engine bound to one user, one local store and one remote.
pub struct SyncSession<S, R> {
    user_id: String,
    store: S,
    remote: R,
    config: SyncEngineConfig,
    guard: CycleGuard,
}

impl<S: KeyValueStore, R: RemoteStore> SyncSession<S, R> {
    pub fn new(
        user_id: impl Into<String>,
        store: S,
        remote: R,
        config: SyncEngineConfig,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("User id must not be empty".to_string()));
        }
        config.validate()?;
        let guard = CycleGuard::new(config.cycle_cooldown());
        Ok(Self {
            user_id,
            store,
            remote,
            config,
            guard,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub const fn fingerprints(&self) -> FingerprintStore<'_, S> {
        FingerprintStore::new(&self.store)
    }

    pub fn cache(&self) -> LocalCache<'_, S> {
        LocalCache::new(&self.store, &self.user_id)
    }

    pub fn metadata(&self) -> SyncMetadataTracker<'_, S> {
        SyncMetadataTracker::new(&self.store, &self.user_id, self.config.thresholds())
    }

    /// Reconcile one data type with the remote store.
    ///
    /// Fetches the remote snapshot, merges it with the local cache, saves the
    /// result back to the cache and records the sync time. Fails with
    /// [`Error::CycleInProgress`] while another cycle for the same data type
    /// runs; returns a skipped report within the configured cooldown.
    pub async fn reconcile(&self, data_type: DataType) -> Result<CycleReport> {
        let _permit = match self.guard.try_begin(data_type)? {
            Admission::Admitted(permit) => permit,
            Admission::CoolingDown => {
                tracing::debug!(%data_type, "Skipping sync cycle within cooldown");
                return Ok(CycleReport::skipped(data_type));
            }
        };

        let mut report = match data_type.shape() {
            DataShape::Collection => self.reconcile_collection(data_type).await?,
            DataShape::Calendar => self.reconcile_calendar().await?,
            DataShape::Settings => self.reconcile_settings().await?,
            DataShape::Macros => self.reconcile_macros().await?,
        };

        let synced_at = unix_millis_now();
        self.metadata().set_local_timestamp(data_type, synced_at)?;
        report.synced_at = Some(synced_at);

        tracing::info!(
            %data_type,
            merged = report.merged,
            conflicts = report.conflicts.len(),
            dropped = report.dropped.len(),
            "Sync cycle complete"
        );
        Ok(report)
    }

    /// Reconcile every data type in sync order, continuing past failures.
    pub async fn reconcile_all(&self) -> Vec<(DataType, Result<CycleReport>)> {
        let mut results = Vec::with_capacity(DataType::ALL.len());
        for data_type in DataType::ALL {
            let result = self.reconcile(data_type).await;
            if let Err(error) = &result {
                tracing::warn!(%data_type, "Sync cycle failed: {error}");
            }
            results.push((data_type, result));
        }
        results
    }

    async fn reconcile_collection(&self, data_type: DataType) -> Result<CycleReport> {
        let remote = self.remote.fetch_collection(&self.user_id, data_type).await?;
        let cache = self.cache();
        let local = cache.load_collection(data_type)?;

        let merge = merge_collection(remote, local, data_type.item_type(), &self.fingerprints())?;
        cache.save_collection(data_type, &merge.merged)?;
        let live_ids: Vec<String> = merge
            .merged
            .iter()
            .filter_map(|entity| entity.id().map(Cow::into_owned))
            .collect();
        self.prune_tombstones(data_type, live_ids.iter().map(String::as_str))?;

        let mut report = CycleReport::new(data_type);
        report.merged = merge.merged.len();
        report.conflicts = merge.conflicts;
        report.kept_local = merge.kept_local;
        report.dropped = merge.dropped;
        Ok(report)
    }

    async fn reconcile_calendar(&self) -> Result<CycleReport> {
        let days = self
            .remote
            .fetch_collection(&self.user_id, DataType::Calendar)
            .await?;
        let remote = Calendar::from_day_entities(days);
        let cache = self.cache();
        let local = cache.load_calendar()?;

        let merge = merge_calendar(&remote, &local, &self.fingerprints())?;
        cache.save_calendar(&merge.merged)?;
        self.prune_tombstones(DataType::Calendar, merge.merged.date_keys())?;

        let mut report = CycleReport::new(DataType::Calendar);
        report.merged = merge.merged.len();
        report.kept_local = merge.kept_local;
        report.conflicts = merge.conflicts;
        Ok(report)
    }

    async fn reconcile_settings(&self) -> Result<CycleReport> {
        let remote = self
            .remote
            .fetch_document(&self.user_id, DataType::Settings.as_str())
            .await?
            .map(Entity::from_value)
            .transpose()?;
        let cache = self.cache();
        let local = cache.load_settings()?;

        let mut to_push = None;
        let merged = merge_settings(remote, local, &self.fingerprints(), |settings| {
            to_push = Some(settings.clone());
        })?;
        cache.save_settings(&merged.value)?;

        let mut report = CycleReport::new(DataType::Settings);
        report.merged = 1;
        report.conflicts.extend(merged.conflict);

        if let Some(settings) = to_push {
            match self.push_settings(&settings).await {
                Ok(PushOutcome::Written) => report.pushed += 1,
                Ok(PushOutcome::Unchanged) => {}
                Err(error) => tracing::warn!("Failed to push local settings: {error}"),
            }
        }
        Ok(report)
    }

    async fn reconcile_macros(&self) -> Result<CycleReport> {
        let remote = self
            .remote
            .fetch_document(&self.user_id, DataType::Macros.as_str())
            .await?
            .map(macros_from_document)
            .transpose()?;
        let cache = self.cache();
        let local = cache.load_macros()?;

        let merged = merge_macros(remote, local, &self.fingerprints(), self.config.macro_policy)?;
        cache.save_macros(&merged.value)?;

        let mut report = CycleReport::new(DataType::Macros);
        report.merged = merged.value.len();
        report.conflicts.extend(merged.conflict);
        Ok(report)
    }

    /// Write one collection entity (or calendar day entity) upstream.
    ///
    /// Skips the write when the entity matches its fingerprint. The
    /// fingerprint is recorded only after the remote write succeeded.
    pub async fn push_entity(&self, data_type: DataType, entity: &Entity) -> Result<PushOutcome> {
        let entity_id = entity
            .id()
            .ok_or_else(|| Error::InvalidInput(format!("{data_type} entity has no id")))?;

        match data_type.shape() {
            DataShape::Collection => {
                let item_type = data_type.item_type();
                let fingerprint = self.fingerprints().get(item_type, &entity_id)?;
                if is_current(fingerprint.as_ref(), &ContentDigest::of_entity(entity)) {
                    return Ok(PushOutcome::Unchanged);
                }
                self.write_entity(data_type, &entity_id, entity).await?;
                Ok(PushOutcome::Written)
            }
            DataShape::Calendar => {
                let schedules = match entity.get(SCHEDULES_FIELD) {
                    Some(Value::Array(schedules)) => schedules.as_slice(),
                    _ => &[],
                };
                self.push_calendar_day(&entity_id, schedules).await
            }
            DataShape::Settings | DataShape::Macros => Err(Error::InvalidInput(format!(
                "{data_type} is a single document, not a collection"
            ))),
        }
    }

    pub async fn push_calendar_day(&self, date_key: &str, schedules: &[Value]) -> Result<PushOutcome> {
        let item_type = DataType::Calendar.item_type();
        let fingerprint = self.fingerprints().get(item_type, date_key)?;
        if is_current(fingerprint.as_ref(), &ContentDigest::of_values(schedules)) {
            return Ok(PushOutcome::Unchanged);
        }
        self.write_day(date_key, schedules).await?;
        Ok(PushOutcome::Written)
    }

    pub async fn push_settings(&self, settings: &Entity) -> Result<PushOutcome> {
        let fingerprint = self.fingerprints().get(SETTINGS_ITEM_TYPE, SETTINGS_DOC_ID)?;
        if is_current(fingerprint.as_ref(), &ContentDigest::of_entity(settings)) {
            return Ok(PushOutcome::Unchanged);
        }
        self.remote
            .write_document(
                &self.user_id,
                DataType::Settings.as_str(),
                &settings.clone().into_value(),
            )
            .await?;
        self.fingerprints()
            .record_entity(SETTINGS_ITEM_TYPE, SETTINGS_DOC_ID, settings)?;
        Ok(PushOutcome::Written)
    }

    pub async fn push_macros(&self, macros: &[Value]) -> Result<PushOutcome> {
        let fingerprint = self.fingerprints().get(MACROS_ITEM_TYPE, MACROS_DOC_ID)?;
        if is_current(fingerprint.as_ref(), &ContentDigest::of_values(macros)) {
            return Ok(PushOutcome::Unchanged);
        }
        self.remote
            .write_document(
                &self.user_id,
                DataType::Macros.as_str(),
                &macros_document(macros),
            )
            .await?;
        self.fingerprints()
            .record_values(MACROS_ITEM_TYPE, MACROS_DOC_ID, macros)?;
        Ok(PushOutcome::Written)
    }

    /// Upload everything [`pending_uploads`] reports for `data_type`.
    ///
    /// Write failures are logged and reported, not returned.
    pub async fn push_pending(&self, data_type: DataType) -> Result<PushReport> {
        let mut report = PushReport::default();
        let pending: HashSet<String> = pending_uploads(&self.store, &self.user_id, data_type)?
            .into_iter()
            .collect();
        if pending.is_empty() {
            return Ok(report);
        }
        let cache = self.cache();

        match data_type.shape() {
            DataShape::Collection => {
                for entity in cache.load_collection(data_type)? {
                    let Some(entity_id) = entity.id().map(Cow::into_owned) else {
                        continue;
                    };
                    if !pending.contains(&entity_id) {
                        continue;
                    }
                    let result = self.write_entity(data_type, &entity_id, &entity).await;
                    report.record(entity_id, result);
                }
            }
            DataShape::Calendar => {
                for (date_key, schedules) in cache.load_calendar()?.iter() {
                    if !pending.contains(date_key) {
                        continue;
                    }
                    let result = self.write_day(date_key, schedules).await;
                    report.record(date_key.to_string(), result);
                }
            }
            DataShape::Settings => {
                let result = self.push_settings(&cache.load_settings()?).await;
                report.record_outcome(SETTINGS_DOC_ID, result);
            }
            DataShape::Macros => {
                let result = self.push_macros(&cache.load_macros()?).await;
                report.record_outcome(MACROS_DOC_ID, result);
            }
        }

        if !report.failed.is_empty() {
            tracing::warn!(
                %data_type,
                failed = report.failed.len(),
                "Some pending uploads failed"
            );
        }
        Ok(report)
    }

    /// Delete an entity (or calendar day) upstream, then tombstone its
    /// fingerprint and drop it from the local cache.
    pub async fn delete_entity(&self, data_type: DataType, entity_id: &str) -> Result<()> {
        let cache = self.cache();
        match data_type.shape() {
            DataShape::Collection | DataShape::Calendar => {}
            DataShape::Settings | DataShape::Macros => {
                return Err(Error::InvalidInput(format!(
                    "{data_type} is a single document and cannot be deleted"
                )));
            }
        }

        self.remote
            .delete_entity(&self.user_id, data_type, entity_id)
            .await?;
        self.fingerprints()
            .mark_deleted(data_type.item_type(), entity_id, unix_millis_now())?;

        if data_type.shape() == DataShape::Calendar {
            let mut calendar = cache.load_calendar()?;
            calendar.remove(entity_id);
            cache.save_calendar(&calendar)?;
        } else {
            let mut entities = cache.load_collection(data_type)?;
            entities.retain(|entity| entity.id().as_deref() != Some(entity_id));
            cache.save_collection(data_type, &entities)?;
        }

        tracing::debug!(%data_type, entity_id, "Deleted entity upstream");
        Ok(())
    }

    /// Strategy for login or foreground gating, from the server's last-update times
    pub fn plan(&self, server_timestamps: &BTreeMap<DataType, i64>) -> Result<SyncStrategy> {
        self.metadata().decide_strategy(server_timestamps)
    }

    /// Drop expired tombstones of ids that exist on neither side any more.
    fn prune_tombstones<'a>(
        &self,
        data_type: DataType,
        live_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let live_ids: HashSet<&str> = live_ids.into_iter().collect();
        let cutoff = self.config.tombstone_cutoff(unix_millis_now());
        let pruned =
            self.fingerprints()
                .prune_tombstones(data_type.item_type(), &live_ids, cutoff)?;
        if !pruned.is_empty() {
            tracing::debug!(%data_type, pruned = pruned.len(), "Pruned expired tombstones");
        }
        Ok(())
    }

    async fn write_entity(&self, data_type: DataType, entity_id: &str, entity: &Entity) -> Result<()> {
        self.remote
            .write_entity(&self.user_id, data_type, entity)
            .await?;
        self.fingerprints()
            .record_entity(data_type.item_type(), entity_id, entity)
    }

    async fn write_day(&self, date_key: &str, schedules: &[Value]) -> Result<()> {
        let day = Calendar::day_entity(date_key, schedules);
        self.remote
            .write_entity(&self.user_id, DataType::Calendar, &day)
            .await?;
        self.fingerprints()
            .record_values(DataType::Calendar.item_type(), date_key, schedules)
    }
}

impl PushReport {
    fn record(&mut self, entity_id: String, result: Result<()>) {
        match result {
            Ok(()) => self.written.push(entity_id),
            Err(error) => {
                tracing::warn!(%entity_id, "Upload failed: {error}");
                self.failed.push(entity_id);
            }
        }
    }

    fn record_outcome(&mut self, doc_id: &str, result: Result<PushOutcome>) {
        match result {
            Ok(PushOutcome::Written) => self.written.push(doc_id.to_string()),
            Ok(PushOutcome::Unchanged) => {}
            Err(error) => {
                tracing::warn!(doc_id, "Upload failed: {error}");
                self.failed.push(doc_id.to_string());
            }
        }
    }
}

/// The last write already carries this content
fn is_current(fingerprint: Option<&Fingerprint>, digest: &ContentDigest) -> bool {
    fingerprint.is_some_and(|fingerprint| fingerprint.matches(digest))
}

/// Ids in the local cache of `data_type` that still have to be written upstream.
///
/// An entity is pending when it has no fingerprint or differs from the last
/// successful write. Entities this device deleted upstream are never pending,
/// and an empty settings document or macro list without a fingerprint is not
/// pending either, so a fresh device never overwrites remote data with nothing.
pub fn pending_uploads<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: DataType,
) -> Result<Vec<String>> {
    let cache = LocalCache::new(store, user_id);
    let fingerprints = FingerprintStore::new(store);
    let item_type = data_type.item_type();

    let mut pending = Vec::new();
    match data_type.shape() {
        DataShape::Collection => {
            for entity in cache.load_collection(data_type)? {
                let Some(entity_id) = entity.id().map(Cow::into_owned) else {
                    continue;
                };
                if fingerprints.is_pending(item_type, &entity_id, &ContentDigest::of_entity(&entity))? {
                    pending.push(entity_id);
                }
            }
        }
        DataShape::Calendar => {
            for (date_key, schedules) in cache.load_calendar()?.iter() {
                if fingerprints.is_pending(item_type, date_key, &ContentDigest::of_values(schedules))? {
                    pending.push(date_key.to_string());
                }
            }
        }
        DataShape::Settings => {
            let settings = cache.load_settings()?;
            let never_written = fingerprints.get(SETTINGS_ITEM_TYPE, SETTINGS_DOC_ID)?.is_none();
            if !(settings.fields().is_empty() && never_written)
                && fingerprints.is_pending(
                    SETTINGS_ITEM_TYPE,
                    SETTINGS_DOC_ID,
                    &ContentDigest::of_entity(&settings),
                )?
            {
                pending.push(SETTINGS_DOC_ID.to_string());
            }
        }
        DataShape::Macros => {
            let macros = cache.load_macros()?;
            let never_written = fingerprints.get(MACROS_ITEM_TYPE, MACROS_DOC_ID)?.is_none();
            if !(macros.is_empty() && never_written)
                && fingerprints.is_pending(
                    MACROS_ITEM_TYPE,
                    MACROS_DOC_ID,
                    &ContentDigest::of_values(&macros),
                )?
            {
                pending.push(MACROS_DOC_ID.to_string());
            }
        }
    }
    Ok(pending)
}
