// ABOUTME: Patient record facade: cache check, primary read, concurrent fan-out of four collections
// ABOUTME: Also carries the fire-and-forget write path and the interactive login delegates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use fhir_connector_core::constants::cache::TTL_PATIENT_BUNDLE_SECS;
use fhir_connector_core::constants::fhir::{
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, PARAM_COUNT, PARAM_PATIENT, PARAM_SORT,
};
use fhir_connector_core::errors::{ConnectorResult, FailureKind};
use fhir_connector_core::{
    Condition, Encounter, MedicationRequest, Observation, Patient, PatientBundle, ResourceKind,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::PatientCache;
use crate::config::ConnectorConfig;
use crate::oauth2_client::{
    with_credential_override, AuthorizationRequest, AuthorizationUrl, CredentialContext,
    SmartAuthClient,
};
use crate::providers::{
    resolve_link, FhirResource, RequestSpec, ResilientRequester, ResourceFetcher,
    ResourceNormalizer,
};

/// Record assembly settings
#[derive(Debug, Clone)]
pub struct RecordServiceConfig {
    /// Lifetime of an assembled bundle; `None` caches without expiry
    pub bundle_ttl: Option<Duration>,
    /// `_count` sent on the first page of each collection search
    pub page_size: u32,
    /// Upper bound on pages followed per collection
    pub max_pages: usize,
    /// Share one fetch between concurrent misses for the same patient
    pub coalesce_concurrent_fetches: bool,
}

impl Default for RecordServiceConfig {
    fn default() -> Self {
        Self {
            bundle_ttl: Some(Duration::from_secs(TTL_PATIENT_BUNDLE_SECS)),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            coalesce_concurrent_fetches: false,
        }
    }
}

/// Assembles, caches and serves normalized patient records
pub struct PatientRecordService {
    auth: Arc<SmartAuthClient>,
    fetcher: ResourceFetcher,
    cache: PatientCache,
    config: RecordServiceConfig,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl PatientRecordService {
    /// Connect to the configured server (running discovery) and build the service
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP session cannot be built
    pub async fn connect(config: ConnectorConfig) -> ConnectorResult<Self> {
        let auth = SmartAuthClient::connect(config).await?;
        Ok(Self::new(Arc::new(auth)))
    }

    /// Build the service on an existing auth client
    ///
    /// Cache and record settings come from the client's configuration. A cache
    /// with background cleanup enabled must be created inside a tokio runtime.
    #[must_use]
    pub fn new(auth: Arc<SmartAuthClient>) -> Self {
        let config = auth.config();
        let requester = ResilientRequester::with_policy(Arc::clone(&auth), config.retry);
        let fetcher = ResourceFetcher::new(
            requester,
            ResourceNormalizer::for_vendor(config.vendor),
            config.normalized_base_url(),
        )
        .with_max_pages(config.record.max_pages);
        let cache = PatientCache::new(&config.cache);
        let record = config.record.clone();

        Self {
            auth,
            fetcher,
            cache,
            config: record,
            inflight: DashMap::new(),
        }
    }

    /// Override record settings
    #[must_use]
    pub fn with_record_config(mut self, config: RecordServiceConfig) -> Self {
        self.fetcher = self.fetcher.with_max_pages(config.max_pages);
        self.config = config;
        self
    }

    /// Replace the bundle cache, e.g. to share one between services
    #[must_use]
    pub fn with_cache(mut self, cache: PatientCache) -> Self {
        self.cache = cache;
        self
    }

    /// Auth client backing this service
    #[must_use]
    pub const fn auth(&self) -> &Arc<SmartAuthClient> {
        &self.auth
    }

    /// Bundle cache
    #[must_use]
    pub const fn cache(&self) -> &PatientCache {
        &self.cache
    }

    /// Requester used for every resource call
    #[must_use]
    pub const fn requester(&self) -> &ResilientRequester {
        self.fetcher.requester()
    }

    /// Record settings in effect
    #[must_use]
    pub const fn record_config(&self) -> &RecordServiceConfig {
        &self.config
    }

    /// Serve a patient's record from cache, or assemble it from the server
    ///
    /// On a miss the primary `Patient` read is followed by four concurrent
    /// collection searches joined together. Every collection runs to
    /// completion even when another fails; the first failure (in collection
    /// order) is returned and nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns a permission error for missing credentials or scopes, and a
    /// request failure tagged with the failing kind and the patient id
    #[instrument(skip(self))]
    pub async fn fetch_patient_record(&self, patient_id: &str) -> ConnectorResult<Arc<PatientBundle>> {
        if let Some(bundle) = self.cache.get(patient_id).await {
            debug!("Serving patient record from cache");
            return Ok(bundle);
        }

        if !self.config.coalesce_concurrent_fetches {
            return self.assemble_and_store(patient_id).await;
        }

        let slot = InflightSlot::claim(&self.inflight, patient_id);
        let _guard = slot.lock.lock().await;
        match self.cache.get(patient_id).await {
            Some(bundle) => {
                debug!("Concurrent fetch already populated the cache");
                Ok(bundle)
            }
            None => self.assemble_and_store(patient_id).await,
        }
    }

    /// Patients with a coalesced fetch currently registered
    #[must_use]
    pub fn inflight_fetches(&self) -> usize {
        self.inflight.len()
    }

    /// Same as [`Self::fetch_patient_record`] but authenticated with `credentials`
    /// for this call only
    ///
    /// # Errors
    ///
    /// Everything [`Self::fetch_patient_record`] returns
    pub async fn fetch_patient_record_with(
        &self,
        credentials: CredentialContext,
        patient_id: &str,
    ) -> ConnectorResult<Arc<PatientBundle>> {
        with_credential_override(credentials, self.fetch_patient_record(patient_id)).await
    }

    async fn assemble_and_store(&self, patient_id: &str) -> ConnectorResult<Arc<PatientBundle>> {
        let bundle = Arc::new(self.assemble(patient_id).await?);
        self.cache
            .put(patient_id, Arc::clone(&bundle), self.config.bundle_ttl)
            .await;
        info!(
            entries = bundle.entry_count(),
            "Assembled and cached patient record"
        );
        Ok(bundle)
    }

    async fn assemble(&self, patient_id: &str) -> ConnectorResult<PatientBundle> {
        self.auth.ensure_valid_token().await?;

        let patient = self.fetch_patient(patient_id).await?;

        let (conditions, medications, observations, encounters) = tokio::join!(
            self.fetch_collection::<Condition>(patient_id),
            self.fetch_collection::<MedicationRequest>(patient_id),
            self.fetch_collection::<Observation>(patient_id),
            self.fetch_collection::<Encounter>(patient_id),
        );

        Ok(PatientBundle {
            patient,
            conditions: conditions?,
            medications: medications?,
            observations: observations?,
            encounters: encounters?,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_patient(&self, patient_id: &str) -> ConnectorResult<Patient> {
        let result = async {
            self.requester().require_scopes(&[ResourceKind::Patient]).await?;
            self.fetcher.fetch_one::<Patient>(patient_id, patient_id).await
        }
        .await;

        result.map_err(|e| {
            let e = e.with_kind(FailureKind::PatientFetchFailed, patient_id);
            error!(error = %e, "Primary patient read failed");
            e
        })
    }

    async fn fetch_collection<T: FhirResource>(&self, patient_id: &str) -> ConnectorResult<Vec<T>> {
        let kind = T::KIND;
        let result = async {
            self.requester().require_scopes(&[kind]).await?;
            self.fetcher
                .fetch_all::<T>(
                    kind.resource_type(),
                    self.search_params(kind, patient_id),
                    patient_id,
                )
                .await
        }
        .await;

        match result {
            Ok(items) => {
                debug!(resource_type = %kind, count = items.len(), "Fetched collection");
                Ok(items)
            }
            Err(e) => {
                let e = e.with_kind(FailureKind::for_resource(kind), patient_id);
                error!(resource_type = %kind, error = %e, "Collection fetch failed");
                Err(e)
            }
        }
    }

    fn search_params(&self, kind: ResourceKind, patient_id: &str) -> Vec<(String, String)> {
        let mut params = vec![
            (PARAM_PATIENT.to_owned(), patient_id.to_owned()),
            (PARAM_COUNT.to_owned(), self.config.page_size.to_string()),
        ];
        if matches!(kind, ResourceKind::Observation | ResourceKind::Encounter) {
            params.push((PARAM_SORT.to_owned(), "-date".to_owned()));
        }
        params.extend(
            self.fetcher
                .normalizer()
                .dialect()
                .search_params(kind)
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned())),
        );
        params
    }

    /// Drop one cached record, or all of them
    pub async fn invalidate(&self, patient_id: Option<&str>) {
        self.cache.invalidate(patient_id).await;
        match patient_id {
            Some(id) => info!(patient_id = id, "Invalidated cached patient record"),
            None => info!("Invalidated all cached patient records"),
        }
    }

    /// Create a resource on the server without ever failing the caller
    ///
    /// Sent once: a write is never replayed after a transient failure, so the
    /// server cannot end up with duplicates. Returns the server's response body (`Value::Null` when it sent none),
    /// or `None` when the write failed for any reason. Failures are logged.
    pub async fn submit_resource(&self, resource_type: &str, body: Value) -> Option<Value> {
        let url = resolve_link(self.fetcher.base_url(), resource_type);
        let spec = RequestSpec::post(url).json(body).max_attempts(1);
        let response = match self.requester().request(spec).await {
            Ok(response) => response,
            Err(e) => {
                warn!(resource_type, error = %e, "Resource submission failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(resource_type, status = status.as_u16(), "Resource submission rejected");
            return None;
        }

        match response.text().await {
            Ok(text) if text.trim().is_empty() => Some(Value::Null),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(resource_type, error = %e, "Resource submission returned invalid JSON");
                    None
                }
            },
            Err(e) => {
                warn!(resource_type, error = %e, "Resource submission response could not be read");
                None
            }
        }
    }

    /// Start an interactive SMART login
    ///
    /// # Errors
    ///
    /// See [`SmartAuthClient::build_authorization_url`]
    pub async fn build_authorization_url(
        &self,
        request: AuthorizationRequest,
    ) -> ConnectorResult<AuthorizationUrl> {
        self.auth.build_authorization_url(request).await
    }

    /// Finish an interactive SMART login
    ///
    /// # Errors
    ///
    /// See [`SmartAuthClient::complete_authorization`]
    pub async fn complete_authorization(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: Option<&str>,
    ) -> ConnectorResult<CredentialContext> {
        self.auth
            .complete_authorization(code, redirect_uri, verifier)
            .await
    }
}

/// One caller's share of a patient's coalescing lock
///
/// Dropping the last share removes the registry entry, including when the
/// owning fetch is cancelled mid-flight.
struct InflightSlot<'a> {
    registry: &'a DashMap<String, Arc<Mutex<()>>>,
    patient_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn claim(registry: &'a DashMap<String, Arc<Mutex<()>>>, patient_id: &'a str) -> Self {
        let lock = Arc::clone(registry.entry(patient_id.to_owned()).or_default().value());
        Self {
            registry,
            patient_id,
            lock,
        }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // Registry plus this slot
        self.registry
            .remove_if(self.patient_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

impl fmt::Debug for PatientRecordService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatientRecordService")
            .field("base_url", &self.fetcher.base_url())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("inflight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}

