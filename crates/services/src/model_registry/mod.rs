//! Process-wide catalog of the models published by every upstream
//!
//! Readers load an immutable [`RegistrySnapshot`] through `ArcSwap` and never
//! wait on a refresh. A refresh lists every provider in parallel, builds a
//! fresh snapshot off to the side and publishes it with a single store.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use config::ModelPinConfig;
use futures::future::join_all;
use inference_providers::{ModelInfo, ProviderClient, ProviderId};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::CredentialResolver;

/// A model as exposed to gateway clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEntry {
    /// Public model id
    pub id: String,
    pub provider: ProviderId,
    /// Id used on the wire to the provider
    pub upstream_id: String,
    pub owned_by: String,
    pub created: i64,
}

impl ModelEntry {
    fn from_listing(provider: ProviderId, model: ModelInfo) -> Self {
        let owned_by = if model.owned_by.is_empty() {
            provider.to_string()
        } else {
            model.owned_by
        };
        Self {
            upstream_id: model.id.clone(),
            id: model.id,
            provider,
            owned_by,
            created: model.created,
        }
    }

    pub fn binding(&self) -> ProviderBinding {
        ProviderBinding {
            public_id: self.id.clone(),
            provider: self.provider,
            upstream_id: self.upstream_id.clone(),
        }
    }
}

/// Where a public model id is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBinding {
    pub public_id: String,
    pub provider: ProviderId,
    pub upstream_id: String,
}

/// A config-pinned binding that wins over collision priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPin {
    pub model: String,
    pub provider: ProviderId,
    pub upstream_id: String,
}

impl TryFrom<&ModelPinConfig> for ModelPin {
    type Error = RegistryError;

    fn try_from(pin: &ModelPinConfig) -> Result<Self, Self::Error> {
        let provider = pin
            .provider
            .parse()
            .map_err(|e: String| RegistryError::InvalidPin(format!("{}: {e}", pin.model)))?;
        Ok(Self {
            model: pin.model.clone(),
            provider,
            upstream_id: pin.upstream_id.clone(),
        })
    }
}

/// Outcome of the latest listing attempt for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub last_error: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub model_count: usize,
}

/// Immutable registry view, valid until the next refresh
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    entries: BTreeMap<String, ModelEntry>,
    /// Every provider's own listing, kept so a failed refresh can reuse it
    per_provider: HashMap<ProviderId, Vec<ModelEntry>>,
    health: HashMap<ProviderId, ProviderHealth>,
}

impl RegistrySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resolve(&self, model_id: &str) -> Option<ProviderBinding> {
        self.entries.get(model_id).map(ModelEntry::binding)
    }

    /// All entries, ordered by public id
    pub fn list(&self) -> Vec<ModelEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn health(&self, provider: ProviderId) -> Option<&ProviderHealth> {
        self.health.get(&provider)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("All providers failed to list models: {0}")]
    AllProvidersFailed(String),
    #[error("Invalid model pin {0}")]
    InvalidPin(String),
}

/// Registry tuning, usually taken from `RegistryConfig`
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub provider_timeout: Duration,
    /// Collision priority, highest first
    pub priority: Vec<ProviderId>,
    pub pins: Vec<ModelPin>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(5),
            priority: ProviderId::ALL.to_vec(),
            pins: Vec::new(),
        }
    }
}

/// Parse a configured priority list, appending providers it does not name
pub fn parse_priority(names: &[String]) -> Result<Vec<ProviderId>, String> {
    let mut priority = Vec::with_capacity(ProviderId::ALL.len());
    for name in names {
        let provider: ProviderId = name.parse()?;
        if !priority.contains(&provider) {
            priority.push(provider);
        }
    }
    for provider in ProviderId::ALL {
        if !priority.contains(&provider) {
            priority.push(provider);
        }
    }
    Ok(priority)
}

pub struct ModelRegistry {
    /// Configured clients, sorted by collision priority
    clients: Vec<Arc<dyn ProviderClient>>,
    credentials: Arc<CredentialResolver>,
    settings: RegistrySettings,
    snapshot: ArcSwap<RegistrySnapshot>,
    /// One refresh at a time
    refresh_lock: Mutex<()>,
    refresh_task_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl ModelRegistry {
    pub fn new(
        clients: Vec<Arc<dyn ProviderClient>>,
        credentials: Arc<CredentialResolver>,
        settings: RegistrySettings,
    ) -> Self {
        let mut clients = clients;
        clients.sort_by_key(|client| {
            settings
                .priority
                .iter()
                .position(|p| *p == client.provider())
                .unwrap_or(usize::MAX)
        });
        Self {
            clients,
            credentials,
            settings,
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            refresh_lock: Mutex::new(()),
            refresh_task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Current snapshot; cheap and never blocks
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    pub fn resolve(&self, model_id: &str) -> Option<ProviderBinding> {
        self.snapshot.load().resolve(model_id)
    }

    pub fn list(&self) -> Vec<ModelEntry> {
        self.snapshot.load().list()
    }

    pub fn client(&self, provider: ProviderId) -> Option<Arc<dyn ProviderClient>> {
        self.clients
            .iter()
            .find(|client| client.provider() == provider)
            .cloned()
    }

    /// Configured providers in collision priority order
    pub fn providers(&self) -> Vec<ProviderId> {
        self.clients.iter().map(|c| c.provider()).collect()
    }

    pub fn credentials(&self) -> &Arc<CredentialResolver> {
        &self.credentials
    }

    /// Re-list every provider and publish a new snapshot
    ///
    /// Providers that fail keep their previous entries. The new snapshot is
    /// published even when every provider failed, so health stays current;
    /// that case is also reported as an error.
    pub async fn refresh(&self) -> Result<(), RegistryError> {
        let _guard = self.refresh_lock.lock().await;
        let prior = self.snapshot.load_full();
        let timeout = self.settings.provider_timeout;

        let listings = join_all(self.clients.iter().map(|client| {
            let provider = client.provider();
            let api_key = self.credentials.process_default(provider);
            async move {
                let key = api_key.as_ref().map(|c| c.expose());
                let result = match tokio::time::timeout(timeout, client.get_models(key)).await {
                    Ok(Ok(models)) => Ok(models),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("listing timed out after {}s", timeout.as_secs_f64())),
                };
                (provider, result)
            }
        }))
        .await;

        let checked_at = Utc::now();
        let mut per_provider = HashMap::new();
        let mut health = HashMap::new();
        let mut failures = Vec::new();

        for (provider, result) in listings {
            match result {
                Ok(models) => {
                    let entries: Vec<ModelEntry> = models
                        .into_iter()
                        .map(|m| ModelEntry::from_listing(provider, m))
                        .collect();
                    debug!(provider = %provider, models = entries.len(), "Provider listing refreshed");
                    health.insert(
                        provider,
                        ProviderHealth {
                            healthy: true,
                            last_error: None,
                            checked_at: Some(checked_at),
                            model_count: entries.len(),
                        },
                    );
                    per_provider.insert(provider, entries);
                }
                Err(error) => {
                    let retained = prior
                        .per_provider
                        .get(&provider)
                        .cloned()
                        .unwrap_or_default();
                    warn!(
                        provider = %provider,
                        error = %error,
                        retained = retained.len(),
                        "Provider listing failed, keeping previous entries"
                    );
                    health.insert(
                        provider,
                        ProviderHealth {
                            healthy: false,
                            last_error: Some(error.clone()),
                            checked_at: Some(checked_at),
                            model_count: retained.len(),
                        },
                    );
                    failures.push(format!("{provider}: {error}"));
                    per_provider.insert(provider, retained);
                }
            }
        }

        let entries = self.merge(&per_provider);
        let next = RegistrySnapshot {
            generation: prior.generation + 1,
            entries,
            per_provider,
            health,
        };
        info!(
            generation = next.generation,
            models = next.len(),
            failed_providers = failures.len(),
            "Model registry refreshed"
        );
        self.snapshot.store(Arc::new(next));

        if !self.clients.is_empty() && failures.len() == self.clients.len() {
            return Err(RegistryError::AllProvidersFailed(failures.join("; ")));
        }
        Ok(())
    }

    /// First provider in priority order wins a public id, then pins override
    fn merge(
        &self,
        per_provider: &HashMap<ProviderId, Vec<ModelEntry>>,
    ) -> BTreeMap<String, ModelEntry> {
        let mut entries: BTreeMap<String, ModelEntry> = BTreeMap::new();
        for client in &self.clients {
            let provider = client.provider();
            for entry in per_provider.get(&provider).into_iter().flatten() {
                if let Some(existing) = entries.get(&entry.id) {
                    debug!(
                        model_id = %entry.id,
                        winner = %existing.provider,
                        loser = %provider,
                        "Model id collision resolved by priority"
                    );
                    continue;
                }
                entries.insert(entry.id.clone(), entry.clone());
            }
        }

        for pin in &self.settings.pins {
            if self.client(pin.provider).is_none() {
                warn!(
                    model_id = %pin.model,
                    provider = %pin.provider,
                    "Ignoring model pin for unconfigured provider"
                );
                continue;
            }
            let listed = per_provider
                .get(&pin.provider)
                .and_then(|models| models.iter().find(|m| m.upstream_id == pin.upstream_id));
            entries.insert(
                pin.model.clone(),
                ModelEntry {
                    id: pin.model.clone(),
                    provider: pin.provider,
                    upstream_id: pin.upstream_id.clone(),
                    owned_by: listed
                        .map(|m| m.owned_by.clone())
                        .unwrap_or_else(|| pin.provider.to_string()),
                    created: listed.map(|m| m.created).unwrap_or_default(),
                },
            );
        }
        entries
    }

    /// Start the periodic refresh task
    ///
    /// The first tick fires after one full interval; the boot refresh is
    /// expected to have run already.
    pub async fn start_refresh_task(self: Arc<Self>, refresh_interval: Duration) {
        let handle = tokio::spawn({
            let registry = self.clone();
            async move {
                let start = tokio::time::Instant::now() + refresh_interval;
                let mut interval = tokio::time::interval_at(start, refresh_interval);
                loop {
                    interval.tick().await;
                    debug!("Running periodic model registry refresh");
                    if let Err(e) = registry.refresh().await {
                        warn!(error = %e, "Model registry refresh failed, will retry on next interval");
                    }
                }
            }
        });

        let mut task_handle = self.refresh_task_handle.lock().await;
        if let Some(previous) = task_handle.replace(handle) {
            previous.abort();
        }
        info!(
            "Model registry refresh task started with interval: {} seconds",
            refresh_interval.as_secs()
        );
    }

    /// Stop the refresh task; the last snapshot stays readable
    pub async fn shutdown(&self) {
        let mut task_handle = self.refresh_task_handle.lock().await;
        if let Some(handle) = task_handle.take() {
            handle.abort();
            info!("Model registry refresh task cancelled");
        } else {
            debug!("No active refresh task to cancel");
        }
    }
}
