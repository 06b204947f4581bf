//! Preload Orchestrator
//!
//! Runs a preload cycle for the signed-in subject: cache the identity, fetch
//! every collection of the role's plan concurrently, reduce each to the
//! records relevant to the subject, and cache the result. One failing
//! collection never fails the others; it is cached empty and reported.
//!
//! ```text
//! Idle ──preload/refresh──▶ Loading ──▶ Completed | CompletedWithFailures ──▶ Idle
//!                             │
//!                             └── concurrent calls return Skipped
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::descriptor::{flatten_records, CollectionDescriptor, FilterContext};
use super::plan::{PreloadPlan, USER_ROLE_KEY};
use super::progress::{ProgressBroadcaster, ProgressEvent, ProgressSubscription};
use crate::cache::CacheManager;
use crate::config::PreloadConfig;
use crate::domain::{DomainEvent, EventPublisher, RecordStore, Role, Subject};
use crate::error::{Error, Result};
use crate::metrics::PreloadMetrics;

// =============================================================================
// Outcome Types
// =============================================================================

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadState {
    Idle,
    Loading,
}

/// How a cycle that ran to completion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every collection loaded
    Completed,
    /// At least one collection failed and was cached empty
    CompletedWithFailures,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::CompletedWithFailures => "completed_with_failures",
        }
    }
}

/// Result of loading one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub key: String,
    pub path: String,
    /// Records read from the remote store
    pub source_records: usize,
    /// Records left after filtering
    pub cached_records: usize,
    /// Why the collection was cached empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionReport {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadReport {
    pub cycle_id: Uuid,
    pub subject_id: String,
    pub role: Role,
    /// Ran through `refresh_data`
    pub forced: bool,
    pub outcome: CycleOutcome,
    pub collections: Vec<CollectionReport>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PreloadReport {
    pub fn failed_collections(&self) -> impl Iterator<Item = &CollectionReport> {
        self.collections.iter().filter(|c| c.is_failed())
    }

    pub fn collection(&self, key: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.key == key)
    }
}

/// What a preload request did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreloadOutcome {
    /// Another cycle was already running; nothing was fetched
    Skipped,
    /// The cached batch is still fresh; nothing was fetched
    Fresh,
    /// A cycle ran
    Ran(PreloadReport),
}

impl PreloadOutcome {
    pub fn report(&self) -> Option<&PreloadReport> {
        match self {
            PreloadOutcome::Ran(report) => Some(report),
            _ => None,
        }
    }
}

// =============================================================================
// Re-entrancy Guard
// =============================================================================

/// Holds the orchestrator in `Loading` until dropped
struct LoadingGuard<'a> {
    state: &'a Mutex<PreloadState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = PreloadState::Idle;
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Preload orchestrator.
///
/// Construct one per signed-in session at the composition root and share it
/// behind an `Arc`.
pub struct PreloadOrchestrator {
    cache: Arc<CacheManager>,
    records: Arc<dyn RecordStore>,
    events: Arc<dyn EventPublisher>,
    progress: ProgressBroadcaster,
    metrics: PreloadMetrics,
    config: PreloadConfig,
    plans: Vec<PreloadPlan>,
    state: Mutex<PreloadState>,
    last_report: Mutex<Option<PreloadReport>>,
}

impl PreloadOrchestrator {
    /// Create an orchestrator using the built-in plan of every role
    pub fn new(
        cache: Arc<CacheManager>,
        records: Arc<dyn RecordStore>,
        events: Arc<dyn EventPublisher>,
        config: PreloadConfig,
    ) -> Result<Self> {
        Ok(Self {
            cache,
            records,
            events,
            progress: ProgressBroadcaster::new(config.progress_capacity),
            metrics: PreloadMetrics::new()?,
            config,
            plans: Vec::new(),
            state: Mutex::new(PreloadState::Idle),
            last_report: Mutex::new(None),
        })
    }

    /// Replace the built-in plan for `plan.role()`
    pub fn with_plan(mut self, plan: PreloadPlan) -> Self {
        self.plans.retain(|p| p.role() != plan.role());
        self.plans.push(plan);
        self
    }

    /// Plan used for a role
    pub fn plan_for(&self, role: Role) -> PreloadPlan {
        self.plans
            .iter()
            .find(|p| p.role() == role)
            .cloned()
            .unwrap_or_else(|| PreloadPlan::for_role(role))
    }

    /// Load the subject's own record from the role's directory.
    pub async fn load_subject(&self, role: Role, id: &str) -> Result<Subject> {
        let path = format!("{}/{}", role.directory_path(), id);
        match self.records.read_once(&path).await {
            Ok(Some(record @ Value::Object(_))) => Ok(Subject::new(id, role, record)),
            Ok(Some(_)) => Err(Error::SubjectUnavailable {
                id: id.to_string(),
                reason: format!("record at {} is not an object", path),
            }),
            Ok(None) => Err(Error::SubjectUnavailable {
                id: id.to_string(),
                reason: format!("no record at {}", path),
            }),
            Err(e) => Err(Error::SubjectUnavailable {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Run a preload cycle unless one is running or the cache is fresh.
    #[instrument(skip(self, subject), fields(subject_id = %subject.id, role = %subject.role))]
    pub async fn preload_all_data(&self, subject: &Subject) -> PreloadOutcome {
        let Some(_guard) = self.try_begin() else {
            return self.skip(subject, "preload already in progress").await;
        };

        let plan = self.plan_for(subject.role);
        let owned = self.evict_other_owner(subject).await;
        if owned && self.cache.restore_freshness().await {
            debug!("Cached data is fresh, not refetching");
            self.progress
                .emit(ProgressEvent::complete(plan.total_steps(), "Cached data is fresh"));
            self.metrics.record_cycle("fresh");
            self.publish(DomainEvent::preload_skipped(&subject.id, "cache is fresh"))
                .await;
            return PreloadOutcome::Fresh;
        }

        self.run_cycle(subject, &plan, false).await
    }

    /// Invalidate every key of the subject's plan and run a cycle regardless
    /// of freshness.
    #[instrument(skip(self, subject), fields(subject_id = %subject.id, role = %subject.role))]
    pub async fn refresh_data(&self, subject: &Subject) -> PreloadOutcome {
        let Some(_guard) = self.try_begin() else {
            return self.skip(subject, "preload already in progress").await;
        };

        self.evict_other_owner(subject).await;
        let plan = self.plan_for(subject.role);
        let keys = plan.keys();
        self.cache.invalidate(keys.iter().cloned());
        self.publish(DomainEvent::cache_invalidated(keys)).await;

        self.run_cycle(subject, &plan, true).await
    }

    /// Read a cached value
    pub async fn get_cached_data(&self, key: &str) -> Option<Value> {
        self.cache.get(key).await
    }

    /// Read and deserialize a cached value
    pub async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache.get_as(key).await
    }

    /// Drop every cached key of every role, in memory and durably.
    ///
    /// Waits until the durable removals have been applied.
    pub async fn clear_cache(&self) {
        let keys = self.all_plan_keys();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.cache.clear(&refs);
        self.cache.flush().await;
        *self.last_report.lock() = None;

        info!(keys = keys.len(), "Cleared cached data");
        self.publish(DomainEvent::cache_invalidated(keys)).await;
    }

    /// Subscribe to progress events
    pub fn subscribe_progress(&self) -> ProgressSubscription {
        self.progress.subscribe()
    }

    pub fn state(&self) -> PreloadState {
        *self.state.lock()
    }

    /// Report of the latest cycle that ran in this process
    pub fn last_report(&self) -> Option<PreloadReport> {
        self.last_report.lock().clone()
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn metrics(&self) -> &PreloadMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    // =========================================================================
    // Cycle
    // =========================================================================

    fn try_begin(&self) -> Option<LoadingGuard<'_>> {
        let mut state = self.state.lock();
        if *state == PreloadState::Loading {
            return None;
        }
        *state = PreloadState::Loading;
        Some(LoadingGuard { state: &self.state })
    }

    /// Every key any role's plan writes, without duplicates
    fn all_plan_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for role in [Role::Student, Role::Teacher, Role::Parent, Role::Admin] {
            for key in self.plan_for(role).keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Role and id of the subject the cached batch was written for
    async fn cached_owner(&self) -> Option<(Role, String)> {
        let role: Role = self.cache.get(USER_ROLE_KEY).await?.as_str()?.parse().ok()?;
        let identity = self.cache.get(self.plan_for(role).identity_key()).await?;
        let id = identity.get("id")?.as_str()?.to_string();
        Some((role, id))
    }

    /// Drop a batch cached for a different subject. Returns whether the
    /// cached batch belongs to `subject`.
    async fn evict_other_owner(&self, subject: &Subject) -> bool {
        match self.cached_owner().await {
            Some((role, id)) if role == subject.role && id == subject.id => true,
            Some((role, id)) => {
                info!(
                    "Cached data belongs to {} {}, dropping it for {} {}",
                    role, id, subject.role, subject.id
                );
                let keys = self.all_plan_keys();
                self.cache.invalidate(keys.iter().cloned());
                self.publish(DomainEvent::cache_invalidated(keys)).await;
                false
            }
            None => false,
        }
    }

    async fn skip(&self, subject: &Subject, reason: &str) -> PreloadOutcome {
        debug!(reason, "Preload skipped");
        self.metrics.record_cycle("skipped");
        self.publish(DomainEvent::preload_skipped(&subject.id, reason))
            .await;
        PreloadOutcome::Skipped
    }

    async fn run_cycle(&self, subject: &Subject, plan: &PreloadPlan, forced: bool) -> PreloadOutcome {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let total = plan.total_steps();

        info!(
            "Preload cycle {} started for {} {} ({} collections)",
            cycle_id,
            subject.role,
            subject.id,
            plan.collections().len()
        );

        self.progress.emit(ProgressEvent::new(
            1,
            total,
            format!("Loading {} profile", subject.role),
        ));
        self.publish(DomainEvent::PreloadStarted {
            cycle_id,
            subject_id: subject.id.clone(),
            role: subject.role.to_string(),
            collections: plan.collections().iter().map(|c| c.key.clone()).collect(),
            forced,
            timestamp: Utc::now(),
        })
        .await;

        // Identity first, so the session survives even if every fetch fails.
        self.cache.set(plan.identity_key(), subject.identity());
        self.cache.set(USER_ROLE_KEY, Value::from(subject.role.as_str()));

        let ctx = FilterContext::for_subject(subject);
        let finished = AtomicUsize::new(0);
        let collections = join_all(
            plan.collections()
                .iter()
                .map(|c| self.load_collection(cycle_id, &ctx, c, total, &finished)),
        )
        .await;

        let failed = collections.iter().filter(|c| c.is_failed()).count();
        let outcome = if failed == 0 {
            CycleOutcome::Completed
        } else {
            CycleOutcome::CompletedWithFailures
        };
        let duration = started.elapsed();

        self.metrics.record_cycle(outcome.as_str());
        self.metrics.observe_cycle_duration(duration.as_secs_f64());
        self.publish(DomainEvent::PreloadCompleted {
            cycle_id,
            failed_collections: failed,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        })
        .await;

        let message = if failed == 0 {
            "All data loaded".to_string()
        } else {
            format!("Loaded with {} failed collection(s)", failed)
        };
        self.progress.emit(ProgressEvent::complete(total, message));

        info!(
            "Preload cycle {} finished in {:?}: {} ({} failed)",
            cycle_id,
            duration,
            outcome.as_str(),
            failed
        );

        let report = PreloadReport {
            cycle_id,
            subject_id: subject.id.clone(),
            role: subject.role,
            forced,
            outcome,
            collections,
            started_at,
            duration_ms: duration.as_millis() as u64,
        };
        *self.last_report.lock() = Some(report.clone());
        PreloadOutcome::Ran(report)
    }

    async fn load_collection(
        &self,
        cycle_id: Uuid,
        ctx: &FilterContext,
        descriptor: &CollectionDescriptor,
        total: usize,
        finished: &AtomicUsize,
    ) -> CollectionReport {
        let report = match self.records.read_once(&descriptor.path).await {
            Ok(snapshot) => {
                let records = snapshot.as_ref().map(flatten_records).unwrap_or_default();
                let selected = descriptor
                    .select(ctx, &records, self.config.chunk_size)
                    .await;
                let cached = selected.len();

                self.cache.set(descriptor.key.clone(), Value::Array(selected));
                self.metrics.set_cached_records(&descriptor.key, cached);
                debug!(
                    key = %descriptor.key,
                    source = records.len(),
                    cached,
                    "Collection cached"
                );
                self.publish(DomainEvent::collection_cached(
                    cycle_id,
                    &descriptor.key,
                    records.len(),
                    cached,
                ))
                .await;

                CollectionReport {
                    key: descriptor.key.clone(),
                    path: descriptor.path.clone(),
                    source_records: records.len(),
                    cached_records: cached,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    "Failed to load {} from {}, caching empty list: {}",
                    descriptor.key, descriptor.path, e
                );
                self.cache.set(descriptor.key.clone(), Value::Array(Vec::new()));
                self.metrics.record_collection_failure(&descriptor.key);
                self.metrics.set_cached_records(&descriptor.key, 0);
                self.publish(DomainEvent::collection_failed(
                    cycle_id,
                    &descriptor.key,
                    &descriptor.path,
                    e.to_string(),
                ))
                .await;

                CollectionReport {
                    key: descriptor.key.clone(),
                    path: descriptor.path.clone(),
                    source_records: 0,
                    cached_records: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        let step = finished.fetch_add(1, Ordering::SeqCst) + 2;
        let message = match &report.error {
            None => format!("Loaded {}", report.key),
            Some(_) => format!("Failed to load {}", report.key),
        };
        self.progress.emit(ProgressEvent::new(step, total, message));

        report
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(event).await {
            debug!(error = %e, "Failed to publish domain event");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
