//! Session controller: one content launch with timing, policy and
//! persistence attached.
//!
//! The surface is shared behind a mutex, so content calls are serialized.
//! Its observer (`ControllerHooks`) runs inside each call:
//!   1. Initialized   → start the clock and the commit schedule
//!   2. ValueSet      → completion/mastery policy, then cache if dirty
//!   3. Committed     → snapshot, cache, push progress
//!   4. Terminating   → cancel schedule, total time, cache, push progress
//!                      and the single completion record
//!
//! Pushes are spawned and never awaited inside a call.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rte_kernel::arithmetic::parse_decimal;
use rte_kernel::dialect::{encode_timespan, Dialect};
use rte_kernel::domain::{Element, SessionState};
use rte_kernel::state::{create_initial_store, LaunchContext};
use rte_kernel::store::DataModelStore;
use rte_kernel::surface::{CommitOrigin, RteSurface, SurfaceEvent, SurfaceObserver, TRUE};

use crate::backend::ProgressBackend;
use crate::clock::{elapsed_centis, Clock};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::progress_cache::{CacheJournal, CacheKey, ProgressCache};
use crate::resume::{prepare_launch, ResumeSource};
use crate::scheduler::spawn_commit_schedule;
use crate::sync::{Delivery, SyncStats, Synchronizer};

/// Shared handle to a launch's surface, as exposed to content.
pub type SharedSurface = Arc<Mutex<RteSurface>>;

/// Collaborators a controller is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub config: Arc<RuntimeConfig>,
    pub backend: Arc<dyn ProgressBackend>,
    pub clock: Arc<dyn Clock>,
    pub cache: Option<ProgressCache>,
}

pub struct SessionController {
    launch_id: String,
    surface: SharedSurface,
    sync: Arc<Synchronizer>,
    schedule: CancellationToken,
    resume_source: ResumeSource,
    preferred_dialect: Dialect,
    leaving_timeout: Duration,
}

impl SessionController {
    /// Build the surface for a launch, restoring cached progress if any.
    /// Must be called from within a tokio runtime.
    pub fn launch(
        launch_id: impl Into<String>,
        launch: LaunchContext,
        deps: &SessionDeps,
    ) -> Result<Self, RuntimeError> {
        let launch_id = launch_id.into();
        let runtime = Handle::try_current()?;
        let config = &deps.config;

        let journal = match &deps.cache {
            Some(cache) => Some(
                cache.journal(&CacheKey::new(&launch.learner_id, &launch.content_id))?,
            ),
            None => None,
        };
        let (mut launch, resume_source) = prepare_launch(launch, journal.as_ref());
        launch
            .vendor_extensions
            .extend(config.vendor_extensions.iter().cloned());

        let mastery_threshold = launch
            .mastery_threshold()
            .unwrap_or_else(|| config.mastery_threshold_fixed());
        let store = create_initial_store(&launch)
            .map_err(|(element, code)| RuntimeError::InvalidLaunch { element, code })?;

        let sync = Arc::new(Synchronizer::new(
            launch_id.clone(),
            Arc::clone(&deps.backend),
            config.retry.clone(),
            runtime.clone(),
        ));
        let schedule = CancellationToken::new();

        let surface = Arc::new_cyclic(|weak: &Weak<Mutex<RteSurface>>| {
            let hooks = ControllerHooks {
                surface: weak.clone(),
                runtime,
                clock: Arc::clone(&deps.clock),
                sync: Arc::clone(&sync),
                journal,
                schedule: schedule.clone(),
                commit_interval: config.commit_interval(),
                skip_unchanged: config.skip_unchanged_scheduled_pushes,
                mastery_threshold,
                prior_total_centis: launch.prior_total_time_centis,
                started_at: None,
            };
            Mutex::new(RteSurface::new(store, Box::new(hooks)))
        });

        info!(%launch_id, ?resume_source, "session launched");
        Ok(Self {
            launch_id,
            surface,
            sync,
            schedule,
            resume_source,
            preferred_dialect: config.preferred_dialect,
            leaving_timeout: config.leaving_flush_timeout(),
        })
    }

    pub fn launch_id(&self) -> &str {
        &self.launch_id
    }

    /// The surface to expose to content.
    pub fn surface(&self) -> SharedSurface {
        Arc::clone(&self.surface)
    }

    /// Call a surface function by name.
    pub fn invoke(&self, function: &str, args: &[&str]) -> String {
        self.surface.lock().invoke(function, args)
    }

    pub fn state(&self) -> SessionState {
        self.surface.lock().state()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == SessionState::Terminated
    }

    pub fn resume_source(&self) -> ResumeSource {
        self.resume_source
    }

    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Page is ready: initialize in the preferred dialect unless content
    /// already did.
    pub fn on_ready(&self) -> bool {
        let mut surface = self.surface.lock();
        match surface.state() {
            SessionState::Running => true,
            SessionState::Terminated => false,
            SessionState::NotInitialized => {
                let result = match self.preferred_dialect {
                    Dialect::Legacy => surface.lms_initialize(""),
                    Dialect::Current => surface.initialize(""),
                };
                result == TRUE
            }
        }
    }

    /// Page is going away: stop the schedule, terminate with a single
    /// push attempt, and wait a bounded time for in-flight pushes.
    /// Returns true if every push settled in time.
    pub async fn on_leaving(&self) -> bool {
        self.schedule.cancel();
        let terminated = self.surface.lock().host_terminate();
        if terminated {
            info!(launch_id = %self.launch_id, "session terminated on leaving");
        }
        self.sync.drain(self.leaving_timeout).await
    }

    /// Wait for in-flight pushes.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.sync.drain(timeout).await
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.schedule.cancel();
    }
}

// ---------------------------------------------------------------------------
// Observer attached to the surface
// ---------------------------------------------------------------------------

struct ControllerHooks {
    surface: Weak<Mutex<RteSurface>>,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    sync: Arc<Synchronizer>,
    journal: Option<CacheJournal>,
    schedule: CancellationToken,
    commit_interval: Duration,
    skip_unchanged: bool,
    mastery_threshold: i64,
    prior_total_centis: u64,
    started_at: Option<DateTime<Utc>>,
}

impl SurfaceObserver for ControllerHooks {
    fn on_event(&mut self, event: SurfaceEvent, store: &mut DataModelStore, dialect: Dialect) {
        match event {
            SurfaceEvent::Initialized => self.on_initialized(),
            SurfaceEvent::ValueSet(element) => self.on_value_set(element, store),
            SurfaceEvent::Committed(origin) => self.on_committed(origin, store, dialect),
            SurfaceEvent::Terminating { by_host } => self.on_terminating(by_host, store, dialect),
        }
    }
}

impl ControllerHooks {
    fn on_initialized(&mut self) {
        self.started_at = Some(self.clock.now());
        spawn_commit_schedule(
            &self.runtime,
            self.surface.clone(),
            self.commit_interval,
            self.schedule.child_token(),
        );
        debug!(launch_id = %self.sync.launch_id(), "session running");
    }

    fn on_value_set(&mut self, element: Element, store: &mut DataModelStore) {
        if element == Element::ProgressMeasure {
            apply_completion_threshold(store);
        }
        if matches!(
            element,
            Element::CompletionStatus
                | Element::ProgressMeasure
                | Element::ScoreRaw
                | Element::ScoreMin
                | Element::ScoreMax
                | Element::ScoreScaled
        ) {
            apply_mastery(store, self.mastery_threshold);
        }
        if store.take_dirty() {
            self.save_cache(store);
        }
    }

    fn on_committed(&mut self, origin: CommitOrigin, store: &mut DataModelStore, dialect: Dialect) {
        let now = self.clock.now();
        let elapsed = self.elapsed(now);
        let snapshot = store.snapshot(elapsed, self.prior_total_centis + elapsed, dialect);

        if store.take_dirty() {
            self.save_cache(store);
        }

        if origin == CommitOrigin::Schedule && self.skip_unchanged && self.sync.is_unchanged(&snapshot) {
            self.sync.note_skipped();
            debug!("scheduled commit unchanged; push skipped");
            return;
        }
        self.sync.push_progress(&snapshot, now, Delivery::Retry);
    }

    fn on_terminating(&mut self, by_host: bool, store: &mut DataModelStore, dialect: Dialect) {
        self.schedule.cancel();

        let now = self.clock.now();
        let elapsed = self.elapsed(now);
        let total = self.prior_total_centis + elapsed;
        if let Err(code) = store.host_set(Element::TotalTime, &encode_timespan(total, Dialect::Current)) {
            warn!(%code, "total time not recorded");
        }

        store.take_dirty();
        self.save_cache(store);

        let snapshot = store.snapshot(elapsed, total, dialect);
        let delivery = if by_host {
            Delivery::SingleAttempt
        } else {
            Delivery::Retry
        };
        self.sync.push_progress(&snapshot, now, delivery);
        self.sync.push_completion(&snapshot, now, delivery);

        info!(
            launch_id = %self.sync.launch_id(),
            completion = %snapshot.completion_status,
            success = %snapshot.success_status,
            session_time = %snapshot.session_time,
            by_host,
            "session terminating"
        );
    }

    fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| elapsed_centis(start, now))
            .unwrap_or(0)
    }

    fn save_cache(&mut self, store: &DataModelStore) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if let Err(e) = journal.save(&store.persisted_values(), self.clock.now()) {
            warn!("Failed to write progress cache: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Completion and mastery policy
// ---------------------------------------------------------------------------

/// Derive completion from progress when the launch sets a threshold.
fn apply_completion_threshold(store: &mut DataModelStore) {
    let threshold = store.raw(Element::CompletionThreshold).and_then(parse_decimal);
    let measure = store.raw(Element::ProgressMeasure).and_then(parse_decimal);
    let (Some(threshold), Some(measure)) = (threshold, measure) else {
        return;
    };
    let status = if measure >= threshold {
        "completed"
    } else {
        "incomplete"
    };
    if let Err(code) = store.host_set(Element::CompletionStatus, status) {
        warn!(%code, "completion status not derived");
    }
}

/// Derive success from the scaled score once completed, unless the
/// content reported success itself.
fn apply_mastery(store: &mut DataModelStore, threshold: i64) {
    if store.raw(Element::CompletionStatus) != Some("completed")
        || store.was_written_by_content(Element::SuccessStatus)
    {
        return;
    }
    let Some(scaled) = store.scaled_score() else {
        return;
    };
    let status = if scaled >= threshold { "passed" } else { "failed" };
    if let Err(code) = store.host_set(Element::SuccessStatus, status) {
        warn!(%code, "success status not derived");
    }
}
