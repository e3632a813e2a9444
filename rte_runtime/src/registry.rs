//! Live launches, keyed by launch id.
//!
//! One surface per launch: opening an id that still has a running or
//! not-yet-initialized session is refused.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use rte_kernel::state::LaunchContext;

use crate::error::RuntimeError;
use crate::session::{SessionController, SessionDeps};

pub struct LaunchRegistry {
    deps: SessionDeps,
    sessions: HashMap<String, Arc<SessionController>>,
}

impl LaunchRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: HashMap::new(),
        }
    }

    /// Start a session. A fresh id is generated when none is given.
    pub fn open(
        &mut self,
        launch_id: Option<String>,
        launch: LaunchContext,
    ) -> Result<Arc<SessionController>, RuntimeError> {
        let launch_id = launch_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Some(existing) = self.sessions.get(&launch_id) {
            if !existing.is_terminated() {
                return Err(RuntimeError::DuplicateLaunch(launch_id));
            }
        }

        let session = Arc::new(SessionController::launch(launch_id.clone(), launch, &self.deps)?);
        self.sessions.insert(launch_id, Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, launch_id: &str) -> Option<Arc<SessionController>> {
        self.sessions.get(launch_id).cloned()
    }

    /// Forget terminated sessions. Returns how many were removed.
    pub fn reap_terminated(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_terminated());
        let reaped = before - self.sessions.len();
        if reaped > 0 {
            info!(reaped, live = self.sessions.len(), "reaped terminated sessions");
        }
        reaped
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
