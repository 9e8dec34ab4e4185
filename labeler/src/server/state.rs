//! Shared state of the labeling server

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, info};

use super::error::ApiError;
use crate::acquisition::{AcquisitionCatalog, AcquisitionReader};
use crate::config::Config;
use crate::label::{LabelSession, LabelStore};
use crate::projection::{
    MosaicPolicy, Projection, ProjectionCache, ProjectionEngine, ProjectionKey, ProjectionOutcome,
    ProjectionRequest,
};

/// Sessions are keyed by acquisition name and image index
pub type SessionKey = (String, usize);

/// Which projection a request addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    pub channel: usize,
    pub time: usize,
    /// `Some(true)` proceeds on mosaics, `Some(false)` cancels them
    pub confirm_mosaic: Option<bool>,
}

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: AcquisitionCatalog,
    pub labels: LabelStore,
    pub projections: Arc<ProjectionCache>,
    pub sessions: Arc<DashMap<SessionKey, Arc<Mutex<LabelSession>>>>,
    started: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            catalog: AcquisitionCatalog::new(config.storage.image_dir.clone()),
            labels: LabelStore::new(config.storage.label_dir.clone()),
            projections: Arc::new(ProjectionCache::new(config.projection.cache_size)),
            sessions: Arc::new(DashMap::new()),
            config: Arc::new(config),
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Project the addressed stack, reusing a cached projection when the
    /// source file is unchanged
    ///
    /// Mosaics need `confirm_mosaic=true` (or `ALLOW_MOSAIC`) every time,
    /// cached or not.
    pub fn projection(
        &self,
        name: &str,
        image_index: usize,
        selection: Selection,
    ) -> Result<Arc<Projection>, ApiError> {
        let acquisition = self.catalog.open(name)?;
        let key = ProjectionKey {
            path: acquisition.image_path(image_index)?.to_path_buf(),
            image_index,
            channel: selection.channel,
            time: selection.time,
        };

        let policy = match selection.confirm_mosaic {
            Some(true) => MosaicPolicy::Proceed,
            _ => self.config.projection.mosaic_policy(),
        };

        if let Some(cached) = self.projections.get(&key)
            && (!cached.metadata.is_mosaic || policy == MosaicPolicy::Proceed)
        {
            debug!("Serving cached projection for {} image {}", name, image_index);
            return Ok(cached);
        }

        let engine = ProjectionEngine::new(&acquisition);
        let request = ProjectionRequest::new(image_index)
            .with_channel(selection.channel)
            .with_time(selection.time)
            .with_mosaic(policy);

        let projection = match engine.project(&request)? {
            ProjectionOutcome::Complete(projection) => projection,
            ProjectionOutcome::NeedsConfirmation(pending) => match selection.confirm_mosaic {
                Some(false) => pending.resolve(&engine, false)?,
                _ => return Err(ApiError::MosaicConfirmationRequired(pending.warning().clone())),
            },
        };

        let projection = Arc::new(projection);
        self.projections.insert(key, Arc::clone(&projection));
        Ok(projection)
    }

    /// Label session for one image, opened on first use
    pub fn session(
        &self,
        name: &str,
        image_index: usize,
    ) -> Result<Arc<Mutex<LabelSession>>, ApiError> {
        let key: SessionKey = (name.to_string(), image_index);
        if let Some(session) = self.sessions.get(&key) {
            return Ok(Arc::clone(session.value()));
        }

        let acquisition = self.catalog.open(name)?;
        let shape = acquisition.image_info(image_index)?.dims.shape();
        let session = LabelSession::open(self.labels.path_for(name, image_index), shape)?;
        info!("Opened label session for {} image {}", name, image_index);
        counter!("labeler_label_sessions_opened_total").increment(1);

        let entry = self
            .sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(session)));
        Ok(Arc::clone(entry.value()))
    }
}

/// Lock a session, recovering the guard if a previous holder panicked
pub fn lock_session(session: &Mutex<LabelSession>) -> MutexGuard<'_, LabelSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
