/// Publish/subscribe registry for round events.
pub mod event_bus;
/// Coordinator lifecycle phases.
pub mod phase;
/// Per-round state.
pub mod session;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::player_store::PlayerStore,
    dto::sse::{EVENT_SYSTEM_STATUS, ServerEvent, SystemStatus},
    error::ServiceError,
    services::{
        coordinator::{Coordinator, CoordinatorHandle},
        item_source::ItemSource,
        persistence::ResultsRecorder,
        sound_cues::SoundCues,
        sse_events,
    },
};

pub use self::sse::SseHub;
use self::event_bus::EventBus;

/// Application state shared across handlers.
pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Shared slot holding the active player store, empty while degraded.
#[derive(Clone, Default)]
pub struct StoreSlot {
    inner: Arc<RwLock<Option<Arc<dyn PlayerStore>>>>,
}

impl StoreSlot {
    /// Current store, if one is installed.
    pub async fn get(&self) -> Option<Arc<dyn PlayerStore>> {
        let guard = self.inner.read().await;
        guard.as_ref().cloned()
    }

    /// Install `store`, or empty the slot with `None`.
    pub async fn set(&self, store: Option<Arc<dyn PlayerStore>>) {
        let mut guard = self.inner.write().await;
        *guard = store;
    }
}

/// Central application state: the session coordinator, its event bus, the
/// player store, and the SSE hub.
pub struct AppState {
    coordinator: CoordinatorHandle,
    recorder: ResultsRecorder,
    sound: Arc<SoundCues>,
    player_store: StoreSlot,
    sse: SseHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Spawn the coordinator over `source` and wire the bus observers.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, source: Arc<dyn ItemSource>) -> SharedState {
        let bus = Arc::new(EventBus::new());
        let sse = SseHub::new(SSE_CAPACITY);
        let player_store = StoreSlot::default();

        sse_events::register(&bus, sse.clone());
        let sound = SoundCues::register(&bus, sse.clone(), config.sound_muted());
        let recorder = ResultsRecorder::spawn(player_store.clone());
        recorder.register(&bus);

        let coordinator = Coordinator::spawn(bus, source, config.timings());
        let (degraded_tx, _rx) = watch::channel(true);

        Arc::new(Self {
            coordinator,
            recorder,
            sound,
            player_store,
            sse,
            degraded: degraded_tx,
        })
    }

    /// Handle to the session coordinator.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Sound cue observer, used to toggle muting.
    pub fn sound(&self) -> &SoundCues {
        &self.sound
    }

    /// Wait until results of earlier rounds reached the player store.
    pub async fn flush_results(&self) {
        self.recorder.flush().await;
    }

    /// Obtain a handle to the current player store, if one is installed.
    pub async fn player_store(&self) -> Option<Arc<dyn PlayerStore>> {
        self.player_store.get().await
    }

    /// Current player store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_player_store(&self) -> Result<Arc<dyn PlayerStore>, ServiceError> {
        self.player_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new player store implementation and leave degraded mode.
    pub async fn install_player_store(&self, store: Arc<dyn PlayerStore>) {
        self.player_store.set(Some(store)).await;
        self.update_degraded(false);
    }

    /// Remove the current player store and enter degraded mode.
    pub async fn clear_player_store(&self) {
        self.player_store.set(None).await;
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if !changed {
            return;
        }

        info!(degraded = value, "degraded mode changed");
        if let Ok(event) = ServerEvent::json(
            EVENT_SYSTEM_STATUS.to_string(),
            &SystemStatus { degraded: value },
        ) {
            self.sse.broadcast(event);
        }
    }
}
