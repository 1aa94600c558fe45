use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        player_store::{PlayerStore, memory::MemoryPlayerStore},
        storage::StorageError,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Pick the storage backend: MongoDB when `MONGO_URI` is set and the
/// `mongo-store` feature is enabled, the in-memory store otherwise.
pub async fn start(state: SharedState) {
    if spawn_mongo_supervisor(&state) {
        return;
    }

    info!("using in-memory player store");
    state
        .install_player_store(Arc::new(MemoryPlayerStore::new()))
        .await;
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> bool {
    use crate::dao::player_store::mongodb::{MongoConfig, MongoPlayerStore};

    if std::env::var_os("MONGO_URI").is_none() {
        return false;
    }

    info!("MONGO_URI set; supervising MongoDB player store");
    tokio::spawn(run(state.clone(), || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoPlayerStore::connect(config).await?;
        Ok::<Arc<dyn PlayerStore>, StorageError>(Arc::new(store))
    }));
    true
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> bool {
    false
}

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PlayerStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_player_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;
                state.clear_player_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be revived.
async fn supervise(state: &SharedState, store: &dyn PlayerStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;

        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!("storage reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "storage reconnect first attempt failed; entering degraded mode"
                        );
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "storage reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            warn!("exhausted storage reconnect attempts; staying in degraded mode");
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::{PlayerEntity, PlayerStatsEntity, SessionResultEntity, UserEntity},
        dao::storage::StorageResult,
        services::item_source::FixedSource,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn connects_after_failures_and_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(FixedSource(None)));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let task = tokio::spawn(run(state.clone(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::unavailable(
                        "connect".into(),
                        std::io::Error::other("refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryPlayerStore::new()) as Arc<dyn PlayerStore>)
                }
            }
        }));

        // 1s + 2s of backoff before the third attempt
        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!state.is_degraded());
        assert!(state.player_store().await.is_some());
        task.abort();
    }

    /// Store whose health check and reconnects always fail.
    struct BrokenStore;

    fn broken<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(async {
            Err(StorageError::unavailable(
                "health".into(),
                std::io::Error::other("down"),
            ))
        })
    }

    impl PlayerStore for BrokenStore {
        fn register_user(&self, _: UserEntity) -> BoxFuture<'static, StorageResult<bool>> {
            broken()
        }
        fn find_user(&self, _: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            broken()
        }
        fn record_login(&self, _: String) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn load_player(
            &self,
            _: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            broken()
        }
        fn update_ranking(&self, _: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn save_player(&self, _: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn save_session_result(
            &self,
            _: SessionResultEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn top_players(&self, _: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            broken()
        }
        fn rank(&self, _: String) -> BoxFuture<'static, StorageResult<Option<u64>>> {
            broken()
        }
        fn total_players(&self) -> BoxFuture<'static, StorageResult<u64>> {
            broken()
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_store_puts_the_app_in_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(FixedSource(None)));
        let degraded = state.degraded_watcher();

        let task = tokio::spawn(run(state.clone(), || async {
            Ok(Arc::new(BrokenStore) as Arc<dyn PlayerStore>)
        }));

        // reconnect backoff: 1s + 2s + 4s
        sleep(Duration::from_millis(7_500)).await;
        assert!(*degraded.borrow());
        assert!(state.player_store().await.is_none());
        task.abort();
    }
}
