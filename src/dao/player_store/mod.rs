/// In-process backend used when no database is configured.
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{
    models::{PlayerEntity, PlayerStatsEntity, SessionResultEntity, UserEntity},
    storage::StorageResult,
};

/// Abstraction over the persistence layer for credentials, player statistics,
/// round results, and ranking queries.
pub trait PlayerStore: Send + Sync {
    /// Create a user and its initial stats. Returns `false` when the name is taken.
    fn register_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn record_login(&self, username: String) -> BoxFuture<'static, StorageResult<()>>;
    fn load_player(&self, username: String)
    -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Refresh the ranking counters of a player mid-round.
    fn update_ranking(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the counters at the end of a round and count the round as played.
    fn save_player(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Append a round result and raise the player's best round score.
    fn save_session_result(
        &self,
        result: SessionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Players ordered by total score, then accuracy, both descending.
    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// One plus the number of players with a strictly higher total score.
    fn rank(&self, username: String) -> BoxFuture<'static, StorageResult<Option<u64>>>;
    fn total_players(&self) -> BoxFuture<'static, StorageResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Order used by leaderboards: score, then accuracy, both descending.
pub(crate) fn leaderboard_order(a: &PlayerEntity, b: &PlayerEntity) -> std::cmp::Ordering {
    b.stats
        .total_score
        .cmp(&a.stats.total_score)
        .then_with(|| b.accuracy().total_cmp(&a.accuracy()))
}
