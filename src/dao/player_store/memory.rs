use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{PlayerStore, leaderboard_order};
use crate::dao::{
    models::{PlayerEntity, PlayerStatsEntity, SessionResultEntity, UserEntity},
    storage::StorageResult,
};

/// Process-local store used when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryPlayerStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<String, UserEntity>,
    players: DashMap<String, PlayerEntity>,
    results: DashMap<Uuid, SessionResultEntity>,
}

impl MemoryPlayerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored round results for `username`.
    pub fn result_count(&self, username: &str) -> usize {
        self.inner
            .results
            .iter()
            .filter(|entry| entry.username == username)
            .count()
    }
}

impl MemoryInner {
    fn register_user(&self, user: UserEntity) -> bool {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.players
                    .insert(user.username.clone(), PlayerEntity::initial(&user.username));
                slot.insert(user);
                true
            }
        }
    }

    fn apply_stats(&self, stats: PlayerStatsEntity, finished_round: bool) {
        let mut record = self
            .players
            .entry(stats.username.clone())
            .or_insert_with(|| PlayerEntity::initial(&stats.username));
        record.stats = stats;
        if finished_round {
            record.games_played += 1;
            record.last_played = Some(SystemTime::now());
        }
    }

    fn save_session_result(&self, result: SessionResultEntity) {
        if let Some(mut record) = self.players.get_mut(&result.username) {
            record.best_session_score = record.best_session_score.max(result.score);
        }
        self.results.insert(result.id, result);
    }

    fn top_players(&self, limit: usize) -> Vec<PlayerEntity> {
        let mut players: Vec<PlayerEntity> = self
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        players.sort_by(leaderboard_order);
        players.truncate(limit);
        players
    }

    fn rank(&self, username: &str) -> Option<u64> {
        let score = self.players.get(username)?.stats.total_score;
        let ahead = self
            .players
            .iter()
            .filter(|entry| entry.stats.total_score > score)
            .count() as u64;
        Some(ahead + 1)
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn register_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.register_user(user)) })
    }

    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.users.get(&username).map(|entry| entry.clone())) })
    }

    fn record_login(&self, username: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut user) = inner.users.get_mut(&username) {
                user.last_login = Some(SystemTime::now());
            }
            Ok(())
        })
    }

    fn load_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.players.get(&username).map(|entry| entry.clone())) })
    }

    fn update_ranking(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.apply_stats(stats, false);
            Ok(())
        })
    }

    fn save_player(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.apply_stats(stats, true);
            Ok(())
        })
    }

    fn save_session_result(
        &self,
        result: SessionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.save_session_result(result);
            Ok(())
        })
    }

    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.top_players(limit)) })
    }

    fn rank(&self, username: String) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.rank(&username)) })
    }

    fn total_players(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.players.len() as u64) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserEntity {
        UserEntity {
            username: name.to_string(),
            password_hash: "digest".to_string(),
            created_at: SystemTime::now(),
            last_login: None,
        }
    }

    fn stats(name: &str, score: u32, correct: u32, attempts: u32) -> PlayerStatsEntity {
        PlayerStatsEntity {
            username: name.to_string(),
            total_score: score,
            correct_answers: correct,
            total_attempts: attempts,
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_creates_stats() {
        let store = MemoryPlayerStore::new();
        assert!(store.register_user(user("alice")).await.unwrap());
        assert!(!store.register_user(user("alice")).await.unwrap());

        let player = store.load_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(player, PlayerEntity::initial("alice"));
        assert_eq!(store.total_players().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_player_counts_rounds_but_ranking_updates_do_not() {
        let store = MemoryPlayerStore::new();
        store.register_user(user("alice")).await.unwrap();

        store.update_ranking(stats("alice", 1, 1, 2)).await.unwrap();
        store.save_player(stats("alice", 2, 2, 3)).await.unwrap();

        let player = store.load_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(player.stats, stats("alice", 2, 2, 3));
        assert_eq!(player.games_played, 1);
        assert!(player.last_played.is_some());
    }

    #[tokio::test]
    async fn session_results_raise_best_score_only() {
        let store = MemoryPlayerStore::new();
        store.register_user(user("alice")).await.unwrap();

        for score in [3, 7, 5] {
            store
                .save_session_result(SessionResultEntity {
                    id: Uuid::new_v4(),
                    username: "alice".into(),
                    score,
                    accuracy: 50.0,
                    attempts: score * 2,
                    played_at: SystemTime::now(),
                })
                .await
                .unwrap();
        }

        let player = store.load_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(player.best_session_score, 7);
        assert_eq!(store.result_count("alice"), 3);
    }

    #[tokio::test]
    async fn ranking_and_leaderboard_order() {
        let store = MemoryPlayerStore::new();
        for name in ["alice", "bob", "carol"] {
            store.register_user(user(name)).await.unwrap();
        }
        store.update_ranking(stats("alice", 5, 5, 10)).await.unwrap();
        store.update_ranking(stats("bob", 5, 5, 5)).await.unwrap();
        store.update_ranking(stats("carol", 9, 9, 20)).await.unwrap();

        assert_eq!(store.rank("carol".into()).await.unwrap(), Some(1));
        assert_eq!(store.rank("alice".into()).await.unwrap(), Some(2));
        assert_eq!(store.rank("bob".into()).await.unwrap(), Some(2));
        assert_eq!(store.rank("dave".into()).await.unwrap(), None);

        let top = store.top_players(2).await.unwrap();
        let names: Vec<_> = top.iter().map(|p| p.stats.username.as_str()).collect();
        assert_eq!(names, vec!["carol", "bob"]);
    }
}
