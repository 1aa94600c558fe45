use crate::{
    dto::{
        leaderboard::{LeaderboardEntry, LeaderboardResponse, PlayerRankResponse},
        validation::validate_username,
    },
    error::ServiceError,
    state::SharedState,
};

/// Best players by total score, then accuracy.
pub async fn top(state: &SharedState, limit: usize) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_player_store().await?;
    let players = store.top_players(limit).await?;
    let total_players = store.total_players().await?;

    let entries = players
        .into_iter()
        .enumerate()
        .map(|(index, player)| LeaderboardEntry::new(index + 1, player))
        .collect();

    Ok(LeaderboardResponse {
        entries,
        total_players,
    })
}

/// Rank and stats of a single player.
pub async fn player_rank(
    state: &SharedState,
    username: String,
) -> Result<PlayerRankResponse, ServiceError> {
    if let Err(err) = validate_username(&username) {
        let message = err
            .message
            .map_or_else(|| err.code.to_string(), |message| message.to_string());
        return Err(ServiceError::InvalidInput(message));
    }
    let store = state.require_player_store().await?;
    let Some(player) = store.load_player(username.clone()).await? else {
        return Err(ServiceError::NotFound(format!("player `{username}` not found")));
    };
    let rank = store
        .rank(username.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{username}` not found")))?;
    let total_players = store.total_players().await?;

    Ok(PlayerRankResponse {
        accuracy: player.accuracy(),
        username,
        rank,
        total_players,
        total_score: player.stats.total_score,
        games_played: player.games_played,
        best_session_score: player.best_session_score,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PlayerStatsEntity,
            player_store::{PlayerStore, memory::MemoryPlayerStore},
        },
        services::item_source::FixedSource,
        state::AppState,
    };

    async fn seeded_state() -> SharedState {
        let store = MemoryPlayerStore::new();
        for (name, score, attempts) in [("alice", 4, 8), ("bob", 9, 10), ("carol", 4, 4)] {
            store
                .update_ranking(PlayerStatsEntity {
                    username: name.into(),
                    total_score: score,
                    correct_answers: score,
                    total_attempts: attempts,
                })
                .await
                .unwrap();
        }
        let state = AppState::new(AppConfig::default(), Arc::new(FixedSource(None)));
        state.install_player_store(Arc::new(store)).await;
        state
    }

    #[tokio::test]
    async fn top_lists_positions_in_order() {
        let state = seeded_state().await;
        let board = top(&state, 10).await.unwrap();
        assert_eq!(board.total_players, 3);
        let names: Vec<_> = board.entries.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol", "alice"]);
        assert_eq!(board.entries[2].position, 3);
    }

    #[tokio::test]
    async fn rank_of_known_and_unknown_players() {
        let state = seeded_state().await;
        let alice = player_rank(&state, "alice".into()).await.unwrap();
        assert_eq!(alice.rank, 2);
        assert_eq!(alice.total_players, 3);
        assert_eq!(alice.accuracy, 50.0);

        let missing = player_rank(&state, "dave".into()).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let invalid = player_rank(&state, "no way".into()).await;
        assert!(matches!(invalid, Err(ServiceError::InvalidInput(_))));
    }
}
