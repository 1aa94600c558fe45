use tracing::info;

use crate::{
    dto::{
        auth::CredentialsRequest,
        session::{
            AnswerRequest, AnswerResponse, EndResponse, SessionResponse, SkipResponse,
            SoundRequest, SoundResponse,
        },
    },
    error::ServiceError,
    services::auth_service,
    state::{
        SharedState,
        session::{Player, PuzzleItem},
    },
};

/// Log the player in and start a round for them.
///
/// Pending writes of earlier rounds are flushed first so the round starts from
/// the stored cumulative stats.
pub async fn start(
    state: &SharedState,
    request: CredentialsRequest,
) -> Result<SessionResponse, ServiceError> {
    state.flush_results().await;
    let entity = auth_service::authenticate(state, &request).await?;
    let player = Player::from(entity.stats);
    let snapshot = state.coordinator().start_session(player).await?;
    info!(username = %request.username, "round started over HTTP");
    Ok(snapshot.into())
}

/// Grade an answer against the current puzzle.
pub async fn answer(
    state: &SharedState,
    request: AnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    let coordinator = state.coordinator();
    let outcome = coordinator.submit_answer(request.value).await?;
    let snapshot = coordinator.snapshot().await?;
    Ok(AnswerResponse {
        status: outcome.into(),
        session: snapshot.into(),
    })
}

/// Replace the current puzzle with a fresh one.
pub async fn skip(state: &SharedState) -> Result<SkipResponse, ServiceError> {
    let outcome = state.coordinator().request_next_item().await?;
    Ok(SkipResponse {
        status: outcome.into(),
    })
}

/// Terminate the running round.
pub async fn end(state: &SharedState) -> Result<EndResponse, ServiceError> {
    let coordinator = state.coordinator();
    let ended = coordinator.end_session().await?;
    let snapshot = coordinator.snapshot().await?;
    Ok(EndResponse {
        ended,
        session: snapshot.into(),
    })
}

/// State of the current (or last) round.
pub async fn current(state: &SharedState) -> Result<SessionResponse, ServiceError> {
    Ok(state.coordinator().snapshot().await?.into())
}

/// Puzzle currently shown to the player.
pub async fn current_item(state: &SharedState) -> Result<PuzzleItem, ServiceError> {
    state
        .coordinator()
        .snapshot()
        .await?
        .current_item
        .ok_or_else(|| ServiceError::NotFound("no puzzle is loaded".into()))
}

/// Mute or unmute sound cues.
pub fn set_sound(state: &SharedState, request: SoundRequest) -> SoundResponse {
    state.sound().set_muted(request.muted);
    SoundResponse {
        muted: state.sound().is_muted(),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::player_store::memory::MemoryPlayerStore,
        dto::session::{AnswerStatus, PhaseDto},
        services::item_source::FixedSource,
        state::AppState,
    };

    fn credentials() -> CredentialsRequest {
        CredentialsRequest {
            username: "alice".into(),
            password: "secret".into(),
        }
    }

    async fn ready_state() -> SharedState {
        let item = PuzzleItem::new(vec![1_u8, 2, 3], 6);
        let state = AppState::new(AppConfig::default(), Arc::new(FixedSource(Some(item))));
        state
            .install_player_store(Arc::new(MemoryPlayerStore::new()))
            .await;
        auth_service::register(&state, credentials()).await.unwrap();
        state
    }

    async fn wait_for_item(state: &SharedState) -> PuzzleItem {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(item) = current_item(state).await {
                    return item;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn full_round_over_the_service_layer() {
        let state = ready_state().await;
        assert!(current_item(&state).await.is_err());

        let started = start(&state, credentials()).await.unwrap();
        assert_eq!(started.phase, PhaseDto::Running);
        assert!(started.active);

        let item = wait_for_item(&state).await;
        assert_eq!(item.solution(), 6);

        let graded = answer(&state, AnswerRequest { value: 6 }).await.unwrap();
        assert_eq!(graded.status, AnswerStatus::Correct);
        assert_eq!(graded.session.score, 1);

        let ended = end(&state).await.unwrap();
        assert!(ended.ended);
        assert_eq!(ended.session.phase, PhaseDto::Ended);
        assert!(!end(&state).await.unwrap().ended);
    }

    #[tokio::test]
    async fn next_round_starts_from_the_stored_totals() {
        let state = ready_state().await;
        start(&state, credentials()).await.unwrap();
        wait_for_item(&state).await;
        answer(&state, AnswerRequest { value: 6 }).await.unwrap();
        answer(&state, AnswerRequest { value: 1 }).await.unwrap();
        end(&state).await.unwrap();

        let restarted = start(&state, credentials()).await.unwrap();
        let player = restarted.player.unwrap();
        assert_eq!(player.total_score, 1);
        assert_eq!(player.total_attempts, 2);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let state = ready_state().await;
        start(&state, credentials()).await.unwrap();
        let second = start(&state, credentials()).await;
        assert!(matches!(second, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn wrong_password_does_not_start_a_round() {
        let state = ready_state().await;
        let request = CredentialsRequest {
            username: "alice".into(),
            password: "wrong".into(),
        };
        assert!(matches!(
            start(&state, request).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert_eq!(current(&state).await.unwrap().phase, PhaseDto::Idle);
    }

    #[tokio::test]
    async fn sound_can_be_muted() {
        let state = ready_state().await;
        assert!(set_sound(&state, SoundRequest { muted: true }).muted);
        assert!(state.sound().is_muted());
    }
}
