use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoPlayerDocument, MongoSessionResultDocument, MongoUserDocument, doc_id, stats_fields,
    },
};
use crate::dao::{
    models::{PlayerEntity, PlayerStatsEntity, SessionResultEntity, UserEntity},
    player_store::PlayerStore,
    storage::StorageResult,
};

const USER_COLLECTION_NAME: &str = "users";
const PLAYER_COLLECTION_NAME: &str = "players";
const RESULT_COLLECTION_NAME: &str = "session_results";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoPlayerStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MongoPlayerStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let players = self.players().await;
        let ranking_index = IndexModel::builder()
            .keys(doc! {"total_score": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_score_idx".to_owned()))
                    .build(),
            )
            .build();
        players
            .create_index(ranking_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "total_score",
                source,
            })?;

        let results = self.results().await;
        let username_index = IndexModel::builder()
            .keys(doc! {"username": 1, "played_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("result_username_idx".to_owned()))
                    .build(),
            )
            .build();
        results
            .create_index(username_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESULT_COLLECTION_NAME,
                index: "username,played_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database().await.collection(PLAYER_COLLECTION_NAME)
    }

    async fn results(&self) -> Collection<MongoSessionResultDocument> {
        self.database().await.collection(RESULT_COLLECTION_NAME)
    }

    async fn register_user(&self, user: UserEntity) -> MongoResult<bool> {
        let username = user.username.clone();
        let document: MongoUserDocument = user.into();

        match self.users().await.insert_one(&document).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => return Ok(false),
            Err(source) => return Err(MongoDaoError::SaveUser { username, source }),
        }

        let initial: MongoPlayerDocument = PlayerEntity::initial(username.clone()).into();
        match self.players().await.insert_one(&initial).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(true),
            Err(source) => Err(MongoDaoError::SavePlayer { username, source }),
        }
    }

    async fn find_user(&self, username: String) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(doc_id(&username))
            .await
            .map_err(|source| MongoDaoError::LoadUser { username, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_login(&self, username: String) -> MongoResult<()> {
        let now = DateTime::from_system_time(SystemTime::now());
        self.users()
            .await
            .update_one(doc_id(&username), doc! {"$set": {"last_login": now}})
            .await
            .map_err(|source| MongoDaoError::SaveUser { username, source })?;
        Ok(())
    }

    async fn load_player(&self, username: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc_id(&username))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { username, source })?;
        Ok(document.map(Into::into))
    }

    async fn write_stats(&self, stats: PlayerStatsEntity, update: Document) -> MongoResult<()> {
        let username = stats.username;
        self.players()
            .await
            .update_one(doc_id(&username), update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { username, source })?;
        Ok(())
    }

    async fn update_ranking(&self, stats: PlayerStatsEntity) -> MongoResult<()> {
        let update = doc! {
            "$set": stats_fields(&stats),
            "$setOnInsert": {"games_played": 0_i64, "best_session_score": 0_i64},
        };
        self.write_stats(stats, update).await
    }

    async fn save_player(&self, stats: PlayerStatsEntity) -> MongoResult<()> {
        let mut fields = stats_fields(&stats);
        fields.insert("last_played", DateTime::from_system_time(SystemTime::now()));
        let update = doc! {
            "$set": fields,
            "$inc": {"games_played": 1_i64},
            "$setOnInsert": {"best_session_score": 0_i64},
        };
        self.write_stats(stats, update).await
    }

    async fn save_session_result(&self, result: SessionResultEntity) -> MongoResult<()> {
        let id = result.id;
        let username = result.username.clone();
        let score = i64::from(result.score);
        let document: MongoSessionResultDocument = result.into();

        self.results()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveSessionResult { id, source })?;

        self.players()
            .await
            .update_one(
                doc_id(&username),
                doc! {"$max": {"best_session_score": score}},
            )
            .await
            .map_err(|source| MongoDaoError::SavePlayer { username, source })?;
        Ok(())
    }

    async fn top_players(&self, limit: usize) -> MongoResult<Vec<PlayerEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let pipeline = [
            doc! {"$addFields": {"accuracy": {"$cond": [
                {"$gt": ["$total_attempts", 0]},
                {"$multiply": [{"$divide": ["$correct_answers", "$total_attempts"]}, 100.0]},
                0.0,
            ]}}},
            doc! {"$sort": {"total_score": -1, "accuracy": -1}},
            doc! {"$limit": limit},
            doc! {"$project": {"accuracy": 0}},
        ];

        let documents: Vec<MongoPlayerDocument> = self
            .players()
            .await
            .aggregate(pipeline)
            .with_type::<MongoPlayerDocument>()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn rank(&self, username: String) -> MongoResult<Option<u64>> {
        let Some(player) = self.load_player(username).await? else {
            return Ok(None);
        };

        let ahead = self
            .players()
            .await
            .count_documents(doc! {"total_score": {"$gt": i64::from(player.stats.total_score)}})
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;
        Ok(Some(ahead + 1))
    }

    async fn total_players(&self) -> MongoResult<u64> {
        self.players()
            .await
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })
    }
}

impl PlayerStore for MongoPlayerStore {
    fn register_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.register_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(username).await.map_err(Into::into) })
    }

    fn record_login(&self, username: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.record_login(username).await.map_err(Into::into) })
    }

    fn load_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_player(username).await.map_err(Into::into) })
    }

    fn update_ranking(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_ranking(stats).await.map_err(Into::into) })
    }

    fn save_player(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(stats).await.map_err(Into::into) })
    }

    fn save_session_result(
        &self,
        result: SessionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session_result(result).await.map_err(Into::into) })
    }

    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_players(limit).await.map_err(Into::into) })
    }

    fn rank(&self, username: String) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let store = self.clone();
        Box::pin(async move { store.rank(username).await.map_err(Into::into) })
    }

    fn total_players(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.total_players().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
