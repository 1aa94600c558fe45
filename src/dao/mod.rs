/// Database model definitions.
pub mod models;
/// Player, credential, and leaderboard persistence.
pub mod player_store;
/// Storage abstraction layer for database operations.
pub mod storage;
