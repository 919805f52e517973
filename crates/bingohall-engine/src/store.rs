//! Persistence boundary.
//!
//! The engine only ever talks to a [`Store`]. Two implementations ship:
//! [`MemoryStore`] for tests and throwaway servers, and [`JsonFileStore`],
//! which keeps one JSON document per record so a restarted process picks
//! the running round back up.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use bingohall_protocol::{PlayerId, RoundId};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{GameRound, PlayerProgress};

/// Errors from a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save of round and player records.
pub trait Store: Send + Sync + 'static {
    fn find_round(
        &self,
        id: RoundId,
    ) -> impl Future<Output = Result<Option<GameRound>, StoreError>> + Send;

    fn save_round(&self, round: &GameRound) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerProgress>, StoreError>> + Send;

    fn save_player(
        &self,
        player: &PlayerProgress,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds `number` to the player's marks. Idempotent; a missing player
    /// is not an error.
    fn update_player_marks(
        &self,
        id: PlayerId,
        number: u8,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rounds: Mutex<HashMap<RoundId, GameRound>>,
    players: Mutex<HashMap<PlayerId, PlayerProgress>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Store for MemoryStore {
    async fn find_round(&self, id: RoundId) -> Result<Option<GameRound>, StoreError> {
        let rounds = self.rounds.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rounds.get(&id).cloned())
    }

    async fn save_round(&self, round: &GameRound) -> Result<(), StoreError> {
        let mut rounds = self.rounds.lock().unwrap_or_else(PoisonError::into_inner);
        rounds.insert(round.id, round.clone());
        Ok(())
    }

    async fn find_player(&self, id: PlayerId) -> Result<Option<PlayerProgress>, StoreError> {
        let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(players.get(&id).cloned())
    }

    async fn save_player(&self, player: &PlayerProgress) -> Result<(), StoreError> {
        let mut stored = player.clone();
        stored.connection_id = None;
        let mut players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        players.insert(player.player_id, stored);
        Ok(())
    }

    async fn update_player_marks(&self, id: PlayerId, number: u8) -> Result<(), StoreError> {
        let mut players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(player) = players.get_mut(&id) {
            player.marked_numbers.insert(number);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per record:
///
/// ```text
/// <dir>/rounds/<round id>.json
/// <dir>/players/<player id>.json
/// ```
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join("rounds")).await?;
        tokio::fs::create_dir_all(root.join("players")).await?;
        tracing::info!(dir = %root.display(), "json file store opened");
        Ok(Self { root })
    }

    fn round_path(&self, id: RoundId) -> PathBuf {
        self.root.join("rounds").join(format!("{}.json", id.0))
    }

    fn player_path(&self, id: PlayerId) -> PathBuf {
        self.root.join("players").join(format!("{}.json", id.0))
    }

    async fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    async fn find_round(&self, id: RoundId) -> Result<Option<GameRound>, StoreError> {
        Self::read(&self.round_path(id)).await
    }

    async fn save_round(&self, round: &GameRound) -> Result<(), StoreError> {
        Self::write(&self.round_path(round.id), round).await
    }

    async fn find_player(&self, id: PlayerId) -> Result<Option<PlayerProgress>, StoreError> {
        Self::read(&self.player_path(id)).await
    }

    async fn save_player(&self, player: &PlayerProgress) -> Result<(), StoreError> {
        Self::write(&self.player_path(player.player_id), player).await
    }

    async fn update_player_marks(&self, id: PlayerId, number: u8) -> Result<(), StoreError> {
        let path = self.player_path(id);
        let Some(mut player) = Self::read::<PlayerProgress>(&path).await? else {
            return Ok(());
        };
        if player.marked_numbers.insert(number) {
            Self::write(&path, &player).await?;
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal_card;
    use bingohall_protocol::{ConnectionId, RoundStatus};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::UNIX_EPOCH;

    fn player(id: u64) -> PlayerProgress {
        let card = deal_card(&mut StdRng::seed_from_u64(id));
        PlayerProgress::new(PlayerId(id), format!("p{id}"), card, 1)
    }

    // =====================================================================
    // MemoryStore
    // =====================================================================

    #[tokio::test]
    async fn test_memory_store_round_save_and_find() {
        let store = MemoryStore::new();
        assert!(store.find_round(RoundId(1)).await.unwrap().is_none());

        let mut round = GameRound::new(RoundId(1), UNIX_EPOCH);
        round.status = RoundStatus::Started;
        store.save_round(&round).await.unwrap();

        assert_eq!(store.find_round(RoundId(1)).await.unwrap(), Some(round));
    }

    #[tokio::test]
    async fn test_memory_store_save_player_strips_connection() {
        let store = MemoryStore::new();
        let mut p = player(5);
        p.connection_id = Some(ConnectionId::new(3));
        store.save_player(&p).await.unwrap();

        let found = store.find_player(PlayerId(5)).await.unwrap().unwrap();
        assert_eq!(found.connection_id, None);
        assert_eq!(found.card, p.card);
    }

    #[tokio::test]
    async fn test_memory_store_update_marks_is_set_add() {
        let store = MemoryStore::new();
        store.save_player(&player(5)).await.unwrap();
        store.update_player_marks(PlayerId(5), 12).await.unwrap();
        store.update_player_marks(PlayerId(5), 12).await.unwrap();

        let found = store.find_player(PlayerId(5)).await.unwrap().unwrap();
        assert_eq!(found.marked_numbers.into_iter().collect::<Vec<_>>(), vec![12]);
    }

    #[tokio::test]
    async fn test_memory_store_update_marks_unknown_player_is_ok() {
        let store = MemoryStore::new();
        assert!(store.update_player_marks(PlayerId(9), 1).await.is_ok());
        assert_eq!(store.player_count(), 0);
    }

    // =====================================================================
    // JsonFileStore
    // =====================================================================

    #[tokio::test]
    async fn test_json_file_store_round_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut round = GameRound::new(RoundId(1), UNIX_EPOCH);
        round.status = RoundStatus::Started;
        round.drawn_numbers = vec![7, 44];
        round.current_number = Some(44);

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.save_round(&round).await.unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.find_round(RoundId(1)).await.unwrap(), Some(round));
    }

    #[tokio::test]
    async fn test_json_file_store_missing_records_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.find_round(RoundId(2)).await.unwrap().is_none());
        assert!(store.find_player(PlayerId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_store_update_marks() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.save_player(&player(8)).await.unwrap();
        store.update_player_marks(PlayerId(8), 30).await.unwrap();
        store.update_player_marks(PlayerId(8), 2).await.unwrap();

        let found = store.find_player(PlayerId(8)).await.unwrap().unwrap();
        assert_eq!(found.marked_numbers.into_iter().collect::<Vec<_>>(), vec![2, 30]);
    }

    #[tokio::test]
    async fn test_json_file_store_corrupt_record_returns_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("players").join("4.json"), b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.find_player(PlayerId(4)).await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_json_file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.save_player(&player(1)).await.unwrap();
        store.save_player(&player(1)).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path().join("players")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["1.json".to_string()]);
    }
}
