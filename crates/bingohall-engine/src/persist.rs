//! Background persistence queue.
//!
//! The draw loop must not wait on disk, so every save is handed to a
//! single background task over an unbounded channel. One task means saves
//! land in the order they were submitted; a failure is logged and the
//! next save of the same record heals it.

use std::sync::Arc;

use bingohall_protocol::PlayerId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{GameRound, PlayerProgress, Store};

enum PersistJob {
    SaveRound(GameRound),
    SavePlayer(PlayerProgress),
    UpdateMarks { player_id: PlayerId, number: u8 },
    Flush(oneshot::Sender<()>),
}

/// Submits writes to a [`Store`] without waiting for them.
#[derive(Clone)]
pub struct Persister {
    sender: mpsc::UnboundedSender<PersistJob>,
}

impl Persister {
    /// Spawns the writer task. It exits once every `Persister` clone has
    /// been dropped and the queue is drained.
    pub fn spawn<S: Store>(store: Arc<S>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, receiver));
        (Self { sender }, task)
    }

    pub fn save_round(&self, round: GameRound) {
        self.submit(PersistJob::SaveRound(round));
    }

    pub fn save_player(&self, player: PlayerProgress) {
        self.submit(PersistJob::SavePlayer(player));
    }

    pub fn update_marks(&self, player_id: PlayerId, number: u8) {
        self.submit(PersistJob::UpdateMarks { player_id, number });
    }

    /// Resolves once every job submitted before this call has been
    /// attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(PersistJob::Flush(tx));
        let _ = rx.await;
    }

    fn submit(&self, job: PersistJob) {
        if self.sender.send(job).is_err() {
            tracing::warn!("persistence task has stopped, dropping write");
        }
    }
}

async fn run<S: Store>(store: Arc<S>, mut receiver: mpsc::UnboundedReceiver<PersistJob>) {
    while let Some(job) = receiver.recv().await {
        match job {
            PersistJob::SaveRound(round) => {
                if let Err(error) = store.save_round(&round).await {
                    tracing::warn!(
                        round_id = %round.id,
                        %error,
                        "failed to persist round"
                    );
                }
            }
            PersistJob::SavePlayer(player) => {
                if let Err(error) = store.save_player(&player).await {
                    tracing::warn!(
                        player_id = %player.player_id,
                        %error,
                        "failed to persist player"
                    );
                }
            }
            PersistJob::UpdateMarks { player_id, number } => {
                if let Err(error) = store.update_player_marks(player_id, number).await {
                    tracing::warn!(%player_id, number, %error, "failed to persist mark");
                }
            }
            PersistJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, deal_card};
    use bingohall_protocol::RoundId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::UNIX_EPOCH;

    #[tokio::test]
    async fn test_persister_flush_waits_for_prior_writes() {
        let store = Arc::new(MemoryStore::new());
        let (persister, _task) = Persister::spawn(Arc::clone(&store));

        let mut round = GameRound::new(RoundId(1), UNIX_EPOCH);
        persister.save_round(round.clone());
        round.drawn_numbers.push(9);
        persister.save_round(round.clone());
        persister.flush().await;

        assert_eq!(store.find_round(RoundId(1)).await.unwrap(), Some(round));
    }

    #[tokio::test]
    async fn test_persister_marks_after_save_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (persister, _task) = Persister::spawn(Arc::clone(&store));

        let card = deal_card(&mut StdRng::seed_from_u64(3));
        persister.save_player(PlayerProgress::new(PlayerId(3), String::new(), card, 0));
        persister.update_marks(PlayerId(3), 40);
        persister.flush().await;

        let stored = store.find_player(PlayerId(3)).await.unwrap().unwrap();
        assert!(stored.marked_numbers.contains(&40));
    }

    #[tokio::test]
    async fn test_persister_task_exits_when_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (persister, task) = Persister::spawn(store);
        drop(persister);
        task.await.unwrap();
    }
}
