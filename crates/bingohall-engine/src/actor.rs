//! Engine actor: runs a [`DrawEngine`] on its own Tokio task.
//!
//! Commands arrive over a bounded mpsc channel and are handled one at a
//! time, interleaved with the draw ticks, the pending phase deadline and
//! the periodic session sweep. Nothing outside this task ever touches the
//! engine.
//!
//! Store reads for players who are not in memory yet are the one thing
//! that can be slow. They run on a spawned task and report back over a
//! second channel, so a stalled store delays that join alone and never
//! the draw loop.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use bingohall_protocol::{Card, ConnectionId, PlayerId};
use bingohall_tick::Clock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    Broadcaster, DrawEngine, EngineConfig, EngineError, MarkOutcome, PlayerProgress,
    RoundSnapshot, Store,
};

/// Commands sent to the engine actor.
///
/// Variants with a `reply` are request/response; the rest are
/// fire-and-forget.
enum EngineCommand {
    Join {
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    RegisterPlayer {
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: String,
        reply: oneshot::Sender<Result<Card, EngineError>>,
    },
    Mark {
        player_id: PlayerId,
        number: u8,
        reply: oneshot::Sender<MarkOutcome>,
    },
    CallNumber {
        reply: oneshot::Sender<Option<u8>>,
    },
    StopRound {
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RoundSnapshot>,
    },
    Player {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<PlayerProgress>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A join or registration waiting on its player to be loaded.
enum Admission {
    Join {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    Register {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<Card, EngineError>>,
    },
}

impl Admission {
    fn fail(self, error: EngineError) {
        match self {
            Self::Join { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Register { reply, .. } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// A finished player load, on its way back to the actor.
struct Loaded {
    player_id: PlayerId,
    name: String,
    admission: Admission,
    result: Result<Option<PlayerProgress>, EngineError>,
}

/// Handle to the running engine.
///
/// Cheap to clone. Every method fails with [`EngineError::Unavailable`]
/// once the actor has stopped.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Joins `player_id` to the round on `connection_id`. Returns whether
    /// this was a fresh join rather than a reconnect.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: impl Into<String>,
    ) -> Result<bool, EngineError> {
        let name = name.into();
        self.request(|reply| EngineCommand::Join {
            connection_id,
            player_id,
            name,
            reply,
        })
        .await?
    }

    /// Fetches (or creates) the player's card.
    pub async fn register_player(
        &self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        name: impl Into<String>,
    ) -> Result<Card, EngineError> {
        let name = name.into();
        self.request(|reply| EngineCommand::RegisterPlayer {
            connection_id,
            player_id,
            name,
            reply,
        })
        .await?
    }

    pub async fn mark(&self, player_id: PlayerId, number: u8) -> Result<MarkOutcome, EngineError> {
        self.request(|reply| EngineCommand::Mark {
            player_id,
            number,
            reply,
        })
        .await
    }

    /// Draws one number now. `None` if the round is not started.
    pub async fn call_number(&self) -> Result<Option<u8>, EngineError> {
        self.request(|reply| EngineCommand::CallNumber { reply }).await
    }

    /// Completes the round early. `false` if it was already completed.
    pub async fn stop_round(&self) -> Result<bool, EngineError> {
        self.request(|reply| EngineCommand::StopRound { reply }).await
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), EngineError> {
        self.sender
            .send(EngineCommand::Disconnect { connection_id })
            .await
            .map_err(|_| EngineError::Unavailable)
    }

    pub async fn snapshot(&self) -> Result<RoundSnapshot, EngineError> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    pub async fn player(&self, player_id: PlayerId) -> Result<Option<PlayerProgress>, EngineError> {
        self.request(|reply| EngineCommand::Player { player_id, reply })
            .await
    }

    /// Stops the actor after flushing pending writes. Resolves once the
    /// flush is done.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Shutdown { reply }).await
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| EngineError::Unavailable)?;
        reply_rx.await.map_err(|_| EngineError::Unavailable)
    }
}

struct EngineActor<S: Store, B: Broadcaster> {
    engine: DrawEngine<S, B>,
    receiver: mpsc::Receiver<EngineCommand>,
    loads_tx: mpsc::UnboundedSender<Loaded>,
    loads: mpsc::UnboundedReceiver<Loaded>,
    sweep: tokio::time::Interval,
}

impl<S: Store, B: Broadcaster> EngineActor<S, B> {
    async fn run(mut self) {
        tracing::info!(round_id = %self.engine.round().id, "engine actor started");

        loop {
            let deadline = self.engine.next_deadline();
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone.
                        self.engine.shutdown().await;
                        break;
                    };
                    if !self.handle(command).await {
                        break;
                    }
                }
                Some(loaded) = self.loads.recv() => {
                    self.on_loaded(loaded);
                }
                _ = self.engine.wait_for_tick() => {
                    self.engine.draw_tick();
                }
                _ = sleep_until(deadline) => {
                    self.engine.fire_due();
                }
                _ = self.sweep.tick() => {
                    self.engine.sweep();
                }
            }
        }

        tracing::info!("engine actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Join {
                connection_id,
                player_id,
                name,
                reply,
            } => {
                self.admit(player_id, name, Admission::Join { connection_id, reply });
            }
            EngineCommand::RegisterPlayer {
                connection_id,
                player_id,
                name,
                reply,
            } => {
                self.admit(player_id, name, Admission::Register { connection_id, reply });
            }
            EngineCommand::Mark {
                player_id,
                number,
                reply,
            } => {
                let _ = reply.send(self.engine.mark(player_id, number));
            }
            EngineCommand::CallNumber { reply } => {
                let _ = reply.send(self.engine.call_number());
            }
            EngineCommand::StopRound { reply } => {
                let _ = reply.send(self.engine.stop_round());
            }
            EngineCommand::Disconnect { connection_id } => {
                self.engine.disconnect(connection_id);
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            EngineCommand::Player { player_id, reply } => {
                let _ = reply.send(self.engine.player(player_id).cloned());
            }
            EngineCommand::Shutdown { reply } => {
                self.engine.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Finishes the admission now if the player is in memory, otherwise
    /// starts loading it off the engine task.
    fn admit(&mut self, player_id: PlayerId, name: String, admission: Admission) {
        if self.engine.is_loaded(player_id) {
            self.finish(player_id, &name, admission);
            return;
        }
        let load = self.engine.load_player(player_id);
        let loads = self.loads_tx.clone();
        tokio::spawn(async move {
            let result = load.await;
            let _ = loads.send(Loaded {
                player_id,
                name,
                admission,
                result,
            });
        });
    }

    fn on_loaded(&mut self, loaded: Loaded) {
        let Loaded {
            player_id,
            name,
            admission,
            result,
        } = loaded;
        match result {
            Ok(progress) => {
                self.engine.admit_player(player_id, &name, progress);
                self.finish(player_id, &name, admission);
            }
            Err(error) => {
                tracing::warn!(%player_id, %error, "player load failed");
                admission.fail(error);
            }
        }
    }

    fn finish(&mut self, player_id: PlayerId, name: &str, admission: Admission) {
        match admission {
            Admission::Join {
                connection_id,
                reply,
            } => {
                let result = self.engine.join_loaded(connection_id, player_id, name);
                if let Err(error) = &result {
                    tracing::warn!(%player_id, %error, "join failed");
                }
                let _ = reply.send(result);
            }
            Admission::Register {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.engine.register_loaded(connection_id, player_id, name));
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}

/// Builds a [`DrawEngine`], loads or creates its round, and spawns the
/// actor task.
///
/// # Errors
/// Fails only if the round cannot be loaded or created; in that case no
/// task is spawned.
pub async fn spawn_engine<S: Store, B: Broadcaster>(
    config: EngineConfig,
    store: Arc<S>,
    broadcaster: B,
    clock: Arc<dyn Clock>,
) -> Result<EngineHandle, EngineError> {
    let channel_size = config.channel_size.max(1);
    let sweep_interval = config.sweep_interval.max(Duration::from_millis(1));

    let mut engine = DrawEngine::new(config, store, broadcaster, clock);
    engine.initialize().await?;

    let mut sweep = tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let (sender, receiver) = mpsc::channel(channel_size);
    let (loads_tx, loads) = mpsc::unbounded_channel();
    let actor = EngineActor {
        engine,
        receiver,
        loads_tx,
        loads,
        sweep,
    };
    tokio::spawn(actor.run());

    Ok(EngineHandle { sender })
}
