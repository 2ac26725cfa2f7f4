//! Room actors and the room registry
//!
//! Each room runs as one task that owns its [`GameEngine`]. Client actions,
//! timer deadlines and disconnects all arrive through the same inbox, so a
//! room applies one input fully before looking at the next.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{RoomBroadcast, ServerMsg};

use super::dice::SeededDice;
use super::engine::GameEngine;
use super::error::{GameError, GameResult};
use super::rules::Rules;
use super::state::Room;
use super::timer::{Deadline, TimerCommand, TimerSlot};
use super::GameAction;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

/// Everything a room task reacts to
#[derive(Debug)]
pub enum RoomInput {
    Action {
        player_id: Uuid,
        action: GameAction,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Join {
        name: String,
        reply: oneshot::Sender<GameResult<(Uuid, Room)>>,
    },
    Rejoin {
        player_id: Uuid,
        reply: oneshot::Sender<GameResult<Room>>,
    },
    Disconnected {
        player_id: Uuid,
    },
    Deadline(Deadline),
    Snapshot {
        reply: oneshot::Sender<Room>,
    },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub code: String,
    pub input_tx: mpsc::Sender<RoomInput>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomInput,
    ) -> GameResult<T> {
        let (reply, rx) = oneshot::channel();
        self.input_tx
            .send(build(reply))
            .await
            .map_err(|_| GameError::RoomClosed)?;
        rx.await.map_err(|_| GameError::RoomClosed)
    }

    pub async fn act(&self, player_id: Uuid, action: GameAction) -> GameResult<()> {
        self.request(|reply| RoomInput::Action {
            player_id,
            action,
            reply,
        })
        .await?
    }

    pub async fn join(&self, name: String) -> GameResult<(Uuid, Room)> {
        self.request(|reply| RoomInput::Join { name, reply }).await?
    }

    pub async fn rejoin(&self, player_id: Uuid) -> GameResult<Room> {
        self.request(|reply| RoomInput::Rejoin { player_id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> GameResult<Room> {
        self.request(|reply| RoomInput::Snapshot { reply }).await
    }

    pub async fn disconnected(&self, player_id: Uuid) {
        if self
            .input_tx
            .send(RoomInput::Disconnected { player_id })
            .await
            .is_err()
        {
            debug!(room_id = %self.id, "Room already closed");
        }
    }
}

/// Task that owns one room's engine
pub struct RoomActor {
    engine: GameEngine,
    input_rx: mpsc::Receiver<RoomInput>,
    /// Weak so pending timers never keep a dead room alive
    self_tx: mpsc::WeakSender<RoomInput>,
    events_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    timers: HashMap<TimerSlot, JoinHandle<()>>,
}

impl RoomActor {
    pub fn new(engine: GameEngine) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(engine.room().players.len()));

        let handle = RoomHandle {
            id: engine.room().id,
            code: engine.room().code.clone(),
            input_tx: input_tx.clone(),
            events_tx: events_tx.clone(),
            player_count: player_count.clone(),
        };

        let actor = Self {
            engine,
            input_rx,
            self_tx: input_tx.downgrade(),
            events_tx,
            player_count,
            timers: HashMap::new(),
        };
        (actor, handle)
    }

    /// Process inputs until the room expires or every handle is dropped
    pub async fn run(mut self) {
        let room_id = self.engine.room().id;
        info!(room_id = %room_id, code = %self.engine.room().code, "Room opened");
        self.flush();

        while let Some(input) = self.input_rx.recv().await {
            self.handle(input);
            if self.engine.is_expired() {
                break;
            }
        }

        for (_, task) in self.timers.drain() {
            task.abort();
        }
        info!(room_id = %room_id, "Room closed");
    }

    /// Apply one input. Broadcasts go out before the sender gets its reply.
    fn handle(&mut self, input: RoomInput) {
        match input {
            RoomInput::Action {
                player_id,
                action,
                reply,
            } => {
                let result = self.engine.apply(player_id, action);
                self.flush();
                let _ = reply.send(result);
            }
            RoomInput::Join { name, reply } => {
                let result = self
                    .engine
                    .join(&name)
                    .map(|id| (id, self.engine.room().clone()));
                self.flush();
                let _ = reply.send(result);
            }
            RoomInput::Rejoin { player_id, reply } => {
                let result = self
                    .engine
                    .rejoin(player_id)
                    .map(|()| self.engine.room().clone());
                self.flush();
                let _ = reply.send(result);
            }
            RoomInput::Disconnected { player_id } => {
                self.engine.disconnect(player_id);
                self.flush();
            }
            RoomInput::Deadline(deadline) => {
                self.engine.on_deadline(deadline);
                self.flush();
            }
            RoomInput::Snapshot { reply } => {
                let _ = reply.send(self.engine.room().clone());
            }
        }
    }

    /// Publish queued events and reconcile timer tasks
    fn flush(&mut self) {
        for command in self.engine.take_timer_commands() {
            self.apply_timer(command);
        }

        let events = self.engine.take_events();
        if !events.is_empty() {
            let room = self.engine.room().clone();
            for event in events {
                let msg = ServerMsg::Room(RoomBroadcast {
                    event,
                    room: room.clone(),
                });
                // No subscribers is fine
                let _ = self.events_tx.send(msg);
            }
        }

        self.player_count
            .store(self.engine.room().players.len(), Ordering::Relaxed);
    }

    fn apply_timer(&mut self, command: TimerCommand) {
        match command {
            TimerCommand::Arm { deadline, after } => {
                let tx = self.self_tx.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(RoomInput::Deadline(deadline)).await;
                    }
                });
                if let Some(previous) = self.timers.insert(deadline.slot, task) {
                    previous.abort();
                }
            }
            TimerCommand::Cancel(slot) => {
                if let Some(task) = self.timers.remove(&slot) {
                    task.abort();
                }
            }
        }
    }
}

/// Registry of all live rooms, addressable by id and by join code
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
    codes: DashMap<String, Uuid>,
    rules: Arc<Rules>,
    seed: Option<u64>,
    rooms_created: AtomicU64,
}

impl RoomRegistry {
    pub fn new(rules: Arc<Rules>, seed: Option<u64>) -> Self {
        Self {
            rooms: DashMap::new(),
            codes: DashMap::new(),
            rules,
            seed,
            rooms_created: AtomicU64::new(0),
        }
    }

    /// Create a room and spawn its task. Returns the handle, the host's
    /// player id and the initial snapshot.
    pub fn create_room(
        self: &Arc<Self>,
        host_name: &str,
        max_players: Option<usize>,
        start_money: Option<i64>,
    ) -> GameResult<(RoomHandle, Uuid, Room)> {
        let n = self.rooms_created.fetch_add(1, Ordering::Relaxed);
        let seed = match self.seed {
            Some(base) => base.wrapping_add(n),
            None => rand::random(),
        };

        let id = Uuid::new_v4();
        let code = self.unused_code();
        let engine = GameEngine::new(
            id,
            code.clone(),
            host_name,
            max_players,
            start_money,
            self.rules.clone(),
            Box::new(SeededDice::new(seed)),
        )?;
        let host_id = engine.host_id();
        let room = engine.room().clone();

        let (actor, handle) = RoomActor::new(engine);
        self.rooms.insert(id, handle.clone());
        self.codes.insert(code.clone(), id);

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            actor.run().await;
            registry.remove(&id);
        });

        info!(room_id = %id, code = %code, host_id = %host_id, "Room created");
        Ok((handle, host_id, room))
    }

    fn unused_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.codes.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Codes are matched case-insensitively
    pub fn find_by_code(&self, code: &str) -> Option<RoomHandle> {
        let code = code.trim().to_ascii_uppercase();
        let id = *self.codes.get(&code)?.value();
        self.get(&id)
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        let (_, handle) = self.rooms.remove(id)?;
        self.codes.remove(&handle.code);
        info!(room_id = %id, code = %handle.code, "Room removed from registry");
        Some(handle)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::GameEvent;
    use std::time::Duration;

    fn registry() -> Arc<RoomRegistry> {
        Arc::new(RoomRegistry::new(Arc::new(Rules::default()), Some(7)))
    }

    fn event_type(msg: &ServerMsg) -> Option<&GameEvent> {
        match msg {
            ServerMsg::Room(b) => Some(&b.event),
            ServerMsg::Direct(_) => None,
        }
    }

    #[tokio::test]
    async fn create_and_find_by_code() {
        let registry = registry();
        let (handle, host_id, room) = registry.create_room("host", None, None).unwrap();

        assert_eq!(room.code.len(), CODE_LEN);
        assert_eq!(room.host_id, host_id);
        let found = registry
            .find_by_code(&room.code.to_lowercase())
            .expect("found by code");
        assert_eq!(found.id, handle.id);
        assert!(registry.find_by_code("NOPE00").is_none());
        assert_eq!(registry.active_rooms(), 1);
    }

    #[tokio::test]
    async fn rejected_action_only_replies() {
        let registry = registry();
        let (handle, _host, _) = registry.create_room("host", None, None).unwrap();
        let (guest, _) = handle.join("guest".into()).await.unwrap();
        let mut rx = handle.subscribe();

        let result = handle.act(guest, GameAction::StartGame).await;
        assert_eq!(result, Err(GameError::NotHost));
        // Nothing was broadcast for the rejection
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcasts_carry_room_snapshot() {
        let registry = registry();
        let (handle, host, _) = registry.create_room("host", None, None).unwrap();
        let mut rx = handle.subscribe();
        tokio_test::assert_ok!(handle.join("guest".into()).await);
        tokio_test::assert_ok!(handle.act(host, GameAction::StartGame).await);

        let joined = rx.recv().await.unwrap();
        assert!(matches!(
            event_type(&joined),
            Some(GameEvent::PlayerJoined { .. })
        ));
        let started = rx.recv().await.unwrap();
        match started {
            ServerMsg::Room(b) => {
                assert!(matches!(b.event, GameEvent::GameStarted { .. }));
                assert_eq!(b.room.players.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(handle.player_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn roll_timer_fires_inside_the_room() {
        let registry = registry();
        let (handle, host, _) = registry.create_room("host", None, None).unwrap();
        handle.join("guest".into()).await.unwrap();
        handle.act(host, GameAction::StartGame).await.unwrap();
        let first = handle.snapshot().await.unwrap().current_player_index;

        tokio::time::sleep(Duration::from_secs(31)).await;
        let room = handle.snapshot().await.unwrap();
        assert_ne!(room.current_player_index, first);
    }

    #[tokio::test(start_paused = true)]
    async fn host_absence_expires_room() {
        let registry = registry();
        let (handle, host, _) = registry.create_room("host", None, None).unwrap();
        let mut rx = handle.subscribe();
        handle.disconnected(host).await;

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60 + 1)).await;
        let mut expired = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(event_type(&msg), Some(GameEvent::RoomExpired)) {
                expired = true;
            }
        }
        assert!(expired);
        // Let the room task finish its cleanup
        tokio::task::yield_now().await;
        assert!(registry.get(&handle.id).is_none());
    }
}
