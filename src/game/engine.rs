//! Room engine: authoritative rules state for one room
//!
//! All methods are synchronous. Each call either rejects with a [`GameError`]
//! before touching state, or applies fully and queues the resulting events and
//! timer commands for the room actor to flush.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::GameEvent;

use super::auction::Auction;
use super::dice::DiceSource;
use super::error::{GameError, GameResult};
use super::rules::Rules;
use super::state::{Player, PlayerPatch, Room, RoomPhase};
use super::timer::{Deadline, TimerCommand, TimerSlot, Timers, TurnPhase};
use super::GameAction;

/// Colors handed out in join order
const PALETTE: [&str; 8] = [
    "red", "blue", "green", "yellow", "purple", "orange", "pink", "teal",
];

const MAX_NAME_CHARS: usize = 20;

pub struct GameEngine {
    pub(super) room: Room,
    pub(super) rules: Arc<Rules>,
    pub(super) dice: Box<dyn DiceSource>,
    pub(super) auction: Option<Auction>,
    pub(super) timers: Timers,
    /// Eliminations so far; the next one gets `eliminations + 1`
    pub(super) eliminations: u32,
    expired: bool,
    outbox: Vec<GameEvent>,
}

impl GameEngine {
    /// Create a waiting room with its host as the only player
    pub fn new(
        room_id: Uuid,
        code: String,
        host_name: &str,
        max_players: Option<usize>,
        start_money: Option<i64>,
        rules: Arc<Rules>,
        dice: Box<dyn DiceSource>,
    ) -> GameResult<Self> {
        let name = validate_name(host_name)?;
        let max_players = max_players.unwrap_or(rules.max_players);
        if max_players < rules.min_players || max_players > rules.max_players {
            return Err(GameError::InvalidRoomSettings("player limit out of range"));
        }
        let start_money = start_money.unwrap_or(rules.default_start_money);
        if start_money < rules.min_start_money || start_money > rules.max_start_money {
            return Err(GameError::InvalidRoomSettings("starting money out of range"));
        }

        let host = Player::new(Uuid::new_v4(), name, Some(PALETTE[0].to_string()), start_money);
        let room = Room::new(room_id, code, host, max_players, start_money);

        Ok(Self {
            room,
            rules,
            dice,
            auction: None,
            timers: Timers::new(),
            eliminations: 0,
            expired: false,
            outbox: Vec::new(),
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn host_id(&self) -> Uuid {
        self.room.host_id
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_timer_commands(&mut self) -> Vec<TimerCommand> {
        self.timers.drain_commands()
    }

    pub(super) fn emit(&mut self, event: GameEvent) {
        self.outbox.push(event);
    }

    // ------------------------------------------------------------------
    // Lobby
    // ------------------------------------------------------------------

    pub fn join(&mut self, name: &str) -> GameResult<Uuid> {
        let name = validate_name(name)?;
        if self.room.game_state != RoomPhase::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.room.players.len() >= self.room.max_players {
            return Err(GameError::RoomFull);
        }

        let color = PALETTE
            .iter()
            .find(|c| !self.room.players.iter().any(|p| p.color.as_deref() == Some(**c)))
            .map(|c| c.to_string());
        let player = Player::new(Uuid::new_v4(), name, color, self.room.start_money);
        let id = player.id;

        info!(room_id = %self.room.id, player_id = %id, "Player joined room");
        self.room.players.push(player.clone());
        self.emit(GameEvent::PlayerJoined { player });
        Ok(id)
    }

    pub fn rejoin(&mut self, player_id: Uuid) -> GameResult<()> {
        let idx = self
            .room
            .player_index(player_id)
            .ok_or(GameError::PlayerNotFound)?;

        self.room.players[idx].apply(PlayerPatch {
            is_connected: Some(true),
            ..PlayerPatch::default()
        });

        if player_id == self.room.host_id && self.room.expires_at.take().is_some() {
            self.timers.clear_expiry();
            info!(room_id = %self.room.id, "Host reconnected, room expiry cleared");
        }

        let player = self.room.players[idx].clone();
        self.emit(GameEvent::PlayerJoined { player });
        Ok(())
    }

    /// Connection dropped. Gameplay and timers carry on without the player.
    pub fn disconnect(&mut self, player_id: Uuid) {
        let Some(idx) = self.room.player_index(player_id) else {
            return;
        };
        self.room.players[idx].apply(PlayerPatch {
            is_connected: Some(false),
            ..PlayerPatch::default()
        });
        self.emit(GameEvent::PlayerDisconnected { player_id });

        if player_id == self.room.host_id {
            let expiry = self.rules.room_expiry;
            let hours = expiry.as_secs() / 3600;
            self.room.expires_at = chrono::Duration::from_std(expiry)
                .ok()
                .map(|d| Utc::now() + d);
            self.timers.arm_expiry(expiry);

            info!(
                room_id = %self.room.id,
                code = %self.room.code,
                "Host disconnected, room scheduled for expiry"
            );
            self.emit(GameEvent::HostDisconnected {
                message: format!("Host has disconnected. Room will expire in {hours} hours."),
            });
        }
    }

    fn start_game(&mut self, player_id: Uuid) -> GameResult<()> {
        self.room
            .player_index(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if player_id != self.room.host_id {
            return Err(GameError::NotHost);
        }
        if self.room.game_state != RoomPhase::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.room.players.len() < self.rules.min_players {
            return Err(GameError::NotEnoughPlayers(self.rules.min_players));
        }

        let start_money = self.room.start_money;
        for player in &mut self.room.players {
            player.apply(PlayerPatch::new_game(start_money));
        }
        self.eliminations = 0;
        self.room.current_player_index = self.dice.pick(self.room.players.len());
        self.room.turn_number = 1;
        self.room.advance_phase(RoomPhase::Playing);

        let first_player_id = self.room.players[self.room.current_player_index].id;
        info!(
            room_id = %self.room.id,
            player_count = self.room.players.len(),
            first_player = %first_player_id,
            "Game started"
        );
        self.emit(GameEvent::GameStarted { first_player_id });
        self.arm_turn_timer(TurnPhase::Roll);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Apply one client action on behalf of `player_id`
    pub fn apply(&mut self, player_id: Uuid, action: GameAction) -> GameResult<()> {
        let result = match action {
            GameAction::StartGame => self.start_game(player_id),
            GameAction::RollDice => self.roll_dice(player_id),
            GameAction::EndTurn => self.end_turn(player_id),
            GameAction::ChooseDoubleTurn { continue_turn } => {
                self.choose_double_turn(player_id, continue_turn)
            }
            GameAction::PayJailFine => self.pay_jail_fine(player_id),
            GameAction::BuyProperty {
                property_index,
                price,
            } => self.buy_property(player_id, property_index, price),
            GameAction::BuyHouse { property_index } => self.buy_house(player_id, property_index),
            GameAction::BuildHotel { property_index } => {
                self.build_hotel(player_id, property_index)
            }
            GameAction::MortgageProperty { property_index } => {
                self.mortgage_property(player_id, property_index)
            }
            GameAction::UnmortgageProperty { property_index } => {
                self.unmortgage_property(player_id, property_index)
            }
            GameAction::TradeProperty(offer) => self.trade_property(player_id, offer),
            GameAction::SellPropertyToBank { property_index } => {
                self.sell_property_to_bank(player_id, property_index)
            }
            GameAction::StartPropertyAuction {
                property_index,
                starting_bid,
            } => self.start_property_auction(player_id, property_index, starting_bid),
            GameAction::PlaceAuctionBid { bid_amount } => {
                self.place_auction_bid(player_id, bid_amount)
            }
        };

        if let Err(e) = &result {
            debug!(
                room_id = %self.room.id,
                player_id = %player_id,
                kind = ?e.kind(),
                error = %e,
                "Action rejected"
            );
            // Rejections never leave partial output behind
            self.outbox.clear();
        }
        result
    }

    /// A scheduled deadline fired. Stale deadlines are ignored.
    pub fn on_deadline(&mut self, deadline: Deadline) {
        let turn_phase = self.timers.turn().map(|t| t.phase);
        if !self.timers.take_if_current(deadline) {
            debug!(room_id = %self.room.id, ?deadline, "Ignoring stale deadline");
            return;
        }

        match deadline.slot {
            TimerSlot::Turn => {
                if self.room.game_state != RoomPhase::Playing {
                    return;
                }
                match turn_phase {
                    Some(TurnPhase::Roll) => self.on_roll_timeout(),
                    Some(TurnPhase::Action) => self.on_action_timeout(),
                    None => {}
                }
            }
            TimerSlot::Auction => self.resolve_auction(),
            TimerSlot::Expiry => self.expire(),
        }
    }

    fn expire(&mut self) {
        info!(room_id = %self.room.id, code = %self.room.code, "Room expired");
        self.timers.clear_all();
        self.auction = None;
        self.expired = true;
        self.emit(GameEvent::RoomExpired);
    }

    // ------------------------------------------------------------------
    // Guards and timer helpers shared by the rule modules
    // ------------------------------------------------------------------

    pub(super) fn is_playing(&self) -> bool {
        self.room.game_state == RoomPhase::Playing
    }

    pub(super) fn require_playing(&self) -> GameResult<()> {
        if self.is_playing() {
            Ok(())
        } else {
            Err(GameError::GameNotInProgress)
        }
    }

    /// A non-eliminated player of a game in progress
    pub(super) fn require_member(&self, player_id: Uuid) -> GameResult<usize> {
        self.require_playing()?;
        let idx = self
            .room
            .player_index(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if self.room.players[idx].is_eliminated {
            return Err(GameError::PlayerEliminated);
        }
        Ok(idx)
    }

    /// The player whose turn it is
    pub(super) fn require_current(&self, player_id: Uuid) -> GameResult<usize> {
        let idx = self.require_member(player_id)?;
        if idx != self.room.current_player_index {
            return Err(GameError::NotYourTurn);
        }
        Ok(idx)
    }

    pub(super) fn arm_turn_timer(&mut self, phase: TurnPhase) {
        let after = match phase {
            TurnPhase::Roll => self.rules.roll_timeout,
            TurnPhase::Action => self.rules.action_timeout,
        };
        let timer = self.timers.arm_turn(phase, after);
        self.emit(GameEvent::TurnTimerUpdated {
            active: true,
            phase: Some(timer.phase),
            ends_at: Some(timer.ends_at),
            server_now: unix_millis(),
        });
    }

    pub(super) fn clear_turn_timer(&mut self) {
        if self.timers.clear_turn() {
            self.emit(GameEvent::TurnTimerUpdated {
                active: false,
                phase: None,
                ends_at: None,
                server_now: unix_millis(),
            });
        }
    }
}

fn validate_name(name: &str) -> GameResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(GameError::InvalidName);
    }
    Ok(name.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::game::dice::testing::ScriptedDice;

    /// Started game with `players` seats; player 0 moves first. `rolls` feed the dice.
    pub fn started_game(players: usize, rolls: &[(u8, u8)], picks: &[usize]) -> GameEngine {
        let mut script: Vec<usize> = vec![0];
        script.extend_from_slice(picks);
        let dice = ScriptedDice::new().with_rolls(rolls).with_picks(&script);
        let mut engine = GameEngine::new(
            Uuid::new_v4(),
            "TEST01".into(),
            "p0",
            None,
            None,
            Arc::new(Rules::default()),
            Box::new(dice),
        )
        .expect("valid room");
        for i in 1..players {
            engine.join(&format!("p{i}")).expect("join");
        }
        let host = engine.host_id();
        engine.apply(host, GameAction::StartGame).expect("start");
        engine.take_events();
        engine.take_timer_commands();
        engine
    }

    pub fn id(engine: &GameEngine, idx: usize) -> Uuid {
        engine.room.players[idx].id
    }

    pub fn player(engine: &GameEngine, idx: usize) -> &Player {
        &engine.room.players[idx]
    }

    pub fn player_mut(engine: &mut GameEngine, idx: usize) -> &mut Player {
        &mut engine.room.players[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::game::dice::testing::ScriptedDice;

    fn waiting_room() -> GameEngine {
        GameEngine::new(
            Uuid::new_v4(),
            "ROOM42".into(),
            "host",
            Some(3),
            None,
            Arc::new(Rules::default()),
            Box::new(ScriptedDice::new()),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_settings() {
        let rules = Arc::new(Rules::default());
        let low_money = GameEngine::new(
            Uuid::new_v4(),
            "X".into(),
            "host",
            None,
            Some(100),
            rules.clone(),
            Box::new(ScriptedDice::new()),
        );
        assert!(matches!(low_money, Err(GameError::InvalidRoomSettings(_))));

        let blank = GameEngine::new(
            Uuid::new_v4(),
            "X".into(),
            "   ",
            None,
            None,
            rules,
            Box::new(ScriptedDice::new()),
        );
        assert!(matches!(blank, Err(GameError::InvalidName)));
    }

    #[test]
    fn join_assigns_distinct_colors_and_enforces_capacity() {
        let mut engine = waiting_room();
        engine.join("a").unwrap();
        engine.join("b").unwrap();
        assert_eq!(engine.join("c"), Err(GameError::RoomFull));

        let colors: Vec<_> = engine.room.players.iter().map(|p| p.color.clone()).collect();
        assert_eq!(colors.len(), 3);
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
    }

    #[test]
    fn only_host_starts_with_enough_players() {
        let mut engine = waiting_room();
        let host = engine.host_id();
        assert_eq!(
            engine.apply(host, GameAction::StartGame),
            Err(GameError::NotEnoughPlayers(2))
        );

        let guest = engine.join("guest").unwrap();
        assert_eq!(
            engine.apply(guest, GameAction::StartGame),
            Err(GameError::NotHost)
        );
        assert!(engine.apply(host, GameAction::StartGame).is_ok());
        assert_eq!(engine.room.game_state, RoomPhase::Playing);
        assert!(engine.timers.turn().is_some());
        assert_eq!(engine.join("late"), Err(GameError::GameAlreadyStarted));
    }

    #[test]
    fn start_resets_players() {
        let mut engine = waiting_room();
        engine.join("guest").unwrap();
        engine.room.players[1].money = 1;
        engine.room.players[1].position = 17;
        engine.room.players[1].grant_property(3, false);

        let host = engine.host_id();
        engine.apply(host, GameAction::StartGame).unwrap();
        for p in &engine.room.players {
            assert_eq!(p.money, 15_000);
            assert_eq!(p.position, 0);
            assert!(p.properties.is_empty());
        }
        assert_eq!(engine.room.turn_number, 1);
    }

    #[test]
    fn host_disconnect_schedules_expiry_and_rejoin_clears_it() {
        let mut engine = started_game(2, &[], &[]);
        let host = engine.host_id();

        engine.disconnect(host);
        assert!(engine.room.expires_at.is_some());
        assert!(!engine.room.players[0].is_connected);
        let events = engine.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::HostDisconnected { .. })));
        let cmds = engine.take_timer_commands();
        let deadline = cmds
            .iter()
            .find_map(|c| match c {
                TimerCommand::Arm { deadline, .. } if deadline.slot == TimerSlot::Expiry => {
                    Some(*deadline)
                }
                _ => None,
            })
            .expect("expiry armed");

        engine.rejoin(host).unwrap();
        assert!(engine.room.expires_at.is_none());
        // The old expiry is now stale
        engine.on_deadline(deadline);
        assert!(!engine.is_expired());
    }

    #[test]
    fn expiry_marks_room_expired() {
        let mut engine = started_game(2, &[], &[]);
        let host = engine.host_id();
        engine.disconnect(host);
        let deadline = engine
            .take_timer_commands()
            .into_iter()
            .find_map(|c| match c {
                TimerCommand::Arm { deadline, .. } if deadline.slot == TimerSlot::Expiry => {
                    Some(deadline)
                }
                _ => None,
            })
            .unwrap();

        engine.on_deadline(deadline);
        assert!(engine.is_expired());
        assert!(engine.timers.turn().is_none());
    }

    #[test]
    fn non_host_disconnect_does_not_expire() {
        let mut engine = started_game(2, &[], &[]);
        let guest = id(&engine, 1);
        engine.disconnect(guest);
        assert!(engine.room.expires_at.is_none());
        assert!(!player(&engine, 1).is_connected);
    }
}
