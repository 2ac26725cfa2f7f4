//! Turn flow: rolling, movement, landing resolution, jail, doubles, turn hand-off

use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{GameEvent, TurnEndReason};

use super::board::{
    self, SquareKind, BOARD_SIZE, FREE_PARKING_POSITION, GO_TO_JAIL_POSITION, JAIL_POSITION,
};
use super::cards::{Card, Deck};
use super::dice::DiceRoll;
use super::engine::GameEngine;
use super::error::{GameError, GameResult};
use super::ledger::RentContext;
use super::state::PlayerPatch;
use super::timer::TurnPhase;

/// How the token reached a square
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    Roll,
    /// Moved by a card; no second card is drawn
    Card(RentContext),
}

/// What the roll left the turn waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RollFlow {
    ExtraRoll,
    AwaitDecision,
    ActionWindow,
    TurnOver(TurnEndReason),
}

/// Side effects of resolving a square
#[derive(Debug, Default)]
struct Landing {
    card_text: Option<&'static str>,
    sent_to_jail: bool,
    /// Emitted after the roll itself
    events: Vec<GameEvent>,
}

impl Landing {
    fn merge(&mut self, other: Landing) {
        self.sent_to_jail |= other.sent_to_jail;
        self.events.extend(other.events);
    }
}

fn is_automatic(reason: Option<TurnEndReason>) -> bool {
    !matches!(reason, None | Some(TurnEndReason::DoubleDeclined))
}

impl GameEngine {
    pub(super) fn roll_dice(&mut self, player_id: Uuid) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let player = &self.room.players[idx];
        if player.pending_double_decision {
            return Err(GameError::PendingDoubleDecision);
        }
        if player.has_rolled_this_turn {
            return Err(GameError::AlreadyRolled);
        }
        if player.is_in_jail && player.jail_turns > 0 {
            return Err(GameError::InJail);
        }

        let flow = self.perform_roll(idx, false);
        self.settle_debts();
        if !self.still_current(player_id) {
            return Ok(());
        }
        match flow {
            RollFlow::ExtraRoll => self.arm_turn_timer(TurnPhase::Roll),
            RollFlow::AwaitDecision | RollFlow::ActionWindow => {
                self.arm_turn_timer(TurnPhase::Action)
            }
            RollFlow::TurnOver(reason) => self.advance_turn(Some(reason)),
        }
        Ok(())
    }

    pub(super) fn end_turn(&mut self, player_id: Uuid) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let player = &self.room.players[idx];
        let jailed = player.is_in_jail && player.jail_turns > 0;
        let rolled = player.has_rolled_this_turn
            || player.pending_double_decision
            || player.consecutive_doubles > 0;
        if !rolled && !jailed {
            return Err(GameError::MustRollFirst);
        }

        if jailed && !rolled {
            self.serve_jail_turn(idx);
        }
        self.advance_turn(None);
        Ok(())
    }

    pub(super) fn choose_double_turn(
        &mut self,
        player_id: Uuid,
        continue_turn: bool,
    ) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        if !self.room.players[idx].pending_double_decision {
            return Err(GameError::NoDoubleDecision);
        }

        self.room.players[idx].pending_double_decision = false;
        self.emit(GameEvent::DoubleDecisionMade {
            player_id,
            continue_turn,
        });

        if continue_turn {
            self.room.players[idx].has_rolled_this_turn = false;
            self.arm_turn_timer(TurnPhase::Roll);
        } else {
            self.advance_turn(Some(TurnEndReason::DoubleDeclined));
        }
        Ok(())
    }

    pub(super) fn pay_jail_fine(&mut self, player_id: Uuid) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let fine = self.rules.jail_fine;
        let player = &mut self.room.players[idx];
        if !player.is_in_jail {
            return Err(GameError::NotInJail);
        }
        if player.money < fine {
            return Err(GameError::InsufficientFunds);
        }

        player.money -= fine;
        player.apply(PlayerPatch::released());
        let rolled = player.has_rolled_this_turn;

        info!(room_id = %self.room.id, player_id = %player_id, "Jail fine paid");
        self.emit(GameEvent::JailFinePaid {
            player_id,
            amount: fine,
        });
        self.settle_debts();
        if !rolled && self.still_current(player_id) {
            self.arm_turn_timer(TurnPhase::Roll);
        }
        Ok(())
    }

    /// Hand the turn to the next player in rotation and open their roll window
    pub(super) fn advance_turn(&mut self, reason: Option<TurnEndReason>) {
        let prev_idx = self.room.current_player_index;
        let Some(previous_player_id) = self.room.players.get(prev_idx).map(|p| p.id) else {
            return;
        };
        self.room.players[prev_idx].apply(PlayerPatch::end_of_turn());

        let Some((next, wrapped)) = self.room.next_in_rotation() else {
            return;
        };
        if wrapped {
            self.room.turn_number += 1;
        }
        self.room.current_player_index = next;
        let next_player_id = self.room.players[next].id;

        debug!(
            room_id = %self.room.id,
            from = %previous_player_id,
            to = %next_player_id,
            turn = self.room.turn_number,
            ?reason,
            "Turn passed"
        );
        self.emit(GameEvent::TurnEnded {
            previous_player_id,
            next_player_id,
            auto_ended: is_automatic(reason),
            reason,
        });
        self.arm_turn_timer(TurnPhase::Roll);
    }

    pub(super) fn on_roll_timeout(&mut self) {
        let idx = self.room.current_player_index;
        let Some(player) = self.room.players.get(idx) else {
            return;
        };
        let player_id = player.id;

        if player.is_in_jail && player.jail_turns > 0 && !player.has_rolled_this_turn {
            self.serve_jail_turn(idx);
            self.advance_turn(Some(TurnEndReason::JailSkip));
            return;
        }
        if player.has_rolled_this_turn || player.pending_double_decision {
            self.advance_turn(Some(TurnEndReason::RollTimeout));
            return;
        }

        info!(
            room_id = %self.room.id,
            player_id = %player_id,
            "Roll timed out, rolling for player"
        );
        let flow = self.perform_roll(idx, true);
        self.settle_debts();
        if !self.still_current(player_id) {
            return;
        }
        let reason = match flow {
            RollFlow::TurnOver(reason) => reason,
            _ => TurnEndReason::RollTimeout,
        };
        self.advance_turn(Some(reason));
    }

    pub(super) fn on_action_timeout(&mut self) {
        info!(room_id = %self.room.id, "Action window timed out");
        self.advance_turn(Some(TurnEndReason::ActionTimeout));
    }

    pub(super) fn send_to_jail(&mut self, idx: usize) {
        let turns = self.rules.jail_skip_turns;
        self.room.players[idx].apply(PlayerPatch::jailed(JAIL_POSITION, turns));
    }

    /// Sit out one jailed turn; release once the sentence is served
    fn serve_jail_turn(&mut self, idx: usize) {
        let player = &mut self.room.players[idx];
        let remaining = player.jail_turns.saturating_sub(1);
        if remaining == 0 {
            player.apply(PlayerPatch::released());
        } else {
            player.jail_turns = remaining;
        }
        let player_id = player.id;
        self.emit(GameEvent::TurnSkippedJail { player_id });
    }

    fn still_current(&self, player_id: Uuid) -> bool {
        self.is_playing() && self.room.current_player().map(|p| p.id) == Some(player_id)
    }

    fn perform_roll(&mut self, idx: usize, auto_rolled: bool) -> RollFlow {
        let roll = DiceRoll::throw(self.dice.as_mut());
        let player_id = self.room.players[idx].id;

        let doubles = {
            let player = &mut self.room.players[idx];
            player.has_rolled_this_turn = true;
            if roll.is_double() {
                player.consecutive_doubles += 1;
            } else {
                player.consecutive_doubles = 0;
            }
            player.consecutive_doubles
        };

        if roll.is_double() && doubles >= 3 {
            self.send_to_jail(idx);
            info!(room_id = %self.room.id, player_id = %player_id, "Third double, sent to jail");
            self.emit(GameEvent::DiceRolled {
                player_id,
                dice1: roll.die1,
                dice2: roll.die2,
                total: roll.total(),
                is_double: true,
                new_position: JAIL_POSITION,
                passed_start: false,
                card_text: None,
                sent_to_jail: true,
                extra_turn_granted: false,
                pending_double_decision: false,
                auto_rolled,
            });
            return RollFlow::TurnOver(TurnEndReason::ThreeDoubles);
        }

        let from = self.room.players[idx].position;
        let steps = from + roll.total();
        let passed_start = steps >= BOARD_SIZE;
        self.move_to(idx, steps % BOARD_SIZE, passed_start);

        let landing = self.resolve_landing(idx, roll.total(), Arrival::Roll);

        let player = &mut self.room.players[idx];
        let mut extra_turn_granted = false;
        let mut pending_double_decision = false;
        if roll.is_double() && !landing.sent_to_jail {
            if doubles == 1 {
                player.has_rolled_this_turn = false;
                extra_turn_granted = true;
            } else {
                player.pending_double_decision = true;
                pending_double_decision = true;
            }
        }
        let new_position = player.position;

        self.emit(GameEvent::DiceRolled {
            player_id,
            dice1: roll.die1,
            dice2: roll.die2,
            total: roll.total(),
            is_double: roll.is_double(),
            new_position,
            passed_start,
            card_text: landing.card_text.map(str::to_string),
            sent_to_jail: landing.sent_to_jail,
            extra_turn_granted,
            pending_double_decision,
            auto_rolled,
        });
        for event in landing.events {
            self.emit(event);
        }

        if extra_turn_granted {
            RollFlow::ExtraRoll
        } else if pending_double_decision {
            RollFlow::AwaitDecision
        } else {
            RollFlow::ActionWindow
        }
    }

    fn move_to(&mut self, idx: usize, position: usize, passes_start: bool) {
        let bonus = self.rules.start_bonus;
        let player = &mut self.room.players[idx];
        player.position = position % BOARD_SIZE;
        if passes_start {
            player.money += bonus;
        }
    }

    /// Apply whatever the square under the player does
    fn resolve_landing(&mut self, idx: usize, dice_total: usize, arrival: Arrival) -> Landing {
        let position = self.room.players[idx].position;
        let mut landing = Landing::default();
        let Some(square) = board::square(position) else {
            return landing;
        };

        match square.kind {
            SquareKind::Tax => {
                self.room.players[idx].money -= square.price;
            }
            SquareKind::Corner if position == GO_TO_JAIL_POSITION => {
                self.send_to_jail(idx);
                landing.sent_to_jail = true;
            }
            SquareKind::Corner if position == FREE_PARKING_POSITION => {
                self.room.players[idx].money -= self.rules.free_parking_fee;
            }
            SquareKind::Corner => {}
            SquareKind::Chance | SquareKind::Community => {
                if arrival == Arrival::Roll {
                    let deck = if square.kind == SquareKind::Chance {
                        Deck::Chance
                    } else {
                        Deck::Community
                    };
                    let drawn = deck.draw(self.dice.as_mut());
                    landing.card_text = Some(drawn.text);
                    self.apply_card(idx, drawn.card, dice_total, &mut landing);
                }
            }
            SquareKind::Property | SquareKind::Railroad | SquareKind::Utility => {
                let context = match arrival {
                    Arrival::Roll => RentContext::Normal,
                    Arrival::Card(context) => context,
                };
                if let Some(event) = self.charge_rent(idx, position, dice_total, context) {
                    landing.events.push(event);
                }
            }
        }
        landing
    }

    fn apply_card(&mut self, idx: usize, card: Card, dice_total: usize, landing: &mut Landing) {
        let from = self.room.players[idx].position;
        match card {
            Card::Money { amount } => {
                self.room.players[idx].money += amount;
            }
            Card::AdvanceTo { position } => {
                self.move_to(idx, position, position < from);
                let next =
                    self.resolve_landing(idx, dice_total, Arrival::Card(RentContext::Normal));
                landing.merge(next);
            }
            Card::MoveBy { spaces } => {
                let raw = from as i64 + spaces as i64;
                let target = raw.rem_euclid(BOARD_SIZE as i64) as usize;
                self.move_to(idx, target, raw >= BOARD_SIZE as i64);
                let next =
                    self.resolve_landing(idx, dice_total, Arrival::Card(RentContext::Normal));
                landing.merge(next);
            }
            Card::GoToJail => {
                self.send_to_jail(idx);
                landing.sent_to_jail = true;
            }
            Card::NearestRailroad => {
                let target = board::nearest(from, SquareKind::Railroad);
                self.move_to(idx, target, target < from);
                let next =
                    self.resolve_landing(idx, dice_total, Arrival::Card(RentContext::RailroadCard));
                landing.merge(next);
            }
            Card::NearestUtility => {
                let target = board::nearest(from, SquareKind::Utility);
                self.move_to(idx, target, target < from);
                let next =
                    self.resolve_landing(idx, dice_total, Arrival::Card(RentContext::UtilityCard));
                landing.merge(next);
            }
            Card::Repairs {
                per_house,
                per_hotel,
            } => {
                let player = &mut self.room.players[idx];
                let bill = player.total_houses() * per_house + player.total_hotels() * per_hotel;
                player.money -= bill;
            }
            Card::EachPlayer { amount } => {
                let others: Vec<usize> = (0..self.room.players.len())
                    .filter(|&i| i != idx && self.room.players[i].in_rotation())
                    .collect();
                for other in others {
                    self.room.players[other].money -= amount;
                    self.room.players[idx].money += amount;
                }
            }
        }
    }
}
