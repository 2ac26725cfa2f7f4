//! Debt resolution, elimination and game end

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ws::protocol::{GameEvent, TurnEndReason};

use super::engine::GameEngine;
use super::error::{GameError, GameResult};
use super::ledger::purchasable_square;
use super::state::{PlayerPatch, RoomPhase};

impl GameEngine {
    /// Distressed sale: the bank pays a fixed fraction of face value,
    /// less the outstanding mortgage.
    pub(super) fn sell_property_to_bank(
        &mut self,
        player_id: Uuid,
        position: usize,
    ) -> GameResult<()> {
        let idx = self.require_member(player_id)?;
        let square = purchasable_square(position)?;
        let player = &self.room.players[idx];
        if !player.owns(position) {
            return Err(GameError::NotOwner);
        }
        if player.money > 0 {
            return Err(GameError::NotInDebt);
        }
        if self.auction_covers(position) {
            return Err(GameError::AuctionInProgress);
        }

        let mut amount = self.rules.bank_sale_value(square.price);
        if player.is_mortgaged(position) {
            amount = (amount - square.mortgage_value).max(0);
        }
        let player = &mut self.room.players[idx];
        player.release_property(position);
        player.money += amount;

        info!(
            room_id = %self.room.id,
            player_id = %player_id,
            property = square.name,
            amount,
            "Property sold to bank"
        );
        self.emit(GameEvent::PropertySoldToBank {
            player_id,
            property_index: position,
            amount,
        });
        self.settle_debts();
        Ok(())
    }

    /// Scan for players at or below zero. Those with nothing left to sell are
    /// eliminated; the rest are told to liquidate.
    pub(super) fn settle_debts(&mut self) {
        let debtors: Vec<usize> = (0..self.room.players.len())
            .filter(|&i| {
                let p = &self.room.players[i];
                p.in_rotation() && p.money <= 0
            })
            .collect();

        for idx in debtors {
            if !self.is_playing() {
                return;
            }
            let player = &self.room.players[idx];
            if !player.in_rotation() || player.money > 0 {
                continue;
            }
            if player.properties.is_empty() {
                self.eliminate(idx);
            } else {
                let event = GameEvent::BankruptcyState {
                    player_id: player.id,
                    money: player.money,
                    properties: player.properties.iter().copied().collect(),
                };
                self.emit(event);
            }
        }
    }

    fn eliminate(&mut self, idx: usize) {
        self.eliminations += 1;
        let order = self.eliminations;
        let player_id = self.room.players[idx].id;
        let was_current = idx == self.room.current_player_index;

        if self
            .auction
            .as_ref()
            .is_some_and(|a| a.seller_id == player_id)
        {
            self.cancel_auction();
        }

        let player = &mut self.room.players[idx];
        player.apply(PlayerPatch {
            color: Some(None),
            is_active: Some(false),
            is_eliminated: Some(true),
            eliminated_at: Some(Some(Utc::now())),
            elimination_order: Some(Some(order)),
            properties: Some(Default::default()),
            pending_double_decision: Some(false),
            ..PlayerPatch::default()
        });

        warn!(room_id = %self.room.id, player_id = %player_id, order, "Player eliminated");
        self.emit(GameEvent::PlayerEliminated {
            player_id,
            elimination_order: order,
        });

        self.check_game_end();
        if was_current && self.is_playing() {
            self.advance_turn(Some(TurnEndReason::Eliminated));
        }
    }

    fn check_game_end(&mut self) {
        let active: Vec<_> = self
            .room
            .players
            .iter()
            .filter(|p| p.in_rotation())
            .collect();
        let solvent = active.iter().filter(|p| p.money > 0).count();
        if active.len() <= 1 || solvent <= 1 {
            self.finish_game();
        }
    }

    fn finish_game(&mut self) {
        if !self.room.advance_phase(RoomPhase::Finished) {
            return;
        }
        self.clear_turn_timer();
        self.timers.clear_auction();
        self.auction = None;

        let standings = self.room.standings();
        let winner_id = standings
            .first()
            .filter(|s| !s.eliminated)
            .map(|s| s.player_id);

        info!(room_id = %self.room.id, winner = ?winner_id, "Game finished");
        self.emit(GameEvent::GameEnded {
            winner_id,
            standings,
        });
    }
}
