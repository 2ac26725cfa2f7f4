//! Distressed-sale auctions. At most one runs per room.

use tracing::info;
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::GameEvent;

use super::engine::GameEngine;
use super::error::{GameError, GameResult};
use super::ledger::purchasable_square;

#[derive(Debug, Clone)]
pub struct Auction {
    pub property_index: usize,
    pub seller_id: Uuid,
    pub starting_bid: i64,
    /// 0 until the first bid
    pub highest_bid: i64,
    pub highest_bidder: Option<Uuid>,
    /// Every accepted bid in arrival order
    pub bids: Vec<(Uuid, i64)>,
    /// Unix millis
    pub ends_at: u64,
}

impl GameEngine {
    pub(super) fn auction_covers(&self, position: usize) -> bool {
        self.auction
            .as_ref()
            .is_some_and(|a| a.property_index == position)
    }

    pub(super) fn start_property_auction(
        &mut self,
        player_id: Uuid,
        position: usize,
        starting_bid: i64,
    ) -> GameResult<()> {
        let idx = self.require_member(player_id)?;
        if self.auction.is_some() {
            return Err(GameError::AuctionInProgress);
        }
        purchasable_square(position)?;
        let player = &self.room.players[idx];
        if !player.owns(position) {
            return Err(GameError::NotOwner);
        }
        if player.money > 0 {
            return Err(GameError::NotInDebt);
        }
        if starting_bid < self.rules.min_auction_bid {
            return Err(GameError::BidTooLow);
        }

        let duration = self.rules.auction_duration;
        self.timers.arm_auction(duration);
        let ends_at = unix_millis() + duration.as_millis() as u64;
        self.auction = Some(Auction {
            property_index: position,
            seller_id: player_id,
            starting_bid,
            highest_bid: 0,
            highest_bidder: None,
            bids: Vec::new(),
            ends_at,
        });

        info!(
            room_id = %self.room.id,
            seller = %player_id,
            property = position,
            starting_bid,
            "Auction started"
        );
        self.emit(GameEvent::AuctionStarted {
            property_index: position,
            seller_id: player_id,
            highest_bid: starting_bid,
            ends_at,
        });
        Ok(())
    }

    pub(super) fn place_auction_bid(&mut self, player_id: Uuid, amount: i64) -> GameResult<()> {
        let idx = self.require_member(player_id)?;
        let auction = self.auction.as_mut().ok_or(GameError::NoActiveAuction)?;
        if auction.seller_id == player_id {
            return Err(GameError::SellerCannotBid);
        }
        if amount < auction.starting_bid || amount <= auction.highest_bid {
            return Err(GameError::BidTooLow);
        }
        if self.room.players[idx].money < amount {
            return Err(GameError::InsufficientFunds);
        }

        auction.highest_bid = amount;
        auction.highest_bidder = Some(player_id);
        auction.bids.push((player_id, amount));

        self.emit(GameEvent::AuctionBidPlaced {
            bidder_id: player_id,
            amount,
        });
        Ok(())
    }

    /// Close the live auction: the best bidder who can still pay wins,
    /// otherwise the property goes back to the bank.
    pub(super) fn resolve_auction(&mut self) {
        let Some(auction) = self.auction.take() else {
            return;
        };
        self.timers.clear_auction();

        let position = auction.property_index;
        let seller_idx = self
            .room
            .player_index(auction.seller_id)
            .filter(|&i| self.room.players[i].owns(position));
        let Some(seller_idx) = seller_idx else {
            // Seller no longer holds it; nothing to sell
            self.emit(GameEvent::AuctionEnded {
                property_index: position,
                seller_id: auction.seller_id,
                winner_id: None,
                amount: 0,
            });
            return;
        };

        let winner = auction.bids.iter().rev().find_map(|&(bidder, amount)| {
            let idx = self.room.player_index(bidder)?;
            let p = &self.room.players[idx];
            (!p.is_eliminated && p.money >= amount).then_some((idx, amount))
        });

        match winner {
            Some((winner_idx, amount)) => {
                self.transfer_property(seller_idx, winner_idx, position);
                self.room.players[winner_idx].money -= amount;
                self.room.players[seller_idx].money += amount;
                let winner_id = self.room.players[winner_idx].id;

                info!(
                    room_id = %self.room.id,
                    property = position,
                    winner = %winner_id,
                    amount,
                    "Auction won"
                );
                self.emit(GameEvent::AuctionEnded {
                    property_index: position,
                    seller_id: auction.seller_id,
                    winner_id: Some(winner_id),
                    amount,
                });
            }
            None => {
                self.room.players[seller_idx].release_property(position);
                info!(
                    room_id = %self.room.id,
                    property = position,
                    "Auction closed without bids, property returned to bank"
                );
                self.emit(GameEvent::AuctionEnded {
                    property_index: position,
                    seller_id: auction.seller_id,
                    winner_id: None,
                    amount: 0,
                });
            }
        }
        self.settle_debts();
    }

    /// Drop an auction without settling it
    pub(super) fn cancel_auction(&mut self) {
        if let Some(auction) = self.auction.take() {
            self.timers.clear_auction();
            self.emit(GameEvent::AuctionEnded {
                property_index: auction.property_index,
                seller_id: auction.seller_id,
                winner_id: None,
                amount: 0,
            });
        }
    }
}
