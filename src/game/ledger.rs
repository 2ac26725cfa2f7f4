//! Property ledger: rent, purchases, building, mortgages and trades

use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::GameEvent;

use super::board::{self, ColorGroup, Square, SquareKind};
use super::engine::GameEngine;
use super::error::{GameError, GameResult};
use super::rules::Rules;
use super::state::Player;
use super::TradeOffer;

const MAX_HOUSES: u8 = 4;

/// Rent modifier for squares reached by a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentContext {
    Normal,
    /// Nearest railroad card: railroad rent is multiplied
    RailroadCard,
    /// Nearest utility card: fixed dice multiplier
    UtilityCard,
}

/// Rent owed to `owner` for landing on `square`
pub fn rent_for(
    square: &Square,
    owner: &Player,
    dice_total: usize,
    context: RentContext,
    rules: &Rules,
) -> i64 {
    let tier = |i: usize| square.rent.get(i).copied().unwrap_or(0);
    match square.kind {
        SquareKind::Property => {
            let pos = square.position;
            if owner.has_hotel(pos) {
                return square.rent.last().copied().unwrap_or(0);
            }
            let level = owner.house_level(pos) as usize;
            if level > 0 {
                return tier(level);
            }
            match square.group {
                Some(group) if owner.owns_group(group) => tier(0) * 2,
                _ => tier(0),
            }
        }
        SquareKind::Railroad => {
            let owned = owner.count_owned(SquareKind::Railroad).max(1);
            let base = tier(owned - 1);
            if context == RentContext::RailroadCard {
                base * rules.railroad_card_multiplier
            } else {
                base
            }
        }
        SquareKind::Utility => {
            let multiplier = if context == RentContext::UtilityCard {
                rules.utility_card_multiplier
            } else if owner.count_owned(SquareKind::Utility) >= 2 {
                10
            } else {
                4
            };
            dice_total as i64 * multiplier
        }
        _ => 0,
    }
}

pub(super) fn purchasable_square(position: usize) -> GameResult<&'static Square> {
    let square = board::square(position).ok_or(GameError::PropertyNotFound)?;
    if !square.is_purchasable() {
        return Err(GameError::NotPurchasable);
    }
    Ok(square)
}

/// Shared checks for houses and hotels; returns the color group
fn check_buildable(player: &Player, square: &Square) -> GameResult<ColorGroup> {
    let group = square
        .group
        .filter(|_| square.is_buildable())
        .ok_or(GameError::NotBuildable)?;
    if !player.owns(square.position) {
        return Err(GameError::NotOwner);
    }
    if player.is_mortgaged(square.position) {
        return Err(GameError::Mortgaged);
    }
    if !player.owns_group(group) {
        return Err(GameError::NoMonopoly);
    }
    Ok(group)
}

impl GameEngine {
    /// Charge rent if the square has another owner and is not mortgaged
    pub(super) fn charge_rent(
        &mut self,
        payer_idx: usize,
        position: usize,
        dice_total: usize,
        context: RentContext,
    ) -> Option<GameEvent> {
        let owner_idx = self.room.owner_index(position)?;
        if owner_idx == payer_idx {
            return None;
        }
        let owner = &self.room.players[owner_idx];
        if owner.is_mortgaged(position) {
            return None;
        }
        let square = board::square(position)?;
        let amount = rent_for(square, owner, dice_total, context, &self.rules);
        if amount <= 0 {
            return None;
        }

        self.room.players[payer_idx].money -= amount;
        self.room.players[owner_idx].money += amount;
        Some(GameEvent::RentPaid {
            payer_id: self.room.players[payer_idx].id,
            owner_id: self.room.players[owner_idx].id,
            property_index: position,
            amount,
        })
    }

    pub(super) fn buy_property(
        &mut self,
        player_id: Uuid,
        position: usize,
        price: i64,
    ) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let square = purchasable_square(position)?;
        let player = &self.room.players[idx];
        if !player.has_rolled_this_turn
            && !player.pending_double_decision
            && player.consecutive_doubles == 0
        {
            return Err(GameError::MustRollFirst);
        }
        if player.has_bought_this_turn {
            return Err(GameError::AlreadyBoughtThisTurn);
        }
        if player.position != position {
            return Err(GameError::NotOnProperty);
        }
        if price != square.price {
            return Err(GameError::PriceMismatch);
        }
        if self.room.owner_index(position).is_some() {
            return Err(GameError::AlreadyOwned);
        }
        if player.money < price {
            return Err(GameError::InsufficientFunds);
        }

        let player = &mut self.room.players[idx];
        player.money -= price;
        player.grant_property(position, false);
        player.has_bought_this_turn = true;

        info!(
            room_id = %self.room.id,
            player_id = %player_id,
            property = square.name,
            price,
            "Property bought"
        );
        self.emit(GameEvent::PropertyBought {
            player_id,
            property_index: position,
            price,
        });
        self.settle_debts();
        Ok(())
    }

    pub(super) fn buy_house(&mut self, player_id: Uuid, position: usize) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let square = board::square(position).ok_or(GameError::PropertyNotFound)?;
        let player = &self.room.players[idx];
        let group = check_buildable(player, square)?;
        if player.has_hotel(position) {
            return Err(GameError::AlreadyHasHotel);
        }
        let level = player.house_level(position);
        if level >= MAX_HOUSES {
            return Err(GameError::MaxHouses);
        }
        let lowest = group
            .members()
            .iter()
            .map(|&p| player.improvement_level(p))
            .min()
            .unwrap_or(0);
        if level > lowest {
            return Err(GameError::UnevenBuilding);
        }
        if player.money < square.house_cost {
            return Err(GameError::InsufficientFunds);
        }

        let player = &mut self.room.players[idx];
        player.money -= square.house_cost;
        player.building_levels.insert(position, level + 1);

        self.emit(GameEvent::HouseBuilt {
            player_id,
            property_index: position,
            level: level + 1,
            cost: square.house_cost,
        });
        self.settle_debts();
        Ok(())
    }

    pub(super) fn build_hotel(&mut self, player_id: Uuid, position: usize) -> GameResult<()> {
        let idx = self.require_current(player_id)?;
        let square = board::square(position).ok_or(GameError::PropertyNotFound)?;
        let player = &self.room.players[idx];
        let group = check_buildable(player, square)?;
        if player.has_hotel(position) {
            return Err(GameError::AlreadyHasHotel);
        }
        let group_ready = group
            .members()
            .iter()
            .all(|&p| player.improvement_level(p) >= MAX_HOUSES);
        if player.house_level(position) != MAX_HOUSES || !group_ready {
            return Err(GameError::HotelPrerequisites);
        }
        let cost = square.house_cost;
        if player.money < cost {
            return Err(GameError::InsufficientFunds);
        }

        let player = &mut self.room.players[idx];
        player.money -= cost;
        player.building_levels.remove(&position);
        player.hotel_properties.insert(position);

        info!(
            room_id = %self.room.id,
            player_id = %player_id,
            property = square.name,
            "Hotel built"
        );
        self.emit(GameEvent::HotelBuilt {
            player_id,
            property_index: position,
            cost,
        });
        self.settle_debts();
        Ok(())
    }

    pub(super) fn mortgage_property(&mut self, player_id: Uuid, position: usize) -> GameResult<()> {
        let idx = self.require_member(player_id)?;
        let square = purchasable_square(position)?;
        let player = &self.room.players[idx];
        if !player.owns(position) {
            return Err(GameError::NotOwner);
        }
        if player.is_mortgaged(position) {
            return Err(GameError::AlreadyMortgaged);
        }
        if self.auction_covers(position) {
            return Err(GameError::AuctionInProgress);
        }

        let amount = square.mortgage_value;
        let player = &mut self.room.players[idx];
        player.strip_buildings(position);
        player.mortgaged_properties.insert(position);
        player.money += amount;

        self.emit(GameEvent::PropertyMortgaged {
            player_id,
            property_index: position,
            amount,
        });
        self.settle_debts();
        Ok(())
    }

    pub(super) fn unmortgage_property(
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
        if !player.is_mortgaged(position) {
            return Err(GameError::NotMortgaged);
        }
        let amount = self.rules.unmortgage_cost(square.mortgage_value);
        if player.money < amount {
            return Err(GameError::InsufficientFunds);
        }

        let player = &mut self.room.players[idx];
        player.money -= amount;
        player.mortgaged_properties.remove(&position);

        self.emit(GameEvent::PropertyUnmortgaged {
            player_id,
            property_index: position,
            amount,
        });
        self.settle_debts();
        Ok(())
    }

    /// Immediate two-sided exchange. Everything is validated before anything moves.
    pub(super) fn trade_property(
        &mut self,
        player_id: Uuid,
        offer: TradeOffer,
    ) -> GameResult<()> {
        let from_idx = self.require_current(player_id)?;
        let to_idx = self
            .room
            .player_index(offer.target_player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if to_idx == from_idx {
            return Err(GameError::InvalidTrade("cannot trade with yourself"));
        }
        if self.room.players[to_idx].is_eliminated {
            return Err(GameError::PlayerEliminated);
        }

        let cash_offered = offer.cash_offered.unwrap_or(0);
        let cash_requested = offer.cash_requested.unwrap_or(0);
        if cash_offered < 0 || cash_requested < 0 {
            return Err(GameError::InvalidAmount);
        }
        if offer.offered_property_index.is_none()
            && offer.requested_property_index.is_none()
            && cash_offered == 0
            && cash_requested == 0
        {
            return Err(GameError::InvalidTrade("trade is empty"));
        }

        let from = &self.room.players[from_idx];
        let to = &self.room.players[to_idx];
        if let Some(pos) = offer.offered_property_index {
            purchasable_square(pos)?;
            if !from.owns(pos) {
                return Err(GameError::NotOwner);
            }
        }
        if let Some(pos) = offer.requested_property_index {
            purchasable_square(pos)?;
            if !to.owns(pos) {
                return Err(GameError::CounterpartyNotOwner);
            }
        }
        if [offer.offered_property_index, offer.requested_property_index]
            .into_iter()
            .flatten()
            .any(|pos| self.auction_covers(pos))
        {
            return Err(GameError::AuctionInProgress);
        }
        if from.money < cash_offered {
            return Err(GameError::InsufficientFunds);
        }
        if to.money < cash_requested {
            return Err(GameError::CounterpartyInsufficientFunds);
        }

        if let Some(pos) = offer.offered_property_index {
            self.transfer_property(from_idx, to_idx, pos);
        }
        if let Some(pos) = offer.requested_property_index {
            self.transfer_property(to_idx, from_idx, pos);
        }
        let players = &mut self.room.players;
        players[from_idx].money += cash_requested - cash_offered;
        players[to_idx].money += cash_offered - cash_requested;

        info!(
            room_id = %self.room.id,
            from = %player_id,
            to = %offer.target_player_id,
            "Trade completed"
        );
        self.emit(GameEvent::TradeCompleted {
            from_player_id: player_id,
            to_player_id: offer.target_player_id,
            offered_property_index: offer.offered_property_index,
            requested_property_index: offer.requested_property_index,
            cash_offered,
            cash_requested,
        });
        self.settle_debts();
        Ok(())
    }

    /// Move a square between players. The mortgage flag travels, buildings do not.
    pub(super) fn transfer_property(&mut self, from_idx: usize, to_idx: usize, position: usize) {
        let mortgaged = self.room.players[from_idx].release_property(position);
        self.room.players[to_idx].grant_property(position, mortgaged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::test_support::*;
    use crate::game::GameAction;

    fn owner(properties: &[usize]) -> Player {
        let mut p = Player::new(Uuid::new_v4(), "owner".into(), None, 0);
        for &pos in properties {
            p.grant_property(pos, false);
        }
        p
    }

    #[test]
    fn property_rent_tiers() {
        let rules = Rules::default();
        let sq = board::square(6).unwrap();

        assert_eq!(rent_for(sq, &owner(&[6]), 7, RentContext::Normal, &rules), 60);
        // Monopoly doubles the base
        assert_eq!(rent_for(sq, &owner(&[6, 8, 9]), 7, RentContext::Normal, &rules), 120);

        let mut built = owner(&[6, 8, 9]);
        built.building_levels.insert(6, 2);
        assert_eq!(rent_for(sq, &built, 7, RentContext::Normal, &rules), 900);

        built.building_levels.remove(&6);
        built.hotel_properties.insert(6);
        assert_eq!(rent_for(sq, &built, 7, RentContext::Normal, &rules), 5500);
    }

    #[test]
    fn railroad_rent_scales_and_card_doubles() {
        let rules = Rules::default();
        let sq = board::square(5).unwrap();
        let one = rent_for(sq, &owner(&[5]), 7, RentContext::Normal, &rules);
        let two = rent_for(sq, &owner(&[5, 15]), 7, RentContext::Normal, &rules);
        assert!(two > one);
        assert_eq!(
            rent_for(sq, &owner(&[5]), 7, RentContext::RailroadCard, &rules),
            one * 2
        );
    }

    #[test]
    fn utility_rent_multipliers() {
        let rules = Rules::default();
        let sq = board::square(12).unwrap();
        assert_eq!(rent_for(sq, &owner(&[12]), 9, RentContext::Normal, &rules), 36);
        assert_eq!(rent_for(sq, &owner(&[12, 28]), 9, RentContext::Normal, &rules), 90);
        assert_eq!(rent_for(sq, &owner(&[12]), 9, RentContext::UtilityCard, &rules), 90);
    }

    #[test]
    fn landing_on_owned_utility_pays_rent() {
        let mut engine = started_game(2, &[(4, 5)], &[]);
        let p0 = id(&engine, 0);
        player_mut(&mut engine, 1).grant_property(12, false);
        player_mut(&mut engine, 1).grant_property(28, false);
        player_mut(&mut engine, 0).position = 3;

        engine.apply(p0, GameAction::RollDice).unwrap();
        assert_eq!(player(&engine, 0).money, 15_000 - 90);
        assert_eq!(player(&engine, 1).money, 15_000 + 90);
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, GameEvent::RentPaid { amount: 90, .. })));
    }

    #[test]
    fn mortgaged_square_collects_nothing() {
        let mut engine = started_game(2, &[(1, 2)], &[]);
        let p0 = id(&engine, 0);
        player_mut(&mut engine, 1).grant_property(3, true);

        engine.apply(p0, GameAction::RollDice).unwrap();
        assert_eq!(player(&engine, 0).money, 15_000);
    }

    #[test]
    fn one_purchase_per_turn() {
        let mut engine = started_game(2, &[(1, 2)], &[]);
        let p0 = id(&engine, 0);

        assert_eq!(
            engine.apply(p0, GameAction::BuyProperty { property_index: 3, price: 600 }),
            Err(GameError::MustRollFirst)
        );
        engine.apply(p0, GameAction::RollDice).unwrap();
        assert_eq!(
            engine.apply(p0, GameAction::BuyProperty { property_index: 3, price: 500 }),
            Err(GameError::PriceMismatch)
        );
        engine
            .apply(p0, GameAction::BuyProperty { property_index: 3, price: 600 })
            .unwrap();
        assert!(player(&engine, 0).owns(3));
        assert_eq!(player(&engine, 0).money, 14_400);
        assert_eq!(
            engine.apply(p0, GameAction::BuyProperty { property_index: 3, price: 600 }),
            Err(GameError::AlreadyBoughtThisTurn)
        );
    }

    #[test]
    fn cannot_buy_away_from_square() {
        let mut engine = started_game(2, &[(1, 2)], &[]);
        let p0 = id(&engine, 0);
        engine.apply(p0, GameAction::RollDice).unwrap();
        assert_eq!(
            engine.apply(p0, GameAction::BuyProperty { property_index: 1, price: 600 }),
            Err(GameError::NotOnProperty)
        );
        assert_eq!(
            engine.apply(p0, GameAction::BuyProperty { property_index: 4, price: 2000 }),
            Err(GameError::NotPurchasable)
        );
    }

    #[test]
    fn houses_must_be_built_evenly() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        for pos in [1, 3] {
            player_mut(&mut engine, 0).grant_property(pos, false);
        }

        engine.apply(p0, GameAction::BuyHouse { property_index: 1 }).unwrap();
        assert_eq!(
            engine.apply(p0, GameAction::BuyHouse { property_index: 1 }),
            Err(GameError::UnevenBuilding)
        );
        engine.apply(p0, GameAction::BuyHouse { property_index: 3 }).unwrap();
        engine.apply(p0, GameAction::BuyHouse { property_index: 1 }).unwrap();
        assert_eq!(player(&engine, 0).house_level(1), 2);
        assert_eq!(player(&engine, 0).money, 15_000 - 3 * 500);
    }

    #[test]
    fn building_needs_monopoly() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        player_mut(&mut engine, 0).grant_property(1, false);
        assert_eq!(
            engine.apply(p0, GameAction::BuyHouse { property_index: 1 }),
            Err(GameError::NoMonopoly)
        );
        assert_eq!(
            engine.apply(p0, GameAction::BuyHouse { property_index: 5 }),
            Err(GameError::NotBuildable)
        );
    }

    #[test]
    fn hotel_requires_four_houses_across_group() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        {
            let p = player_mut(&mut engine, 0);
            p.grant_property(1, false);
            p.grant_property(3, false);
            p.building_levels.insert(1, 4);
            p.building_levels.insert(3, 3);
        }
        assert_eq!(
            engine.apply(p0, GameAction::BuildHotel { property_index: 1 }),
            Err(GameError::HotelPrerequisites)
        );

        player_mut(&mut engine, 0).building_levels.insert(3, 4);
        engine.apply(p0, GameAction::BuildHotel { property_index: 1 }).unwrap();
        let p = player(&engine, 0);
        assert!(p.has_hotel(1));
        assert_eq!(p.house_level(1), 0);
        assert_eq!(p.money, 14_500);
        // Hotel on 1 counts above four, so 3 can still take its hotel
        engine.apply(p0, GameAction::BuildHotel { property_index: 3 }).unwrap();
        assert_eq!(
            engine.apply(p0, GameAction::BuyHouse { property_index: 3 }),
            Err(GameError::AlreadyHasHotel)
        );
    }

    #[test]
    fn mortgage_strips_buildings_and_unmortgage_charges_interest() {
        let mut engine = started_game(2, &[], &[]);
        let p1 = id(&engine, 1);
        {
            let p = player_mut(&mut engine, 1);
            p.grant_property(1, false);
            p.grant_property(3, false);
            p.building_levels.insert(1, 1);
        }

        // Allowed off-turn
        engine
            .apply(p1, GameAction::MortgageProperty { property_index: 1 })
            .unwrap();
        let p = player(&engine, 1);
        assert!(p.is_mortgaged(1));
        assert_eq!(p.house_level(1), 0);
        assert_eq!(p.money, 15_300);
        assert_eq!(
            engine.apply(p1, GameAction::MortgageProperty { property_index: 1 }),
            Err(GameError::AlreadyMortgaged)
        );

        engine
            .apply(p1, GameAction::UnmortgageProperty { property_index: 1 })
            .unwrap();
        assert_eq!(player(&engine, 1).money, 15_300 - 330);
        assert!(!player(&engine, 1).is_mortgaged(1));
    }

    #[test]
    fn trade_swaps_assets_and_keeps_mortgage() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        let p1 = id(&engine, 1);
        player_mut(&mut engine, 0).grant_property(6, true);
        player_mut(&mut engine, 1).grant_property(8, false);

        engine
            .apply(
                p0,
                GameAction::TradeProperty(TradeOffer {
                    target_player_id: p1,
                    offered_property_index: Some(6),
                    requested_property_index: Some(8),
                    cash_offered: Some(200),
                    cash_requested: None,
                }),
            )
            .unwrap();

        let a = player(&engine, 0);
        let b = player(&engine, 1);
        assert!(a.owns(8) && !a.owns(6));
        assert!(b.owns(6) && b.is_mortgaged(6));
        assert_eq!(a.money, 14_800);
        assert_eq!(b.money, 15_200);
    }

    #[test]
    fn trade_rejects_before_moving_anything() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        let p1 = id(&engine, 1);
        player_mut(&mut engine, 0).grant_property(6, false);

        let result = engine.apply(
            p0,
            GameAction::TradeProperty(TradeOffer {
                target_player_id: p1,
                offered_property_index: Some(6),
                requested_property_index: Some(8),
                cash_offered: None,
                cash_requested: None,
            }),
        );
        assert_eq!(result, Err(GameError::CounterpartyNotOwner));
        assert!(player(&engine, 0).owns(6));

        let result = engine.apply(
            p0,
            GameAction::TradeProperty(TradeOffer {
                target_player_id: p1,
                offered_property_index: None,
                requested_property_index: None,
                cash_offered: Some(-5),
                cash_requested: None,
            }),
        );
        assert_eq!(result, Err(GameError::InvalidAmount));
    }

    #[test]
    fn spending_down_to_zero_raises_bankruptcy_notice() {
        let mut engine = started_game(2, &[(1, 2)], &[]);
        let p0 = id(&engine, 0);
        player_mut(&mut engine, 0).money = 600;

        engine.apply(p0, GameAction::RollDice).unwrap();
        engine.take_events();
        engine
            .apply(p0, GameAction::BuyProperty { property_index: 3, price: 600 })
            .unwrap();
        assert_eq!(player(&engine, 0).money, 0);
        assert!(engine.take_events().iter().any(|e| matches!(
            e,
            GameEvent::BankruptcyState { money: 0, .. }
        )));
    }

    #[test]
    fn building_down_to_zero_raises_bankruptcy_notice() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        {
            let p = player_mut(&mut engine, 0);
            p.grant_property(1, false);
            p.grant_property(3, false);
            p.money = 500;
        }

        engine.apply(p0, GameAction::BuyHouse { property_index: 1 }).unwrap();
        assert_eq!(player(&engine, 0).money, 0);
        assert!(!player(&engine, 0).is_eliminated);
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, GameEvent::BankruptcyState { .. })));
    }

    #[test]
    fn traded_hotel_is_stripped() {
        let mut engine = started_game(2, &[], &[]);
        let p0 = id(&engine, 0);
        let p1 = id(&engine, 1);
        {
            let p = player_mut(&mut engine, 0);
            p.grant_property(1, false);
            p.grant_property(3, false);
            p.hotel_properties.insert(1);
        }

        engine
            .apply(
                p0,
                GameAction::TradeProperty(TradeOffer {
                    target_player_id: p1,
                    offered_property_index: Some(1),
                    requested_property_index: None,
                    cash_offered: None,
                    cash_requested: Some(1000),
                }),
            )
            .unwrap();

        let a = player(&engine, 0);
        let b = player(&engine, 1);
        assert!(!a.owns(1) && a.hotel_properties.is_empty());
        assert!(b.owns(1));
        assert!(!b.has_hotel(1));
        assert_eq!(b.house_level(1), 0);
        assert_eq!(a.money, 16_000);
    }
}
