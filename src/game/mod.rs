//! Game session modules

pub mod auction;
pub mod bankruptcy;
pub mod board;
pub mod cards;
pub mod dice;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod rules;
pub mod session;
pub mod state;
pub mod timer;
pub mod turn;

pub use error::GameError;
pub use rules::Rules;
pub use session::{RoomHandle, RoomRegistry};

use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

/// Proposed two-sided exchange between the active player and a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOffer {
    pub target_player_id: Uuid,
    pub offered_property_index: Option<usize>,
    pub requested_property_index: Option<usize>,
    pub cash_offered: Option<i64>,
    pub cash_requested: Option<i64>,
}

/// Room action submitted by a connected player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    StartGame,
    RollDice,
    EndTurn,
    ChooseDoubleTurn { continue_turn: bool },
    PayJailFine,
    BuyProperty { property_index: usize, price: i64 },
    BuyHouse { property_index: usize },
    BuildHotel { property_index: usize },
    MortgageProperty { property_index: usize },
    UnmortgageProperty { property_index: usize },
    TradeProperty(TradeOffer),
    SellPropertyToBank { property_index: usize },
    StartPropertyAuction { property_index: usize, starting_bid: i64 },
    PlaceAuctionBid { bid_amount: i64 },
}

/// Lobby and keepalive messages are not room actions and come back unchanged
impl TryFrom<ClientMsg> for GameAction {
    type Error = ClientMsg;

    fn try_from(msg: ClientMsg) -> Result<Self, Self::Error> {
        let action = match msg {
            ClientMsg::StartGame => GameAction::StartGame,
            ClientMsg::RollDice => GameAction::RollDice,
            ClientMsg::EndTurn => GameAction::EndTurn,
            ClientMsg::ChooseDoubleTurn { continue_turn } => {
                GameAction::ChooseDoubleTurn { continue_turn }
            }
            ClientMsg::PayJailFine => GameAction::PayJailFine,
            ClientMsg::BuyProperty {
                property_index,
                price,
            } => GameAction::BuyProperty {
                property_index,
                price,
            },
            ClientMsg::BuyHouse { property_index } => GameAction::BuyHouse { property_index },
            ClientMsg::BuildHotel { property_index } => GameAction::BuildHotel { property_index },
            ClientMsg::MortgageProperty { property_index } => {
                GameAction::MortgageProperty { property_index }
            }
            ClientMsg::UnmortgageProperty { property_index } => {
                GameAction::UnmortgageProperty { property_index }
            }
            ClientMsg::TradeProperty {
                target_player_id,
                offered_property_index,
                requested_property_index,
                cash_offered,
                cash_requested,
            } => GameAction::TradeProperty(TradeOffer {
                target_player_id,
                offered_property_index,
                requested_property_index,
                cash_offered,
                cash_requested,
            }),
            ClientMsg::SellPropertyToBank { property_index } => {
                GameAction::SellPropertyToBank { property_index }
            }
            ClientMsg::StartPropertyAuction {
                property_index,
                starting_bid,
            } => GameAction::StartPropertyAuction {
                property_index,
                starting_bid,
            },
            ClientMsg::PlaceAuctionBid { bid_amount } => GameAction::PlaceAuctionBid { bid_amount },
            other @ (ClientMsg::CreateRoom { .. }
            | ClientMsg::JoinRoom { .. }
            | ClientMsg::RejoinRoom { .. }
            | ClientMsg::Ping { .. }) => return Err(other),
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_messages_are_not_actions() {
        let msg = ClientMsg::Ping { t: 1 };
        assert!(matches!(
            GameAction::try_from(msg),
            Err(ClientMsg::Ping { t: 1 })
        ));
        assert!(matches!(
            GameAction::try_from(ClientMsg::BuyHouse { property_index: 3 }),
            Ok(GameAction::BuyHouse { property_index: 3 })
        ));
    }
}
