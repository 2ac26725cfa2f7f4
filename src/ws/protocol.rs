//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::state::{Player, Room, Standing};
use crate::game::timer::TurnPhase;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Create a room and attach as its host
    CreateRoom {
        host_name: String,
        max_players: Option<usize>,
        start_money: Option<i64>,
    },

    /// Join a waiting room by its code
    JoinRoom {
        room_code: String,
        player_name: String,
    },

    /// Reattach an existing player after a reconnect
    RejoinRoom {
        room_code: String,
        player_id: Uuid,
    },

    /// Host starts the game
    StartGame,

    RollDice,

    EndTurn,

    /// Answer after a second consecutive double
    ChooseDoubleTurn {
        continue_turn: bool,
    },

    BuyProperty {
        property_index: usize,
        price: i64,
    },

    BuyHouse {
        property_index: usize,
    },

    BuildHotel {
        property_index: usize,
    },

    MortgageProperty {
        property_index: usize,
    },

    UnmortgageProperty {
        property_index: usize,
    },

    TradeProperty {
        target_player_id: Uuid,
        offered_property_index: Option<usize>,
        requested_property_index: Option<usize>,
        cash_offered: Option<i64>,
        cash_requested: Option<i64>,
    },

    PayJailFine,

    SellPropertyToBank {
        property_index: usize,
    },

    StartPropertyAuction {
        property_index: usize,
        starting_bid: i64,
    },

    PlaceAuctionBid {
        bid_amount: i64,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMsg {
    /// State change fanned out to every connection in a room
    Room(RoomBroadcast),
    /// Reply addressed to a single connection
    Direct(DirectMsg),
}

/// A room event together with the room snapshot after it was applied
#[derive(Debug, Clone, Serialize)]
pub struct RoomBroadcast {
    #[serde(flatten)]
    pub event: GameEvent,
    pub room: Room,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DirectMsg {
    /// Welcome message after connection
    Welcome { server_time: u64 },

    RoomCreated { room: Room, player_id: Uuid },

    RoomJoined { room: Room, player_id: Uuid },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },

    /// Rejected action; only the sender sees it
    Error { message: String },
}

/// Room events. Each one is broadcast with a full room snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    PlayerJoined {
        player: Player,
    },

    PlayerDisconnected {
        player_id: Uuid,
    },

    HostDisconnected {
        message: String,
    },

    RoomExpired,

    GameStarted {
        first_player_id: Uuid,
    },

    DiceRolled {
        player_id: Uuid,
        dice1: u8,
        dice2: u8,
        total: usize,
        is_double: bool,
        new_position: usize,
        passed_start: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        card_text: Option<String>,
        sent_to_jail: bool,
        extra_turn_granted: bool,
        pending_double_decision: bool,
        auto_rolled: bool,
    },

    RentPaid {
        payer_id: Uuid,
        owner_id: Uuid,
        property_index: usize,
        amount: i64,
    },

    TurnEnded {
        previous_player_id: Uuid,
        next_player_id: Uuid,
        auto_ended: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<TurnEndReason>,
    },

    TurnSkippedJail {
        player_id: Uuid,
    },

    JailFinePaid {
        player_id: Uuid,
        amount: i64,
    },

    DoubleDecisionMade {
        player_id: Uuid,
        continue_turn: bool,
    },

    PropertyBought {
        player_id: Uuid,
        property_index: usize,
        price: i64,
    },

    HouseBuilt {
        player_id: Uuid,
        property_index: usize,
        level: u8,
        cost: i64,
    },

    HotelBuilt {
        player_id: Uuid,
        property_index: usize,
        cost: i64,
    },

    PropertyMortgaged {
        player_id: Uuid,
        property_index: usize,
        amount: i64,
    },

    PropertyUnmortgaged {
        player_id: Uuid,
        property_index: usize,
        amount: i64,
    },

    TradeCompleted {
        from_player_id: Uuid,
        to_player_id: Uuid,
        offered_property_index: Option<usize>,
        requested_property_index: Option<usize>,
        cash_offered: i64,
        cash_requested: i64,
    },

    BankruptcyState {
        player_id: Uuid,
        money: i64,
        properties: Vec<usize>,
    },

    PropertySoldToBank {
        player_id: Uuid,
        property_index: usize,
        amount: i64,
    },

    AuctionStarted {
        property_index: usize,
        seller_id: Uuid,
        highest_bid: i64,
        ends_at: u64,
    },

    AuctionBidPlaced {
        bidder_id: Uuid,
        amount: i64,
    },

    AuctionEnded {
        property_index: usize,
        seller_id: Uuid,
        winner_id: Option<Uuid>,
        amount: i64,
    },

    PlayerEliminated {
        player_id: Uuid,
        elimination_order: u32,
    },

    GameEnded {
        winner_id: Option<Uuid>,
        standings: Vec<Standing>,
    },

    TurnTimerUpdated {
        active: bool,
        phase: Option<TurnPhase>,
        ends_at: Option<u64>,
        server_now: u64,
    },
}

/// Why a turn was closed by the server rather than by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnEndReason {
    RollTimeout,
    ActionTimeout,
    JailSkip,
    ThreeDoubles,
    DoubleDeclined,
    Eliminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_actions() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"buyProperty","propertyIndex":6,"price":1000}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::BuyProperty {
                property_index: 6,
                price: 1000
            }
        ));

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"chooseDoubleTurn","continueTurn":false}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::ChooseDoubleTurn {
                continue_turn: false
            }
        ));
    }

    #[test]
    fn trade_legs_are_optional() {
        let target = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"tradeProperty","targetPlayerId":"{target}","offeredPropertyIndex":1}}"#
        );
        let msg: ClientMsg = serde_json::from_str(&raw).unwrap();
        match msg {
            ClientMsg::TradeProperty {
                target_player_id,
                offered_property_index,
                requested_property_index,
                cash_offered,
                ..
            } => {
                assert_eq!(target_player_id, target);
                assert_eq!(offered_property_index, Some(1));
                assert_eq!(requested_property_index, None);
                assert_eq!(cash_offered, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_reply_shape() {
        let msg = ServerMsg::Direct(DirectMsg::Error {
            message: "Not your turn".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "Not your turn");
    }

    #[test]
    fn timer_event_shape() {
        let event = GameEvent::TurnTimerUpdated {
            active: true,
            phase: Some(TurnPhase::Roll),
            ends_at: Some(10),
            server_now: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "turnTimerUpdated");
        assert_eq!(json["phase"], "roll");
        assert_eq!(json["endsAt"], 10);
        assert_eq!(json["serverNow"], 5);
    }
}
