//! Rejection reasons for room actions
//!
//! Every variant is recoverable: the action is refused, nothing is mutated,
//! and the `Display` text is sent back to the offending connection only.

/// Broad class of a rejection, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TurnOrder,
    Affordability,
    Ownership,
    Rule,
    NotFound,
    Lobby,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    // Turn order
    #[error("Game is not in progress")]
    GameNotInProgress,
    #[error("Game has already started")]
    GameAlreadyStarted,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("You have already rolled this turn. End your turn to continue.")]
    AlreadyRolled,
    #[error("Choose whether to continue or end your turn first")]
    PendingDoubleDecision,
    #[error("No double decision is pending")]
    NoDoubleDecision,
    #[error("You are in jail. Pay the fine or end your turn.")]
    InJail,
    #[error("You are not in jail")]
    NotInJail,
    #[error("Roll the dice first")]
    MustRollFirst,
    #[error("You can only buy one property per turn")]
    AlreadyBoughtThisTurn,
    #[error("Eliminated players cannot act")]
    PlayerEliminated,

    // Affordability
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("The other player cannot afford this trade")]
    CounterpartyInsufficientFunds,
    #[error("Bid is too low")]
    BidTooLow,

    // Ownership
    #[error("Property already owned")]
    AlreadyOwned,
    #[error("You do not own this property")]
    NotOwner,
    #[error("The other player does not own the requested property")]
    CounterpartyNotOwner,
    #[error("Property is mortgaged")]
    Mortgaged,
    #[error("Property is already mortgaged")]
    AlreadyMortgaged,
    #[error("Property is not mortgaged")]
    NotMortgaged,
    #[error("This square cannot be bought")]
    NotPurchasable,
    #[error("You are not standing on this property")]
    NotOnProperty,
    #[error("Price does not match the property price")]
    PriceMismatch,

    // Rules
    #[error("You must own every property in the color group")]
    NoMonopoly,
    #[error("Houses must be built evenly across the color group")]
    UnevenBuilding,
    #[error("Property already has 4 houses")]
    MaxHouses,
    #[error("Every property in the group needs 4 houses before a hotel")]
    HotelPrerequisites,
    #[error("Property already has a hotel")]
    AlreadyHasHotel,
    #[error("Houses cannot be built on this square")]
    NotBuildable,
    #[error("An auction is already in progress")]
    AuctionInProgress,
    #[error("No auction is in progress")]
    NoActiveAuction,
    #[error("You cannot bid on your own property")]
    SellerCannotBid,
    #[error("Only players with zero or negative balance can sell or auction properties")]
    NotInDebt,
    #[error("Invalid trade: {0}")]
    InvalidTrade(&'static str),
    #[error("Amount must not be negative")]
    InvalidAmount,

    // Not found
    #[error("Room not found")]
    RoomNotFound,
    #[error("Player not found in room")]
    PlayerNotFound,
    #[error("Property not found")]
    PropertyNotFound,

    // Lobby
    #[error("Room is full")]
    RoomFull,
    #[error("Only host can start the game")]
    NotHost,
    #[error("At least {0} players are required")]
    NotEnoughPlayers(usize),
    #[error("Player name must be 1 to 20 characters")]
    InvalidName,
    #[error("Invalid room settings: {0}")]
    InvalidRoomSettings(&'static str),
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Not in a room")]
    NotInRoom,

    #[error("Room is closed")]
    RoomClosed,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        use GameError::*;
        match self {
            GameNotInProgress | GameAlreadyStarted | NotYourTurn | AlreadyRolled
            | PendingDoubleDecision | NoDoubleDecision | InJail | NotInJail | MustRollFirst
            | AlreadyBoughtThisTurn | PlayerEliminated => ErrorKind::TurnOrder,
            InsufficientFunds | CounterpartyInsufficientFunds | BidTooLow => {
                ErrorKind::Affordability
            }
            AlreadyOwned | NotOwner | CounterpartyNotOwner | Mortgaged | AlreadyMortgaged
            | NotMortgaged | NotPurchasable | NotOnProperty | PriceMismatch => {
                ErrorKind::Ownership
            }
            NoMonopoly | UnevenBuilding | MaxHouses | HotelPrerequisites | AlreadyHasHotel
            | NotBuildable | AuctionInProgress | NoActiveAuction | SellerCannotBid | NotInDebt
            | InvalidTrade(_) | InvalidAmount => ErrorKind::Rule,
            RoomNotFound | PlayerNotFound | PropertyNotFound => ErrorKind::NotFound,
            RoomFull | NotHost | NotEnoughPlayers(_) | InvalidName | InvalidRoomSettings(_)
            | AlreadyInRoom | NotInRoom => ErrorKind::Lobby,
            RoomClosed => ErrorKind::Internal,
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
