//! Chance and Community Chest decks

use super::board::START_POSITION;
use super::dice::DiceSource;

/// Effect printed on a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Card {
    /// Bank pays (positive) or charges (negative) the drawer
    Money { amount: i64 },
    /// Move to an absolute position, collecting the START bonus when crossing it
    AdvanceTo { position: usize },
    /// Move relative to the current square; backwards moves never pay the bonus
    MoveBy { spaces: i32 },
    GoToJail,
    /// Advance to the next railroad and pay double rent if owned
    NearestRailroad,
    /// Advance to the next utility and pay a forced dice multiple if owned
    NearestUtility,
    /// Pay per house and per hotel owned
    Repairs { per_house: i64, per_hotel: i64 },
    /// Collect from (positive) or pay to (negative) every other active player
    EachPlayer { amount: i64 },
}

/// Card with its display text
#[derive(Debug, Clone, Copy)]
pub struct CardDef {
    pub text: &'static str,
    pub card: Card,
}

const fn card(text: &'static str, card: Card) -> CardDef {
    CardDef { text, card }
}

pub static CHANCE_DECK: [CardDef; 15] = [
    card("Advance to START - Collect ₹2000", Card::AdvanceTo { position: START_POSITION }),
    card("Advance to Juhu Beach", Card::AdvanceTo { position: 39 }),
    card("Go to Jail - Do not pass START", Card::GoToJail),
    card("Pay poor tax of ₹150", Card::Money { amount: -150 }),
    card("Your building loan matures - Collect ₹1500", Card::Money { amount: 1500 }),
    card("You have won a crossword competition - Collect ₹1000", Card::Money { amount: 1000 }),
    card("Bank pays you dividend of ₹500", Card::Money { amount: 500 }),
    card("Go back 3 spaces", Card::MoveBy { spaces: -3 }),
    card("Pay school fees of ₹1500", Card::Money { amount: -1500 }),
    card("Advance to nearest Railway Station", Card::NearestRailroad),
    card("Advance to nearest Utility", Card::NearestUtility),
    card(
        "Make general repairs - Pay ₹250 per house and ₹1000 per hotel",
        Card::Repairs { per_house: 250, per_hotel: 1000 },
    ),
    card("You have been elected Chairman - Pay each player ₹500", Card::EachPlayer { amount: -500 }),
    card("Advance to Connaught Place", Card::AdvanceTo { position: 11 }),
    card("Drunk in charge fine ₹200", Card::Money { amount: -200 }),
];

pub static COMMUNITY_DECK: [CardDef; 15] = [
    card("Advance to START - Collect ₹2000", Card::AdvanceTo { position: START_POSITION }),
    card("Bank error in your favor - Collect ₹2000", Card::Money { amount: 2000 }),
    card("Doctor's fee - Pay ₹500", Card::Money { amount: -500 }),
    card("From sale of stock you get ₹500", Card::Money { amount: 500 }),
    card("Go to Jail - Do not pass START", Card::GoToJail),
    card("Holiday fund matures - Receive ₹1000", Card::Money { amount: 1000 }),
    card("Income tax refund - Collect ₹200", Card::Money { amount: 200 }),
    card("It is your birthday - Collect ₹100 from every player", Card::EachPlayer { amount: 100 }),
    card("Life insurance matures - Collect ₹1000", Card::Money { amount: 1000 }),
    card("Hospital fees - Pay ₹1000", Card::Money { amount: -1000 }),
    card("School fees - Pay ₹500", Card::Money { amount: -500 }),
    card("Receive ₹250 consultancy fee", Card::Money { amount: 250 }),
    card(
        "You are assessed for street repairs - Pay ₹400 per house and ₹1150 per hotel",
        Card::Repairs { per_house: 400, per_hotel: 1150 },
    ),
    card("You have won second prize in a beauty contest - Collect ₹100", Card::Money { amount: 100 }),
    card("You inherit ₹1000", Card::Money { amount: 1000 }),
];

/// Which pile to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deck {
    Chance,
    Community,
}

impl Deck {
    pub fn cards(self) -> &'static [CardDef] {
        match self {
            Deck::Chance => &CHANCE_DECK,
            Deck::Community => &COMMUNITY_DECK,
        }
    }

    /// Draw one card uniformly; the decks are never exhausted
    pub fn draw(self, source: &mut dyn DiceSource) -> &'static CardDef {
        let cards = self.cards();
        let idx = source.pick(cards.len()).min(cards.len() - 1);
        &cards[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::dice::testing::ScriptedDice;

    #[test]
    fn draw_uses_picked_index() {
        let mut dice = ScriptedDice::new().with_picks(&[3, 99]);
        assert_eq!(Deck::Chance.draw(&mut dice).card, Card::Money { amount: -150 });
        // Out-of-range picks clamp to the last card
        assert_eq!(Deck::Chance.draw(&mut dice).card, Card::Money { amount: -200 });
    }

    #[test]
    fn both_decks_have_jail_and_start() {
        for deck in [Deck::Chance, Deck::Community] {
            let cards = deck.cards();
            assert!(cards.iter().any(|c| c.card == Card::GoToJail));
            assert!(cards
                .iter()
                .any(|c| c.card == Card::AdvanceTo { position: START_POSITION }));
        }
    }
}
