//! Tunable rule constants for a room

use std::time::Duration;

/// Numbers the engine plays by. Built once from config and shared by every room.
#[derive(Debug, Clone)]
pub struct Rules {
    /// Credited when passing or landing on START
    pub start_bonus: i64,
    /// Paid to leave jail early
    pub jail_fine: i64,
    /// House rule: landing on free parking costs this much
    pub free_parking_fee: i64,
    /// Turns a jailed player must sit out
    pub jail_skip_turns: u8,
    /// Interest added when lifting a mortgage, in percent
    pub unmortgage_interest_percent: i64,
    /// Fraction of face value the bank pays for a distressed sale, in percent
    pub bank_sale_percent: i64,
    pub min_auction_bid: i64,
    pub railroad_card_multiplier: i64,
    pub utility_card_multiplier: i64,
    pub min_players: usize,
    pub max_players: usize,
    pub default_start_money: i64,
    pub min_start_money: i64,
    pub max_start_money: i64,
    pub roll_timeout: Duration,
    pub action_timeout: Duration,
    pub auction_duration: Duration,
    pub room_expiry: Duration,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            start_bonus: 2000,
            jail_fine: 500,
            free_parking_fee: 500,
            jail_skip_turns: 1,
            unmortgage_interest_percent: 10,
            bank_sale_percent: 50,
            min_auction_bid: 100,
            railroad_card_multiplier: 2,
            utility_card_multiplier: 10,
            min_players: 2,
            max_players: 8,
            default_start_money: 15_000,
            min_start_money: 5_000,
            max_start_money: 50_000,
            roll_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(120),
            auction_duration: Duration::from_secs(20),
            room_expiry: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl Rules {
    /// Cost of lifting a mortgage, rounded up
    pub fn unmortgage_cost(&self, mortgage_value: i64) -> i64 {
        let scaled = mortgage_value * (100 + self.unmortgage_interest_percent);
        (scaled + 99) / 100
    }

    /// What the bank pays for a property of the given face value
    pub fn bank_sale_value(&self, price: i64) -> i64 {
        price * self.bank_sale_percent / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmortgage_rounds_up() {
        let rules = Rules::default();
        assert_eq!(rules.unmortgage_cost(300), 330);
        assert_eq!(rules.unmortgage_cost(750), 825);
        assert_eq!(rules.unmortgage_cost(1), 2);
    }

    #[test]
    fn bank_pays_half() {
        let rules = Rules::default();
        assert_eq!(rules.bank_sale_value(600), 300);
        assert_eq!(rules.bank_sale_value(1401), 700);
    }
}
