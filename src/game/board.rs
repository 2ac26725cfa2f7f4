//! Static board catalog: 40 squares keyed by position

use serde::Serialize;

/// Number of squares around the board
pub const BOARD_SIZE: usize = 40;
/// START corner
pub const START_POSITION: usize = 0;
/// Jail / just visiting corner
pub const JAIL_POSITION: usize = 10;
/// Free parking corner (charges a fee under the house rules)
pub const FREE_PARKING_POSITION: usize = 20;
/// Go to jail corner
pub const GO_TO_JAIL_POSITION: usize = 30;

/// Board square type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareKind {
    Property,
    Railroad,
    Utility,
    Tax,
    Chance,
    Community,
    Corner,
}

/// Color groups of standard properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
}

impl ColorGroup {
    /// Positions of every property in this group
    pub fn members(self) -> &'static [usize] {
        match self {
            ColorGroup::Brown => &[1, 3],
            ColorGroup::LightBlue => &[6, 8, 9],
            ColorGroup::Pink => &[11, 13, 14],
            ColorGroup::Orange => &[16, 18, 19],
            ColorGroup::Red => &[21, 23, 24],
            ColorGroup::Yellow => &[26, 27, 29],
            ColorGroup::Green => &[31, 32, 34],
            ColorGroup::DarkBlue => &[37, 39],
        }
    }
}

/// Railroad positions
pub const RAILROADS: [usize; 4] = [5, 15, 25, 35];
/// Utility positions
pub const UTILITIES: [usize; 2] = [12, 28];

/// A single immutable board square
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Square {
    pub position: usize,
    pub name: &'static str,
    pub kind: SquareKind,
    pub group: Option<ColorGroup>,
    /// Purchase price, or the amount charged for tax squares
    pub price: i64,
    /// Rent tiers. Properties: `[base, 1h, 2h, 3h, 4h, hotel]`.
    /// Railroads: indexed by railroads owned minus one.
    pub rent: &'static [i64],
    pub house_cost: i64,
    pub mortgage_value: i64,
}

impl Square {
    /// Can be bought by a player standing on it
    pub fn is_purchasable(&self) -> bool {
        matches!(
            self.kind,
            SquareKind::Property | SquareKind::Railroad | SquareKind::Utility
        )
    }

    /// Can carry houses and hotels
    pub fn is_buildable(&self) -> bool {
        self.kind == SquareKind::Property && self.group.is_some()
    }
}

const fn property(
    position: usize,
    name: &'static str,
    group: ColorGroup,
    price: i64,
    rent: &'static [i64],
    house_cost: i64,
    mortgage_value: i64,
) -> Square {
    Square {
        position,
        name,
        kind: SquareKind::Property,
        group: Some(group),
        price,
        rent,
        house_cost,
        mortgage_value,
    }
}

const RAILROAD_RENT: &[i64] = &[250, 500, 1000, 2000];
// Utilities charge a dice multiple; the table is informational only.
const UTILITY_RENT: &[i64] = &[40, 100];

const fn railroad(position: usize, name: &'static str) -> Square {
    Square {
        position,
        name,
        kind: SquareKind::Railroad,
        group: None,
        price: 2000,
        rent: RAILROAD_RENT,
        house_cost: 0,
        mortgage_value: 1000,
    }
}

const fn utility(position: usize, name: &'static str) -> Square {
    Square {
        position,
        name,
        kind: SquareKind::Utility,
        group: None,
        price: 1500,
        rent: UTILITY_RENT,
        house_cost: 0,
        mortgage_value: 750,
    }
}

const fn special(position: usize, name: &'static str, kind: SquareKind, price: i64) -> Square {
    Square {
        position,
        name,
        kind,
        group: None,
        price,
        rent: &[],
        house_cost: 0,
        mortgage_value: 0,
    }
}

use ColorGroup::*;
use SquareKind::{Chance, Community, Corner, Tax};

/// The versioned board layout
pub static BOARD: [Square; BOARD_SIZE] = [
    special(0, "START", Corner, 0),
    property(1, "Old Delhi", Brown, 600, &[20, 100, 300, 900, 1600, 2500], 500, 300),
    special(2, "Community Chest", Community, 0),
    property(3, "Chandni Chowk", Brown, 600, &[40, 200, 600, 1800, 3200, 4500], 500, 300),
    special(4, "Income Tax", Tax, 2000),
    railroad(5, "New Delhi Railway Station"),
    property(6, "Lodhi Road", LightBlue, 1000, &[60, 300, 900, 2700, 4000, 5500], 500, 500),
    special(7, "Chance", Chance, 0),
    property(8, "Khan Market", LightBlue, 1000, &[60, 300, 900, 2700, 4000, 5500], 500, 500),
    property(9, "India Gate", LightBlue, 1200, &[80, 400, 1000, 3000, 4500, 6000], 500, 600),
    special(10, "JAIL", Corner, 0),
    property(11, "Connaught Place", Pink, 1400, &[100, 500, 1500, 4500, 6250, 7500], 1000, 700),
    utility(12, "Electric Company"),
    property(13, "Rajpath", Pink, 1400, &[100, 500, 1500, 4500, 6250, 7500], 1000, 700),
    property(14, "Lutyen's Delhi", Pink, 1600, &[120, 600, 1800, 5000, 7000, 9000], 1000, 800),
    railroad(15, "Chhatrapati Shivaji Terminus"),
    property(16, "Nariman Point", Orange, 1800, &[140, 700, 2000, 5500, 7500, 9500], 1000, 900),
    special(17, "Community Chest", Community, 0),
    property(18, "Marine Drive", Orange, 1800, &[140, 700, 2000, 5500, 7500, 9500], 1000, 900),
    property(19, "Bandra-Kurla Complex", Orange, 2000, &[160, 800, 2200, 6000, 8000, 10000], 1000, 1000),
    special(20, "FREE PARKING", Corner, 0),
    property(21, "Brigade Road", Red, 2200, &[180, 900, 2500, 7000, 8750, 10500], 1500, 1100),
    special(22, "Chance", Chance, 0),
    property(23, "MG Road", Red, 2200, &[180, 900, 2500, 7000, 8750, 10500], 1500, 1100),
    property(24, "Commercial Street", Red, 2400, &[200, 1000, 3000, 7500, 9250, 11000], 1500, 1200),
    railroad(25, "Bangalore City Railway Station"),
    property(26, "Electronic City", Yellow, 2600, &[220, 1100, 3300, 8000, 9750, 11500], 1500, 1300),
    property(27, "Whitefield", Yellow, 2600, &[220, 1100, 3300, 8000, 9750, 11500], 1500, 1300),
    utility(28, "Water Works"),
    property(29, "Koramangala", Yellow, 2800, &[240, 1200, 3600, 8500, 10250, 12000], 1500, 1400),
    special(30, "GO TO JAIL", Corner, 0),
    property(31, "Park Street", Green, 3000, &[260, 1300, 3900, 9000, 11000, 12750], 2000, 1500),
    property(32, "Salt Lake City", Green, 3000, &[260, 1300, 3900, 9000, 11000, 12750], 2000, 1500),
    special(33, "Community Chest", Community, 0),
    property(34, "New Town", Green, 3200, &[280, 1500, 4500, 10000, 12000, 14000], 2000, 1600),
    railroad(35, "Howrah Railway Station"),
    special(36, "Chance", Chance, 0),
    property(37, "Bandra West", DarkBlue, 3500, &[350, 1750, 5000, 11000, 13000, 15000], 2000, 1750),
    special(38, "Super Tax", Tax, 1000),
    property(39, "Juhu Beach", DarkBlue, 4000, &[500, 2000, 6000, 14000, 17000, 20000], 2000, 2000),
];

/// Look up a square by position
pub fn square(position: usize) -> Option<&'static Square> {
    BOARD.get(position)
}

/// Next square of `kind` strictly ahead of `from`, moving clockwise
pub fn nearest(from: usize, kind: SquareKind) -> usize {
    let candidates: &[usize] = match kind {
        SquareKind::Railroad => &RAILROADS,
        SquareKind::Utility => &UTILITIES,
        _ => &[],
    };

    candidates
        .iter()
        .copied()
        .min_by_key(|&pos| (pos + BOARD_SIZE - from - 1) % BOARD_SIZE)
        .unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_match_indices() {
        for (i, sq) in BOARD.iter().enumerate() {
            assert_eq!(sq.position, i, "square {} misplaced", sq.name);
        }
    }

    #[test]
    fn properties_have_full_rent_tables() {
        for sq in BOARD.iter().filter(|s| s.kind == SquareKind::Property) {
            assert_eq!(sq.rent.len(), 6, "{}", sq.name);
            assert_eq!(sq.mortgage_value * 2, sq.price, "{}", sq.name);
            let group = sq.group.expect("property without group");
            assert!(group.members().contains(&sq.position));
        }
    }

    #[test]
    fn nearest_railroad_wraps() {
        assert_eq!(nearest(7, SquareKind::Railroad), 15);
        assert_eq!(nearest(36, SquareKind::Railroad), 5);
        assert_eq!(nearest(5, SquareKind::Railroad), 15);
    }

    #[test]
    fn nearest_utility() {
        assert_eq!(nearest(7, SquareKind::Utility), 12);
        assert_eq!(nearest(22, SquareKind::Utility), 28);
        assert_eq!(nearest(36, SquareKind::Utility), 12);
    }

    #[test]
    fn out_of_range_lookup() {
        assert!(square(40).is_none());
        assert_eq!(square(4).map(|s| s.price), Some(2000));
    }
}
