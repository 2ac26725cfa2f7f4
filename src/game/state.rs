//! Room and player records

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::board::{self, ColorGroup, SquareKind};

/// Room lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Playing,
    Finished,
}

/// Player record (authoritative)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub money: i64,
    pub position: usize,
    pub properties: BTreeSet<usize>,
    pub mortgaged_properties: BTreeSet<usize>,
    pub hotel_properties: BTreeSet<usize>,
    /// House level 0-4 keyed by position; absent means 0
    pub building_levels: BTreeMap<usize, u8>,
    pub is_in_jail: bool,
    pub jail_turns: u8,
    pub consecutive_doubles: u8,
    pub pending_double_decision: bool,
    pub has_rolled_this_turn: bool,
    pub has_bought_this_turn: bool,
    pub is_connected: bool,
    pub is_active: bool,
    pub is_eliminated: bool,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub elimination_order: Option<u32>,
}

/// Partial update for a player. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    pub color: Option<Option<String>>,
    pub money: Option<i64>,
    pub position: Option<usize>,
    pub properties: Option<BTreeSet<usize>>,
    pub mortgaged_properties: Option<BTreeSet<usize>>,
    pub hotel_properties: Option<BTreeSet<usize>>,
    pub building_levels: Option<BTreeMap<usize, u8>>,
    pub is_in_jail: Option<bool>,
    pub jail_turns: Option<u8>,
    pub consecutive_doubles: Option<u8>,
    pub pending_double_decision: Option<bool>,
    pub has_rolled_this_turn: Option<bool>,
    pub has_bought_this_turn: Option<bool>,
    pub is_connected: Option<bool>,
    pub is_active: Option<bool>,
    pub is_eliminated: Option<bool>,
    pub eliminated_at: Option<Option<DateTime<Utc>>>,
    pub elimination_order: Option<Option<u32>>,
}

impl PlayerPatch {
    /// Clears per-turn flags when the turn passes on
    pub fn end_of_turn() -> Self {
        Self {
            consecutive_doubles: Some(0),
            pending_double_decision: Some(false),
            has_rolled_this_turn: Some(false),
            has_bought_this_turn: Some(false),
            ..Self::default()
        }
    }

    /// Fresh state for a new game
    pub fn new_game(start_money: i64) -> Self {
        Self {
            money: Some(start_money),
            position: Some(0),
            properties: Some(BTreeSet::new()),
            mortgaged_properties: Some(BTreeSet::new()),
            hotel_properties: Some(BTreeSet::new()),
            building_levels: Some(BTreeMap::new()),
            is_in_jail: Some(false),
            jail_turns: Some(0),
            is_active: Some(true),
            is_eliminated: Some(false),
            eliminated_at: Some(None),
            elimination_order: Some(None),
            ..Self::end_of_turn()
        }
    }

    pub fn jailed(jail_position: usize, turns: u8) -> Self {
        Self {
            position: Some(jail_position),
            is_in_jail: Some(true),
            jail_turns: Some(turns),
            consecutive_doubles: Some(0),
            pending_double_decision: Some(false),
            ..Self::default()
        }
    }

    pub fn released() -> Self {
        Self {
            is_in_jail: Some(false),
            jail_turns: Some(0),
            ..Self::default()
        }
    }
}

impl Player {
    pub fn new(id: Uuid, name: String, color: Option<String>, money: i64) -> Self {
        Self {
            id,
            name,
            color,
            money,
            position: 0,
            properties: BTreeSet::new(),
            mortgaged_properties: BTreeSet::new(),
            hotel_properties: BTreeSet::new(),
            building_levels: BTreeMap::new(),
            is_in_jail: false,
            jail_turns: 0,
            consecutive_doubles: 0,
            pending_double_decision: false,
            has_rolled_this_turn: false,
            has_bought_this_turn: false,
            is_connected: true,
            is_active: true,
            is_eliminated: false,
            eliminated_at: None,
            elimination_order: None,
        }
    }

    /// Apply a patch and restore the ledger invariants
    pub fn apply(&mut self, patch: PlayerPatch) {
        if let Some(v) = patch.color {
            self.color = v;
        }
        if let Some(v) = patch.money {
            self.money = v;
        }
        if let Some(v) = patch.position {
            self.position = v % board::BOARD_SIZE;
        }
        if let Some(v) = patch.properties {
            self.properties = v;
        }
        if let Some(v) = patch.mortgaged_properties {
            self.mortgaged_properties = v;
        }
        if let Some(v) = patch.hotel_properties {
            self.hotel_properties = v;
        }
        if let Some(v) = patch.building_levels {
            self.building_levels = v;
        }
        if let Some(v) = patch.is_in_jail {
            self.is_in_jail = v;
        }
        if let Some(v) = patch.jail_turns {
            self.jail_turns = v;
        }
        if let Some(v) = patch.consecutive_doubles {
            self.consecutive_doubles = v;
        }
        if let Some(v) = patch.pending_double_decision {
            self.pending_double_decision = v;
        }
        if let Some(v) = patch.has_rolled_this_turn {
            self.has_rolled_this_turn = v;
        }
        if let Some(v) = patch.has_bought_this_turn {
            self.has_bought_this_turn = v;
        }
        if let Some(v) = patch.is_connected {
            self.is_connected = v;
        }
        if let Some(v) = patch.is_active {
            self.is_active = v;
        }
        if let Some(v) = patch.is_eliminated {
            self.is_eliminated = v;
        }
        if let Some(v) = patch.eliminated_at {
            self.eliminated_at = v;
        }
        if let Some(v) = patch.elimination_order {
            self.elimination_order = v;
        }
        self.normalize();
    }

    /// Mortgaged and hotel sets stay inside the owned set, a square is never
    /// both mortgaged and hoteled, and hotel or mortgaged squares carry no houses.
    fn normalize(&mut self) {
        let owned = &self.properties;
        self.mortgaged_properties.retain(|p| owned.contains(p));
        self.hotel_properties
            .retain(|p| owned.contains(p) && !self.mortgaged_properties.contains(p));
        let mortgaged = &self.mortgaged_properties;
        let hotels = &self.hotel_properties;
        self.building_levels.retain(|p, level| {
            *level > 0 && owned.contains(p) && !mortgaged.contains(p) && !hotels.contains(p)
        });
        for level in self.building_levels.values_mut() {
            *level = (*level).min(4);
        }
        if !self.is_in_jail {
            self.jail_turns = 0;
        }
    }

    pub fn owns(&self, position: usize) -> bool {
        self.properties.contains(&position)
    }

    pub fn is_mortgaged(&self, position: usize) -> bool {
        self.mortgaged_properties.contains(&position)
    }

    pub fn has_hotel(&self, position: usize) -> bool {
        self.hotel_properties.contains(&position)
    }

    pub fn house_level(&self, position: usize) -> u8 {
        self.building_levels.get(&position).copied().unwrap_or(0)
    }

    /// Level used for even-building checks: hotels count above four houses
    pub fn improvement_level(&self, position: usize) -> u8 {
        if self.has_hotel(position) {
            5
        } else {
            self.house_level(position)
        }
    }

    pub fn owns_group(&self, group: ColorGroup) -> bool {
        group.members().iter().all(|p| self.properties.contains(p))
    }

    pub fn count_owned(&self, kind: SquareKind) -> usize {
        self.properties
            .iter()
            .filter(|&&p| board::square(p).map(|s| s.kind) == Some(kind))
            .count()
    }

    pub fn total_houses(&self) -> i64 {
        self.building_levels.values().map(|&l| l as i64).sum()
    }

    pub fn total_hotels(&self) -> i64 {
        self.hotel_properties.len() as i64
    }

    /// Take ownership of a square, optionally already mortgaged
    pub fn grant_property(&mut self, position: usize, mortgaged: bool) {
        self.properties.insert(position);
        if mortgaged {
            self.mortgaged_properties.insert(position);
        }
        self.normalize();
    }

    /// Give up a square; returns whether it was mortgaged. Buildings go with it.
    pub fn release_property(&mut self, position: usize) -> bool {
        let was_mortgaged = self.mortgaged_properties.contains(&position);
        self.properties.remove(&position);
        self.normalize();
        was_mortgaged
    }

    /// Remove houses and hotel from a square
    pub fn strip_buildings(&mut self, position: usize) {
        self.building_levels.remove(&position);
        self.hotel_properties.remove(&position);
    }

    /// Still in the turn rotation
    pub fn in_rotation(&self) -> bool {
        !self.is_eliminated
    }
}

/// Final ranking row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player_id: Uuid,
    pub name: String,
    pub rank: u32,
    pub money: i64,
    pub eliminated: bool,
}

/// Room record (authoritative)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub host_id: Uuid,
    pub max_players: usize,
    pub start_money: i64,
    pub players: Vec<Player>,
    pub game_state: RoomPhase,
    pub current_player_index: usize,
    pub turn_number: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new(id: Uuid, code: String, host: Player, max_players: usize, start_money: i64) -> Self {
        Self {
            id,
            code,
            host_id: host.id,
            max_players,
            start_money,
            players: vec![host],
            game_state: RoomPhase::Waiting,
            current_player_index: 0,
            turn_number: 1,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Move the phase forward; backwards transitions are ignored
    pub fn advance_phase(&mut self, to: RoomPhase) -> bool {
        if to > self.game_state {
            self.game_state = to;
            true
        } else {
            false
        }
    }

    pub fn player_index(&self, id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    /// Index of whoever owns `position`
    pub fn owner_index(&self, position: usize) -> Option<usize> {
        self.players.iter().position(|p| p.owns(position))
    }

    /// Next player in rotation after the current one; `wrapped` is true when
    /// the search passed the end of the list.
    pub fn next_in_rotation(&self) -> Option<(usize, bool)> {
        let n = self.players.len();
        (1..=n)
            .map(|step| self.current_player_index + step)
            .find(|&i| self.players[i % n].in_rotation())
            .map(|i| (i % n, i >= n))
    }

    /// Active players by cash, then eliminated players by how long they lasted
    pub fn standings(&self) -> Vec<Standing> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| {
            a.is_eliminated
                .cmp(&b.is_eliminated)
                .then_with(|| {
                    if a.is_eliminated {
                        b.elimination_order.cmp(&a.elimination_order)
                    } else {
                        b.money.cmp(&a.money)
                    }
                })
        });

        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| Standing {
                player_id: p.id,
                name: p.name.clone(),
                rank: (i + 1) as u32,
                money: p.money,
                eliminated: p.is_eliminated,
            })
            .collect()
    }
}
