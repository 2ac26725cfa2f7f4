//! Per-room deadlines
//!
//! The engine never sleeps. It records which deadlines are live and emits
//! [`TimerCommand`]s; the room actor turns those into sleeping tasks that
//! post a [`Deadline`] back into the room inbox. A deadline whose generation
//! no longer matches is stale and gets dropped.

use std::time::Duration;

use serde::Serialize;

use crate::util::time::unix_millis;

/// Independent deadline slots; each holds at most one live deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Roll or action window of the active player
    Turn,
    Auction,
    /// Room teardown after the host leaves
    Expiry,
}

/// What the turn deadline forces when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Roll,
    Action,
}

/// Identity of one scheduled expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub slot: TimerSlot,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Arm { deadline: Deadline, after: Duration },
    Cancel(TimerSlot),
}

/// Live turn deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTimer {
    pub phase: TurnPhase,
    /// Unix millis
    pub ends_at: u64,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct Timers {
    turn: Option<TurnTimer>,
    auction: Option<u64>,
    expiry: Option<u64>,
    next_generation: u64,
    commands: Vec<TimerCommand>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn arm(&mut self, slot: TimerSlot, after: Duration) -> u64 {
        let generation = self.bump();
        self.commands.push(TimerCommand::Arm {
            deadline: Deadline { slot, generation },
            after,
        });
        generation
    }

    /// Replace the turn deadline
    pub fn arm_turn(&mut self, phase: TurnPhase, after: Duration) -> TurnTimer {
        let generation = self.arm(TimerSlot::Turn, after);
        let timer = TurnTimer {
            phase,
            ends_at: unix_millis() + after.as_millis() as u64,
            generation,
        };
        self.turn = Some(timer);
        timer
    }

    /// Returns whether a turn deadline was live
    pub fn clear_turn(&mut self) -> bool {
        let was_live = self.turn.take().is_some();
        if was_live {
            self.commands.push(TimerCommand::Cancel(TimerSlot::Turn));
        }
        was_live
    }

    pub fn arm_auction(&mut self, after: Duration) -> u64 {
        let generation = self.arm(TimerSlot::Auction, after);
        self.auction = Some(generation);
        generation
    }

    pub fn clear_auction(&mut self) {
        if self.auction.take().is_some() {
            self.commands.push(TimerCommand::Cancel(TimerSlot::Auction));
        }
    }

    pub fn arm_expiry(&mut self, after: Duration) {
        let generation = self.arm(TimerSlot::Expiry, after);
        self.expiry = Some(generation);
    }

    pub fn clear_expiry(&mut self) {
        if self.expiry.take().is_some() {
            self.commands.push(TimerCommand::Cancel(TimerSlot::Expiry));
        }
    }

    pub fn turn(&self) -> Option<TurnTimer> {
        self.turn
    }

    /// Consume a firing deadline if it is still the live one for its slot
    pub fn take_if_current(&mut self, deadline: Deadline) -> bool {
        let live = match deadline.slot {
            TimerSlot::Turn => self.turn.map(|t| t.generation),
            TimerSlot::Auction => self.auction,
            TimerSlot::Expiry => self.expiry,
        };
        if live != Some(deadline.generation) {
            return false;
        }
        match deadline.slot {
            TimerSlot::Turn => self.turn = None,
            TimerSlot::Auction => self.auction = None,
            TimerSlot::Expiry => self.expiry = None,
        }
        true
    }

    /// Drop everything, e.g. when the game ends
    pub fn clear_all(&mut self) {
        self.clear_turn();
        self.clear_auction();
        self.clear_expiry();
    }

    pub fn drain_commands(&mut self) -> Vec<TimerCommand> {
        std::mem::take(&mut self.commands)
    }
}
