//! Per-loop runtime state and the context threaded through state handlers.
//!
//! `LoopContext` is the blackboard every handler reads from and writes to:
//! the loop's static definition, its mutable [`LoopState`], read access to
//! the sensor table and the current time.  Handlers never touch relays
//! directly; they request a [`RelayPolicy`] and the caller applies it once
//! the reaction is complete.

use heapless::Vec;
use log::debug;

use super::Status;
use crate::drivers::relay::{NO_RELAY, RelayId};
use crate::geometry::{Endpoint, LoopDef, Side};
use crate::sensors::{SensorId, SensorRead};

// ---------------------------------------------------------------------------
// Relay policy
// ---------------------------------------------------------------------------

/// What the loop's relays should be doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayPolicy {
    /// Both endpoints at their own off-value.
    #[default]
    Idle,
    /// Loop polarity aligned with `side`: the other endpoint is written to
    /// its off-value first, then `side` to its trigger value.
    Align(Side),
}

/// Relay writes for one policy, in the order they must be applied.
pub type RelayWrites = Vec<(RelayId, bool), 2>;

impl RelayPolicy {
    pub fn writes(&self, def: &LoopDef) -> RelayWrites {
        let (first, second) = match *self {
            Self::Idle => (
                (def.left.relay, def.left.off_state),
                (def.right.relay, def.right.off_state),
            ),
            Self::Align(side) => {
                let other = def.endpoint(side.opposite());
                let own = def.endpoint(side);
                ((other.relay, other.off_state), (own.relay, own.trigger_state))
            }
        };
        let mut writes = RelayWrites::new();
        for w in [first, second] {
            if w.0 != NO_RELAY {
                // Two writes at most.
                let _ = writes.push(w);
            }
        }
        writes
    }
}

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Mutable per-loop state.  Never persisted; a (re)definition starts over
/// from [`LoopState::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    pub status: Status,
    /// Endpoint the train is moving towards.
    pub direction: Side,
    /// Time the current status was entered.
    pub since_ms: u64,
    /// Last time each endpoint's boundary triggers were seen changing or
    /// active, indexed by [`Side::index`].
    pub marks: [Option<u64>; 2],
    pub outage_since: Option<u64>,
    /// Scratch timestamp owned by the current status; cleared on every
    /// transition.
    pub timeout: Option<u64>,
    pub relays: RelayPolicy,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            direction: Side::Left,
            since_ms: 0,
            marks: [None; 2],
            outage_since: None,
            timeout: None,
            relays: RelayPolicy::Idle,
        }
    }
}

impl LoopState {
    pub fn in_outage(&self) -> bool {
        self.outage_since.is_some()
    }
}

// ---------------------------------------------------------------------------
// Transitions and notices
// ---------------------------------------------------------------------------

/// How a transition changes the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Keep,
    Reverse,
    Toward(Side),
}

/// Requested by a handler; executed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: Status,
    pub turn: Turn,
}

impl Transition {
    pub const fn to(to: Status) -> Self {
        Self {
            to,
            turn: Turn::Keep,
        }
    }

    pub const fn reversed(to: Status) -> Self {
        Self {
            to,
            turn: Turn::Reverse,
        }
    }

    pub const fn toward(to: Status, side: Side) -> Self {
        Self {
            to,
            turn: Turn::Toward(side),
        }
    }
}

/// Something the caller should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Transition {
        from: Status,
        to: Status,
        direction: Side,
    },
    AmbiguousEntry,
    OutageStarted,
    OutageCleared,
    OutageTimeout {
        status: Status,
    },
}

pub type Notices = Vec<Notice, 12>;

/// Outcome of one call into the automaton.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub notices: Notices,
    /// The relay policy was (re)requested and must be applied.
    pub relays_changed: bool,
}

impl Reaction {
    pub fn transitions(&self) -> impl Iterator<Item = (Status, Status)> + '_ {
        self.notices.iter().filter_map(|n| match *n {
            Notice::Transition { from, to, .. } => Some((from, to)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// LoopContext
// ---------------------------------------------------------------------------

pub struct LoopContext<'a> {
    pub slot: usize,
    pub def: &'a LoopDef,
    pub state: &'a mut LoopState,
    pub bus: &'a dyn SensorRead,
    pub now_ms: u64,
    /// Status before the transition being entered.
    pub previous: Status,
    pub abandon_timeout_ms: u32,
    reaction: Reaction,
}

impl<'a> LoopContext<'a> {
    pub fn new(
        slot: usize,
        def: &'a LoopDef,
        state: &'a mut LoopState,
        bus: &'a dyn SensorRead,
        now_ms: u64,
    ) -> Self {
        let previous = state.status;
        Self {
            slot,
            def,
            state,
            bus,
            now_ms,
            previous,
            abandon_timeout_ms: super::DEFAULT_CORE_ABANDON_TIMEOUT_MS,
            reaction: Reaction::default(),
        }
    }

    pub fn into_reaction(self) -> Reaction {
        self.reaction
    }

    // ── Direction helpers ─────────────────────────────────────

    /// Side the train came from.
    pub fn from(&self) -> Side {
        self.state.direction.opposite()
    }

    /// Side the train is heading to.
    pub fn to(&self) -> Side {
        self.state.direction
    }

    pub fn endpoint(&self, side: Side) -> &'a Endpoint {
        self.def.endpoint(side)
    }

    pub fn from_ep(&self) -> &'a Endpoint {
        self.endpoint(self.from())
    }

    pub fn to_ep(&self) -> &'a Endpoint {
        self.endpoint(self.to())
    }

    // ── Sensor helpers ────────────────────────────────────────

    pub fn core_active(&self) -> bool {
        self.def.core.occupied(self.bus)
    }

    pub fn is_core_sensor(&self, id: SensorId) -> bool {
        self.def.core.has_sensor(id)
    }

    /// No boundary trigger of `side` is active and none was seen within
    /// the loop's settle timeout.
    pub fn boundary_quiet(&self, side: Side) -> bool {
        if self.endpoint(side).sensors_active(self.bus) {
            return false;
        }
        match self.state.marks[side.index()] {
            None => true,
            Some(mark) => self.now_ms.saturating_sub(mark) >= u64::from(self.def.settle_timeout()),
        }
    }

    // ── Outputs ───────────────────────────────────────────────

    pub fn set_relays(&mut self, policy: RelayPolicy) {
        self.state.relays = policy;
        self.reaction.relays_changed = true;
    }

    pub fn emit(&mut self, notice: Notice) {
        if self.reaction.notices.push(notice).is_err() {
            debug!("loop {}: notice dropped, reaction full", self.slot);
        }
    }
}
