//! Per-loop function-pointer state machine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌────────────┬──────────┬───────────────┬──────────┬───────────┐  │
//! │  │ Status     │ on_enter │ on_change     │ on_tick  │ settle    │  │
//! │  ├────────────┼──────────┼───────────────┼──────────┼───────────┤  │
//! │  │ Idle       │ relays   │ fn(ctx, id)   │    -     │ fn(ctx)   │  │
//! │  │ Approach   │ relays   │ fn(ctx, id)   │ fn(ctx)  │    -      │  │
//! │  │ ...        │          │               │          │           │  │
//! │  │ Occupied   │ relays   │ fn(ctx, id)   │    -     │ fn(ctx)   │  │
//! │  └────────────┴──────────┴───────────────┴──────────┴───────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine owns the table; each loop slot owns a [`LoopState`].  Every
//! call runs against a [`LoopContext`] built for one slot:
//!
//! * [`LoopAutomaton::on_change`] for each settled sensor change the loop
//!   references.  Boundary marks and the outage check run first, then the
//!   current status' `on_change` handler.
//! * [`LoopAutomaton::on_tick`] from the periodic sweep: outage expiry,
//!   boundary mark bookkeeping, then the status' `on_tick` handler.
//!
//! A handler returning `Some(transition)` makes the engine switch status,
//! run the new status' `on_enter` (which requests a relay policy) and then
//! its `settle` check, which may chain into a further transition.  Chains
//! are bounded.
//!
//! Handlers never fail.  Contradictory sensor combinations either leave
//! the status alone or fall back to idle/occupied.

pub mod context;
pub mod states;

use log::{info, warn};

pub use context::{
    LoopContext, LoopState, Notice, Reaction, RelayPolicy, RelayWrites, Transition, Turn,
};

use crate::config::ControlConfig;
use crate::geometry::Side;
use crate::safety::{OutagePolicy, OutageVerdict};
use crate::sensors::{SensorChange, SensorId};

/// Default wait in `moving` for an endpoint to report the train after the
/// core emptied (ms).
pub const DEFAULT_CORE_ABANDON_TIMEOUT_MS: u32 = 3_000;

/// Upper bound on transitions executed for one event.
const MAX_CHAIN: usize = 4;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Loop status.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Idle = 0,
    Approach = 1,
    ReadyEnter = 2,
    Entering = 3,
    Moving = 4,
    Armed = 5,
    Exiting = 6,
    Exited = 7,
    /// Cold boot / ambiguous: a train is inside but its direction is unknown.
    Occupied = 8,
}

impl Status {
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Approach,
        Self::ReadyEnter,
        Self::Entering,
        Self::Moving,
        Self::Armed,
        Self::Exiting,
        Self::Exited,
        Self::Occupied,
    ];

    /// Convert an index back to `Status`.  Out-of-range indices fall back
    /// to `Occupied`, the conservative "train somewhere inside" status.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(status) => *status,
            None => {
                debug_assert!(false, "invalid status index: {idx}");
                Self::Occupied
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Approach => "approach",
            Self::ReadyEnter => "readyEnter",
            Self::Entering => "entering",
            Self::Moving => "moving",
            Self::Armed => "armed",
            Self::Exiting => "exiting",
            Self::Exited => "exited",
            Self::Occupied => "occupied",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once when a status is entered; requests the relay policy.
pub type EnterFn = fn(&mut LoopContext);

/// Reacts to one settled change of a sensor the loop references.
pub type ChangeFn = fn(&mut LoopContext, SensorId) -> Option<Transition>;

/// Change-free check, used for the periodic sweep and for settling right
/// after a transition.
pub type CheckFn = fn(&mut LoopContext) -> Option<Transition>;

/// One row of the state table.
pub struct StateDescriptor {
    pub status: Status,
    pub name: &'static str,
    pub on_enter: Option<EnterFn>,
    pub on_change: ChangeFn,
    pub on_tick: Option<CheckFn>,
    pub settle: Option<CheckFn>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct LoopAutomaton {
    table: [StateDescriptor; Status::COUNT],
    outage: OutagePolicy,
    abandon_timeout_ms: u32,
}

impl LoopAutomaton {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            table: states::build_state_table(),
            outage: OutagePolicy::new(config),
            abandon_timeout_ms: config.core_abandon_timeout_ms,
        }
    }

    /// Build the context for one call on loop `slot`.
    pub fn context<'a>(
        &self,
        slot: usize,
        def: &'a crate::geometry::LoopDef,
        state: &'a mut LoopState,
        bus: &'a dyn crate::sensors::SensorRead,
        now_ms: u64,
    ) -> LoopContext<'a> {
        let mut ctx = LoopContext::new(slot, def, state, bus, now_ms);
        ctx.abandon_timeout_ms = self.abandon_timeout_ms;
        ctx
    }

    pub fn descriptor(&self, status: Status) -> &StateDescriptor {
        &self.table[status as usize]
    }

    pub fn outage_policy(&self) -> &OutagePolicy {
        &self.outage
    }

    /// Reset the loop to idle and resolve whatever the sensors already
    /// show.  Used after (re)definition, restore and reset.
    pub fn start(&self, ctx: &mut LoopContext) {
        *ctx.state = LoopState {
            since_ms: ctx.now_ms,
            ..LoopState::default()
        };
        ctx.previous = Status::Idle;
        ctx.set_relays(RelayPolicy::Idle);
        if !ctx.def.active {
            return;
        }
        let settle = self.descriptor(Status::Idle).settle;
        if let Some(next) = settle.and_then(|f| f(ctx)) {
            self.enter(ctx, next);
        }
    }

    /// Feed one settled sensor change.
    pub fn on_change(&self, ctx: &mut LoopContext, change: SensorChange) {
        let id = change.id;
        if !ctx.def.active || !ctx.def.has_sensor(id) {
            return;
        }

        for side in Side::BOTH {
            if ctx.endpoint(side).is_boundary_sensor(id) {
                ctx.state.marks[side.index()] = Some(ctx.now_ms);
            }
        }

        if self.outage_holds(ctx) {
            return;
        }

        let handler = self.descriptor(ctx.state.status).on_change;
        if let Some(next) = handler(ctx, id) {
            self.enter(ctx, next);
        }
    }

    /// Periodic bookkeeping for one loop.
    pub fn on_tick(&self, ctx: &mut LoopContext) {
        if !ctx.def.active {
            return;
        }

        let status = ctx.state.status;
        let verdict = self
            .outage
            .evaluate(ctx.state.outage_since, ctx.now_ms, status);
        if let OutageVerdict::Expired { .. } = verdict {
            self.outage.log_expired(ctx.slot, status);
            ctx.emit(Notice::OutageTimeout { status });
            self.force_idle(ctx);
            return;
        }

        let settle = u64::from(ctx.def.settle_timeout());
        for side in Side::BOTH {
            let i = side.index();
            if ctx.endpoint(side).sensors_active(ctx.bus) {
                ctx.state.marks[i] = Some(ctx.now_ms);
            } else if let Some(mark) = ctx.state.marks[i] {
                if ctx.now_ms.saturating_sub(mark) >= settle {
                    ctx.state.marks[i] = None;
                }
            }
        }

        if let Some(next) = self.descriptor(status).on_tick.and_then(|f| f(ctx)) {
            self.enter(ctx, next);
        }
    }

    /// Drop whatever the loop was doing and go idle.
    pub fn force_idle(&self, ctx: &mut LoopContext) {
        ctx.state.outage_since = None;
        if ctx.state.status == Status::Idle {
            ctx.set_relays(RelayPolicy::Idle);
        } else {
            self.enter(ctx, Transition::to(Status::Idle));
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Outage bookkeeping ahead of the status handler.  Returns `true` when
    /// the change must not reach the handler.
    fn outage_holds(&self, ctx: &mut LoopContext) -> bool {
        let status = ctx.state.status;
        if ctx.def.occupied_track_sensors(ctx.bus) == 0 {
            if !OutagePolicy::applies_to(status) {
                // Nothing left anywhere: edge statuses and occupied are done.
                if status == Status::Idle {
                    return false;
                }
                self.force_idle(ctx);
                return true;
            }
            if ctx.state.outage_since.is_none() {
                ctx.state.outage_since = Some(ctx.now_ms);
                OutagePolicy::log_started(ctx.slot, status);
                ctx.emit(Notice::OutageStarted);
            }
            return true;
        }

        if let Some(since) = ctx.state.outage_since.take() {
            OutagePolicy::log_cleared(ctx.slot, ctx.now_ms.saturating_sub(since));
            ctx.emit(Notice::OutageCleared);
        }
        false
    }

    fn enter(&self, ctx: &mut LoopContext, mut next: Transition) {
        for _ in 0..MAX_CHAIN {
            let from = ctx.state.status;
            ctx.state.direction = match next.turn {
                Turn::Keep => ctx.state.direction,
                Turn::Reverse => ctx.state.direction.opposite(),
                Turn::Toward(side) => side,
            };
            ctx.state.status = next.to;
            ctx.state.since_ms = ctx.now_ms;
            ctx.state.timeout = None;
            ctx.previous = from;

            let desc = self.descriptor(next.to);
            info!(
                "loop {}: {} -> {} ({})",
                ctx.slot,
                self.descriptor(from).name,
                desc.name,
                ctx.state.direction.name()
            );
            ctx.emit(Notice::Transition {
                from,
                to: next.to,
                direction: ctx.state.direction,
            });
            // An outage only survives into statuses that may hold one.
            if !OutagePolicy::applies_to(next.to) && ctx.state.outage_since.take().is_some() {
                ctx.emit(Notice::OutageCleared);
            }

            if let Some(enter) = desc.on_enter {
                enter(ctx);
            }
            match desc.settle.and_then(|f| f(ctx)) {
                Some(t) => next = t,
                None => return,
            }
        }
        warn!(
            "loop {}: transition chain cut in {}",
            ctx.slot,
            ctx.state.status.name()
        );
    }
}
