//! Concrete status handlers and the table builder.
//!
//! ```text
//!  IDLE ──[one side primed]──▶ APPROACH ──[trigger seen]──▶ READY_ENTER
//!   ▲  ▲                         │    │                       │
//!   │  └──[false start]──────────┘    └──[core]──┬────────────┘
//!   │                                            ▼
//!   │                          ENTERING ──[entry clear]──▶ MOVING ◀──┐
//!   │                                                  [far primed]  │
//!   │                                                        ▼     [revert]
//!   │                                                      ARMED ────┘
//!   │                                                [far occupied]
//!   │                                                        ▼
//!   └──[outer track clear]── EXITED ◀──[core clear]───── EXITING
//!
//!  IDLE ──[core while idle]──▶ OCCUPIED / ARMED   (cold resolution)
//!  any interior status ──[outage expired]──▶ IDLE
//! ```
//!
//! "from" is the side the train came from, "to" the side it heads for;
//! both follow the loop's direction.

use log::info;

use super::context::{LoopContext, RelayPolicy, Transition};
use super::{StateDescriptor, Status};
use crate::geometry::Side;
use crate::sensors::SensorId;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; Status::COUNT] {
    [
        StateDescriptor {
            status: Status::Idle,
            name: Status::Idle.name(),
            on_enter: Some(idle_enter),
            on_change: idle_change,
            on_tick: None,
            settle: Some(idle_settle),
        },
        StateDescriptor {
            status: Status::Approach,
            name: Status::Approach.name(),
            on_enter: Some(approach_enter),
            on_change: approach_change,
            on_tick: Some(ready_enter_due),
            settle: None,
        },
        StateDescriptor {
            status: Status::ReadyEnter,
            name: Status::ReadyEnter.name(),
            on_enter: Some(align_from),
            on_change: entry_progress,
            on_tick: None,
            settle: None,
        },
        StateDescriptor {
            status: Status::Entering,
            name: Status::Entering.name(),
            on_enter: Some(align_from),
            on_change: entering_change,
            on_tick: None,
            settle: None,
        },
        StateDescriptor {
            status: Status::Moving,
            name: Status::Moving.name(),
            on_enter: Some(moving_enter),
            on_change: moving_change,
            on_tick: Some(moving_tick),
            settle: Some(maybe_arm),
        },
        StateDescriptor {
            status: Status::Armed,
            name: Status::Armed.name(),
            on_enter: Some(align_to),
            on_change: armed_change,
            on_tick: Some(armed_tick),
            settle: Some(armed_settle),
        },
        StateDescriptor {
            status: Status::Exiting,
            name: Status::Exiting.name(),
            on_enter: Some(align_to),
            on_change: exiting_change,
            on_tick: Some(exiting_tick),
            settle: None,
        },
        StateDescriptor {
            status: Status::Exited,
            name: Status::Exited.name(),
            on_enter: Some(align_to),
            on_change: exited_change,
            on_tick: None,
            settle: Some(exited_settle),
        },
        StateDescriptor {
            status: Status::Occupied,
            name: Status::Occupied.name(),
            on_enter: Some(relays_idle),
            on_change: occupied_change,
            on_tick: None,
            settle: Some(occupied_settle),
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared relay actions
// ═══════════════════════════════════════════════════════════════════════════

fn relays_idle(ctx: &mut LoopContext) {
    ctx.set_relays(RelayPolicy::Idle);
}

fn align_from(ctx: &mut LoopContext) {
    let side = ctx.from();
    ctx.set_relays(RelayPolicy::Align(side));
}

fn align_to(ctx: &mut LoopContext) {
    let side = ctx.to();
    ctx.set_relays(RelayPolicy::Align(side));
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut LoopContext) {
    relays_idle(ctx);
}

fn idle_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    if ctx.is_core_sensor(id) && ctx.core_active() {
        return cold_resolution(ctx);
    }
    entry_readiness(ctx, Some(id))
}

fn idle_settle(ctx: &mut LoopContext) -> Option<Transition> {
    if ctx.core_active() {
        return cold_resolution(ctx);
    }
    entry_readiness(ctx, None)
}

/// Start an approach when exactly one endpoint is ready to feed a train in.
/// With `changed`, only a change that concerns a ready endpoint counts.
fn entry_readiness(ctx: &mut LoopContext, changed: Option<SensorId>) -> Option<Transition> {
    let bus = ctx.bus;
    let ready = Side::BOTH.map(|side| {
        let ep = ctx.endpoint(side);
        ep.is_valid_enter(bus) && ep.is_primed_enter(bus)
    });

    if let Some(id) = changed {
        let newly = Side::BOTH
            .iter()
            .any(|&side| ready[side.index()] && ctx.endpoint(side).has_sensor(id));
        if !newly {
            return None;
        }
    }

    match ready {
        // The far relay is set up before the train gets there.
        [true, false] => Some(Transition::toward(Status::Approach, Side::Right)),
        [false, true] => Some(Transition::toward(Status::Approach, Side::Left)),
        [true, true] => {
            if changed.is_some() {
                info!("loop {}: both endpoints ready, staying idle", ctx.slot);
                ctx.emit(super::Notice::AmbiguousEntry);
            }
            None
        }
        [false, false] => None,
    }
}

/// A train is already in the core and nothing tracked it there.
fn cold_resolution(ctx: &mut LoopContext) -> Option<Transition> {
    if !ctx.core_active() {
        return None;
    }
    let bus = ctx.bus;
    let active = Side::BOTH.map(|side| {
        let ep = ctx.endpoint(side);
        ep.occupied(bus) || ep.sensors_active(bus)
    });
    let side = match active {
        [true, false] => Some(Side::Left),
        [false, true] => Some(Side::Right),
        [true, true] => {
            let primed = Side::BOTH.map(|side| ctx.def.core.is_direction_primed(bus, side));
            match primed {
                [true, false] => Some(Side::Left),
                [false, true] => Some(Side::Right),
                _ => None,
            }
        }
        [false, false] => None,
    };
    Some(match side {
        Some(side) => Transition::toward(Status::Armed, side),
        None => Transition::to(Status::Occupied),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
//  APPROACH / READY_ENTER
// ═══════════════════════════════════════════════════════════════════════════

fn approach_enter(ctx: &mut LoopContext) {
    let from = ctx.from();
    // An inbound trigger can still be crossed by a movement outside the
    // loop; the entry side is energized only once it fired (readyEnter).
    let policy = if ctx.endpoint(from).has_inbound_trigger() {
        RelayPolicy::Align(ctx.to())
    } else {
        RelayPolicy::Align(from)
    };
    ctx.set_relays(policy);
}

fn approach_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    entry_progress(ctx, id).or_else(|| ready_enter_due(ctx))
}

/// Core activity and false starts, shared by approach and readyEnter.
fn entry_progress(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let from = ctx.from_ep();
    if ctx.is_core_sensor(id) && ctx.core_active() {
        let next = if from.occupied(ctx.bus) {
            Status::Entering
        } else {
            Status::Moving
        };
        return Some(Transition::to(next));
    }
    if from.changed_occupied(ctx.bus, id, false) {
        let next = if ctx.core_active() {
            Status::Moving
        } else {
            Status::Idle
        };
        return Some(Transition::to(next));
    }
    None
}

fn ready_enter_due(ctx: &mut LoopContext) -> Option<Transition> {
    let from = ctx.from();
    let ep = ctx.endpoint(from);
    let trigger_seen = ep.sensor_in.active(ctx.bus) || ctx.state.marks[from.index()].is_some();
    let due = ep.has_inbound_trigger()
        && ctx.now_ms > ctx.state.since_ms
        && ep.is_valid_enter(ctx.bus)
        && trigger_seen
        && !ctx.core_active();
    due.then_some(Transition::to(Status::ReadyEnter))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ENTERING
// ═══════════════════════════════════════════════════════════════════════════

fn entering_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let from = ctx.from_ep();
    let core = ctx.core_active();
    if core && from.has_sensor(id) && !from.occupied(ctx.bus) {
        return Some(Transition::to(Status::Moving));
    }
    if !core && ctx.is_core_sensor(id) && from.occupied(ctx.bus) {
        // Backed out the way it came.
        return Some(Transition::reversed(Status::Exited));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  MOVING
// ═══════════════════════════════════════════════════════════════════════════

fn moving_enter(ctx: &mut LoopContext) {
    match ctx.previous {
        // Reversal: the new entry side is the one already aligned.
        Status::Exiting => {}
        // Revert: only the entry side's triggers can still be trusted.
        Status::Armed => {
            if !ctx.to_ep().has_trigger_sensors() && ctx.from_ep().has_trigger_sensors() {
                align_from(ctx);
            }
        }
        _ => align_from(ctx),
    }
}

fn moving_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let core = ctx.core_active();
    if ctx.is_core_sensor(id) {
        if !core {
            let next = core_abandoned(ctx);
            if next.is_none() {
                ctx.state.timeout = Some(ctx.now_ms);
            }
            return next;
        }
        ctx.state.timeout = None;
    }
    if ctx.state.timeout.is_some() {
        return core_abandoned(ctx);
    }

    if ctx.to_ep().has_sensor(id) {
        if let Some(next) = maybe_arm(ctx) {
            return Some(next);
        }
    }

    let from = ctx.from_ep();
    if core && from.has_sensor(id) && from.occupied(ctx.bus) {
        // Reversing before reaching the far side.
        return Some(Transition::reversed(Status::Armed));
    }
    None
}

fn moving_tick(ctx: &mut LoopContext) -> Option<Transition> {
    if let Some(since) = ctx.state.timeout {
        if ctx.now_ms.saturating_sub(since) >= u64::from(ctx.abandon_timeout_ms) {
            info!("loop {}: core abandoned, assuming exit left", ctx.slot);
            return Some(Transition::toward(Status::Exited, Side::Left));
        }
        return None;
    }
    maybe_arm(ctx)
}

/// The core emptied; the train is wherever an endpoint says it is.
fn core_abandoned(ctx: &mut LoopContext) -> Option<Transition> {
    if ctx.from_ep().occupied(ctx.bus) {
        Some(Transition::reversed(Status::Exited))
    } else if ctx.to_ep().occupied(ctx.bus) {
        Some(Transition::to(Status::Exited))
    } else {
        None
    }
}

/// Switch the destination relay once the far side can take the train.
/// When only the entry side has boundary triggers, its tail must have
/// cleared them for the settle timeout first.
fn maybe_arm(ctx: &mut LoopContext) -> Option<Transition> {
    if !ctx.core_active() || !ctx.to_ep().is_primed_exit(ctx.bus) {
        return None;
    }
    let (from, to) = (ctx.from_ep(), ctx.to_ep());
    if from.has_trigger_sensors() && !to.has_trigger_sensors() && !ctx.boundary_quiet(ctx.from()) {
        return None;
    }
    Some(Transition::to(Status::Armed))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ARMED
// ═══════════════════════════════════════════════════════════════════════════

fn armed_settle(ctx: &mut LoopContext) -> Option<Transition> {
    ctx.to_ep()
        .occupied(ctx.bus)
        .then_some(Transition::to(Status::Exiting))
}

fn armed_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let to = ctx.to_ep();
    if to.has_sensor(id) {
        if to.changed_occupied(ctx.bus, id, true) {
            return Some(Transition::to(Status::Exiting));
        }
        if !to.is_valid_exit(ctx.bus) {
            return Some(Transition::to(Status::Moving));
        }
    }

    let from = ctx.from_ep();
    if ctx.core_active() && from.has_sensor(id) && from.occupied(ctx.bus) {
        // Best effort: the old entry may lack triggers to confirm this.
        return Some(Transition::reversed(Status::Armed));
    }
    None
}

/// The outbound trigger that primed the exit went quiet without the train.
fn armed_tick(ctx: &mut LoopContext) -> Option<Transition> {
    let to = ctx.to();
    let ep = ctx.endpoint(to);
    let timed_out = ep.sensor_out.is_present() && ctx.boundary_quiet(to) && !ep.occupied(ctx.bus);
    timed_out.then_some(Transition::to(Status::Moving))
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXITING
// ═══════════════════════════════════════════════════════════════════════════

fn exiting_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let to = ctx.to_ep();
    let core = ctx.core_active();
    if core && to.changed_occupied(ctx.bus, id, false) {
        return Some(Transition::reversed(Status::Moving));
    }
    if !ctx.is_core_sensor(id) {
        return None;
    }

    if !core {
        if ctx.boundary_quiet(ctx.to()) {
            return Some(Transition::to(Status::Exited));
        }
        // Core clear, tail still on the exit trigger.
        ctx.state.timeout = Some(ctx.now_ms);
        return None;
    }
    if ctx.state.timeout.take().is_some() {
        let next = if to.occupied(ctx.bus) {
            Status::Entering
        } else {
            Status::Moving
        };
        return Some(Transition::reversed(next));
    }
    None
}

fn exiting_tick(ctx: &mut LoopContext) -> Option<Transition> {
    let done = !ctx.core_active() && ctx.boundary_quiet(ctx.to());
    done.then_some(Transition::to(Status::Exited))
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXITED
// ═══════════════════════════════════════════════════════════════════════════

/// Reached with nothing left on the tracks: the train is already gone.
fn exited_settle(ctx: &mut LoopContext) -> Option<Transition> {
    (ctx.def.occupied_track_sensors(ctx.bus) == 0).then_some(Transition::to(Status::Idle))
}

fn exited_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    let core = ctx.core_active();
    if core && ctx.is_core_sensor(id) {
        return Some(Transition::reversed(Status::Entering));
    }
    let to = ctx.to_ep();
    if to.changed_occupied(ctx.bus, id, false) {
        return Some(Transition::to(Status::Idle));
    }
    if !core && to.sensor_in.is(id) && to.sensor_in.active(ctx.bus) && to.is_valid_enter(ctx.bus) {
        return Some(Transition::reversed(Status::Approach));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  OCCUPIED
// ═══════════════════════════════════════════════════════════════════════════

fn occupied_change(ctx: &mut LoopContext, id: SensorId) -> Option<Transition> {
    occupied_resolution(ctx, Some(id))
}

fn occupied_settle(ctx: &mut LoopContext) -> Option<Transition> {
    occupied_resolution(ctx, None)
}

fn occupied_resolution(ctx: &mut LoopContext, changed: Option<SensorId>) -> Option<Transition> {
    let bus = ctx.bus;
    if ctx.def.occupied_track_sensors(bus) == 0 {
        return Some(Transition::to(Status::Idle));
    }
    let occupied = Side::BOTH.map(|side| ctx.endpoint(side).occupied(bus));

    if !ctx.core_active() {
        return match occupied {
            [true, false] => Some(Transition::toward(Status::Exited, Side::Left)),
            [false, true] => Some(Transition::toward(Status::Exited, Side::Right)),
            _ => None,
        };
    }

    let id = changed?;
    Side::BOTH
        .into_iter()
        .find(|&side| {
            ctx.endpoint(side).changed_occupied(bus, id, false)
                && !occupied[side.opposite().index()]
        })
        .map(|vacated| Transition::toward(Status::Moving, vacated.opposite()))
}
