//! The per-connection record this core reads and mutates.
//!
//! `Flow` is owned by the flow table (an external collaborator, out of scope here, just as
//! `retina-core`'s `Conn<T>` is owned by its `ConnTracker<T>`). This module defines the record
//! itself and the invariants it must uphold; it does not implement the table.

use crate::events::EventLog;
use crate::pdu::{Direction, L4Protocol};

use bitmask_enum::bitmask;
use std::fmt;

/// Compact integer identifying an L7 protocol. `UNKNOWN` is the sentinel zero (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppProto(pub u16);

impl AppProto {
    /// No protocol has been identified yet.
    pub const UNKNOWN: AppProto = AppProto(0);

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == AppProto::UNKNOWN
    }
}

impl fmt::Display for AppProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flow-level sticky bits (spec §3). Per-direction latches are split into explicit `_TS`/`_TC`
/// variants rather than an indexed array, since a bitmask-enum cannot be indexed generically --
/// [`FlowFlags::pm_done`] and friends hide the direction dispatch behind a normal method.
#[bitmask(u16)]
pub enum FlowFlags {
    /// Give-up sticky bit: once set, all further bytes bypass detection and parsing (invariant
    /// I1/I5 of spec §3/§8).
    NoApplayerInspection,
    /// UDP-only: detection has already been attempted once for this flow.
    AlprotoDetectDone,
    /// Pattern-matcher family exhausted on to-server.
    PmDoneTs,
    /// Pattern-matcher family exhausted on to-client.
    PmDoneTc,
    /// Probe-parser family exhausted on to-server.
    PpDoneTs,
    /// Probe-parser family exhausted on to-client.
    PpDoneTc,
}

impl FlowFlags {
    fn pm_mask(dir: Direction) -> FlowFlags {
        match dir {
            Direction::ToServer => FlowFlags::PmDoneTs,
            Direction::ToClient => FlowFlags::PmDoneTc,
        }
    }

    fn pp_mask(dir: Direction) -> FlowFlags {
        match dir {
            Direction::ToServer => FlowFlags::PpDoneTs,
            Direction::ToClient => FlowFlags::PpDoneTc,
        }
    }

    pub fn pm_done(&self, dir: Direction) -> bool {
        self.contains(Self::pm_mask(dir))
    }

    pub fn pp_done(&self, dir: Direction) -> bool {
        self.contains(Self::pp_mask(dir))
    }

    pub fn set_pm_done(&mut self, dir: Direction) {
        *self |= Self::pm_mask(dir);
    }

    pub fn set_pp_done(&mut self, dir: Direction) {
        *self |= Self::pp_mask(dir);
    }

    pub fn reset_pm_done(&mut self, dir: Direction) {
        *self &= Self::pm_mask(dir).not();
    }

    pub fn reset_pp_done(&mut self, dir: Direction) {
        *self &= Self::pp_mask(dir).not();
    }

    /// Both latches are set for `dir`: detection has exhausted every chance on that direction.
    pub fn detect_exhausted(&self, dir: Direction) -> bool {
        self.pm_done(dir) && self.pp_done(dir)
    }

    /// All four latches are set: detection has exhausted every chance on both directions.
    pub fn detect_exhausted_both(&self) -> bool {
        self.detect_exhausted(Direction::ToServer) && self.detect_exhausted(Direction::ToClient)
    }
}

/// Which side(s) have produced payload bytes so far, and whether that fact has already been
/// acted upon (spec §3 invariant 4, Design Notes §9: a tagged variant rather than an overloaded
/// sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFirstSeenDir {
    /// No payload bytes observed on either direction yet.
    None,
    /// Bytes observed on exactly one direction so far.
    One(Direction),
    /// Bytes observed on both directions, but no decision has been committed on their order yet.
    Both,
    /// A protocol decision has been committed and bytes have already been handed to a parser;
    /// this is the sentinel the base spec calls `ALREADY_SENT_TO_APP_LAYER`.
    Committed,
}

impl Default for DataFirstSeenDir {
    fn default() -> Self {
        DataFirstSeenDir::None
    }
}

impl DataFirstSeenDir {
    /// Records that bytes were observed in `dir`, enforcing the monotonic transition of spec
    /// invariant 4. A no-op once `Committed`.
    pub fn observe(&mut self, dir: Direction) {
        *self = match *self {
            DataFirstSeenDir::None => DataFirstSeenDir::One(dir),
            DataFirstSeenDir::One(seen) if seen == dir => DataFirstSeenDir::One(seen),
            DataFirstSeenDir::One(_) => DataFirstSeenDir::Both,
            DataFirstSeenDir::Both => DataFirstSeenDir::Both,
            DataFirstSeenDir::Committed => DataFirstSeenDir::Committed,
        };
    }

    /// Marks the flow as having committed a protocol decision and handed bytes to a parser.
    pub fn commit(&mut self) {
        *self = DataFirstSeenDir::Committed;
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, DataFirstSeenDir::Committed)
    }
}

/// The per-connection record. See spec §3 for the field-level contract.
#[derive(Debug)]
pub struct Flow {
    pub proto: L4Protocol,
    pub alproto: AppProto,
    pub alproto_ts: AppProto,
    pub alproto_tc: AppProto,
    pub flags: FlowFlags,
    /// Bytes already buffered for the parser but not yet committed, per direction (spec
    /// invariant 3). Indexed via [`Direction::index`].
    data_al_so_far: [u32; 2],
    pub events: EventLog,
}

impl Flow {
    pub fn new(proto: L4Protocol) -> Self {
        Flow {
            proto,
            alproto: AppProto::UNKNOWN,
            alproto_ts: AppProto::UNKNOWN,
            alproto_tc: AppProto::UNKNOWN,
            flags: FlowFlags::none(),
            data_al_so_far: [0, 0],
            events: EventLog::new(),
        }
    }

    /// Returns the tentative protocol id already observed on `dir`.
    pub fn tentative(&self, dir: Direction) -> AppProto {
        match dir {
            Direction::ToServer => self.alproto_ts,
            Direction::ToClient => self.alproto_tc,
        }
    }

    pub fn set_tentative(&mut self, dir: Direction, proto: AppProto) {
        match dir {
            Direction::ToServer => self.alproto_ts = proto,
            Direction::ToClient => self.alproto_tc = proto,
        }
    }

    pub fn data_al_so_far(&self, dir: Direction) -> u32 {
        self.data_al_so_far[dir.index()]
    }

    pub fn set_data_al_so_far(&mut self, dir: Direction, n: u32) {
        self.data_al_so_far[dir.index()] = n;
    }

    /// Sets the sticky give-up bit (spec invariant 5). Monotonic: never cleared by this core.
    pub fn set_no_applayer_inspection(&mut self) {
        self.flags |= FlowFlags::NoApplayerInspection;
    }

    pub fn no_applayer_inspection(&self) -> bool {
        self.flags.contains(FlowFlags::NoApplayerInspection)
    }

    /// Reverts the flow's app-layer decision to UNKNOWN on both the committed and tentative
    /// fields. Used only by the soft-rollback path (spec §4.2e).
    pub fn cleanup_applayer(&mut self) {
        self.alproto = AppProto::UNKNOWN;
        self.alproto_ts = AppProto::UNKNOWN;
        self.alproto_tc = AppProto::UNKNOWN;
    }
}
