//! The single collaborator seam this core calls out through.
//!
//! Everything the dispatch core cannot decide on its own -- does this byte run look like a known
//! protocol, does the parser want more bytes, which direction does this protocol's parser expect
//! first, how should already-queued bytes be reassembled -- is bundled into one
//! [`AppLayerDeps`] trait, the same way `retina-core`'s `Subscription<'a, S>` bundles
//! `packet_filter`/`conn_filter`/`session_filter`/`callback` into one object a tracker holds
//! rather than threading four separate closures through its call sites.

use crate::flow::AppProto;
use crate::pdu::{Direction, FirstDataDir};

use anyhow::Result;

/// Outcome of a single detection attempt on a byte run (spec §4.2/§4.3).
///
/// Detection runs at most once per half-stream (invariant I2), so there is no "try again with
/// more bytes" outcome here: a direction either matches a protocol or it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectOutcome {
    /// A protocol was positively identified.
    Detected(AppProto),
    /// Every registered detector rejected this byte run; this direction will never match
    /// (the original's transient `FAILED` outcome, distinct from `AppProto::UNKNOWN`).
    Failed,
}

/// Outcome of feeding bytes to a committed protocol's parser (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The parser consumed the bytes and wants more.
    Progress,
    /// The parser hit a fatal, protocol-level error and the flow should stop being inspected.
    Fatal,
}

/// The collaborator seam. An implementor supplies the actual protocol registry, detection
/// engine, parser dispatch table, and reassembler; this core drives them but knows nothing of
/// their internals.
///
/// Associated types let each implementor carry whatever opaque per-call state it needs (a
/// detector scratch buffer, a parser's session object, reassembly ring state) without this core
/// naming a concrete type for any of them.
pub trait AppLayerDeps {
    type DetectorCtx;
    type ParserCtx;
    type ReassemblyCtx;

    /// Runs protocol detection against the buffered bytes for `dir`. Called only while the
    /// direction's `PM_DONE`/`PP_DONE` latches are not both set (spec invariant 2).
    fn detect(&self, ctx: &mut Self::DetectorCtx, dir: Direction, data: &[u8]) -> DetectOutcome;

    /// Feeds bytes to the parser already committed for `proto`.
    fn parse(
        &self,
        ctx: &mut Self::ParserCtx,
        proto: AppProto,
        dir: Direction,
        data: &[u8],
    ) -> ParseOutcome;

    /// The direction(s) `proto`'s parser expects to see its first bytes in (spec §4.2 steps
    /// d/e). Protocols with no preference return [`FirstDataDir::Any`].
    fn first_data_dir(&self, proto: AppProto) -> FirstDataDir;

    /// Reassembles queued bytes for `dir` into the flow's application-layer buffer.
    fn reassemble_applayer(
        &self,
        ctx: &mut Self::ReassemblyCtx,
        dir: Direction,
        data: &[u8],
    ) -> Result<()>;

    /// As [`Self::reassemble_applayer`], but used for the synchronous, in-place delivery path
    /// taken during the forced drain of the opposite direction (spec §4.2 step c).
    fn reassemble_inline_applayer(
        &self,
        ctx: &mut Self::ReassemblyCtx,
        dir: Direction,
        data: &[u8],
    ) -> Result<()>;

    /// Looks up a protocol id by its registered name, for configuration and diagnostics (spec
    /// §4.5). `None` if no such protocol is registered.
    fn proto_by_name(&self, name: &str) -> Option<AppProto>;

    /// The registered name of `proto`, or `None` if it is not a known protocol (spec §4.5).
    fn proto_name(&self, proto: AppProto) -> Option<&str>;
}
