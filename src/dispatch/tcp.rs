//! The TCP data handler (spec §4.2): the main state-driven procedure invoked by the reassembler
//! with a chunk of in-order bytes for one direction of a flow.
//!
//! Structured as one function per lettered sub-step of the decision tree, named after the
//! sub-step's purpose rather than its letter, so the control flow reads as a sequence of named
//! policies rather than a wall of nested `if`s.

use crate::deps::{AppLayerDeps, DetectOutcome};
use crate::direction_override::DirectionOverride;
use crate::error::AppLayerError;
use crate::events::EventKind;
use crate::flow::{AppProto, DataFirstSeenDir, Flow};
use crate::pdu::{Direction, FirstDataDir, PduFlags};
use crate::session::TcpSession;
use crate::thread_ctx::ThreadContext;

/// Feeds a chunk of reassembled, in-order bytes for `dir` through detection and/or parsing.
///
/// The flow is assumed already locked by the caller; this crate never locks it itself (§5).
/// `flags` carries the subset of `Start`/`Gap` relevant to this chunk; the `ToServer`/`ToClient`
/// bit is expected to agree with `dir`.
pub fn handle_tcp<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    flow: &mut Flow,
    session: &mut TcpSession,
    dir: Direction,
    data: &[u8],
    mut flags: PduFlags,
) -> Result<(), AppLayerError> {
    // Step 1: inspection disabled is a sticky, unconditional short-circuit (invariant I1/I5).
    if flow.no_applayer_inspection() {
        return Ok(());
    }

    let dir_alproto = flow.tentative(dir);

    // Step 2: a gap on the very first bytes of an unknown-protocol stream makes detection
    // impossible -- there is no clean prefix to match against.
    if dir_alproto.is_unknown() && flags.contains(PduFlags::Gap) {
        session.stream_mut(dir).set_detection_completed();
        session.set_no_reassembly(dir);
        return Ok(());
    }

    if dir_alproto.is_unknown() && flags.contains(PduFlags::Start) {
        if !data.is_empty() {
            session.data_first_seen_dir.observe(dir);
        }
        let already = if data.is_empty() {
            0
        } else {
            flow.data_al_so_far(dir)
        };

        tsc_start!(t0);
        let outcome = deps.detect(&mut ctx.detector, dir, data);
        tsc_record!(ctx.timers, "detect", t0);
        match outcome {
            DetectOutcome::Detected(proto) => handle_detect_succeeded(
                deps, ctx, flow, session, dir, &mut flags, proto, already, data,
            ),
            DetectOutcome::Failed => {
                flow.flags.set_pm_done(dir);
                flow.flags.set_pp_done(dir);
                handle_detect_failed(deps, ctx, flow, session, dir, data)
            }
        }
    } else {
        // Step 4: bytes after commit, fed straight to the already-known protocol's parser.
        feed_committed(deps, ctx, flow, dir, data)
    }
}

/// Detection succeeded on `dir`: runs sub-steps (a)-(f) of spec §4.2 step 3.
#[allow(clippy::too_many_arguments)]
fn handle_detect_succeeded<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    flow: &mut Flow,
    session: &mut TcpSession,
    dir: Direction,
    flags: &mut PduFlags,
    detected: AppProto,
    already: u32,
    data: &[u8],
) -> Result<(), AppLayerError> {
    let data_first_seen_dir_before = session.data_first_seen_dir;

    // (a) Conflict reconciliation.
    let alproto = reconcile_conflict(flow, data_first_seen_dir_before, dir, detected);

    // (b) Commit.
    flow.alproto = alproto;
    flow.set_tentative(dir, alproto);
    session.stream_mut(dir).set_detection_completed();

    // (c) Force-drain the opposite direction if it was seen first and not yet forwarded.
    let force_drained =
        match force_drain_opposite(deps, ctx, session, flags, dir, data_first_seen_dir_before) {
            Ok(drained) => drained,
            Err(_) => {
                flow.set_no_applayer_inspection();
                session.stream_mut(dir).set_detection_completed();
                session.stream_mut(dir.opposite()).set_detection_completed();
                return Err(AppLayerError::fatal(
                    "force-drain of opposing direction failed",
                ));
            }
        };

    // (d)/(e) Directionality policy, split into "truly wrong" (fatal) vs "premature" (rollback).
    check_direction_policy(deps, flow, session, dir, alproto, force_drained)?;

    // (f) Hand the remaining bytes to the parser and clear the carryover counter.
    session.data_first_seen_dir.commit();
    let start = already as usize;
    if start < data.len() {
        tsc_start!(t0);
        let outcome = deps.parse(&mut ctx.parser, alproto, dir, &data[start..]);
        tsc_record!(ctx.timers, "parse", t0);
        record_parse_outcome(flow, outcome)?;
    }
    flow.set_data_al_so_far(dir, 0);
    Ok(())
}

/// Converts a parser's fatal outcome into the sticky give-up state (invariant I1/I5).
fn record_parse_outcome(
    flow: &mut Flow,
    outcome: crate::deps::ParseOutcome,
) -> Result<(), AppLayerError> {
    match outcome {
        crate::deps::ParseOutcome::Progress => Ok(()),
        crate::deps::ParseOutcome::Fatal => {
            flow.set_no_applayer_inspection();
            Err(AppLayerError::fatal("parser reported a fatal error"))
        }
    }
}

/// (a) Reconciles a same-call protocol conflict between the two directions' tentative ids.
///
/// The resolution is asymmetric by direction when no prior decision has been committed -- this
/// mirrors the base specification's own wording verbatim rather than smoothing it into a
/// symmetric rule; see `DESIGN.md` for why this is kept as-is instead of "fixed".
fn reconcile_conflict(
    flow: &mut Flow,
    data_first_seen_dir: DataFirstSeenDir,
    dir: Direction,
    detected: AppProto,
) -> AppProto {
    let other = flow.tentative(dir.opposite());
    if other.is_unknown() || other == detected {
        return detected;
    }

    flow.events.raise(EventKind::MismatchProtocolBothDirections);

    if data_first_seen_dir.is_committed() {
        flow.set_tentative(dir, other);
        other
    } else {
        match dir {
            Direction::ToClient => {
                flow.set_tentative(dir.opposite(), detected);
                detected
            }
            Direction::ToServer => {
                flow.set_tentative(dir, other);
                other
            }
        }
    }
}

/// (c) Drains any stream messages already queued for the opposite direction through the app
/// layer before this direction's own bytes are parsed, so the protocol sees a causally ordered
/// view of both sides. Returns whether a drain was actually attempted.
///
/// Flips `flags`' direction bits to the opposite direction for the duration of the drain via a
/// scope guard that restores the original bits on every exit path, including the `?` below.
fn force_drain_opposite<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    session: &mut TcpSession,
    flags: &mut PduFlags,
    dir: Direction,
    data_first_seen_dir_before: DataFirstSeenDir,
) -> anyhow::Result<bool> {
    if data_first_seen_dir_before != DataFirstSeenDir::One(dir.opposite()) {
        return Ok(false);
    }
    let opposite = dir.opposite();
    let _guard = DirectionOverride::apply(flags, opposite);
    while let Some(msg) = session.pop_smsg(opposite) {
        deps.reassemble_inline_applayer(&mut ctx.reassembly, opposite, &msg.data)?;
    }
    Ok(true)
}

/// (d)/(e) Enforces a parser's preferred first-data direction.
///
/// [`FirstDataDir::Any`] has nothing to enforce. A specific-direction preference
/// ([`FirstDataDir::ToServer`]/[`FirstDataDir::ToClient`]) that doesn't match `dir` (and wasn't
/// just satisfied by the force-drain) is a final, unrecoverable fact: that direction's bytes
/// will never retroactively appear first, so this is fatal (d). [`FirstDataDir::Both`] is a
/// different requirement -- the parser needs bytes from both sides before it may start -- so if
/// the opposite side hasn't produced anything yet, the commit was merely premature and gets a
/// soft rollback instead (e); if the opposite side is already known, both sides are in fact
/// accounted for and there is nothing to do.
fn check_direction_policy<D: AppLayerDeps>(
    deps: &D,
    flow: &mut Flow,
    session: &mut TcpSession,
    dir: Direction,
    alproto: AppProto,
    force_drained: bool,
) -> Result<(), AppLayerError> {
    match deps.first_data_dir(alproto) {
        FirstDataDir::Any => Ok(()),
        FirstDataDir::Both => {
            if force_drained || !flow.tentative(dir.opposite()).is_unknown() {
                return Ok(());
            }
            rollback_premature_detection(flow, session, dir);
            Err(AppLayerError::rollback(
                "protocol requires bytes observed on both directions before it may commit",
            ))
        }
        specific => {
            let required = specific
                .required()
                .expect("Any/Both are handled by the arms above");
            if required == dir || force_drained {
                return Ok(());
            }
            flow.events.raise(EventKind::WrongDirectionFirstData);
            flow.set_no_applayer_inspection();
            session.stream_mut(dir).set_detection_completed();
            session.stream_mut(dir.opposite()).set_detection_completed();
            session.data_first_seen_dir.commit();
            Err(AppLayerError::fatal_with_event(
                "bytes first seen in the direction the parser rejects",
                EventKind::WrongDirectionFirstData,
            ))
        }
    }
}

/// (e) Reverts a premature commitment so the caller can retry once both directions have
/// produced bytes.
fn rollback_premature_detection(flow: &mut Flow, session: &mut TcpSession, dir: Direction) {
    debug_assert!(
        flow.tentative(dir.opposite()).is_unknown(),
        "rollback expects the opposite direction to still be undecided"
    );
    flow.cleanup_applayer();
    session.stream_mut(dir).reset_detection_completed();
    flow.flags.reset_pm_done(dir);
    flow.flags.reset_pp_done(dir);
}

/// Detection failed on `dir`: either inherit the opposite direction's already-committed
/// protocol, or -- if neither direction has one and every chance is exhausted -- give up.
fn handle_detect_failed<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    flow: &mut Flow,
    session: &mut TcpSession,
    dir: Direction,
    data: &[u8],
) -> Result<(), AppLayerError> {
    let other_alproto = flow.tentative(dir.opposite());

    if !other_alproto.is_unknown() {
        if let Some(required) = deps.first_data_dir(other_alproto).required() {
            if required != dir {
                flow.set_no_applayer_inspection();
                return Err(AppLayerError::fatal(
                    "detection failed and the inherited protocol rejects this direction",
                ));
            }
        }
        if !data.is_empty() {
            session.data_first_seen_dir.commit();
            tsc_start!(t0);
            let outcome = deps.parse(&mut ctx.parser, other_alproto, dir, data);
            tsc_record!(ctx.timers, "parse", t0);
            record_parse_outcome(flow, outcome)?;
        }

        if flow.flags.detect_exhausted(dir) {
            flow.events.raise(EventKind::DetectProtocolOnlyOneDirection);
            session.stream_mut(dir).set_detection_completed();
            flow.set_data_al_so_far(dir, 0);
        } else {
            flow.set_data_al_so_far(dir, data.len() as u32);
        }
        return Ok(());
    }

    if flow.tentative(dir).is_unknown() && flow.flags.detect_exhausted_both() {
        flow.set_no_applayer_inspection();
        session.client.set_detection_completed();
        session.server.set_detection_completed();
        session.data_first_seen_dir.commit();
    }
    Ok(())
}

/// Step 4: feeds bytes for a flow whose protocol is already committed.
fn feed_committed<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    flow: &mut Flow,
    dir: Direction,
    data: &[u8],
) -> Result<(), AppLayerError> {
    if flow.alproto.is_unknown() {
        log::debug!(
            "dropping {} bytes on {:?}: flow has no committed protocol",
            data.len(),
            dir
        );
        return Ok(());
    }
    tsc_start!(t0);
    let outcome = deps.parse(&mut ctx.parser, flow.alproto, dir, data);
    tsc_record!(ctx.timers, "parse", t0);
    record_parse_outcome(flow, outcome)
}
