//! Per-worker-thread lifetime for a set of [`AppLayerDeps`] collaborators.
//!
//! Mirrors `retina-core`'s pattern of building up a thread's collaborator set piece by piece and
//! unwinding cleanly -- and loudly -- if any piece fails, rather than leaving a half-built thread
//! running with some collaborators missing.

use crate::deps::AppLayerDeps;

#[cfg(feature = "timing")]
use crate::timing::timer::Timers;

/// Owns the three opaque per-thread contexts a [`AppLayerDeps`] implementor needs: one for
/// detection, one for parsing, one for reassembly.
///
/// Under the `timing` feature, also owns the cycle timers the dispatch entry points record
/// into (spec §2 component 6, Design Notes §9: zero-cost when disabled via a cfg-gated field
/// rather than a runtime check).
pub struct ThreadContext<D: AppLayerDeps> {
    pub detector: D::DetectorCtx,
    pub parser: D::ParserCtx,
    pub reassembly: D::ReassemblyCtx,
    #[cfg(feature = "timing")]
    pub(crate) timers: Timers,
}

impl<D: AppLayerDeps> ThreadContext<D> {
    /// Builds the three per-thread contexts in order, logging and returning `None` at the first
    /// failure rather than panicking -- a worker thread that cannot get a full set of contexts
    /// should not start processing packets at all.
    pub fn create(
        make_detector: impl FnOnce() -> Option<D::DetectorCtx>,
        make_parser: impl FnOnce() -> Option<D::ParserCtx>,
        make_reassembly: impl FnOnce() -> Option<D::ReassemblyCtx>,
    ) -> Option<Self> {
        let detector = match make_detector() {
            Some(ctx) => ctx,
            None => {
                log::error!("thread context creation failed: detector");
                return None;
            }
        };
        let parser = match make_parser() {
            Some(ctx) => ctx,
            None => {
                log::error!("thread context creation failed: parser");
                return None;
            }
        };
        let reassembly = match make_reassembly() {
            Some(ctx) => ctx,
            None => {
                log::error!("thread context creation failed: reassembly");
                return None;
            }
        };
        Some(ThreadContext {
            detector,
            parser,
            reassembly,
            #[cfg(feature = "timing")]
            timers: Timers::new(),
        })
    }

    /// Explicit teardown hook. `ThreadContext`'s fields drop normally, but implementors with
    /// external resources (file handles, registered counters) can observe an explicit
    /// destroy point rather than relying on drop order.
    ///
    /// Under `timing`, prints and dumps the accumulated detect/parse cycle stats before the
    /// timers themselves are dropped -- the one place this core deviates from "never print",
    /// matching `retina-core`'s own shutdown-time `display_stats`/`dump_stats` pairing.
    pub fn destroy(self) {
        #[cfg(feature = "timing")]
        {
            self.timers.display_stats();
            self.timers.dump_stats();
        }
        log::debug!("tearing down thread context");
    }
}
