//! The UDP data handler (spec §4.3): a simplified variant of the TCP handler for single,
//! unreassembled datagrams -- detect once, then parse on every subsequent packet.

use crate::deps::{AppLayerDeps, DetectOutcome, ParseOutcome};
use crate::error::AppLayerError;
use crate::flow::{Flow, FlowFlags};
use crate::pdu::{Direction, PduFlags};
use crate::thread_ctx::ThreadContext;

/// Feeds one UDP datagram's payload through detection (at most once per flow) and parsing.
///
/// Unlike [`crate::dispatch::tcp::handle_tcp`], this entry point is the one place in the crate
/// that is expected to hold the flow's lock itself -- the caller passes in the direction derived
/// from the packet's own flow-flags rather than holding a lock across the call (spec §5).
pub fn handle_udp<D: AppLayerDeps>(
    deps: &D,
    ctx: &mut ThreadContext<D>,
    flow: &mut Flow,
    data: &[u8],
    flags: PduFlags,
) -> Result<(), AppLayerError> {
    if flow.no_applayer_inspection() {
        return Ok(());
    }
    let dir = flags
        .direction()
        .expect("caller must supply a packet with a direction bit set");

    if flow.alproto.is_unknown() && !flow.flags.contains(FlowFlags::AlprotoDetectDone) {
        tsc_start!(t0);
        let outcome = deps.detect(&mut ctx.detector, dir, data);
        tsc_record!(ctx.timers, "detect", t0);
        flow.flags |= FlowFlags::AlprotoDetectDone;
        match outcome {
            DetectOutcome::Detected(proto) => {
                flow.alproto = proto;
                flow.set_tentative(dir, proto);
                tsc_start!(t1);
                let parsed = deps.parse(&mut ctx.parser, proto, dir, data);
                tsc_record!(ctx.timers, "parse", t1);
                record_parse_outcome(flow, parsed)
            }
            DetectOutcome::Failed => Ok(()),
        }
    } else if !flow.alproto.is_unknown() {
        tsc_start!(t0);
        let parsed = deps.parse(&mut ctx.parser, flow.alproto, dir, data);
        tsc_record!(ctx.timers, "parse", t0);
        record_parse_outcome(flow, parsed)
    } else {
        Ok(())
    }
}

fn record_parse_outcome(flow: &mut Flow, outcome: ParseOutcome) -> Result<(), AppLayerError> {
    match outcome {
        ParseOutcome::Progress => Ok(()),
        ParseOutcome::Fatal => {
            flow.set_no_applayer_inspection();
            Err(AppLayerError::fatal("parser reported a fatal error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{FirstDataDir, L4Protocol};

    struct FixedDeps(DetectOutcome);

    impl AppLayerDeps for FixedDeps {
        type DetectorCtx = ();
        type ParserCtx = u32;
        type ReassemblyCtx = ();

        fn detect(&self, _: &mut (), _: Direction, _: &[u8]) -> DetectOutcome {
            self.0
        }

        fn parse(
            &self,
            ctx: &mut u32,
            _: crate::flow::AppProto,
            _: Direction,
            _: &[u8],
        ) -> ParseOutcome {
            *ctx += 1;
            ParseOutcome::Progress
        }

        fn first_data_dir(&self, _: crate::flow::AppProto) -> FirstDataDir {
            FirstDataDir::Any
        }

        fn reassemble_applayer(&self, _: &mut (), _: Direction, _: &[u8]) -> anyhow::Result<()> {
            Ok(())
        }

        fn reassemble_inline_applayer(
            &self,
            _: &mut (),
            _: Direction,
            _: &[u8],
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn proto_by_name(&self, _: &str) -> Option<crate::flow::AppProto> {
            None
        }

        fn proto_name(&self, _: crate::flow::AppProto) -> Option<&str> {
            None
        }
    }

    #[test]
    fn detects_once_then_parses_on_every_datagram() {
        let deps = FixedDeps(DetectOutcome::Detected(crate::flow::AppProto(3)));
        let mut ctx = ThreadContext {
            detector: (),
            parser: 0u32,
            reassembly: (),
            #[cfg(feature = "timing")]
            timers: crate::timing::timer::Timers::new(),
        };
        let mut flow = Flow::new(L4Protocol::Udp);
        let flags = PduFlags::for_direction(Direction::ToServer, false, false);

        handle_udp(&deps, &mut ctx, &mut flow, b"first", flags).unwrap();
        assert_eq!(flow.alproto, crate::flow::AppProto(3));
        assert_eq!(ctx.parser, 1);
        assert!(flow.flags.contains(FlowFlags::AlprotoDetectDone));

        handle_udp(&deps, &mut ctx, &mut flow, b"second", flags).unwrap();
        assert_eq!(ctx.parser, 2);
    }

    #[test]
    fn failed_detection_latches_and_never_retries() {
        let deps = FixedDeps(DetectOutcome::Failed);
        let mut ctx = ThreadContext {
            detector: (),
            parser: 0u32,
            reassembly: (),
            #[cfg(feature = "timing")]
            timers: crate::timing::timer::Timers::new(),
        };
        let mut flow = Flow::new(L4Protocol::Udp);
        let flags = PduFlags::for_direction(Direction::ToServer, false, false);

        handle_udp(&deps, &mut ctx, &mut flow, b"first", flags).unwrap();
        assert!(flow.alproto.is_unknown());
        assert!(flow.flags.contains(FlowFlags::AlprotoDetectDone));
        assert_eq!(ctx.parser, 0);

        handle_udp(&deps, &mut ctx, &mut flow, b"second", flags).unwrap();
        assert_eq!(ctx.parser, 0, "detection must not be retried once latched");
    }
}
