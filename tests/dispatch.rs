//! End-to-end exercise of the decision tree against the scenarios of spec §8, using a small
//! fake `AppLayerDeps` implementation in place of a real detector/parser/reassembler.

use retina_applayer_dispatch::deps::{AppLayerDeps, DetectOutcome, ParseOutcome};
use retina_applayer_dispatch::pdu::{Direction, FirstDataDir, L4Protocol, PduFlags};
use retina_applayer_dispatch::{handle_tcp, handle_udp, AppProto, EventKind, Flow, TcpSession,
    ThreadContext};

use std::cell::RefCell;
use std::collections::HashMap;

const HTTP: AppProto = AppProto(1);
const SMTP: AppProto = AppProto(2);
const DNS: AppProto = AppProto(3);

/// A byte-prefix detector plus a recording parser, configurable per test with each protocol's
/// first-data-dir preference.
struct FakeDeps {
    prefixes: Vec<(&'static [u8], AppProto)>,
    first_data_dir: HashMap<AppProto, FirstDataDir>,
    parsed: RefCell<Vec<(AppProto, Direction, Vec<u8>)>>,
}

impl FakeDeps {
    fn new() -> Self {
        FakeDeps {
            prefixes: Vec::new(),
            first_data_dir: HashMap::new(),
            parsed: RefCell::new(Vec::new()),
        }
    }

    fn with_prefix(mut self, prefix: &'static [u8], proto: AppProto) -> Self {
        self.prefixes.push((prefix, proto));
        self
    }

    fn with_first_data_dir(mut self, proto: AppProto, dir: FirstDataDir) -> Self {
        self.first_data_dir.insert(proto, dir);
        self
    }

    fn parsed(&self) -> Vec<(AppProto, Direction, Vec<u8>)> {
        self.parsed.borrow().clone()
    }
}

impl AppLayerDeps for FakeDeps {
    type DetectorCtx = ();
    type ParserCtx = ();
    type ReassemblyCtx = ();

    fn detect(&self, _ctx: &mut (), _dir: Direction, data: &[u8]) -> DetectOutcome {
        for (prefix, proto) in &self.prefixes {
            if data.starts_with(prefix) {
                return DetectOutcome::Detected(*proto);
            }
        }
        DetectOutcome::Failed
    }

    fn parse(&self, _ctx: &mut (), proto: AppProto, dir: Direction, data: &[u8]) -> ParseOutcome {
        self.parsed.borrow_mut().push((proto, dir, data.to_vec()));
        ParseOutcome::Progress
    }

    fn first_data_dir(&self, proto: AppProto) -> FirstDataDir {
        self.first_data_dir
            .get(&proto)
            .copied()
            .unwrap_or(FirstDataDir::Any)
    }

    fn reassemble_applayer(&self, _ctx: &mut (), _dir: Direction, _data: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }

    fn reassemble_inline_applayer(
        &self,
        _ctx: &mut (),
        _dir: Direction,
        _data: &[u8],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn proto_by_name(&self, _name: &str) -> Option<AppProto> {
        None
    }

    fn proto_name(&self, _proto: AppProto) -> Option<&str> {
        None
    }
}

fn tcp_ctx(deps: &FakeDeps) -> ThreadContext<FakeDeps> {
    let _ = deps;
    ThreadContext::<FakeDeps>::create(|| Some(()), || Some(()), || Some(()))
        .expect("fake collaborators never fail to construct")
}

#[test]
fn scenario_1_toserver_first_http_flow() {
    let deps = FakeDeps::new().with_prefix(b"GET ", HTTP);
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Tcp);
    let mut session = TcpSession::new();

    let bytes = b"GET / HTTP/1.0\r\n\r\n";
    let result = handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToServer,
        bytes,
        PduFlags::for_direction(Direction::ToServer, true, false),
    );

    assert!(result.is_ok());
    assert_eq!(flow.alproto, HTTP);
    assert!(session.client.detection_completed());
    assert_eq!(deps.parsed(), vec![(HTTP, Direction::ToServer, bytes.to_vec())]);
    assert!(flow.events.is_empty());
}

#[test]
fn scenario_2_gap_at_start_on_unknown_protocol() {
    let deps = FakeDeps::new();
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Tcp);
    let mut session = TcpSession::new();

    let result = handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToServer,
        b"",
        PduFlags::for_direction(Direction::ToServer, true, true),
    );

    assert!(result.is_ok());
    assert!(session.client.detection_completed());
    assert!(session.client.no_reassembly());
    assert!(flow.alproto.is_unknown());
    assert!(deps.parsed().is_empty());
}

#[test]
fn scenario_3_wrong_direction_first_data_is_rejected() {
    // HTTP insists on seeing TOSERVER bytes first. A TOCLIENT chunk that nonetheless matches
    // the HTTP prefix must be rejected rather than silently committed.
    let deps = FakeDeps::new()
        .with_prefix(b"HTTP/", HTTP)
        .with_first_data_dir(HTTP, FirstDataDir::ToServer);
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Tcp);
    let mut session = TcpSession::new();

    let result = handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToClient,
        b"HTTP/1.0 200 OK\r\n\r\n",
        PduFlags::for_direction(Direction::ToClient, true, false),
    );

    assert!(result.is_err());
    assert!(flow.no_applayer_inspection());
    assert_eq!(flow.events.events(), &[EventKind::WrongDirectionFirstData]);
    assert!(session.client.detection_completed());
    assert!(session.server.detection_completed());
}

#[test]
fn scenario_4_mismatch_across_directions() {
    let deps = FakeDeps::new()
        .with_prefix(b"GET ", HTTP)
        .with_prefix(b"MAIL ", SMTP);
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Tcp);
    let mut session = TcpSession::new();

    // TOSERVER detects HTTP first.
    handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToServer,
        b"GET / HTTP/1.0\r\n\r\n",
        PduFlags::for_direction(Direction::ToServer, true, false),
    )
    .unwrap();
    assert_eq!(flow.alproto, HTTP);

    // TOCLIENT later detects SMTP (contrived per spec scenario 4): a cross-call mismatch, with
    // TOSERVER's decision already committed and bytes already sent to the app layer.
    let result = handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToClient,
        b"MAIL FROM:<a@b>\r\n",
        PduFlags::for_direction(Direction::ToClient, true, false),
    );

    assert!(flow.events.events().contains(&EventKind::MismatchProtocolBothDirections));
    // The already-committed direction wins: TOSERVER's HTTP decision is not overturned by a
    // later same-call TOCLIENT mismatch once ALREADY_SENT_TO_APP_LAYER has been reached.
    let _ = result;
    assert_eq!(flow.alproto, HTTP);
}

#[test]
fn scenario_5_detect_protocol_only_one_direction() {
    // TOCLIENT detects protocol X, whose parser has no direction preference (so inheriting it
    // on TOSERVER later is not itself a conflict). TOSERVER never matches; once both its
    // PM_DONE/PP_DONE latches are set, expect the only-one-direction event.
    let deps = FakeDeps::new()
        .with_prefix(b"SERVER-BANNER", DNS)
        .with_first_data_dir(DNS, FirstDataDir::Any);
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Tcp);
    let mut session = TcpSession::new();

    handle_tcp(
        &deps,
        &mut ctx,
        &mut flow,
        &mut session,
        Direction::ToClient,
        b"SERVER-BANNER ready\r\n",
        PduFlags::for_direction(Direction::ToClient, true, false),
    )
    .unwrap();
    assert_eq!(flow.alproto, DNS);

    // TOSERVER never matches; simulate detection exhausting its chances over several calls.
    for _ in 0..1 {
        flow.flags.set_pm_done(Direction::ToServer);
        flow.flags.set_pp_done(Direction::ToServer);
        handle_tcp(
            &deps,
            &mut ctx,
            &mut flow,
            &mut session,
            Direction::ToServer,
            b"not a match",
            PduFlags::for_direction(Direction::ToServer, true, false),
        )
        .unwrap();
    }

    assert!(flow
        .events
        .events()
        .contains(&EventKind::DetectProtocolOnlyOneDirection));
    assert!(session.client.detection_completed());
}

#[test]
fn scenario_6_udp_dns_detects_once_then_parses_only() {
    let deps = FakeDeps::new().with_prefix(b"\x00\x00query", DNS);
    let mut ctx = tcp_ctx(&deps);
    let mut flow = Flow::new(L4Protocol::Udp);

    let flags = PduFlags::for_direction(Direction::ToServer, false, false);
    handle_udp(&deps, &mut ctx, &mut flow, b"\x00\x00query a.example.com", flags).unwrap();
    assert_eq!(flow.alproto, DNS);
    assert_eq!(deps.parsed().len(), 1);

    // A second datagram on the same flow must not re-run detection.
    handle_udp(&deps, &mut ctx, &mut flow, b"\x00\x00query b.example.com", flags).unwrap();
    assert_eq!(deps.parsed().len(), 2);
    assert_eq!(deps.parsed()[1].0, DNS);
}
