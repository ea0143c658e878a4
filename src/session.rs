//! TCP session state: the two half-streams and the queues feeding the detection engine.

use crate::flow::DataFirstSeenDir;
use crate::pdu::Direction;

use std::collections::VecDeque;

/// One direction of a TCP flow.
#[derive(Debug, Default)]
pub struct HalfStream {
    /// Latched once detection has run to a conclusion (success, failure, or gap-at-start) for
    /// this direction (spec invariant 2).
    detection_completed: bool,
    /// Set when the session has been told to stop reassembling this direction (spec §4.2 step 2).
    no_reassembly: bool,
}

impl HalfStream {
    pub fn detection_completed(&self) -> bool {
        self.detection_completed
    }

    pub fn set_detection_completed(&mut self) {
        self.detection_completed = true;
    }

    /// Clears the latch. Used only by the soft-rollback path (spec §4.2e) so the caller can
    /// re-present the same bytes later.
    pub fn reset_detection_completed(&mut self) {
        self.detection_completed = false;
    }

    pub fn no_reassembly(&self) -> bool {
        self.no_reassembly
    }

    pub fn set_no_reassembly(&mut self) {
        self.no_reassembly = true;
    }
}

/// A reassembled, contiguous byte run tagged with direction, awaiting detection-engine
/// consumption (spec §3/§4.4).
#[derive(Debug)]
pub struct StreamMsg {
    pub direction: Direction,
    pub data: Vec<u8>,
    /// Back-reference to the owning flow. `enqueue_stream_msg` asserts this is present on
    /// arrival and clears it once the message has been queued, mirroring the base spec's
    /// "drop the flow back-reference" step without requiring an actual shared pointer.
    flow_ref: Option<u64>,
}

impl StreamMsg {
    pub fn new(direction: Direction, data: Vec<u8>, flow_id: u64) -> Self {
        StreamMsg {
            direction,
            data,
            flow_ref: Some(flow_id),
        }
    }
}

/// An index-based, O(1) push/pop queue of stream messages (Design Notes §9: prefer this over an
/// intrusive pointer-chase linked list).
#[derive(Debug, Default)]
pub struct SmsgQueue {
    queue: VecDeque<StreamMsg>,
}

impl SmsgQueue {
    pub fn new() -> Self {
        SmsgQueue {
            queue: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, msg: StreamMsg) {
        self.queue.push_back(msg);
    }

    pub fn pop_front(&mut self) -> Option<StreamMsg> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = StreamMsg> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops the oldest message, used when `max_queued_smsgs` is exceeded (supplemented feature,
    /// `SPEC_FULL.md` §2).
    fn drop_oldest(&mut self) {
        self.queue.pop_front();
    }
}

/// Per-flow TCP session state (spec §3).
#[derive(Debug, Default)]
pub struct TcpSession {
    pub client: HalfStream,
    pub server: HalfStream,
    /// Which side first produced payload bytes, and whether that fact has already been acted
    /// upon (spec invariant 4; see [`DataFirstSeenDir`]).
    pub data_first_seen_dir: DataFirstSeenDir,
    pub toserver_smsgs: SmsgQueue,
    pub toclient_smsgs: SmsgQueue,
}

impl TcpSession {
    pub fn new() -> Self {
        TcpSession::default()
    }

    pub fn stream(&self, dir: Direction) -> &HalfStream {
        match dir {
            Direction::ToServer => &self.client,
            Direction::ToClient => &self.server,
        }
    }

    pub fn stream_mut(&mut self, dir: Direction) -> &mut HalfStream {
        match dir {
            Direction::ToServer => &mut self.client,
            Direction::ToClient => &mut self.server,
        }
    }

    pub fn set_no_reassembly(&mut self, dir: Direction) {
        self.stream_mut(dir).set_no_reassembly();
    }

    fn smsgs_mut(&mut self, dir: Direction) -> &mut SmsgQueue {
        match dir {
            Direction::ToServer => &mut self.toserver_smsgs,
            Direction::ToClient => &mut self.toclient_smsgs,
        }
    }

    /// Pops the oldest queued message for `dir`, if any.
    pub fn pop_smsg(&mut self, dir: Direction) -> Option<StreamMsg> {
        self.smsgs_mut(dir).pop_front()
    }
}

/// Enqueues a reassembled stream message onto the session's per-direction queue (spec §4.4).
///
/// `has_transport_ctx` models "the flow has a transport context": when `false`, the message is
/// dropped (its flow back-reference already cleared) rather than queued, since there is nowhere
/// to enqueue it -- the equivalent of releasing it back to its pool in the original design.
///
/// `max_queued` caps the queue depth; when `Some(n)` and the queue is already at `n`, the oldest
/// queued message is dropped with a `warn!` before the new one is pushed.
pub fn enqueue_stream_msg(
    session: Option<&mut TcpSession>,
    mut smsg: StreamMsg,
    max_queued: Option<usize>,
) {
    debug_assert!(smsg.flow_ref.is_some(), "stream message has no owning flow");
    smsg.flow_ref = None;

    let Some(session) = session else {
        log::debug!("dropping stream message: flow has no transport context");
        return;
    };

    let dir = smsg.direction;
    let queue = session.smsgs_mut(dir);
    if let Some(max) = max_queued {
        if queue.len() >= max {
            log::warn!(
                "stream message queue for {:?} at capacity ({}), dropping oldest",
                dir,
                max
            );
            queue.drop_oldest();
        }
    }
    queue.push_back(smsg);
}
