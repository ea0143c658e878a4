//! The application-layer dispatch core of a network intrusion-detection system.
//!
//! Given reassembled TCP byte streams or raw UDP datagrams belonging to a tracked flow, this
//! crate decides which L7 protocol is being carried and routes subsequent payload bytes to the
//! matching parser, while enforcing the correctness invariants that keep the two half-streams,
//! the detector, and the parser registry in sync (see `DESIGN.md` for the full rationale).
//!
//! This crate does not implement TCP reassembly, the detection probes, or any L7 parser itself --
//! those are external collaborators reached through the single [`deps::AppLayerDeps`] trait a
//! caller implements once per deployment. The crate's own job is purely the decision logic in
//! between: [`dispatch::handle_tcp`] and [`dispatch::handle_udp`] are the two entry points a
//! caller drives, one chunk of in-order bytes (or one datagram) at a time.
//!
//! ```text
//! reassembler    --> handle_tcp --> detect() / parse()
//! packet ingress --> handle_udp --> detect() / parse()
//! ```
//!
//! A worker thread owns one [`thread_ctx::ThreadContext`] for the lifetime of the thread; a flow
//! owns one [`flow::Flow`] (its L4/L7 state) and, for TCP, one [`session::TcpSession`] (its
//! half-streams and stream-message queues). All three are supplied by the caller -- this crate
//! never allocates a flow or a thread context on its own.

#[macro_use]
mod timing;

pub mod config;
pub mod deps;
pub mod direction_override;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod flow;
pub mod pdu;
pub mod registry;
pub mod session;
pub mod thread_ctx;

pub use deps::{AppLayerDeps, DetectOutcome, ParseOutcome};
pub use dispatch::{handle_tcp, handle_udp};
pub use error::AppLayerError;
pub use events::EventKind;
pub use flow::{AppProto, Flow};
pub use pdu::{Direction, L4Protocol, PduFlags};
pub use session::TcpSession;
pub use thread_ctx::ThreadContext;
