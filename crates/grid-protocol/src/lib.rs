//! # MatrixGrid Wire Protocol
//!
//! This crate implements the line-oriented text protocol spoken between the
//! MatrixGrid master and its workers, plus the connection session that frames
//! a TCP stream as a message channel.
//!
//! ## Layers
//!
//! - **Message** - the protocol record: magic, version, type, sender,
//!   timestamp, payload
//! - **Codec** - one message per line, brace-enclosed `key:value` fields,
//!   quoted strings with explicit escaping
//! - **Payload** - order-significant `;`-separated sub-fields inside the
//!   payload string, with their own escaping layer
//! - **Session** - thread-safe send/receive over one persistent TCP stream
//!
//! ## Framing
//!
//! ```text
//! {magic:"GRIDMX",version:1,messageType:"HEARTBEAT",senderId:"run-1",timestamp:1712000000000,payload:"PING"}
//! ```
//!
//! Every string value is quoted and escaped, so payloads may contain the
//! record's own delimiters (braces, commas, colons, quotes) without ever
//! becoming ambiguous with the outer framing. Decoding reverses the escaping
//! exactly or fails with a parse error; it never guesses.

pub mod codec;
pub mod message;
pub mod payload;
pub mod session;

pub use codec::{decode, encode};
pub use message::{Message, WireError};
pub use payload::{TaskReply, TaskRequest};
pub use session::{Received, Session, SessionError};

/// Fixed protocol identifier carried in every message.
pub const PROTOCOL_MAGIC: &str = "GRIDMX";

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Message type tags. The set is closed; anything else fails validation
/// downstream when a handler rejects it.
pub mod msg_type {
    /// Worker -> master, first message on a fresh connection. Payload: worker id.
    pub const REGISTER_WORKER: &str = "REGISTER_WORKER";
    /// Master -> worker, registration accepted. Payload: runtime token.
    pub const WORKER_ACK: &str = "WORKER_ACK";
    /// Either direction, free-form liveness marker in the payload.
    pub const HEARTBEAT: &str = "HEARTBEAT";
    /// Master -> worker. Payload: taskId;taskType;data;runtimeToken.
    pub const RPC_REQUEST: &str = "RPC_REQUEST";
    /// Worker -> master. Payload: taskId;result.
    pub const TASK_COMPLETE: &str = "TASK_COMPLETE";
    /// Worker -> master. Payload: taskId;errorMessage.
    pub const TASK_ERROR: &str = "TASK_ERROR";
}
