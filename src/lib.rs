// cumulative-ack sliding window sender, out-of-order reassembling receiver,
// and the session gluing both behind the four entry points in session.rs.
// driver.rs wires the engine to a real UDP socket and stdin/stdout for
// src/bin/client.rs and src/bin/server.rs.

mod err;
pub use err::*;

pub mod buffer;
pub mod codec;
pub mod driver;
pub mod io;
pub mod recv;
pub mod registry;
pub mod send;
pub mod session;

pub use codec::Packet;
pub use session::Session;
