//! Benchmark engines.
//!
//! - `msg_rtt`: round trip time of fixed-size messages over one connection
//! - `con_rtt`: round trip time of connection setup and teardown
//!
//! Each engine exposes a server half and a client half. The client half
//! produces one timing sample per iteration.

pub mod con_rtt;
pub mod msg_rtt;
