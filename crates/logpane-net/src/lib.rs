//! Network input for logpane
//!
//! Binds a UDP socket for the selected wire format, converts every datagram
//! and hands the resulting records to a [`RecordSink`].

mod receiver;

use std::net::SocketAddr;

use thiserror::Error;

pub use receiver::{Receiver, ReceiverConfig, RecordSink};

// Re-export types used in our public API
pub use logpane_convert::{ConvertOptions, WireFormat};

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
