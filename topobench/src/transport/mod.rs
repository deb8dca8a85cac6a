mod connection;
mod listener;
pub mod router;

pub use connection::PeerConnection;
pub use listener::{TransportListener, connect_with_retry};
pub use router::PeerRouter;
