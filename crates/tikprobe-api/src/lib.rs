// tikprobe-api: Async Rust client for the RouterOS management API

pub mod codec;
pub mod error;
pub mod reply;
pub mod session;
pub mod transport;

pub use codec::SentenceCodec;
pub use error::Error;
pub use reply::{Record, Reply};
pub use session::Session;
pub use transport::{DEFAULT_API_PORT, TransportConfig};
