pub mod client;
pub mod router;
pub mod transport;

pub use client::{Client, ClientError};
pub use transport::{Server, ShutdownHandle, TransportError};
