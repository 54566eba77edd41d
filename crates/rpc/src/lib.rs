pub mod error;
pub mod method;
pub mod protocol;
pub mod request;
pub mod response;

pub use error::RpcError;
pub use method::Method;
pub use protocol::{Request, Response};
pub use request::*;
pub use response::*;
