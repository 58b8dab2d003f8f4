//! A SPDY (v2 and v3) protocol endpoint core.
//!
//! The crate multiplexes many bidirectional logical streams over one ordered
//! byte transport: a [`session::Session`] owns the stream registry, id
//! allocation and a single-flight write queue; a resumable [`parser::Parser`]
//! turns arbitrary byte slices into typed frame events; a
//! [`generator::Generator`] produces wire octets, deflating header blocks
//! with the version's preset dictionary.
//!
//! The core is synchronous and transport-agnostic behind the
//! [`traits::Controller`] boundary; [`connection::Connection`] supplies the
//! tokio glue for a `TcpStream`.
//!
//! ```rust,no_run
//! use spdy::connection::Connection;
//! use spdy::frames::Version;
//! use spdy::headers::Headers;
//! use spdy::types::{SessionConfig, SynInfo};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let socket = TcpStream::connect("example.com:443").await?;
//!     let (session, connection) = Connection::attach(socket, SessionConfig::client(), None);
//!     tokio::spawn(connection.run());
//!
//!     let mut headers = Headers::new();
//!     headers.append(":method", "GET");
//!     headers.append(":path", "/");
//!     let stream = session
//!         .syn(Version::V3, SynInfo::new(headers, true), None)
//!         .expect("session is open");
//!     println!("opened stream {}", stream.id());
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod frames;
pub mod generator;
pub mod headers;
pub mod parser;
pub mod session;
pub mod status;
pub mod stream;
pub mod traits;
pub mod types;

mod compression;

#[cfg(test)]
mod tests;

pub use error::{SessionError, StreamError};
pub use frames::Version;
pub use headers::Headers;
pub use session::Session;
pub use status::{SessionStatus, StreamStatus};
pub use stream::{CloseState, Stream};
pub use traits::{Controller, SessionFrameListener, SessionListener, StreamFrameListener};
pub use types::{
    DataInfo, HeadersInfo, PingInfo, ReplyInfo, RstInfo, SessionConfig, SettingsInfo, SynInfo,
};
