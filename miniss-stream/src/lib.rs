#![forbid(unsafe_code)]
//! MiniSS secure channel: handshake and encrypted record layer over any
//! ordered, reliable byte stream.
//!
//! ```rust,no_run
//! # async fn demo() -> miniss_stream::ChannelResult<()> {
//! use miniss_crypto::StaticKeyPair;
//! let tcp = tokio::net::TcpStream::connect("127.0.0.1:13371").await?;
//! let mut sock = miniss_stream::handshake(tcp, StaticKeyPair::generate()).await?;
//! println!("peer key {:?}", sock.remote_pk());
//! sock.write(b"hello").await?;
//! # Ok(()) }
//! ```

pub mod errors;
pub mod frame;
pub mod handshake;
pub mod hello;
pub mod socket;

pub use errors::{ChannelError, ChannelResult, Field};
pub use frame::MAX_RECORD_PLAINTEXT;
pub use handshake::{handshake, handshake_with_config, HandshakeConfig};
pub use hello::{Hello, HELLO_LEN, VERSION_TAG};
pub use socket::{ChannelState, SecureReader, SecureSocket, SecureWriter};
