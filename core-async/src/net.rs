//! Networking primitives.
//!
//! The loopback proxy binds its listener through this module.

pub use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
