//! pocketserve - HTTPS preview server for exported web builds
//!
//! Serves a static build directory over HTTPS on the local network so a phone
//! on the same Wi-Fi can open it by scanning a QR code. A self-signed
//! certificate for `localhost` and the host's LAN address is generated on
//! first run and reused afterwards.

pub mod certs;
pub mod config;
pub mod error;
pub mod http;
pub mod launcher;
pub mod middleware;
pub mod net;
pub mod qr;

pub use error::*;
pub use launcher::Launcher;
