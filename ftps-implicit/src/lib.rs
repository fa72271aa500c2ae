#![crate_name = "ftps_implicit"]
#![crate_type = "lib"]

//! # ftps-implicit
//!
//! ftps-implicit is an FTP client library for servers speaking **implicit** FTPS.
//!
//! Unlike explicit FTPS, where a plaintext control connection is upgraded with `AUTH TLS`,
//! an implicit FTPS server expects the TLS handshake as the very first thing on the socket
//! (conventionally on port 990). This library:
//!
//! - performs the handshake before a single FTP byte is exchanged
//! - secures every data connection reusing the TLS session negotiated for the control connection
//! - shuts down the TLS layer of each data connection without disturbing the control connection
//! - always consumes the server's completion reply, so the control connection stays in sync
//!   even when a transfer fails halfway
//!
//! ## Get started
//!
//! ```toml
//! ftps-implicit = "^0.1"
//! ```
//!
//! ### Features
//!
//! - `rustls` (default): TLS through [rustls](https://github.com/rustls/rustls)
//! - `native-tls`: TLS through [native-tls](https://github.com/sfackler/rust-native-tls)
//! - `no-log`: disable logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! use ftps_implicit::rustls::ClientConfig;
//! use ftps_implicit::{ConnectionParams, NoopObserver, RustlsConnector, RustlsFtpsStream};
//!
//! let config = ClientConfig::builder()
//!     .with_root_certificates(root_store)
//!     .with_no_client_auth();
//! let mut ftp = RustlsFtpsStream::connect_secure_implicit(
//!     &ConnectionParams::new("ftp.example.com"),
//!     RustlsConnector::from(Arc::new(config)),
//! )
//! .unwrap();
//! ftp.login("user", "password").unwrap();
//!
//! let mut reader = Cursor::new(b"hello, world!".to_vec());
//! ftp.store_binary("STOR hello.txt", &mut reader, 8192, NoopObserver, None)
//!     .unwrap();
//! let data = ftp.retr_as_buffer("hello.txt").unwrap();
//! assert_eq!(data.into_inner(), b"hello, world!");
//!
//! ftp.quit().unwrap();
//! ```
//!

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
pub(crate) mod command;
mod ftps;
mod observer;
mod reader;
mod regex;
mod status;
#[cfg(all(test, feature = "rustls"))]
mod test_server;

// -- public
pub mod types;

// -- secure deps
#[cfg(feature = "native-tls")]
pub extern crate native_tls_crate as native_tls;
#[cfg(feature = "rustls")]
pub extern crate rustls_crate as rustls;

// -- export
pub use ftps::{
    DataStream, FtpStream, ImplFtpsStream, ImplicitTls, NoTlsStream, PassiveStreamBuilder,
    PlainTcp, TlsConnector, TlsStream, Transport,
};
#[cfg(feature = "native-tls")]
pub use ftps::{NativeTlsConnector, NativeTlsFtpsStream, NativeTlsStream};
#[cfg(feature = "rustls")]
pub use ftps::{RustlsConnector, RustlsFtpsStream, RustlsStream};
pub use observer::{BlockObserver, LineObserver, LinePrinter, NoopObserver};
pub use reader::{read_line, read_reply_line, read_response};
pub use status::{ReplyClass, ReplyCode};
pub use types::{
    ConnectionParams, FtpError, FtpResult, Mode, ProtectionLevel, Response, TransferType,
    DEFAULT_BLOCK_SIZE, DEFAULT_PORT, MAX_LINE_LENGTH,
};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
