//! # Tls
//!
//! Tls wrappers

use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(feature = "native-tls")]
mod native_tls;
#[cfg(feature = "native-tls")]
pub use self::native_tls::{NativeTlsConnector, NativeTlsStream};

#[cfg(feature = "rustls")]
mod rustls;
#[cfg(feature = "rustls")]
pub use self::rustls::{RustlsConnector, RustlsStream};

/// Secures a freshly connected socket.
///
/// Implementations complete the handshake before returning, so that the first bytes on the
/// socket are the handshake and nothing else.
/// A connector is reused for the control channel and for every data channel of the session,
/// which allows the TLS library to resume the control channel's session.
pub trait TlsConnector: Debug {
    type Stream: TlsStream;

    fn connect(&self, domain: &str, stream: TcpStream) -> crate::FtpResult<Self::Stream>;
}

/// A trait for a TLS stream.
///
/// This kind of stream is used both for the control channel and for data channels.
pub trait TlsStream: Debug {
    type InnerStream: Read + Write;

    /// Get ref to underlying tcp stream
    fn get_ref(&self) -> &TcpStream;

    /// Get mutable reference to tls stream
    fn mut_ref(&mut self) -> &mut Self::InnerStream;

    /// Send close_notify to the peer. Once called, the stream won't be shut down again on drop.
    fn shutdown(&mut self) -> io::Result<()>;

    /// Whether the handshake resumed a previous session
    fn session_resumed(&self) -> bool;
}

/// Stream type of transports which never use TLS. It can't be instantiated.
#[derive(Debug)]
pub enum NoTlsStream {}

impl TlsStream for NoTlsStream {
    type InnerStream = TcpStream;

    fn get_ref(&self) -> &TcpStream {
        match *self {}
    }

    fn mut_ref(&mut self) -> &mut Self::InnerStream {
        match *self {}
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match *self {}
    }

    fn session_resumed(&self) -> bool {
        match *self {}
    }
}

/// Whether the error means the peer already closed the connection
pub(crate) fn is_already_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}
