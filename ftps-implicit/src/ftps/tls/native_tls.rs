//! # Native tls
//!
//! Native tls implementation of TLS types

use std::io;
use std::net::TcpStream;

use native_tls::{HandshakeError, TlsConnector, TlsStream};

use super::{TlsConnector as TlsConnectorTrait, TlsStream as TlsStreamTrait};
use crate::{FtpError, FtpResult};

#[derive(Debug)]
/// A Wrapper for the tls connector.
///
/// Session resumption on data channels is up to the platform TLS library.
pub struct NativeTlsConnector {
    connector: TlsConnector,
}

impl From<TlsConnector> for NativeTlsConnector {
    fn from(connector: TlsConnector) -> Self {
        Self { connector }
    }
}

impl TlsConnectorTrait for NativeTlsConnector {
    type Stream = NativeTlsStream;

    fn connect(&self, domain: &str, stream: TcpStream) -> FtpResult<Self::Stream> {
        match self.connector.connect(domain, stream) {
            Ok(stream) => {
                debug!("TLS handshake with {domain} completed");
                Ok(NativeTlsStream::from(stream))
            }
            // the sockets are blocking: an interrupted handshake means the read timeout elapsed
            Err(HandshakeError::WouldBlock(_)) => Err(FtpError::Timeout),
            Err(HandshakeError::Failure(err)) => Err(FtpError::SecureError(err.to_string())),
        }
    }
}

// -- tls stream wrapper to implement drop...

/// Tls stream wrapper. Sends close_notify on drop, unless it has already been shut down.
#[derive(Debug)]
pub struct NativeTlsStream {
    stream: TlsStream<TcpStream>,
    shutdown_pending: bool,
}

impl TlsStreamTrait for NativeTlsStream {
    type InnerStream = TlsStream<TcpStream>;

    /// Get ref to underlying tcp stream
    fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Get mutable reference to tls stream
    fn mut_ref(&mut self) -> &mut Self::InnerStream {
        &mut self.stream
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.shutdown_pending = false;
        self.stream.shutdown()
    }

    fn session_resumed(&self) -> bool {
        false
    }
}

impl From<TlsStream<TcpStream>> for NativeTlsStream {
    fn from(stream: TlsStream<TcpStream>) -> Self {
        Self {
            stream,
            shutdown_pending: true,
        }
    }
}

impl Drop for NativeTlsStream {
    fn drop(&mut self) {
        if self.shutdown_pending {
            if let Err(err) = self.stream.shutdown() {
                error!("Failed to shutdown stream: {}", err);
            } else {
                debug!("TLS Stream shut down");
            }
        }
    }
}
