//! # Rustls
//!
//! Rustls implementation of tls types

use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, HandshakeKind, StreamOwned};

use super::{TlsConnector, TlsStream};
use crate::{FtpError, FtpResult};

/// A Wrapper for the tls connector.
///
/// The same [`ClientConfig`] is used for every handshake of the session; its session store
/// lets data channels resume the session negotiated on the control channel.
pub struct RustlsConnector {
    connector: Arc<ClientConfig>,
}

impl std::fmt::Debug for RustlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<?>")
    }
}

impl From<Arc<ClientConfig>> for RustlsConnector {
    fn from(connector: Arc<ClientConfig>) -> Self {
        Self { connector }
    }
}

impl TlsConnector for RustlsConnector {
    type Stream = RustlsStream;

    fn connect(&self, domain: &str, mut stream: TcpStream) -> FtpResult<Self::Stream> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| FtpError::SecureError(e.to_string()))?;
        let mut connection = ClientConnection::new(Arc::clone(&self.connector), server_name)
            .map_err(|e| FtpError::SecureError(e.to_string()))?;
        // drive the handshake now; StreamOwned would otherwise defer it to the first read
        while connection.is_handshaking() {
            connection
                .complete_io(&mut stream)
                .map_err(|err| match err.kind() {
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FtpError::Timeout,
                    _ => FtpError::SecureError(err.to_string()),
                })?;
        }
        debug!(
            "TLS handshake with {domain} completed ({:?}, {:?})",
            connection.protocol_version(),
            connection.handshake_kind()
        );
        Ok(RustlsStream {
            stream: StreamOwned::new(connection, stream),
            shutdown_pending: true,
        })
    }
}

// -- tls stream wrapper to implement drop...

/// Tls stream wrapper. Sends close_notify on drop, unless it has already been shut down.
#[derive(Debug)]
pub struct RustlsStream {
    stream: StreamOwned<ClientConnection, TcpStream>,
    shutdown_pending: bool,
}

impl TlsStream for RustlsStream {
    type InnerStream = StreamOwned<ClientConnection, TcpStream>;

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
        self.stream.flush()?;
        self.stream.conn.send_close_notify();
        while self.stream.conn.wants_write() {
            self.stream.conn.write_tls(&mut self.stream.sock)?;
        }
        self.stream.sock.flush()?;
        trace!("TLS close_notify sent");
        Ok(())
    }

    fn session_resumed(&self) -> bool {
        self.stream.conn.handshake_kind() == Some(HandshakeKind::Resumed)
    }
}

impl Drop for RustlsStream {
    fn drop(&mut self) {
        if self.shutdown_pending {
            if let Err(err) = self.shutdown() {
                error!("error in terminating rustls stream: {err}");
            } else {
                debug!("TLS Stream shut down");
            }
        }
    }
}
