//! # Transport
//!
//! How control and data channels are bootstrapped on top of freshly connected sockets

use std::fmt::Debug;
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};

use super::data_stream::DataStream;
use super::tls::{is_already_closed, NoTlsStream, TlsConnector, TlsStream};
use crate::types::{FtpResult, ProtectionLevel};

/// Application data discarded at most while waiting for the peer to close a data channel
const DRAIN_LIMIT: usize = 64 * 1024;

/// Opens and tears down the channels of a session.
///
/// The control session and the transfer engine only talk to this trait, so implicit TLS and
/// plain TCP are interchangeable.
pub trait Transport: Debug {
    type Stream: TlsStream;

    /// Turn a connected socket into the control channel. Nothing has been written to `stream` yet.
    fn open_control(&self, domain: &str, stream: TcpStream)
        -> FtpResult<DataStream<Self::Stream>>;

    /// Turn a connected socket into a data channel, honoring the negotiated protection level
    fn open_data(
        &self,
        domain: &str,
        stream: TcpStream,
        protection: ProtectionLevel,
    ) -> FtpResult<DataStream<Self::Stream>>;

    /// Protection level data channels get when the session starts
    fn default_protection(&self) -> ProtectionLevel;

    /// Terminate a data channel: close_notify, end of our half of the connection, then wait
    /// for the peer to close its half before releasing the socket.
    ///
    /// A peer which has already closed the connection is not an error.
    fn shutdown(&self, stream: &mut DataStream<Self::Stream>) -> io::Result<()> {
        let tls = match stream.shutdown() {
            Err(err) if is_already_closed(&err) => {
                debug!("data channel already closed by peer: {err}");
                Ok(())
            }
            result => result,
        };
        let write = tolerate_closed(stream.get_ref().shutdown(Shutdown::Write));
        drain(stream);
        let tcp = tolerate_closed(stream.get_ref().shutdown(Shutdown::Both));
        tls.and(write).and(tcp)
    }
}

fn tolerate_closed(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if is_already_closed(&err) => Ok(()),
        result => result,
    }
}

/// Read what the peer still sends until it closes the channel.
///
/// Records left unread in the socket (e.g. TLS 1.3 session tickets sent after the handshake of
/// an upload) make the kernel reset the connection on close, and the peer may lose the tail of
/// the transfer. Reads are bounded by the socket timeout and by [`DRAIN_LIMIT`].
fn drain<S>(stream: &mut DataStream<S>)
where
    S: TlsStream,
{
    let mut buffer = [0u8; 4096];
    let mut discarded = 0;
    while discarded <= DRAIN_LIMIT {
        match stream.read(&mut buffer) {
            Ok(0) => {
                trace!("data channel closed by peer");
                return;
            }
            Ok(read) => discarded += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("stopped waiting for the peer to close the data channel: {err}");
                return;
            }
        }
    }
    debug!("discarded {discarded} bytes from the data channel; closing anyway");
}

/// Implicit FTPS: the control channel is secured before the first FTP byte is exchanged,
/// and so are data channels unless `PROT C` has been negotiated.
#[derive(Debug)]
pub struct ImplicitTls<C>
where
    C: TlsConnector,
{
    connector: C,
}

impl<C> ImplicitTls<C>
where
    C: TlsConnector,
{
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

impl<C> Transport for ImplicitTls<C>
where
    C: TlsConnector,
{
    type Stream = C::Stream;

    fn open_control(
        &self,
        domain: &str,
        stream: TcpStream,
    ) -> FtpResult<DataStream<Self::Stream>> {
        debug!("Initializing TLS on control channel");
        let stream = self.connector.connect(domain, stream)?;
        debug!("TLS Stream OK");
        Ok(DataStream::Ssl(Box::new(stream)))
    }

    fn open_data(
        &self,
        domain: &str,
        stream: TcpStream,
        protection: ProtectionLevel,
    ) -> FtpResult<DataStream<Self::Stream>> {
        match protection {
            ProtectionLevel::Clear => Ok(DataStream::Tcp(stream)),
            ProtectionLevel::Private => {
                let stream = self.connector.connect(domain, stream)?;
                debug!(
                    "data channel secured (session resumed: {})",
                    stream.session_resumed()
                );
                Ok(DataStream::Ssl(Box::new(stream)))
            }
        }
    }

    fn default_protection(&self) -> ProtectionLevel {
        ProtectionLevel::Private
    }
}

/// Plain FTP, without any TLS layer
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTcp;

impl Transport for PlainTcp {
    type Stream = NoTlsStream;

    fn open_control(
        &self,
        _domain: &str,
        stream: TcpStream,
    ) -> FtpResult<DataStream<Self::Stream>> {
        Ok(DataStream::Tcp(stream))
    }

    fn open_data(
        &self,
        _domain: &str,
        stream: TcpStream,
        protection: ProtectionLevel,
    ) -> FtpResult<DataStream<Self::Stream>> {
        if protection == ProtectionLevel::Private {
            warn!("private data channel requested on a plain transport; using clear text");
        }
        Ok(DataStream::Tcp(stream))
    }

    fn default_protection(&self) -> ProtectionLevel {
        ProtectionLevel::Clear
    }
}
