//! # Data Stream
//!
//! This module exposes the stream where bytes must be written to/read from.
//! The same type backs the control channel and the data channels.

use std::io::{self, Read, Result, Write};
use std::net::TcpStream;

use super::tls::TlsStream;

/// Data Stream used for communications. It can be both of type Tcp in case of plain communication or Ssl in case of FTPS
#[derive(Debug)]
pub enum DataStream<T>
where
    T: TlsStream,
{
    Tcp(TcpStream),
    Ssl(Box<T>),
}

impl<T> DataStream<T>
where
    T: TlsStream,
{
    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            DataStream::Tcp(stream) => stream,
            DataStream::Ssl(stream) => stream.get_ref(),
        }
    }

    /// Whether the stream is secured with TLS
    pub fn is_secure(&self) -> bool {
        matches!(self, DataStream::Ssl(_))
    }

    /// Whether the TLS handshake of this stream resumed a previous session
    pub fn session_resumed(&self) -> bool {
        match self {
            DataStream::Tcp(_) => false,
            DataStream::Ssl(stream) => stream.session_resumed(),
        }
    }

    /// Gracefully terminate the secure layer, if any. The tcp stream is left open.
    pub fn shutdown(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(stream) => stream.flush(),
            DataStream::Ssl(stream) => stream.shutdown(),
        }
    }
}

// -- sync

impl<T> Read for DataStream<T>
where
    T: TlsStream,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(stream) => stream.read(buf),
            // servers often close the socket without close_notify once the transfer is complete
            DataStream::Ssl(stream) => match stream.mut_ref().read(buf) {
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("peer closed the TLS stream without close_notify");
                    Ok(0)
                }
                result => result,
            },
        }
    }
}

impl<T> Write for DataStream<T>
where
    T: TlsStream,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(stream) => stream.write(buf),
            DataStream::Ssl(stream) => stream.mut_ref().write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(stream) => stream.flush(),
            DataStream::Ssl(stream) => stream.mut_ref().flush(),
        }
    }
}
