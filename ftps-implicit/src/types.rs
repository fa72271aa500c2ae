//! # Types
//!
//! Shared data types and the library-global error type

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use super::ReplyCode;

/// Port conventionally used by implicit FTPS servers
pub const DEFAULT_PORT: u16 = 990;

/// Maximum length, terminator included, of a single line read from the control channel
/// or from a line-mode data channel.
pub const MAX_LINE_LENGTH: usize = 8192;

/// Default size of the blocks moved by binary transfers
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
///
/// Connect failures are reported as [`FtpError::ConnectionError`] when the socket could not be
/// established and as [`FtpError::SecureError`] when the TLS handshake failed.
#[derive(Debug, Error)]
pub enum FtpError {
    /// Socket error
    #[error("Connection error: {0}")]
    ConnectionError(io::Error),
    /// There was an error with the secure stream
    #[error("Secure error: {0}")]
    SecureError(String),
    /// The remote peer closed the stream while a reply was expected
    #[error("Connection closed by remote")]
    ConnectionClosed,
    /// A blocking operation exceeded the configured timeout
    #[error("Operation timed out")]
    Timeout,
    /// A line longer than the maximum line length has been read or was about to be sent
    #[error("Line too long: got more than {0} bytes")]
    LineTooLong(usize),
    /// Unexpected response from remote. The command expected a certain response, but got another one.
    /// This means the ftp server refused to perform your request or there was an error while processing it.
    /// Contains the response data.
    #[error("Invalid response: {0}")]
    UnexpectedResponse(Response),
    /// The response syntax is invalid
    #[error("Response contains an invalid syntax")]
    BadResponse,
    /// The transfer observer asked to stop the transfer. Contains the completion reply sent by the server.
    #[error("Transfer aborted: {0}")]
    TransferAborted(Response),
    /// The command text spans more than one line. Nothing has been sent.
    #[error("Invalid command: {0:?} is not a single line")]
    InvalidCommand(String),
    /// The control channel could not be kept in sync and must be reconnected
    #[error("Control channel is no longer usable; reconnect")]
    SessionUnusable,
}

impl FtpError {
    /// Whether the error means the transport broke, as opposed to the server rejecting a command
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_)
                | Self::SecureError(_)
                | Self::ConnectionClosed
                | Self::Timeout
                | Self::BadResponse
                | Self::SessionUnusable
        )
    }
}

impl From<io::Error> for FtpError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::ConnectionError(err),
        }
    }
}

/// Defines a response from the ftp server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: ReplyCode,
    /// Raw lines of the reply, terminator stripped, reply code included
    pub lines: Vec<String>,
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(status: ReplyCode, lines: Vec<String>) -> Self {
        Self { status, lines }
    }

    /// Get the whole reply text, lines joined by `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Get the reply text without the reply code prefixing the first line
    pub fn message(&self) -> String {
        let mut lines = self.lines.iter();
        let first = lines
            .next()
            .map(|line| line.get(4..).unwrap_or_default())
            .unwrap_or_default();
        std::iter::once(first)
            .chain(lines.map(String::as_str))
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message().trim_end())
    }
}

/// Representation type used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// Image type; bytes are moved unchanged
    Binary,
    /// ASCII type; lines are terminated by CRLF on the wire
    Ascii,
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "I"),
            Self::Ascii => write!(f, "A"),
        }
    }
}

/// Connection mode for data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Active,
    /// Required by some servers (ipv6); defined in rfc 2428 <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    ExtendedPassive,
    Passive,
}

/// Protection level; argument for `PROT` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    /// Data connections are not encrypted
    Clear,
    /// Data connections are secured with TLS
    Private,
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "C"),
            Self::Private => write!(f, "P"),
        }
    }
}

/// Where and how long to wait when connecting to the server.
///
/// The parameters are fixed once a connection attempt begins; changing them requires a new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    /// Timeout applied to connects, handshakes and every blocking read or write
    pub timeout: Duration,
}

impl ConnectionParams {
    /// Parameters for `host` on the implicit FTPS port, with a 60 seconds timeout
    pub fn new(host: impl ToString) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
