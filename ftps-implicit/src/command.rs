//! # Command
//!
//! The set of FTP commands sent on the control channel

use std::fmt;
use std::net::SocketAddr;

use crate::types::{FtpError, FtpResult, ProtectionLevel, TransferType};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Append to file
    Appe(String),
    /// Any command line, sent as is
    Custom(String),
    /// Specifies an extended address for the data connection (active mode) <https://www.rfc-editor.org/rfc/rfc2428#section-2>
    Eprt(SocketAddr),
    /// Extended passive mode <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    Epsv,
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Get the list of file names at specified path. If path is not provided list entries at current working directory
    Nlst(Option<String>),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Protection buffer size
    Pbsz(usize),
    /// Specifies an address and port to which the server should connect (active mode)
    Port(String),
    /// Set protection level for data channels
    Prot(ProtectionLevel),
    /// Quit
    Quit,
    /// Resume transfer from offset
    Rest(u64),
    /// Retrieve file
    Retr(String),
    /// Put file at specified path
    Store(String),
    /// Set transfer type
    Type(TransferType),
    /// Provide user to login as
    User(String),
}

impl Command {
    /// Fails with [`FtpError::InvalidCommand`] unless the command renders to exactly one line.
    ///
    /// Every line written on the control channel is answered by a reply; a command smuggling a
    /// line break would get more replies than the session reads.
    pub fn ensure_single_line(&self) -> FtpResult<()> {
        let line = self.to_string();
        if line.trim_end_matches("\r\n").contains(['\r', '\n']) {
            Err(FtpError::InvalidCommand(self.redacted()))
        } else {
            Ok(())
        }
    }

    /// Text safe to write in logs; credentials are masked
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ******".to_string(),
            cmd => cmd.to_string().trim_end_matches("\r\n").to_string(),
        }
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Appe(p) => write!(f, "APPE {p}"),
            Self::Custom(c) => write!(f, "{}", c.trim_end_matches(['\r', '\n'])),
            Self::Eprt(addr) => {
                let proto = if addr.is_ipv4() { 1 } else { 2 };
                write!(f, "EPRT |{}|{}|{}|", proto, addr.ip(), addr.port())
            }
            Self::Epsv => write!(f, "EPSV"),
            Self::List(p) => match p {
                Some(p) => write!(f, "LIST {p}"),
                None => write!(f, "LIST"),
            },
            Self::Nlst(p) => match p {
                Some(p) => write!(f, "NLST {p}"),
                None => write!(f, "NLST"),
            },
            Self::Noop => write!(f, "NOOP"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Pbsz(sz) => write!(f, "PBSZ {sz}"),
            Self::Port(p) => write!(f, "PORT {p}"),
            Self::Prot(l) => write!(f, "PROT {l}"),
            Self::Quit => write!(f, "QUIT"),
            Self::Rest(offset) => write!(f, "REST {offset}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }?;
        write!(f, "\r\n")
    }
}
