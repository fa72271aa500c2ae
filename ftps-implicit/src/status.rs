//! # Status
//!
//! Reply codes returned by the server on the control channel

use std::fmt;

/// Category of a reply code, given by its first digit (RFC 959 4.2)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1xx: the action is being started; expect another reply
    PositivePreliminary,
    /// 2xx: the action has been successfully completed
    PositiveCompletion,
    /// 3xx: the command has been accepted but more information is required
    PositiveIntermediate,
    /// 4xx: the command was not accepted, but the error is temporary
    TransientNegative,
    /// 5xx: the command was not accepted and should not be retried as is
    PermanentNegative,
    Unknown,
}

/// A 3-digit reply code.
///
/// Unlike a closed enumeration, any code sent by the server is preserved,
/// so callers can always inspect what the server actually replied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(pub u16);

impl ReplyCode {
    // 1xx: Positive Preliminary Reply
    pub const RESTART_MARKER: Self = Self(110);
    pub const ALREADY_OPEN: Self = Self(125);
    pub const ABOUT_TO_SEND: Self = Self(150);
    // 2xx: Positive Completion Reply
    pub const COMMAND_OK: Self = Self(200);
    pub const COMMAND_NOT_IMPLEMENTED: Self = Self(202);
    pub const READY: Self = Self(220);
    pub const CLOSING: Self = Self(221);
    pub const CLOSING_DATA_CONNECTION: Self = Self(226);
    pub const PASSIVE_MODE: Self = Self(227);
    pub const EXTENDED_PASSIVE_MODE: Self = Self(229);
    pub const LOGGED_IN: Self = Self(230);
    pub const REQUESTED_FILE_ACTION_OK: Self = Self(250);
    // 3xx: Positive intermediate Reply
    pub const NEED_PASSWORD: Self = Self(331);
    pub const REQUEST_FILE_PENDING: Self = Self(350);
    // 4xx: Transient Negative Completion Reply
    pub const NOT_AVAILABLE: Self = Self(421);
    pub const CANNOT_OPEN_DATA_CONNECTION: Self = Self(425);
    pub const TRANSFER_ABORTED: Self = Self(426);
    pub const ACTION_ABORTED: Self = Self(451);
    // 5xx: Permanent Negative Completion Reply
    pub const BAD_COMMAND: Self = Self(500);
    pub const BAD_SEQUENCE: Self = Self(503);
    pub const NOT_LOGGED_IN: Self = Self(530);
    pub const FILE_UNAVAILABLE: Self = Self(550);
    pub const EXCEEDED_STORAGE: Self = Self(552);

    /// Get status code
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Get the reply category
    pub fn class(&self) -> ReplyClass {
        match self.0 / 100 {
            1 => ReplyClass::PositivePreliminary,
            2 => ReplyClass::PositiveCompletion,
            3 => ReplyClass::PositiveIntermediate,
            4 => ReplyClass::TransientNegative,
            5 => ReplyClass::PermanentNegative,
            _ => ReplyClass::Unknown,
        }
    }

    pub fn is_preliminary(&self) -> bool {
        self.class() == ReplyClass::PositivePreliminary
    }

    pub fn is_completion(&self) -> bool {
        self.class() == ReplyClass::PositiveCompletion
    }

    /// Get status description
    pub fn desc(&self) -> &'static str {
        match self.0 {
            110 => "restart marker reply",
            125 => "data connection already open, transfer starting",
            150 => "file status okay, about to open data connection",
            200 => "command okay",
            202 => "command not implemented",
            220 => "service ready for new user",
            221 => "service closing control connection",
            226 => "closing data connection",
            227 => "entering passive mode",
            229 => "entering extended passive mode",
            230 => "user logged in, proceed",
            250 => "requested file action okay",
            331 => "user name okay, need password",
            350 => "requested file action pending further information",
            421 => "service not available, closing control connection",
            425 => "can't open data connection",
            426 => "connection closed; transfer aborted",
            451 => "requested action aborted",
            500 => "syntax error, command unrecognized",
            503 => "bad sequence of commands",
            530 => "user not logged in",
            550 => "requested action not taken; file unavailable",
            552 => "requested file action aborted; exceeded storage allocation",
            _ => "unknown reply code",
        }
    }
}

impl From<u16> for ReplyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}
