//! Command Codec Module
//!
//! Parses and serializes the receiver wire protocol. Each command is one line
//! of ASCII text: a keyword followed by whitespace-separated arguments.
//!
//! | Keyword | Arguments                                   |
//! |---------|---------------------------------------------|
//! | `EXIT`  | none                                        |
//! | `ADDR`  | mac address, interface address, firmware    |
//!
//! Arity must match exactly. Any deviation is a [`ProtocolError`], which the
//! command server treats as fatal to the connection.

use std::fmt;
use thiserror::Error;

/// Kinds of command a receiver may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Exit,
    Addr,
}

impl CommandKind {
    /// Every command the daemon understands
    pub const ALL: [CommandKind; 2] = [CommandKind::Exit, CommandKind::Addr];

    /// Keyword used on the wire
    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Exit => "EXIT",
            CommandKind::Addr => "ADDR",
        }
    }

    /// Exact number of arguments the command takes
    pub fn expected_args(self) -> usize {
        match self {
            CommandKind::Exit => 0,
            CommandKind::Addr => 3,
        }
    }

    /// Look up a command by its wire keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The receiver ends its session
    Exit,
    /// The receiver reports its identity and addressing
    Addr {
        mac_address: String,
        interface_address: String,
        firmware_version: String,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Exit => CommandKind::Exit,
            Command::Addr { .. } => CommandKind::Addr,
        }
    }
}

/// Serializes the command as a wire line, without the terminator
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Exit => f.write_str(CommandKind::Exit.keyword()),
            Command::Addr {
                mac_address,
                interface_address,
                firmware_version,
            } => write!(
                f,
                "{} {} {} {}",
                CommandKind::Addr.keyword(),
                mac_address,
                interface_address,
                firmware_version
            ),
        }
    }
}

/// Errors raised while framing or parsing a command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} expects {expected} arguments, got {got}")]
    InvalidArguments {
        command: CommandKind,
        expected: usize,
        got: usize,
    },

    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,
}

/// Parse one line received from a receiver
///
/// The line may still carry its `\n` or `\r\n` terminator. Returns `Ok(None)`
/// for a blank line.
pub fn parse_line(line: &str) -> Result<Option<Command>, ProtocolError> {
    let parts: Vec<&str> = line.split_ascii_whitespace().collect();
    let Some((keyword, args)) = parts.split_first() else {
        return Ok(None);
    };

    let kind = CommandKind::from_keyword(keyword)
        .ok_or_else(|| ProtocolError::UnknownCommand(keyword.to_string()))?;

    if args.len() != kind.expected_args() {
        return Err(ProtocolError::InvalidArguments {
            command: kind,
            expected: kind.expected_args(),
            got: args.len(),
        });
    }

    let command = match kind {
        CommandKind::Exit => Command::Exit,
        CommandKind::Addr => Command::Addr {
            mac_address: args[0].to_string(),
            interface_address: args[1].to_string(),
            firmware_version: args[2].to_string(),
        },
    };
    Ok(Some(command))
}

/// Decode a raw framed line and parse it
pub fn decode_line(raw: &[u8]) -> Result<Option<Command>, ProtocolError> {
    let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
    parse_line(line)
}
