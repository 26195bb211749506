use std::fmt;
use twentyfour::{Intent, Target};

/// A line typed at the peer's prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Something for the session to do in the game.
    Perform(Intent),
    Say(String),
    Status,
    Auto(bool),
    Leave,
    Help,
    Quit,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Command needs a target of `me`, `them` or `tie`.
    InvalidTarget(String),
    /// Auto toggle needs `on` or `off`.
    InvalidToggle(String),
    /// Say command missing its text.
    EmptyMessage,
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget(value) => write!(
                f,
                "Invalid target '{value}'. Use 'me', 'them' or 'tie' (e.g., 'vote me')"
            ),
            Self::InvalidToggle(value) => {
                write!(f, "Invalid toggle '{value}'. Use 'auto on' or 'auto off'")
            }
            Self::EmptyMessage => write!(f, "Say what? (e.g., 'say good game')"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

fn parse_target(value: &str) -> Result<Target, ParseError> {
    match value {
        "me" => Ok(Target::Me),
        "them" | "opponent" => Ok(Target::Opponent),
        "tie" => Ok(Target::Tie),
        other => Err(ParseError::InvalidTarget(other.to_string())),
    }
}

/// Parse a command string into a [`Command`].
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_command("vote me"), Ok(Command::Perform(Intent::Vote(Target::Me))));
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let trimmed = input.trim();
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match (word, rest) {
        ("play", "") => Command::Perform(Intent::Play),
        ("play", "them") => Command::Perform(Intent::PlayForOpponent),
        ("vote", target) => Command::Perform(Intent::Vote(parse_target(target)?)),
        ("winner", target) => Command::Perform(Intent::SetWinner(parse_target(target)?)),
        ("draw", "") => Command::Perform(Intent::Draw),
        ("flip", "") => Command::Perform(Intent::Flip),
        ("decide", "") => Command::Perform(Intent::Decide),
        ("loot", "") => Command::Perform(Intent::Loot),
        ("next", "") => Command::Perform(Intent::NextRound),
        ("start", "") => Command::Perform(Intent::StartGame),
        ("close", "") => Command::Perform(Intent::CloseGame),
        ("say", "") => return Err(ParseError::EmptyMessage),
        ("say", text) => Command::Say(text.to_string()),
        ("auto", "on") => Command::Auto(true),
        ("auto", "off") => Command::Auto(false),
        ("auto", other) => return Err(ParseError::InvalidToggle(other.to_string())),
        ("status", "") => Command::Status,
        ("leave", "") => Command::Leave,
        ("help", "") => Command::Help,
        ("quit" | "exit", "") => Command::Quit,
        _ => return Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    };
    Ok(command)
}

pub const COMMANDS_HELP: &str = "\
Commands:
  play                  Play the two cards in your hand
  vote me|them|tie      Vote for the round winner
  say TEXT              Send a message to the other peer
  status                Show the room and the game
  auto on|off           Let the host advance phases by itself
  leave                 Leave the room
  quit                  Exit

Host only:
  draw, flip, decide, loot, next
                        Advance the game by hand
  play them             Play your opponent's hand for them
  winner me|them|tie    Cast both votes at once
  start, close          Deal a new game or abandon the current one
";
