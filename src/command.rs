//! Console commands - intercepted before a line is treated as speech
//!
//! A line starting with '/' never reaches the dialogue as a transcript.

/// Out-of-band user command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Reset the board and the dialogue
    NewGame,
    /// Enter the awaiting-move state and listen
    Start,
    /// Stop listening; the dialogue parks where it is
    Stop,
    /// Print dialogue and board state
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /new    - Start a new game
  /start  - Listen for a move
  /stop   - Stop listening
  /status - Show the dialogue state and position
  /help   - Show this help
  /quit   - Exit

Moves: say them the way you would read them, e.g.
  'e four', 'knight f three', 'd takes e five', 'castle king side',
  'bishop takes e five check', 'e eight promote to queen'
Then answer 'yes' or 'confirm' to play it, 'no' or 'cancel' to drop it,
'repeat' to hear it again.";

/// Parse a slash command. Returns `None` for anything that is not one.
pub fn parse_slash_command(input: &str) -> Option<UserCommand> {
    let input = input.trim();
    let cmd = input.strip_prefix('/')?.to_lowercase();

    match cmd.as_str() {
        "new" | "newgame" | "reset" => Some(UserCommand::NewGame),
        "start" | "listen" => Some(UserCommand::Start),
        "stop" => Some(UserCommand::Stop),
        "status" => Some(UserCommand::Status),
        "help" | "commands" => Some(UserCommand::Help),
        "quit" | "exit" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// True when the line looks like a command, known or not
pub fn is_slash_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse_slash_command("/new"), Some(UserCommand::NewGame));
        assert_eq!(parse_slash_command(" /STOP "), Some(UserCommand::Stop));
        assert_eq!(parse_slash_command("/start"), Some(UserCommand::Start));
        assert_eq!(parse_slash_command("/exit"), Some(UserCommand::Quit));
        assert_eq!(parse_slash_command("/status"), Some(UserCommand::Status));
    }

    #[test]
    fn test_not_a_command() {
        assert_eq!(parse_slash_command("stop"), None);
        assert_eq!(parse_slash_command("e four"), None);
        assert_eq!(parse_slash_command("/castle"), None);
        assert!(is_slash_command("/castle"));
        assert!(!is_slash_command("castle"));
    }
}
