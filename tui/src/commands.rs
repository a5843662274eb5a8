//! Slash Commands
//!
//! Input starting with `/` is a local command and never reaches the model.

use std::path::PathBuf;

/// Shown by `/help`
pub const HELP_TEXT: &str = "\
Commands:
  /model <name>   switch model
  /models         list installed models
  /attach <path>  attach an image or document to the next message
  /new            start a new conversation
  /history        list saved conversations
  /load <name>    open a saved conversation
  /help           show this help
  /quit           exit
Keys: Enter send, Tab next model, PgUp/PgDn scroll, Esc quit";

/// A parsed slash command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Switch the active model
    Model(String),
    /// Show the installed models
    Models,
    /// Queue an attachment for the next message
    Attach(PathBuf),
    /// Start a new conversation file
    New,
    /// List saved conversations
    History,
    /// Open a saved conversation by name
    Load(String),
    /// Show help
    Help,
    /// Exit
    Quit,
    /// Unknown command or missing argument
    Invalid(String),
}

/// Parse a line of input
///
/// Returns `None` for ordinary chat text.
#[must_use]
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match (name, arg) {
        ("model", "") => Command::Invalid("usage: /model <name>".into()),
        ("model", model) => Command::Model(model.to_string()),
        ("models", _) => Command::Models,
        ("attach", "") => Command::Invalid("usage: /attach <path>".into()),
        ("attach", path) => Command::Attach(PathBuf::from(path)),
        ("new", _) => Command::New,
        ("history", _) => Command::History,
        ("load", "") => Command::Invalid("usage: /load <name>".into()),
        ("load", name) => Command::Load(name.to_string()),
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        (other, _) => Command::Invalid(format!("unknown command /{other} (try /help)")),
    };

    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("what does a/b mean"), None);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            parse_command("/model  llama3.2:latest "),
            Some(Command::Model("llama3.2:latest".into()))
        );
        assert_eq!(
            parse_command("/attach ~/My Pictures/cat.png"),
            Some(Command::Attach(PathBuf::from("~/My Pictures/cat.png")))
        );
        assert_eq!(
            parse_command("/load chat-20260101-120000"),
            Some(Command::Load("chat-20260101-120000".into()))
        );
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(parse_command("/models"), Some(Command::Models));
        assert_eq!(parse_command("/new"), Some(Command::New));
        assert_eq!(parse_command("/history"), Some(Command::History));
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command(" /quit"), Some(Command::Quit));
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
    }

    #[test]
    fn test_missing_argument_is_invalid() {
        assert!(matches!(parse_command("/model"), Some(Command::Invalid(_))));
        assert!(matches!(parse_command("/attach  "), Some(Command::Invalid(_))));
        assert!(matches!(parse_command("/load"), Some(Command::Invalid(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/frobnicate now"),
            Some(Command::Invalid(
                "unknown command /frobnicate (try /help)".into()
            ))
        );
    }
}
