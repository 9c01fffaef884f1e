use std::fmt;
use std::str::FromStr;

use crate::utils::{P2PError, Result};

pub const USAGE: &str = "Usage:\n\
    \thelp                       show this message\n\
    \tlistpeers                  list the known peers\n\
    \tbrowse <host>              list the files shared by <host>\n\
    \tsearch <filename>          find a peer sharing <filename>\n\
    \tdownload <filename>        fetch <filename> from the first peer sharing it\n\
    \tupload <filename>:<host>   push a shared file to <host>\n\
    \tquit                       leave the network";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    ListPeers,
    Browse,
    Search,
    Download,
    Upload,
    Quit,
}

impl Command {
    pub fn requires_arg(self) -> bool {
        matches!(
            self,
            Command::Browse | Command::Search | Command::Download | Command::Upload
        )
    }
}

impl FromStr for Command {
    type Err = P2PError;

    fn from_str(verb: &str) -> Result<Self> {
        match verb.to_ascii_uppercase().as_str() {
            "HELP" => Ok(Command::Help),
            "LISTPEERS" => Ok(Command::ListPeers),
            "BROWSE" => Ok(Command::Browse),
            "SEARCH" => Ok(Command::Search),
            "DOWNLOAD" => Ok(Command::Download),
            "UPLOAD" => Ok(Command::Upload),
            "QUIT" => Ok(Command::Quit),
            _ => Err(P2PError::InvalidCommand(format!("unknown verb {}", verb))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Command::Help => "help",
            Command::ListPeers => "listpeers",
            Command::Browse => "browse",
            Command::Search => "search",
            Command::Download => "download",
            Command::Upload => "upload",
            Command::Quit => "quit",
        };
        f.write_str(verb)
    }
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCommand {
    pub command: Command,
    pub argument: Option<String>,
}

impl UserCommand {
    /// Tokens past the second are ignored. An argument given to a verb that
    /// takes none is kept but unused.
    pub fn parse(input: &str) -> Result<Self> {
        let mut tokens = input.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| P2PError::InvalidCommand("empty input".to_string()))?;
        let command: Command = verb.parse()?;
        let argument = tokens.next().map(str::to_string);

        if command.requires_arg() && argument.is_none() {
            return Err(P2PError::InvalidCommand(format!(
                "{} requires an argument",
                command
            )));
        }

        Ok(Self { command, argument })
    }

    pub fn argument(&self) -> &str {
        self.argument.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs_are_case_insensitive() {
        let parsed = UserCommand::parse("DownLoad notes.txt").unwrap();
        assert_eq!(parsed.command, Command::Download);
        assert_eq!(parsed.argument(), "notes.txt");

        assert_eq!(UserCommand::parse("LISTPEERS").unwrap().command, Command::ListPeers);
    }

    #[test]
    fn test_missing_required_argument_is_rejected() {
        for line in ["browse", "search  ", "download", "upload"] {
            assert!(matches!(
                UserCommand::parse(line),
                Err(P2PError::InvalidCommand(_))
            ));
        }
    }

    #[test]
    fn test_unknown_or_empty_input_is_rejected() {
        assert!(UserCommand::parse("fetch a.txt").is_err());
        assert!(UserCommand::parse("   ").is_err());
    }

    #[test]
    fn test_extra_tokens_are_ignored() {
        let parsed = UserCommand::parse("search a.txt b.txt c.txt").unwrap();
        assert_eq!(parsed.argument.as_deref(), Some("a.txt"));

        let parsed = UserCommand::parse("quit now").unwrap();
        assert_eq!(parsed.command, Command::Quit);
    }

    #[test]
    fn test_upload_argument_is_kept_whole() {
        let parsed = UserCommand::parse("upload a.txt:10.0.0.5").unwrap();
        assert_eq!(parsed.argument(), "a.txt:10.0.0.5");
    }
}
