//! Client input, parsed once into a [`ClientCommand`].

pub const SWITCH_USAGE: &str = "Usage: /switch <channel>";
pub const SEND_USAGE: &str = "Usage: /send <user> <path>";
pub const WHISPER_USAGE: &str = "Usage: /whisper <user> <message>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Quit,
    List,
    Switch(String),
    Send { target: String, path: String },
    Whisper { target: String, text: String },
    /// Free text for the channel.
    Say(String),
    /// A recognized command with missing arguments.
    Usage(&'static str),
}

impl ClientCommand {
    /// Parse one trimmed, non-empty message.
    pub fn parse(line: &str) -> Self {
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word {
            "/quit" => Self::Quit,
            "/list" => Self::List,
            "/switch" => match rest.split_whitespace().next() {
                Some(name) => Self::Switch(name.to_string()),
                None => Self::Usage(SWITCH_USAGE),
            },
            "/send" => match split_target(rest) {
                Some((target, path)) => Self::Send {
                    target: target.to_string(),
                    path: path.to_string(),
                },
                None => Self::Usage(SEND_USAGE),
            },
            "/whisper" => match split_target(rest) {
                Some((target, text)) => Self::Whisper {
                    target: target.to_string(),
                    text: text.to_string(),
                },
                None => Self::Usage(WHISPER_USAGE),
            },
            _ => Self::Say(line.to_string()),
        }
    }

    /// Static label for metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::List => "list",
            Self::Switch(_) => "switch",
            Self::Send { .. } => "send",
            Self::Whisper { .. } => "whisper",
            Self::Say(_) => "say",
            Self::Usage(_) => "usage",
        }
    }
}

/// `<user> <remainder>`, both non-empty.
fn split_target(rest: &str) -> Option<(&str, &str)> {
    let (target, remainder) = rest.split_once(char::is_whitespace)?;
    let remainder = remainder.trim();
    if target.is_empty() || remainder.is_empty() {
        return None;
    }
    Some((target, remainder))
}
