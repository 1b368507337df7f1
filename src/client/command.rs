//! Slash-command parser for the terminal client.
//!
//! Lines starting with `/` are commands; anything else is chat text for the
//! current room.

/// Result of parsing an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// Chat text.
    Message(String),
    /// Parsed command.
    Command(ClientCommand),
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Refresh the room list.
    List,
    /// Create a room and join it.
    Create(String),
    /// Join a room by id or by name.
    Join(String),
    /// Leave the current room.
    Leave,
    /// Show help.
    Help,
    /// Exit the client.
    Quit,
    /// Unknown command.
    Unknown(String),
}

impl ClientCommand {
    /// Get the command name.
    pub fn name(&self) -> &str {
        match self {
            ClientCommand::List => "list",
            ClientCommand::Create(_) => "create",
            ClientCommand::Join(_) => "join",
            ClientCommand::Leave => "leave",
            ClientCommand::Help => "help",
            ClientCommand::Quit => "quit",
            ClientCommand::Unknown(cmd) => cmd,
        }
    }
}

impl std::fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientCommand::Create(name) => write!(f, "/create {name}"),
            ClientCommand::Join(target) => write!(f, "/join {target}"),
            other => write!(f, "/{}", other.name()),
        }
    }
}

/// Parse an input line into a message or command.
pub fn parse_input(input: &str) -> ClientInput {
    let trimmed = input.trim();

    let Some(without_slash) = trimmed.strip_prefix('/') else {
        return ClientInput::Message(trimmed.to_string());
    };

    let (cmd, args) = match without_slash.find(char::is_whitespace) {
        Some(pos) => (&without_slash[..pos], without_slash[pos..].trim()),
        None => (without_slash, ""),
    };

    let command = match cmd.to_lowercase().as_str() {
        "list" | "ls" | "rooms" => ClientCommand::List,
        "create" | "new" => ClientCommand::Create(args.to_string()),
        "join" | "j" => ClientCommand::Join(args.to_string()),
        "leave" | "part" => ClientCommand::Leave,
        "help" | "h" | "?" => ClientCommand::Help,
        "quit" | "q" | "exit" => ClientCommand::Quit,
        _ => ClientCommand::Unknown(cmd.to_string()),
    };

    ClientInput::Command(command)
}

/// Command information for help display.
pub struct CommandInfo {
    /// Command aliases.
    pub aliases: &'static [&'static str],
    /// Command syntax.
    pub syntax: &'static str,
    /// Command description.
    pub description: &'static str,
}

/// Get all available command information.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            aliases: &["ls", "rooms"],
            syntax: "/list",
            description: "Refresh and show the room list",
        },
        CommandInfo {
            aliases: &["new"],
            syntax: "/create <name>",
            description: "Create a room and join it",
        },
        CommandInfo {
            aliases: &["j"],
            syntax: "/join <id|name>",
            description: "Join a room from the list",
        },
        CommandInfo {
            aliases: &["part"],
            syntax: "/leave",
            description: "Leave the current room",
        },
        CommandInfo {
            aliases: &["h", "?"],
            syntax: "/help",
            description: "Show this help",
        },
        CommandInfo {
            aliases: &["q", "exit"],
            syntax: "/quit",
            description: "Leave the current room and exit",
        },
    ]
}

/// Format the help message for display.
pub fn format_help() -> String {
    let mut lines = vec!["=== Commands ===".to_string(), String::new()];

    for info in get_command_help() {
        lines.push(info.syntax.to_string());
        if !info.aliases.is_empty() {
            lines.push(format!("  aliases: /{}", info.aliases.join(", /")));
        }
        lines.push(format!("  {}", info.description));
    }
    lines.push(String::new());
    lines.push("Anything else is sent as a chat message to the current room.".to_string());

    lines.join("\n")
}
