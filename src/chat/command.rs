//! Chat command parser and reply formatting for roomchat.
//!
//! A line starting with `/` is a command; its first whitespace-delimited
//! token selects the command. Anything else is chat text.

use super::directory::RoomInfo;
use super::member::ChatParticipant;

/// Result of parsing a chat input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Regular chat message.
    Message(String),
    /// Parsed command.
    Command(ChatCommand),
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Enter a room (empty name when none was given).
    Enter(String),
    /// Leave the current room but stay connected.
    Leave,
    /// Leave the server.
    Exit,
    /// List available rooms.
    List,
    /// Create a room (empty name when none was given).
    Create(String),
    /// List members of the current room.
    Who,
    /// Show help message.
    Help,
    /// Unknown command.
    Unknown(String),
}

impl ChatCommand {
    /// Get the command name.
    pub fn name(&self) -> &str {
        match self {
            ChatCommand::Enter(_) => "enter",
            ChatCommand::Leave => "leave",
            ChatCommand::Exit => "exit",
            ChatCommand::List => "list",
            ChatCommand::Create(_) => "create",
            ChatCommand::Who => "who",
            ChatCommand::Help => "help",
            ChatCommand::Unknown(cmd) => cmd,
        }
    }
}

impl std::fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatCommand::Enter(room) => write!(f, "/enter {room}"),
            ChatCommand::Create(room) => write!(f, "/create {room}"),
            other => write!(f, "/{}", other.name()),
        }
    }
}

/// Parse a chat input line into a message or command.
///
/// Only a `/` in the first column starts a command. Chat text is returned
/// exactly as typed.
pub fn parse_input(input: &str) -> ChatInput {
    let Some(without_slash) = input.strip_prefix('/') else {
        return ChatInput::Message(input.to_string());
    };

    let mut tokens = without_slash.split_whitespace();
    let cmd = if without_slash.starts_with(char::is_whitespace) {
        ""
    } else {
        tokens.next().unwrap_or("")
    };
    let arg = tokens.next().unwrap_or("").to_string();

    let command = match cmd.to_lowercase().as_str() {
        "enter" | "join" | "j" => ChatCommand::Enter(arg),
        "leave" | "part" => ChatCommand::Leave,
        "exit" | "quit" | "q" => ChatCommand::Exit,
        "list" | "rooms" | "l" => ChatCommand::List,
        "create" | "new" => ChatCommand::Create(arg),
        "who" | "w" => ChatCommand::Who,
        "help" | "h" | "?" => ChatCommand::Help,
        _ => ChatCommand::Unknown(cmd.to_string()),
    };

    ChatInput::Command(command)
}

/// Chat command information for help display.
pub struct CommandInfo {
    /// Command name.
    pub name: &'static str,
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
            name: "list",
            aliases: &["rooms", "l"],
            syntax: "/list",
            description: "List available rooms",
        },
        CommandInfo {
            name: "enter",
            aliases: &["join", "j"],
            syntax: "/enter <room>",
            description: "Enter a room",
        },
        CommandInfo {
            name: "create",
            aliases: &["new"],
            syntax: "/create <room>",
            description: "Create a room",
        },
        CommandInfo {
            name: "who",
            aliases: &["w"],
            syntax: "/who",
            description: "List members of the current room",
        },
        CommandInfo {
            name: "leave",
            aliases: &["part"],
            syntax: "/leave",
            description: "Leave the current room",
        },
        CommandInfo {
            name: "exit",
            aliases: &["quit", "q"],
            syntax: "/exit",
            description: "Leave the server",
        },
        CommandInfo {
            name: "help",
            aliases: &["h", "?"],
            syntax: "/help",
            description: "Display this message",
        },
    ]
}

/// Format the help message for display.
pub fn format_help() -> String {
    let mut lines = Vec::new();
    lines.push("Hello and welcome to the chat server! Please use one of the following commands:".to_string());

    for (i, info) in get_command_help().iter().enumerate() {
        lines.push(format!(
            "  {}. {:<16} {} (also /{})",
            i + 1,
            info.syntax,
            info.description,
            info.aliases.join(", /")
        ));
    }
    lines.push("Anything else you type while in a room is sent to everyone there.".to_string());

    lines.join("\n")
}

/// Format the room list for display.
pub fn format_room_list(rooms: &[RoomInfo]) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== Rooms ({}) ===", rooms.len()));

    if rooms.is_empty() {
        lines.push("(no rooms)".to_string());
    } else {
        for room in rooms {
            lines.push(format!("  {:<20} ({} online)", room.name, room.member_count));
        }
    }

    lines.join("\n")
}

/// Format the member list for display, with each member's join time (UTC).
pub fn format_who(members: &[ChatParticipant], room_name: &str) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== Members of {} ({}) ===", room_name, members.len()));

    if members.is_empty() {
        lines.push("(nobody here)".to_string());
    } else {
        for member in members {
            lines.push(format!(
                "  {:<24} since {}",
                member.name,
                member.joined_at.format("%H:%M:%S")
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regular_message() {
        let input = parse_input("Hello, world!");
        assert_eq!(input, ChatInput::Message("Hello, world!".to_string()));
    }

    #[test]
    fn test_parse_message_keeps_whitespace() {
        assert_eq!(
            parse_input("  hi there  "),
            ChatInput::Message("  hi there  ".to_string())
        );
    }

    #[test]
    fn test_parse_indented_slash_is_chat() {
        assert_eq!(
            parse_input("   /exit"),
            ChatInput::Message("   /exit".to_string())
        );
    }

    #[test]
    fn test_parse_empty_message() {
        assert_eq!(parse_input(""), ChatInput::Message(String::new()));
        assert_eq!(parse_input("   "), ChatInput::Message("   ".to_string()));
    }

    #[test]
    fn test_parse_enter_command() {
        assert_eq!(
            parse_input("/enter Gaming"),
            ChatInput::Command(ChatCommand::Enter("Gaming".to_string()))
        );
        assert_eq!(
            parse_input("/join   Gaming  extra"),
            ChatInput::Command(ChatCommand::Enter("Gaming".to_string()))
        );
        assert_eq!(
            parse_input("/enter"),
            ChatInput::Command(ChatCommand::Enter(String::new()))
        );
    }

    #[test]
    fn test_parse_room_name_keeps_case() {
        assert_eq!(
            parse_input("/ENTER gaming"),
            ChatInput::Command(ChatCommand::Enter("gaming".to_string()))
        );
    }

    #[test]
    fn test_parse_create_command() {
        assert_eq!(
            parse_input("/create Lounge"),
            ChatInput::Command(ChatCommand::Create("Lounge".to_string()))
        );
        assert_eq!(
            parse_input("/new"),
            ChatInput::Command(ChatCommand::Create(String::new()))
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_input("/list"), ChatInput::Command(ChatCommand::List));
        assert_eq!(parse_input("/rooms"), ChatInput::Command(ChatCommand::List));
        assert_eq!(parse_input("/leave"), ChatInput::Command(ChatCommand::Leave));
        assert_eq!(parse_input("/exit"), ChatInput::Command(ChatCommand::Exit));
        assert_eq!(parse_input("/Quit"), ChatInput::Command(ChatCommand::Exit));
        assert_eq!(parse_input("/who"), ChatInput::Command(ChatCommand::Who));
        assert_eq!(parse_input("/help"), ChatInput::Command(ChatCommand::Help));
        assert_eq!(parse_input("/?"), ChatInput::Command(ChatCommand::Help));
    }

    #[test]
    fn test_parse_requires_exact_token() {
        // Only the whole first token selects a command.
        assert_eq!(
            parse_input("/listing"),
            ChatInput::Command(ChatCommand::Unknown("listing".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_input("/foo bar"),
            ChatInput::Command(ChatCommand::Unknown("foo".to_string()))
        );
        assert_eq!(
            parse_input("/"),
            ChatInput::Command(ChatCommand::Unknown(String::new()))
        );
        assert_eq!(
            parse_input("/ enter Gaming"),
            ChatInput::Command(ChatCommand::Unknown(String::new()))
        );
    }

    #[test]
    fn test_chat_command_display() {
        assert_eq!(
            ChatCommand::Enter("Gaming".to_string()).to_string(),
            "/enter Gaming"
        );
        assert_eq!(ChatCommand::Exit.to_string(), "/exit");
        assert_eq!(ChatCommand::Unknown("foo".to_string()).to_string(), "/foo");
    }

    #[test]
    fn test_format_help() {
        let help = format_help();
        for cmd in ["/list", "/enter", "/create", "/who", "/leave", "/exit", "/help"] {
            assert!(help.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn test_format_room_list() {
        let rooms = vec![
            RoomInfo {
                name: "Flirt".to_string(),
                member_count: 0,
            },
            RoomInfo {
                name: "Gaming".to_string(),
                member_count: 2,
            },
        ];
        let text = format_room_list(&rooms);
        assert!(text.contains("(2)"));
        assert!(text.contains("Flirt"));
        assert!(text.contains("Gaming"));
        assert!(text.contains("2 online"));
    }

    #[test]
    fn test_format_room_list_empty() {
        assert!(format_room_list(&[]).contains("(no rooms)"));
    }

    #[test]
    fn test_format_who() {
        use super::super::member::ConnectionId;
        use chrono::TimeZone;

        let mut alice = ChatParticipant::new(ConnectionId::new(), "alice");
        alice.joined_at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        let bob = ChatParticipant::new(ConnectionId::new(), "bob");

        let text = format_who(&[alice, bob], "Gaming");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== Members of Gaming (2) ===");
        assert!(lines[1].starts_with("  alice "));
        assert!(lines[1].ends_with("since 09:30:05"));
        assert!(lines[2].starts_with("  bob "));
        assert!(format_who(&[], "Memes").contains("nobody"));
    }
}
