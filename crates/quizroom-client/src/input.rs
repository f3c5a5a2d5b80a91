#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Refresh,
    Join(String),
    Leave,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?.to_ascii_lowercase();
    let command = match cmd.as_str() {
        "start" | "s" => Command::Start,
        "refresh" | "r" | "players" => Command::Refresh,
        "join" | "j" => Command::Join(parts.next()?.to_string()),
        "leave" => Command::Leave,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

pub const HELP: &str = "commands: start | refresh | join <CODE> | leave | help | quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("start"), Some(Command::Start));
        assert_eq!(parse_command("  S "), Some(Command::Start));
        assert_eq!(parse_command("r"), Some(Command::Refresh));
        assert_eq!(parse_command("join ab12cd"), Some(Command::Join("ab12cd".into())));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_unknown_and_incomplete() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("dance"), None);
        assert_eq!(parse_command("join"), None);
    }
}
