use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "fat" => Some(Command::Fat),
        "df" => Some(Command::Df),
        "create" => args.first().map(|&name| Command::Create(name.to_string())),
        "rm" => args.first().map(|&name| Command::Rm(name.to_string())),
        "open" => args.first().map(|&name| Command::Open(name.to_string())),
        "close" => parse_fd(args).map(Command::Close),
        "read" => {
            let fd = parse_fd(args)?;
            let count = args.get(1)?.parse().ok()?;
            Some(Command::Read(fd, count))
        }
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(parse_fd(args)?, args[1..].join(" ")))
            } else {
                None
            }
        }
        "seek" => {
            let fd = parse_fd(args)?;
            let offset = args.get(1)?.parse().ok()?;
            Some(Command::Seek(fd, offset))
        }
        "truncate" => {
            let fd = parse_fd(args)?;
            let size = args.get(1)?.parse().ok()?;
            Some(Command::Truncate(fd, size))
        }
        "stat" => args.first().map(|&name| Command::Stat(name.to_string())),
        "format" => Some(Command::Format),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

fn parse_fd(args: &[&str]) -> Option<usize> {
    args.first()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_arguments() {
        assert!(matches!(parse_command("ls"), Some(Command::Ls)));
        assert!(matches!(
            parse_command("create notes.txt"),
            Some(Command::Create(name)) if name == "notes.txt"
        ));
        assert!(matches!(
            parse_command("read 2 64"),
            Some(Command::Read(2, 64))
        ));
        assert!(matches!(
            parse_command("  write 0 hello world  "),
            Some(Command::Write(0, text)) if text == "hello world"
        ));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_command("").is_none());
        assert!(parse_command("frobnicate").is_none());
        assert!(parse_command("create").is_none());
        assert!(parse_command("read x 64").is_none());
        assert!(parse_command("seek 0").is_none());
    }
}
