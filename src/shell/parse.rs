use std::path::PathBuf;

use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];
    let number = |i: usize| args.get(i).and_then(|arg| arg.parse::<u32>().ok());

    match cmd {
        "help" => Some(Command::Help),
        "format" => Some(Command::Format),
        "mount" => Some(Command::Mount),
        "unmount" => Some(Command::Unmount),
        "debug" => Some(Command::Debug),
        "stat" => Some(Command::Stat),
        "create" => Some(Command::Create),
        "delete" => number(0).map(Command::Delete),
        "getsize" => number(0).map(Command::GetSize),
        "cat" => number(0).map(Command::Cat),
        "read" => Some(Command::Read {
            inumber: number(0)?,
            length: number(1)?,
            offset: number(2)?,
        }),
        "write" => {
            if args.len() >= 3 {
                Some(Command::Write {
                    inumber: number(0)?,
                    offset: number(1)?,
                    text: args[2..].join(" "),
                })
            } else {
                None
            }
        }
        "copyin" => Some(Command::CopyIn(PathBuf::from(args.first()?), number(1)?)),
        "copyout" => Some(Command::CopyOut(number(0)?, PathBuf::from(args.get(1)?))),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_arguments() {
        assert!(matches!(parse_command("delete 3"), Some(Command::Delete(3))));
        assert!(matches!(
            parse_command("read 1 100 4096"),
            Some(Command::Read {
                inumber: 1,
                length: 100,
                offset: 4096
            })
        ));
        assert!(parse_command("getsize abc").is_none());
        assert!(parse_command("read 1 100").is_none());
    }

    #[test]
    fn write_joins_remaining_words() {
        match parse_command("write 2 10 hello   brave world") {
            Some(Command::Write {
                inumber,
                offset,
                text,
            }) => {
                assert_eq!(inumber, 2);
                assert_eq!(offset, 10);
                assert_eq!(text, "hello brave world");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn copy_commands_take_path_and_inode() {
        assert!(matches!(
            parse_command("copyin notes.txt 4"),
            Some(Command::CopyIn(_, 4))
        ));
        assert!(matches!(
            parse_command("copyout 4 /tmp/out"),
            Some(Command::CopyOut(4, _))
        ));
        assert!(parse_command("copyout notes.txt 4").is_none());
        assert!(parse_command("bogus").is_none());
    }
}
