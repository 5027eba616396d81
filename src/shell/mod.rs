pub mod command;
pub mod parse;

use crate::shell::{
    command::{execute_command, Command},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use inode_fs::{disk::BlockDevice, FileSystem};
use reedline::{
    default_emacs_keybindings, ColumnarMenu, DefaultCompleter, DefaultPrompt, DefaultPromptSegment,
    Emacs, FileBackedHistory, KeyCode, KeyModifiers, MenuBuilder, Reedline, ReedlineEvent,
    ReedlineMenu, Signal,
};
use std::{
    io::{self, stdout},
    path::PathBuf,
};

const COMMANDS: [&str; 16] = [
    "help", "format", "mount", "unmount", "debug", "stat", "create", "delete", "getsize", "cat",
    "read", "write", "copyin", "copyout", "exit", "quit",
];

pub fn start_shell<D: BlockDevice>(mut fs: FileSystem<D>) -> io::Result<()> {
    print_banner()?;

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let mut line_editor = build_editor();

    loop {
        let state = if fs.is_mounted() {
            "mounted".green()
        } else {
            "unmounted".yellow()
        };
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}@{}",
                username.green().bold(),
                hostname.cyan().bold()
            )),
            DefaultPromptSegment::Basic(format!("{} {}", "inode-fs".bright_blue().bold(), state)),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or bad arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting inode-fs...".yellow());
                break;
            }
            Ok(_) => {
                println!();
                continue;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

/// 初始化 reedline：历史记录、命令补全
fn build_editor() -> Reedline {
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".inode_fs_history");

    let commands = COMMANDS.iter().map(|c| c.to_string()).collect();
    let completer = Box::new(DefaultCompleter::new_with_wordlen(commands, 2));
    let completion_menu = Box::new(ColumnarMenu::default().with_name("completion_menu"));

    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );

    let line_editor = Reedline::create()
        .with_completer(completer)
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor.with_history(Box::new(history)),
        Err(e) => {
            log::warn!("history disabled: {}", e);
            line_editor
        }
    }
}

fn print_banner() -> io::Result<()> {
    let mut stdout = stdout();
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to inode-fs v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )
}
