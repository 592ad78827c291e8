pub mod command;
pub mod parse;

use crate::{
    disk::{FileDisk, DEFAULT_DISK_SIZE},
    fs::FileSystem,
    shell::{command::execute_command, parse::parse_command},
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use std::{error::Error, io::stdout, path::PathBuf, thread, time::Duration};

const DISK_PATH: &str = "disk.img";

pub fn start_shell() {
    boot_animation();

    let mut fs = match boot_filesystem() {
        Ok(fs) => Some(fs),
        Err(e) => {
            println!("{} {}", "❌ Boot failed:".red().bold(), e);
            return;
        }
    };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chainfs_history");

    let mut line_editor = Reedline::create().with_history(Box::new(
        reedline::FileBackedHistory::with_file(100, history_path.clone()).unwrap(),
    ));

    // 命令补全
    let commands = vec![
        "help", "ls", "fat", "df", "create", "rm", "open", "close", "read", "write", "seek",
        "truncate", "stat", "format", "exit",
    ];
    let completer = reedline::DefaultCompleter::new_with_wordlen(
        commands.iter().map(|s| s.to_string()).collect(),
        2,
    );
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!(
            "{}@{}",
            username.green().bold(),
            hostname.cyan().bold()
        )),
        DefaultPromptSegment::Basic("ChainFS".bright_blue().bold().to_string()),
    );

    loop {
        let input = line_editor.read_line(&prompt);

        match input {
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
                        if fs.is_none() {
                            // 重新格式化途中失败，卷已经不在挂载状态
                            println!("{}", "Volume lost, shutting down.".red());
                            break;
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting ChainFS...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    // 退出前正常卸载，把元数据冲回镜像
    if let Some(fs) = fs.take() {
        if let Err(e) = fs.unmount() {
            println!("{} {}", "❌ Unmount failed:".red().bold(), e);
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
}

/// 打开（必要时创建并格式化）镜像，然后挂载
fn boot_filesystem() -> Result<FileSystem<FileDisk>, Box<dyn Error>> {
    let disk_exists = FileDisk::exists(DISK_PATH);

    println!("🧠 Initializing virtual disk...");
    let disk = if disk_exists {
        FileDisk::open(DISK_PATH)?
    } else {
        FileDisk::create(DISK_PATH, DEFAULT_DISK_SIZE)?
    };

    if !disk_exists {
        // 只有“明确是新磁盘”才格式化
        println!("🔧 No disk found, formatting new file system...");
        FileSystem::format(&disk)?;
    }

    println!("⚙️  Mounting file system...");
    Ok(FileSystem::mount(disk)?)
}

/// 动态欢迎动画
fn boot_animation() {
    let mut stdout = stdout();

    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0)).unwrap();
    println!("{}", "[ChainFS Booting...]".bright_yellow().bold());
    thread::sleep(Duration::from_millis(300));

    // 模拟进度条
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    for i in 0..100 {
        pb.set_position(i);
        thread::sleep(Duration::from_millis(5));
    }
    pb.finish_with_message("✅ Ready!");

    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print("Welcome to ChainFS v0.1.0\n"),
        ResetColor
    )
    .unwrap();
}
