use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::{thread, time::Duration};

use crate::{
    disk::FileDisk,
    fs::FileSystem,
    utils::format_size,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls,
    Fat,
    Df,
    Create(String),
    Rm(String),
    Open(String),
    Close(usize),
    Read(usize, usize),
    Write(usize, String),
    Seek(usize, u32),
    Truncate(usize, u32),
    Stat(String),
    Format,
    Exit,
}

pub fn execute_command(
    cmd: &Command,
    fs_slot: &mut Option<FileSystem<FileDisk>>,
) -> Result<(), Box<dyn Error>> {
    // format 要先卸载再重建挂载，单独处理
    if matches!(cmd, Command::Format) {
        return reformat(fs_slot);
    }

    let fs = fs_slot.as_mut().expect("file system not mounted");

    match cmd {
        Command::Help => print_help(),
        Command::Ls => {
            let files = fs.list_files();
            if files.is_empty() {
                println!("{}", "📂 (no files)".bright_black());
            }
            for (name, size) in files {
                println!("📄 {}  {}", name.green(), format_size(size as u64).cyan());
            }
        }
        Command::Fat => {
            // 每个文件占用的块链
            for (name, chain) in fs.chains() {
                let blocks: Vec<String> = chain.iter().map(|b| b.to_string()).collect();
                println!("🔗 {}  [{}]", name.green(), blocks.join(" -> ").cyan());
            }
        }
        Command::Df => {
            let free = fs.free_block_count() as u64;
            let total = fs.block_count();
            println!(
                "💾 {} free of {} ({} blocks / {} blocks)",
                format_size(free * crate::disk::BLOCK_SIZE as u64).green(),
                format_size(total * crate::disk::BLOCK_SIZE as u64),
                free,
                total
            );
        }
        Command::Create(name) => {
            fs.create(name)?;
            println!("📝 Created file: {}", name.green());
        }
        Command::Rm(name) => {
            fs.delete(name)?;
            println!("🗑️ Deleted file: {}", name.red());
        }
        Command::Open(name) => {
            let fd = fs.open(name)?;
            println!("📖 Opened {} as handle {}", name.green(), fd.to_string().yellow());
        }
        Command::Close(fd) => {
            fs.close(*fd)?;
            println!("✅ Closed handle {}", fd.to_string().yellow());
        }
        Command::Read(fd, count) => {
            let mut buf = vec![0u8; *count];
            let n = fs.read(*fd, &mut buf)?;
            println!(
                "📖 Read {} bytes: {}",
                n.to_string().yellow(),
                String::from_utf8_lossy(&buf[..n])
            );
        }
        Command::Write(fd, text) => {
            let n = fs.write(*fd, text.as_bytes())?;
            println!("✏️  Wrote {} bytes", n.to_string().yellow());
        }
        Command::Seek(fd, offset) => {
            let effective = fs.seek(*fd, *offset)?;
            println!("🎯 Cursor at offset {}", effective.to_string().yellow());
        }
        Command::Truncate(fd, size) => {
            fs.truncate(*fd, *size)?;
            println!("✂️  Truncated to {} bytes", fs.filesize(*fd)?.to_string().yellow());
        }
        Command::Stat(name) => {
            let size = fs
                .list_files()
                .into_iter()
                .find(|(n, _)| n == name)
                .map(|(_, size)| size)
                .ok_or_else(|| format!("file not found: {}", name))?;
            let blocks = fs
                .chains()
                .into_iter()
                .find(|(n, _)| n == name)
                .map(|(_, chain)| chain.len())
                .unwrap_or(0);
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                name,
                "Size".blue(),
                format_size(size as u64),
                "Blocks".blue(),
                blocks
            );
        }
        Command::Format => unreachable!("handled above"),
        Command::Exit => println!("{}", "👋 Exiting ChainFS shell...".yellow().bold()),
    }

    Ok(())
}

/// 卸载、重新格式化、再挂载
fn reformat(fs_slot: &mut Option<FileSystem<FileDisk>>) -> Result<(), Box<dyn Error>> {
    let confirmed = Confirm::new()
        .with_prompt("⚠️  Formatting erases every file. Continue?")
        .default(false)
        .interact()?;
    if !confirmed {
        println!("{}", "Format cancelled.".yellow());
        return Ok(());
    }

    println!("💾 Formatting virtual disk...");
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let disk = fs_slot.take().expect("file system not mounted").unmount()?;
    for i in 0..=50 {
        pb.set_position(i);
        thread::sleep(Duration::from_millis(5));
    }
    FileSystem::format(&disk)?;
    *fs_slot = Some(FileSystem::mount(disk)?);
    for i in 50..=100 {
        pb.set_position(i);
        thread::sleep(Duration::from_millis(5));
    }
    pb.finish_with_message("✅ Disk formatted successfully!");
    Ok(())
}

fn print_help() {
    println!("{}", "📘 ChainFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls                   List files on the volume
  fat                  Show each file's block chain
  df                   Show free space
  create <file>        Create an empty file
  rm <file>            Delete a file (must be closed)
  open <file>          Open a file, prints its handle
  close <fd>           Close a handle
  read <fd> <n>        Read n bytes at the cursor
  write <fd> <text>    Append text to the file
  seek <fd> <offset>   Move the read cursor
  truncate <fd> <size> Shrink the file to size bytes
  stat <file>          Show file info
  format               Format the virtual disk
  help                 Show this help message
  exit                 Quit the shell
"
        .bright_black()
    );
}
