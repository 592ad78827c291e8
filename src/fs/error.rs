use std::fmt;

use crate::disk::types::BlockId;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),        // 底层 I/O 错误
    DiskFull,                  // 空闲块耗尽
    NotFound(String),          // 文件不存在，带文件名
    AlreadyExists(String),     // 文件已存在，带文件名
    DirectoryFull,             // 目录槽位用完
    OpenFileTableFull,         // 打开文件表用完
    InvalidHandle(usize),      // 句柄越界或槽位未占用
    FileOpen(String),          // 文件仍被打开，删除被拒绝
    InvalidName(String),       // 文件名为空、过长或含 NUL
    BlockOutOfRange(BlockId),  // 块号越界，内部不变量被破坏
    Corrupted(String),         // 镜像或元数据损坏
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::DiskFull => write!(f, "Disk space is full"),
            Self::NotFound(name) => write!(f, "File not found: {}", name),
            Self::AlreadyExists(name) => write!(f, "File already exists: {}", name),
            Self::DirectoryFull => write!(f, "Directory is full"),
            Self::OpenFileTableFull => write!(f, "Too many open files"),
            Self::InvalidHandle(fd) => write!(f, "Invalid file handle: {}", fd),
            Self::FileOpen(name) => write!(f, "File is still open: {}", name),
            Self::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
            Self::BlockOutOfRange(block) => write!(f, "Block index out of range: {}", block),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
