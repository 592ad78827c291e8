use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use log::info;

use crate::{
    disk::{
        block_device::BlockDevice,
        types::{Block, BlockId, BLOCK_SIZE},
    },
    fs::error::{FileSystemError, Result},
};

/// 基于镜像文件的块设备。
/// 镜像是一个 2 的幂大小的扁平文件，块号 * BLOCK_SIZE 即字节偏移。
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    block_count: u64,
}

impl FileDisk {
    /// 创建一个新的零填充镜像文件（相当于一次性的建盘工具）。
    /// size 必须是 2 的幂且至少容纳一个块。
    pub fn create(path: &str, size: u64) -> Result<Self> {
        if !size.is_power_of_two() || size < BLOCK_SIZE as u64 {
            return Err(FileSystemError::Corrupted(format!(
                "image size {} is not a power of two of at least one block",
                size
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.set_len(size)?; // 顶分配空间，内容全零

        info!("created disk image {} ({} bytes)", path, size);

        Ok(Self {
            file: Mutex::new(file),
            block_count: size / BLOCK_SIZE as u64,
        })
    }

    /// 打开已有镜像，块数由文件长度反推。
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let size = file.metadata()?.len();
        if !size.is_power_of_two() || size < BLOCK_SIZE as u64 {
            return Err(FileSystemError::Corrupted(format!(
                "image {} has invalid size {}",
                path, size
            )));
        }

        info!("opened disk image {} ({} bytes)", path, size);

        Ok(Self {
            file: Mutex::new(file),
            block_count: size / BLOCK_SIZE as u64,
        })
    }

    pub fn exists(path: &str) -> bool {
        Path::new(path).exists()
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: BlockId, buf: &mut Block) -> Result<()> {
        if block_id as u64 >= self.block_count {
            return Err(FileSystemError::BlockOutOfRange(block_id));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: BlockId, buf: &Block) -> Result<()> {
        if block_id as u64 >= self.block_count {
            return Err(FileSystemError::BlockOutOfRange(block_id));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }
}
