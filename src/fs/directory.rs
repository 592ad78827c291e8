use serde::{Deserialize, Serialize};

use crate::{
    disk::{
        types::{Block, BlockId, BLOCK_SIZE, NO_BLOCK},
        BlockDevice,
    },
    fs::{
        config::{DIRECTORY_BLOCKS, DIRECTORY_START_BLOCK_ID, DIR_ENTRY_SIZE, MAX_FILENAME, MAX_FILES},
        error::{FileSystemError, Result},
    },
};

// size 字段的哨兵值：标记空目录槽（不是真实文件）
const UNUSED_SLOT: u32 = u32::MAX;

/// 目录项：一个文件的元数据记录。
/// 磁盘上定宽 44 字节：name[32] + size + first_block + last_block，
/// 哨兵值只在这里编解码，对外全部走 Option 接口。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    name: [u8; MAX_FILENAME], // NUL 填充，按字节精确比较
    size: u32,
    first_block: BlockId,
    last_block: BlockId,
}

impl DirectoryEntry {
    fn unused() -> Self {
        Self {
            name: [0; MAX_FILENAME],
            size: UNUSED_SLOT,
            first_block: NO_BLOCK,
            last_block: NO_BLOCK,
        }
    }

    pub fn is_used(&self) -> bool {
        self.size != UNUSED_SLOT
    }

    /// 把槽位初始化为一个空文件
    pub fn init(&mut self, name: [u8; MAX_FILENAME]) {
        self.name = name;
        self.size = 0;
        self.first_block = NO_BLOCK;
        self.last_block = NO_BLOCK;
    }

    /// 释放槽位（文件被删除）
    pub fn clear(&mut self) {
        *self = Self::unused();
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn file_size(&self) -> u32 {
        debug_assert!(self.is_used());
        self.size
    }

    pub fn set_file_size(&mut self, size: u32) {
        self.size = size;
    }

    pub fn first_block(&self) -> Option<BlockId> {
        (self.first_block != NO_BLOCK).then_some(self.first_block)
    }

    pub fn set_first_block(&mut self, block: Option<BlockId>) {
        self.first_block = block.unwrap_or(NO_BLOCK);
    }

    pub fn last_block(&self) -> Option<BlockId> {
        (self.last_block != NO_BLOCK).then_some(self.last_block)
    }

    pub fn set_last_block(&mut self, block: Option<BlockId>) {
        self.last_block = block.unwrap_or(NO_BLOCK);
    }
}

/// 校验并打包文件名为定宽字节数组。
/// 要求非空、不超过 MAX_FILENAME 字节、不含 NUL（NUL 用作填充）。
pub fn pack_name(name: &str) -> Result<[u8; MAX_FILENAME]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_FILENAME || bytes.contains(&0) {
        return Err(FileSystemError::InvalidName(name.to_string()));
    }
    let mut packed = [0u8; MAX_FILENAME];
    packed[..bytes.len()].copy_from_slice(bytes);
    Ok(packed)
}

/// 目录表：定容的目录项数组，线性扫描查找。
#[derive(Debug)]
pub struct DirectoryTable {
    pub entries: Vec<DirectoryEntry>,
}

impl DirectoryTable {
    pub fn new() -> Self {
        Self {
            entries: vec![DirectoryEntry::unused(); MAX_FILES],
        }
    }

    /// 按名字查找，首个匹配即返回
    pub fn lookup(&self, name: &[u8; MAX_FILENAME]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_used() && e.name == *name)
    }

    /// 第一个空槽
    pub fn find_unused(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_used())
    }

    /// 从磁盘整表读入
    pub fn load(disk: &impl BlockDevice) -> Result<Self> {
        let mut bytes = Vec::with_capacity(DIRECTORY_BLOCKS * BLOCK_SIZE);
        let mut block_buf: Block = [0; BLOCK_SIZE];

        for i in 0..DIRECTORY_BLOCKS {
            disk.read_block(DIRECTORY_START_BLOCK_ID + i as BlockId, &mut block_buf)?;
            bytes.extend_from_slice(&block_buf);
        }

        let mut entries = Vec::with_capacity(MAX_FILES);
        for i in 0..MAX_FILES {
            let start = i * DIR_ENTRY_SIZE;
            let entry: DirectoryEntry = bincode::deserialize(&bytes[start..start + DIR_ENTRY_SIZE])
                .map_err(|e| FileSystemError::Corrupted(format!("directory entry {}: {}", i, e)))?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// 整表写回磁盘，尾部块用 0 补齐
    pub fn sync(&self, disk: &impl BlockDevice) -> Result<()> {
        let mut bytes = vec![0u8; DIRECTORY_BLOCKS * BLOCK_SIZE];
        for (i, entry) in self.entries.iter().enumerate() {
            let encoded = bincode::serialize(entry)
                .map_err(|e| FileSystemError::Corrupted(format!("directory entry {}: {}", i, e)))?;
            bytes[i * DIR_ENTRY_SIZE..i * DIR_ENTRY_SIZE + encoded.len()].copy_from_slice(&encoded);
        }

        let mut block_buf: Block = [0; BLOCK_SIZE];
        for i in 0..DIRECTORY_BLOCKS {
            let start = i * BLOCK_SIZE;
            block_buf.copy_from_slice(&bytes[start..start + BLOCK_SIZE]);
            disk.write_block(DIRECTORY_START_BLOCK_ID + i as BlockId, &block_buf)?;
        }
        Ok(())
    }
}
