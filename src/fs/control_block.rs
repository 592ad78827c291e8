use serde::{Deserialize, Serialize};

use crate::{
    disk::{
        types::{Block, BlockId, BLOCK_SIZE, NO_BLOCK},
        BlockDevice,
    },
    fs::{
        config::CONTROL_BLOCK_BLOCK_ID,
        error::{FileSystemError, Result},
    },
};

/// 魔数，用于在 mount 时识别已格式化的卷
pub const MAGIC: u64 = 0x4348_4149_4E46_5301; // "CHAINFS" + 版本

// bincode 定宽编码：magic u64 + free_list_head u32
const ENCODED_SIZE: usize = 8 + 4;

/// 控制块：卷级状态，固定放在块 0。
/// free_list_head 指向穿在 FAT 里的空闲链表表头，None 表示磁盘已满。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlBlock {
    magic: u64,
    free_list_head: BlockId, // NO_BLOCK 表示空
}

impl ControlBlock {
    pub fn new(free_list_head: BlockId) -> Self {
        Self {
            magic: MAGIC,
            free_list_head,
        }
    }

    pub fn free_list_head(&self) -> Option<BlockId> {
        (self.free_list_head != NO_BLOCK).then_some(self.free_list_head)
    }

    pub fn set_free_list_head(&mut self, head: Option<BlockId>) {
        self.free_list_head = head.unwrap_or(NO_BLOCK);
    }

    /// 从块 0 读入并校验魔数
    pub fn load(disk: &impl BlockDevice) -> Result<Self> {
        let mut buf: Block = [0; BLOCK_SIZE];
        disk.read_block(CONTROL_BLOCK_BLOCK_ID, &mut buf)?;

        let cb: ControlBlock = bincode::deserialize(&buf[..ENCODED_SIZE])
            .map_err(|e| FileSystemError::Corrupted(format!("control block: {}", e)))?;

        if cb.magic != MAGIC {
            return Err(FileSystemError::Corrupted(format!(
                "bad magic {:#x}, not a chainfs volume",
                cb.magic
            )));
        }
        Ok(cb)
    }

    /// 写回块 0
    pub fn sync(&self, disk: &impl BlockDevice) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| FileSystemError::Corrupted(format!("control block: {}", e)))?;

        let mut buf: Block = [0; BLOCK_SIZE];
        buf[..bytes.len()].copy_from_slice(&bytes);
        disk.write_block(CONTROL_BLOCK_BLOCK_ID, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;

    #[test]
    fn encoding_is_fixed_width() {
        let cb = ControlBlock::new(4);
        assert_eq!(bincode::serialize(&cb).unwrap().len(), ENCODED_SIZE);
    }

    #[test]
    fn sync_then_load_round_trips() {
        let disk = MemoryDisk::new(8);
        let mut cb = ControlBlock::new(4);
        cb.set_free_list_head(None);
        cb.sync(&disk).expect("sync");

        let loaded = ControlBlock::load(&disk).expect("load");
        assert_eq!(loaded, cb);
        assert_eq!(loaded.free_list_head(), None);
    }

    #[test]
    fn load_rejects_blank_block() {
        let disk = MemoryDisk::new(8);
        assert!(matches!(
            ControlBlock::load(&disk),
            Err(FileSystemError::Corrupted(_))
        ));
    }
}
