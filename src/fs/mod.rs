use log::{debug, info};

use crate::{
    disk::{
        types::{Block, BlockId, BLOCK_SIZE},
        BlockDevice,
    },
    fs::{
        config::first_data_block,
        control_block::ControlBlock,
        directory::{pack_name, DirectoryTable},
        error::{FileSystemError, Result},
        fat::FatTable,
        open_file::OpenFileTable,
    },
};

pub mod config;
pub mod control_block;
pub mod directory;
pub mod error;
pub mod fat;
pub mod open_file;

/// 已挂载的卷。
/// 三个元数据结构（控制块 / 目录表 / FAT）在内存中各有一份，
/// 操作先改内存，发生结构性变化时再选择性落盘；
/// 打开文件表只存在于内存，随挂载生灭。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    disk: D,
    control_block: ControlBlock,
    directory: DirectoryTable,
    fat: FatTable,
    open_files: OpenFileTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// 在空白镜像上建立文件系统。
    /// 写完控制块、全空目录和初始 FAT 后即返回，不保留内存副本。
    pub fn format(disk: &D) -> Result<()> {
        let block_count = disk.block_count();
        let first_free = first_data_block(block_count);
        if first_free as u64 >= block_count {
            return Err(FileSystemError::Corrupted(format!(
                "volume of {} blocks has no room for data after {} metadata blocks",
                block_count, first_free
            )));
        }

        info!(
            "formatting volume: {} blocks, data region starts at block {}",
            block_count, first_free
        );

        ControlBlock::new(first_free).sync(disk)?;
        DirectoryTable::new().sync(disk)?;
        FatTable::formatted(block_count, first_free).sync(disk)?;
        Ok(())
    }

    /// 挂载：校验镜像、把三个元数据结构读进内存、清空打开文件表。
    /// 布局（目录块数、FAT 起点）由常量重新推导，与 format 完全一致。
    pub fn mount(disk: D) -> Result<Self> {
        let control_block = ControlBlock::load(&disk)?;
        if let Some(head) = control_block.free_list_head() {
            if head as u64 >= disk.block_count() {
                return Err(FileSystemError::Corrupted(format!(
                    "free list head {} outside volume of {} blocks",
                    head,
                    disk.block_count()
                )));
            }
        }

        let directory = DirectoryTable::load(&disk)?;
        let fat = FatTable::load(&disk)?;

        info!("mounted volume: {} blocks", disk.block_count());

        Ok(Self {
            disk,
            control_block,
            directory,
            fat,
            open_files: OpenFileTable::new(),
        })
    }

    /// 卸载：FAT 和目录落盘，归还块设备。
    /// 控制块在每次结构性变化时已经写回，这里不再重复。
    pub fn unmount(self) -> Result<D> {
        self.fat.sync(&self.disk)?;
        self.directory.sync(&self.disk)?;
        info!("unmounted volume");
        Ok(self.disk)
    }

    /// 新建空文件：占第一个空目录槽，整表落盘
    pub fn create(&mut self, name: &str) -> Result<()> {
        let packed = pack_name(name)?;
        if self.directory.lookup(&packed).is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        let index = self
            .directory
            .find_unused()
            .ok_or(FileSystemError::DirectoryFull)?;

        self.directory.entries[index].init(packed);
        self.directory.sync(&self.disk)?;
        debug!("created file {:?} in directory slot {}", name, index);
        Ok(())
    }

    /// 删除文件：任何句柄还开着就拒绝；整条链 O(1) 还给空闲链表
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let packed = pack_name(name)?;
        let index = self
            .directory
            .lookup(&packed)
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        if self.open_files.is_file_open(index) {
            return Err(FileSystemError::FileOpen(name.to_string()));
        }

        let first = self.directory.entries[index].first_block();
        let last = self.directory.entries[index].last_block();
        if let (Some(first), Some(last)) = (first, last) {
            self.fat.release_chain(&mut self.control_block, first, last);
        }

        self.directory.entries[index].clear();
        self.sync_metadata()?;
        debug!("deleted file {:?}", name);
        Ok(())
    }

    /// 打开文件，返回句柄。游标指向首块、偏移 0。
    pub fn open(&mut self, name: &str) -> Result<usize> {
        let packed = pack_name(name)?;
        let index = self
            .directory
            .lookup(&packed)
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        let first = self.directory.entries[index].first_block();
        self.open_files.open(index, first)
    }

    /// 关闭句柄。写入在每次操作内已经落盘，这里不需要冲刷。
    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.open_files.close(fd)
    }

    pub fn filesize(&self, fd: usize) -> Result<u32> {
        let open = self.open_files.get(fd)?;
        Ok(self.directory.entries[open.dir_index].file_size())
    }

    /// 从读游标处拷贝至多 buf.len() 字节，沿 FAT 链逐块推进。
    /// 到达文件逻辑末尾就提前停，返回实际读到的字节数，从不报错。
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let open = self.open_files.get(fd)?;
        let dir_index = open.dir_index;
        let (mut current, mut offset) = (open.current_block, open.offset_in_block);

        let entry = &self.directory.entries[dir_index];
        let size = entry.file_size() as usize;
        if buf.is_empty() || size == 0 || entry.first_block().is_none() {
            return Ok(0);
        }
        let last = entry.last_block();
        // 末块内的逻辑终点。恰好写满的末块要当作“满块边界”，终点是 BLOCK_SIZE 而不是 0。
        let end_in_last = (size - 1) % BLOCK_SIZE + 1;

        let mut bytes_read = 0;
        let mut block_buf: Block = [0; BLOCK_SIZE];

        while bytes_read < buf.len() {
            // 游标已越过链尾：永远返回 0
            let Some(block) = current else { break };

            if offset == BLOCK_SIZE {
                current = self.fat.next(block);
                offset = 0;
                continue;
            }

            let limit = if Some(block) == last {
                end_in_last
            } else {
                BLOCK_SIZE
            };
            if offset >= limit {
                break; // 已到逻辑末尾
            }

            let chunk = (buf.len() - bytes_read).min(limit - offset);
            self.disk.read_block(block, &mut block_buf)?;
            buf[bytes_read..bytes_read + chunk].copy_from_slice(&block_buf[offset..offset + chunk]);
            offset += chunk;
            bytes_read += chunk;
        }

        let open = self.open_files.get_mut(fd)?;
        open.current_block = current;
        open.offset_in_block = offset;
        Ok(bytes_read)
    }

    /// 追加写。写游标永远是 (末块, size % BLOCK_SIZE)，与 seek 设置的读游标无关。
    /// 空闲块耗尽时整个调用报 DiskFull，但已写入的前缀保留并落盘，不回滚。
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let open = self.open_files.get(fd)?;
        let dir_index = open.dir_index;
        if buf.is_empty() {
            return Ok(0);
        }

        let mut bytes_written = 0;
        let mut block_buf: Block = [0; BLOCK_SIZE];

        while bytes_written < buf.len() {
            let size = self.directory.entries[dir_index].file_size() as usize;
            let offset = size % BLOCK_SIZE;

            let target = if offset == 0 {
                // 逻辑大小正落在块边界：先挂一个新块
                match self.grow(fd, dir_index) {
                    Ok(block) => {
                        block_buf = [0; BLOCK_SIZE];
                        block
                    }
                    Err(e) => {
                        self.sync_metadata()?;
                        return Err(e);
                    }
                }
            } else {
                // 回读末块，保住未触碰的前缀
                let last = self.directory.entries[dir_index].last_block().ok_or_else(|| {
                    FileSystemError::Corrupted("nonzero file size with no last block".to_string())
                })?;
                self.disk.read_block(last, &mut block_buf)?;
                last
            };

            let chunk = (buf.len() - bytes_written).min(BLOCK_SIZE - offset);
            block_buf[offset..offset + chunk]
                .copy_from_slice(&buf[bytes_written..bytes_written + chunk]);
            self.disk.write_block(target, &block_buf)?;

            bytes_written += chunk;
            self.directory.entries[dir_index].set_file_size((size + chunk) as u32);
        }

        self.sync_metadata()?;
        Ok(bytes_written)
    }

    /// 给文件尾挂一个新分配的块；文件还没有块时同时建立首块。
    fn grow(&mut self, fd: usize, dir_index: usize) -> Result<BlockId> {
        let block = self.fat.allocate(&mut self.control_block)?;
        self.fat.set_next(block, None); // 弹出的表项不再意味着“下一空闲块”

        match self.directory.entries[dir_index].last_block() {
            Some(last) => self.fat.set_next(last, Some(block)),
            None => {
                // 空文件长出第一块：这把句柄的读游标也指过去
                let open = self.open_files.get_mut(fd)?;
                open.current_block = Some(block);
                open.offset_in_block = 0;
            }
        }

        let entry = &mut self.directory.entries[dir_index];
        if entry.first_block().is_none() {
            entry.set_first_block(Some(block));
        }
        entry.set_last_block(Some(block));
        Ok(block)
    }

    /// 重定位读游标。offset 截断到 [0, filesize]，返回实际生效的偏移。
    /// 只动读游标，对后续 write 没有任何影响。
    pub fn seek(&mut self, fd: usize, offset: u32) -> Result<u32> {
        let open = self.open_files.get(fd)?;
        let dir_index = open.dir_index;

        let entry = &self.directory.entries[dir_index];
        let effective = offset.min(entry.file_size());

        let Some(first) = entry.first_block() else {
            let open = self.open_files.get_mut(fd)?;
            open.current_block = None;
            open.offset_in_block = 0;
            return Ok(0);
        };

        let mut block = first;
        let mut remaining = effective as usize;
        while remaining > BLOCK_SIZE {
            block = self.fat.next(block).ok_or_else(|| {
                FileSystemError::Corrupted("file chain shorter than file size".to_string())
            })?;
            remaining -= BLOCK_SIZE;
        }

        // remaining 可以等于 BLOCK_SIZE：恰好整块的偏移停在该块的边界上
        let open = self.open_files.get_mut(fd)?;
        open.current_block = Some(block);
        open.offset_in_block = remaining;
        Ok(effective)
    }

    /// 截断到至多当前大小。释放边界块之后的整段链，
    /// 读游标重定位到新的文件末尾（等价于 seek 新大小）。
    pub fn truncate(&mut self, fd: usize, size: u32) -> Result<()> {
        let open = self.open_files.get(fd)?;
        let dir_index = open.dir_index;

        let current_size = self.directory.entries[dir_index].file_size();
        let new_size = size.min(current_size);

        let Some(first) = self.directory.entries[dir_index].first_block() else {
            return Ok(()); // 空文件没有链可截
        };
        let last = self.directory.entries[dir_index].last_block().ok_or_else(|| {
            FileSystemError::Corrupted("file has a first block but no last block".to_string())
        })?;

        if new_size == 0 {
            self.fat.release_chain(&mut self.control_block, first, last);
            let entry = &mut self.directory.entries[dir_index];
            entry.set_first_block(None);
            entry.set_last_block(None);
        } else {
            // 边界块：容纳第 new_size-1 个字节的那一块
            let mut boundary = first;
            for _ in 0..((new_size as usize - 1) / BLOCK_SIZE) {
                boundary = self.fat.next(boundary).ok_or_else(|| {
                    FileSystemError::Corrupted("file chain shorter than file size".to_string())
                })?;
            }

            if let Some(suffix_head) = self.fat.next(boundary) {
                self.fat.release_chain(&mut self.control_block, suffix_head, last);
            }
            self.fat.set_next(boundary, None);
            self.directory.entries[dir_index].set_last_block(Some(boundary));
        }

        self.directory.entries[dir_index].set_file_size(new_size);
        self.seek(fd, new_size)?;
        self.sync_metadata()?;
        Ok(())
    }

    /// 目录报表：已用槽位的 (文件名, 大小)
    pub fn list_files(&self) -> Vec<(String, u32)> {
        self.directory
            .entries
            .iter()
            .filter(|e| e.is_used())
            .map(|e| (e.name(), e.file_size()))
            .collect()
    }

    /// 链报表：每个文件占用的块号序列
    pub fn chains(&self) -> Vec<(String, Vec<BlockId>)> {
        self.directory
            .entries
            .iter()
            .filter(|e| e.is_used())
            .map(|e| (e.name(), self.fat.chain_from(e.first_block())))
            .collect()
    }

    /// 空闲链表上的块号序列（表头在前）
    pub fn free_blocks(&self) -> Vec<BlockId> {
        self.fat.chain_from(self.control_block.free_list_head())
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks().len()
    }

    pub fn block_count(&self) -> u64 {
        self.disk.block_count()
    }

    // 结构性变化后的统一落盘：目录 + FAT + 控制块
    fn sync_metadata(&self) -> Result<()> {
        self.directory.sync(&self.disk)?;
        self.fat.sync(&self.disk)?;
        self.control_block.sync(&self.disk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;

    fn mounted(blocks: u64) -> FileSystem<MemoryDisk> {
        let disk = MemoryDisk::new(blocks);
        FileSystem::format(&disk).expect("format");
        FileSystem::mount(disk).expect("mount")
    }

    #[test]
    fn create_open_write_read() {
        let mut fs = mounted(16);
        fs.create("hello").expect("create");
        let fd = fs.open("hello").expect("open");

        assert_eq!(fs.write(fd, b"hello world").expect("write"), 11);
        assert_eq!(fs.filesize(fd).expect("filesize"), 11);

        fs.seek(fd, 0).expect("seek");
        let mut buf = [0u8; 11];
        assert_eq!(fs.read(fd, &mut buf).expect("read"), 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn write_ignores_read_cursor() {
        let mut fs = mounted(16);
        fs.create("log").expect("create");
        let fd = fs.open("log").expect("open");

        fs.write(fd, b"aaaa").expect("write");
        fs.seek(fd, 1).expect("seek");
        // 写游标仍在逻辑末尾，seek 不影响它
        fs.write(fd, b"bbbb").expect("write");
        assert_eq!(fs.filesize(fd).expect("filesize"), 8);

        fs.seek(fd, 0).expect("seek");
        let mut buf = [0u8; 8];
        fs.read(fd, &mut buf).expect("read");
        assert_eq!(&buf, b"aaaabbbb");
    }

    #[test]
    fn read_stops_at_logical_end() {
        let mut fs = mounted(16);
        fs.create("f").expect("create");
        let fd = fs.open("f").expect("open");
        fs.write(fd, &[7u8; 10]).expect("write");

        fs.seek(fd, 0).expect("seek");
        let mut buf = [0u8; 64];
        assert_eq!(fs.read(fd, &mut buf).expect("read"), 10);
        // 游标停在末尾后再读一律 0
        assert_eq!(fs.read(fd, &mut buf).expect("read"), 0);
    }

    #[test]
    fn empty_and_degenerate_reads() {
        let mut fs = mounted(16);
        fs.create("empty").expect("create");
        let fd = fs.open("empty").expect("open");

        let mut buf = [0u8; 4];
        assert_eq!(fs.read(fd, &mut buf).expect("read"), 0);
        assert_eq!(fs.read(fd, &mut []).expect("read"), 0);
        assert_eq!(fs.seek(fd, 1000).expect("seek"), 0);
    }

    #[test]
    fn name_and_handle_errors() {
        let mut fs = mounted(16);
        fs.create("a").expect("create");

        assert!(matches!(
            fs.create("a"),
            Err(FileSystemError::AlreadyExists(_))
        ));
        assert!(matches!(fs.open("b"), Err(FileSystemError::NotFound(_))));
        assert!(matches!(
            fs.create(""),
            Err(FileSystemError::InvalidName(_))
        ));
        assert!(matches!(
            fs.filesize(3),
            Err(FileSystemError::InvalidHandle(3))
        ));

        let fd = fs.open("a").expect("open");
        assert!(matches!(fs.delete("a"), Err(FileSystemError::FileOpen(_))));
        fs.close(fd).expect("close");
        fs.delete("a").expect("delete");
    }

    #[test]
    fn directory_capacity_is_enforced() {
        let mut fs = mounted(1024);
        for i in 0..config::MAX_FILES {
            fs.create(&format!("file{}", i)).expect("create");
        }
        assert!(matches!(
            fs.create("one-too-many"),
            Err(FileSystemError::DirectoryFull)
        ));
    }

    #[test]
    fn seek_clamps_and_returns_effective_offset() {
        let mut fs = mounted(16);
        fs.create("f").expect("create");
        let fd = fs.open("f").expect("open");
        fs.write(fd, &[1u8; 100]).expect("write");

        assert_eq!(fs.seek(fd, 40).expect("seek"), 40);
        assert_eq!(fs.seek(fd, 5000).expect("seek"), 100);
    }
}
