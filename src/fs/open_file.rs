use crate::{
    disk::types::BlockId,
    fs::{
        config::MAX_OPEN_FILES,
        error::{FileSystemError, Result},
    },
};

/// 打开文件表项：目录下标 + 独立的读游标。
/// 对目录项的引用用数组下标表达（不是指针），表被整体重载也不会悬垂。
#[derive(Debug)]
pub struct OpenFile {
    pub dir_index: usize,
    pub current_block: Option<BlockId>,
    pub offset_in_block: usize, // 可以等于 BLOCK_SIZE：游标停在一个满块的边界上
}

/// 打开文件表：定容槽位数组，句柄就是槽位下标。
/// 同一文件允许多个句柄同时打开，各自的读游标互不影响。
#[derive(Debug)]
pub struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_OPEN_FILES).map(|_| None).collect(),
        }
    }

    /// 占用第一个空槽，游标指向文件首块、块内偏移 0
    pub fn open(&mut self, dir_index: usize, first_block: Option<BlockId>) -> Result<usize> {
        let fd = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(FileSystemError::OpenFileTableFull)?;

        self.slots[fd] = Some(OpenFile {
            dir_index,
            current_block: first_block,
            offset_in_block: 0,
        });
        Ok(fd)
    }

    /// 句柄校验对所有文件操作统一：越界或空槽都算无效句柄
    pub fn get(&self, fd: usize) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(|s| s.as_ref())
            .ok_or(FileSystemError::InvalidHandle(fd))
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(|s| s.as_mut())
            .ok_or(FileSystemError::InvalidHandle(fd))
    }

    /// 清空槽位，句柄随即可被复用
    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.get(fd)?;
        self.slots[fd] = None;
        Ok(())
    }

    /// 是否有任何句柄正引用该目录项（删除前必须检查）
    pub fn is_file_open(&self, dir_index: usize) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|open| open.dir_index == dir_index)
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_claimed_in_order_and_reused() {
        let mut table = OpenFileTable::new();
        let a = table.open(0, None).expect("open");
        let b = table.open(1, Some(7)).expect("open");
        assert_eq!((a, b), (0, 1));

        table.close(a).expect("close");
        assert_eq!(table.open(2, None).expect("open"), 0);
    }

    #[test]
    fn invalid_handles_are_rejected() {
        let mut table = OpenFileTable::new();
        assert!(matches!(
            table.get(0),
            Err(FileSystemError::InvalidHandle(0))
        ));
        assert!(matches!(
            table.get(MAX_OPEN_FILES + 1),
            Err(FileSystemError::InvalidHandle(_))
        ));

        let fd = table.open(0, None).expect("open");
        table.close(fd).expect("close");
        assert!(matches!(
            table.close(fd),
            Err(FileSystemError::InvalidHandle(_))
        ));
    }

    #[test]
    fn table_capacity_is_enforced() {
        let mut table = OpenFileTable::new();
        for i in 0..MAX_OPEN_FILES {
            table.open(i, None).expect("open");
        }
        assert!(matches!(
            table.open(99, None),
            Err(FileSystemError::OpenFileTableFull)
        ));
    }

    #[test]
    fn open_reference_blocks_by_dir_index() {
        let mut table = OpenFileTable::new();
        let fd1 = table.open(5, None).expect("open");
        let fd2 = table.open(5, None).expect("open");
        assert!(table.is_file_open(5));

        table.close(fd1).expect("close");
        assert!(table.is_file_open(5)); // 第二个句柄还在
        table.close(fd2).expect("close");
        assert!(!table.is_file_open(5));
    }
}
