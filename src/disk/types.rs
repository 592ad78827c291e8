/// 每个逻辑块（Block）的大小：4KB
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 块号类型：磁盘被看作一个定长的块数组，块号即数组下标。
/// FAT 表项也用同一类型编码“链上的下一块”。
pub type BlockId = u32;

/// 磁盘上表示“无块 / 链结束”的哨兵值。
/// 内存接口一律用 Option<BlockId>，只在编码/解码处出现该值。
pub const NO_BLOCK: BlockId = BlockId::MAX;

/// 默认虚拟磁盘大小：4MB = 1024 块
/// 镜像大小必须是 2 的幂。
pub const DEFAULT_DISK_SIZE: u64 = 4 * 1024 * 1024;

/// 定义一个逻辑块类型（每块 4KB 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];
