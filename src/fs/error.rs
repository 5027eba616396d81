use thiserror::Error;

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error), // 底层 I/O 错误

    #[error("block codec error: {0}")]
    Codec(#[from] bincode::Error), // 块内容编解码失败

    #[error("a file system is already mounted")]
    AlreadyMounted,

    #[error("no file system mounted")]
    NotMounted,

    #[error("bad magic number on superblock: {found:#010x}")]
    BadMagic { found: u32 },

    #[error("invalid inode: {0}")]
    InvalidInode(u32),

    #[error("no free inode available")]
    NoFreeInode,

    #[error("disk space is full")]
    DeviceFull,

    #[error("logical block {0} exceeds the addressable file span")]
    OutOfRange(u32),

    #[error("file system corrupted: {0}")]
    Corrupted(String),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
