use thiserror::Error;

/// Result alias used throughout the storage substrate.
pub type StorageResult<T> = Result<T, StorageError>;

/// Every failure mode the paged-file manager, buffer pool, and record
/// manager can report. Variants are mutually exclusive — callers match on
/// kind, never on message text.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("frame or metadata allocation failed")]
    OutOfMemory,

    #[error("all buffer frames are pinned, no victim available")]
    NoBuffer,

    #[error("page is already fixed in the buffer")]
    AlreadyFixed,

    #[error("page is not resident in the buffer")]
    NotInBuffer,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("incomplete read of page from file")]
    IncompleteRead,

    #[error("incomplete write of page to file")]
    IncompleteWrite,

    #[error("incomplete read of file header")]
    HeaderRead,

    #[error("incomplete write of file header")]
    HeaderWrite,

    #[error("invalid page number")]
    InvalidPage,

    #[error("file is already open")]
    FileOpen,

    #[error("open-file table is full")]
    FileTableFull,

    #[error("file handle is not live")]
    BadHandle,

    #[error("end of file")]
    Eof,

    #[error("page is already free")]
    PageFree,

    #[error("page is already unfixed")]
    PageUnfixed,

    #[error("page is fixed and cannot be released")]
    PageFixed,

    #[error("page identity is already resident in the buffer")]
    AlreadyInBuffer,

    #[error("invalid record identifier")]
    InvalidRid,

    #[error("output buffer is smaller than the record")]
    BufferTooSmall,

    #[error("file already exists")]
    AlreadyExists,

    #[error("record does not fit in an empty page")]
    RecordTooLarge,
}
