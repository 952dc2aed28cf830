//! Raw page I/O against an OS file.
//!
//! Invariants:
//! - Offset 0 holds the file header: `{ firstfree: i32, numpages: i32 }`.
//! - Page `p`'s on-disk record starts at `HEADER_SIZE + p * RAW_RECORD_SIZE`
//!   and is a 4-byte free-link word followed by `PAGE_SIZE` payload bytes.
//! - A short read or write is an error, never silently retried.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::constants::{FREE_LIST_END, PageNo};
use crate::error::{StorageError, StorageResult};
use crate::page::{RAW_RECORD_SIZE, RawPage};

/// Size in bytes of the file header at offset 0.
pub const HEADER_SIZE: u64 = 8;

/// `{ firstfree, numpages }`, persisted at offset 0 of every paged file.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub firstfree: PageNo,
    pub numpages: i32,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.firstfree.to_le_bytes());
        buf[4..8].copy_from_slice(&self.numpages.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut firstfree_bytes = [0u8; 4];
        let mut numpages_bytes = [0u8; 4];
        firstfree_bytes.copy_from_slice(&buf[0..4]);
        numpages_bytes.copy_from_slice(&buf[4..8]);
        Self {
            firstfree: PageNo::from_le_bytes(firstfree_bytes),
            numpages: i32::from_le_bytes(numpages_bytes),
        }
    }
}

fn page_offset(page_no: PageNo) -> u64 {
    HEADER_SIZE + page_no as u64 * RAW_RECORD_SIZE as u64
}

/// Creates a new paged file with an empty header. Fails with
/// [`StorageError::AlreadyExists`] if `name` already exists.
pub fn create(name: &str) -> StorageResult<()> {
    if Path::new(name).exists() {
        return Err(StorageError::AlreadyExists);
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(name)?;
    write_header(&mut file, FileHeader {
        firstfree: FREE_LIST_END,
        numpages: 0,
    })?;
    Ok(())
}

/// Removes a paged file from disk.
pub fn destroy(name: &str) -> StorageResult<()> {
    std::fs::remove_file(name)?;
    Ok(())
}

/// Opens an existing paged file and reads its header.
pub fn open(name: &str) -> StorageResult<(File, FileHeader)> {
    let mut file = OpenOptions::new().read(true).write(true).open(name)?;
    let header = read_header(&mut file)?;
    Ok((file, header))
}

fn read_header(file: &mut File) -> StorageResult<FileHeader> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; HEADER_SIZE as usize];
    let n = file.read(&mut buf)?;
    if n != buf.len() {
        return Err(StorageError::HeaderRead);
    }
    Ok(FileHeader::from_bytes(&buf))
}

fn write_header(file: &mut File, header: FileHeader) -> StorageResult<()> {
    file.seek(SeekFrom::Start(0))?;
    let buf = header.to_bytes();
    let n = file.write(&buf)?;
    if n != buf.len() {
        return Err(StorageError::HeaderWrite);
    }
    Ok(())
}

/// Rewrites the file header, used whenever `firstfree`/`numpages` change.
pub fn rewrite_header(file: &File, header: FileHeader) -> StorageResult<()> {
    let mut file = file.try_clone()?;
    write_header(&mut file, header)
}

/// Reads page `page_no`'s on-disk record into `raw`.
pub fn read_page(file: &File, page_no: PageNo, raw: &mut RawPage) -> StorageResult<()> {
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(page_offset(page_no)))?;
    let mut buf = [0u8; RAW_RECORD_SIZE];
    let n = file.read(&mut buf)?;
    if n != buf.len() {
        return Err(StorageError::IncompleteRead);
    }
    *raw = RawPage::from_bytes(&buf);
    Ok(())
}

/// Writes page `page_no`'s on-disk record from `raw`.
pub fn write_page(file: &File, page_no: PageNo, raw: &RawPage) -> StorageResult<()> {
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(page_offset(page_no)))?;
    let buf = raw.to_bytes();
    let n = file.write(&buf)?;
    if n != buf.len() {
        return Err(StorageError::IncompleteWrite);
    }
    Ok(())
}
