//! Slotted-page record storage on top of the paged-file layer: stable
//! record identifiers, insert/delete/get, and forward scans.

use crate::buffer::Policy;
use crate::constants::{FREE_LIST_END, FileHandle, PAGE_SIZE, PageNo};
use crate::error::{StorageError, StorageResult};
use crate::paged_file::{Config, PagedFileManager};
use crate::record::{self, Rid};

/// Cursor for a forward scan over a record file's used pages and live
/// slots.
pub struct ScanHandle {
    last_page: PageNo,
    holding: bool,
    current_slot: i32,
}

impl ScanHandle {
    fn new() -> Self {
        Self {
            last_page: FREE_LIST_END,
            holding: false,
            current_slot: -1,
        }
    }
}

/// Owns a [`PagedFileManager`] and layers slotted-page record storage on
/// top of it.
pub struct RecordManager {
    pf: PagedFileManager,
}

impl RecordManager {
    pub fn init(config: Config) -> Self {
        Self {
            pf: PagedFileManager::init(config),
        }
    }

    pub fn create_file(&self, name: &str) -> StorageResult<()> {
        self.pf.create_file(name)
    }

    pub fn destroy_file(&self, name: &str) -> StorageResult<()> {
        self.pf.destroy_file(name)
    }

    pub fn open_file(&mut self, name: &str, policy: Policy) -> StorageResult<FileHandle> {
        self.pf.open_file(name, policy)
    }

    pub fn close_file(&mut self, handle: FileHandle) -> StorageResult<()> {
        self.pf.close_file(handle)
    }

    /// Inserts `data`, reusing a tombstoned slot or a page with enough
    /// contiguous free space before extending the file with a new page.
    pub fn insert_record(&mut self, handle: FileHandle, data: &[u8]) -> StorageResult<Rid> {
        let max_on_empty_page = PAGE_SIZE as i32 - record::PAGE_HEADER_SIZE as i32 - record::SLOT_SIZE as i32;
        if data.len() as i32 > max_on_empty_page {
            return Err(StorageError::RecordTooLarge);
        }

        let mut cursor = FREE_LIST_END;
        let (page_no, reuse_slot) = loop {
            let fetch = if cursor == FREE_LIST_END {
                self.pf.get_first_page(handle)
            } else {
                let mut pn = cursor;
                self.pf.get_next_page(handle, &mut pn).map(|buf| (pn, buf))
            };
            match fetch {
                Ok((pn, buf)) => {
                    cursor = pn;
                    let nslots = record::num_slots(buf);
                    let mut reuse_slot = None;
                    for s in 0..nslots {
                        if record::get_slot(buf, s).1 == record::TOMBSTONE {
                            reuse_slot = Some(s);
                            break;
                        }
                    }
                    let space_needed = data.len() as i32
                        + if reuse_slot.is_none() { record::SLOT_SIZE as i32 } else { 0 };
                    if record::contiguous_free_space(buf) >= space_needed {
                        break (cursor, reuse_slot);
                    }
                    self.pf.unfix_page(handle, cursor, false)?;
                }
                Err(StorageError::Eof) => {
                    let (pn, buf) = self.pf.alloc_page(handle)?;
                    record::init_page(buf);
                    break (pn, None);
                }
                Err(e) => return Err(e),
            }
        };

        let buf = self.pf.peek_page(handle, page_no)?;
        let offset = record::free_space_offset(buf);
        buf[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        let slot_no = match reuse_slot {
            Some(s) => {
                record::set_slot(buf, s, offset, data.len() as i32);
                s
            }
            None => {
                let s = record::num_slots(buf);
                record::set_slot(buf, s, offset, data.len() as i32);
                record::set_num_slots(buf, s + 1);
                s
            }
        };
        record::set_free_space_offset(buf, offset + data.len() as i32);
        self.pf.unfix_page(handle, page_no, true)?;
        Ok(Rid { page_no, slot_no })
    }

    /// Deletes the record at `rid`, tombstoning its slot and compacting the
    /// record area. The slot directory itself never shrinks.
    pub fn delete_record(&mut self, handle: FileHandle, rid: Rid) -> StorageResult<()> {
        let buf = match self.pf.get_this_page(handle, rid.page_no) {
            Ok(buf) => buf,
            Err(StorageError::InvalidPage) => return Err(StorageError::InvalidRid),
            Err(e) => return Err(e),
        };
        let nslots = record::num_slots(buf);
        if rid.slot_no < 0 || rid.slot_no >= nslots {
            self.pf.unfix_page(handle, rid.page_no, false)?;
            return Err(StorageError::InvalidRid);
        }
        let (offset, length) = record::get_slot(buf, rid.slot_no);
        if length == record::TOMBSTONE {
            self.pf.unfix_page(handle, rid.page_no, false)?;
            return Err(StorageError::InvalidRid);
        }

        let free_off = record::free_space_offset(buf);
        let tail_start = (offset + length) as usize;
        let tail_len = free_off as usize - tail_start;
        buf.copy_within(tail_start..tail_start + tail_len, offset as usize);
        for s in 0..nslots {
            if s == rid.slot_no {
                continue;
            }
            let (o, l) = record::get_slot(buf, s);
            if l != record::TOMBSTONE && o > offset {
                record::set_slot(buf, s, o - length, l);
            }
        }
        record::set_slot(buf, rid.slot_no, 0, record::TOMBSTONE);
        record::set_free_space_offset(buf, free_off - length);
        self.pf.unfix_page(handle, rid.page_no, true)?;
        Ok(())
    }

    /// Copies the record at `rid` into `out`, returning its length. Errors
    /// with [`StorageError::BufferTooSmall`] if `out` can't hold it.
    pub fn get_record(&mut self, handle: FileHandle, rid: Rid, out: &mut [u8]) -> StorageResult<usize> {
        let buf = match self.pf.get_this_page(handle, rid.page_no) {
            Ok(buf) => buf,
            Err(StorageError::InvalidPage) => return Err(StorageError::InvalidRid),
            Err(e) => return Err(e),
        };
        let nslots = record::num_slots(buf);
        if rid.slot_no < 0 || rid.slot_no >= nslots {
            self.pf.unfix_page(handle, rid.page_no, false)?;
            return Err(StorageError::InvalidRid);
        }
        let (offset, length) = record::get_slot(buf, rid.slot_no);
        if length == record::TOMBSTONE {
            self.pf.unfix_page(handle, rid.page_no, false)?;
            return Err(StorageError::InvalidRid);
        }
        if out.len() < length as usize {
            self.pf.unfix_page(handle, rid.page_no, false)?;
            return Err(StorageError::BufferTooSmall);
        }
        out[..length as usize].copy_from_slice(&buf[offset as usize..offset as usize + length as usize]);
        self.pf.unfix_page(handle, rid.page_no, false)?;
        Ok(length as usize)
    }

    pub fn open_scan(&self, _handle: FileHandle) -> ScanHandle {
        ScanHandle::new()
    }

    /// Advances the scan to the next live record, copying it into `out`.
    /// Errors with [`StorageError::Eof`] once the file is exhausted.
    pub fn get_next_record(
        &mut self,
        handle: FileHandle,
        scan: &mut ScanHandle,
        out: &mut [u8],
    ) -> StorageResult<Rid> {
        loop {
            if !scan.holding {
                let page_no = if scan.last_page == FREE_LIST_END {
                    self.pf.get_first_page(handle).map(|(pn, _)| pn)?
                } else {
                    let mut pn = scan.last_page;
                    self.pf.get_next_page(handle, &mut pn)?;
                    pn
                };
                scan.last_page = page_no;
                scan.holding = true;
                scan.current_slot = -1;
            }

            let page_no = scan.last_page;
            let buf = self.pf.peek_page(handle, page_no)?;
            let nslots = record::num_slots(buf);
            scan.current_slot += 1;
            if scan.current_slot >= nslots {
                self.pf.unfix_page(handle, page_no, false)?;
                scan.holding = false;
                continue;
            }

            let (offset, length) = record::get_slot(buf, scan.current_slot);
            if length == record::TOMBSTONE {
                continue;
            }
            if out.len() < length as usize {
                return Err(StorageError::BufferTooSmall);
            }
            out[..length as usize].copy_from_slice(&buf[offset as usize..offset as usize + length as usize]);
            return Ok(Rid { page_no, slot_no: scan.current_slot });
        }
    }

    /// Closes a scan, unfixing whatever page it still holds.
    pub fn close_scan(&mut self, handle: FileHandle, scan: ScanHandle) -> StorageResult<()> {
        if scan.holding {
            self.pf.unfix_page(handle, scan.last_page, false)?;
        }
        Ok(())
    }

    pub fn logical_io(&self) -> u64 {
        self.pf.logical_io()
    }
    pub fn physical_io(&self) -> u64 {
        self.pf.physical_io()
    }
    pub fn disk_reads(&self) -> u64 {
        self.pf.disk_reads()
    }
    pub fn disk_writes(&self) -> u64 {
        self.pf.disk_writes()
    }
    pub fn reset_stats(&mut self) {
        self.pf.reset_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestContext {
        path: String,
    }

    impl TestContext {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("slotstore-rm-{name}-{}", std::process::id()))
                .to_string_lossy()
                .into_owned();
            let _ = std::fs::remove_file(&path);
            Self { path }
        }
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let ctx = TestContext::new("insert-get");
        let mut rm = RecordManager::init(Config::default());
        rm.create_file(&ctx.path).unwrap();
        let h = rm.open_file(&ctx.path, Policy::Lru).unwrap();

        let rid = rm.insert_record(h, b"hello world").unwrap();
        let mut buf = [0u8; 32];
        let n = rm.get_record(h, rid, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");

        rm.close_file(h).unwrap();
    }

    #[test]
    fn delete_then_get_is_invalid_rid() {
        let ctx = TestContext::new("delete-get");
        let mut rm = RecordManager::init(Config::default());
        rm.create_file(&ctx.path).unwrap();
        let h = rm.open_file(&ctx.path, Policy::Lru).unwrap();

        let rid = rm.insert_record(h, b"gone soon").unwrap();
        rm.delete_record(h, rid).unwrap();
        let mut buf = [0u8; 32];
        match rm.get_record(h, rid, &mut buf) {
            Err(StorageError::InvalidRid) => {}
            other => panic!("expected InvalidRid, got {other:?}"),
        }
        rm.close_file(h).unwrap();
    }

    #[test]
    fn delete_compacts_and_later_insert_reuses_freed_space() {
        let ctx = TestContext::new("delete-compact");
        let mut rm = RecordManager::init(Config::default());
        rm.create_file(&ctx.path).unwrap();
        let h = rm.open_file(&ctx.path, Policy::Lru).unwrap();

        let r1 = rm.insert_record(h, b"aaaaaaaaaa").unwrap();
        let r2 = rm.insert_record(h, b"bbbbbbbbbb").unwrap();
        rm.delete_record(h, r1).unwrap();

        let mut buf = [0u8; 32];
        let n = rm.get_record(h, r2, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"bbbbbbbbbb");

        rm.close_file(h).unwrap();
    }

    #[test]
    fn scan_skips_tombstones_and_returns_all_live_records() {
        let ctx = TestContext::new("scan");
        let mut rm = RecordManager::init(Config::default());
        rm.create_file(&ctx.path).unwrap();
        let h = rm.open_file(&ctx.path, Policy::Lru).unwrap();

        let r1 = rm.insert_record(h, b"one").unwrap();
        let _r2 = rm.insert_record(h, b"two").unwrap();
        let r3 = rm.insert_record(h, b"three").unwrap();
        rm.delete_record(h, r1).unwrap();

        let mut scan = rm.open_scan(h);
        let mut found = Vec::new();
        loop {
            let mut buf = [0u8; 32];
            match rm.get_next_record(h, &mut scan, &mut buf) {
                Ok(rid) => found.push(rid),
                Err(StorageError::Eof) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        rm.close_scan(h, scan).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&r3));

        rm.close_file(h).unwrap();
    }
}
