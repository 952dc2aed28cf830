//! Logical page allocation on top of the buffer pool: an open-file table,
//! per-file replacement policy, and an on-disk free list of disposed pages.

use std::fs::File;

use log::debug;

use crate::buffer::{BufferPool, Policy};
use crate::constants::{FREE_LIST_END, FTAB_SIZE, FileHandle, PAGE_SIZE, PageNo, USED};
use crate::disk;
use crate::disk::FileHeader;
use crate::error::{StorageError, StorageResult};

/// Tunable knobs for a [`PagedFileManager`]. `PAGE_SIZE` is a fixed constant,
/// not configurable, matching the spec's limits.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub buffer_capacity: usize,
    /// Number of files this manager can have open at once.
    pub ftab_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_capacity: 40,
            ftab_size: FTAB_SIZE,
        }
    }
}

struct FileTableSlot {
    name: String,
    file: File,
    header: FileHeader,
    header_dirty: bool,
    policy: Policy,
}

fn slot<'a>(ftab: &'a [Option<FileTableSlot>], h: FileHandle) -> StorageResult<&'a FileTableSlot> {
    ftab.get(h).and_then(|s| s.as_ref()).ok_or(StorageError::BadHandle)
}

fn slot_mut<'a>(
    ftab: &'a mut [Option<FileTableSlot>],
    h: FileHandle,
) -> StorageResult<&'a mut FileTableSlot> {
    ftab.get_mut(h).and_then(|s| s.as_mut()).ok_or(StorageError::BadHandle)
}

/// Owns the buffer pool and the table of currently open paged files.
pub struct PagedFileManager {
    pool: BufferPool,
    ftab: Vec<Option<FileTableSlot>>,
}

impl PagedFileManager {
    pub fn init(config: Config) -> Self {
        let mut ftab = Vec::with_capacity(config.ftab_size);
        ftab.resize_with(config.ftab_size, || None);
        Self {
            pool: BufferPool::new(config.buffer_capacity),
            ftab,
        }
    }

    /// Creates a new, empty paged file on disk. Does not open it.
    pub fn create_file(&self, name: &str) -> StorageResult<()> {
        disk::create(name)
    }

    /// Removes a paged file from disk. Fails with
    /// [`StorageError::FileOpen`] if `name` is currently open in this
    /// manager.
    pub fn destroy_file(&self, name: &str) -> StorageResult<()> {
        if self.ftab.iter().flatten().any(|s| s.name == name) {
            return Err(StorageError::FileOpen);
        }
        disk::destroy(name)
    }

    /// Opens a paged file under the given replacement policy, returning a
    /// handle for subsequent page operations. The handle is this crate's
    /// own open-file-table index, never a raw OS file descriptor, so the
    /// original C layer's stdio fd 0/1/2 collision avoidance has no
    /// counterpart to reimplement here.
    pub fn open_file(&mut self, name: &str, policy: Policy) -> StorageResult<FileHandle> {
        if self.ftab.iter().flatten().any(|s| s.name == name) {
            return Err(StorageError::FileOpen);
        }
        let h = self
            .ftab
            .iter()
            .position(|s| s.is_none())
            .ok_or(StorageError::FileTableFull)?;
        let (file, header) = disk::open(name)?;
        self.ftab[h] = Some(FileTableSlot {
            name: name.to_string(),
            file,
            header,
            header_dirty: false,
            policy,
        });
        debug!("pf: opened {name} as handle {h}");
        Ok(h)
    }

    /// Closes `handle`, flushing every resident frame and rewriting the
    /// header if it changed.
    pub fn close_file(&mut self, handle: FileHandle) -> StorageResult<()> {
        let file_for_write = slot(&self.ftab, handle)?.file.try_clone()?;
        self.pool
            .release_file(handle, |pn, raw| disk::write_page(&file_for_write, pn, raw))?;

        let s = slot_mut(&mut self.ftab, handle)?;
        if s.header_dirty {
            disk::rewrite_header(&s.file, s.header)?;
        }
        self.ftab[handle] = None;
        debug!("pf: closed handle {handle}");
        Ok(())
    }

    /// Returns the page at `page_no` if it is currently in use. Errors with
    /// [`StorageError::InvalidPage`] if the page number is out of range, or
    /// if it is in range but on the free list.
    pub fn get_this_page(
        &mut self,
        handle: FileHandle,
        page_no: PageNo,
    ) -> StorageResult<&mut [u8; PAGE_SIZE]> {
        let s = slot(&self.ftab, handle)?;
        if page_no < 0 || page_no >= s.header.numpages {
            return Err(StorageError::InvalidPage);
        }
        let policy = s.policy;
        let file = s.file.try_clone()?;
        self.pool.get(
            handle,
            page_no,
            policy,
            |pn, raw| disk::read_page(&file, pn, raw),
            |pn, raw| disk::write_page(&file, pn, raw),
        )?;
        if self.pool.link_for(handle, page_no)? != USED {
            self.pool.unfix(handle, page_no, false, policy)?;
            return Err(StorageError::InvalidPage);
        }
        self.pool.payload_mut_for(handle, page_no)
    }

    /// Starts a forward scan of used pages, equivalent to seeding
    /// `get_next_page` with page number `-1`.
    pub fn get_first_page(
        &mut self,
        handle: FileHandle,
    ) -> StorageResult<(PageNo, &mut [u8; PAGE_SIZE])> {
        let mut page_no = FREE_LIST_END;
        let buf = self.get_next_page(handle, &mut page_no)?;
        Ok((page_no, buf))
    }

    /// Advances `*page_no` to the next used page, skipping over free pages
    /// (unfixing each one it visits along the way). Errors with
    /// [`StorageError::Eof`] once there are no more pages.
    pub fn get_next_page(
        &mut self,
        handle: FileHandle,
        page_no: &mut PageNo,
    ) -> StorageResult<&mut [u8; PAGE_SIZE]> {
        let s = slot(&self.ftab, handle)?;
        let policy = s.policy;
        let numpages = s.header.numpages;
        let file = s.file.try_clone()?;
        loop {
            let next = *page_no + 1;
            if next >= numpages {
                return Err(StorageError::Eof);
            }
            self.pool.get(
                handle,
                next,
                policy,
                |pn, raw| disk::read_page(&file, pn, raw),
                |pn, raw| disk::write_page(&file, pn, raw),
            )?;
            if self.pool.link_for(handle, next)? == USED {
                *page_no = next;
                return self.pool.payload_mut_for(handle, next);
            }
            self.pool.unfix(handle, next, false, policy)?;
            *page_no = next;
        }
    }

    /// Allocates a new page: reuses the head of the on-disk free list if
    /// one exists, otherwise extends the file by one page.
    pub fn alloc_page(
        &mut self,
        handle: FileHandle,
    ) -> StorageResult<(PageNo, &mut [u8; PAGE_SIZE])> {
        let s = slot(&self.ftab, handle)?;
        let policy = s.policy;
        let firstfree = s.header.firstfree;
        let file = s.file.try_clone()?;

        let page_no = if firstfree != FREE_LIST_END {
            let page_no = firstfree;
            self.pool.get(
                handle,
                page_no,
                policy,
                |pn, raw| disk::read_page(&file, pn, raw),
                |pn, raw| disk::write_page(&file, pn, raw),
            )?;
            let next_free = self.pool.link_for(handle, page_no)?;
            slot_mut(&mut self.ftab, handle)?.header.firstfree = next_free;
            page_no
        } else {
            let page_no = slot(&self.ftab, handle)?.header.numpages;
            slot_mut(&mut self.ftab, handle)?.header.numpages += 1;
            self.pool
                .alloc(handle, page_no, policy, |pn, raw| disk::write_page(&file, pn, raw))?;
            page_no
        };

        slot_mut(&mut self.ftab, handle)?.header_dirty = true;
        self.pool.set_link_for(handle, page_no, USED)?;
        self.pool.mark_dirty(handle, page_no)?;
        debug!("pf: allocated page {page_no} on handle {handle}");
        Ok((page_no, self.pool.payload_mut_for(handle, page_no)?))
    }

    /// Returns `page_no` to the on-disk free list. The page must currently
    /// be fixed; it is unfixed dirty as part of disposal.
    pub fn dispose_page(&mut self, handle: FileHandle, page_no: PageNo) -> StorageResult<()> {
        let s = slot(&self.ftab, handle)?;
        if page_no < 0 || page_no >= s.header.numpages {
            return Err(StorageError::InvalidPage);
        }
        let policy = s.policy;
        let old_firstfree = s.header.firstfree;

        // Validate the page is fixed before mutating anything, so a
        // PageUnfixed error never leaves the free list half-updated.
        self.pool.mark_dirty(handle, page_no)?;
        if self.pool.link_for(handle, page_no)? != USED {
            return Err(StorageError::PageFree);
        }
        self.pool.set_link_for(handle, page_no, old_firstfree)?;
        slot_mut(&mut self.ftab, handle)?.header.firstfree = page_no;
        slot_mut(&mut self.ftab, handle)?.header_dirty = true;
        self.pool.unfix(handle, page_no, true, policy)?;
        debug!("pf: disposed page {page_no} on handle {handle}");
        Ok(())
    }

    /// Looks up the payload of a page this manager already believes is
    /// resident, without pinning it again. Used by callers that hold a
    /// page fixed across several logical operations (e.g. a record scan)
    /// and need repeated access without re-triggering `AlreadyFixed`.
    pub fn peek_page(&mut self, handle: FileHandle, page_no: PageNo) -> StorageResult<&mut [u8; PAGE_SIZE]> {
        slot(&self.ftab, handle)?;
        self.pool.payload_mut_for(handle, page_no)
    }

    /// Unpins a page, optionally marking it dirty.
    pub fn unfix_page(&mut self, handle: FileHandle, page_no: PageNo, dirty: bool) -> StorageResult<()> {
        let policy = slot(&self.ftab, handle)?.policy;
        self.pool.unfix(handle, page_no, dirty, policy)
    }

    /// Marks a pinned page dirty without unpinning it.
    pub fn mark_dirty(&mut self, handle: FileHandle, page_no: PageNo) -> StorageResult<()> {
        slot(&self.ftab, handle)?;
        self.pool.mark_dirty(handle, page_no)
    }

    pub fn logical_io(&self) -> u64 {
        self.pool.logical_io()
    }
    pub fn physical_io(&self) -> u64 {
        self.pool.physical_io()
    }
    pub fn disk_reads(&self) -> u64 {
        self.pool.disk_reads()
    }
    pub fn disk_writes(&self) -> u64 {
        self.pool.disk_writes()
    }
    pub fn reset_stats(&mut self) {
        self.pool.reset_stats()
    }
}
