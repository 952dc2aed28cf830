//! Fixed sizing constants shared across the disk, buffer, paged-file and
//! record layers.

/// Size in bytes of the opaque page payload handed up to the record manager.
pub const PAGE_SIZE: usize = 4096;

/// Number of simultaneously open files the paged-file manager tracks.
pub const FTAB_SIZE: usize = 20;

/// Legacy sizing hint from the original fixed chained hash table; the
/// in-memory page table is a `HashMap` now so this only documents the
/// historical capacity this crate is sized to match.
pub const HASH_BUCKETS: usize = 20;

/// A page number used internally to identify the unallocated tail of the
/// on-disk free list.
pub const FREE_LIST_END: PageNo = -1;

/// Written into a page's free-link word once the page holds live data, so
/// `getFirstPage`/`getNextPage` can tell used pages apart from free ones.
pub const USED: PageNo = -2;

/// Logical page number. Signed so the free-list sentinels fit alongside
/// real page numbers.
pub type PageNo = i32;

/// Opaque handle into the paged-file manager's open-file table.
pub type FileHandle = usize;
