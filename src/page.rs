//! The on-disk page record: a 4-byte free-link word followed by the
//! `PAGE_SIZE` payload higher layers treat as opaque.

use crate::constants::{FREE_LIST_END, PAGE_SIZE, PageNo};

/// Size in bytes of one page's on-disk record (link word + payload).
pub const RAW_RECORD_SIZE: usize = 4 + PAGE_SIZE;

/// A page as it lives in a buffer frame: the free-link word plus the
/// payload bytes the record manager reads and writes directly.
#[derive(Clone)]
pub struct RawPage {
    pub link: PageNo,
    pub payload: [u8; PAGE_SIZE],
}

impl RawPage {
    pub fn zeroed() -> Self {
        Self {
            link: FREE_LIST_END,
            payload: [0u8; PAGE_SIZE],
        }
    }

    pub(crate) fn to_bytes(&self) -> [u8; RAW_RECORD_SIZE] {
        let mut buf = [0u8; RAW_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.link.to_le_bytes());
        buf[4..].copy_from_slice(&self.payload);
        buf
    }

    pub(crate) fn from_bytes(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), RAW_RECORD_SIZE);
        let mut link_bytes = [0u8; 4];
        link_bytes.copy_from_slice(&buf[0..4]);
        let mut payload = [0u8; PAGE_SIZE];
        payload.copy_from_slice(&buf[4..]);
        Self {
            link: PageNo::from_le_bytes(link_bytes),
            payload,
        }
    }
}

impl Default for RawPage {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut raw = RawPage::zeroed();
        raw.link = 7;
        raw.payload[0] = 0xAB;
        raw.payload[PAGE_SIZE - 1] = 0xCD;
        let bytes = raw.to_bytes();
        let back = RawPage::from_bytes(&bytes);
        assert_eq!(back.link, 7);
        assert_eq!(back.payload[0], 0xAB);
        assert_eq!(back.payload[PAGE_SIZE - 1], 0xCD);
    }
}
