use crate::JitError;
use memmap2::{Mmap, MmapMut};

/// Finished machine code, sealed read+execute.
///
/// Publishing follows the W^X two-phase scheme: the code is copied into a
/// private anonymous writable mapping, then the mapping is flipped to
/// read+execute. The pages are never writable and executable at once, and
/// they stay mapped until the owning engine is dropped, so the raw entry
/// pointers handed out by [`entry`](Self::entry) remain valid for the
/// lifetime of this object.
#[derive(Debug)]
pub struct ExecutableMemory {
    map: Mmap,
    len: usize,
}

impl ExecutableMemory {
    /// Copy `code` into fresh pages and seal them executable.
    pub fn publish(code: &[u8]) -> Result<Self, JitError> {
        let page = page_size();
        let len = code.len().max(1);
        let mut writable = MmapMut::map_anon(round_up(len, page))?;
        writable[..code.len()].copy_from_slice(code);
        let map = writable.make_exec()?;
        log::trace!("published {} code bytes at {:p}", code.len(), map.as_ptr());
        Ok(Self {
            map,
            len: code.len(),
        })
    }

    /// Number of code bytes published (the mapping itself is page-rounded).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw pointer to the instruction at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is out of bounds.
    #[inline]
    pub fn entry(&self, offset: usize) -> *const u8 {
        assert!(offset < self.map.len());
        unsafe { self.map.as_ptr().add(offset) }
    }

    /// The published bytes, for diagnostics.
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.map[..self.len]
    }
}

fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

fn round_up(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_retains_bytes() {
        let code = [0xC3u8, 0x90, 0xCC];
        let mem = ExecutableMemory::publish(&code).unwrap();
        assert_eq!(mem.code(), &code);
        assert_eq!(mem.len(), 3);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn published_code_is_callable() {
        // mov eax, 7; ret
        let code = [0xB8, 0x07, 0x00, 0x00, 0x00, 0xC3];
        let mem = ExecutableMemory::publish(&code).unwrap();
        let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(mem.entry(0)) };
        assert_eq!(f(), 7);
    }
}
