//! Instruction cache model.
//!
//! Not a performance device: the cache exists to catch hosts that patch the
//! code stream without telling the simulator. Pages are created lazily and
//! never evicted; a flush only marks lines INVALID, and the next fetch
//! through an INVALID line repopulates it from memory. A fetch through a
//! VALID line whose bytes differ from memory is a host bug and faults.

use std::collections::HashMap;

use ppc_asm::INSTRUCTION_BYTES;

use crate::fault::Fault;
use crate::memory::SimMemory;

/// Cache page size.
pub const PAGE_BYTES: usize = 4096;
const PAGE_OFFSET_MASK: u32 = PAGE_BYTES as u32 - 1;

/// Cache line size.
pub const LINE_BYTES: usize = 32;
const LINE_SHIFT: u32 = LINE_BYTES.trailing_zeros();
const LINE_OFFSET_MASK: u32 = LINE_BYTES as u32 - 1;

const LINES_PER_PAGE: usize = PAGE_BYTES / LINE_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Invalid,
    Valid,
}

#[derive(Debug)]
struct CachePage {
    data: Box<[u8; PAGE_BYTES]>,
    validity: [LineState; LINES_PER_PAGE],
}

impl CachePage {
    fn new() -> Self {
        Self {
            data: Box::new([0; PAGE_BYTES]),
            validity: [LineState::Invalid; LINES_PER_PAGE],
        }
    }
}

/// Per-simulator instruction cache keyed by page-aligned address.
#[derive(Debug, Default)]
pub struct InstructionCache {
    pages: HashMap<u32, CachePage>,
}

impl InstructionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every line overlapping `[start, start + size)` INVALID.
    pub fn flush(&mut self, start: u32, size: u32) {
        if size == 0 {
            return;
        }
        // Round down to the containing line and up to a whole number of
        // lines, then walk page by page.
        let intra_line = start & LINE_OFFSET_MASK;
        let mut start = start - intra_line;
        let mut size = ((size + intra_line - 1) | LINE_OFFSET_MASK) + 1;
        while size > 0 {
            let offset = start & PAGE_OFFSET_MASK;
            let chunk = size.min(PAGE_BYTES as u32 - offset);
            self.flush_within_page(start, chunk);
            start += chunk;
            size -= chunk;
        }
    }

    fn flush_within_page(&mut self, start: u32, size: u32) {
        debug_assert_eq!(start & LINE_OFFSET_MASK, 0);
        debug_assert_eq!(size & LINE_OFFSET_MASK, 0);
        let page = self.page(start & !PAGE_OFFSET_MASK);
        let first_line = ((start & PAGE_OFFSET_MASK) >> LINE_SHIFT) as usize;
        let lines = (size >> LINE_SHIFT) as usize;
        for state in &mut page.validity[first_line..first_line + lines] {
            *state = LineState::Invalid;
        }
    }

    fn page(&mut self, page_address: u32) -> &mut CachePage {
        debug_assert_eq!(page_address & PAGE_OFFSET_MASK, 0);
        self.pages.entry(page_address).or_insert_with(CachePage::new)
    }

    /// Verifies the fetch at `address` against the cache.
    ///
    /// On an INVALID line the line is reloaded from memory and marked VALID.
    /// On a VALID line the cached word must equal memory.
    ///
    /// # Errors
    ///
    /// [`Fault::StaleCacheLine`] when a VALID line disagrees with memory,
    /// and [`Fault::MemoryOutOfRange`] when the fetch itself is out of range.
    pub fn check(&mut self, address: u32, memory: &SimMemory) -> Result<(), Fault> {
        let word_in_memory = memory.read_u32(address)?;
        let offset = (address & PAGE_OFFSET_MASK) as usize;
        let line_offset = offset & !(LINE_OFFSET_MASK as usize);
        let line_address = address & !LINE_OFFSET_MASK;
        let line_index = offset >> LINE_SHIFT;

        let page = self.page(address & !PAGE_OFFSET_MASK);
        match page.validity[line_index] {
            LineState::Valid => {
                let mut cached = [0; INSTRUCTION_BYTES as usize];
                cached.copy_from_slice(&page.data[offset..offset + INSTRUCTION_BYTES as usize]);
                let cached = u32::from_le_bytes(cached);
                if cached != word_in_memory {
                    return Err(Fault::StaleCacheLine {
                        addr: address,
                        cached,
                        memory: word_in_memory,
                    });
                }
            }
            LineState::Invalid => {
                let line_end = line_address as usize + LINE_BYTES;
                if line_end > memory.len() {
                    return Err(Fault::MemoryOutOfRange {
                        addr: line_address,
                        size: LINE_BYTES as u32,
                    });
                }
                let line = &memory.as_bytes()[line_address as usize..line_end];
                page.data[line_offset..line_offset + LINE_BYTES].copy_from_slice(line);
                page.validity[line_index] = LineState::Valid;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InstructionCache, LINE_BYTES, PAGE_BYTES};
    use crate::fault::Fault;
    use crate::memory::SimMemory;

    fn memory() -> SimMemory {
        SimMemory::new(64 * 1024, 16 * 1024)
    }

    #[test]
    fn miss_populates_and_hit_verifies() {
        let mut mem = memory();
        let mut cache = InstructionCache::new();
        mem.write_u32(0x1000, 0x6000_0000).unwrap();

        cache.check(0x1000, &mem).unwrap();
        cache.check(0x1000, &mem).unwrap();
    }

    #[test]
    fn silent_patch_of_a_valid_line_faults() {
        let mut mem = memory();
        let mut cache = InstructionCache::new();
        mem.write_u32(0x1000, 0x6000_0000).unwrap();
        cache.check(0x1000, &mem).unwrap();

        mem.write_u32(0x1000, 0x4800_0000).unwrap();
        assert_eq!(
            cache.check(0x1000, &mem),
            Err(Fault::StaleCacheLine {
                addr: 0x1000,
                cached: 0x6000_0000,
                memory: 0x4800_0000,
            })
        );
    }

    #[test]
    fn flush_revalidates_a_patched_line() {
        let mut mem = memory();
        let mut cache = InstructionCache::new();
        mem.write_u32(0x1000, 0x6000_0000).unwrap();
        cache.check(0x1000, &mem).unwrap();

        mem.write_u32(0x1000, 0x4800_0000).unwrap();
        cache.flush(0x1000, 4);
        cache.check(0x1000, &mem).unwrap();
    }

    #[test]
    fn flush_is_line_granular() {
        let mut mem = memory();
        let mut cache = InstructionCache::new();
        let in_line = 0x1000;
        let next_line = in_line + LINE_BYTES as u32;
        mem.write_u32(in_line, 1).unwrap();
        mem.write_u32(next_line, 2).unwrap();
        cache.check(in_line, &mem).unwrap();
        cache.check(next_line, &mem).unwrap();

        // Patch both, flush only the first line: its neighbor stays VALID
        // and must fault.
        mem.write_u32(in_line, 3).unwrap();
        mem.write_u32(next_line, 4).unwrap();
        cache.flush(in_line, 4);
        cache.check(in_line, &mem).unwrap();
        assert!(matches!(
            cache.check(next_line, &mem),
            Err(Fault::StaleCacheLine { .. })
        ));
    }

    #[test]
    fn flush_spans_page_boundaries() {
        let mut mem = memory();
        let mut cache = InstructionCache::new();
        let last_in_page = PAGE_BYTES as u32 - 4;
        let first_in_next = PAGE_BYTES as u32;
        mem.write_u32(last_in_page, 1).unwrap();
        mem.write_u32(first_in_next, 2).unwrap();
        cache.check(last_in_page, &mem).unwrap();
        cache.check(first_in_next, &mem).unwrap();

        mem.write_u32(last_in_page, 3).unwrap();
        mem.write_u32(first_in_next, 4).unwrap();
        cache.flush(last_in_page, 8);
        cache.check(last_in_page, &mem).unwrap();
        cache.check(first_in_next, &mem).unwrap();
    }
}
