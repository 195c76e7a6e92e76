//! A bump allocator backing the engine's scratch and result data.
//!
//! An [`Arena`] is a single contiguous byte buffer with a high-water mark. Individual
//! regions are never freed; the whole arena is dropped at once. This keeps exemplar
//! metadata and the sequence bytes it owns adjacent in memory, and makes the Pass-1 ->
//! `finalize` transition a single deallocation instead of a sweep over millions of
//! individually-freed records.

use log::debug;

/// An offset into an [`Arena`]'s backing buffer.
///
/// `Addr` is a plain byte offset rather than a pointer so that arena regions remain
/// valid across any reallocation-free lifetime of the arena; it carries no borrow of
/// the arena itself; callers must read it back through the same [`Arena`] it came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Addr(usize);

impl Addr {
    /// The sentinel returned when an allocation fails.
    pub fn null() -> Self { Addr(usize::MAX) }

    /// True if this address is the null sentinel.
    pub fn is_null(&self) -> bool { self.0 == usize::MAX }
}

const ALIGN: usize = 8;

/// A bump allocator with a fixed capacity, 8-byte-aligned allocations, and no
/// per-region deallocation.
///
/// Allocation past `capacity` returns [`Addr::null`] rather than panicking or growing:
/// per spec, the engine degrades gracefully when memory runs out rather than aborting
/// a batch job over a single oversized record.
pub struct Arena {
    buffer: Vec<u8>,
    mark: usize,
    capacity: usize,
}

impl Arena {
    /// Creates a new arena that can hold up to `capacity` bytes.
    ///
    /// # Panics
    /// Panics if the backing allocation fails. Use [`try_new`](Self::try_new) at the
    /// public `create` surface, where an allocation failure must be reported as
    /// `OUT_OF_MEMORY` rather than aborting the process.
    pub fn new(capacity: usize) -> Self {
        Self::try_new(capacity).expect("arena allocation failed")
    }

    /// Creates a new arena that can hold up to `capacity` bytes, returning `Err` instead
    /// of aborting the process if the backing allocation cannot be reserved.
    pub fn try_new(capacity: usize) -> Result<Self, ()> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity).map_err(|_| ())?;
        buffer.resize(capacity, 0u8);
        Ok(Arena { buffer, mark: 0, capacity })
    }

    /// Number of bytes currently in use (the high-water mark).
    pub fn bytes_used(&self) -> usize { self.mark }

    /// Total capacity of this arena, in bytes.
    pub fn capacity(&self) -> usize { self.capacity }

    fn aligned_mark(&self) -> usize { (self.mark + (ALIGN - 1)) & !(ALIGN - 1) }

    /// Reserves `n` bytes, 8-byte aligned, and returns their start address.
    ///
    /// Returns [`Addr::null`] when the arena is exhausted; the caller is expected to
    /// treat this as a soft failure (see module docs).
    pub fn alloc(&mut self, n: usize) -> Addr {
        let start = self.aligned_mark();
        let end = match start.checked_add(n) {
            Some(end) => end,
            None => return Addr::null(),
        };
        if end > self.capacity {
            debug!("arena exhausted: requested {} bytes, {} of {} already used", n, self.mark, self.capacity);
            return Addr::null();
        }
        self.mark = end;
        Addr(start)
    }

    /// Copies `bytes` into the arena and appends a trailing zero byte, returning the
    /// start address of the copy. The zero terminator lets callers hand out `&[u8]`
    /// slices that are also safely usable as C-style strings at the public surface,
    /// without requiring every internal consumer to track an explicit length.
    pub fn dup_bytes(&mut self, bytes: &[u8]) -> Addr {
        let addr = self.alloc(bytes.len() + 1);
        if addr.is_null() {
            return addr;
        }
        let start = addr.0;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
        self.buffer[start + bytes.len()] = 0;
        addr
    }

    /// Returns the `len` bytes stored at `addr` (excluding any trailing terminator
    /// written by [`dup_bytes`](Self::dup_bytes)).
    pub fn slice(&self, addr: Addr, len: usize) -> &[u8] {
        &self.buffer[addr.0..addr.0 + len]
    }

    /// Returns the bytes written by [`dup_bytes`](Self::dup_bytes) at `addr`, reading
    /// up to (but excluding) the trailing zero byte.
    pub fn read_dup(&self, addr: Addr) -> &[u8] {
        let start = addr.0;
        let rest = &self.buffer[start..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        &rest[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_respects_capacity() {
        let mut arena = Arena::new(16);
        let a = arena.alloc(8);
        assert!(!a.is_null());
        let b = arena.alloc(8);
        assert!(!b.is_null());
        // arena is now full; a third allocation must fail gracefully
        let c = arena.alloc(1);
        assert!(c.is_null());
    }

    #[test]
    fn alloc_is_eight_byte_aligned() {
        let mut arena = Arena::new(64);
        let _ = arena.alloc(3);
        let b = arena.alloc(1);
        // b must start on an 8-byte boundary even though the first alloc was 3 bytes
        assert_eq!(arena.bytes_used() - 1 /* b's own length */, 8);
        let _ = b;
    }

    #[test]
    fn dup_bytes_roundtrips_and_terminates() {
        let mut arena = Arena::new(64);
        let addr = arena.dup_bytes(b"read-1");
        assert_eq!(arena.read_dup(addr), b"read-1");
        assert_eq!(arena.slice(addr, 6), b"read-1");
    }

    #[test]
    fn oversized_alloc_returns_null_without_panicking() {
        let mut arena = Arena::new(4);
        let addr = arena.dup_bytes(b"too long for this arena");
        assert!(addr.is_null());
        assert_eq!(arena.bytes_used(), 0);
    }
}
