//! Guest Memory Window
//!
//! The store reads guest memory only to sample 8-byte fingerprint words
//! ([`crate::descriptor::SurfaceDescriptor::test`] and friends) and never
//! writes it. Reads are unsynchronized with guest CPU writes on purpose:
//! the fingerprint is a probabilistic staleness detector, not a coherence
//! primitive, so a torn read legitimately resolves as "dirty".

/// Byte-addressable view of guest memory.
///
/// Addresses are 32-bit guest physical addresses. Fingerprint sampling only
/// ever issues 8-byte-aligned reads by construction, so implementations may
/// assume natural alignment but must not require it.
pub trait GuestMemory {
    /// Read the 64-bit word at `address`.
    ///
    /// The read is plain (non-atomic). Out-of-window addresses must yield a
    /// stable value rather than fault; `0` is the conventional choice.
    fn read_qword(&self, address: u32) -> u64;
}

/// Flat little-endian window starting at guest address 0.
///
/// Reads that run past the end of the slice yield 0.
impl GuestMemory for [u8] {
    fn read_qword(&self, address: u32) -> u64 {
        let start = address as usize;
        let Some(bytes) = start.checked_add(8).and_then(|end| self.get(start..end)) else {
            return 0;
        };
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        u64::from_le_bytes(word)
    }
}

impl GuestMemory for Vec<u8> {
    fn read_qword(&self, address: u32) -> u64 {
        self.as_slice().read_qword(address)
    }
}
