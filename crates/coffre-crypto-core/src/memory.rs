//! Secure memory types for key material and decrypted fields.
//!
//! This module provides:
//! - [`SecretBytes`]: fixed-size heap-pinned secret (keys), zeroized on drop
//! - [`SecretBuffer`]: variable-length secret (decrypted plaintext), zeroized on drop
//! - [`LockedRegion`]: RAII `mlock` guard so secrets are not swapped to disk
//!
//! # Limitations
//!
//! Zeroization here is **best-effort**. The guarantees stop at what Rust
//! itself can see:
//! - bytes copied out through [`SecretBytes::expose`] / [`SecretBuffer::expose`]
//!   into caller-owned buffers are the caller's responsibility;
//! - the allocator may have moved or duplicated a buffer before it reached
//!   these types (e.g. a `Vec` that grew);
//! - pages may already have been swapped out before `mlock` succeeded, and
//!   `mlock` silently degrades when `RLIMIT_MEMLOCK` is exhausted.
//!
//! None of these types can promise that no copy of a key survives anywhere
//! in process memory; they promise that *their own* storage is overwritten
//! before it is released.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Platform-specific memory locking
// ---------------------------------------------------------------------------

/// RAII guard that unlocks memory on drop.
///
/// Locks a memory region via `mlock` when created and calls `munlock` when
/// dropped. The region must outlive the guard; both secret types below keep
/// their bytes on the heap so the address is stable for the guard's lifetime.
pub struct LockedRegion {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: The pointer is only handed to mlock/munlock, which are thread-safe.
// The pointed-to bytes are owned by SecretBuffer/SecretBytes and are never
// read or written through LockedRegion.
unsafe impl Send for LockedRegion {}
unsafe impl Sync for LockedRegion {}

impl LockedRegion {
    /// Attempt to lock a memory region. Returns a guard that unlocks on drop.
    ///
    /// A failed `mlock` is a soft failure: the guard reports `is_locked() ==
    /// false` and a one-time warning is printed.
    #[must_use]
    pub(crate) fn try_lock(ptr: *const u8, len: usize) -> Self {
        let locked = platform::try_mlock(ptr, len);
        if !locked && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                eprintln!(
                    "[coffre-crypto-core] WARNING: mlock failed: \
                     key material may be swapped to disk. \
                     Consider raising RLIMIT_MEMLOCK."
                );
            });
        }
        Self { ptr, len, locked }
    }

    const fn unlocked() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            locked: false,
        }
    }

    /// Returns `true` if the memory region is currently locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// `munlock` the region now. Idempotent.
    ///
    /// Owners call this while the covered storage is still allocated.
    pub(crate) fn release(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
            self.locked = false;
        }
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer: variable-length
// ---------------------------------------------------------------------------

/// Variable-length buffer for sensitive data (decrypted credential fields).
///
/// Wraps [`SecretSlice<u8>`] from the `secrecy` crate, which zeroizes the
/// allocation on drop, and adds `mlock` plus a masked `Debug`.
pub struct SecretBuffer {
    // Fields drop in declaration order: the guard must go before `inner`.
    lock: LockedRegion,
    inner: SecretSlice<u8>,
}

impl SecretBuffer {
    /// Copy `data` into a new locked, zeroize-on-drop allocation.
    ///
    /// The caller should zeroize the source after calling this.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let lock = LockedRegion::try_lock(exposed.as_ptr(), exposed.len());
        Ok(Self { lock, inner })
    }

    /// Expose the underlying bytes. Keep the borrow short.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Returns the number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the underlying memory is `mlock`'d.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N>: fixed-size
// ---------------------------------------------------------------------------

/// Fixed-size secret (root keys, master keys).
///
/// The bytes live in a `Box` so their address survives moves of the
/// `SecretBytes` value itself; the `mlock` guard therefore covers the real
/// storage for the whole lifetime. Zeroized on drop and on explicit
/// [`Zeroize::zeroize`].
pub struct SecretBytes<const N: usize> {
    // Fields drop in declaration order: the guard must go before `bytes`.
    lock: LockedRegion,
    bytes: Box<[u8; N]>,
}

impl<const N: usize> SecretBytes<N> {
    /// Move `data` into a new heap allocation and lock it.
    ///
    /// The array passed by value is a stack copy; callers holding another
    /// copy should zeroize it.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let bytes = Box::new(data);
        let lock = LockedRegion::try_lock(bytes.as_ptr(), N);
        Self { lock, bytes }
    }

    /// Copy a slice of exactly `N` bytes into a new `SecretBytes`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if `data.len() != N`.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != N {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "expected {N} bytes, got {}",
                data.len()
            )));
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(data);
        let result = Self::new(arr);
        arr.zeroize();
        Ok(result)
    }

    /// Fill a new `SecretBytes` from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut out = Self {
            lock: LockedRegion::unlocked(),
            bytes: Box::new([0u8; N]),
        };
        OsRng
            .try_fill_bytes(out.bytes.as_mut_slice())
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        out.lock = LockedRegion::try_lock(out.bytes.as_ptr(), N);
        Ok(out)
    }

    /// Expose the underlying bytes for a cryptographic operation.
    #[must_use]
    pub fn expose(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Returns `true` if the underlying memory is `mlock`'d.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl<const N: usize> Zeroize for SecretBytes<N> {
    fn zeroize(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }
}

impl<const N: usize> Drop for SecretBytes<N> {
    fn drop(&mut self) {
        self.zeroize();
        self.lock.release();
    }
}

impl<const N: usize> ZeroizeOnDrop for SecretBytes<N> {}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Platform-specific implementations
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any pointer/length pair; an invalid range is
        // reported as ENOMEM, which we treat as "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock is safe to call. Failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_buffer_new_stores_correct_content() {
        let data = b"decrypted username";
        let buf = SecretBuffer::new(data).expect("allocation should succeed");
        assert_eq!(buf.expose(), data);
        assert_eq!(buf.len(), data.len());
        assert!(!buf.is_empty());
    }

    #[test]
    fn secret_buffer_empty() {
        let buf = SecretBuffer::new(b"").expect("allocation should succeed");
        assert!(buf.is_empty());
    }

    #[test]
    fn secret_buffer_debug_is_masked() {
        let buf = SecretBuffer::new(b"hunter2").expect("allocation should succeed");
        let debug = format!("{buf:?}");
        assert_eq!(debug, "SecretBuffer(***)");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn secret_bytes_new_and_expose_roundtrip() {
        let data: [u8; 32] = [0xAB; 32];
        let key = SecretBytes::new(data);
        assert_eq!(key.expose(), &data);
    }

    #[test]
    fn secret_bytes_random_is_unique() {
        let a = SecretBytes::<32>::random().expect("random should succeed");
        let b = SecretBytes::<32>::random().expect("random should succeed");
        assert_ne!(a.expose(), b.expose());
        assert!(a.expose().iter().any(|&b| b != 0));
    }

    #[test]
    fn secret_bytes_from_slice_checks_length() {
        assert!(SecretBytes::<32>::from_slice(&[1u8; 32]).is_ok());
        let err = SecretBytes::<32>::from_slice(&[1u8; 31]).expect_err("short slice");
        assert!(matches!(err, CryptoError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn secret_bytes_explicit_zeroize_clears_bytes() {
        let mut key = SecretBytes::new([0x5A; 32]);
        key.zeroize();
        assert_eq!(key.expose(), &[0u8; 32]);
    }

    #[test]
    fn secret_bytes_address_is_stable_across_moves() {
        let key = SecretBytes::new([0x11; 16]);
        let before = key.expose().as_ptr();
        let moved = Some(key);
        let after = moved.as_ref().map(|k| k.expose().as_ptr());
        assert_eq!(Some(before), after);
    }

    #[test]
    fn secret_bytes_debug_is_masked() {
        let key = SecretBytes::<32>::new([0xFF; 32]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretBytes<32>(***)");
        assert!(!debug.to_lowercase().contains("ff"));
    }

    #[test]
    fn locked_region_release_is_idempotent() {
        let data = Box::new([0x42u8; 64]);
        let mut region = LockedRegion::try_lock(data.as_ptr(), data.len());
        region.release();
        assert!(!region.is_locked());
        region.release();
        assert!(!region.is_locked());
        assert_eq!(*data, [0x42u8; 64]);
    }

    #[test]
    fn dropping_neighbours_leaves_live_key_intact() {
        let keep = SecretBytes::<32>::new([0x77; 32]);
        let was_locked = keep.is_mlocked();
        for i in 0..64u8 {
            let neighbour = SecretBytes::<32>::new([i; 32]);
            assert_eq!(neighbour.expose(), &[i; 32]);
            let buf = SecretBuffer::new(&[i; 48]).expect("allocation should succeed");
            drop(buf);
        }
        assert_eq!(keep.expose(), &[0x77; 32]);
        assert_eq!(keep.is_mlocked(), was_locked);
    }

    #[cfg(unix)]
    #[test]
    fn mlock_status_is_reported() {
        let key = SecretBytes::<32>::new([0x01; 32]);
        let _is_locked = key.is_mlocked();
        let buf = SecretBuffer::new(b"mlock probe").expect("allocation should succeed");
        let _is_locked = buf.is_mlocked();
    }
}
