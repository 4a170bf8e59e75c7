//! Core kernel types
//!
//! This module contains the fundamental types used throughout the kernel core.
//! All types here are pure data - no behavior that touches the runtime.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::capability::CapList;

/// The machine word of the kernel: capability wire format, storage
/// addresses, storage values and log topics are all words.
pub type Word = u64;

/// Maximum procedure key length in bytes
pub const MAX_KEY_LEN: usize = 24;

/// Maximum number of topics a log record may carry
pub const MAX_LOG_TOPICS: usize = 4;

/// Maximum number of simultaneously live procedures
pub const MAX_PROCEDURES: usize = 255;

/// Procedure identifier: at most 24 bytes, zero-padded on the right.
///
/// A key is never empty - construction rejects empty and over-long input,
/// so every `ProcedureKey` in the system is valid by construction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcedureKey([u8; MAX_KEY_LEN]);

impl ProcedureKey {
    /// Build a key from raw bytes, validating length.
    pub fn new(bytes: &[u8]) -> Result<Self, KernelError> {
        if bytes.is_empty() || bytes.len() > MAX_KEY_LEN {
            return Err(KernelError::InvalidKey);
        }
        let mut padded = [0u8; MAX_KEY_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(ProcedureKey(padded))
    }

    /// Build a key from an already zero-padded 24-byte field.
    ///
    /// An all-zero field is the empty key and is rejected.
    pub fn from_padded(padded: [u8; MAX_KEY_LEN]) -> Result<Self, KernelError> {
        if padded.iter().all(|&b| b == 0) {
            return Err(KernelError::InvalidKey);
        }
        Ok(ProcedureKey(padded))
    }

    /// The full zero-padded 24-byte field.
    pub fn as_bytes(&self) -> &[u8; MAX_KEY_LEN] {
        &self.0
    }

    /// The key bytes without trailing zero padding.
    pub fn trimmed(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.0[..end]
    }
}

impl core::fmt::Display for ProcedureKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.trimmed()) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.trimmed() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl core::fmt::Debug for ProcedureKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ProcedureKey({})", self)
    }
}

/// Handle to a deployed procedure image.
///
/// Location 0 is the null sentinel: lookups that miss return it and no
/// live procedure is ever stored at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeLocation(pub u64);

impl CodeLocation {
    /// The null sentinel
    pub const NULL: CodeLocation = CodeLocation(0);

    /// Check whether this is the null sentinel
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Procedure table entry: key, code location and the capability list
/// fixed at registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    /// Procedure key
    pub key: ProcedureKey,
    /// Where the image was deployed
    pub location: CodeLocation,
    /// Capabilities granted at registration; immutable afterwards
    pub caps: CapList,
}

/// An emitted event: up to four topic words plus opaque data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Topic words, in emission order
    pub topics: Vec<Word>,
    /// Opaque payload
    pub data: Vec<u8>,
}

/// Kernel errors, with the numeric codes external callers observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelError {
    /// Key is empty or exceeds the maximum length
    InvalidKey,
    /// No live procedure matches the key
    NotFound,
    /// A live procedure already uses the key
    DuplicateKey,
    /// Invoked code failed or the entry selector was unrecognized
    ExecutionFault,
    /// A privileged operation was attempted without sufficient capability
    CapabilityDenied,
    /// The capability sequence supplied at registration is malformed
    InvalidCapability,
    /// The procedure is the designated entry procedure and cannot be deleted
    EntryProcedure,
    /// The procedure table is full
    TableFull,
}

impl KernelError {
    /// Numeric error code returned to external callers.
    pub fn code(&self) -> u32 {
        match self {
            KernelError::InvalidKey => 1,
            KernelError::NotFound => 2,
            KernelError::DuplicateKey => 3,
            KernelError::ExecutionFault => 4,
            KernelError::CapabilityDenied => 5,
            KernelError::InvalidCapability => 6,
            KernelError::EntryProcedure => 7,
            KernelError::TableFull => 8,
        }
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            KernelError::InvalidKey => "invalid procedure key",
            KernelError::NotFound => "procedure not found",
            KernelError::DuplicateKey => "procedure key already in use",
            KernelError::ExecutionFault => "procedure execution fault",
            KernelError::CapabilityDenied => "capability denied",
            KernelError::InvalidCapability => "malformed capability sequence",
            KernelError::EntryProcedure => "entry procedure cannot be deleted",
            KernelError::TableFull => "procedure table full",
        };
        f.write_str(msg)
    }
}

/// One entry of the introspectable procedure-table dump.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcedureTableEntry {
    /// Procedure key
    pub key: ProcedureKey,
    /// Position in registration order
    pub index: usize,
    /// Code location
    pub location: CodeLocation,
    /// Decoded capability list
    pub caps: CapList,
}
