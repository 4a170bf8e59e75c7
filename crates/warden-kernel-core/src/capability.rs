//! Capability store and wire encoding
//!
//! Capabilities are granted to a procedure at registration time and are
//! immutable until the procedure is deleted. They arrive as a flat,
//! self-describing word sequence and are decoded exactly once; the syscall
//! mediator only ever consults the decoded list.
//!
//! # Wire format
//!
//! Records are concatenated back-to-back. Each record is
//! `[len, tag, params...]` where `len` counts the words following it
//! (the tag included). An empty sequence grants no privileges.
//!
//! # Security Properties
//!
//! 1. **Fail Closed**: malformed input never decodes; an absent capability
//!    never authorizes
//! 2. **Union semantics**: an operation is authorized if *any* held
//!    capability of the relevant kind covers it

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{KernelError, Word, MAX_LOG_TOPICS};

/// Wire tag for write capabilities
pub const CAP_TYPE_WRITE: Word = 7;
/// Wire tag for log capabilities
pub const CAP_TYPE_LOG: Word = 8;

/// Authorizes writes to a contiguous storage region.
///
/// The region starts at `base` and spans `2^size_log` words. A `size_log`
/// of 64 or more covers everything from `base` upward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCap {
    /// First authorized address
    pub base: Word,
    /// Log2 of the number of authorized words
    pub size_log: Word,
}

impl WriteCap {
    /// Check whether this capability covers a concrete address.
    ///
    /// Authorization is per address: anything below `base` or beyond the
    /// declared span is outside, regardless of what else the region covers.
    pub fn covers(&self, addr: Word) -> bool {
        if addr < self.base {
            return false;
        }
        if self.size_log >= Word::BITS as Word {
            return true;
        }
        addr - self.base < (1u64 << self.size_log)
    }
}

/// Authorizes emission of a log record with an exact topic sequence.
///
/// An empty topic list authorizes only topicless emission. Otherwise the
/// attempted topics must match the declared list in length and value,
/// position by position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCap {
    /// Declared topic sequence, at most [`MAX_LOG_TOPICS`] entries
    pub topics: Vec<Word>,
}

impl LogCap {
    /// Check whether this capability covers an attempted emission.
    pub fn covers(&self, topics: &[Word]) -> bool {
        self.topics.as_slice() == topics
    }
}

/// A capability: a tagged, fixed-at-creation grant for one class of
/// privileged operation.
///
/// The enum is closed on purpose - the syscall mediator matches
/// exhaustively, so a new capability kind is a compile-checked extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Storage write grant
    Write(WriteCap),
    /// Log emission grant
    Log(LogCap),
}

impl Capability {
    /// The wire tag of this capability kind.
    pub fn tag(&self) -> Word {
        match self {
            Capability::Write(_) => CAP_TYPE_WRITE,
            Capability::Log(_) => CAP_TYPE_LOG,
        }
    }
}

/// The ordered capability list held by one procedure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapList(pub Vec<Capability>);

impl CapList {
    /// An empty list - no privileges.
    pub fn empty() -> Self {
        CapList(Vec::new())
    }

    /// Decode the flat registration-time word sequence.
    ///
    /// Splits the sequence into records purely from the length prefixes.
    /// Any structural defect rejects the whole sequence - a procedure is
    /// never registered with a partially decoded grant.
    pub fn decode(words: &[Word]) -> Result<Self, KernelError> {
        let mut caps = Vec::new();
        let mut cursor = 0usize;

        while cursor < words.len() {
            // compare in Word space so a huge prefix cannot overflow the cursor
            let remaining = (words.len() - cursor - 1) as Word;
            if words[cursor] == 0 || words[cursor] > remaining {
                return Err(KernelError::InvalidCapability);
            }
            let len = words[cursor] as usize;
            let tag = words[cursor + 1];
            let params = &words[cursor + 2..cursor + 1 + len];

            let cap = match tag {
                CAP_TYPE_WRITE => {
                    if params.len() != 2 {
                        return Err(KernelError::InvalidCapability);
                    }
                    Capability::Write(WriteCap {
                        base: params[0],
                        size_log: params[1],
                    })
                }
                CAP_TYPE_LOG => {
                    if params.len() > MAX_LOG_TOPICS {
                        return Err(KernelError::InvalidCapability);
                    }
                    Capability::Log(LogCap {
                        topics: params.to_vec(),
                    })
                }
                _ => return Err(KernelError::InvalidCapability),
            };

            caps.push(cap);
            cursor += 1 + len;
        }

        Ok(CapList(caps))
    }

    /// Re-encode into the flat wire form, for the table dump.
    pub fn encode(&self) -> Vec<Word> {
        let mut words = Vec::new();
        for cap in &self.0 {
            match cap {
                Capability::Write(w) => {
                    words.push(3);
                    words.push(CAP_TYPE_WRITE);
                    words.push(w.base);
                    words.push(w.size_log);
                }
                Capability::Log(l) => {
                    words.push(1 + l.topics.len() as Word);
                    words.push(CAP_TYPE_LOG);
                    words.extend_from_slice(&l.topics);
                }
            }
        }
        words
    }

    /// Check write authorization for a concrete address.
    ///
    /// Every held write capability is consulted; one match suffices.
    pub fn allows_write(&self, addr: Word) -> bool {
        self.0.iter().any(|cap| match cap {
            Capability::Write(w) => w.covers(addr),
            _ => false,
        })
    }

    /// Check log authorization for an attempted topic sequence.
    ///
    /// Every held log capability is consulted; one exact match suffices.
    pub fn allows_log(&self, topics: &[Word]) -> bool {
        self.0.iter().any(|cap| match cap {
            Capability::Log(l) => l.covers(topics),
            _ => false,
        })
    }

    /// Number of capabilities held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list grants nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
