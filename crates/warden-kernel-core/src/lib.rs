//! Warden Kernel Core - Pure State Machine for the Procedure Kernel
//!
//! This crate contains the **pure, runtime-free** kernel state machine: the
//! procedure registry, the capability store, and the syscall mediator.
//!
//! # Design Principles
//!
//! 1. **No runtime dependency**: procedure execution lives in `warden-kernel`
//! 2. **No I/O or side effects**: pure state transformations only
//! 3. **Deterministic**: same input always produces same output
//! 4. **Fail closed**: an operation without a covering capability is denied
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   warden-kernel-core                        │
//! │                 (Pure State Machine)                        │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │  KernelState  │    │    step()     │                   │
//! │   │  - procedures │───▶│  Syscall      │                   │
//! │   │  - storage    │    │  mediator     │                   │
//! │   │  - entry_proc │    └───────────────┘                   │
//! │   └───────────────┘                                         │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │  Capability   │    │  Invariants   │                   │
//! │   │  CapList      │    │  Assertions   │                   │
//! │   └───────────────┘    └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     warden-kernel                           │
//! │                  (Runtime Wrapper)                          │
//! │                                                             │
//! │   - Procedure execution via the ProcedureRuntime seam       │
//! │   - Entry/fallback request routing                          │
//! │   - Execution receipts and structured logging               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Core kernel types (ProcedureKey, CodeLocation, KernelError)
//! - `capability` - Capability tokens, wire codec and authorization checks
//! - `state` - KernelState struct with the procedure table and storage
//! - `step` - Pure `step(state, current, syscall)` mediation function
//! - `invariants` - Runtime-checkable invariant assertions

#![no_std]
extern crate alloc;

pub mod capability;
pub mod invariants;
pub mod state;
pub mod step;
pub mod types;

// Re-export all public types for convenient access
pub use capability::{CapList, Capability, LogCap, WriteCap, CAP_TYPE_LOG, CAP_TYPE_WRITE};
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use state::KernelState;
pub use step::{step, StepResult, Syscall, SyscallResult};
pub use types::{
    CodeLocation, KernelError, LogRecord, Procedure, ProcedureKey, ProcedureTableEntry, Word,
    MAX_KEY_LEN, MAX_LOG_TOPICS, MAX_PROCEDURES,
};
