//! Warden Kernel - capability-secured procedure kernel runtime
//!
//! This crate wraps the pure state machine from `warden-kernel-core` with:
//! - Procedure code loading and execution via the `ProcedureRuntime` seam
//! - Syscall mediation for executing code through `SyscallPort`
//! - Entry/fallback routing of raw request frames
//! - Execution receipts and a committed-log journal
//!
//! The wrapper holds no policy of its own: every privileged operation a
//! procedure performs is decided by the core `step` mediator against the
//! capability list fixed at that procedure's registration.

#![no_std]
extern crate alloc;

pub mod kernel;
pub mod runtime;

pub use kernel::{ExecutionReceipt, Kernel};
pub use runtime::{ProcedureFault, ProcedureRuntime, SyscallPort};

// Re-export the core types callers need alongside the kernel
pub use warden_kernel_core::{
    CapList, Capability, CodeLocation, KernelError, KernelState, LogCap, LogRecord, Procedure,
    ProcedureKey, ProcedureTableEntry, Word, WriteCap, CAP_TYPE_LOG, CAP_TYPE_WRITE, MAX_KEY_LEN,
    MAX_LOG_TOPICS, MAX_PROCEDURES,
};
