//! Pure syscall mediation - the heart of the kernel core
//!
//! This module contains the pure `step(state, current, syscall)` function.
//! Every privileged operation issued by executing procedure code is routed
//! through it, evaluated against the capability list of the *currently
//! executing* procedure - never the original external caller.
//!
//! # Properties
//!
//! 1. **Deterministic**: same state + syscall always produces same result
//! 2. **Deny means no effect**: a denied write or emission leaves the
//!    state untouched and is repeatable with the same result
//! 3. **Allow means exactly once**: an approved effect is committed before
//!    the result is returned and is never rolled back by a later fault

use alloc::vec;
use alloc::vec::Vec;

use crate::state::KernelState;
use crate::types::{KernelError, LogRecord, ProcedureKey, Word, MAX_LOG_TOPICS};

/// Privileged (and near-privileged) operations a procedure may issue
/// while executing.
#[derive(Clone, Debug)]
pub enum Syscall {
    /// Read a storage word - not capability-gated
    Read { addr: Word },

    /// Write a storage word - requires a covering write capability
    Write { addr: Word, value: Word },

    /// Emit a log record - requires an exactly matching log capability
    Log { topics: Vec<Word>, data: Vec<u8> },
}

/// Syscall result - what the mediator returns to the issuing procedure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyscallResult {
    /// Success with value (read value, or zero)
    Ok(Word),
    /// Denial or fault
    Err(KernelError),
}

/// Result of one mediation step.
pub struct StepResult {
    /// The syscall result
    pub result: SyscallResult,
    /// Log records committed by this step
    pub emitted: Vec<LogRecord>,
}

impl StepResult {
    fn ok(value: Word) -> Self {
        Self {
            result: SyscallResult::Ok(value),
            emitted: vec![],
        }
    }

    fn err(e: KernelError) -> Self {
        Self {
            result: SyscallResult::Err(e),
            emitted: vec![],
        }
    }
}

/// Mediate one syscall issued by the procedure named `current`.
///
/// The capability list consulted is always the one fixed at `current`'s
/// registration; the effect is performed only on `Allow`.
pub fn step(state: &mut KernelState, current: &ProcedureKey, syscall: Syscall) -> StepResult {
    match syscall {
        Syscall::Read { addr } => StepResult::ok(state.read_word(addr)),
        Syscall::Write { addr, value } => step_write(state, current, addr, value),
        Syscall::Log { topics, data } => step_log(state, current, topics, data),
    }
}

fn step_write(
    state: &mut KernelState,
    current: &ProcedureKey,
    addr: Word,
    value: Word,
) -> StepResult {
    let allowed = match state.get_procedure(current) {
        Some(proc) => proc.caps.allows_write(addr),
        None => return StepResult::err(KernelError::NotFound),
    };

    if !allowed {
        return StepResult::err(KernelError::CapabilityDenied);
    }

    state.write_word(addr, value);
    StepResult::ok(0)
}

fn step_log(
    state: &mut KernelState,
    current: &ProcedureKey,
    topics: Vec<Word>,
    data: Vec<u8>,
) -> StepResult {
    let allowed = match state.get_procedure(current) {
        Some(proc) => proc.caps.allows_log(&topics),
        None => return StepResult::err(KernelError::NotFound),
    };

    // no capability can declare more than MAX_LOG_TOPICS topics, so an
    // over-long emission can never be allowed
    if topics.len() > MAX_LOG_TOPICS || !allowed {
        return StepResult::err(KernelError::CapabilityDenied);
    }

    StepResult {
        result: SyscallResult::Ok(0),
        emitted: vec![LogRecord { topics, data }],
    }
}
