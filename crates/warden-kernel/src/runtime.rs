//! Procedure runtime trait
//!
//! This module defines the `ProcedureRuntime` trait that allows the kernel
//! to execute procedure images on different backends (interpreter, JIT,
//! native test doubles) by abstracting code loading and invocation.
//!
//! Executing code never touches `KernelState` directly: every privileged
//! operation goes through the `SyscallPort` handed to `invoke`, and the
//! port routes it through the core mediator.

use alloc::vec::Vec;

use warden_kernel_core::{KernelError, Word};

/// A fault raised by executing procedure code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcedureFault {
    /// The entry selector named no exported entry point
    UnknownSelector,
    /// The code trapped (out-of-bounds access, explicit abort, bad image)
    Trap,
    /// A syscall issued by the code was refused by the mediator
    Syscall(KernelError),
}

/// Syscall surface handed to executing procedure code.
///
/// Object-safe so runtime backends can take it as `&mut dyn SyscallPort`.
pub trait SyscallPort {
    /// Read a storage word. Not capability-gated, never fails.
    fn read(&mut self, addr: Word) -> Word;

    /// Write a storage word, gated by the current procedure's write caps.
    fn write(&mut self, addr: Word, value: Word) -> Result<(), KernelError>;

    /// Emit a log record, gated by the current procedure's log caps.
    fn log(&mut self, topics: Vec<Word>, data: Vec<u8>) -> Result<(), KernelError>;
}

/// Procedure execution backend
///
/// Implementations provide backend-specific functionality for:
/// - Validating and loading procedure code into an executable image
/// - Invoking an entry point of a loaded image
///
/// # Associated Types
///
/// - `Image`: Backend-specific representation of loaded code
pub trait ProcedureRuntime {
    /// A loaded, executable procedure image
    type Image;

    /// Validate and load procedure code.
    ///
    /// # Returns
    /// * `Ok(Image)` - Code accepted and loaded
    /// * `Err(ProcedureFault::Trap)` - Code rejected by the backend
    fn load(&mut self, code: &[u8]) -> Result<Self::Image, ProcedureFault>;

    /// Invoke an entry point of a loaded image.
    ///
    /// The `selector` names the entry point, `payload` is its argument
    /// data, and all privileged operations go through `port`.
    ///
    /// # Returns
    /// * `Ok(data)` - Return data from the invoked entry point
    /// * `Err(fault)` - The code faulted; effects committed through `port`
    ///   before the fault remain in force
    fn invoke(
        &mut self,
        image: &Self::Image,
        selector: &[u8],
        payload: &[u8],
        port: &mut dyn SyscallPort,
    ) -> Result<Vec<u8>, ProcedureFault>;
}
