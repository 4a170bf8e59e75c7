//! The kernel wrapper - registry, dispatch and routing around the pure core
//!
//! `Kernel` owns the pure `KernelState` together with a procedure runtime
//! and the loaded images. All mutations flow through its public methods,
//! and everything executing code does to kernel state goes through the
//! core `step` mediator via a `SyscallPort`.
//!
//! The public surface takes raw key bytes: validation happens here, so an
//! empty or over-long key is rejected with `InvalidKey` before any state
//! is touched.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use warden_kernel_core::{
    step, CapList, CodeLocation, KernelError, KernelState, LogRecord, Procedure, ProcedureKey,
    ProcedureTableEntry, Syscall, SyscallResult, Word, MAX_KEY_LEN,
};

use crate::runtime::{ProcedureFault, ProcedureRuntime, SyscallPort};

/// Outcome of a completed procedure execution.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionReceipt {
    /// The procedure that ran
    pub key: ProcedureKey,
    /// Return data from the invoked entry point
    pub return_data: Vec<u8>,
    /// Log records committed during this execution
    pub logs: Vec<LogRecord>,
}

/// Syscall port backed by the kernel state and the core mediator.
///
/// Holds the identity of the currently executing procedure so every
/// privileged operation is judged against that procedure's capabilities.
struct StatePort<'a> {
    state: &'a mut KernelState,
    current: ProcedureKey,
    emitted: Vec<LogRecord>,
}

impl SyscallPort for StatePort<'_> {
    fn read(&mut self, addr: Word) -> Word {
        match step(self.state, &self.current, Syscall::Read { addr }).result {
            SyscallResult::Ok(value) => value,
            SyscallResult::Err(_) => 0,
        }
    }

    fn write(&mut self, addr: Word, value: Word) -> Result<(), KernelError> {
        let result = step(self.state, &self.current, Syscall::Write { addr, value });
        match result.result {
            SyscallResult::Ok(_) => Ok(()),
            SyscallResult::Err(e) => {
                log::debug!("write to {:#x} by {} denied: {}", addr, self.current, e);
                Err(e)
            }
        }
    }

    fn log(&mut self, topics: Vec<Word>, data: Vec<u8>) -> Result<(), KernelError> {
        let mut result = step(self.state, &self.current, Syscall::Log { topics, data });
        self.emitted.append(&mut result.emitted);
        match result.result {
            SyscallResult::Ok(_) => Ok(()),
            SyscallResult::Err(e) => {
                log::debug!("log emission by {} denied: {}", self.current, e);
                Err(e)
            }
        }
    }
}

/// The kernel, generic over the procedure runtime.
///
/// The `state` field is intentionally private: external callers reach it
/// only through the registry and dispatch methods below, which keep the
/// procedure table, the loaded images and the capability store in sync.
pub struct Kernel<R: ProcedureRuntime> {
    /// Pure kernel state (procedure table, storage, entry designation)
    state: KernelState,
    /// Execution backend
    runtime: R,
    /// Loaded images, keyed by code location
    images: BTreeMap<CodeLocation, R::Image>,
    /// All log records ever committed, in commit order
    journal: Vec<LogRecord>,
}

impl<R: ProcedureRuntime> Kernel<R> {
    /// Create a new kernel with the given runtime.
    pub fn new(runtime: R) -> Self {
        Self {
            state: KernelState::new(),
            runtime,
            images: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    /// Read-only access to the pure state.
    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// All log records committed since boot, in commit order.
    pub fn journal(&self) -> &[LogRecord] {
        &self.journal
    }

    // ========================================================================
    // Registry operations
    // ========================================================================

    /// Register a procedure: validate the key, decode the capability
    /// sequence, load the code and enter it into the table.
    ///
    /// All-or-nothing: any failure leaves the kernel unchanged.
    pub fn create_procedure(
        &mut self,
        key_bytes: &[u8],
        code: &[u8],
        cap_words: &[Word],
    ) -> Result<CodeLocation, KernelError> {
        let key = ProcedureKey::new(key_bytes)?;
        let caps = CapList::decode(cap_words)?;
        if self.state.contains(&key) {
            return Err(KernelError::DuplicateKey);
        }

        let image = self
            .runtime
            .load(code)
            .map_err(|_| KernelError::ExecutionFault)?;
        let location = self.state.register_procedure(key, caps)?;
        self.images.insert(location, image);

        log::debug!("registered procedure {} at location {}", key, location.0);
        Ok(location)
    }

    /// Look up a procedure's code location. Side-effect free; a key that is
    /// invalid or names no live procedure yields the null sentinel.
    pub fn procedure_location(&self, key_bytes: &[u8]) -> CodeLocation {
        match ProcedureKey::new(key_bytes) {
            Ok(key) => self
                .state
                .get_procedure(&key)
                .map(|p| p.location)
                .unwrap_or(CodeLocation::NULL),
            Err(_) => CodeLocation::NULL,
        }
    }

    /// Look up a procedure's full table entry.
    pub fn get_procedure(&self, key_bytes: &[u8]) -> Option<&Procedure> {
        let key = ProcedureKey::new(key_bytes).ok()?;
        self.state.get_procedure(&key)
    }

    /// Live procedure keys in registration order.
    pub fn list_procedures(&self) -> Vec<ProcedureKey> {
        self.state.list_keys()
    }

    /// Remove a procedure, drop its image and return the freed location.
    pub fn delete_procedure(&mut self, key_bytes: &[u8]) -> Result<CodeLocation, KernelError> {
        let key = ProcedureKey::new(key_bytes)?;
        let removed = self.state.remove_procedure(&key)?;
        self.images.remove(&removed.location);
        log::debug!("removed procedure {}", key);
        Ok(removed.location)
    }

    // ========================================================================
    // Entry procedure
    // ========================================================================

    /// Designate the entry/fallback procedure.
    pub fn set_entry_procedure(&mut self, key_bytes: &[u8]) -> Result<(), KernelError> {
        let key = ProcedureKey::new(key_bytes)?;
        self.state.set_entry_procedure(key)?;
        log::debug!("entry procedure set to {}", key);
        Ok(())
    }

    /// Clear the entry-procedure designation.
    pub fn clear_entry_procedure(&mut self) {
        self.state.clear_entry_procedure();
    }

    /// The designated entry procedure, if any.
    pub fn entry_procedure(&self) -> Option<ProcedureKey> {
        self.state.entry_procedure()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute an entry point of a registered procedure.
    ///
    /// Effects committed through the syscall port before a fault remain in
    /// force; the fault only aborts what would have come after it.
    pub fn execute_procedure(
        &mut self,
        key_bytes: &[u8],
        selector: &[u8],
        payload: &[u8],
    ) -> Result<ExecutionReceipt, KernelError> {
        let key = ProcedureKey::new(key_bytes)?;
        self.execute_key(key, selector, payload)
    }

    fn execute_key(
        &mut self,
        key: ProcedureKey,
        selector: &[u8],
        payload: &[u8],
    ) -> Result<ExecutionReceipt, KernelError> {
        let location = self
            .state
            .get_procedure(&key)
            .ok_or(KernelError::NotFound)?
            .location;
        let image = self
            .images
            .get(&location)
            .ok_or(KernelError::ExecutionFault)?;

        let mut port = StatePort {
            state: &mut self.state,
            current: key,
            emitted: Vec::new(),
        };
        let outcome = self.runtime.invoke(image, selector, payload, &mut port);

        // Everything the port committed stays committed, fault or not
        let logs = port.emitted;
        self.journal.extend(logs.iter().cloned());

        match outcome {
            Ok(return_data) => Ok(ExecutionReceipt {
                key,
                return_data,
                logs,
            }),
            Err(ProcedureFault::Syscall(e)) => {
                log::debug!("procedure {} aborted on refused syscall: {}", key, e);
                Err(e)
            }
            Err(fault) => {
                log::debug!("procedure {} faulted: {:?}", key, fault);
                Err(KernelError::ExecutionFault)
            }
        }
    }

    // ========================================================================
    // Raw request routing
    // ========================================================================

    /// Route a raw request frame.
    ///
    /// Frame convention: 24 key bytes, one selector-length byte, the
    /// selector, then the payload. A frame whose key names a live procedure
    /// is routed to it; everything else goes to the entry procedure with an
    /// empty selector and the whole frame as payload.
    pub fn dispatch_raw(&mut self, frame: &[u8]) -> Result<ExecutionReceipt, KernelError> {
        if frame.len() > MAX_KEY_LEN {
            let mut padded = [0u8; MAX_KEY_LEN];
            padded.copy_from_slice(&frame[..MAX_KEY_LEN]);
            if let Ok(key) = ProcedureKey::from_padded(padded) {
                if self.state.contains(&key) {
                    let sel_len = frame[MAX_KEY_LEN] as usize;
                    let sel_start = MAX_KEY_LEN + 1;
                    if frame.len() >= sel_start + sel_len {
                        let selector = &frame[sel_start..sel_start + sel_len];
                        let payload = &frame[sel_start + sel_len..];
                        return self.execute_key(key, selector, payload);
                    }
                    // selector overruns the frame: unparseable, fall through
                }
            }
        }

        let entry = self.state.entry_procedure().ok_or(KernelError::NotFound)?;
        log::debug!("routing unmatched frame to entry procedure {}", entry);
        self.execute_key(entry, &[], frame)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Unprivileged storage read.
    pub fn read_word(&self, addr: Word) -> Word {
        self.state.read_word(addr)
    }

    /// Structured procedure-table dump, in enumeration order.
    pub fn procedure_table(&self) -> Vec<ProcedureTableEntry> {
        self.state.procedure_table()
    }

    /// Flat word dump of the procedure table.
    pub fn procedure_table_words(&self) -> Vec<Word> {
        self.state.procedure_table_words()
    }
}
