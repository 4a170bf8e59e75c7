//! Kernel state - pure data structure holding all kernel state
//!
//! This module contains the KernelState struct: the procedure table, the
//! word-addressed storage, and the entry-procedure designation. It is the
//! single owned aggregate - every registry and mediator operation takes it
//! by exclusive reference, there is no ambient global state.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::capability::CapList;
use crate::types::{
    CodeLocation, KernelError, Procedure, ProcedureKey, ProcedureTableEntry, Word, MAX_PROCEDURES,
};

/// The pure kernel state - no I/O, no side effects.
///
/// All state transformations are done via the registry operations below
/// and the `step` function. This struct is the verification target.
pub struct KernelState {
    /// Procedure table, keyed by procedure key
    pub procedures: BTreeMap<ProcedureKey, Procedure>,
    /// Registration order of the live procedures
    pub proc_order: Vec<ProcedureKey>,
    /// Word-addressed storage shared by all procedures, gated by write caps
    pub storage: BTreeMap<Word, Word>,
    /// Designated entry/fallback procedure, if configured
    pub entry_proc: Option<ProcedureKey>,
    /// Next code location to allocate (0 is the null sentinel)
    pub next_location: u64,
}

impl KernelState {
    /// Create a new empty kernel state.
    pub fn new() -> Self {
        Self {
            procedures: BTreeMap::new(),
            proc_order: Vec::new(),
            storage: BTreeMap::new(),
            entry_proc: None,
            next_location: 1,
        }
    }

    /// Allocate the next code location.
    pub fn alloc_location(&mut self) -> CodeLocation {
        let loc = CodeLocation(self.next_location);
        self.next_location += 1;
        loc
    }

    // ========================================================================
    // Registry operations
    // ========================================================================

    /// Register a procedure, returning the freshly allocated location.
    ///
    /// All-or-nothing: a duplicate key or a full table leaves the state
    /// untouched.
    pub fn register_procedure(
        &mut self,
        key: ProcedureKey,
        caps: CapList,
    ) -> Result<CodeLocation, KernelError> {
        if self.procedures.contains_key(&key) {
            return Err(KernelError::DuplicateKey);
        }
        if self.proc_order.len() >= MAX_PROCEDURES {
            return Err(KernelError::TableFull);
        }

        let location = self.alloc_location();
        self.procedures.insert(
            key,
            Procedure {
                key,
                location,
                caps,
            },
        );
        self.proc_order.push(key);
        Ok(location)
    }

    /// Remove a procedure, returning its table entry.
    ///
    /// The designated entry procedure is protected. Removal closes the gap
    /// in the enumeration so the order of the remaining entries is stable.
    pub fn remove_procedure(&mut self, key: &ProcedureKey) -> Result<Procedure, KernelError> {
        if !self.procedures.contains_key(key) {
            return Err(KernelError::NotFound);
        }
        if self.entry_proc.as_ref() == Some(key) {
            return Err(KernelError::EntryProcedure);
        }

        let pos = self
            .proc_order
            .iter()
            .position(|k| k == key)
            .ok_or(KernelError::NotFound)?;
        self.proc_order.remove(pos);
        self.procedures.remove(key).ok_or(KernelError::NotFound)
    }

    /// Get a procedure by key.
    pub fn get_procedure(&self, key: &ProcedureKey) -> Option<&Procedure> {
        self.procedures.get(key)
    }

    /// Check if a key names a live procedure.
    pub fn contains(&self, key: &ProcedureKey) -> bool {
        self.procedures.contains_key(key)
    }

    /// Live procedure keys in registration order.
    pub fn list_keys(&self) -> Vec<ProcedureKey> {
        self.proc_order.clone()
    }

    /// Number of live procedures.
    pub fn proc_count(&self) -> usize {
        self.proc_order.len()
    }

    /// Position of a key in the enumeration order.
    pub fn index_of(&self, key: &ProcedureKey) -> Option<usize> {
        self.proc_order.iter().position(|k| k == key)
    }

    // ========================================================================
    // Entry procedure
    // ========================================================================

    /// Designate the entry/fallback procedure. It must already be registered.
    pub fn set_entry_procedure(&mut self, key: ProcedureKey) -> Result<(), KernelError> {
        if !self.procedures.contains_key(&key) {
            return Err(KernelError::NotFound);
        }
        self.entry_proc = Some(key);
        Ok(())
    }

    /// Clear the entry-procedure designation.
    pub fn clear_entry_procedure(&mut self) {
        self.entry_proc = None;
    }

    /// The designated entry procedure, if any.
    pub fn entry_procedure(&self) -> Option<ProcedureKey> {
        self.entry_proc
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// Read a storage word. Unwritten addresses read as zero.
    pub fn read_word(&self, addr: Word) -> Word {
        self.storage.get(&addr).copied().unwrap_or(0)
    }

    /// Write a storage word. Only the mediator calls this, after the
    /// capability check has passed.
    pub fn write_word(&mut self, addr: Word, value: Word) {
        self.storage.insert(addr, value);
    }

    // ========================================================================
    // Procedure table dump
    // ========================================================================

    /// Structured dump of every live procedure, in enumeration order.
    pub fn procedure_table(&self) -> Vec<ProcedureTableEntry> {
        self.proc_order
            .iter()
            .enumerate()
            .filter_map(|(index, key)| {
                self.procedures.get(key).map(|proc| ProcedureTableEntry {
                    key: *key,
                    index,
                    location: proc.location,
                    caps: proc.caps.clone(),
                })
            })
            .collect()
    }

    /// Flat word dump of the procedure table, consumable without invoking
    /// any procedure code.
    ///
    /// Layout: `[proc_count]`, then per procedure in enumeration order:
    /// `[key (3 big-endian words), index, location, cap_word_count,
    /// cap_words...]` where the cap words are the registration wire form.
    pub fn procedure_table_words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        words.push(self.proc_order.len() as Word);
        for (index, key) in self.proc_order.iter().enumerate() {
            let Some(proc) = self.procedures.get(key) else {
                continue;
            };
            let kb = key.as_bytes();
            for chunk in kb.chunks_exact(8) {
                let mut w = [0u8; 8];
                w.copy_from_slice(chunk);
                words.push(Word::from_be_bytes(w));
            }
            words.push(index as Word);
            words.push(proc.location.0);
            let cap_words = proc.caps.encode();
            words.push(cap_words.len() as Word);
            words.extend_from_slice(&cap_words);
        }
        words
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapList, Capability, WriteCap};
    use alloc::vec;

    fn key(name: &str) -> ProcedureKey {
        ProcedureKey::new(name.as_bytes()).unwrap()
    }

    #[test]
    fn test_state_creation() {
        let state = KernelState::new();
        assert_eq!(state.proc_count(), 0);
        assert_eq!(state.next_location, 1);
        assert!(state.entry_procedure().is_none());
    }

    #[test]
    fn test_register_procedure() {
        let mut state = KernelState::new();
        let loc = state.register_procedure(key("FOO"), CapList::empty()).unwrap();

        assert!(!loc.is_null());
        assert_eq!(state.proc_count(), 1);
        assert_eq!(state.get_procedure(&key("FOO")).unwrap().location, loc);
        assert_eq!(state.index_of(&key("FOO")), Some(0));
    }

    #[test]
    fn test_register_duplicate_leaves_original_untouched() {
        let mut state = KernelState::new();
        let caps = CapList(vec![Capability::Write(WriteCap { base: 0x8500, size_log: 2 })]);
        let loc1 = state.register_procedure(key("FOO"), caps.clone()).unwrap();

        let err = state.register_procedure(key("FOO"), CapList::empty());
        assert_eq!(err, Err(KernelError::DuplicateKey));

        let proc = state.get_procedure(&key("FOO")).unwrap();
        assert_eq!(proc.location, loc1);
        assert_eq!(proc.caps, caps);
        assert_eq!(state.proc_count(), 1);
    }

    #[test]
    fn test_locations_are_unique() {
        let mut state = KernelState::new();
        let a = state.register_procedure(key("A"), CapList::empty()).unwrap();
        let b = state.register_procedure(key("B"), CapList::empty()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_table_full() {
        let mut state = KernelState::new();
        for i in 0..MAX_PROCEDURES {
            let name = alloc::format!("proc{}", i);
            state
                .register_procedure(key(&name), CapList::empty())
                .unwrap();
        }
        assert_eq!(
            state.register_procedure(key("overflow"), CapList::empty()),
            Err(KernelError::TableFull)
        );
        assert_eq!(state.proc_count(), MAX_PROCEDURES);
    }

    // ========================================================================
    // Enumeration order
    // ========================================================================

    #[test]
    fn test_enumeration_order_is_registration_order() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.register_procedure(key("B"), CapList::empty()).unwrap();
        state.register_procedure(key("C"), CapList::empty()).unwrap();

        assert_eq!(state.list_keys(), vec![key("A"), key("B"), key("C")]);
    }

    #[test]
    fn test_delete_closes_gap_preserving_order() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.register_procedure(key("B"), CapList::empty()).unwrap();
        state.register_procedure(key("C"), CapList::empty()).unwrap();

        state.remove_procedure(&key("B")).unwrap();

        assert_eq!(state.list_keys(), vec![key("A"), key("C")]);
        assert_eq!(state.index_of(&key("C")), Some(1));
    }

    #[test]
    fn test_remove_returns_entry_and_forgets_key() {
        let mut state = KernelState::new();
        let loc = state.register_procedure(key("FOO"), CapList::empty()).unwrap();

        let removed = state.remove_procedure(&key("FOO")).unwrap();
        assert_eq!(removed.location, loc);
        assert!(state.get_procedure(&key("FOO")).is_none());
        assert_eq!(state.proc_count(), 0);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut state = KernelState::new();
        assert_eq!(
            state.remove_procedure(&key("ghost")),
            Err(KernelError::NotFound)
        );
    }

    #[test]
    fn test_key_is_reusable_after_delete() {
        let mut state = KernelState::new();
        state.register_procedure(key("FOO"), CapList::empty()).unwrap();
        state.remove_procedure(&key("FOO")).unwrap();

        let loc = state.register_procedure(key("FOO"), CapList::empty()).unwrap();
        assert!(!loc.is_null());
        assert_eq!(state.proc_count(), 1);
    }

    // ========================================================================
    // Entry procedure
    // ========================================================================

    #[test]
    fn test_entry_procedure_must_exist() {
        let mut state = KernelState::new();
        assert_eq!(
            state.set_entry_procedure(key("ghost")),
            Err(KernelError::NotFound)
        );
    }

    #[test]
    fn test_entry_procedure_cannot_be_deleted() {
        let mut state = KernelState::new();
        state.register_procedure(key("Entry"), CapList::empty()).unwrap();
        state.set_entry_procedure(key("Entry")).unwrap();

        assert_eq!(
            state.remove_procedure(&key("Entry")),
            Err(KernelError::EntryProcedure)
        );
        assert_eq!(state.proc_count(), 1);

        // clearing the designation makes it deletable again
        state.clear_entry_procedure();
        assert!(state.remove_procedure(&key("Entry")).is_ok());
    }

    // ========================================================================
    // Storage
    // ========================================================================

    #[test]
    fn test_storage_defaults_to_zero() {
        let state = KernelState::new();
        assert_eq!(state.read_word(0x8500), 0);
    }

    #[test]
    fn test_storage_write_read() {
        let mut state = KernelState::new();
        state.write_word(0x8500, 42);
        assert_eq!(state.read_word(0x8500), 42);
        assert_eq!(state.read_word(0x8501), 0);
    }

    // ========================================================================
    // Procedure table dump
    // ========================================================================

    #[test]
    fn test_procedure_table_dump() {
        let mut state = KernelState::new();
        let caps = CapList::decode(&[3, 7, 0x8500, 0x2]).unwrap();
        let loc_a = state.register_procedure(key("A"), caps.clone()).unwrap();
        let loc_b = state.register_procedure(key("B"), CapList::empty()).unwrap();

        let table = state.procedure_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].key, key("A"));
        assert_eq!(table[0].index, 0);
        assert_eq!(table[0].location, loc_a);
        assert_eq!(table[0].caps, caps);
        assert_eq!(table[1].key, key("B"));
        assert_eq!(table[1].index, 1);
        assert_eq!(table[1].location, loc_b);
        assert!(table[1].caps.is_empty());
    }

    #[test]
    fn test_procedure_table_words_layout() {
        let mut state = KernelState::new();
        let caps = CapList::decode(&[3, 7, 0x8500, 0x2]).unwrap();
        let loc = state.register_procedure(key("A"), caps).unwrap();

        let words = state.procedure_table_words();
        assert_eq!(words[0], 1); // proc count
        // key "A" zero-padded: first big-endian word is 'A' << 56
        assert_eq!(words[1], (b'A' as Word) << 56);
        assert_eq!(words[2], 0);
        assert_eq!(words[3], 0);
        assert_eq!(words[4], 0); // index
        assert_eq!(words[5], loc.0); // location
        assert_eq!(words[6], 4); // cap word count
        assert_eq!(&words[7..], &[3, 7, 0x8500, 0x2]);
    }
}
