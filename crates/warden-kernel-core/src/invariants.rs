//! Formal invariants for kernel verification
//!
//! This module contains runtime-checkable invariants that should always hold.
//! These are used for:
//! 1. Runtime assertion checking during development
//! 2. Property-based testing over operation sequences
//!
//! # Invariants
//!
//! 1. **Table Order Consistency**: the enumeration order and the procedure
//!    table hold exactly the same keys
//! 2. **Location Validity**: every live procedure has a non-null, unique
//!    code location
//! 3. **Location Monotonicity**: `next_location` is greater than every
//!    allocated location
//! 4. **Entry Procedure Liveness**: the designated entry procedure, if any,
//!    is a live procedure
//! 5. **Table Bound**: the number of live procedures never exceeds the
//!    table capacity
//! 6. **Capability Well-Formedness**: no held log capability declares more
//!    topics than a record may carry

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::capability::Capability;
use crate::state::KernelState;
use crate::types::{MAX_LOG_TOPICS, MAX_PROCEDURES};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_table_order_consistency(state));
    violations.extend(check_location_validity(state));
    violations.extend(check_location_monotonicity(state));
    violations.extend(check_entry_procedure_liveness(state));
    violations.extend(check_table_bound(state));
    violations.extend(check_capability_well_formedness(state));

    violations
}

/// Invariant 1: enumeration order and procedure table agree
fn check_table_order_consistency(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut seen = BTreeSet::new();
    for key in &state.proc_order {
        if !seen.insert(*key) {
            violations.push(InvariantViolation {
                invariant: "table_order_consistency",
                description: alloc::format!("key {} appears twice in the enumeration order", key),
            });
        }
        if !state.procedures.contains_key(key) {
            violations.push(InvariantViolation {
                invariant: "table_order_consistency",
                description: alloc::format!(
                    "key {} is enumerated but missing from the procedure table",
                    key
                ),
            });
        }
    }

    for (key, proc) in &state.procedures {
        if !seen.contains(key) {
            violations.push(InvariantViolation {
                invariant: "table_order_consistency",
                description: alloc::format!(
                    "key {} is in the procedure table but not enumerated",
                    key
                ),
            });
        }
        if proc.key != *key {
            violations.push(InvariantViolation {
                invariant: "table_order_consistency",
                description: alloc::format!(
                    "table entry for {} carries mismatched key {}",
                    key,
                    proc.key
                ),
            });
        }
    }

    violations
}

/// Invariant 2: locations are non-null and unique
fn check_location_validity(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut locations = BTreeSet::new();
    for (key, proc) in &state.procedures {
        if proc.location.is_null() {
            violations.push(InvariantViolation {
                invariant: "location_validity",
                description: alloc::format!("procedure {} has the null location", key),
            });
        }
        if !locations.insert(proc.location) {
            violations.push(InvariantViolation {
                invariant: "location_validity",
                description: alloc::format!(
                    "procedure {} shares location {} with another procedure",
                    key,
                    proc.location.0
                ),
            });
        }
    }

    violations
}

/// Invariant 3: next_location is greater than every allocated location
fn check_location_monotonicity(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (key, proc) in &state.procedures {
        if proc.location.0 >= state.next_location {
            violations.push(InvariantViolation {
                invariant: "location_monotonicity",
                description: alloc::format!(
                    "procedure {} holds location {} but next_location is {}",
                    key,
                    proc.location.0,
                    state.next_location
                ),
            });
        }
    }

    violations
}

/// Invariant 4: the entry procedure, if designated, is live
fn check_entry_procedure_liveness(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if let Some(entry) = &state.entry_proc {
        if !state.procedures.contains_key(entry) {
            violations.push(InvariantViolation {
                invariant: "entry_procedure_liveness",
                description: alloc::format!("entry procedure {} is not in the table", entry),
            });
        }
    }

    violations
}

/// Invariant 5: the table never exceeds its capacity
fn check_table_bound(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if state.proc_order.len() > MAX_PROCEDURES {
        violations.push(InvariantViolation {
            invariant: "table_bound",
            description: alloc::format!(
                "table holds {} procedures, capacity is {}",
                state.proc_order.len(),
                MAX_PROCEDURES
            ),
        });
    }

    violations
}

/// Invariant 6: every held log capability is within the topic bound
fn check_capability_well_formedness(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (key, proc) in &state.procedures {
        for cap in &proc.caps.0 {
            if let Capability::Log(l) = cap {
                if l.topics.len() > MAX_LOG_TOPICS {
                    violations.push(InvariantViolation {
                        invariant: "capability_well_formedness",
                        description: alloc::format!(
                            "procedure {} holds a log capability with {} topics",
                            key,
                            l.topics.len()
                        ),
                    });
                }
            }
        }
    }

    violations
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(state: &KernelState) {
    let violations = check_all_invariants(state);
    if !violations.is_empty() {
        for v in &violations {
            panic!("Invariant violated: {}", v.invariant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapList;
    use crate::state::KernelState;
    use crate::types::{CodeLocation, Procedure, ProcedureKey};

    fn key(name: &str) -> ProcedureKey {
        ProcedureKey::new(name.as_bytes()).unwrap()
    }

    #[test]
    fn test_invariants_hold_for_new_state() {
        let state = KernelState::new();
        let violations = check_all_invariants(&state);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_invariants_hold_after_register_and_remove() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.register_procedure(key("B"), CapList::empty()).unwrap();
        state.remove_procedure(&key("A")).unwrap();

        let violations = check_all_invariants(&state);
        assert!(violations.is_empty(), "Violations: {:?}", violations);
    }

    #[test]
    fn test_invariants_hold_after_entry_designation() {
        let mut state = KernelState::new();
        state.register_procedure(key("Entry"), CapList::empty()).unwrap();
        state.set_entry_procedure(key("Entry")).unwrap();

        let violations = check_all_invariants(&state);
        assert!(violations.is_empty(), "Violations: {:?}", violations);
    }

    #[test]
    fn test_detects_unenumerated_table_entry() {
        let mut state = KernelState::new();
        // Insert directly, bypassing the registry
        state.procedures.insert(
            key("rogue"),
            Procedure {
                key: key("rogue"),
                location: CodeLocation(1),
                caps: CapList::empty(),
            },
        );
        state.next_location = 2;

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.invariant == "table_order_consistency"));
    }

    #[test]
    fn test_detects_dangling_enumeration_entry() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        // Remove from the table but not from the order
        state.procedures.remove(&key("A"));

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.invariant == "table_order_consistency"));
    }

    #[test]
    fn test_detects_null_location() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.procedures.get_mut(&key("A")).unwrap().location = CodeLocation::NULL;

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations.iter().any(|v| v.invariant == "location_validity"));
    }

    #[test]
    fn test_detects_duplicate_location() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.register_procedure(key("B"), CapList::empty()).unwrap();
        let loc_a = state.get_procedure(&key("A")).unwrap().location;
        state.procedures.get_mut(&key("B")).unwrap().location = loc_a;

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations.iter().any(|v| v.invariant == "location_validity"));
    }

    #[test]
    fn test_detects_location_monotonicity_violation() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.next_location = 1;

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.invariant == "location_monotonicity"));
    }

    #[test]
    fn test_detects_dead_entry_procedure() {
        let mut state = KernelState::new();
        state.register_procedure(key("Entry"), CapList::empty()).unwrap();
        state.set_entry_procedure(key("Entry")).unwrap();
        // Delete behind the registry's back
        state.procedures.remove(&key("Entry"));
        state.proc_order.clear();

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.invariant == "entry_procedure_liveness"));
    }

    #[test]
    fn test_detects_over_long_log_capability() {
        use crate::capability::LogCap;
        use alloc::vec;

        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        // the decoder refuses this, so plant it directly
        state.procedures.get_mut(&key("A")).unwrap().caps =
            CapList(vec![Capability::Log(LogCap { topics: vec![1, 2, 3, 4, 5] })]);

        let violations = check_all_invariants(&state);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.invariant == "capability_well_formedness"));
    }

    #[test]
    fn test_assert_invariants_passes_for_valid_state() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();

        // Should not panic
        assert_invariants(&state);
    }

    #[test]
    #[should_panic(expected = "Invariant violated")]
    fn test_assert_invariants_panics_on_violation() {
        let mut state = KernelState::new();
        state.register_procedure(key("A"), CapList::empty()).unwrap();
        state.next_location = 0;

        assert_invariants(&state);
    }
}
