//! Taint tracking.
//!
//! Taint is a boolean per full-width register and per byte of memory. Writes
//! through a sub-register taint or untaint the whole parent register.
//!
//! Two propagation rules exist. Assignment replaces the taint of the
//! destination with the taint of the source, and an immediate source always
//! clears the destination. Union adds the taint of the source to the taint of
//! the destination, and never clears anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::architecture::{Register, RegisterId};

/// Storage for taint, with the propagation rules built on top.
///
/// Implementors provide raw per-parent and per-byte storage. Every provided
/// method returns the taint of the destination after propagation, and does
/// nothing when taint tracking is disabled.
pub trait TaintState {
    fn is_enabled(&self) -> bool;

    /// The raw taint of a parent register.
    fn register_taint(&self, parent: RegisterId) -> bool;

    /// The raw taint of a byte of memory.
    fn memory_taint(&self, address: u64) -> bool;

    fn set_register_taint(&mut self, parent: RegisterId, taint: bool);

    fn set_memory_taint(&mut self, address: u64, taint: bool);

    fn is_register_tainted(&self, register: &Register) -> bool {
        self.is_enabled() && self.register_taint(register.parent())
    }

    /// True if any of the `size` bytes at `address` is tainted.
    fn is_memory_tainted(&self, address: u64, size: usize) -> bool {
        self.is_enabled()
            && (0..size as u64).any(|offset| self.memory_taint(address.wrapping_add(offset)))
    }

    fn taint_register(&mut self, register: &Register) -> bool {
        self.assign_register(register, true)
    }

    fn untaint_register(&mut self, register: &Register) -> bool {
        self.assign_register(register, false)
    }

    fn taint_memory(&mut self, address: u64, size: usize) -> bool {
        self.assign_memory(address, size, true)
    }

    fn untaint_memory(&mut self, address: u64, size: usize) -> bool {
        self.assign_memory(address, size, false)
    }

    /// Set the taint of `register` to `taint`.
    fn assign_register(&mut self, register: &Register, taint: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.set_register_taint(register.parent(), taint);
        taint
    }

    /// Set the taint of every byte of `address..address + size` to `taint`.
    fn assign_memory(&mut self, address: u64, size: usize, taint: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        for offset in 0..size as u64 {
            self.set_memory_taint(address.wrapping_add(offset), taint);
        }
        taint
    }

    /// Add `taint` to the taint of `register`.
    fn union_register(&mut self, register: &Register, taint: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let taint = taint || self.register_taint(register.parent());
        self.set_register_taint(register.parent(), taint);
        taint
    }

    /// Add `taint` to the taint of every byte of `address..address + size`.
    fn union_memory(&mut self, address: u64, size: usize, taint: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if taint {
            for offset in 0..size as u64 {
                self.set_memory_taint(address.wrapping_add(offset), true);
            }
        }
        self.is_memory_tainted(address, size)
    }

    fn assignment_register_immediate(&mut self, dst: &Register) -> bool {
        self.assign_register(dst, false)
    }

    fn assignment_register_register(&mut self, dst: &Register, src: &Register) -> bool {
        let taint = self.is_register_tainted(src);
        self.assign_register(dst, taint)
    }

    fn assignment_register_memory(&mut self, dst: &Register, address: u64, size: usize) -> bool {
        let taint = self.is_memory_tainted(address, size);
        self.assign_register(dst, taint)
    }

    fn assignment_memory_immediate(&mut self, address: u64, size: usize) -> bool {
        self.assign_memory(address, size, false)
    }

    fn assignment_memory_register(&mut self, address: u64, size: usize, src: &Register) -> bool {
        let taint = self.is_register_tainted(src);
        self.assign_memory(address, size, taint)
    }

    fn assignment_memory_memory(
        &mut self,
        dst_address: u64,
        dst_size: usize,
        src_address: u64,
        src_size: usize,
    ) -> bool {
        let taint = self.is_memory_tainted(src_address, src_size);
        self.assign_memory(dst_address, dst_size, taint)
    }

    /// An immediate carries no taint, so the destination is unchanged.
    fn union_register_immediate(&mut self, dst: &Register) -> bool {
        self.union_register(dst, false)
    }

    fn union_register_register(&mut self, dst: &Register, src: &Register) -> bool {
        let taint = self.is_register_tainted(src);
        self.union_register(dst, taint)
    }

    fn union_register_memory(&mut self, dst: &Register, address: u64, size: usize) -> bool {
        let taint = self.is_memory_tainted(address, size);
        self.union_register(dst, taint)
    }

    fn union_memory_immediate(&mut self, address: u64, size: usize) -> bool {
        self.union_memory(address, size, false)
    }

    fn union_memory_register(&mut self, address: u64, size: usize, src: &Register) -> bool {
        let taint = self.is_register_tainted(src);
        self.union_memory(address, size, taint)
    }

    fn union_memory_memory(
        &mut self,
        dst_address: u64,
        dst_size: usize,
        src_address: u64,
        src_size: usize,
    ) -> bool {
        let taint = self.is_memory_tainted(src_address, src_size);
        self.union_memory(dst_address, dst_size, taint)
    }
}

/// The committed taint of a `Context`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TaintEngine {
    enabled: bool,
    registers: BTreeSet<RegisterId>,
    memory: BTreeSet<u64>,
}

impl TaintEngine {
    pub fn new(enabled: bool) -> TaintEngine {
        TaintEngine {
            enabled,
            registers: BTreeSet::new(),
            memory: BTreeSet::new(),
        }
    }

    /// Enable or disable taint tracking. Disabling does not forget taint, but
    /// hides it from every query until taint is enabled again.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The tainted parent registers.
    pub fn tainted_registers(&self) -> &BTreeSet<RegisterId> {
        &self.registers
    }

    /// The tainted bytes of memory.
    pub fn tainted_memory(&self) -> &BTreeSet<u64> {
        &self.memory
    }

    pub fn clear(&mut self) {
        self.registers.clear();
        self.memory.clear();
    }
}

impl TaintState for TaintEngine {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn register_taint(&self, parent: RegisterId) -> bool {
        self.registers.contains(&parent)
    }

    fn memory_taint(&self, address: u64) -> bool {
        self.memory.contains(&address)
    }

    fn set_register_taint(&mut self, parent: RegisterId, taint: bool) {
        if taint {
            self.registers.insert(parent);
        } else {
            self.registers.remove(&parent);
        }
    }

    fn set_memory_taint(&mut self, address: u64, taint: bool) {
        if taint {
            self.memory.insert(address);
        } else {
            self.memory.remove(&address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{Amd64, Architecture};

    fn registers() -> (Register, Register, Register) {
        let amd64 = Amd64::new();
        (
            amd64.register(RegisterId::Rax).unwrap(),
            amd64.register(RegisterId::Eax).unwrap(),
            amd64.register(RegisterId::Rbx).unwrap(),
        )
    }

    #[test]
    fn children_share_parent_taint() {
        let (rax, eax, _) = registers();
        let mut taint = TaintEngine::new(true);
        assert!(taint.taint_register(&eax));
        assert!(taint.is_register_tainted(&rax));
        assert!(!taint.assignment_register_immediate(&eax));
        assert!(!taint.is_register_tainted(&rax));
    }

    #[test]
    fn union_is_monotonic() {
        let (rax, _, rbx) = registers();
        let mut taint = TaintEngine::new(true);
        taint.taint_register(&rax);
        assert!(taint.union_register_register(&rax, &rbx));
        assert!(taint.union_register_immediate(&rax));
        assert!(taint.union_register_memory(&rax, 0x1000, 8));
        assert!(taint.is_register_tainted(&rax));

        assert!(taint.union_register_register(&rbx, &rax));
        assert!(taint.is_register_tainted(&rbx));
    }

    #[test]
    fn assignment_copies_source_taint() {
        let (rax, _, rbx) = registers();
        let mut taint = TaintEngine::new(true);
        taint.taint_register(&rbx);
        assert!(taint.assignment_register_register(&rax, &rbx));
        assert!(!taint.assignment_register_memory(&rbx, 0x2000, 8));
        assert!(taint.assignment_memory_register(0x2000, 8, &rax));
        assert!(taint.is_memory_tainted(0x2007, 1));
        assert!(!taint.is_memory_tainted(0x2008, 1));
        assert!(taint.assignment_memory_memory(0x3000, 2, 0x2006, 4));
        assert!(!taint.assignment_memory_immediate(0x3000, 1));
        assert!(taint.is_memory_tainted(0x3000, 2));
        assert!(!taint.is_memory_tainted(0x3000, 1));
    }

    #[test]
    fn union_memory_per_byte() {
        let (rax, _, _) = registers();
        let mut taint = TaintEngine::new(true);
        taint.taint_memory(0x1000, 1);
        assert!(taint.union_memory_immediate(0x1000, 4));
        assert!(!taint.is_memory_tainted(0x1001, 3));
        taint.taint_register(&rax);
        assert!(taint.union_memory_register(0x1000, 4, &rax));
        assert!(taint.is_memory_tainted(0x1003, 1));
        assert!(taint.union_memory_memory(0x4000, 2, 0x1000, 1));
    }

    #[test]
    fn disabled_taint_is_inert() {
        let (rax, _, _) = registers();
        let mut taint = TaintEngine::new(false);
        assert!(!taint.taint_register(&rax));
        assert!(!taint.is_register_tainted(&rax));
        assert!(taint.tainted_registers().is_empty());
    }
}
