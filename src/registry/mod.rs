//! Symbol registry: storage identity → kernel argument slot.
//!
//! Every distinct (storage, role) pair seen while building a prototype gets
//! exactly one argument. Later references reuse the name assigned on first
//! sight and emit nothing.


use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::statement::{ScalarType, StorageId};

/// What a registered symbol carries for its storage object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolRole {
    /// Host scalar value, or a symbolic container's runtime value.
    Value,
    /// Device buffer pointer.
    Buffer,
    Start,
    Stride,
    Start1,
    Stride1,
    Start2,
    Stride2,
    /// Unit-vector position.
    Index,
}

/// Deduplication key: one argument per (storage, role).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolKey {
    pub storage: StorageId,
    pub role: SymbolRole,
}

impl SymbolKey {
    pub fn new(storage: StorageId, role: SymbolRole) -> Self {
        SymbolKey { storage, role }
    }
}

/// OpenCL address space qualifier for pointer arguments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSpace {
    #[default]
    Global,
    Constant,
    Local,
}

impl AddressSpace {
    pub fn qualifier(self) -> &'static str {
        match self {
            AddressSpace::Global => "__global",
            AddressSpace::Constant => "__constant",
            AddressSpace::Local => "__local",
        }
    }
}

/// How an argument is passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    Value,
    Pointer(AddressSpace),
}

/// One kernel parameter, in slot order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelArgument {
    pub slot: usize,
    pub name: String,
    pub dtype: ScalarType,
    pub kind: ArgumentKind,
    /// What the launcher binds to this slot.
    pub binding: SymbolKey,
}

impl KernelArgument {
    /// Parameter declaration line, comma terminated.
    pub fn declaration(&self) -> String {
        match self.kind {
            ArgumentKind::Value => value_argument(self.dtype.name(), &self.name),
            ArgumentKind::Pointer(space) => {
                pointer_argument(space.qualifier(), self.dtype.name(), &self.name)
            }
        }
    }
}

impl fmt::Display for KernelArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

pub fn value_argument(scalar_type: &str, name: &str) -> String {
    format!("{} {},", scalar_type, name)
}

pub fn pointer_argument(address_space: &str, scalar_type: &str, name: &str) -> String {
    format!("{} {}* {},", address_space, scalar_type, name)
}

/// Generated name for an argument slot.
pub fn argument_name(slot: usize) -> String {
    format!("arg{}", slot)
}

/// Insert-if-absent table of kernel arguments.
#[derive(Clone, Debug, Default)]
pub struct SymbolRegistry {
    slots: HashMap<SymbolKey, usize>,
    arguments: Vec<KernelArgument>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a by-value parameter; returns its name.
    pub fn value(&mut self, key: SymbolKey, dtype: ScalarType) -> String {
        self.insert(key, dtype, ArgumentKind::Value)
    }

    /// Register a pointer parameter; returns its name.
    pub fn pointer(&mut self, key: SymbolKey, dtype: ScalarType, space: AddressSpace) -> String {
        self.insert(key, dtype, ArgumentKind::Pointer(space))
    }

    fn insert(&mut self, key: SymbolKey, dtype: ScalarType, kind: ArgumentKind) -> String {
        if let Some(&slot) = self.slots.get(&key) {
            return argument_name(slot);
        }
        let slot = self.arguments.len();
        let name = argument_name(slot);
        self.slots.insert(key, slot);
        let argument = KernelArgument {
            slot,
            name: name.clone(),
            dtype,
            kind,
            binding: key,
        };
        log::debug!(
            "registered {} for storage {} ({:?})",
            argument.declaration(),
            key.storage,
            key.role
        );
        self.arguments.push(argument);
        name
    }

    /// Slot previously assigned to `key`, if any.
    pub fn slot(&self, key: &SymbolKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn arguments(&self) -> &[KernelArgument] {
        &self.arguments
    }

    pub fn into_arguments(self) -> Vec<KernelArgument> {
        self.arguments
    }
}
