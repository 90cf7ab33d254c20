// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The buffer registry: the single canonical map from storage to owner.
//!
//! Entries live in an arena of slots. A [`BufferId`] is a slot index plus
//! the slot's generation at registration time; freeing bumps the
//! generation, so an id that outlives its buffer resolves to
//! [`MemoryError::UnknownBuffer`] even after the slot has been reused.
//!
//! A second index maps live base addresses to ids. It is what keeps base
//! addresses unique and what lets raw addresses be resolved back to their
//! owner.

use crate::MemoryError;
use std::collections::HashMap;
use std::fmt;

/// An opaque base address of a live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DataPtr(usize);

impl DataPtr {
    /// Wraps a raw address.
    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for DataPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Generation-checked handle to a registered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

impl BufferId {
    /// Slot index inside the registry arena.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this id was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}v{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<(DataPtr, T)>,
}

/// Arena of ownership records keyed by generation-checked ids, with a
/// unique base-address index.
///
/// The registry is not synchronised; owners wrap it in a mutex.
pub struct BufferRegistry<T> {
    slots: Vec<Slot<T>>,
    free_slots: Vec<u32>,
    by_address: HashMap<DataPtr, BufferId>,
}

impl<T> BufferRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            by_address: HashMap::new(),
        }
    }

    /// Registers `owner` under `address`.
    ///
    /// Fails with [`MemoryError::DuplicateAddress`] if a live entry already
    /// uses `address`; the registry is left unchanged in that case.
    pub fn register(&mut self, address: DataPtr, owner: T) -> Result<BufferId, MemoryError> {
        if self.by_address.contains_key(&address) {
            return Err(MemoryError::DuplicateAddress(address));
        }

        let id = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some((address, owner));
                BufferId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some((address, owner)),
                });
                BufferId {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_address.insert(address, id);
        Ok(id)
    }

    /// Returns the owner registered under `id`.
    pub fn resolve(&self, id: BufferId) -> Result<&T, MemoryError> {
        self.live_slot(id)
            .and_then(|slot| slot.entry.as_ref())
            .map(|(_, owner)| owner)
            .ok_or(MemoryError::UnknownBuffer(id))
    }

    /// Returns the base address registered under `id`.
    pub fn address_of(&self, id: BufferId) -> Result<DataPtr, MemoryError> {
        self.live_slot(id)
            .and_then(|slot| slot.entry.as_ref())
            .map(|(addr, _)| *addr)
            .ok_or(MemoryError::UnknownBuffer(id))
    }

    /// Removes and returns the owner registered under `id`.
    pub fn unregister(&mut self, id: BufferId) -> Result<T, MemoryError> {
        if self.live_slot(id).is_none() {
            return Err(MemoryError::UnknownBuffer(id));
        }
        let slot = &mut self.slots[id.index as usize];
        let (address, owner) = slot.entry.take().ok_or(MemoryError::UnknownBuffer(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(id.index);
        self.by_address.remove(&address);
        Ok(owner)
    }

    /// Finds the live buffer whose base address is `address`.
    pub fn lookup_address(&self, address: DataPtr) -> Result<BufferId, MemoryError> {
        self.by_address
            .get(&address)
            .copied()
            .ok_or(MemoryError::UnknownAddress(address))
    }

    /// Returns `true` if `id` refers to a live entry.
    pub fn contains(&self, id: BufferId) -> bool {
        self.resolve(id).is_ok()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Iterates over the base addresses of all live entries.
    pub fn addresses(&self) -> impl Iterator<Item = DataPtr> + '_ {
        self.by_address.keys().copied()
    }

    fn live_slot(&self, id: BufferId) -> Option<&Slot<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.entry.is_some())
    }
}

impl<T> Default for BufferRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BufferRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("live", &self.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}
