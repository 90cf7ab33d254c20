// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory scope tags.
//!
//! A scope names the physical memory region an allocation lives in.
//! `"global"` (or no tag at all) is ordinary, linearly addressed memory.
//! Every other recognised tag names a scratch scope, backed by the small
//! bounded fast-memory region.

use crate::MemoryError;
use std::fmt;

/// Tag of the default, linearly addressed scope.
pub const GLOBAL_SCOPE: &str = "global";

/// Tag of the default scratch scope.
pub const DEFAULT_SCRATCH_SCOPE: &str = "global.vtcm";

/// A resolved memory scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub enum MemoryScope {
    /// Flat global memory.
    Global,
    /// A named scratch scope.
    Scratch(String),
}

impl MemoryScope {
    /// Returns `true` for the default scope.
    pub fn is_global(&self) -> bool {
        matches!(self, MemoryScope::Global)
    }

    /// Returns the scope tag.
    pub fn tag(&self) -> &str {
        match self {
            MemoryScope::Global => GLOBAL_SCOPE,
            MemoryScope::Scratch(tag) => tag,
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The set of scope tags recognised by a device instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTable {
    scratch: Vec<String>,
}

impl ScopeTable {
    /// Creates a table recognising the given scratch tags.
    pub fn new<I, S>(scratch_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scratch: scratch_tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the recognised scratch tags.
    pub fn scratch_tags(&self) -> &[String] {
        &self.scratch
    }

    /// Resolves an optional tag. Unset and `"global"` map to
    /// [`MemoryScope::Global`].
    pub fn resolve(&self, tag: Option<&str>) -> Result<MemoryScope, MemoryError> {
        match tag {
            None | Some(GLOBAL_SCOPE) => Ok(MemoryScope::Global),
            Some(t) if self.is_scratch(t) => Ok(MemoryScope::Scratch(t.to_string())),
            Some(t) => Err(MemoryError::UnknownScope {
                scope: t.to_string(),
            }),
        }
    }

    /// Resolves the scope of an explicit scratch request. Unset picks the
    /// first configured scratch tag.
    pub fn resolve_scratch(&self, tag: Option<&str>) -> Result<MemoryScope, MemoryError> {
        match tag {
            None => self
                .scratch
                .first()
                .map(|t| MemoryScope::Scratch(t.clone()))
                .ok_or_else(|| MemoryError::UnknownScope {
                    scope: "<no scratch scope configured>".to_string(),
                }),
            Some(t) if self.is_scratch(t) => Ok(MemoryScope::Scratch(t.to_string())),
            Some(t) => Err(MemoryError::NotScratchScope {
                scope: t.to_string(),
            }),
        }
    }

    fn is_scratch(&self, tag: &str) -> bool {
        self.scratch.iter().any(|s| s == tag)
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new([DEFAULT_SCRATCH_SCOPE])
    }
}
