// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stream handles and dispatch targets.

use std::fmt;

/// Opaque handle to one execution stream. Streams are numbered from 0 up
/// to the pool's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct StreamHandle(u32);

impl StreamHandle {
    /// Creates a handle for stream `index`.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of the stream inside its pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Where a unit of work should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamTarget {
    /// Synchronously on the calling thread.
    #[default]
    Inline,
    /// On the caller's active stream, or inline if none is set.
    Active,
    /// On a specific stream.
    Stream(StreamHandle),
}

impl From<StreamHandle> for StreamTarget {
    fn from(h: StreamHandle) -> Self {
        StreamTarget::Stream(h)
    }
}

impl From<Option<StreamHandle>> for StreamTarget {
    fn from(h: Option<StreamHandle>) -> Self {
        h.map_or(StreamTarget::Inline, StreamTarget::Stream)
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTarget::Inline => f.write_str("inline"),
            StreamTarget::Active => f.write_str("active"),
            StreamTarget::Stream(h) => h.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(StreamHandle::new(3).to_string(), "stream#3");
        assert_eq!(StreamTarget::Inline.to_string(), "inline");
        assert_eq!(StreamTarget::from(StreamHandle::new(1)).to_string(), "stream#1");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(StreamTarget::from(None), StreamTarget::Inline);
        assert_eq!(
            StreamTarget::from(Some(StreamHandle::new(2))),
            StreamTarget::Stream(StreamHandle::new(2))
        );
    }
}
