// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types of the render hardware interface.

use std::fmt;

use super::api::CommandListIndex;

/// A violation of the command-list protocol.
///
/// Every variant is a programmer error detected before anything reaches the
/// GPU queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandListError {
    /// The index does not name an existing list.
    InvalidIndex {
        /// The offending index.
        index: CommandListIndex,
        /// Number of lists the backend owns.
        count: usize,
    },
    /// `begin` on a list that is already recording.
    AlreadyRecording(CommandListIndex),
    /// `begin` on a list that was ended but never executed.
    PendingExecution(CommandListIndex),
    /// `begin` while another list is still recording.
    StillRecording {
        /// The list being begun.
        requested: CommandListIndex,
        /// The list that is open.
        open: CommandListIndex,
    },
    /// `end` or `execute` on a list that was never begun.
    NotBegun(CommandListIndex),
    /// `end` on a list that was already ended.
    NotRecording(CommandListIndex),
    /// `execute` on a list that is still recording.
    NotEnded(CommandListIndex),
    /// A recording call was made with no list open.
    NoOpenCommandList,
}

impl fmt::Display for CommandListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandListError::InvalidIndex { index, count } => {
                write!(f, "Command list index {} out of range (0..{count})", index.0)
            }
            CommandListError::AlreadyRecording(i) => write!(f, "{i} is already recording"),
            CommandListError::PendingExecution(i) => {
                write!(f, "{i} was ended but not executed; execute it before beginning again")
            }
            CommandListError::StillRecording { requested, open } => {
                write!(f, "Cannot begin {requested}: {open} is still recording")
            }
            CommandListError::NotBegun(i) => write!(f, "{i} was never begun"),
            CommandListError::NotRecording(i) => write!(f, "{i} is not recording"),
            CommandListError::NotEnded(i) => write!(f, "Execute called on {i} without End"),
            CommandListError::NoOpenCommandList => {
                write!(f, "Recording call made with no command list open")
            }
        }
    }
}

impl std::error::Error for CommandListError {}

/// An error related to a single GPU resource.
///
/// These are recoverable: the caller substitutes a fallback and carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The handle does not name a live resource.
    InvalidHandle,
    /// The resource is still referenced by GPU work that has not retired.
    /// Wait on the graphics fence before destroying it.
    InUse {
        /// Debug label of the resource.
        label: String,
    },
    /// The descriptor heap has no free slot.
    HeapExhausted {
        /// Capacity of the heap.
        capacity: u32,
    },
    /// The descriptor asked for something the backend cannot create.
    InvalidDescriptor(String),
    /// Data written to a resource does not fit it.
    OutOfBounds,
    /// An error originating from the backend.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::InUse { label } => write!(
                f,
                "Resource '{label}' is still referenced by in-flight GPU work"
            ),
            ResourceError::HeapExhausted { capacity } => {
                write!(f, "Descriptor heap exhausted ({capacity} slots)")
            }
            ResourceError::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {msg}"),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => write!(f, "Backend-specific resource error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// A device-level failure. Creation failures are fatal.
#[derive(Debug)]
pub enum RhiError {
    /// No suitable adapter was found.
    AdapterNotFound(String),
    /// The logical device could not be created.
    DeviceCreation(String),
    /// The device was lost or the queue thread died.
    DeviceLost(String),
    /// The command-list protocol was violated.
    CommandList(CommandListError),
    /// A resource needed by the operation failed.
    Resource(ResourceError),
}

impl fmt::Display for RhiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RhiError::AdapterNotFound(msg) => write!(f, "No suitable graphics adapter: {msg}"),
            RhiError::DeviceCreation(msg) => write!(f, "Failed to create graphics device: {msg}"),
            RhiError::DeviceLost(msg) => write!(f, "Graphics device lost: {msg}"),
            RhiError::CommandList(err) => write!(f, "Command list error: {err}"),
            RhiError::Resource(err) => write!(f, "Resource error: {err}"),
        }
    }
}

impl std::error::Error for RhiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RhiError::CommandList(err) => Some(err),
            RhiError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CommandListError> for RhiError {
    fn from(err: CommandListError) -> Self {
        RhiError::CommandList(err)
    }
}

impl From<ResourceError> for RhiError {
    fn from(err: ResourceError) -> Self {
        RhiError::Resource(err)
    }
}
