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

//! Opaque handles returned by the RHI.
//!
//! Handles are plain integers. Each type carries an `INVALID` sentinel used
//! as a fallback when a creation call fails and the caller keeps going.

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// The sentinel for "no resource".
            pub const INVALID: Self = Self(u64::MAX);

            /// Returns `true` unless this is [`Self::INVALID`].
            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

gpu_handle!(
    /// A GPU texture, including render and depth targets.
    TextureId
);
gpu_handle!(
    /// A GPU buffer.
    BufferId
);
gpu_handle!(
    /// A shader-visible descriptor heap.
    DescriptorHeapId
);
gpu_handle!(
    /// A compiled graphics or compute pipeline state.
    PipelineStateId
);

/// A slot allocated inside a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSlot {
    /// The heap the slot belongs to.
    pub heap: DescriptorHeapId,
    /// Index of the slot inside the heap.
    pub index: u32,
}

/// A value signalled on the graphics fence when a submission completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FenceValue(pub u64);

/// Index of a command list.
///
/// Index 0 is the prepare list used for uploads before the frame loop;
/// indices `1..=N` are the per-frame lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandListIndex(pub usize);

impl CommandListIndex {
    /// The prepare command list.
    pub const PREPARE: Self = Self(0);

    /// The per-frame list used for frame number `frame` with `frames_in_flight` lists.
    #[inline]
    pub fn for_frame(frame: u64, frames_in_flight: usize) -> Self {
        let n = frames_in_flight.max(1) as u64;
        Self((frame % n) as usize + 1)
    }
}

impl std::fmt::Display for CommandListIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::PREPARE {
            write!(f, "prepare list")
        } else {
            write!(f, "frame list {}", self.0)
        }
    }
}
