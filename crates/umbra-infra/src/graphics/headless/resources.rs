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

//! CPU-side storage of the headless backend's resources.

use std::collections::HashMap;

use umbra_core::renderer::{
    BufferDescriptor, BufferId, DescriptorAllocator, DescriptorHeapDescriptor, DescriptorHeapId,
    PipelineStateDescriptor, PipelineStateId, ResourceError, ResourceState, TextureDescriptor,
    TextureId,
};

use crate::graphics::validation;

#[derive(Debug)]
pub(crate) struct HeadlessTexture {
    pub(crate) descriptor: TextureDescriptor,
    pub(crate) state: ResourceState,
    pub(crate) uploads: u32,
}

#[derive(Debug)]
pub(crate) struct HeadlessBuffer {
    pub(crate) descriptor: BufferDescriptor,
    pub(crate) data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct HeadlessHeap {
    pub(crate) descriptor: DescriptorHeapDescriptor,
    pub(crate) allocator: DescriptorAllocator,
}

/// Every live resource, keyed by handle. Shared with the queue thread.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    next_id: u64,
    pub(crate) textures: HashMap<TextureId, HeadlessTexture>,
    pub(crate) buffers: HashMap<BufferId, HeadlessBuffer>,
    pub(crate) heaps: HashMap<DescriptorHeapId, HeadlessHeap>,
    pub(crate) pipelines: HashMap<PipelineStateId, PipelineStateDescriptor>,
}

impl ResourceTable {
    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn insert_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureId, ResourceError> {
        validation::texture(descriptor)?;
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            HeadlessTexture {
                descriptor: descriptor.clone(),
                state: ResourceState::Common,
                uploads: 0,
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        validation::buffer(descriptor)?;
        let size = usize::try_from(descriptor.size).map_err(|_| {
            ResourceError::InvalidDescriptor(format!(
                "buffer '{}' is too large ({} bytes)",
                descriptor.label, descriptor.size
            ))
        })?;
        let id = BufferId(self.next());
        self.buffers.insert(
            id,
            HeadlessBuffer {
                descriptor: descriptor.clone(),
                data: vec![0; size],
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_heap(
        &mut self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError> {
        validation::heap(descriptor)?;
        let id = DescriptorHeapId(self.next());
        self.heaps.insert(
            id,
            HeadlessHeap {
                descriptor: descriptor.clone(),
                allocator: DescriptorAllocator::new(descriptor.capacity),
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_pipeline(
        &mut self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        validation::pipeline(descriptor)?;
        let id = PipelineStateId(self.next());
        self.pipelines.insert(id, descriptor.clone());
        Ok(id)
    }

    pub(crate) fn texture_label(&self, id: TextureId) -> Option<String> {
        self.textures.get(&id).map(|t| t.descriptor.label.clone())
    }

    pub(crate) fn buffer_label(&self, id: BufferId) -> Option<String> {
        self.buffers.get(&id).map(|b| b.descriptor.label.clone())
    }

    pub(crate) fn pipeline_label(&self, id: PipelineStateId) -> Option<String> {
        self.pipelines.get(&id).map(|p| p.label.clone())
    }

    pub(crate) fn counts(&self) -> [usize; 4] {
        [
            self.textures.len(),
            self.buffers.len(),
            self.heaps.len(),
            self.pipelines.len(),
        ]
    }
}
