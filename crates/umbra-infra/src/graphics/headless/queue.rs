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

//! The headless graphics queue: a dedicated thread that "executes" submitted
//! command lists against the CPU-side resource table and signals the fence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use umbra_core::renderer::{Command, CommandListIndex, FenceValue, PipelineStateId};

use super::resources::ResourceTable;

const EXECUTED_HISTORY: usize = 64;

/// What the queue observed while executing one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedList {
    /// The list that was submitted.
    pub index: CommandListIndex,
    /// The fence value it signalled.
    pub fence: FenceValue,
    /// Debug markers opened by the list, in order.
    pub markers: Vec<String>,
    /// Number of draws.
    pub draws: u32,
    /// Number of dispatches.
    pub dispatches: u32,
    /// Number of commands.
    pub commands: usize,
}

pub(crate) struct Submission {
    pub(crate) index: CommandListIndex,
    pub(crate) fence: FenceValue,
    pub(crate) commands: Vec<Command>,
}

/// The graphics fence: a counter guarded by a mutex and a condition variable.
#[derive(Debug, Default)]
pub(crate) struct Fence {
    completed: Mutex<u64>,
    signalled: Condvar,
}

impl Fence {
    pub(crate) fn signal(&self, value: FenceValue) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        if value.0 > *completed {
            *completed = value.0;
        }
        self.signalled.notify_all();
    }

    pub(crate) fn completed(&self) -> FenceValue {
        FenceValue(*self.completed.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn wait(&self, value: FenceValue) {
        let completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        let _completed = self
            .signalled
            .wait_while(completed, |c| *c < value.0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// State shared between the device and its queue thread.
#[derive(Debug, Default)]
pub(crate) struct QueueShared {
    pub(crate) resources: Mutex<ResourceTable>,
    pub(crate) fence: Fence,
    pub(crate) executed: Mutex<VecDeque<ExecutedList>>,
    pub(crate) total_draws: AtomicU64,
    pub(crate) total_dispatches: AtomicU64,
    pub(crate) invalid_references: AtomicU64,
}

impl QueueShared {
    fn execute(&self, submission: Submission) {
        let mut record = ExecutedList {
            index: submission.index,
            fence: submission.fence,
            markers: Vec::new(),
            draws: 0,
            dispatches: 0,
            commands: submission.commands.len(),
        };
        let mut depth = 0usize;
        let mut pipeline: Option<PipelineStateId> = None;
        let mut invalid = 0u64;

        {
            let mut resources = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
            for command in &submission.commands {
                for texture in command.referenced_textures() {
                    if !resources.textures.contains_key(&texture) {
                        log::warn!(
                            "Headless queue: {} references unknown texture {:?}",
                            submission.index,
                            texture
                        );
                        invalid += 1;
                    }
                }
                match command {
                    Command::BeginEvent(label) => {
                        depth += 1;
                        record.markers.push(label.clone());
                    }
                    Command::EndEvent => {
                        if depth == 0 {
                            log::warn!("Headless queue: unbalanced end_event in {}", submission.index);
                            invalid += 1;
                        } else {
                            depth -= 1;
                        }
                    }
                    Command::SetPipelineState(id) => {
                        if resources.pipelines.contains_key(id) {
                            pipeline = Some(*id);
                        } else {
                            log::warn!("Headless queue: unknown pipeline state {id:?}");
                            invalid += 1;
                            pipeline = None;
                        }
                    }
                    Command::Transition { texture, state } => {
                        if let Some(t) = resources.textures.get_mut(texture) {
                            t.state = *state;
                        }
                    }
                    Command::Draw { .. } => {
                        if pipeline.is_none() {
                            log::warn!("Headless queue: draw with no pipeline state bound");
                            invalid += 1;
                        }
                        record.draws += 1;
                    }
                    Command::Dispatch { .. } => {
                        if pipeline.is_none() {
                            log::warn!("Headless queue: dispatch with no pipeline state bound");
                            invalid += 1;
                        }
                        record.dispatches += 1;
                    }
                    Command::CopyBuffer { src, dst } => {
                        let data = resources.buffers.get(src).map(|b| b.data.clone());
                        match (data, resources.buffers.get_mut(dst)) {
                            (Some(data), Some(dst)) => {
                                let len = data.len().min(dst.data.len());
                                dst.data[..len].copy_from_slice(&data[..len]);
                            }
                            _ => {
                                log::warn!("Headless queue: copy between unknown buffers {src:?} -> {dst:?}");
                                invalid += 1;
                            }
                        }
                    }
                    Command::CopyTexture { src, dst } => {
                        let same_shape = match (resources.textures.get(src), resources.textures.get(dst)) {
                            (Some(a), Some(b)) => {
                                a.descriptor.width == b.descriptor.width
                                    && a.descriptor.height == b.descriptor.height
                                    && a.descriptor.format == b.descriptor.format
                            }
                            _ => true,
                        };
                        if !same_shape {
                            log::warn!("Headless queue: copy between mismatched textures {src:?} -> {dst:?}");
                            invalid += 1;
                        }
                    }
                    _ => {}
                }
            }
        }

        if depth != 0 {
            log::warn!(
                "Headless queue: {} left {depth} debug marker(s) open",
                submission.index
            );
            invalid += 1;
        }

        self.total_draws
            .fetch_add(u64::from(record.draws), Ordering::Relaxed);
        self.total_dispatches
            .fetch_add(u64::from(record.dispatches), Ordering::Relaxed);
        self.invalid_references.fetch_add(invalid, Ordering::Relaxed);
        log::trace!(
            "Headless queue: executed {} ({} commands, {} draws, {} dispatches)",
            record.index,
            record.commands,
            record.draws,
            record.dispatches
        );

        {
            let mut executed = self.executed.lock().unwrap_or_else(PoisonError::into_inner);
            if executed.len() == EXECUTED_HISTORY {
                executed.pop_front();
            }
            executed.push_back(record);
        }
        self.fence.signal(submission.fence);
    }
}

/// Owns the queue thread; dropping it closes the channel and joins.
#[derive(Debug)]
pub(crate) struct QueueThread {
    sender: Option<flume::Sender<Submission>>,
    handle: Option<JoinHandle<()>>,
}

impl QueueThread {
    pub(crate) fn spawn(shared: Arc<QueueShared>, latency: Duration) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded::<Submission>();
        let handle = std::thread::Builder::new()
            .name("umbra-headless-queue".into())
            .spawn(move || {
                log::debug!("Headless queue thread started.");
                while let Ok(submission) = receiver.recv() {
                    if !latency.is_zero() {
                        std::thread::sleep(latency);
                    }
                    shared.execute(submission);
                }
                log::debug!("Headless queue thread stopped.");
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Closes the channel and joins the thread, as if the device was lost.
    #[cfg(test)]
    pub(crate) fn shut_down(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub(crate) fn submit(&self, submission: Submission) -> bool {
        self.sender
            .as_ref()
            .is_some_and(|s| s.send(submission).is_ok())
    }
}

impl Drop for QueueThread {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Headless queue thread panicked.");
            }
        }
    }
}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission")
            .field("index", &self.index)
            .field("fence", &self.fence)
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_wait_returns_once_signalled() {
        let shared = Arc::new(QueueShared::default());
        let queue = QueueThread::spawn(Arc::clone(&shared), Duration::from_millis(5)).unwrap();
        assert!(queue.submit(Submission {
            index: CommandListIndex(1),
            fence: FenceValue(1),
            commands: vec![Command::BeginEvent("a".into()), Command::EndEvent],
        }));
        shared.fence.wait(FenceValue(1));
        assert_eq!(shared.fence.completed(), FenceValue(1));
        let executed = shared.executed.lock().unwrap();
        assert_eq!(executed[0].markers, vec!["a".to_string()]);
        assert_eq!(shared.invalid_references.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn draw_without_pipeline_counts_as_invalid() {
        let shared = QueueShared::default();
        shared.execute(Submission {
            index: CommandListIndex(1),
            fence: FenceValue(1),
            commands: vec![Command::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }],
        });
        assert_eq!(shared.invalid_references.load(Ordering::Relaxed), 1);
        assert_eq!(shared.total_draws.load(Ordering::Relaxed), 1);
    }
}
