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

//! The UI overlay drawn over the resolved frame.
//!
//! Overlay renderers are plugged in by the application; the overlay only
//! owns them and records them in registration order on the main render
//! target.

use std::collections::VecDeque;

use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, Rhi,
};
use umbra_core::FrameTime;

use super::post_processing::BACKBUFFER_FORMAT;
use crate::system::{OwnedResources, RenderSystem};

/// Something drawn on top of the final image.
pub trait OverlayRenderer: Send + Sync + std::fmt::Debug {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Records the overlay. The main render target is bound.
    fn record(&mut self, rhi: &dyn Rhi, time: &FrameTime);

    /// Releases GPU resources owned by the renderer.
    fn release(&mut self, _rhi: &dyn Rhi) {}
}

/// The overlay renderers, in draw order.
#[derive(Debug, Default)]
pub struct UiOverlay {
    renderers: Vec<Box<dyn OverlayRenderer>>,
}

impl UiOverlay {
    /// An overlay with no renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a renderer.
    pub fn add(&mut self, renderer: Box<dyn OverlayRenderer>) {
        log::debug!("UiOverlay: added '{}'", renderer.name());
        self.renderers.push(renderer);
    }

    /// Number of renderers.
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Whether no renderer is registered.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Records every renderer over the main render target.
    pub fn draw(&mut self, rhi: &dyn Rhi, time: &FrameTime) {
        if self.renderers.is_empty() {
            return;
        }
        rhi.set_main_render_target();
        rhi.set_depth_stencil_state(DepthStencilState::Disabled);
        rhi.set_blend_state(BlendState::AlphaBlend);
        for renderer in &mut self.renderers {
            renderer.record(rhi, time);
        }
        rhi.set_blend_state(BlendState::Disabled);
    }
}

impl RenderSystem for UiOverlay {
    fn name(&self) -> &'static str {
        "UiOverlay"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        for renderer in &mut self.renderers {
            renderer.release(rhi);
        }
        self.renderers.clear();
    }
}

/// Number of frame times the graph keeps.
pub const FRAME_TIME_HISTORY: usize = 64;

/// A frame time graph in the corner of the screen.
#[derive(Debug)]
pub struct FrameTimeOverlay {
    resources: OwnedResources,
    pipeline: PipelineStateId,
    history: VecDeque<f32>,
}

impl FrameTimeOverlay {
    /// Compiles the graph pipeline.
    pub fn new(rhi: &dyn Rhi) -> Result<Self, ResourceError> {
        let (resources, pipeline) = OwnedResources::create_with("FrameTimeOverlay", rhi, |res| {
            res.pipeline(
                rhi,
                &PipelineStateDescriptor::graphics("ui_frame_graph", vec![BACKBUFFER_FORMAT], None).with_states(
                    DepthStencilState::Disabled,
                    RasterizerState::CullNone,
                    BlendState::AlphaBlend,
                ),
            )
        })?;
        Ok(Self {
            resources,
            pipeline,
            history: VecDeque::with_capacity(FRAME_TIME_HISTORY),
        })
    }

    /// The recorded frame times in milliseconds, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }
}

impl OverlayRenderer for FrameTimeOverlay {
    fn name(&self) -> &str {
        "frame time"
    }

    fn record(&mut self, rhi: &dyn Rhi, time: &FrameTime) {
        if self.history.len() == FRAME_TIME_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((time.delta * 1000.0) as f32);

        let mut samples = [0f32; FRAME_TIME_HISTORY];
        for (slot, value) in samples.iter_mut().zip(&self.history) {
            *slot = *value;
        }
        rhi.set_pipeline_state(self.pipeline);
        rhi.set_constants(0, bytemuck::cast_slice(&samples));
        // one quad per bar
        rhi.draw(6, self.history.len() as u32, 0, 0);
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{rhi, submit};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Counting(Arc<AtomicUsize>);

    impl OverlayRenderer for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn record(&mut self, _rhi: &dyn Rhi, _time: &FrameTime) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn records_renderers_every_draw() {
        let rhi = rhi();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut overlay = UiOverlay::new();
        overlay.add(Box::new(Counting(Arc::clone(&calls))));
        overlay.add(Box::new(FrameTimeOverlay::new(rhi.as_ref()).unwrap()));
        assert_eq!(overlay.len(), 2);

        let time = FrameTime {
            total: 0.016,
            delta: 0.016,
            frame_index: 1,
        };
        for _ in 0..2 {
            submit(rhi.as_ref(), |rhi| overlay.draw(rhi, &time));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rhi.total_draws(), 2);

        overlay.release(rhi.as_ref());
        assert!(overlay.is_empty());
        assert_eq!(rhi.live_resource_counts()[3], 0);
    }

    #[test]
    fn frame_graph_keeps_a_bounded_history() {
        let rhi = rhi();
        let mut graph = FrameTimeOverlay::new(rhi.as_ref()).unwrap();
        submit(rhi.as_ref(), |rhi| {
            for i in 0..(FRAME_TIME_HISTORY + 10) {
                let time = FrameTime {
                    total: i as f64,
                    delta: 0.001 * i as f64,
                    frame_index: i as u64,
                };
                graph.record(rhi, &time);
            }
        });
        let history: Vec<f32> = graph.history().collect();
        assert_eq!(history.len(), FRAME_TIME_HISTORY);
        assert!((history[0] - 10.0).abs() < 1e-3);
    }
}
