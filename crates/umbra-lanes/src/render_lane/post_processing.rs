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

//! The post-processing stack.
//!
//! The lighting passes resolve into an HDR target; the stack then runs its
//! effects through two ping-pong targets and resolves the result into the
//! backbuffer.

use bytemuck::{Pod, Zeroable};
use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, ResourceState, Rhi, TextureDescriptor, TextureFormat, TextureId,
};
use umbra_core::QualitySettings;

use crate::system::{FrameContext, OwnedResources, RenderSystem, Updatable};

/// Format of the HDR scene colour.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Format of the backbuffer the stack resolves into.
pub const BACKBUFFER_FORMAT: TextureFormat = TextureFormat::Bgra8UnormSrgb;

const EXPOSURE_ADAPTATION_RATE: f64 = 1.5;

/// One effect of the stack, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostEffect {
    /// Screen-space subsurface scattering.
    SubsurfaceScattering,
    /// Exposure and tone mapping.
    ToneMapping,
    /// Post-process anti-aliasing.
    AntiAliasing,
}

impl PostEffect {
    fn program(self) -> &'static str {
        match self {
            PostEffect::SubsurfaceScattering => "post_sss",
            PostEffect::ToneMapping => "post_tonemap",
            PostEffect::AntiAliasing => "post_aa",
        }
    }

    /// The effects enabled by `quality`.
    pub fn enabled_by(quality: &QualitySettings) -> Vec<PostEffect> {
        let mut effects = Vec::with_capacity(3);
        if quality.sss_enabled() {
            effects.push(PostEffect::SubsurfaceScattering);
        }
        effects.push(PostEffect::ToneMapping);
        if quality.aa_enabled() {
            effects.push(PostEffect::AntiAliasing);
        }
        effects
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PostConstants {
    exposure: f32,
    effect: u32,
    texel_size: [f32; 2],
}

/// HDR target, ping-pong targets and the effect chain.
#[derive(Debug)]
pub struct PostProcessingStack {
    resources: OwnedResources,
    hdr: TextureId,
    ping_pong: [TextureId; 2],
    effects: Vec<(PostEffect, PipelineStateId)>,
    resolve: PipelineStateId,
    texel_size: [f32; 2],
    exposure: f32,
    target_exposure: f32,
    output: TextureId,
}

impl PostProcessingStack {
    /// Creates the targets and compiles the effects `quality` enables.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings) -> Result<Self, ResourceError> {
        let (width, height) = (quality.width, quality.height);
        let enabled = PostEffect::enabled_by(quality);
        let (resources, (hdr, ping_pong, effects, resolve)) =
            OwnedResources::create_with("PostProcessingStack", rhi, |res| {
                let hdr = res.texture(rhi, &TextureDescriptor::render_target("post.hdr", width, height, HDR_FORMAT))?;
                let ping = res.texture(rhi, &TextureDescriptor::render_target("post.ping", width, height, HDR_FORMAT))?;
                let pong = res.texture(rhi, &TextureDescriptor::render_target("post.pong", width, height, HDR_FORMAT))?;
                let mut effects = Vec::with_capacity(enabled.len());
                for effect in &enabled {
                    let desc = PipelineStateDescriptor::graphics(effect.program(), vec![HDR_FORMAT], None)
                        .with_states(DepthStencilState::Disabled, RasterizerState::CullNone, BlendState::Disabled);
                    effects.push((*effect, res.pipeline(rhi, &desc)?));
                }
                let resolve = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("post_resolve", vec![BACKBUFFER_FORMAT], None)
                        .with_states(DepthStencilState::Disabled, RasterizerState::CullNone, BlendState::Disabled),
                )?;
                Ok((hdr, [ping, pong], effects, resolve))
            })?;
        log::info!("Post-processing stack: {enabled:?}");
        Ok(Self {
            resources,
            hdr,
            ping_pong,
            effects,
            resolve,
            texel_size: [1.0 / width as f32, 1.0 / height as f32],
            exposure: 1.0,
            target_exposure: 1.0,
            output: hdr,
        })
    }

    /// The HDR target the lighting passes and volumetrics write into.
    pub fn hdr_target(&self) -> TextureId {
        self.hdr
    }

    /// The enabled effects, in order.
    pub fn effects(&self) -> Vec<PostEffect> {
        self.effects.iter().map(|(effect, _)| *effect).collect()
    }

    /// Current exposure.
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Sets the exposure the stack adapts towards.
    pub fn set_target_exposure(&mut self, exposure: f32) {
        self.target_exposure = exposure.max(0.0);
    }

    /// Puts the targets in their sampled state; recorded in the prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        rhi.transition_resource(self.hdr, ResourceState::ShaderResource);
        for target in self.ping_pong {
            rhi.transition_resource(target, ResourceState::ShaderResource);
        }
    }

    /// Binds the HDR target for writing.
    pub fn bind_hdr(&self, rhi: &dyn Rhi) {
        rhi.transition_resource(self.hdr, ResourceState::RenderTarget);
        rhi.set_render_targets(&[self.hdr], None);
    }

    /// Starts the stack: the HDR target becomes the first input.
    pub fn begin(&mut self, rhi: &dyn Rhi) {
        rhi.transition_resource(self.hdr, ResourceState::ShaderResource);
        self.output = self.hdr;
    }

    fn constants(&self, effect: u32) -> PostConstants {
        PostConstants {
            exposure: self.exposure,
            effect,
            texel_size: self.texel_size,
        }
    }

    /// Runs every effect, alternating between the ping-pong targets.
    pub fn apply_effects(&mut self, rhi: &dyn Rhi) {
        for (index, (effect, pipeline)) in self.effects.iter().enumerate() {
            let target = self.ping_pong[index % 2];
            rhi.begin_event(effect.program());
            rhi.transition_resource(target, ResourceState::RenderTarget);
            rhi.set_render_targets(&[target], None);
            rhi.set_pipeline_state(*pipeline);
            rhi.set_constants(0, bytemuck::bytes_of(&self.constants(index as u32)));
            rhi.draw(3, 1, 0, 0);
            rhi.transition_resource(target, ResourceState::ShaderResource);
            rhi.end_event();
            self.output = target;
        }
    }

    /// Resolves the last output into the backbuffer.
    pub fn end(&mut self, rhi: &dyn Rhi) {
        rhi.set_main_render_target();
        rhi.set_pipeline_state(self.resolve);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants(u32::MAX)));
        rhi.draw(3, 1, 0, 0);
    }

    /// The texture the last effect wrote.
    pub fn output(&self) -> TextureId {
        self.output
    }
}

impl Updatable for PostProcessingStack {
    fn update(&mut self, frame: &FrameContext<'_>) {
        let blend = 1.0 - (-frame.time.delta * EXPOSURE_ADAPTATION_RATE).exp();
        self.exposure += (self.target_exposure - self.exposure) * blend as f32;
    }
}

impl RenderSystem for PostProcessingStack {
    fn name(&self) -> &'static str {
        "PostProcessingStack"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.effects.clear();
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{quality, rhi, submit};
    use umbra_core::renderer::Camera;
    use umbra_core::FrameTime;

    #[test]
    fn quality_picks_effects() {
        assert_eq!(PostEffect::enabled_by(&quality(0)), vec![PostEffect::ToneMapping]);
        assert_eq!(
            PostEffect::enabled_by(&quality(2)),
            vec![
                PostEffect::SubsurfaceScattering,
                PostEffect::ToneMapping,
                PostEffect::AntiAliasing
            ]
        );
    }

    #[test]
    fn effects_alternate_targets_and_resolve_to_backbuffer() {
        let rhi = rhi();
        let mut stack = PostProcessingStack::new(rhi.as_ref(), &quality(3)).unwrap();
        submit(rhi.as_ref(), |rhi| {
            stack.prepare(rhi);
            stack.begin(rhi);
            stack.apply_effects(rhi);
            stack.end(rhi);
        });
        // three effects plus the resolve
        assert_eq!(rhi.total_draws(), 4);
        assert_eq!(stack.output(), stack.ping_pong[0]);
    }

    #[test]
    fn exposure_adapts_monotonically() {
        let rhi = rhi();
        let mut stack = PostProcessingStack::new(rhi.as_ref(), &quality(1)).unwrap();
        stack.set_target_exposure(2.0);
        let camera = Camera::default();
        let mut last = stack.exposure();
        for _ in 0..10 {
            stack.update(&FrameContext {
                rhi: rhi.as_ref(),
                time: FrameTime {
                    total: 0.0,
                    delta: 0.016,
                    frame_index: 0,
                },
                camera: &camera,
            });
            assert!(stack.exposure() > last && stack.exposure() < 2.0);
            last = stack.exposure();
        }
    }
}
