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

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use anyhow::Result;
use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    CommandListError, CommandListIndex, PipelineStateDescriptor, ResourceState, Rhi, RhiError,
    TextureDescriptor, TextureFormat,
};
use umbra_infra::{HeadlessConfig, HeadlessRhi};

fn record_frame(rhi: &HeadlessRhi, list: CommandListIndex) -> Result<()> {
    rhi.begin_graphics_command_list(list)?;
    rhi.set_main_render_target();
    rhi.clear_main_render_target(LinearRgba::BLACK);
    rhi.clear_main_depth_stencil_target(1.0, 0);
    rhi.begin_event("Frame");
    rhi.end_event();
    rhi.transition_main_render_target_to_present();
    rhi.end_graphics_command_list(list)?;
    Ok(())
}

#[test]
fn frames_in_flight_are_bounded_by_fences() -> Result<()> {
    let rhi = HeadlessRhi::new(HeadlessConfig {
        frames_in_flight: 2,
        simulated_latency: Duration::from_millis(2),
        ..Default::default()
    })?;
    let mut fences = Vec::new();
    for frame in 0..8u64 {
        let list = CommandListIndex::for_frame(frame, rhi.frames_in_flight());
        if frame >= 2 {
            rhi.wait_for_fence(fences[frame as usize - 2])?;
        }
        record_frame(&rhi, list)?;
        fences.push(rhi.execute_command_lists(list)?);
        rhi.present_graphics()?;
    }
    rhi.wait_for_gpu_on_graphics_fence()?;
    assert_eq!(rhi.completed_fence_value(), *fences.last().unwrap());
    assert_eq!(rhi.present_count(), 8);
    assert_eq!(rhi.invalid_references(), 0);
    Ok(())
}

#[test]
fn presented_backbuffer_ends_in_present_state() -> Result<()> {
    let rhi = HeadlessRhi::new(HeadlessConfig::default())?;
    let list = CommandListIndex::for_frame(0, rhi.frames_in_flight());
    let target = rhi.main_render_target();
    record_frame(&rhi, list)?;
    rhi.execute_command_lists(list)?;
    rhi.wait_for_gpu_on_graphics_fence()?;
    assert_eq!(rhi.texture_state(target), Some(ResourceState::Present));
    Ok(())
}

#[test]
fn execute_twice_is_refused_before_submission() -> Result<()> {
    let rhi = HeadlessRhi::new(HeadlessConfig::default())?;
    let list = CommandListIndex::PREPARE;
    rhi.begin_graphics_command_list(list)?;
    rhi.end_graphics_command_list(list)?;
    rhi.execute_command_lists(list)?;
    let second = panic::catch_unwind(AssertUnwindSafe(|| rhi.execute_command_lists(list)));
    if cfg!(debug_assertions) {
        assert!(second.is_err(), "debug builds assert on the violation");
    } else {
        assert!(matches!(
            second,
            Ok(Err(RhiError::CommandList(CommandListError::NotBegun(_))))
        ));
    }
    rhi.wait_for_gpu_on_graphics_fence()?;
    assert_eq!(rhi.executed_lists().len(), 1);
    Ok(())
}

#[test]
fn draws_with_a_bound_pipeline_are_counted() -> Result<()> {
    let rhi = HeadlessRhi::new(HeadlessConfig::default())?;
    let gbuffer = rhi.create_texture(&TextureDescriptor::render_target(
        "Albedo",
        64,
        64,
        TextureFormat::Rgba8UnormSrgb,
    ))?;
    let pipeline = rhi.create_pipeline_state(&PipelineStateDescriptor::graphics(
        "gbuffer/standard",
        vec![TextureFormat::Rgba8UnormSrgb],
        None,
    ))?;

    let list = CommandListIndex(1);
    rhi.begin_graphics_command_list(list)?;
    rhi.set_render_targets(&[gbuffer], None);
    rhi.set_pipeline_state(pipeline);
    rhi.set_constants(0, &[0u8; 64]);
    rhi.draw(36, 1, 0, 0);
    rhi.draw(6, 10, 0, 0);
    rhi.transition_resource(gbuffer, ResourceState::ShaderResource);
    rhi.end_graphics_command_list(list)?;
    rhi.execute_command_lists(list)?;
    rhi.wait_for_gpu_on_graphics_fence()?;

    assert_eq!(rhi.total_draws(), 2);
    assert_eq!(rhi.texture_state(gbuffer), Some(ResourceState::ShaderResource));
    rhi.destroy_pipeline_state(pipeline)?;
    rhi.destroy_texture(gbuffer)?;
    Ok(())
}
