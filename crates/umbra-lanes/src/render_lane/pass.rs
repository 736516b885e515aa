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

//! Pass tags, marker scopes and the pass dependency schedule.

use std::collections::BTreeSet;

use umbra_core::event::{EventBus, FrameEvent};
use umbra_core::graph::{topological_sort, SortError};
use umbra_core::renderer::Rhi;
use umbra_core::{EngineError, Stopwatch};

/// Tags of the Draw passes, as they appear in markers and frame events.
pub mod tags {
    /// Frustum culling of the scene objects.
    pub const GPU_CULLING: &str = "GPU Culling";
    /// Objects, terrain and foliage into the geometry buffer.
    pub const GBUFFER: &str = "GBuffer";
    /// Cascaded shadow maps of the sun.
    pub const SHADOW_MAPS: &str = "Shadow Maps";
    /// Probe bake and dynamic global illumination.
    pub const GLOBAL_ILLUMINATION: &str = "Dynamic Global Illumination";
    /// Point lights.
    pub const LOCAL_ILLUMINATION: &str = "Local Illumination";
    /// Editor gizmos, only when enabled.
    pub const DEBUG_GIZMOS: &str = "Debug Gizmos";
    /// Lighting resolve into the HDR target.
    pub const COMPOSITE_ILLUMINATION: &str = "Composite Illumination";
    /// Froxel fog.
    pub const VOLUMETRIC_FOG: &str = "Volumetric Fog";
    /// Raymarched clouds.
    pub const VOLUMETRIC_CLOUDS: &str = "Volumetric Clouds";
    /// Post effects and the resolve into the backbuffer.
    pub const POST_PROCESSING: &str = "Post Processing";
    /// UI drawn over the final image.
    pub const UI_OVERLAY: &str = "UI Overlay";
}

/// The order the orchestrator records its Draw passes in.
pub const DRAW_ORDER: [&str; 11] = [
    tags::GPU_CULLING,
    tags::GBUFFER,
    tags::SHADOW_MAPS,
    tags::GLOBAL_ILLUMINATION,
    tags::LOCAL_ILLUMINATION,
    tags::DEBUG_GIZMOS,
    tags::COMPOSITE_ILLUMINATION,
    tags::VOLUMETRIC_FOG,
    tags::VOLUMETRIC_CLOUDS,
    tags::POST_PROCESSING,
    tags::UI_OVERLAY,
];

/// [`DRAW_ORDER`], without the gizmo pass when gizmos are off.
pub fn draw_order(debug_gizmos: bool) -> Vec<&'static str> {
    DRAW_ORDER
        .iter()
        .copied()
        .filter(|tag| debug_gizmos || *tag != tags::DEBUG_GIZMOS)
        .collect()
}

/// A debug marker around one pass.
///
/// Opening the scope begins an RHI event and publishes
/// [`FrameEvent::PassBegin`]; dropping it ends the event and publishes
/// [`FrameEvent::PassEnd`] with the CPU time spent recording.
pub struct PassScope<'a> {
    rhi: &'a dyn Rhi,
    events: &'a EventBus<FrameEvent>,
    tag: &'static str,
    frame: u64,
    stopwatch: Stopwatch,
}

impl<'a> PassScope<'a> {
    /// Opens the scope of pass `tag` in frame `frame`.
    pub fn begin(
        rhi: &'a dyn Rhi,
        events: &'a EventBus<FrameEvent>,
        tag: &'static str,
        frame: u64,
    ) -> Self {
        rhi.begin_event(tag);
        events.publish(FrameEvent::PassBegin { tag, frame });
        Self {
            rhi,
            events,
            tag,
            frame,
            stopwatch: Stopwatch::new(),
        }
    }

    /// The pass tag.
    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Drop for PassScope<'_> {
    fn drop(&mut self) {
        self.rhi.end_event();
        self.events.publish(FrameEvent::PassEnd {
            tag: self.tag,
            frame: self.frame,
            cpu_time_us: self.stopwatch.elapsed_us(),
        });
    }
}

/// Draw passes and the textures that flow between them, as a graph.
///
/// The recorded order is fixed in code; the schedule derives an order from
/// the declared dependencies alone and checks the two agree.
#[derive(Debug, Clone, Default)]
pub struct PassSchedule {
    passes: BTreeSet<&'static str>,
    dependencies: Vec<(&'static str, &'static str)>,
}

impl PassSchedule {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a pass.
    pub fn pass(mut self, tag: &'static str) -> Self {
        self.passes.insert(tag);
        self
    }

    /// Declares that `after` reads something `before` writes.
    pub fn depends(mut self, before: &'static str, after: &'static str) -> Self {
        self.dependencies.push((before, after));
        self
    }

    /// The dependencies of the engine's Draw passes.
    pub fn standard(debug_gizmos: bool) -> Self {
        use tags::*;
        let mut schedule = draw_order(debug_gizmos)
            .into_iter()
            .fold(Self::new(), Self::pass)
            // visibility
            .depends(GPU_CULLING, GBUFFER)
            // cascades are fitted to the geometry buffer depth
            .depends(GBUFFER, SHADOW_MAPS)
            .depends(SHADOW_MAPS, GLOBAL_ILLUMINATION)
            .depends(GBUFFER, LOCAL_ILLUMINATION)
            .depends(GLOBAL_ILLUMINATION, LOCAL_ILLUMINATION)
            .depends(LOCAL_ILLUMINATION, COMPOSITE_ILLUMINATION)
            .depends(COMPOSITE_ILLUMINATION, VOLUMETRIC_FOG)
            .depends(VOLUMETRIC_FOG, VOLUMETRIC_CLOUDS)
            .depends(VOLUMETRIC_CLOUDS, POST_PROCESSING)
            .depends(POST_PROCESSING, UI_OVERLAY);
        if debug_gizmos {
            schedule = schedule
                .depends(LOCAL_ILLUMINATION, DEBUG_GIZMOS)
                .depends(DEBUG_GIZMOS, COMPOSITE_ILLUMINATION);
        }
        schedule
    }

    /// Number of declared passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether no pass is declared.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// An order satisfying every dependency; ties break by tag.
    pub fn resolve(&self) -> Result<Vec<&'static str>, EngineError> {
        topological_sort(self.passes.iter().copied(), self.dependencies.iter().copied()).map_err(
            |e| match e {
                SortError::Cycle(passes) => {
                    EngineError::Schedule(format!("dependency cycle between {passes:?}"))
                }
                SortError::UnknownNode(pass) => {
                    EngineError::Schedule(format!("dependency on undeclared pass '{pass}'"))
                }
            },
        )
    }

    /// Checks that `order` is exactly the order the dependencies imply.
    pub fn check_order(&self, order: &[&'static str]) -> Result<(), EngineError> {
        let resolved = self.resolve()?;
        if resolved != order {
            return Err(EngineError::Schedule(format!(
                "recorded order {order:?} differs from dependency order {resolved:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{rhi, submit};

    #[test]
    fn standard_schedule_matches_recorded_order() {
        for gizmos in [false, true] {
            let schedule = PassSchedule::standard(gizmos);
            schedule.check_order(&draw_order(gizmos)).unwrap();
        }
    }

    #[test]
    fn swapped_order_is_rejected() {
        let mut order = draw_order(false);
        order.swap(2, 3);
        let err = PassSchedule::standard(false).check_order(&order).unwrap_err();
        assert!(matches!(err, EngineError::Schedule(_)));
    }

    #[test]
    fn cycles_and_unknown_passes_are_schedule_errors() {
        let cycle = PassSchedule::new()
            .pass("a")
            .pass("b")
            .depends("a", "b")
            .depends("b", "a");
        assert!(matches!(cycle.resolve(), Err(EngineError::Schedule(_))));

        let unknown = PassSchedule::new().pass("a").depends("a", "ghost");
        assert!(matches!(unknown.resolve(), Err(EngineError::Schedule(_))));
    }

    #[test]
    fn scope_publishes_begin_and_end() {
        let rhi = rhi();
        let events = EventBus::new();
        submit(rhi.as_ref(), |rhi| {
            let scope = PassScope::begin(rhi, &events, tags::SHADOW_MAPS, 7);
            assert_eq!(scope.tag(), tags::SHADOW_MAPS);
        });
        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(
            drained[0],
            FrameEvent::PassBegin { tag: tags::SHADOW_MAPS, frame: 7 }
        ));
        assert!(matches!(
            drained[1],
            FrameEvent::PassEnd { tag: tags::SHADOW_MAPS, frame: 7, .. }
        ));
    }
}
