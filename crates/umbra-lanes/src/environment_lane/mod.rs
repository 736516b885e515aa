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

//! Environment lane: terrain, foliage, wind and the volumetric fog and
//! clouds.

mod foliage;
mod terrain;
mod volumetric_clouds;
mod volumetric_fog;
mod wind;

pub use foliage::*;
pub use terrain::*;
pub use volumetric_clouds::*;
pub use volumetric_fog::*;
pub use wind::*;
