// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Write/read round-trip sweep over a grid of recurrent configurations.
//!
//! For every configuration the sweep tags each slot with a value derived from
//! its packed coordinate, writes all slots through the packed address path,
//! and checks the whole buffer against a reference filled in layout order.
//! It then reads every slot back and checks its tag.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rnn::{
    packed_ids_per_layer, pseudo_layer_count, BiasMode, BiasPlacement, CellType, Direction,
    InputMode, RnnConfig, RnnError, RnnParams, Slot, SlotRole,
};
use crate::runtime::{allocate, BackendTarget, DataType, DeviceMemory};

/// Parameter grid; every combination is one configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepGrid {
    pub num_layers: Vec<usize>,
    pub input_sizes: Vec<usize>,
    pub hidden_sizes: Vec<usize>,
    pub cells: Vec<CellType>,
    pub bias_modes: Vec<BiasMode>,
    pub directions: Vec<Direction>,
    pub input_modes: Vec<InputMode>,
    pub bias_placements: Vec<BiasPlacement>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        SweepGrid {
            num_layers: vec![4, 8, 16],
            input_sizes: vec![2, 8, 16],
            hidden_sizes: vec![4, 8, 16],
            cells: vec![CellType::Relu, CellType::Lstm, CellType::Gru],
            bias_modes: vec![BiasMode::Present, BiasMode::None],
            directions: vec![Direction::Unidirectional, Direction::Bidirectional],
            input_modes: vec![InputMode::Skip, InputMode::Linear],
            bias_placements: vec![BiasPlacement::Interleaved],
        }
    }
}

impl SweepGrid {
    /// Reduced grid that still covers every mode combination.
    pub fn small() -> Self {
        SweepGrid {
            num_layers: vec![1, 3],
            input_sizes: vec![2, 5],
            hidden_sizes: vec![3],
            cells: CellType::ALL.to_vec(),
            bias_placements: vec![BiasPlacement::Interleaved, BiasPlacement::Trailing],
            ..SweepGrid::default()
        }
    }

    pub fn configs(&self) -> Result<Vec<RnnConfig>, RnnError> {
        let mut configs = Vec::new();
        for &num_layers in &self.num_layers {
            for &input_size in &self.input_sizes {
                for &hidden_size in &self.hidden_sizes {
                    for &cell in &self.cells {
                        for &bias_mode in &self.bias_modes {
                            for &direction in &self.directions {
                                for &input_mode in &self.input_modes {
                                    for &placement in &self.bias_placements {
                                        configs.push(
                                            RnnConfig::new(
                                                cell,
                                                hidden_size,
                                                num_layers,
                                                input_size,
                                            )?
                                            .with_bias_mode(bias_mode)
                                            .with_direction(direction)
                                            .with_input_mode(input_mode)
                                            .with_bias_placement(placement),
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(configs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepOptions {
    pub backend: BackendTarget,
    pub grid: SweepGrid,
}

/// Totals for a successful sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub configs: usize,
    pub slots: usize,
    pub elements: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("sweep failures: {0:?}")]
pub struct SweepFailure(pub Vec<String>);

pub fn run_sweep(opts: &SweepOptions) -> Result<SweepReport, SweepFailure> {
    let configs = opts
        .grid
        .configs()
        .map_err(|err| SweepFailure(vec![format!("grid: {err}")]))?;

    let mut report = SweepReport::default();
    let mut failures = Vec::new();
    for config in configs {
        match run_case(&config, opts.backend) {
            Ok((slots, elements)) => {
                report.configs += 1;
                report.slots += slots;
                report.elements += elements;
            }
            Err(msg) => failures.push(format!("{config} => {msg}")),
        }
    }

    info!(
        backend = %opts.backend,
        configs = report.configs,
        failures = failures.len(),
        "rnn parameter sweep finished"
    );

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(SweepFailure(failures))
    }
}

/// Tag stored in every element of a slot.
fn tag(pseudo_layer: usize, layer_id: usize, role: SlotRole) -> f32 {
    let base = (pseudo_layer * 10 + layer_id) as f32;
    match role {
        SlotRole::Weight => base,
        SlotRole::Bias => base + 0.5,
    }
}

fn run_case(config: &RnnConfig, backend: BackendTarget) -> Result<(usize, usize), String> {
    let params = RnnParams::new(config.clone()).map_err(|err| err.to_string())?;
    let layout = params.layout();

    let mut expected = vec![0f32; layout.total_size()];
    for (slot, range) in layout.iter() {
        let (pseudo, id) = slot.to_packed(config).map_err(|err| err.to_string())?;
        expected[range.as_range()].fill(tag(pseudo, id, slot.role));
    }

    let mut roles = vec![SlotRole::Weight];
    if config.has_bias() {
        roles.push(SlotRole::Bias);
    }

    let mut buffer =
        allocate(backend, DataType::F32, layout.total_size()).map_err(|err| err.to_string())?;
    let mut written = 0usize;
    for pseudo in 0..pseudo_layer_count(config) {
        for id in 0..packed_ids_per_layer(config, pseudo) {
            for &role in &roles {
                let slot = Slot::from_packed(config, pseudo, id, role)
                    .map_err(|err| err.to_string())?;
                let len = params.locate(&slot).map_err(|err| err.to_string())?.len;
                params
                    .write_slot(&mut buffer, &slot, &vec![tag(pseudo, id, role); len][..])
                    .map_err(|err| err.to_string())?;
                written += 1;
            }
        }
    }
    if written != layout.slots().len() {
        return Err(format!(
            "packed enumeration wrote {written} slots, layout has {}",
            layout.slots().len()
        ));
    }

    let bytes = buffer
        .read_bytes(0, buffer.byte_len())
        .map_err(|err| err.to_string())?;
    let actual: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
    if let Some(index) = actual.iter().zip(&expected).position(|(a, e)| a != e) {
        return Err(format!(
            "buffer mismatch at element {index}: wrote {}, expected {}",
            actual[index], expected[index]
        ));
    }

    for slot in layout.slots() {
        let (pseudo, id) = slot.to_packed(config).map_err(|err| err.to_string())?;
        let want = tag(pseudo, id, slot.role);
        let values: Vec<f32> = params
            .read_slot(&buffer, slot)
            .map_err(|err| err.to_string())?;
        if values.iter().any(|v| *v != want) {
            return Err(format!("slot {slot} read back a foreign value"));
        }
    }

    debug!(config = %config, slots = written, "sweep case passed");
    Ok((written, layout.total_size()))
}
