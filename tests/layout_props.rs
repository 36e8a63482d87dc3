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

use proptest::prelude::*;

use mind_rnn::rnn::{
    compute_total_size, gate_group_count, ordered_slots, BiasMode, BiasPlacement, CellType,
    Direction, InputMode, MatrixKind, ParamLayout, RnnConfig, RnnParams, Slot,
};
use mind_rnn::runtime::{allocate, BackendTarget, DataType};

fn arb_config() -> impl Strategy<Value = RnnConfig> {
    (
        1usize..6,
        1usize..5,
        1usize..9,
        prop::sample::select(CellType::ALL.to_vec()),
        prop::bool::ANY,
        prop::bool::ANY,
        prop::bool::ANY,
        prop::bool::ANY,
    )
        .prop_map(
            |(hidden, layers, input, cell, bidirectional, skip, bias, trailing)| {
                RnnConfig::new(cell, hidden, layers, input)
                    .unwrap()
                    .with_direction(if bidirectional {
                        Direction::Bidirectional
                    } else {
                        Direction::Unidirectional
                    })
                    .with_input_mode(if skip { InputMode::Skip } else { InputMode::Linear })
                    .with_bias_mode(if bias { BiasMode::Present } else { BiasMode::None })
                    .with_bias_placement(if trailing {
                        BiasPlacement::Trailing
                    } else {
                        BiasPlacement::Interleaved
                    })
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn slots_tile_the_buffer(config in arb_config()) {
        let layout = ParamLayout::build(&config).unwrap();
        let mut cursor = 0usize;
        for (_, range) in layout.iter() {
            prop_assert_eq!(range.offset, cursor);
            prop_assert!(range.len > 0);
            cursor = range.end();
        }
        prop_assert_eq!(cursor, layout.total_size());
        prop_assert_eq!(compute_total_size(&config).unwrap(), layout.total_size());
    }

    #[test]
    fn skip_suppresses_exactly_layer_zero_input(config in arb_config()) {
        let slots = ordered_slots(&config).unwrap();
        let gates = gate_group_count(config.cell());
        for layer in 0..config.num_layers() {
            for direction in 0..config.directions() {
                for gate in 0..gates {
                    let slot = Slot::weight(layer, direction, MatrixKind::Input, gate);
                    let suppressed = layer == 0 && config.input_mode() == InputMode::Skip;
                    prop_assert_eq!(slots.contains(&slot), !suppressed);
                    prop_assert!(slots.contains(&Slot::weight(
                        layer,
                        direction,
                        MatrixKind::Hidden,
                        gate
                    )));
                }
            }
        }
    }

    #[test]
    fn layout_is_deterministic(config in arb_config()) {
        let a = RnnParams::new(config.clone()).unwrap();
        let b = ParamLayout::build(&config).unwrap();
        prop_assert_eq!(a.slots(), b.slots());
        for slot in b.slots() {
            prop_assert_eq!(a.locate(slot).unwrap(), b.locate(slot).unwrap());
        }
    }

    #[test]
    fn writes_round_trip_and_stay_local(
        config in arb_config(),
        pick in any::<prop::sample::Index>(),
        seed in any::<u32>(),
    ) {
        let params = RnnParams::new(config).unwrap();
        let slots = params.slots().to_vec();
        let target = slots[pick.index(slots.len())];
        let mut buf =
            allocate(BackendTarget::Hip, DataType::F32, params.total_size()).unwrap();

        for slot in &slots {
            let len = params.locate(slot).unwrap().len;
            params.write_slot(&mut buf, slot, &vec![-1.0f32; len]).unwrap();
        }

        let len = params.locate(&target).unwrap().len;
        let values: Vec<f32> = (0..len).map(|i| (seed as usize + i) as f32).collect();
        params.write_slot(&mut buf, &target, &values).unwrap();

        for slot in &slots {
            let back: Vec<f32> = params.read_slot(&buf, slot).unwrap();
            if *slot == target {
                prop_assert_eq!(&back, &values);
            } else {
                prop_assert!(back.iter().all(|v| *v == -1.0));
            }
        }
    }
}
