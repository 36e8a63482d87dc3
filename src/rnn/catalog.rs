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

//! Gate groups and matrix kinds per recurrent cell.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rnn::config::CellType;

/// Number of linear-transform groups a cell evaluates per step.
pub const fn gate_group_count(cell: CellType) -> usize {
    match cell {
        CellType::Relu | CellType::Tanh => 1,
        CellType::Gru => 3,
        CellType::Lstm => 4,
    }
}

/// Which operand a weight matrix projects into gate space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixKind {
    /// Layer input (raw features at layer 0, previous layer output above).
    Input,
    /// Previous hidden state of the same layer.
    Hidden,
}

impl MatrixKind {
    /// Per-layer emission order.
    pub const ALL: [MatrixKind; 2] = [MatrixKind::Input, MatrixKind::Hidden];
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixKind::Input => write!(f, "Wx"),
            MatrixKind::Hidden => write!(f, "Wh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_counts() {
        assert_eq!(gate_group_count(CellType::Relu), 1);
        assert_eq!(gate_group_count(CellType::Tanh), 1);
        assert_eq!(gate_group_count(CellType::Gru), 3);
        assert_eq!(gate_group_count(CellType::Lstm), 4);
    }

    #[test]
    fn input_precedes_hidden() {
        assert_eq!(MatrixKind::ALL, [MatrixKind::Input, MatrixKind::Hidden]);
    }
}
