// Copyright 2025 RustFS Team
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

pub mod phase;

use kube::KubeSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub phase: phase::Phase,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_initializers: Vec<String>,
}

impl Status {
    /// status derived from the pending initializer list
    pub fn from_initializers(pending: &[String]) -> Self {
        let phase = if pending.is_empty() {
            phase::Phase::Initialized
        } else {
            phase::Phase::Initializing
        };

        Self {
            phase,
            pending_initializers: pending.to_vec(),
        }
    }
}
