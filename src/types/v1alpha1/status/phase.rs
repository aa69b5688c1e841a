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

use k8s_openapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Lifecycle phase of an Instance
/// - Initializing: at least one initializer token is still pending
/// - Initialized: every initializer has completed, the instance is live
#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[schemars(rename_all = "PascalCase")]
pub enum Phase {
    #[strum(to_string = "Initializing")]
    #[default]
    Initializing,

    #[strum(to_string = "Initialized")]
    Initialized,
}
