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

use crate::initializer::Initializable;
use crate::types;
use crate::types::error::NoNamespaceSnafu;
use k8s_openapi::api::core::v1 as corev1;
use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

/// Prefix shared by every annotation and initializer token owned by the operator.
pub const ANNOTATION_PREFIX: &str = "rustfs.com/";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[kube(
    group = "rustfs.com",
    version = "v1alpha1",
    kind = "Instance",
    namespaced,
    status = "crate::types::v1alpha1::status::Status",
    derive = "PartialEq",
    shortname = "inst",
    plural = "instances",
    singular = "instance",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Pending", "type":"string", "jsonPath":".status.pendingInitializers"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// Secrets in the instance namespace carrying the instance credentials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<corev1::LocalObjectReference>,

    /// Initializer tokens that still have to complete before the instance is live.
    /// Filled in at admission, each initializer removes its own token.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initializers: Vec<String>,
}

impl Instance {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    /// names of the referenced secrets, in declaration order
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.spec.secrets.iter().map(|s| s.name.as_str())
    }
}

impl Initializable for Instance {
    fn initializers(&self) -> &[String] {
        &self.spec.initializers
    }

    fn initializers_mut(&mut self) -> &mut Vec<String> {
        &mut self.spec.initializers
    }
}
