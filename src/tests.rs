//  Copyright 2025 RustFS Team
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http:www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

use crate::types::v1alpha1::certificate::RESOURCE_STATUS_KEY;
use crate::types::v1alpha1::instance::{Instance, InstanceSpec};

// Helper function to create a test instance (available to submodule tests via crate::tests)
pub fn create_test_instance(secrets: &[&str], initializers: &[&str]) -> Instance {
    Instance {
        metadata: metav1::ObjectMeta {
            name: Some("test-instance".to_string()),
            namespace: Some("default".to_string()),
            uid: Some("test-uid-123".to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: InstanceSpec {
            secrets: secrets
                .iter()
                .map(|name| corev1::LocalObjectReference {
                    name: name.to_string(),
                })
                .collect(),
            initializers: initializers.iter().map(|t| t.to_string()).collect(),
        },
        status: None,
    }
}

// Secret in the default namespace, `status` is written to the resource-status annotation
pub fn create_test_secret(name: &str, status: Option<&str>) -> corev1::Secret {
    corev1::Secret {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            annotations: status.map(|s| {
                [(RESOURCE_STATUS_KEY.to_string(), s.to_string())]
                    .into_iter()
                    .collect()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}
