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

//! Annotation protocol describing where a secret's certificate is in the
//! `Pending -> Approved -> Ready` progression.

use crate::types::v1alpha1::instance::ANNOTATION_PREFIX;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Annotation on a secret holding its [`ResourceStatus`].
pub const RESOURCE_STATUS_KEY: &str = const_str::concat!(ANNOTATION_PREFIX, "resource-status");

/// Recognized values of [`RESOURCE_STATUS_KEY`], matched case-sensitively.
///
/// Only `Pending -> Approved` is performed by the operator, `Approved -> Ready`
/// belongs to the certificate authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum ResourceStatus {
    #[strum(serialize = "Pending")]
    Pending,

    #[strum(serialize = "Approved")]
    Approved,

    #[strum(serialize = "Ready")]
    Ready,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateState {
    /// No status annotation, the secret is not managed through this protocol.
    Unmanaged,

    Known(ResourceStatus),

    /// Annotation present with a value outside [`ResourceStatus`].
    Unrecognized(String),
}

impl CertificateState {
    pub fn of(secret: &corev1::Secret) -> Self {
        match secret.annotations().get(RESOURCE_STATUS_KEY) {
            None => Self::Unmanaged,
            Some(value) => match ResourceStatus::from_str(value) {
                Ok(status) => Self::Known(status),
                Err(_) => Self::Unrecognized(value.clone()),
            },
        }
    }

    /// Unmanaged and ready secrets never hold an instance back.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Unmanaged | Self::Known(ResourceStatus::Ready))
    }
}

pub fn set_resource_status(secret: &mut corev1::Secret, status: ResourceStatus) {
    secret
        .annotations_mut()
        .insert(RESOURCE_STATUS_KEY.to_owned(), status.to_string());
}
