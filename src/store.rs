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

use crate::types;
use crate::types::v1alpha1::instance::Instance;
use async_trait::async_trait;
use futures::TryFutureExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use snafu::Snafu;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} '{}/{}' not found", kind, namespace, name))]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("{} '{}/{}' was modified concurrently", kind, namespace, name))]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    fn from_kube(source: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        let code = match &source {
            kube::Error::Api(resp) => Some(resp.code),
            _ => None,
        };

        match code {
            Some(404) => Error::NotFound {
                kind: kind.to_owned(),
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            },
            Some(409) => Error::Conflict {
                kind: kind.to_owned(),
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            },
            _ => Error::Kube { source },
        }
    }
}

/// The persisted objects an initializer reads and writes.
///
/// Writes carry the object's `resourceVersion`, a concurrent writer surfaces as
/// [`Error::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error>;

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, Error>;

    async fn update_instance(&self, instance: &Instance) -> Result<Instance, Error>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .map_err(|e| Error::from_kube(e, "Secret", namespace, name))
            .await
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let name = secret.name_any();
        api.replace(&name, &PostParams::default(), secret)
            .map_err(|e| Error::from_kube(e, "Secret", namespace, &name))
            .await
    }

    async fn update_instance(&self, instance: &Instance) -> Result<Instance, Error> {
        let namespace = instance.namespace()?;
        let name = instance.name();
        let api: Api<Instance> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), instance)
            .map_err(|e| Error::from_kube(e, "Instance", &namespace, &name))
            .await
    }
}
