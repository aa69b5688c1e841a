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

use crate::config::Config;
use crate::initializer::{Initializable, Initializer};
use crate::types;
use crate::types::v1alpha1::instance::Instance;
use crate::types::v1alpha1::status::Status;
use k8s_openapi::NamespaceResourceScope;
use kube::api::PostParams;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, api::Api};
use serde::de::DeserializeOwned;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Serde { source: serde_json::Error },
}

impl Error {
    fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(resp),
            } => Some(resp.code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }
}

pub struct Context {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
    pub(crate) config: Config,
    pub(crate) initializers: Vec<Arc<dyn Initializer<Instance>>>,
}

impl Context {
    pub fn new(
        client: kube::Client,
        config: Config,
        initializers: Vec<Arc<dyn Initializer<Instance>>>,
    ) -> Self {
        let reporter = Reporter {
            controller: "instance-initializer".into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            config,
            initializers,
        }
    }

    /// send event
    #[inline]
    pub async fn record(
        &self,
        resource: &Instance,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Initialize".into(),
                    secondary: None,
                },
                &resource.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }

    /// Mirrors the pending initializer list into the status subresource.
    /// Nothing is written when the status is already current.
    pub async fn update_status(&self, resource: &Instance) -> Result<Instance, Error> {
        let status = Status::from_initializers(resource.initializers());
        if resource.status.as_ref() == Some(&status) {
            return Ok(resource.clone());
        }

        let api: Api<Instance> = Api::namespaced(self.client.clone(), &resource.namespace()?);
        let name = &resource.name();

        let update_func = async |instance: &Instance| {
            let mut instance = instance.clone();
            instance.status = Some(status.clone());
            let body = serde_json::to_vec(&instance)?;

            api.replace_status(name, &PostParams::default(), &instance)
                .context(KubeSnafu)
                .await
        };

        match update_func(resource).await {
            Err(e) if e.is_conflict() => {}
            res => return res,
        }

        info!("status update failed due to conflict, retrieve the latest resource and retry.");

        let new_one = api.get(name).context(KubeSnafu).await?;
        update_func(&new_one).await
    }

    pub async fn get<T>(&self, name: &str, namespace: &str) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).context(KubeSnafu).await
    }
}
