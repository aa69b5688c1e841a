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
use crate::context::Context;
use crate::initializer::Initializer;
use crate::initializer::csr::CsrInitializer;
use crate::reconcile::{error_policy, reconcile_instance};
use crate::store::{KubeStore, ObjectStore};
use crate::types::v1alpha1::instance::Instance;
use futures::StreamExt;
use kube::CustomResourceExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
mod context;
pub mod initializer;
pub mod reconcile;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    info!(
        "starting instance initializer, poll interval {:?}, missing secrets are {}",
        config.poll_interval(),
        config.missing_secret_policy
    );

    let client = Client::try_default().await?;
    let instance_client = Api::<Instance>::all(client.clone());

    let store: Arc<dyn ObjectStore> = Arc::new(KubeStore::new(client.clone()));
    let initializers: Vec<Arc<dyn Initializer<Instance>>> =
        vec![Arc::new(CsrInitializer::new(store, &config))];

    let context = Context::new(client, config, initializers);
    Controller::new(instance_client, watcher::Config::default())
        .run(reconcile_instance, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((instance, _)) => info!("reconciled instance {:?}", instance.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Instance::crd())?.as_bytes())
        .await?;

    Ok(())
}
