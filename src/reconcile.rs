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
use crate::initializer::{Initializable, Initializer};
use crate::types::v1alpha1::instance::Instance;
use crate::{context, initializer, types};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::Snafu;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("initializer {} failed: {}", token, source))]
    Initializer {
        token: String,
        source: initializer::Error,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Context { source } => source.is_not_found(),
            _ => false,
        }
    }

    /// API failures outside the initializers are assumed transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Context { .. } => true,
            Error::Types { .. } => false,
            Error::Initializer { source, .. } => source.is_retryable(),
        }
    }
}

/// Result of offering an instance to every registered initializer once.
#[derive(Debug)]
pub struct Pass {
    /// latest persisted instance
    pub instance: Instance,

    /// tokens removed during this pass
    pub completed: Vec<String>,

    /// tokens whose initializer asked to be invoked again later
    pub waiting: Vec<String>,
}

/// Invokes, in registration order, every initializer whose token is still pending.
///
/// A skipping initializer does not stop the pass, later initializers gate
/// themselves on the tokens they depend on. The first retryable or fatal
/// error ends the pass, progress already persisted is kept by the store.
pub async fn run_initializers(
    mut instance: Instance,
    initializers: &[Arc<dyn Initializer<Instance>>],
) -> Result<Pass, Error> {
    let mut completed = Vec::new();
    let mut waiting = Vec::new();

    for init in initializers {
        let token = init.token();
        if !instance.has_initializer(token) {
            continue;
        }

        match init.initialize(instance.clone()).await {
            Ok(updated) => {
                debug!("initializer {} completed on {}", token, updated.name());
                completed.push(token.to_owned());
                instance = updated;
            }
            Err(e) if e.is_skip() => {
                debug!("initializer {} skipped on {}", token, instance.name());
                waiting.push(token.to_owned());
            }
            Err(source) => {
                return Err(Error::Initializer {
                    token: token.to_owned(),
                    source,
                });
            }
        }
    }

    Ok(Pass {
        instance,
        completed,
        waiting,
    })
}

/// Gives every registered initializer its cleanup call for a deleted instance.
pub async fn finalize_initializers(
    mut instance: Instance,
    initializers: &[Arc<dyn Initializer<Instance>>],
) -> Result<Instance, Error> {
    for init in initializers {
        match init.finalize(instance.clone()).await {
            Ok(Some(updated)) => instance = updated,
            Ok(None) => {}
            Err(source) => {
                return Err(Error::Initializer {
                    token: init.token().to_owned(),
                    source,
                });
            }
        }
    }

    Ok(instance)
}

pub async fn reconcile_instance(instance: Arc<Instance>, ctx: Arc<Context>) -> Result<Action, Error> {
    let ns = instance.namespace()?;
    let latest = ctx.get::<Instance>(&instance.name(), &ns).await?;

    if latest.metadata.deletion_timestamp.is_some() {
        debug!(
            "instance {} is deleted, deletion_timestamp is {:?}",
            instance.name(),
            latest.metadata.deletion_timestamp
        );
        finalize_initializers(latest, &ctx.initializers).await?;
        return Ok(Action::await_change());
    }

    let pass = match run_initializers(latest.clone(), &ctx.initializers).await {
        Ok(pass) => pass,
        Err(e) => {
            if !e.is_retryable()
                && let Err(record_err) = ctx
                    .record(&latest, EventType::Warning, "InitializerFailed", &e.to_string())
                    .await
            {
                warn!("failed to record event for {}: {}", latest.name(), record_err);
            }
            return Err(e);
        }
    };

    for token in &pass.completed {
        ctx.record(
            &pass.instance,
            EventType::Normal,
            "Initialized",
            &format!("initializer {} completed", token),
        )
        .await?;
    }

    ctx.update_status(&pass.instance).await?;

    if pass.instance.is_initialized() {
        info!("instance {}/{} is initialized", ns, pass.instance.name());
    }

    Ok(pass_action(&pass, &ctx.config))
}

/// Requeue after the poll interval while an initializer is waiting. Tokens
/// without a registered initializer never show up in `waiting`, so they alone
/// do not keep the instance polled.
fn pass_action(pass: &Pass, config: &Config) -> Action {
    if pass.waiting.is_empty() {
        Action::await_change()
    } else {
        debug!(
            "instance {} waiting on {:?}, check again in {:?}",
            pass.instance.name(),
            pass.waiting,
            config.poll_interval()
        );
        Action::requeue(config.poll_interval())
    }
}

pub fn error_policy(_object: Arc<Instance>, error: &Error, ctx: Arc<Context>) -> Action {
    error!("error_policy: {:?}", error);
    policy_action(error, &ctx.config)
}

fn policy_action(error: &Error, config: &Config) -> Action {
    if error.is_not_found() {
        Action::await_change()
    } else if error.is_retryable() {
        Action::requeue(config.retry_backoff())
    } else {
        // fatal, retry once the instance is edited
        Action::await_change()
    }
}
