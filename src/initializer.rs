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

//! Chained object initialization.
//!
//! An object carries an ordered list of pending initializer tokens. Every
//! [`Initializer`] is invoked repeatedly against the latest persisted object and
//! removes its own token once its condition holds. Nothing is kept in memory
//! between invocations.

pub mod csr;

use crate::store;
use crate::types;
use crate::types::v1alpha1::instance::ANNOTATION_PREFIX;
use async_trait::async_trait;
use snafu::Snafu;

/// Token of the initializer assigning the public address of an instance.
pub const PUBLIC_IP_TOKEN: &str = const_str::concat!(ANNOTATION_PREFIX, "public-ip");

/// Token of the initializer assigning the private address of an instance.
pub const PRIVATE_IP_TOKEN: &str = const_str::concat!(ANNOTATION_PREFIX, "private-ip");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Not a failure: the condition is not met yet, invoke again later.
    #[snafu(display("initializer condition not satisfied yet"))]
    Skip,

    #[snafu(display("failed to get secret resource {}: {}", name, source))]
    GetSecret {
        name: String,
        retryable: bool,
        source: store::Error,
    },

    #[snafu(display("failed to approve certificate {}: {}", name, source))]
    ApproveCertificate { name: String, source: store::Error },

    #[snafu(display("failed to update instance {}: {}", name, source))]
    UpdateInstance { name: String, source: store::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip)
    }

    /// Whether the dispatcher should invoke the initializer again after a backoff.
    /// Fatal errors need the object or its environment fixed first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Skip => false,
            Error::GetSecret { retryable, .. } => *retryable,
            Error::ApproveCertificate { source, .. } => source.is_conflict(),
            Error::UpdateInstance { .. } => true,
            Error::Types { .. } => false,
        }
    }
}

/// One stage of the initialization pipeline for objects of kind `K`.
///
/// `initialize` must be safe to call any number of times on the same persisted
/// object. Its outcomes are:
/// - `Ok(updated)`: done, `updated` is the persisted object without [`Initializer::token`]
/// - `Err(Error::Skip)`: not done yet, leave the object alone and call again later
/// - `Err(e)` with [`Error::is_retryable`]: transient failure, call again after a backoff
/// - any other `Err`: fatal, surface it instead of retrying
#[async_trait]
pub trait Initializer<K: Send + 'static>: Send + Sync {
    fn token(&self) -> &str;

    async fn initialize(&self, obj: K) -> Result<K, Error>;

    /// Cleanup hook for an object being deleted. `Ok(None)` when there is nothing to persist.
    async fn finalize(&self, obj: K) -> Result<Option<K>, Error>;
}

/// Access to the pending initializer tokens of an object.
pub trait Initializable {
    fn initializers(&self) -> &[String];

    fn initializers_mut(&mut self) -> &mut Vec<String>;

    fn has_initializer(&self, token: &str) -> bool {
        self.initializers().iter().any(|t| t == token)
    }

    /// true if any of `tokens` is still pending
    fn has_any_initializer<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().any(|t| self.has_initializer(t.as_ref()))
    }

    /// Removes `token`, keeping the remaining tokens in order. Returns false if it was not pending.
    fn remove_initializer(&mut self, token: &str) -> bool {
        let pending = self.initializers_mut();
        let before = pending.len();
        pending.retain(|t| t != token);
        pending.len() != before
    }

    fn is_initialized(&self) -> bool {
        self.initializers().is_empty()
    }
}
