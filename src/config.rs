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

use crate::initializer::{PRIVATE_IP_TOKEN, PUBLIC_IP_TOKEN};
use clap::{Args, ValueEnum};
use std::time::Duration;
use strum::Display;

/// What the CSR initializer does when an instance references a secret that does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Display)]
pub enum MissingSecretPolicy {
    /// treat the reference as a misconfiguration and stop retrying
    #[default]
    #[strum(to_string = "fatal")]
    Fatal,

    /// assume the secret is still being created and retry with backoff
    #[strum(to_string = "retry")]
    Retry,
}

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Seconds between checks of an instance waiting on its initializers
    #[arg(long, env = "INSTANCE_OP_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Seconds to back off after a retryable initializer failure
    #[arg(long, env = "INSTANCE_OP_RETRY_BACKOFF_SECS", default_value_t = 5)]
    pub retry_backoff_secs: u64,

    #[arg(
        long,
        env = "INSTANCE_OP_MISSING_SECRET_POLICY",
        value_enum,
        default_value_t = MissingSecretPolicy::Fatal
    )]
    pub missing_secret_policy: MissingSecretPolicy,

    /// Initializer tokens that have to be gone before the CSR initializer runs
    #[arg(
        long = "csr-blocks-on",
        env = "INSTANCE_OP_CSR_BLOCKS_ON",
        value_delimiter = ',',
        default_values_t = default_csr_blocks_on()
    )]
    pub csr_blocks_on: Vec<String>,
}

fn default_csr_blocks_on() -> Vec<String> {
    vec![PUBLIC_IP_TOKEN.to_owned(), PRIVATE_IP_TOKEN.to_owned()]
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            retry_backoff_secs: 5,
            missing_secret_policy: MissingSecretPolicy::default(),
            csr_blocks_on: default_csr_blocks_on(),
        }
    }
}
