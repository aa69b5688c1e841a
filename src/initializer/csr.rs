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

use crate::config::{Config, MissingSecretPolicy};
use crate::initializer::{
    ApproveCertificateSnafu, Error, GetSecretSnafu, Initializable, Initializer, SkipSnafu,
    UpdateInstanceSnafu,
};
use crate::store::ObjectStore;
use crate::types::v1alpha1::certificate::{
    CertificateState, ResourceStatus, set_resource_status,
};
use crate::types::v1alpha1::instance::{ANNOTATION_PREFIX, Instance};
use async_trait::async_trait;
use snafu::ResultExt;
use std::sync::Arc;
use tracing::{debug, info};

pub const CSR_TOKEN: &str = const_str::concat!(ANNOTATION_PREFIX, "csr");

/// Holds an instance back until every certificate secret it references is `Ready`.
///
/// `Pending` secrets are approved on the way, the certificate authority then
/// moves them to `Ready` on its own schedule, so an instance usually needs a
/// few invocations before this initializer completes.
pub struct CsrInitializer {
    store: Arc<dyn ObjectStore>,
    blocks_on: Vec<String>,
    missing_secret_policy: MissingSecretPolicy,
}

impl CsrInitializer {
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            store,
            blocks_on: config.csr_blocks_on.clone(),
            missing_secret_policy: config.missing_secret_policy,
        }
    }
}

#[async_trait]
impl Initializer<Instance> for CsrInitializer {
    fn token(&self) -> &str {
        CSR_TOKEN
    }

    async fn initialize(&self, mut instance: Instance) -> Result<Instance, Error> {
        if instance.has_any_initializer(self.blocks_on.as_slice()) {
            debug!(
                "instance {} still waits on {:?}, skip csr",
                instance.name(),
                self.blocks_on
            );
            return SkipSnafu.fail();
        }

        let ns = instance.namespace()?;
        let mut not_ready = 0usize;

        for name in instance.secret_names() {
            let mut secret = match self.store.get_secret(&ns, name).await {
                Ok(secret) => secret,
                Err(source) => {
                    let retryable = source.is_not_found()
                        && self.missing_secret_policy == MissingSecretPolicy::Retry;
                    return Err(source).context(GetSecretSnafu { name, retryable });
                }
            };

            let state = CertificateState::of(&secret);
            if state.is_satisfied() {
                debug!("secret {}/{} does not hold the instance: {:?}", ns, name, state);
                continue;
            }

            if state == CertificateState::Known(ResourceStatus::Pending) {
                set_resource_status(&mut secret, ResourceStatus::Approved);
                self.store
                    .update_secret(&ns, &secret)
                    .await
                    .context(ApproveCertificateSnafu { name })?;
                info!("approved certificate {}/{}", ns, name);
            } else {
                debug!("certificate {}/{} not ready: {:?}", ns, name, state);
            }
            not_ready += 1;
        }

        if not_ready > 0 {
            debug!(
                "instance {} waits on {} certificate(s)",
                instance.name(),
                not_ready
            );
            return SkipSnafu.fail();
        }

        instance.remove_initializer(CSR_TOKEN);
        let name = instance.name();
        let updated = self
            .store
            .update_instance(&instance)
            .await
            .context(UpdateInstanceSnafu { name: name.clone() })?;

        info!("all certificates of instance {}/{} are ready", ns, name);
        Ok(updated)
    }

    async fn finalize(&self, _instance: Instance) -> Result<Option<Instance>, Error> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::{PRIVATE_IP_TOKEN, PUBLIC_IP_TOKEN};
    use crate::store::{self, MockObjectStore};
    use crate::tests::{create_test_instance, create_test_secret};
    use crate::types::v1alpha1::certificate::RESOURCE_STATUS_KEY;
    use k8s_openapi::api::core::v1::Secret;
    use kube::ResourceExt;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn initializer(store: MockObjectStore) -> CsrInitializer {
        CsrInitializer::new(Arc::new(store), &Config::default())
    }

    /// serves `secrets` by name, anything else is not found
    fn serve_secrets(store: &mut MockObjectStore, secrets: Vec<Secret>) {
        let secrets: BTreeMap<String, Secret> =
            secrets.into_iter().map(|s| (s.name_any(), s)).collect();
        store.expect_get_secret().returning(move |ns, name| {
            secrets
                .get(name)
                .cloned()
                .ok_or_else(|| store::Error::NotFound {
                    kind: "Secret".into(),
                    namespace: ns.into(),
                    name: name.into(),
                })
        });
    }

    fn status_of(secret: &Secret) -> Option<&str> {
        secret
            .annotations()
            .get(RESOURCE_STATUS_KEY)
            .map(String::as_str)
    }

    #[test]
    fn test_token() {
        let init = initializer(MockObjectStore::new());
        assert_eq!(init.token(), "rustfs.com/csr");
    }

    #[tokio::test]
    async fn test_blocked_by_predecessor_touches_nothing() {
        let mut store = MockObjectStore::new();
        store.expect_get_secret().never();
        store.expect_update_secret().never();
        store.expect_update_instance().never();

        let instance =
            create_test_instance(&["tls"], &[PUBLIC_IP_TOKEN, CSR_TOKEN, "rustfs.com/other"]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(err.is_skip());

        let mut store = MockObjectStore::new();
        store.expect_get_secret().never();
        store.expect_update_secret().never();
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN, PRIVATE_IP_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_unrelated_tokens_do_not_block() {
        let mut store = MockObjectStore::new();
        store.expect_update_instance().times(1).returning(|i| Ok(i.clone()));

        let instance = create_test_instance(&[], &["rustfs.com/dns", CSR_TOKEN]);
        let updated = initializer(store).initialize(instance).await.unwrap();
        assert_eq!(updated.spec.initializers, vec!["rustfs.com/dns"]);
    }

    #[tokio::test]
    async fn test_no_secrets_completes_immediately() {
        let mut store = MockObjectStore::new();
        store.expect_get_secret().never();
        store
            .expect_update_instance()
            .times(1)
            .returning(|i| Ok(i.clone()));

        let instance = create_test_instance(&[], &[CSR_TOKEN]);
        let updated = initializer(store).initialize(instance).await.unwrap();
        assert!(updated.is_initialized());
    }

    #[tokio::test]
    async fn test_completes_when_all_ready_or_unmanaged() {
        let mut store = MockObjectStore::new();
        serve_secrets(
            &mut store,
            vec![
                create_test_secret("plain", None),
                create_test_secret("tls-a", Some("Ready")),
                create_test_secret("tls-b", Some("Ready")),
            ],
        );
        store.expect_update_secret().never();
        store
            .expect_update_instance()
            .times(1)
            .withf(|i| !i.has_initializer(CSR_TOKEN))
            .returning(|i| Ok(i.clone()));

        let instance = create_test_instance(
            &["plain", "tls-a", "tls-b"],
            &["rustfs.com/first", CSR_TOKEN, "rustfs.com/last"],
        );
        let updated = initializer(store).initialize(instance).await.unwrap();
        assert_eq!(
            updated.spec.initializers,
            vec!["rustfs.com/first", "rustfs.com/last"]
        );
    }

    #[tokio::test]
    async fn test_completion_is_idempotent() {
        let mut store = MockObjectStore::new();
        serve_secrets(
            &mut store,
            vec![
                create_test_secret("tls-a", Some("Ready")),
                create_test_secret("tls-b", Some("Ready")),
            ],
        );
        store
            .expect_update_instance()
            .times(2)
            .returning(|i| Ok(i.clone()));

        let init = initializer(store);
        let instance = create_test_instance(&["tls-a", "tls-b"], &[CSR_TOKEN]);

        let first = init.initialize(instance.clone()).await.unwrap();
        let second = init.initialize(instance).await.unwrap();
        assert_eq!(first, second);
        assert!(second.is_initialized());
    }

    #[tokio::test]
    async fn test_pending_secret_is_approved_and_instance_waits() {
        let mut store = MockObjectStore::new();
        serve_secrets(
            &mut store,
            vec![
                create_test_secret("tls-a", Some("Pending")),
                create_test_secret("tls-b", Some("Ready")),
            ],
        );
        store
            .expect_update_secret()
            .times(1)
            .withf(|ns, s| {
                ns == "default" && s.name_any() == "tls-a" && status_of(s) == Some("Approved")
            })
            .returning(|_, s| Ok(s.clone()));
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls-a", "tls-b"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_approved_secret_is_not_advanced_again() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("Approved"))]);
        store.expect_update_secret().never();
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_pending_secret_is_approved_once_across_calls() {
        let secrets = Arc::new(Mutex::new(BTreeMap::from([(
            "tls".to_string(),
            create_test_secret("tls", Some("Pending")),
        )])));

        let mut store = MockObjectStore::new();
        let reads = secrets.clone();
        store
            .expect_get_secret()
            .times(2)
            .returning(move |_, name| Ok(reads.lock().unwrap()[name].clone()));
        let writes = secrets.clone();
        store.expect_update_secret().times(1).returning(move |_, s| {
            writes.lock().unwrap().insert(s.name_any(), s.clone());
            Ok(s.clone())
        });
        store.expect_update_instance().never();

        let init = initializer(store);
        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);

        assert!(init.initialize(instance.clone()).await.unwrap_err().is_skip());
        assert!(init.initialize(instance).await.unwrap_err().is_skip());

        let secrets = secrets.lock().unwrap();
        assert_eq!(status_of(&secrets["tls"]), Some("Approved"));
    }

    #[tokio::test]
    async fn test_unrecognized_status_waits() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("pending"))]);
        store.expect_update_secret().never();
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(err.is_skip());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_secret_is_fatal() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("Ready"))]);
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls", "typo"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(matches!(err, Error::GetSecret { ref name, .. } if name == "typo"));
        assert!(!err.is_skip());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_secret_retry_policy() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![]);
        store.expect_update_instance().never();

        let config = Config {
            missing_secret_policy: MissingSecretPolicy::Retry,
            ..Config::default()
        };
        let init = CsrInitializer::new(Arc::new(store), &config);

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = init.initialize(instance).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_approval_is_fatal() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("Pending"))]);
        store.expect_update_secret().times(1).returning(|ns, s| {
            Err(store::Error::NotFound {
                kind: "Secret".into(),
                namespace: ns.into(),
                name: s.name_any(),
            })
        });
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(matches!(err, Error::ApproveCertificate { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_approval_conflict_is_retryable() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("Pending"))]);
        store.expect_update_secret().times(1).returning(|ns, s| {
            Err(store::Error::Conflict {
                kind: "Secret".into(),
                namespace: ns.into(),
                name: s.name_any(),
            })
        });
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(matches!(err, Error::ApproveCertificate { .. }));
        assert!(!err.is_skip());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_instance_conflict_is_retryable() {
        let mut store = MockObjectStore::new();
        serve_secrets(&mut store, vec![create_test_secret("tls", Some("Ready"))]);
        store.expect_update_instance().times(1).returning(|i| {
            Err(store::Error::Conflict {
                kind: "Instance".into(),
                namespace: "default".into(),
                name: i.name(),
            })
        });

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        let err = initializer(store).initialize(instance).await.unwrap_err();
        assert!(matches!(err, Error::UpdateInstance { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_finalize_is_noop() {
        let mut store = MockObjectStore::new();
        store.expect_get_secret().never();
        store.expect_update_secret().never();
        store.expect_update_instance().never();

        let instance = create_test_instance(&["tls"], &[CSR_TOKEN]);
        assert!(initializer(store).finalize(instance).await.unwrap().is_none());
    }
}
