use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;

use crate::error::BootstrapError;

/// Acquires credentials for the stream API client. The AWS credential
/// chain and cross-account role assumption (§6 `assume_role`) are
/// external collaborators per §1; this crate only depends on this
/// interface's shape, not on how a given environment satisfies it.
#[async_trait::async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, BootstrapError>;
}

/// Delegates to whatever provider `aws-config` resolved for the loaded
/// `SdkConfig` — environment variables, instance profile, container
/// credentials, or an assumed role, depending on the operator's
/// environment.
pub struct DefaultCredentialsProvider {
    inner: SharedCredentialsProvider,
}

impl DefaultCredentialsProvider {
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Option<Self> {
        config.credentials_provider().map(|inner| DefaultCredentialsProvider { inner })
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for DefaultCredentialsProvider {
    async fn credentials(&self) -> Result<Credentials, BootstrapError> {
        self.inner
            .provide_credentials()
            .await
            .map_err(|err| BootstrapError::Credentials(err.to_string()))
    }
}
