use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_secretsmanager::{config::Credentials, error::DisplayErrorContext};

use crate::{
    context::IdentityContext,
    error::{BoxError, Error},
    pem::{decode_key_pem, KeyPem},
};

/// Reads secret values with whatever identity the store was opened with.
pub(crate) trait SecretStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, Error>;
}

/// Opens a [`SecretStore`] as a delegated identity.
pub(crate) trait RoleAssumer {
    type Store: SecretStore;

    async fn assume(&self, identity: &IdentityContext) -> Result<Self::Store, Error>;
}

/// The JSON shape of the stored secret. Other fields are ignored.
#[derive(Debug, serde::Deserialize)]
struct KeySecret {
    pem: String,
}

/// Fetch the app's private key through an assumed role and decode it.
#[tracing::instrument(
    skip_all,
    fields(
        role_arn = %identity.role_arn,
        region = %identity.region,
        secret_id = %identity.secret_id,
    )
)]
pub(crate) async fn retrieve_key_pem<A: RoleAssumer>(
    assumer: &A,
    identity: &IdentityContext,
) -> Result<KeyPem, Error> {
    let store = assumer.assume(identity).await?;
    tracing::debug!("Assumed role");

    let secret_string = store.get_secret_string(&identity.secret_id).await?;
    let secret = parse_key_secret(&secret_string)?;

    decode_key_pem(&secret.pem)
}

fn parse_key_secret(secret_string: &str) -> Result<KeySecret, Error> {
    let value: serde_json::Value =
        serde_json::from_str(secret_string).map_err(Error::SecretPayload)?;

    serde_json::from_value(value).map_err(|e| Error::SecretSchema(e.to_string()))
}

/// AWS STS + Secrets Manager, starting from the default credential chain.
pub(crate) struct AwsRoleAssumer {
    session_name: String,
    /// Replaces the default chain lookup, e.g. to point both clients at another endpoint.
    base: Option<SdkConfig>,
}

impl AwsRoleAssumer {
    pub(crate) fn new(session_name: String) -> Self {
        Self {
            session_name,
            base: None,
        }
    }

    #[cfg(test)]
    fn with_base_config(session_name: &str, base: SdkConfig) -> Self {
        Self {
            session_name: session_name.to_string(),
            base: Some(base),
        }
    }

    async fn base_config(&self, region: &str) -> SdkConfig {
        match &self.base {
            Some(base) => base.clone(),
            None => {
                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(region.to_string()))
                    .load()
                    .await
            }
        }
    }
}

impl RoleAssumer for AwsRoleAssumer {
    type Store = AwsSecretStore;

    async fn assume(&self, identity: &IdentityContext) -> Result<AwsSecretStore, Error> {
        let base = self.base_config(&identity.region).await;
        let assume_role_error = |source: BoxError| Error::AssumeRole {
            role_arn: identity.role_arn.clone(),
            source,
        };

        let output = aws_sdk_sts::Client::new(&base)
            .assume_role()
            .role_arn(&identity.role_arn)
            .role_session_name(&self.session_name)
            .send()
            .await
            .map_err(|e| assume_role_error(DisplayErrorContext(e).to_string().into()))?;

        let creds = output.credentials().ok_or_else(|| {
            assume_role_error("AssumeRole response carried no credentials".into())
        })?;

        let expiry = SystemTime::try_from(*creds.expiration()).ok();
        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            expiry,
            "AssumeRole",
        );

        let config = aws_sdk_secretsmanager::config::Builder::from(&base)
            .credentials_provider(credentials)
            .build();

        Ok(AwsSecretStore {
            client: aws_sdk_secretsmanager::Client::from_conf(config),
        })
    }
}

pub(crate) struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretStore for AwsSecretStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, Error> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception())
                {
                    Error::SecretNotFound(secret_id.to_string())
                } else {
                    Error::SecretStore {
                        secret_id: secret_id.to_string(),
                        source: DisplayErrorContext(e).to_string().into(),
                    }
                }
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| Error::SecretSchema("secret has no string value".to_string()))
    }
}
