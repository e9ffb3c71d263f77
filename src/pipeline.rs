use std::time::SystemTime;

use crate::{
    assertion::{parse_signing_key, sign_assertion},
    context::RunContext,
    error::Error,
    github::{ExchangeRequest, IssuedToken, TokenExchanger},
    secrets::{retrieve_key_pem, RoleAssumer},
};

/// The steps of the credential chain, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    RetrieveSecret,
    ParseKey,
    SignAssertion,
    InstallationToken,
    RegistrationToken,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            Stage::RetrieveSecret => "Cannot get secret value",
            Stage::ParseKey => "Cannot get private key",
            Stage::SignAssertion => "Cannot get jwt token",
            Stage::InstallationToken => "Cannot get app token",
            Stage::RegistrationToken => "Cannot get runner registration token",
        };
        f.write_str(description)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage}")]
pub(crate) struct StageFailure {
    pub(crate) stage: Stage,
    #[source]
    pub(crate) error: Error,
}

fn at(stage: Stage) -> impl FnOnce(Error) -> StageFailure {
    move |error| StageFailure { stage, error }
}

/// Run the whole chain once. The first failing stage ends the run; nothing after it is attempted.
#[tracing::instrument(
    name = "runner_token",
    skip_all,
    fields(
        app_id = %ctx.app_id,
        install_id = %ctx.install_id,
        org_name = %ctx.org_name,
    )
)]
pub(crate) async fn run<A, X>(
    ctx: &RunContext,
    assumer: &A,
    exchanger: &X,
) -> Result<IssuedToken, StageFailure>
where
    A: RoleAssumer,
    X: TokenExchanger,
{
    let key_pem = retrieve_key_pem(assumer, &ctx.identity)
        .await
        .map_err(at(Stage::RetrieveSecret))?;

    let signing_key = parse_signing_key(&key_pem).map_err(at(Stage::ParseKey))?;
    drop(key_pem);

    let assertion = sign_assertion(&ctx.app_id, &signing_key, SystemTime::now())
        .map_err(at(Stage::SignAssertion))?;

    let request = ExchangeRequest::installation_token(&ctx.api_url, &ctx.install_id, &assertion)
        .map_err(at(Stage::InstallationToken))?;
    let installation_token = exchanger
        .exchange(request)
        .await
        .map_err(at(Stage::InstallationToken))?;
    tracing::info!("Obtained installation access token");

    let request =
        ExchangeRequest::registration_token(&ctx.api_url, &ctx.org_name, &installation_token)
            .map_err(at(Stage::RegistrationToken))?;
    let registration_token = exchanger
        .exchange(request)
        .await
        .map_err(at(Stage::RegistrationToken))?;
    tracing::info!("Obtained runner registration token");

    Ok(registration_token)
}
