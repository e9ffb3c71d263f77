use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};

use crate::{assertion::AppAssertion, error::Error};

pub(crate) const ACCEPT_V3: &str = "application/vnd.github.v3+json";
pub(crate) const ACCEPT_MACHINE_MAN_PREVIEW: &str = "application/vnd.github.machine-man-preview+json";

/// An opaque, short-lived token handed back by the platform.
pub(crate) struct IssuedToken(String);

impl IssuedToken {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IssuedToken(<redacted>)")
    }
}

/// How the credential is presented in the `Authorization` header.
pub(crate) enum Credential<'a> {
    /// `Bearer <jwt>`, for app-level endpoints.
    Bearer(&'a str),
    /// `token <installation token>`, for installation-scoped endpoints.
    Token(&'a str),
}

impl Credential<'_> {
    fn authorization(&self) -> String {
        match self {
            Credential::Bearer(jwt) => format!("Bearer {jwt}"),
            Credential::Token(token) => format!("token {token}"),
        }
    }
}

pub(crate) struct ExchangeRequest<'a> {
    pub(crate) url: url::Url,
    pub(crate) credential: Credential<'a>,
    pub(crate) accept: &'static str,
}

impl<'a> ExchangeRequest<'a> {
    /// `POST /app/installations/{install_id}/access_tokens`
    pub(crate) fn installation_token(
        api_url: &url::Url,
        install_id: &str,
        assertion: &'a AppAssertion,
    ) -> Result<Self, Error> {
        check_path_segment("installId", install_id)?;
        Ok(Self {
            url: endpoint(
                api_url,
                &["app", "installations", install_id, "access_tokens"],
            )?,
            credential: Credential::Bearer(assertion.expose()),
            accept: ACCEPT_V3,
        })
    }

    /// `POST /orgs/{org_name}/actions/runners/registration-token`
    pub(crate) fn registration_token(
        api_url: &url::Url,
        org_name: &str,
        installation_token: &'a IssuedToken,
    ) -> Result<Self, Error> {
        check_path_segment("orgName", org_name)?;
        Ok(Self {
            url: endpoint(
                api_url,
                &["orgs", org_name, "actions", "runners", "registration-token"],
            )?,
            credential: Credential::Token(installation_token.expose()),
            accept: ACCEPT_MACHINE_MAN_PREVIEW,
        })
    }
}

/// Reject identifiers that [`url::PathSegmentsMut`] would treat as relative path steps.
pub(crate) fn check_path_segment(flag: &'static str, value: &str) -> Result<(), Error> {
    if matches!(value, "." | "..") {
        return Err(Error::InvalidPathSegment {
            flag,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Append percent-encoded path segments to the API base URL.
fn endpoint(api_url: &url::Url, segments: &[&str]) -> Result<url::Url, Error> {
    let mut url = api_url.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidApiUrl(api_url.clone()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Trades one credential for another with a single body-less POST.
pub(crate) trait TokenExchanger {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<IssuedToken, Error>;
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    token: String,
}

pub(crate) struct GitHubClient {
    client: reqwest::Client,
}

impl GitHubClient {
    pub(crate) fn new(timeout: Duration) -> color_eyre::Result<Self> {
        let client = crate::build_http_client().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

impl TokenExchanger for GitHubClient {
    #[tracing::instrument(skip_all, fields(url = %request.url, status = tracing::field::Empty))]
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<IssuedToken, Error> {
        let ExchangeRequest {
            url,
            credential,
            accept,
        } = request;

        let response = self
            .client
            .post(url.clone())
            .header(AUTHORIZATION, credential.authorization())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|source| Error::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::Span::current().record("status", tracing::field::display(status));

        // Read the whole body either way so the connection is released.
        let body = response.bytes().await.map_err(|source| Error::Network {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let TokenResponse { token } = serde_json::from_slice(&body)
            .map_err(|source| Error::ResponseSchema { url, source })?;

        tracing::debug!("Exchanged token");
        Ok(IssuedToken(token))
    }
}
