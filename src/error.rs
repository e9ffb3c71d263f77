pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// A required flag was not passed (or was passed empty).
    #[error("Missing -{0}")]
    MissingArgument(&'static str),
    #[error("`--apiUrl` cannot be used as a base URL: {0}")]
    InvalidApiUrl(url::Url),
    /// `.` and `..` would be resolved away as URL path segments.
    #[error("`{value}` is not a valid -{flag}")]
    InvalidPathSegment { flag: &'static str, value: String },

    #[error("Assuming role `{role_arn}`")]
    AssumeRole {
        role_arn: String,
        #[source]
        source: BoxError,
    },
    #[error("Secret `{0}` was not found")]
    SecretNotFound(String),
    #[error("Reading secret `{secret_id}`")]
    SecretStore {
        secret_id: String,
        #[source]
        source: BoxError,
    },
    #[error("Secret value is not valid JSON")]
    SecretPayload(#[source] serde_json::Error),
    /// The secret is JSON but doesn't carry a string `pem` field.
    #[error("Secret value does not match the expected schema: {0}")]
    SecretSchema(String),
    #[error("Decoding base64 key material: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Parsing private key")]
    KeyParse(#[source] jsonwebtoken::errors::Error),
    #[error("Signing app assertion")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Sending request to {url}")]
    Network {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("Status {status} from {url}\n{body}")]
    HttpStatus {
        url: url::Url,
        status: http::StatusCode,
        body: String,
    },
    #[error("Response from {url} has no string `token` field")]
    ResponseSchema {
        url: url::Url,
        #[source]
        source: serde_json::Error,
    },
}
