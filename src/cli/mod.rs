pub(crate) mod instrumentation;

use std::ffi::{OsStr, OsString};

use clap::CommandFactory;

#[derive(Debug, clap::Parser)]
#[clap(version, about = "Mint a GitHub Actions runner registration token for a GitHub App")]
pub(crate) struct RunnerTokenCli {
    /// AWS Region (same as that of IAM Role)
    #[clap(long = "awsRegion", env = "RUNNER_TOKEN_AWS_REGION", value_parser = StringToNoneParser, default_value = "ap-southeast-2")]
    pub(crate) aws_region: OptionString,
    /// ARN of IAM Role with secret read permission
    #[clap(long = "iamRoleArn", env = "RUNNER_TOKEN_IAM_ROLE_ARN", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) iam_role_arn: OptionString,
    /// GitHub App ID
    #[clap(long = "appId", env = "RUNNER_TOKEN_APP_ID", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) app_id: OptionString,
    /// GitHub App installation ID
    #[clap(long = "installId", env = "RUNNER_TOKEN_INSTALL_ID", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) install_id: OptionString,
    /// GitHub organization the runner registers with
    #[clap(long = "orgName", env = "RUNNER_TOKEN_ORG_NAME", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) org_name: OptionString,
    /// ARN of the secret holding the base64-encoded app private key under `pem`
    #[clap(long = "secretArn", env = "RUNNER_TOKEN_SECRET_ARN", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) secret_arn: OptionString,

    /// Base URL of the GitHub REST API (GitHub Enterprise Server uses `https://<host>/api/v3`)
    #[clap(
        long = "apiUrl",
        env = "RUNNER_TOKEN_API_URL",
        default_value = "https://api.github.com"
    )]
    pub(crate) api_url: url::Url,
    /// Per-request HTTP timeout, in seconds (at least 1)
    #[clap(
        long = "httpTimeout",
        env = "RUNNER_TOKEN_HTTP_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..),
        default_value_t = 30
    )]
    pub(crate) http_timeout: u64,
    /// Session name recorded by STS for the assumed role
    #[clap(
        long = "roleSessionName",
        env = "RUNNER_TOKEN_ROLE_SESSION_NAME",
        default_value = "runner-token"
    )]
    pub(crate) role_session_name: String,

    #[clap(flatten)]
    pub instrumentation: instrumentation::Instrumentation,
}

impl RunnerTokenCli {
    /// Parse the process arguments, accepting single-dash `-flag` spellings of long flags.
    pub(crate) fn parse_args() -> Self {
        <Self as clap::Parser>::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite `-appId value` / `-appId=value` to `--appId ...` for every known long flag.
///
/// Short flags (`-v`, `-vv`, `-V`, `-h`) and anything after `--` are left alone.
pub(crate) fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let command = RunnerTokenCli::command();
    let mut longs: Vec<String> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long().map(str::to_string))
        .collect();
    longs.extend(["version".to_string(), "help".to_string()]);

    let mut seen_terminator = false;
    args.into_iter()
        .map(|arg| {
            if seen_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                seen_terminator = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') && is_known_long(rest, &longs) => {
                    OsString::from(format!("-{text}"))
                }
                _ => arg,
            }
        })
        .collect()
}

fn is_known_long(flag: &str, longs: &[String]) -> bool {
    let name = flag.split_once('=').map_or(flag, |(name, _)| name);
    longs.iter().any(|long| long == name)
}

#[derive(Clone, Debug)]
pub struct OptionString(pub Option<String>);

#[derive(Clone)]
struct StringToNoneParser;

impl clap::builder::TypedValueParser for StringToNoneParser {
    type Value = OptionString;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let inner = clap::builder::StringValueParser::new();
        let val = inner.parse_ref(cmd, arg, value)?;

        if val.trim().is_empty() {
            Ok(OptionString(None))
        } else {
            Ok(OptionString(Some(Into::<String>::into(val))))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn normalized(args: &[&str]) -> Vec<String> {
        normalize_args(args.iter().map(OsString::from))
            .into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect()
    }

    #[test]
    fn single_dash_flags_become_long_flags() {
        assert_eq!(
            normalized(&["runner-token", "-appId", "1", "-orgName=acme", "-version"]),
            ["runner-token", "--appId", "1", "--orgName=acme", "--version"]
        );
    }

    #[test]
    fn short_and_unknown_flags_are_untouched() {
        assert_eq!(
            normalized(&["runner-token", "-v", "-vv", "-V", "-nope", "--appId", "-", "--", "-appId"]),
            ["runner-token", "-v", "-vv", "-V", "-nope", "--appId", "-", "--", "-appId"]
        );
    }

    #[test]
    fn parses_single_dash_invocation() {
        let cli = RunnerTokenCli::try_parse_from(normalized(&[
            "runner-token",
            "-awsRegion",
            "us-east-1",
            "-appId",
            "12345",
            "-installId=67890",
        ]))
        .unwrap();

        assert_eq!(cli.aws_region.0.as_deref(), Some("us-east-1"));
        assert_eq!(cli.app_id.0.as_deref(), Some("12345"));
        assert_eq!(cli.install_id.0.as_deref(), Some("67890"));
        assert_eq!(cli.org_name.0, None);
    }

    #[test]
    fn version_flag_exits_successfully() {
        let err = RunnerTokenCli::try_parse_from(normalized(&["runner-token", "-version"]))
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn usage_errors_exit_with_two() {
        let err = RunnerTokenCli::try_parse_from(["runner-token", "--httpTimeout", "soon"])
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn zero_timeout_is_a_usage_error() {
        let err = RunnerTokenCli::try_parse_from(normalized(&["runner-token", "-httpTimeout", "0"]))
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);

        let cli = RunnerTokenCli::try_parse_from(["runner-token", "--httpTimeout", "1"]).unwrap();
        assert_eq!(cli.http_timeout, 1);
    }

    #[test]
    fn command_is_well_formed() {
        RunnerTokenCli::command().debug_assert();
    }
}
