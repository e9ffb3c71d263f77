use std::time::Duration;

use crate::{
    cli::{OptionString, RunnerTokenCli},
    error::Error,
    github::check_path_segment,
};

/// Which role to assume, where, and which secret to read with it.
#[derive(Debug, Clone)]
pub(crate) struct IdentityContext {
    pub(crate) role_arn: String,
    pub(crate) region: String,
    pub(crate) secret_id: String,
}

/// Everything a run needs, validated once before any network call is made.
#[derive(Debug, Clone)]
pub(crate) struct RunContext {
    pub(crate) identity: IdentityContext,
    pub(crate) app_id: String,
    pub(crate) install_id: String,
    pub(crate) org_name: String,
    pub(crate) api_url: url::Url,
    pub(crate) http_timeout: Duration,
    pub(crate) role_session_name: String,
}

fn required(value: OptionString, flag: &'static str) -> Result<String, Error> {
    value.0.ok_or(Error::MissingArgument(flag))
}

impl RunContext {
    pub(crate) fn from_cli(cli: RunnerTokenCli) -> Result<Self, Error> {
        let RunnerTokenCli {
            aws_region,
            iam_role_arn,
            app_id,
            install_id,
            org_name,
            secret_arn,
            api_url,
            http_timeout,
            role_session_name,
            instrumentation: _,
        } = cli;

        // Same order the flags were historically checked in.
        let app_id = required(app_id, "appId")?;
        let install_id = required(install_id, "installId")?;
        let org_name = required(org_name, "orgName")?;
        let role_arn = required(iam_role_arn, "iamRoleArn")?;
        let secret_id = required(secret_arn, "secretArn")?;
        let region = required(aws_region, "awsRegion")?;

        check_path_segment("installId", &install_id)?;
        check_path_segment("orgName", &org_name)?;

        if api_url.cannot_be_a_base() {
            return Err(Error::InvalidApiUrl(api_url));
        }

        Ok(Self {
            identity: IdentityContext {
                role_arn,
                region,
                secret_id,
            },
            app_id,
            install_id,
            org_name,
            api_url,
            http_timeout: Duration::from_secs(http_timeout),
            role_session_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    const FULL_ARGS: &[&str] = &[
        "runner-token",
        "--iamRoleArn",
        "arn:aws:iam::123456789012:role/runner-secret-reader",
        "--appId",
        "12345",
        "--installId",
        "67890",
        "--orgName",
        "example-org",
        "--secretArn",
        "arn:aws:secretsmanager:ap-southeast-2:123456789012:secret:runner",
    ];

    fn parse(args: &[&str]) -> RunnerTokenCli {
        RunnerTokenCli::try_parse_from(args).unwrap()
    }

    #[test]
    fn builds_context_with_defaults() {
        let ctx = RunContext::from_cli(parse(FULL_ARGS)).unwrap();
        assert_eq!(ctx.identity.region, "ap-southeast-2");
        assert_eq!(ctx.app_id, "12345");
        assert_eq!(ctx.install_id, "67890");
        assert_eq!(ctx.org_name, "example-org");
        assert_eq!(ctx.api_url.as_str(), "https://api.github.com/");
        assert_eq!(ctx.http_timeout, Duration::from_secs(30));
        assert_eq!(ctx.role_session_name, "runner-token");
    }

    #[test]
    fn each_missing_flag_is_reported() {
        for (flag, name) in [
            ("--iamRoleArn", "iamRoleArn"),
            ("--appId", "appId"),
            ("--installId", "installId"),
            ("--orgName", "orgName"),
            ("--secretArn", "secretArn"),
        ] {
            let position = FULL_ARGS.iter().position(|a| *a == flag).unwrap();
            let mut args = FULL_ARGS.to_vec();
            args.drain(position..position + 2);

            let err = RunContext::from_cli(parse(&args)).unwrap_err();
            assert!(
                matches!(err, Error::MissingArgument(missing) if missing == name),
                "{flag}: {err:?}"
            );
        }
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut args = FULL_ARGS.to_vec();
        let position = args.iter().position(|a| *a == "--appId").unwrap();
        args[position + 1] = "";

        let err = RunContext::from_cli(parse(&args)).unwrap_err();
        assert!(matches!(err, Error::MissingArgument("appId")), "{err:?}");
        assert_eq!(err.to_string(), "Missing -appId");
    }

    #[test]
    fn rejects_dot_segment_identifiers() {
        for (arg, name, value) in [
            ("--orgName", "orgName", ".."),
            ("--installId", "installId", "."),
        ] {
            let mut args = FULL_ARGS.to_vec();
            let position = args.iter().position(|a| *a == arg).unwrap();
            args[position + 1] = value;

            let err = RunContext::from_cli(parse(&args)).unwrap_err();
            assert!(
                matches!(&err, Error::InvalidPathSegment { flag, .. } if *flag == name),
                "{arg}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_non_base_api_url() {
        let mut args = FULL_ARGS.to_vec();
        args.extend(["--apiUrl", "mailto:runner@example.com"]);

        let err = RunContext::from_cli(parse(&args)).unwrap_err();
        assert!(matches!(err, Error::InvalidApiUrl(_)), "{err:?}");
    }
}
