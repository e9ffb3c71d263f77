use std::{io::IsTerminal, process::ExitCode};

use color_eyre::eyre::{Report, Result};

use crate::{
    cli::RunnerTokenCli,
    context::RunContext,
    github::{GitHubClient, TokenExchanger},
    secrets::{AwsRoleAssumer, RoleAssumer},
};
mod assertion;
mod cli;
mod context;
mod error;
mod github;
mod pem;
mod pipeline;
mod secrets;

/// Exit status for every failure: bad arguments and failed stages alike.
const FAILURE_EXIT_CODE: u8 = 2;

pub(crate) fn build_http_client() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent("runner-token")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = RunnerTokenCli::parse_args();

    match execute(cli).await {
        Ok(exit) => exit,
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

async fn execute(cli: RunnerTokenCli) -> Result<ExitCode> {
    color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .theme(if !std::io::stderr().is_terminal() {
            color_eyre::config::Theme::new()
        } else {
            color_eyre::config::Theme::dark()
        })
        .install()?;
    cli.instrumentation.setup()?;

    let exit = mint(
        cli,
        |ctx| AwsRoleAssumer::new(ctx.role_session_name.clone()),
        |ctx| GitHubClient::new(ctx.http_timeout),
        &mut std::io::stdout(),
    )
    .await;
    Ok(exit)
}

/// Validate the arguments, run the chain and write the registration token to `out`.
async fn mint<A, X, W>(
    cli: RunnerTokenCli,
    assumer_for: impl FnOnce(&RunContext) -> A,
    exchanger_for: impl FnOnce(&RunContext) -> Result<X>,
    out: &mut W,
) -> ExitCode
where
    A: RoleAssumer,
    X: TokenExchanger,
    W: std::io::Write,
{
    let ctx = match RunContext::from_cli(cli) {
        Ok(ctx) => ctx,
        Err(error) => return report_failure(&error.to_string(), Report::new(error)),
    };

    let assumer = assumer_for(&ctx);
    let exchanger = match exchanger_for(&ctx) {
        Ok(exchanger) => exchanger,
        Err(error) => return report_failure("Cannot build HTTP client", error),
    };

    match pipeline::run(&ctx, &assumer, &exchanger).await {
        Ok(registration_token) => match writeln!(out, "{}", registration_token.expose()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => report_failure(
                "Cannot write runner registration token",
                Report::new(error),
            ),
        },
        Err(failure) => report_failure(&failure.stage.to_string(), Report::new(failure.error)),
    }
}

/// One `ERROR:` line naming what failed, then the full cause chain, all on stderr.
fn report_failure(description: &str, error: Report) -> ExitCode {
    eprintln!("ERROR: {description}");
    eprintln!("{error:?}");
    ExitCode::from(FAILURE_EXIT_CODE)
}
