//! Gatekeeper command line.
//!
//! `gatekeeper authorize` runs one gateway authorizer event through the
//! authorizer and prints the decision; `gatekeeper check-config` validates a
//! configuration file without contacting the identity provider.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::process::ExitCode;

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();
    logging::init(args.log_format);

    match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("gatekeeper failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
