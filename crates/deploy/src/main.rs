//! `transcoder-push` -- build the worker image for every target platform and
//! push it to the registry.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcoder_deploy::{platform_list, BuildPlan, PushArgs};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcoder_deploy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = PushArgs::parse();
    let plan = BuildPlan::from(&args);

    let action = if plan.push { "Building and pushing" } else { "Building" };
    println!("{action} {} for {}...", plan.tag, platform_list());

    match plan.execute().await {
        Ok(0) => {
            println!("{action} {} complete.", plan.tag);
            ExitCode::SUCCESS
        }
        Ok(code) => {
            tracing::error!(code, tag = %plan.tag, "docker buildx build failed");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not run docker");
            ExitCode::FAILURE
        }
    }
}
