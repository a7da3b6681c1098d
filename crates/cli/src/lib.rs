//! MuCTS console commands
//!
//! - `make:model` renders a model struct from a stub
//! - `mq:publish` / `mq:consume` talk to the configured message broker

pub mod args;
pub mod commands;
pub mod make_model;

use mucts_mq::{MessagingConfig, MessagingServiceFactory};
use tokio_util::sync::CancellationToken;

use args::{Cli, Command};
use make_model::ModelOptions;

/// Run one parsed command to completion
pub async fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<()> {
    match cli.command {
        Command::MakeModel(args) => {
            let path = make_model::make_model(&ModelOptions {
                name: args.name,
                pivot: args.pivot,
                path: args.path,
                stubs: args.stubs,
                force: args.force,
            })?;
            println!("Model created: {}", path.display());
        }
        Command::MqPublish(args) => {
            let config = MessagingConfig::from_env()?;
            let service = MessagingServiceFactory::create(&config)?;
            commands::publish(service.as_ref(), &args).await?;
        }
        Command::MqConsume(args) => {
            let config = MessagingConfig::from_env()?;
            let service = MessagingServiceFactory::create(&config)?;
            let outcome = commands::consume_and_ack(service.as_ref(), &args, cancel).await?;
            tracing::info!(?outcome, "Consumer finished");
        }
    }
    Ok(())
}
