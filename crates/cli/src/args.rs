use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mucts_mq::ExchangeKind;

/// MuCTS console
#[derive(Debug, Parser)]
#[command(name = "mucts", about = "Model scaffolding and message queue tools", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new model from a stub
    #[command(name = "make:model")]
    MakeModel(MakeModelArgs),

    /// Publish one message
    #[command(name = "mq:publish")]
    MqPublish(PublishArgs),

    /// Consume and acknowledge messages until interrupted
    #[command(name = "mq:consume")]
    MqConsume(ConsumeArgs),
}

#[derive(Debug, Args)]
pub struct MakeModelArgs {
    /// Model name in PascalCase
    pub name: String,

    /// Generate a pivot (join table) model
    #[arg(long)]
    pub pivot: bool,

    /// Directory the model is written to
    #[arg(long, default_value = "src/models")]
    pub path: PathBuf,

    /// Directory holding custom `model.stub` / `model.pivot.stub`
    #[arg(long, env = "MUCTS_STUBS")]
    pub stubs: Option<PathBuf>,

    /// Overwrite an existing model file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Exchange name; empty publishes to the default exchange
    #[arg(long, default_value = "")]
    pub exchange: String,

    #[arg(long, default_value = "")]
    pub routing_key: String,

    /// Exchange kind (default, fanout, headers, direct, topic)
    #[arg(long, default_value = "topic")]
    pub kind: ExchangeKind,

    /// Declare the exchange durable
    #[arg(long)]
    pub durable: bool,

    /// Parse the payload as JSON and send it as `application/json`
    #[arg(long)]
    pub json: bool,

    pub payload: String,
}

#[derive(Debug, Args)]
pub struct ConsumeArgs {
    #[arg(long, default_value = "")]
    pub exchange: String,

    /// Queue name; empty lets the broker name it
    #[arg(long, default_value = "")]
    pub queue: String,

    #[arg(long, default_value = "")]
    pub routing_key: String,

    #[arg(long, default_value = "topic")]
    pub kind: ExchangeKind,

    /// Declare the exchange and queue durable
    #[arg(long)]
    pub durable: bool,
}
