//! CLI flags common to every agent binary. Each agent's own `Args`
//! struct flattens this in and adds its type-specific flags.

#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub id: String,

    /// Repeatable; joined with config-file servers when resolving the NATS
    /// backend's endpoint list.
    #[arg(long = "nats_server")]
    pub nats_server: Vec<String>,

    #[arg(long)]
    pub stream: Option<String>,

    #[arg(long)]
    pub consumer: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,

    #[command(flatten)]
    pub log: crate::logging::LogArgs,
}
