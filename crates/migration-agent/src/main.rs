//! Consumes migration messages and invokes the configured migration tool
//! once per message, appending the message's path to a fixed argv prefix.

use clap::Parser;
use polimor_agent::{CommonArgs, OrBail};
use polimor_config::ConfigView;
use polimor_messaging::{Backend, Subscriber};
use polimor_subprocess::Process;

const DRY_RUN_PREFIX: &[&str] = &["/bin/echo"];

fn require<T>(value: Option<T>, message: &str) -> T {
    match value {
        Some(v) => v,
        None => {
            tracing::error!(message);
            std::process::exit(polimor_agent::EXIT_CONFIG_ERROR);
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "migration-agent")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Run `/bin/echo` instead of the migration tool.
    #[arg(long)]
    dry_run: bool,

    /// Path to the `lfs` binary used for `lfs migrate`.
    #[arg(long, default_value = "/usr/bin/lfs")]
    lfs_binary: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    polimor_agent::init_logging(&args.common.log);
    polimor_agent::set_parent_death_signal();

    let config = args
        .common
        .config
        .as_deref()
        .map(ConfigView::load)
        .transpose()
        .or_bail("failed to load configuration");
    let agent = config.as_ref().and_then(|c| c.agent(&args.common.id));

    let queue = agent.and_then(|a| a.queue.clone());
    let queue_props = queue.as_deref().and_then(|q| config.as_ref()?.queue(q));

    let stream = require(
        args.common
            .stream
            .clone()
            .or_else(|| queue_props.map(|q| q.stream_name.clone())),
        "--stream is required (via CLI or config)",
    );
    let consumer = require(
        args.common
            .consumer
            .clone()
            .or_else(|| queue_props.map(|q| q.consumer_name.clone())),
        "--consumer is required (via CLI or config)",
    );
    let subject = require(
        args.common
            .subject
            .clone()
            .or_else(|| queue_props.map(|q| q.subject.clone())),
        "--subject is required (via CLI or config)",
    );

    let backend = match config.as_ref().map(|c| c.backend()) {
        Some("nats") | None => Backend::Nats,
        Some(_) => Backend::Local,
    };
    let endpoints = polimor_agent::resolve_endpoints(
        &args.common.nats_server,
        config.as_ref().map(ConfigView::servers).unwrap_or(&[]),
    );

    let service = polimor_messaging::open(backend, &endpoints)
        .await
        .or_bail("failed to connect to the messaging backend");
    let mut subscriber = service
        .create_subscriber(&stream, &consumer, &subject)
        .await
        .or_bail("failed to create migration subscriber");

    let prefix: Vec<String> = if args.dry_run {
        DRY_RUN_PREFIX.iter().map(|s| s.to_string()).collect()
    } else {
        vec![
            args.lfs_binary.clone(),
            "migrate".to_string(),
            "-p".to_string(),
            "capacity".to_string(),
        ]
    };

    let stop = polimor_agent::StopFlag::new();
    polimor_agent::install_signal_handler(stop.clone());

    while !stop.is_stopped() {
        let payload = subscriber
            .receive()
            .await
            .or_bail("failed to receive a migration message");

        let line = match std::str::from_utf8(&payload) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "skipping non-UTF-8 migration payload");
                continue;
            }
        };

        let msg = match polimor_message::decode_migration(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "skipping unparseable migration message");
                continue;
            }
        };

        run_migration(&prefix, &msg.path).await;
    }

    Ok(())
}

/// Runs `prefix + [path]`, logging output and exit status. Launch and wait
/// failures are logged, not fatal — the loop continues with the next
/// message.
async fn run_migration(prefix: &[String], path: &str) {
    let mut argv = prefix.to_vec();
    argv.push(path.to_string());

    let mut process = Process::new(argv);
    let mut output = match process.launch().await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, path = %path, "failed to launch the migration tool");
            return;
        }
    };

    while let Some(line) = output.next_line().await {
        tracing::info!(path = %path, output = %line, "migration tool output");
    }

    match process.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(path = %path, ?status, "migration tool exited non-zero");
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path, "failed to wait on the migration tool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_prefix_echoes_instead_of_migrating() {
        let prefix: Vec<String> = DRY_RUN_PREFIX.iter().map(|s| s.to_string()).collect();
        let mut argv = prefix.clone();
        argv.push("/lustre/fs1/a".to_string());

        let mut process = Process::new(argv);
        let mut output = process.launch().await.unwrap();
        let line = output.next_line().await.unwrap();
        assert_eq!(line, "/lustre/fs1/a");

        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    #[test]
    fn default_prefix_invokes_lfs_migrate_to_capacity() {
        let lfs_binary = "/usr/bin/lfs".to_string();
        let prefix = vec![
            lfs_binary.clone(),
            "migrate".to_string(),
            "-p".to_string(),
            "capacity".to_string(),
        ];
        assert_eq!(prefix, vec![lfs_binary, "migrate".into(), "-p".into(), "capacity".into()]);
    }
}
