//! topic-publisher: publish a timestamp message on an interval until the
//! operator confirms a stop

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use pubsub_lifecycle::{ctrl_c_interrupts, run_with_interrupts, ConsolePrompt, Session};
use pubsub_middleware::MiddlewareError;
use pubsub_tutorials::{exit_code, init_tracing, parse_interval, timestamp_message, ConnectionArgs};

#[derive(Parser, Debug)]
#[command(name = "topic-publisher")]
#[command(about = "Publish a timestamped message to a topic at a fixed interval")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Seconds between messages
    #[arg(long, default_value = "3", value_parser = parse_interval)]
    interval: Duration,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut session = Session::new();
    // Armed before setup so Ctrl-C during a slow connect still reaches the prompt
    let interrupts = ctrl_c_interrupts();
    let outcome = run(&mut session, &args, interrupts).await;
    // No-op after a graceful stop; releases a partial setup otherwise
    session.shutdown().await;

    exit_code(outcome)
}

async fn run(
    session: &mut Session,
    args: &Args,
    interrupts: mpsc::Receiver<()>,
) -> Result<(), MiddlewareError> {
    let conn = &args.connection;
    let properties = conn.load_properties()?;
    session.initialize(&conn.bridge, properties)?;
    info!(bridge = %conn.bridge, "Opened middleware bridge");

    let transport = session.connect(&conn.transport).await?;
    info!(transport = %conn.transport, "Created transport");

    session.publish_periodically(
        &transport,
        &conn.topic,
        args.interval,
        Box::new(|| timestamp_message(&chrono::Local::now().naive_local())),
    )?;
    info!(
        topic = %conn.topic,
        interval_ms = args.interval.as_millis() as u64,
        "Publishing periodically, press Ctrl-C to stop"
    );

    let report = run_with_interrupts(session, interrupts, ConsolePrompt::stdio()).await?;
    info!(released = report.released.len(), "Stopped");
    Ok(())
}
