//! topic-subscriber: print every message received on a topic until the
//! operator confirms a stop

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use pubsub_lifecycle::{ctrl_c_interrupts, run_with_interrupts, ConsolePrompt, Session};
use pubsub_middleware::MiddlewareError;
use pubsub_tutorials::{exit_code, init_tracing, ConnectionArgs, TopicPrinter};

#[derive(Parser, Debug)]
#[command(name = "topic-subscriber")]
#[command(about = "Subscribe to a topic and print the messages received")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut session = Session::new();
    // Armed before setup so Ctrl-C during a slow connect still reaches the prompt
    let interrupts = ctrl_c_interrupts();
    let outcome = run(&mut session, &args.connection, interrupts).await;
    session.shutdown().await;

    exit_code(outcome)
}

async fn run(
    session: &mut Session,
    conn: &ConnectionArgs,
    interrupts: mpsc::Receiver<()>,
) -> Result<(), MiddlewareError> {
    let properties = conn.load_properties()?;
    session.initialize(&conn.bridge, properties)?;
    info!(bridge = %conn.bridge, "Opened middleware bridge");

    let transport = session.connect(&conn.transport).await?;
    info!(transport = %conn.transport, "Created transport");

    let printer = Arc::new(TopicPrinter::new());
    session
        .subscribe(&transport, &conn.topic, Arc::clone(&printer) as _)
        .await?;

    let report = run_with_interrupts(session, interrupts, ConsolePrompt::stdio()).await?;
    info!(
        received = printer.received(),
        errors = printer.errors(),
        released = report.released.len(),
        "Stopped"
    );
    Ok(())
}
