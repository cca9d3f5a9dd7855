//! topic-publish-one: send one greeting to a topic, then tear down

use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use pubsub_lifecycle::Session;
use pubsub_middleware::MiddlewareError;
use pubsub_tutorials::{exit_code, greeting_message, init_tracing, ConnectionArgs};

#[derive(Parser, Debug)]
#[command(name = "topic-publish-one")]
#[command(about = "Publish a single direct message to a topic")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut session = Session::new();
    let outcome = publish_one(&mut session, &args.connection).await;
    let report = session.shutdown().await;
    info!(released = report.released.len(), "Closed middleware bridge");

    exit_code(outcome)
}

async fn publish_one(session: &mut Session, args: &ConnectionArgs) -> Result<(), MiddlewareError> {
    let properties = args.load_properties()?;
    session.initialize(&args.bridge, properties)?;
    info!(bridge = %args.bridge, "Opened middleware bridge");

    let transport = session.connect(&args.transport).await?;
    info!(transport = %args.transport, "Created transport");

    let publisher = session.create_publisher(&transport, &args.topic)?;
    let msg = greeting_message()?;
    publisher.send(&msg).await?;
    transport.flush().await?;
    info!(topic = %args.topic, "Message published");
    Ok(())
}
