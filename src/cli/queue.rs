use anyhow::{bail, Result};
use clap::Subcommand;
use uuid::Uuid;

use crate::{api::TrackerApi, sync::worker::drain_once};

use super::{context::AppContext, output::print_outbox};

#[derive(Subcommand, Debug, Clone)]
pub enum QueueCommand {
    #[command(about = "Show submissions waiting for the server")]
    List,
    #[command(about = "Send everything that is due now")]
    Flush,
    #[command(about = "Forget a queued submission")]
    Drop { id: Uuid },
}

pub async fn queue(
    context: &AppContext,
    api: &dyn TrackerApi,
    command: QueueCommand,
) -> Result<()> {
    match command {
        QueueCommand::List => {
            print_outbox(&context.palette, &context.outbox.list().await?);
        }
        QueueCommand::Flush => {
            let report = drain_once(api, &context.outbox, context.clock.time()).await?;
            println!("Sent {}, rejected {}", report.sent, report.rejected);
            if let Some(error) = report.deferred {
                println!(
                    "{}",
                    context
                        .palette
                        .warn
                        .paint(format!("Stopped early, server unreachable: {error}"))
                );
            }
        }
        QueueCommand::Drop { id } => {
            if !context.outbox.remove(id).await? {
                bail!("Nothing queued under {id}");
            }
            println!("Dropped {id}");
        }
    }
    Ok(())
}
