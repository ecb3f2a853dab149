use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::services::OrgTreeService;

#[derive(Subcommand)]
pub enum OrgCommands {
    #[command(about = "List everyone reporting to a user, at any depth")]
    Subordinates {
        #[arg(help = "User id")]
        user: Uuid,
    },

    #[command(about = "Set or clear a user's manager and refresh affected team chains")]
    Assign {
        #[arg(help = "User id")]
        user: Uuid,

        #[arg(long, help = "New manager id; omit to detach the user")]
        manager: Option<Uuid>,
    },
}

pub async fn handle(cmd: OrgCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let org = OrgTreeService::new(ctx.pool.clone(), ctx.settings);

    match cmd {
        OrgCommands::Subordinates { user } => {
            let ids = org.subordinates(user).await?;
            if ids.is_empty() {
                return output_empty_collection(&output_format, "subordinates", "No subordinates");
            }
            match output_format {
                OutputFormat::Json => output_collection_json("subordinates", &ids)?,
                OutputFormat::Text => ids.iter().for_each(|id| println!("{}", id)),
            }
            Ok(())
        }
        OrgCommands::Assign { user, manager } => {
            let refreshed = org.assign_manager(user, manager).await?;

            let message = match manager {
                Some(m) => format!("User {} now reports to {} ({} team chain(s) refreshed)", user, m, refreshed),
                None => format!("User {} detached from the reporting tree ({} team chain(s) refreshed)", user, refreshed),
            };
            output_success(
                &output_format,
                &message,
                Some(json!({ "user_id": user, "manager_id": manager, "refreshed_teams": refreshed })),
            )
        }
    }
}
