use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::database::models::SupervisorLink;
use crate::services::SupervisorScopeService;

#[derive(Subcommand)]
pub enum TeamCommands {
    #[command(about = "Show a team's supervisor chain, nearest first")]
    Chain {
        #[arg(help = "Team id")]
        team: Uuid,
    },

    #[command(about = "Re-derive a team's supervisor chain from its lead")]
    Refresh {
        #[arg(help = "Team id")]
        team: Uuid,
    },
}

fn print_chain(output_format: &OutputFormat, chain: &[SupervisorLink]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_collection_json("supervisors", chain)?,
        OutputFormat::Text => {
            println!("{:<4} {:<38} {}", "#", "USER", "LEVEL");
            println!("{}", "-".repeat(80));
            for (i, link) in chain.iter().enumerate() {
                println!("{:<4} {:<38} {}", i, link.user_id, link.hierarchy_level_id);
            }
        }
    }
    Ok(())
}

pub async fn handle(cmd: TeamCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let scope = SupervisorScopeService::new(ctx.pool.clone(), ctx.settings);

    match cmd {
        TeamCommands::Chain { team } => {
            let chain = scope.chain(team).await?;
            if chain.is_empty() {
                return output_empty_collection(&output_format, "supervisors", "Team has no supervisor chain");
            }
            print_chain(&output_format, &chain)
        }
        TeamCommands::Refresh { team } => {
            let chain = scope.refresh_chain(team).await?;
            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("Supervisor chain of team {} refreshed", team),
                    Some(json!({ "supervisors": chain })),
                ),
                OutputFormat::Text => {
                    println!("Supervisor chain of team {} refreshed ({} link(s))", team, chain.len());
                    print_chain(&output_format, &chain)
                }
            }
        }
    }
}
