use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::database::models::{Direction, NewHierarchyLevel, Permissions};
use crate::services::HierarchyLevelService;

#[derive(Subcommand)]
pub enum LevelCommands {
    #[command(about = "List hierarchy levels, highest authority first")]
    List,

    #[command(about = "Create a hierarchy level")]
    Create {
        #[arg(help = "Level name")]
        name: String,

        #[arg(long, help = "Display color, e.g. #3366ff")]
        color: Option<String>,

        #[arg(long, help = "Insert at this position instead of appending")]
        position: Option<i32>,

        #[arg(long, help = "Permissions as JSON, e.g. '{\"can_take_survey\": true}'")]
        permissions: Option<String>,
    },

    #[command(about = "Move a level one step up or down")]
    Move {
        #[arg(help = "Level id")]
        id: Uuid,

        #[arg(help = "up or down")]
        direction: Direction,
    },

    #[command(about = "Delete an unassigned level")]
    Delete {
        #[arg(help = "Level id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: LevelCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let levels = HierarchyLevelService::new(ctx.pool.clone(), ctx.settings);

    match cmd {
        LevelCommands::List => {
            let all = levels.list().await?;
            if all.is_empty() {
                return output_empty_collection(&output_format, "levels", "No hierarchy levels defined");
            }

            match output_format {
                OutputFormat::Json => output_collection_json("levels", &all)?,
                OutputFormat::Text => {
                    println!("{:<4} {:<20} {:<10} {}", "POS", "NAME", "COLOR", "ID");
                    println!("{}", "-".repeat(75));
                    for level in &all {
                        println!(
                            "{:<4} {:<20} {:<10} {}",
                            level.position,
                            level.name,
                            level.color.as_deref().unwrap_or("-"),
                            level.id
                        );
                    }
                }
            }
            Ok(())
        }
        LevelCommands::Create {
            name,
            color,
            position,
            permissions,
        } => {
            let permissions: Permissions = match permissions {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Invalid permissions JSON: {}", e))?,
                None => Permissions::default(),
            };
            let level = levels
                .create(NewHierarchyLevel {
                    name,
                    color,
                    permissions,
                    position,
                })
                .await?;

            output_success(
                &output_format,
                &format!("Hierarchy level '{}' created at position {}", level.name, level.position),
                Some(json!({ "id": level.id, "position": level.position })),
            )
        }
        LevelCommands::Move { id, direction } => {
            levels.move_level(id, direction).await?;
            let level = levels.get(id).await?;
            output_success(
                &output_format,
                &format!("Hierarchy level '{}' is now at position {}", level.name, level.position),
                Some(json!({ "id": level.id, "position": level.position })),
            )
        }
        LevelCommands::Delete { id } => {
            levels.delete(id).await?;
            output_success(&output_format, &format!("Hierarchy level {} deleted", id), None)
        }
    }
}
