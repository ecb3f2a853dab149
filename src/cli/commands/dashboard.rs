use clap::Args;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::services::HealthAggregationService;

#[derive(Args)]
pub struct DashboardArgs {
    #[arg(long, help = "Manager whose scope is aggregated")]
    pub manager: Uuid,

    #[arg(long, help = "Only count sessions from this assessment period")]
    pub period: Option<String>,
}

pub async fn handle(args: DashboardArgs, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let aggregation = HealthAggregationService::new(ctx.pool.clone(), ctx.settings);
    let summaries = aggregation
        .team_health_for_manager(args.manager, args.period.as_deref())
        .await?;

    if summaries.is_empty() {
        return output_empty_collection(&output_format, "teams", "No teams in scope");
    }

    match output_format {
        OutputFormat::Json => output_collection_json("teams", &summaries)?,
        OutputFormat::Text => {
            println!("{:<30} {:>8} {:>12}", "TEAM", "HEALTH", "SUBMISSIONS");
            println!("{}", "-".repeat(52));
            for team in &summaries {
                println!(
                    "{:<30} {:>8} {:>12}",
                    team.team_name,
                    format_score(team.overall_health),
                    team.submission_count
                );
                for dim in &team.dimensions {
                    println!(
                        "    {:<26} {:>8} {:>12}   +{} ={} -{}",
                        dim.dimension_id,
                        format_score(Some(dim.avg_score)),
                        dim.response_count,
                        dim.trends.improving,
                        dim.trends.stable,
                        dim.trends.declining
                    );
                }
            }
        }
    }
    Ok(())
}
