use anyhow::Result;
use clap::Parser;

use clean_streets::cli::commands::{
    engagement::{CommentCommand, LikeCommand},
    issue::{AssignCommand, DeleteCommand, PriorityCommand, TransitionCommand},
    migrate::MigrateCommand,
    notifications::NotificationsCommand,
    report::ReportCommand,
    run_with_app, show_how_to_get_started,
    show_config::ShowConfigCommand,
    users::{AddUserCommand, SetRoleCommand, SetWardCommand},
    verify::VerifyCommand,
};
use clean_streets::cli::{Cli, Commands};
use clean_streets::config::{self, CleanStreetsConfig};
use clean_streets::lifecycle::IssuePayload;
use clean_streets::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    CleanStreetsConfig::load_env_file()?;
    let config = match &cli.config {
        Some(path) => CleanStreetsConfig::load_from(Some(path.as_path()))?,
        None => config::config()?.clone(),
    };
    init_telemetry(&config.observability.log_level, config.observability.json_logs)?;

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        // Default behavior: no subcommand - explain how to get started
        None => show_how_to_get_started(),
        Some(Commands::Migrate) => {
            runtime.block_on(async { MigrateCommand::new(config.database.clone()).execute().await })
        }
        Some(Commands::ShowConfig) => ShowConfigCommand::new(&config).execute(),
        Some(Commands::AddUser {
            name,
            email,
            role,
            ward,
        }) => runtime.block_on(run_with_app(
            &config,
            AddUserCommand {
                name,
                email,
                role,
                ward,
            },
        )),
        Some(Commands::SetRole { actor, user, role }) => {
            runtime.block_on(run_with_app(&config, SetRoleCommand { actor, user, role }))
        }
        Some(Commands::SetWard { actor, user, ward }) => {
            runtime.block_on(run_with_app(&config, SetWardCommand { actor, user, ward }))
        }
        Some(Commands::Verify { mode, image }) => {
            runtime.block_on(run_with_app(&config, VerifyCommand { mode, image }))
        }
        Some(Commands::Report {
            actor,
            title,
            description,
            category,
            address,
            lat,
            lng,
            priority,
            image,
        }) => {
            let payload = IssuePayload {
                title: Some(title),
                description: Some(description),
                category: Some(category),
                address: Some(address),
                latitude: Some(lat),
                longitude: Some(lng),
                priority,
            };
            runtime.block_on(run_with_app(
                &config,
                ReportCommand {
                    actor,
                    payload,
                    image,
                },
            ))
        }
        Some(Commands::Transition {
            actor,
            issue,
            status,
            proof,
        }) => runtime.block_on(run_with_app(
            &config,
            TransitionCommand {
                actor,
                issue,
                status,
                proof,
            },
        )),
        Some(Commands::Assign {
            actor,
            issue,
            official,
        }) => runtime.block_on(run_with_app(
            &config,
            AssignCommand {
                actor,
                issue,
                official,
            },
        )),
        Some(Commands::Priority {
            actor,
            issue,
            priority,
        }) => runtime.block_on(run_with_app(
            &config,
            PriorityCommand {
                actor,
                issue,
                priority,
            },
        )),
        Some(Commands::Delete { actor, issue }) => {
            runtime.block_on(run_with_app(&config, DeleteCommand { actor, issue }))
        }
        Some(Commands::Like { actor, issue }) => {
            runtime.block_on(run_with_app(&config, LikeCommand { actor, issue }))
        }
        Some(Commands::Comment { actor, issue, text }) => {
            runtime.block_on(run_with_app(&config, CommentCommand { actor, issue, text }))
        }
        Some(Commands::Notifications {
            actor,
            limit,
            mark_all_read,
        }) => runtime.block_on(run_with_app(
            &config,
            NotificationsCommand {
                actor,
                limit,
                mark_all_read,
            },
        )),
    }
}
