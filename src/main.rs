// ABOUTME: CLI entry point for trs-migrator
// ABOUTME: Parses commands and drives the migration runner against PostgreSQL

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::EnvFilter;

use trs_migrator::config::Config;
use trs_migrator::migration::Migration;
use trs_migrator::replication::{list_publications, publication_tables};
use trs_migrator::runner::{Direction, Plan, StepEvent};
use trs_migrator::scripts::{DirectoryScripts, EmbeddedScripts, ScriptSource};
use trs_migrator::{
    catalog, postgres, Goal, MigrationTarget, Migrator, MigratorError, PgTarget,
};

#[derive(Parser)]
#[command(name = "trs-migrator")]
#[command(version, about = "Schema migrations for the Teaching Record System database", long_about = None)]
struct Cli {
    /// Config file (defaults to ./trs-migrator.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, env = "TRS_DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Load routine scripts from this directory instead of the bundled copies
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every migration in the catalog
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show which migrations are applied to the database
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Apply pending migrations
    Up {
        /// Stop after this migration instead of the latest
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        allow_out_of_order: bool,
        #[arg(long)]
        ignore_checksums: bool,
    },
    /// Revert applied migrations
    Down {
        /// Keep this migration and everything before it
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        target: Option<String>,
        /// Revert every migration
        #[arg(long)]
        all: bool,
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        ignore_checksums: bool,
    },
    /// Print the SQL for a range of migrations without connecting
    Script {
        /// Last migration already applied (exclusive)
        #[arg(long)]
        from: Option<String>,
        /// Last migration to include (inclusive)
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the catalog offline
    Verify,
    /// Inspect logical replication publications
    Publication {
        #[command(subcommand)]
        command: PublicationCommand,
    },
}

#[derive(Subcommand)]
enum PublicationCommand {
    List,
    /// Show the tables a publication exposes (defaults to the reporting publication)
    Show { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(dir) = cli.scripts_dir {
        config.scripts_dir = Some(dir);
    }

    match &cli.command {
        Commands::Up {
            allow_out_of_order,
            ignore_checksums,
            ..
        } => {
            config.runner.allow_out_of_order |= *allow_out_of_order;
            config.runner.ignore_checksums |= *ignore_checksums;
        }
        Commands::Down {
            ignore_checksums, ..
        } => {
            config.runner.ignore_checksums |= *ignore_checksums;
        }
        _ => {}
    }

    let scripts: Box<dyn ScriptSource> = match &config.scripts_dir {
        Some(dir) => Box::new(DirectoryScripts::new(dir)?),
        None => Box::new(EmbeddedScripts),
    };

    let migrator = Migrator::new(
        catalog::migrations()?,
        scripts,
        config.history_table(),
        config.runner_options(),
    )
    .context("The migration catalog is invalid")?;

    match cli.command {
        Commands::List { json } => list(&migrator, json)?,
        Commands::Status { json } => {
            let mut target = open_target(&config).await?;
            let applied = target.applied().await?;
            let statuses = migrator.status(&applied)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    println!(
                        "{:<60} {:<18} {}",
                        status.id,
                        format!("{:?}", status.state),
                        status.applied_on.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Commands::Up {
            target, dry_run, ..
        } => {
            let goal = target.map_or(Goal::Latest, Goal::Migration);
            run(&migrator, &config, goal, Direction::Up, dry_run, true).await?;
        }
        Commands::Down {
            target,
            all,
            yes,
            dry_run,
            ..
        } => {
            let goal = match target {
                Some(id) if !all => Goal::Migration(id),
                _ => Goal::Initial,
            };
            run(&migrator, &config, goal, Direction::Down, dry_run, yes).await?;
        }
        Commands::Script { from, to, output } => {
            let script = migrator.script(from.as_deref(), to.as_deref())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, script)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Wrote migration script to {}", path.display());
                }
                None => print!("{}", script),
            }
        }
        Commands::Verify => {
            for migration in migrator.migrations() {
                migration.render_up(migrator.scripts())?;
                migration.render_down(migrator.scripts())?;
            }
            println!(
                "{} migration(s) verified, latest is {}",
                migrator.migrations().len(),
                migrator
                    .migrations()
                    .last()
                    .map(|m| m.id.to_string())
                    .unwrap_or_default()
            );
        }
        Commands::Publication { command } => {
            let target = open_target(&config).await?;
            match command {
                PublicationCommand::List => {
                    for name in list_publications(target.client()).await? {
                        println!("{}", name);
                    }
                }
                PublicationCommand::Show { name } => {
                    let name = name.unwrap_or_else(|| config.publication.name.clone());
                    let tables = publication_tables(target.client(), &name).await?;
                    if tables.is_empty() {
                        println!("Publication '{}' has no tables or does not exist", name);
                    }
                    for table in tables {
                        println!("{}", table);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn open_target(config: &Config) -> Result<PgTarget> {
    let client = postgres::connect(config.database_url()?, config.accept_invalid_certs).await?;
    postgres::set_lock_timeout(
        &client,
        Duration::from_secs(config.runner.lock_timeout_secs),
    )
    .await?;
    Ok(PgTarget::new(client, config.history_table()))
}

fn list(migrator: &Migrator, json: bool) -> Result<()> {
    if json {
        let entries: Vec<serde_json::Value> = migrator
            .migrations()
            .iter()
            .map(|m: &Migration| {
                serde_json::json!({
                    "id": m.id,
                    "transactional": m.transactional,
                    "irreversible": m.irreversible,
                    "operations": m.up.iter().map(|op| op.describe()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for m in migrator.migrations() {
            let marker = if m.transactional { " " } else { "*" };
            println!("{}{:<60} {}", marker, m.id.to_string(), m.summary());
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan<'_>) {
    for step in &plan.steps {
        let arrow = match step.direction {
            Direction::Up => "+",
            Direction::Down => "-",
        };
        println!("{} {}", arrow, step.migration.id);
    }
}

async fn run(
    migrator: &Migrator,
    config: &Config,
    goal: Goal,
    intent: Direction,
    dry_run: bool,
    confirmed: bool,
) -> Result<()> {
    let mut target = open_target(config).await?;

    if dry_run {
        let applied = target.applied().await?;
        let plan = migrator.plan(&applied, &goal)?;
        if intent == Direction::Up {
            plan.require_forward()?;
        }
        if plan.is_empty() {
            println!("Nothing to do: the database is already at the requested migration");
        } else {
            println!("Planned without the migration lock; a concurrent run may change it:");
            print_plan(&plan);
        }
        return Ok(());
    }

    let progress = ProgressBar::hidden();
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?,
    );
    // None when there was nothing to plan.
    let mut decision = None;

    let report = migrator
        .migrate_with(
            &mut target,
            &goal,
            |plan| {
                if intent == Direction::Up {
                    plan.require_forward()?;
                }
                print_plan(plan);

                let reverts = plan.reverts();
                if reverts > 0 && !confirmed {
                    let proceed = Confirm::new()
                        .with_prompt(format!(
                            "Revert {} migration(s)? Dropped columns and tables lose their data",
                            reverts
                        ))
                        .default(false)
                        .interact()
                        .map_err(|e| {
                            MigratorError::Validation(format!(
                                "failed to read confirmation: {}",
                                e
                            ))
                        })?;
                    if !proceed {
                        decision = Some(false);
                        return Ok(false);
                    }
                }

                decision = Some(true);
                progress.set_length(plan.len() as u64);
                progress.set_draw_target(ProgressDrawTarget::stderr());
                Ok(true)
            },
            |event| match event {
                StepEvent::Started { id, direction, .. } => {
                    progress.set_message(format!("{} {}", direction, id));
                }
                StepEvent::Finished { .. } => progress.inc(1),
            },
        )
        .await;
    progress.finish_and_clear();

    let report = report?;
    match decision {
        None => {
            println!("Nothing to do: the database is already at the requested migration");
            return Ok(());
        }
        Some(false) => {
            println!("Aborted");
            return Ok(());
        }
        Some(true) => {}
    }
    for id in &report.reverted {
        println!("Reverted {}", id);
    }
    for id in &report.applied {
        println!("Applied {}", id);
    }

    Ok(())
}
