//! memosync CLI - drive the sync engine from the terminal
//!
//! Merges snapshot files, inspects the local cache and its fingerprints, and
//! reconciles against a directory-backed remote store.

mod cli;
mod commands;
mod error;
mod remote;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, LocalCommands, MetadataCommands};
use crate::commands::common::{
    load_engine_config, open_store, resolve_config_path, resolve_db_path, resolve_user_id,
};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::local::{run_local_import, run_local_show};
use crate::commands::merge::run_merge;
use crate::commands::metadata::{run_metadata_clear, run_metadata_show, run_metadata_touch};
use crate::commands::pending::run_pending;
use crate::commands::record::run_record;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("memosync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path);
    let config = load_engine_config(&resolve_config_path(cli.config))?;
    let user_id = resolve_user_id(cli.user)?;

    match cli.command {
        Commands::Merge {
            data_type,
            remote,
            local,
            output,
            report,
        } => {
            let store = open_store(&db_path)?;
            run_merge(
                &store,
                &config,
                data_type,
                &remote,
                &local,
                output.as_deref(),
                report,
            )?;
        }
        Commands::Record { data_type, file } => {
            run_record(&open_store(&db_path)?, data_type, &file)?;
        }
        Commands::Pending { data_type, json } => {
            run_pending(&open_store(&db_path)?, &user_id, data_type, json)?;
        }
        Commands::Local { command } => {
            let store = open_store(&db_path)?;
            match command {
                LocalCommands::Import { data_type, file } => {
                    run_local_import(&store, &user_id, data_type, &file)?;
                }
                LocalCommands::Show { data_type } => run_local_show(&store, &user_id, data_type)?,
            }
        }
        Commands::Sync {
            data_type,
            remote_dir,
            no_push,
            json,
        } => {
            let store = open_store(&db_path)?;
            run_sync(store, &user_id, config, &remote_dir, data_type, !no_push, json).await?;
        }
        Commands::Delete {
            data_type,
            id,
            remote_dir,
        } => {
            let store = open_store(&db_path)?;
            run_delete(store, &user_id, config, &remote_dir, data_type, &id).await?;
        }
        Commands::Status { server, json } => {
            run_status(&open_store(&db_path)?, &user_id, &config, server.as_deref(), json)?;
        }
        Commands::Metadata { command } => {
            let store = open_store(&db_path)?;
            match command {
                MetadataCommands::Show { json } => {
                    run_metadata_show(&store, &user_id, &config, json)?;
                }
                MetadataCommands::Touch { data_type, at } => {
                    run_metadata_touch(&store, &user_id, &config, data_type, at.as_deref())?;
                }
                MetadataCommands::Clear => run_metadata_clear(&store, &user_id, &config)?,
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
