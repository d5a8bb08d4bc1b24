//! Command execution against the wired repositories

use std::io::{self, Write};

use serde_json::{Value, json};
use tracing::info;

use super::{Command, EntityKind};
use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::sql::DriverRegistry;
use crate::Repositories;

/// Loads configuration, wires the repositories, runs `command` and prints
/// its JSON result
pub async fn run(command: Command) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    run_with(&command, &config, DriverRegistry::global(), io::stdout()).await
}

/// Wires the repositories from `config` and writes the JSON result of
/// `command` to `out`
///
/// Nothing else is written to `out`; query logs and tracing go to stderr
/// unless the `writer` query-log backend is configured.
pub async fn run_with(
    command: &Command,
    config: &AppConfig,
    registry: &DriverRegistry,
    mut out: impl Write,
) -> anyhow::Result<()> {
    let repositories = Repositories::from_config(config, registry).await?;
    let output = execute(command, &repositories).await;
    repositories.database().close().await?;

    writeln!(out, "{}", serde_json::to_string_pretty(&output?)?)?;
    Ok(())
}

/// Runs one command and returns what it should print
pub async fn execute(command: &Command, repositories: &Repositories) -> anyhow::Result<Value> {
    let value = match command {
        Command::Get { entity, id } => get(repositories, *entity, *id).await?,
        Command::GetMulti { entity, ids } => get_multi(repositories, *entity, ids).await?,
        Command::Flush => {
            repositories.flush().await?;
            info!("Cache flushed");
            json!({ "flushed": true })
        }
        Command::Bump { user_id } => {
            repositories.users.bump(*user_id).await?;
            json!({ "user_id": user_id, "cooldown_started": true })
        }
        Command::Config { name } => {
            let value = repositories.configs.get(name).await?;
            json!({ "name": name, "value": value })
        }
    };

    Ok(value)
}

async fn get(repositories: &Repositories, entity: EntityKind, id: i64) -> anyhow::Result<Value> {
    let value = match entity {
        EntityKind::User => serde_json::to_value(repositories.users.get(id).await?)?,
        EntityKind::Item => serde_json::to_value(repositories.items.get(id).await?)?,
        EntityKind::Shipping => serde_json::to_value(repositories.shippings.get(id).await?)?,
        EntityKind::TransactionEvidence => {
            serde_json::to_value(repositories.transaction_evidences.get(id).await?)?
        }
    };

    Ok(value)
}

async fn get_multi(
    repositories: &Repositories,
    entity: EntityKind,
    ids: &[i64],
) -> anyhow::Result<Value> {
    let value = match entity {
        EntityKind::User => serde_json::to_value(repositories.users.get_multi(ids).await?)?,
        EntityKind::Item => serde_json::to_value(repositories.items.get_multi(ids).await?)?,
        EntityKind::Shipping => {
            serde_json::to_value(repositories.shippings.get_multi(ids).await?)?
        }
        EntityKind::TransactionEvidence => {
            serde_json::to_value(repositories.transaction_evidences.get_multi(ids).await?)?
        }
    };

    Ok(value)
}
