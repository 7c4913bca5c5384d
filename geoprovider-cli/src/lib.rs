//! Command-line interface for geoprovider feature stores.
//!
//! Every subcommand opens one provider from layered settings (CLI flags,
//! configuration files and `GEOPROVIDER_*` environment variables), runs a
//! single operation and prints the result as pretty JSON.
#![forbid(unsafe_code)]

use std::io::{Read, Write};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use geoprovider_core::{BackendKind, Provider, ProviderConfig};
use log::debug;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

mod commands;
mod error;

pub use error::CliError;

use commands::{
    CreateArgs, DeleteArgs, FieldsArgs, GetArgs, Operation, QueryArgs, UpdateArgs, perform,
    read_feature,
};

const ARG_TYPE: &str = "type";
const ARG_DATA: &str = "data";
const ARG_ID_FIELD: &str = "id-field";
const ARG_TABLE: &str = "table";
const ARG_PROPERTIES: &str = "properties";
const ENV_TYPE: &str = "GEOPROVIDER_CMDS_PROVIDER_KIND";
const ENV_DATA: &str = "GEOPROVIDER_CMDS_PROVIDER_DATA";

/// Run the geoprovider CLI with the current process arguments, environment
/// and standard streams.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdin, &mut stdout)
}

fn run_command(
    command: Command,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<(), CliError> {
    let (args, operation) = match command {
        Command::Query(args) => {
            let params = args.params()?;
            (args.provider, Operation::Query(params))
        }
        Command::Get(args) => (args.provider, Operation::Get(args.id.into())),
        Command::Create(args) => {
            let feature = read_feature(&args.payload, input)?;
            (args.provider, Operation::Create(feature))
        }
        Command::Update(args) => {
            let feature = read_feature(&args.payload, input)?;
            (args.provider, Operation::Update(args.id.into(), feature))
        }
        Command::Delete(args) => (args.provider, Operation::Delete(args.id.into())),
        Command::Fields(FieldsArgs { provider }) => (provider, Operation::Fields),
    };
    let config = args.into_config()?;
    debug!("opening {} provider over {}", config.kind(), config.data());
    let provider = Provider::from_config(&config)?;
    let value = perform(&provider, operation)?;
    write_json(output, &value)
}

fn write_json(writer: &mut dyn Write, value: &serde_json::Value) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "geoprovider",
    about = "Query and edit GeoJSON features held in files or SQLite tables",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query features with optional filters, sorting and paging.
    Query(QueryArgs),
    /// Fetch one feature by identifier.
    Get(GetArgs),
    /// Insert a feature read from a file or stdin.
    Create(CreateArgs),
    /// Replace a feature, keeping its identifier.
    Update(UpdateArgs),
    /// Remove a feature by identifier.
    Delete(DeleteArgs),
    /// List property names with their JSON types.
    Fields(FieldsArgs),
}

// Provider settings shared by every subcommand. No doc comment: the struct is
// flattened and its `about` would replace the subcommand's.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "provider")]
#[ortho_config(prefix = "GEOPROVIDER")]
struct ProviderArgs {
    /// Backend type: `GeoJSON` or `SQLite`.
    #[arg(long = ARG_TYPE, value_name = "type")]
    #[serde(default)]
    kind: Option<String>,
    /// GeoJSON file or SQLite database path.
    #[arg(long = ARG_DATA, value_name = "path")]
    #[serde(default)]
    data: Option<Utf8PathBuf>,
    /// Property carrying feature identifiers (default `id`).
    #[arg(long = ARG_ID_FIELD, value_name = "name")]
    #[serde(default)]
    id_field: Option<String>,
    /// Table holding the features (SQLite only).
    #[arg(long = ARG_TABLE, value_name = "name")]
    #[serde(default)]
    table: Option<String>,
    /// Comma-separated properties to emit; all when omitted.
    #[arg(long = ARG_PROPERTIES, value_name = "names", value_delimiter = ',')]
    #[serde(default)]
    properties: Option<Vec<String>>,
}

impl ProviderArgs {
    fn into_config(self) -> Result<ProviderConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ProviderConfig::try_from(merged)
    }
}

impl TryFrom<ProviderArgs> for ProviderConfig {
    type Error = CliError;

    fn try_from(args: ProviderArgs) -> Result<Self, Self::Error> {
        let kind = args.kind.ok_or(CliError::MissingArgument {
            field: ARG_TYPE,
            env: ENV_TYPE,
        })?;
        let kind = kind
            .parse::<BackendKind>()
            .map_err(|err| CliError::InvalidArgument {
                field: ARG_TYPE,
                message: err.to_string(),
            })?;
        let data = args.data.ok_or(CliError::MissingArgument {
            field: ARG_DATA,
            env: ENV_DATA,
        })?;

        let mut config = Self::new(kind, data.into_string());
        if let Some(id_field) = args.id_field {
            config = config.with_id_field(id_field);
        }
        if let Some(table) = args.table {
            config = config.with_table(table);
        }
        Ok(config.with_properties(args.properties.unwrap_or_default()))
    }
}

#[cfg(test)]
fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ProviderConfig, CliError> {
    let merged = ProviderArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ProviderConfig::try_from(merged)
}

#[cfg(test)]
mod tests;
