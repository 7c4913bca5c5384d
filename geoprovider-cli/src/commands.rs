//! Subcommand arguments and the provider operations they run.

use std::io::Read;

use camino::Utf8Path;
use clap::Args;
use geoprovider_core::query::{DEFAULT_LIMIT, QueryFilter};
use geoprovider_core::{
    Feature, FeatureId, FeatureStore, Provider, QueryParams, SortKey, parse_feature,
};
use serde_json::{Value, json};

use crate::{CliError, ProviderArgs};

/// Payload argument naming standard input.
const STDIN_PAYLOAD: &str = "-";

/// Arguments for `query`.
#[derive(Debug, Args)]
pub(crate) struct QueryArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
    /// Bounding box as `minx,miny,maxx,maxy`.
    #[arg(long, value_name = "minx,miny,maxx,maxy", allow_hyphen_values = true)]
    pub(crate) bbox: Option<String>,
    /// Property equality filter; repeat for several.
    #[arg(long = "where", value_name = "name=value")]
    pub(crate) equals: Vec<String>,
    /// CQL2-text filter expression.
    #[arg(long, value_name = "cql")]
    pub(crate) filter: Option<String>,
    /// Sort keys such as `+name,-pop`.
    #[arg(long, value_name = "keys", allow_hyphen_values = true)]
    pub(crate) sortby: Option<String>,
    /// Matches to skip.
    #[arg(long, default_value_t = 0)]
    pub(crate) offset: usize,
    /// Maximum features returned.
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub(crate) limit: usize,
    /// Return only the number of matches.
    #[arg(long)]
    pub(crate) hits: bool,
    /// Replace geometries with `null`.
    #[arg(long)]
    pub(crate) skip_geometry: bool,
    /// Comma-separated properties to keep.
    #[arg(long, value_name = "names", value_delimiter = ',')]
    pub(crate) select: Vec<String>,
}

impl QueryArgs {
    /// Translate the flags into query parameters.
    pub(crate) fn params(&self) -> Result<QueryParams, CliError> {
        let mut params = QueryParams::default()
            .with_offset(self.offset)
            .with_limit(self.limit)
            .select(self.select.iter().cloned());
        if let Some(bbox) = &self.bbox {
            let rect = QueryFilter::parse_bbox(bbox).map_err(|err| CliError::InvalidArgument {
                field: "bbox",
                message: err.to_string(),
            })?;
            params = params.with_bbox(rect);
        }
        for clause in &self.equals {
            let (name, value) = parse_equality(clause)?;
            params = params.with_property(name, value);
        }
        if let Some(expression) = &self.filter {
            params = params.with_cql(expression.as_str());
        }
        if let Some(keys) = &self.sortby {
            params = params.with_sortby(SortKey::parse_list(keys));
        }
        if self.hits {
            params = params.hits();
        }
        if self.skip_geometry {
            params = params.skip_geometry();
        }
        Ok(params)
    }
}

/// Split `name=value`; the value is read as JSON when it parses, else as a
/// string.
fn parse_equality(clause: &str) -> Result<(&str, Value), CliError> {
    let (name, raw) = clause
        .split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| CliError::InvalidArgument {
            field: "where",
            message: format!("`{clause}` is not of the form name=value"),
        })?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((name.trim(), value))
}

/// Arguments for `get`.
#[derive(Debug, Args)]
pub(crate) struct GetArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
    /// Feature identifier.
    pub(crate) id: String,
}

/// Arguments for `create`.
#[derive(Debug, Args)]
pub(crate) struct CreateArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
    /// GeoJSON Feature file, or `-` for stdin.
    #[arg(value_name = "payload")]
    pub(crate) payload: String,
}

/// Arguments for `update`.
#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
    /// Feature identifier.
    pub(crate) id: String,
    /// Replacement GeoJSON Feature file, or `-` for stdin.
    #[arg(value_name = "payload")]
    pub(crate) payload: String,
}

/// Arguments for `delete`.
#[derive(Debug, Args)]
pub(crate) struct DeleteArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
    /// Feature identifier.
    pub(crate) id: String,
}

/// Arguments for `fields`.
#[derive(Debug, Args)]
pub(crate) struct FieldsArgs {
    #[command(flatten)]
    pub(crate) provider: ProviderArgs,
}

/// A single provider operation with its inputs resolved.
#[derive(Debug)]
pub(crate) enum Operation {
    Query(QueryParams),
    Get(FeatureId),
    Create(Feature),
    Update(FeatureId, Feature),
    Delete(FeatureId),
    Fields,
}

/// Run `operation` against `provider`, returning the JSON to print.
pub(crate) fn perform<S: FeatureStore>(
    provider: &Provider<S>,
    operation: Operation,
) -> Result<Value, CliError> {
    match operation {
        Operation::Query(params) => to_json(&provider.query(&params)?),
        Operation::Get(id) => to_json(&provider.get(&id)?),
        Operation::Create(feature) => {
            let id = provider.create(feature)?;
            Ok(json!({ "id": id }))
        }
        Operation::Update(id, feature) => {
            provider.update(&id, feature)?;
            Ok(json!({ "id": id }))
        }
        Operation::Delete(id) => {
            provider.delete(&id)?;
            Ok(json!({ "id": id }))
        }
        Operation::Fields => to_json(&provider.fields()?),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(CliError::SerialiseOutput)
}

/// Read a feature payload from `source`, a file path or `-` for `input`.
pub(crate) fn read_feature(source: &str, input: &mut dyn Read) -> Result<Feature, CliError> {
    let text = if source == STDIN_PAYLOAD {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|err| CliError::ReadPayload {
                source_name: "stdin".to_owned(),
                source: err,
            })?;
        text
    } else {
        read_payload_file(Utf8Path::new(source))?
    };
    Ok(parse_feature(&text)?)
}

fn read_payload_file(path: &Utf8Path) -> Result<String, CliError> {
    match geoprovider_fs::file_is_file(path) {
        Ok(true) => {}
        Ok(false) => {
            return Err(CliError::MissingPayload {
                path: path.to_path_buf(),
            });
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CliError::MissingPayload {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(CliError::ReadPayload {
                source_name: path.to_string(),
                source: err,
            });
        }
    }
    geoprovider_fs::read_to_string(path).map_err(|err| CliError::ReadPayload {
        source_name: path.to_string(),
        source: err,
    })
}
