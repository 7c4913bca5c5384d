//! Unit tests for subcommand parsing, execution and exit codes.

use super::helpers::{DINAGAT, NULL_ISLAND, Workspace, invoke, names};
use super::*;
use geoprovider_core::{FeatureId, ProviderError, ResultType, SortKey};
use rstest::{fixture, rstest};

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

#[rstest]
fn parses_query_flags() {
    let cli = Cli::try_parse_from([
        "geoprovider",
        "query",
        "--type",
        "GeoJSON",
        "--data",
        "islands.geojson",
        "--limit",
        "5",
        "--sortby",
        "-pop",
        "--where",
        "name=Dinagat Islands",
        "--select",
        "name,pop",
        "--hits",
    ])
    .expect("query flags should parse");
    let Command::Query(args) = cli.command else {
        panic!("expected query command");
    };
    assert_eq!(args.provider.kind.as_deref(), Some("GeoJSON"));
    let params = args.params().expect("params should build");
    assert_eq!(params.limit, 5);
    assert_eq!(params.offset, 0);
    assert_eq!(params.sortby, SortKey::parse_list("-pop"));
    assert_eq!(params.select_properties, ["name", "pop"]);
    assert_eq!(params.result_type, ResultType::Hits);
    assert_eq!(
        params.filter.properties,
        vec![("name".to_owned(), serde_json::json!("Dinagat Islands"))]
    );
}

#[rstest]
fn equality_values_parse_as_json_when_possible() {
    let cli = Cli::try_parse_from([
        "geoprovider", "query", "--where", "pop=7000", "--where", "open=true",
    ])
    .expect("query flags should parse");
    let Command::Query(args) = cli.command else {
        panic!("expected query command");
    };
    let params = args.params().expect("params should build");
    assert_eq!(
        params.filter.properties,
        vec![
            ("pop".to_owned(), serde_json::json!(7000)),
            ("open".to_owned(), serde_json::json!(true)),
        ]
    );
}

#[rstest]
#[case(&["--bbox", "1,2,3"], "bbox")]
#[case(&["--where", "no-equals-sign"], "where")]
#[case(&["--where", "=value"], "where")]
fn rejects_malformed_query_flags(#[case] extra: &[&str], #[case] expected: &str) {
    let mut args = vec!["geoprovider", "query"];
    args.extend_from_slice(extra);
    let cli = Cli::try_parse_from(args).expect("flags should parse");
    let Command::Query(query) = cli.command else {
        panic!("expected query command");
    };
    match query.params() {
        Err(CliError::InvalidArgument { field, .. }) => assert_eq!(field, expected),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
fn query_returns_seeded_feature(workspace: Workspace) {
    let result = workspace.run("query", &[], "").expect("query should succeed");
    assert_eq!(result["type"], "FeatureCollection");
    assert_eq!(result["numberMatched"], 1);
    assert_eq!(result["numberReturned"], 1);
    assert_eq!(names(&result), ["Dinagat Islands"]);
}

#[rstest]
fn query_hits_reports_count_only(workspace: Workspace) {
    let result = workspace
        .run("query", &["--hits"], "")
        .expect("query should succeed");
    assert_eq!(result["numberMatched"], 1);
    assert!(names(&result).is_empty());
}

#[rstest]
fn query_bbox_excludes_distant_features(workspace: Workspace) {
    let result = workspace
        .run("query", &["--bbox", "-10,-10,10,10"], "")
        .expect("query should succeed");
    assert_eq!(result["numberMatched"], 0);
}

#[rstest]
fn invalid_cql_exits_with_invalid_input(workspace: Workspace) {
    let err = workspace
        .run("query", &["--filter", "pop >"], "")
        .expect_err("bad filter should fail");
    assert!(matches!(
        err,
        CliError::Provider(ProviderError::InvalidFilterSyntax { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
fn get_wraps_feature_in_collection(workspace: Workspace) {
    let result = workspace
        .run("get", &["123-456"], "")
        .expect("get should succeed");
    assert_eq!(result["type"], "FeatureCollection");
    assert_eq!(result["features"][0]["id"], "123-456");
    assert_eq!(names(&result), ["Dinagat Islands"]);
}

#[rstest]
fn properties_whitelist_limits_output(workspace: Workspace) {
    let result = workspace
        .run("get", &["--properties", "name", "123-456"], "")
        .expect("get should succeed");
    let properties = result["features"][0]["properties"]
        .as_object()
        .expect("properties object");
    assert_eq!(properties.keys().collect::<Vec<_>>(), ["name"]);
}

#[rstest]
fn get_missing_feature_exits_not_found(workspace: Workspace) {
    let err = workspace
        .run("get", &["SOMETHING DIFFERENT"], "")
        .expect_err("unknown id should fail");
    match &err {
        CliError::Provider(ProviderError::NotFound { id }) => {
            assert_eq!(id, &FeatureId::from("SOMETHING DIFFERENT"));
        }
        other => panic!("expected NotFound, found {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);
}

#[rstest]
fn create_from_stdin_appends_feature(workspace: Workspace) {
    let created = workspace
        .run("create", &["-"], NULL_ISLAND)
        .expect("create should succeed");
    let id = created["id"].as_str().expect("generated text id").to_owned();

    let fetched = workspace.run("get", &[id.as_str()], "").expect("get should succeed");
    assert_eq!(names(&fetched), ["Null Island"]);
    let all = workspace.run("query", &[], "").expect("query should succeed");
    assert_eq!(names(&all), ["Dinagat Islands", "Null Island"]);
}

#[rstest]
fn create_from_file_with_taken_id_exits_conflict(workspace: Workspace) {
    let payload = workspace.write("dinagat.json", DINAGAT);
    let err = workspace
        .run("create", &[payload.as_str()], "")
        .expect_err("duplicate id should fail");
    assert!(matches!(
        err,
        CliError::Provider(ProviderError::DuplicateIdentifier { .. })
    ));
    assert_eq!(err.exit_code(), 4);
}

#[rstest]
fn create_rejects_missing_payload_file(workspace: Workspace) {
    let missing = workspace.path("absent.json");
    let err = workspace
        .run("create", &[missing.as_str()], "")
        .expect_err("missing payload should fail");
    match &err {
        CliError::MissingPayload { path } => assert_eq!(path, &missing),
        other => panic!("expected MissingPayload, found {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
fn create_rejects_invalid_feature(workspace: Workspace) {
    let err = workspace
        .run("create", &["-"], r#"{"type": "Point"}"#)
        .expect_err("non-feature payload should fail");
    assert!(matches!(
        err,
        CliError::Provider(ProviderError::InvalidFeature(_))
    ));
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
fn update_keeps_identifier(workspace: Workspace) {
    let replacement = r#"{
        "type": "Feature",
        "id": "SOMETHING DIFFERENT",
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
        "properties": {"name": "Null Island"}
    }"#;
    let updated = workspace
        .run("update", &["123-456", "-"], replacement)
        .expect("update should succeed");
    assert_eq!(updated["id"], "123-456");

    let fetched = workspace
        .run("get", &["123-456"], "")
        .expect("original id should resolve");
    assert_eq!(names(&fetched), ["Null Island"]);
    let err = workspace
        .run("get", &["SOMETHING DIFFERENT"], "")
        .expect_err("replacement id should be ignored");
    assert_eq!(err.exit_code(), 3);
}

#[rstest]
fn delete_removes_feature(workspace: Workspace) {
    let deleted = workspace
        .run("delete", &["123-456"], "")
        .expect("delete should succeed");
    assert_eq!(deleted["id"], "123-456");

    let all = workspace.run("query", &[], "").expect("query should succeed");
    assert_eq!(all["numberMatched"], 0);
    let err = workspace
        .run("delete", &["123-456"], "")
        .expect_err("second delete should fail");
    assert_eq!(err.exit_code(), 3);
}

#[rstest]
fn fields_lists_property_types(workspace: Workspace) {
    let fields = workspace.run("fields", &[], "").expect("fields should succeed");
    assert_eq!(fields, serde_json::json!({ "name": "string", "pop": "integer" }));
}

#[rstest]
fn unreadable_store_exits_with_storage_error(workspace: Workspace) {
    let store = workspace.write("broken.geojson", r#"{"type": "FeatureCollection", "feat"#);
    let err = invoke(
        &["query", "--type", "GeoJSON", "--data", store.as_str()],
        "",
    )
    .expect_err("malformed store should fail");
    assert!(matches!(
        err,
        CliError::Provider(ProviderError::BackendUnavailable { .. })
    ));
    assert_eq!(err.exit_code(), 1);
}

#[cfg(feature = "store-sqlite")]
fn sqlite_args<'a>(subcommand: &'a str, db: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![subcommand, "--type", "SQLite", "--data", db, "--table", "islands"];
    args.extend_from_slice(extra);
    args
}

#[cfg(feature = "store-sqlite")]
#[rstest]
fn sqlite_store_round_trips_through_cli(workspace: Workspace) {
    let db = workspace.path("islands.db");
    invoke(&sqlite_args("create", db.as_str(), &["-"]), DINAGAT).expect("create should succeed");
    let result =
        invoke(&sqlite_args("get", db.as_str(), &["123-456"]), "").expect("get should succeed");
    assert_eq!(names(&result), ["Dinagat Islands"]);
}

#[rstest]
fn sqlite_without_table_is_rejected(workspace: Workspace) {
    let db = workspace.path("islands.db");
    let err = invoke(&["fields", "--type", "SQLite", "--data", db.as_str()], "")
        .expect_err("missing table should fail");
    assert!(matches!(
        err,
        CliError::Provider(ProviderError::InvalidConfiguration(_))
    ));
}

#[rstest]
fn missing_type_reports_environment_variable() {
    let err = invoke(&["fields", "--data", "islands.geojson"], "")
        .expect_err("missing type should fail");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, "type");
            assert_eq!(env, ENV_TYPE);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn unknown_subcommand_is_argument_error() {
    let err = invoke(&["reproject"], "").expect_err("unknown subcommand should fail");
    assert!(matches!(err, CliError::ArgumentParsing(_)));
    assert_eq!(err.exit_code(), 2);
}
