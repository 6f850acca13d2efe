use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use fieldmap_cli::{FieldmapConfig, build_engine, load_store, read_request, schema_dir};
use fieldmap_model::{MappingRequest, MappingRun};
use tracing::info_span;

use crate::cli::{MapArgs, SchemasArgs};
use crate::summary::{print_run, print_schema_fields, print_schema_list};

pub fn run_map(
    config: &FieldmapConfig,
    schema_dir_override: Option<&Path>,
    args: &MapArgs,
) -> Result<MappingRun> {
    let span = info_span!("map_command");
    let _guard = span.enter();

    let mut request = request_from_args(args)?;
    if let Some(threshold) = args.threshold {
        request.auto_accept_threshold = Some(threshold);
    }

    let store = load_store(&schema_dir(config, schema_dir_override))?;
    let engine = build_engine(config, store)?;
    let run = engine
        .map(&request)
        .with_context(|| format!("map columns onto `{}`", request.target_schema_id))?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&run).context("serialize run")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&run).context("serialize run")?);
    } else {
        print_run(&run);
    }
    Ok(run)
}

pub fn run_schemas(
    config: &FieldmapConfig,
    schema_dir_override: Option<&Path>,
    args: &SchemasArgs,
) -> Result<()> {
    let store = load_store(&schema_dir(config, schema_dir_override))?;
    if let Some(id) = &args.id {
        let schema = store.get_schema(id)?;
        let aliases = store.get_aliases(id)?;
        print_schema_fields(&schema, &aliases);
        return Ok(());
    }
    let mut schemas = Vec::new();
    for id in store.schema_ids() {
        let schema = store.get_schema(&id)?;
        let aliases = store.get_aliases(&id)?;
        schemas.push((schema, aliases.len()));
    }
    if schemas.is_empty() {
        bail!("no schemas found");
    }
    print_schema_list(&schemas);
    Ok(())
}

fn request_from_args(args: &MapArgs) -> Result<MappingRequest> {
    if let (Some(schema), Some(columns)) = (&args.schema, &args.columns) {
        let columns = columns.iter().map(String::as_str).map(str::trim);
        return Ok(MappingRequest::new(schema.clone(), columns));
    }
    match args.request.as_deref() {
        Some(path) if path == Path::new("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("read request from stdin")?;
            serde_json::from_str(&text).context("parse request from stdin")
        }
        Some(path) => read_request(path),
        None => bail!("either a request file or --schema with --columns is required"),
    }
}
