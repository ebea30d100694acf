//! Resolve command - expands the references of stored documents.

use std::sync::Arc;

use docmesh::{Address, Client, ClientConfig, LoadPaths, store::InMemoryStore};
use tracing::debug;

use crate::cli::ResolveArgs;

/// Run the resolve command
pub async fn run(args: &ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path).await?,
        None => ClientConfig::default(),
    };
    if let Some(id_field) = &args.id_field {
        config.id_field = id_field.clone();
    }
    if let Some(parent_field) = &args.parent_field {
        config.parent_field = Some(parent_field.clone());
    }

    let mut paths = LoadPaths::none();
    for spec in &args.paths {
        paths.extend(&LoadPaths::parse(spec)?);
    }
    if paths.is_empty() {
        paths = config.default_load_paths.clone();
    }

    let addresses = args
        .addresses
        .iter()
        .map(|path| Address::parse(path.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let store = InMemoryStore::load_from_file(&args.store.data).await?;
    let client = Client::new(Arc::new(store), config);
    debug!(paths = %paths, count = addresses.len(), "resolving");

    let session = client.session();
    let resolution = client
        .request()
        .load_paths(paths)
        .resolve(&session, addresses)
        .await
        .wait()
        .await?;

    let documents: Vec<serde_json::Value> = resolution
        .documents
        .iter()
        .map(|doc| doc.as_ref().map_or(serde_json::Value::Null, |fields| fields.to_json()))
        .collect();
    let not_found: Vec<&str> = resolution
        .not_found
        .iter()
        .flat_map(|err| err.addresses().iter().map(Address::as_str))
        .collect();

    let value = serde_json::json!({
        "documents": documents,
        "not_found": not_found,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
