//! Store info command - shows document counts per collection.

use docmesh::store::InMemoryStore;

use crate::cli::InfoArgs;
use crate::output::{OutputFormat, print_table};

/// Run the info command
pub async fn run(args: &InfoArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryStore::load_from_file(&args.store.data).await?;
    let collections = store.collections().await;
    let total: usize = collections.values().sum();

    match format {
        OutputFormat::Human => {
            println!("Data file:   {}", args.store.data.display());
            println!("Documents:   {total}");
            println!();
            let rows: Vec<Vec<String>> = collections
                .iter()
                .map(|(collection, count)| vec![collection.clone(), count.to_string()])
                .collect();
            print_table(&["COLLECTION", "DOCUMENTS"], &rows);
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "data": args.store.data.display().to_string(),
                "documents": total,
                "collections": collections,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
