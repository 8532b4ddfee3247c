use mongodb::{bson::doc, Client, Database};
use tracing::{info, warn};

use crate::errors::Result;

pub async fn get_db(database_url: &str, db_name: &str) -> Result<Database> {
    let client = Client::with_uri_str(database_url).await?;
    let db = client.database(db_name);

    // The driver connects lazily; ping so a bad URL fails at startup.
    db.run_command(doc! { "ping": 1 }).await?;

    match db.list_collection_names().await {
        Ok(collections) => {
            info!(database = db_name, ?collections, "Connected to MongoDB");
            if !collections.iter().any(|c| c == super::mongo_store::COLLECTION) {
                warn!(
                    database = db_name,
                    "'{}' collection not found, it will be created on first insert",
                    super::mongo_store::COLLECTION
                );
            }
        }
        Err(e) => warn!(database = db_name, "Could not list collections: {}", e),
    }

    Ok(db)
}
