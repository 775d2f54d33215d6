use std::sync::Arc;

use banter_core::Message;
use banter_directory::{
    HttpProfileDirectory, HttpSubjectResolver, ProfileDirectory, SubjectResolver,
};
use banter_server::ServerConfig;
use banter_store::{MessageStore, MongoStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("starting banter chat server");

    let mongo_uri = env_or("BANTER_MONGO_URI", "mongodb://chat-db:27017");
    let mongo_db = env_or("BANTER_MONGO_DB", "banter");
    let identity_url = env_or("BANTER_IDENTITY_URL", "http://identity:8081");
    let profile_url = env_or("BANTER_PROFILE_URL", "http://api:8081");

    let mut config = ServerConfig::default();
    if let Some(port) = std::env::var("BANTER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.port = port;
    }

    let store = MongoStore::connect(&mongo_uri, &mongo_db)
        .await
        .expect("failed to configure message store");

    // Boot marker; best effort, the store may still be coming up.
    if let Err(e) = store.append(&Message::system("Server started!")).await {
        tracing::warn!(error = %e, "boot marker not persisted");
    }

    let store: Arc<dyn MessageStore> = Arc::new(store);
    let directory: Arc<dyn ProfileDirectory> = Arc::new(HttpProfileDirectory::new(&profile_url));
    let subjects: Arc<dyn SubjectResolver> = Arc::new(HttpSubjectResolver::new(&identity_url));

    let port = config.port;
    let _handle = banter_server::start(config, store, directory, subjects)
        .await
        .expect("failed to start server");

    tracing::info!(port = port, "banter ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
