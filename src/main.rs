//! account-broker binary entry point.

use std::sync::Arc;
use std::time::Duration;

use account_broker::account::{AccountContext, PersistPolicy};
use account_broker::api::{serve, AppState};
use account_broker::cache::ConfigCache;
use account_broker::cli::{self, Args};
use account_broker::client::HttpClient;
use account_broker::config::Config;
use account_broker::logging;
use account_broker::multifactor::PromptSlot;
use account_broker::registry::{EventBus, SessionRegistry};
use account_broker::security::{ApiKeyStore, AuthConfig};
use account_broker::store::{JsonFile, KeyringStore, MemoryStore, SecureStore};
use tracing::{info, warn};

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}

fn api_keys(config: &Config) -> ApiKeyStore {
    if !config.security.enabled {
        return ApiKeyStore::disabled();
    }
    let keys = ApiKeyStore::new(AuthConfig::default());
    for key in &config.security.api_keys {
        keys.add_key(key.as_str());
    }
    keys
}

#[tokio::main]
async fn main() -> account_broker::Result<()> {
    let args: Args = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        eprintln!("Run with --help for usage.");
        std::process::exit(2);
    });

    if args.help {
        cli::print_help();
        return Ok(());
    }
    if args.version {
        cli::print_version();
        return Ok(());
    }

    let config = Config::load(&args).unwrap_or_else(|e| fail(e));
    let _ = logging::init_with_filter(config.log_filter());

    info!("account-broker v{}", env!("CARGO_PKG_VERSION"));

    let server_config = config.to_server_config().unwrap_or_else(|e| fail(e));
    let remote = config.remote_url().unwrap_or_else(|e| fail(e));
    let interval = config.refresh_interval().unwrap_or_else(|e| fail(e));

    let memory = config.storage.memory_store;
    let store: Arc<dyn SecureStore> = if memory {
        warn!("sessions are kept in memory and lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(KeyringStore::new(config.storage.keychain_service.clone()))
    };
    let context = AccountContext::new(store, PersistPolicy::OnMutation);

    let client = HttpClient::new(remote).with_timeout(Duration::from_secs(config.remote.timeout_secs));
    let prompts = Arc::new(PromptSlot::new(EventBus::default()));

    let (registry_file, configs_file) = if memory {
        (JsonFile::ephemeral(), JsonFile::ephemeral())
    } else {
        info!(dir = %config.state_dir().display(), "using state directory");
        (
            JsonFile::at(config.registry_path()),
            JsonFile::at(config.configs_path()),
        )
    };

    let registry =
        SessionRegistry::open(Arc::new(client), context, prompts, registry_file).await;
    if let Some(e) = registry.load_error() {
        warn!("active account needs to be added again: {}", e);
    }
    let configs = ConfigCache::open(configs_file).await.with_interval(interval);

    let keys = api_keys(&config);
    if keys.is_enabled() {
        info!(keys = keys.count(), "API key authentication enabled");
    } else {
        warn!("API key authentication disabled");
    }

    let state = AppState::new(Arc::new(registry), Arc::new(configs)).with_keys(Arc::new(keys));

    serve(server_config, state).await?;

    info!("account-broker stopped");
    Ok(())
}
