use octofhir_idp::EnvConfigLoader;
use octofhir_idp_server::{ServerBuilder, apply_logging_level, init_tracing};

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    init_tracing();

    let cfg = match EnvConfigLoader::from_process_env().and_then(|loader| loader.load()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    apply_logging_level(&cfg.log_level);
    tracing::info!(
        profile = %cfg.profile,
        issuer = %cfg.issuer.issuer(),
        clients = cfg.clients.len(),
        "Configuration loaded"
    );

    // Nothing is bound until the engine has accepted every client.
    let server = match ServerBuilder::new(cfg).build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Provider initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
