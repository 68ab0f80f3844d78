use tracing::{error, info};

use roomchat::{server, ChatApp, ChatListener, Config};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            if let Err(e) = config.apply_env_overrides() {
                eprintln!("{e}");
                std::process::exit(1);
            }
            config
        }
    };

    // Initialize logging
    if let Err(e) = roomchat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        roomchat::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("roomchat starting");
    let app = ChatApp::new(config.clone()).await;
    info!("Rooms: {}", app.directory().list().await.join(", "));

    if config.ssh.enabled {
        let ssh_app = app.clone();
        let ssh_config = config.ssh.clone();
        tokio::spawn(async move {
            if let Err(e) = server::ssh::run(ssh_app, ssh_config).await {
                error!("SSH server stopped: {}", e);
            }
        });
    }

    let listener = match ChatListener::bind(&config.server).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to bind {}:{}: {}",
                config.server.host, config.server.port, e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = listener.serve(app).await {
        error!("Chat server stopped: {}", e);
        std::process::exit(1);
    }
}
