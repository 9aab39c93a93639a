use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::error::Error;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use workspace_agent::google::build_http_client;
use workspace_agent::logging::parse_level;
use workspace_agent::server::{build_state, router, AppState};
use workspace_agent::{setup_logging, AgentError, ChatResponse, Config, CredentialManager, OAuthClient};

#[derive(Parser)]
#[clap(name = "Workspace Agent")]
#[clap(version = "0.1.0")]
#[clap(about = "Natural-language agent for Gmail, Calendar, Docs, Sheets and Forms", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Force use of stderr-only logging (no file logging)
    #[clap(long, short, action)]
    stderr_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default if no command specified)
    #[clap(name = "serve")]
    Serve,

    /// Open the Google consent page and wait for the callback
    #[clap(name = "auth")]
    Auth,

    /// Test the stored credentials
    #[clap(name = "test")]
    Test,

    /// Print the tool dispatch table and catalog
    #[clap(name = "tools")]
    Tools,

    /// Run one chat turn from the terminal
    #[clap(name = "chat")]
    Chat {
        /// The message to send to the agent
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let level = parse_level(&config.log_level);
    let log_file = if cli.stderr_only {
        env_logger::builder().filter_level(level).init();
        String::from("stderr-only")
    } else {
        setup_logging(level, Some(&config.log_file))?
    };
    debug!("Logs will be saved to {}", log_file);

    match cli.command {
        Some(Commands::Auth) => run_auth(&config).await,
        Some(Commands::Test) => run_test(&config).await,
        Some(Commands::Tools) => {
            let state = build_state(&config)?;
            print_tools(&state);
            Ok(())
        }
        Some(Commands::Chat { message }) => run_chat(&config, &message).await,
        Some(Commands::Serve) | None => run_server(&config).await,
    }
}

async fn run_server(config: &Config) -> Result<(), Box<dyn Error>> {
    info!("Workspace Agent starting...");
    let state = build_state(config)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    let result = axum::serve(listener, router(state)).await;
    if let Err(ref e) = result {
        error!("Error running HTTP server: {}", e);
    } else {
        info!("HTTP server completed successfully");
    }
    result.map_err(|e| e.into())
}

async fn run_auth(config: &Config) -> Result<(), Box<dyn Error>> {
    println!("Starting OAuth authentication flow...");
    let state = build_state(config)?;
    let url = state.begin_authorization()?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Waiting for the OAuth callback on {}", config.redirect_uri);

    if webbrowser::open(&url).is_err() {
        println!("Open this URL in your browser to authorize the agent:\n\n{}\n", url);
    }

    let waiter = state.clone();
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move { waiter.wait_for_authorization().await })
        .await?;

    println!(
        "Credentials stored at {}",
        state.credentials.path().display()
    );
    Ok(())
}

async fn run_test(config: &Config) -> Result<(), Box<dyn Error>> {
    println!("Testing Google credentials...");
    let http = build_http_client(config.request_timeout)?;
    let credentials = CredentialManager::new(
        config.token_path.clone(),
        OAuthClient::from_config(config),
        http,
    );

    match credentials.ensure_valid().await {
        Ok(credential) => {
            match credential.expiry {
                Some(expiry) => println!("Access token valid until {}", expiry.to_rfc3339()),
                None => println!("Access token has no recorded expiry"),
            }
            println!("Granted scopes:");
            for scope in &credential.scopes {
                println!("  {}", scope);
            }
            println!("\n✅ Credentials are valid and working!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Credential test failed: {}", e);
            eprintln!("\nRun 'workspace-agent auth' to authorize again.");
            process::exit(1);
        }
    }
}

fn print_tools(state: &AppState) {
    let registry = state.orchestrator.registry();
    println!("Dispatch table:");
    for (tool, domain, action) in registry.dispatch_table() {
        println!("  {:<28} -> {}.{}", tool, domain, action);
    }

    let definitions = registry.get_tool_definitions();
    println!("\nCatalog ({} definitions):", definitions.len());
    for def in definitions {
        println!("  {:<28} {}", def.name, def.description);
    }
}

async fn run_chat(config: &Config, message: &str) -> Result<(), Box<dyn Error>> {
    let state = build_state(config)?;
    let orchestrator = Arc::clone(&state.orchestrator);

    match orchestrator.orchestrate(message).await {
        Ok(exchange) => {
            let response = ChatResponse::from(exchange);
            println!("{}", response.message);
            if let Some(details) = response.tool_details {
                println!("\n{}", serde_json::to_string_pretty(&details)?);
            }
            Ok(())
        }
        Err(AgentError::AuthRequired(e)) => {
            eprintln!("{}\nRun 'workspace-agent auth' first.", e);
            process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
