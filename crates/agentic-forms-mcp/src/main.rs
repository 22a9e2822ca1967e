//! AgenticForms MCP server entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::task::LocalSet;

use agentic_forms::{FormExtractor, HtmlDocument, Trigger, Viewport};
use agentic_forms_mcp::config::load_config;
use agentic_forms_mcp::protocol::ProtocolHandler;
use agentic_forms_mcp::resources::ResourceRegistry;
use agentic_forms_mcp::tools::ToolRegistry;
use agentic_forms_mcp::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "agentic-forms-mcp",
    about = "MCP server for AgenticForms: form schema extraction for LLM agents",
    version
)]
struct Cli {
    /// Path to a JSON extraction config.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve {
        /// Path to a JSON extraction config.
        #[arg(short, long)]
        config: Option<String>,

        /// Log level (trace, debug, info, warn, error).
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Extract the form schema of an HTML file and print it as JSON.
    Extract {
        /// HTML file to read.
        file: String,

        /// URL reported in the schema.
        #[arg(long, default_value = "about:blank")]
        url: String,

        /// Viewport width in CSS pixels.
        #[arg(long, default_value_t = 1280.0)]
        width: f64,

        /// Viewport height in CSS pixels.
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   agentic-forms-mcp completions bash > ~/.local/share/bash-completion/completions/agentic-forms-mcp
    ///   agentic-forms-mcp completions zsh > ~/.zfunc/_agentic-forms-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match &cli.command {
        Some(Commands::Serve {
            log_level: Some(level),
            ..
        }) => level.clone(),
        _ => cli.log_level.clone(),
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve {
        config: None,
        log_level: None,
    }) {
        Commands::Serve {
            config,
            log_level: _,
        } => {
            let effective_config = config.or(cli.config);
            let config = load_config(effective_config.as_deref())?;

            LocalSet::new()
                .run_until(async move {
                    let (handler, notifications) = ProtocolHandler::start(config);
                    StdioTransport::new(handler)
                        .with_notifications(notifications)
                        .run()
                        .await
                })
                .await?;
        }

        Commands::Extract {
            file,
            url,
            width,
            height,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let html = std::fs::read_to_string(&file)?;
            let document = HtmlDocument::parse(&html, url, Viewport::new(width, height));
            let extractor = FormExtractor::from_config(&config);

            let schema = LocalSet::new()
                .run_until(async move { extractor.extract(&document, Trigger::Manual).await })
                .await?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }

        Commands::Info => {
            let config = load_config(cli.config.as_deref())?;
            let capabilities =
                agentic_forms_mcp::types::InitializeResult::for_scheduler(&config.scheduler);
            let tools = ToolRegistry::list_tools();
            let resources = ResourceRegistry::list_resources();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
                "scheduler": config.scheduler,
                "resources": resources.iter().map(|r| &r.uri).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "agentic-forms-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
