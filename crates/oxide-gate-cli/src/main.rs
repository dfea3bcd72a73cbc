//! oxide-gate CLI
//!
//! Inspect a gate configuration and simulate decisions for a request.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_gate::{
    priority, Gate, GateConfig, GateError, LoggingPlugin, Method, Request, Response, User,
};

/// Route gating for web applications.
#[derive(Parser)]
#[command(name = "oxide-gate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gate configuration file (JSON).
    #[arg(short, long, env = "OXIDE_GATE_CONFIG", default_value = "gate.json")]
    config: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured routes in resolution order.
    Routes,

    /// Show which route a path resolves to.
    Resolve {
        /// Request path.
        path: String,
    },

    /// Compute the priority of a pattern.
    Priority {
        /// Route pattern.
        pattern: String,

        /// Treat the pattern as a prefix route.
        #[arg(long)]
        prefix: bool,
    },

    /// Run a request through the gate and print the decision.
    Check {
        /// Request path.
        path: String,

        /// Signed-in user as JSON, e.g. '{"id":"1","roles":["admin"]}'.
        #[arg(short, long)]
        user: Option<String>,

        /// HTTP method.
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Use the legacy matcher instead of the gate.
        #[arg(long)]
        legacy: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Priority { pattern, prefix } = &cli.command {
        println!("{}", priority(pattern, !prefix));
        return Ok(());
    }

    let config = GateConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!(
        path = %cli.config.display(),
        routes = config.routes.len(),
        "Loaded gate config"
    );

    match cli.command {
        Commands::Priority { .. } => {}

        Commands::Routes => {
            let gate = inspect_gate(&config);
            let table = gate.table();
            if table.is_empty() {
                println!("No routes configured.");
            }
            for route in table.routes() {
                println!(
                    "{:>5}  {:<6}  {}  ({} rules)",
                    route.priority(),
                    route.kind().as_str(),
                    route.pattern(),
                    route.rules().len()
                );
            }
        }

        Commands::Resolve { path } => match inspect_gate(&config).table().resolve(&path) {
            Some(route) => {
                println!("{} ({}, priority {})", route.pattern(), route.kind(), route.priority());
                for (name, value) in route.params(&path).iter() {
                    println!("  {name} = {value:?}");
                }
            }
            None => println!("No route matches {path}"),
        },

        Commands::Check {
            path,
            user,
            method,
            legacy,
        } => {
            let user = user
                .map(|json| serde_json::from_str::<User>(&json))
                .transpose()
                .context("parsing --user")?;
            let method = Method::parse(&method)
                .with_context(|| format!("unsupported method: {method}"))?;
            let request = Request::new(method, path);

            let fetcher = move |_req: Request| {
                let user = user.clone();
                async move { Ok::<_, GateError>(user) }
            };

            if legacy {
                match config.legacy_matcher(fetcher).handle(request).await {
                    Some(response) => print_response(&response),
                    None => println!("dropped (no response)"),
                }
            } else {
                let gate = config.apply(Gate::builder(fetcher)).plugin(LoggingPlugin).build();
                print_response(&gate.handle(request).await);
            }
        }
    }

    Ok(())
}

/// Builds a gate over the configured routes, for inspection only.
fn inspect_gate(config: &GateConfig) -> Gate<User> {
    let fetcher = |_req: Request| async { Ok::<Option<User>, GateError>(None) };
    config.apply(Gate::builder(fetcher)).build()
}

fn print_response(response: &Response) {
    if response.is_pass_through() {
        println!("pass");
    } else if let Some(location) = response.location() {
        println!("{} -> {location}", response.status);
    } else {
        println!(
            "{} {}",
            response.status,
            response.body_string().unwrap_or_default()
        );
    }
}
