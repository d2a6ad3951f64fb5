//! chainquote CLI: token quotes, balances, chain registry, cache maintenance.

use chainquote::config::init_from_template;
use chainquote::{Config, TokenClient, DEFAULT_BALANCE_CHAINS};
use chainquote_report::{
    render_balances, render_cache_stats, render_chains, render_json, render_key_check,
    render_status, render_token_info, render_tokens,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    if let Command::Config { action } = &cli.command {
        return run_config(&cli.global, action);
    }
    let mut config = Config::load(&cli.global.config)?;
    if cli.global.no_cache {
        config.cache.enabled = false;
    }
    let rt = tokio::runtime::Runtime::new()?;
    let client = rt.block_on(TokenClient::new(config))?;
    let json = cli.global.json;
    match cli.command {
        Command::Info(args) => rt.block_on(run_info(&client, args, json)),
        Command::Balance(args) => rt.block_on(run_balance(&client, args, json)),
        Command::Chains => {
            let chains = client.list_supported_chains();
            emit(json, &chains, || render_chains(&chains))
        }
        Command::Tokens => {
            let tokens = client.list_supported_tokens();
            emit(json, &tokens, || render_tokens(&tokens))
        }
        Command::Status => {
            let status = client.api_status();
            emit(json, &status, || render_status(&status))
        }
        Command::Cache { action } => run_cache(&client, action, json),
        Command::Config { .. } => Ok(()),
    }
}

#[derive(Parser)]
#[command(name = "chainquote")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Cached, rate-limited token price, supply and hashrate lookups for EVM chains")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// YAML or JSON config; `.yaml`, `.yml` and `.json` siblings are tried too.
    #[arg(long, global = true, default_value = "Config/config.yaml")]
    config: PathBuf,
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// Skip the on-disk cache for this run.
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Price, supply and hashrate for one or more tokens.
    Info(InfoArgs),
    /// Native balance of an address across chains.
    Balance(BalanceArgs),
    /// Chains discovered from the chain registry.
    Chains,
    /// Tokens with a price source.
    Tokens,
    /// Client configuration and request counters.
    Status,
    /// Inspect or maintain the cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Create the config file or check its API keys.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct InfoArgs {
    #[arg(default_values_t = ["BTC".to_string(), "ETH".to_string(), "KAS".to_string(), "BNB".to_string()])]
    symbols: Vec<String>,
}

#[derive(Args)]
struct BalanceArgs {
    #[arg(long)]
    address: String,
    /// Comma-separated chain symbols.
    #[arg(long, value_delimiter = ',')]
    chains: Vec<String>,
}

#[derive(Subcommand, Clone, Copy)]
enum CacheAction {
    Stats,
    Clear,
    Clean,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Copy the template to the `--config` path.
    Init {
        #[arg(long, default_value = "Config/config.template.yaml")]
        template: PathBuf,
        /// Replace an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Report missing API keys (after environment overrides).
    Check,
}

fn emit<T: serde::Serialize + ?Sized>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", render_json(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

async fn run_info(
    client: &TokenClient,
    args: InfoArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !json {
        print!("{}", render_cache_stats(&client.cache_stats()));
    }
    let swept = client.clean_expired_cache();
    if swept > 0 {
        info!(swept, "removed expired cache entries");
    }

    let mut quotes = Vec::with_capacity(args.symbols.len());
    for symbol in &args.symbols {
        let start = Instant::now();
        let quote = client.get_token_info(symbol).await;
        if !json {
            print!("{}", render_token_info(&quote));
            println!("  took        {:.2}s", start.elapsed().as_secs_f64());
        }
        quotes.push(quote);
    }
    if json {
        println!("{}", render_json(&quotes)?);
    }
    Ok(())
}

async fn run_balance(
    client: &TokenClient,
    args: BalanceArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let balances = if args.chains.is_empty() {
        client
            .get_multichain_balance(&args.address, &DEFAULT_BALANCE_CHAINS)
            .await
    } else {
        client
            .get_multichain_balance(&args.address, &args.chains)
            .await
    };
    emit(json, &balances, || render_balances(&args.address, &balances))
}

fn run_config(global: &GlobalArgs, action: &ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Init { template, force } => {
            init_from_template(template, &global.config, *force)?;
            println!("created {}", global.config.display());
            println!("edit api_keys.etherscan, or export ETHERSCAN_API_KEY");
            Ok(())
        }
        ConfigAction::Check => {
            let config = Config::load(&global.config)?;
            let issues = config.api_keys.issues();
            emit(global.json, &issues, || render_key_check(&issues))
        }
    }
}

fn run_cache(
    client: &TokenClient,
    action: CacheAction,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let removed = match action {
        CacheAction::Stats => {
            let stats = client.cache_stats();
            return emit(json, &stats, || render_cache_stats(&stats));
        }
        CacheAction::Clear => client.clear_cache(),
        CacheAction::Clean => client.clean_expired_cache(),
    };
    emit(json, &serde_json::json!({ "removed": removed }), || {
        format!("removed {} cache entries\n", removed)
    })
}
