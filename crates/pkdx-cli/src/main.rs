//! 🚀 pkdx-cli: the front door of the dex.
//!
//! 🎬 *[narrator voice]* "It all started with a CSV file and a question: how many even ones?"
//! 📦 Thin wrapper. Parses args, sets up logging, loads config, then lets the library
//! do the heavy lifting. Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use pkdx::common::{Category, FilterRequest, HEADER, Pokemon, PokemonDraft};
use pkdx::supervisors::{FilterReport, WorkerReport};
use pkdx::{AppConfig, Dex};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 📚 A pokedex on a CSV, filtered in parallel.
#[derive(Parser)]
#[command(name = "pkdx")]
#[command(about = "Query, extend and filter a CSV pokedex.")]
struct Cli {
    /// Config file (TOML). Default: `pkdx.toml` if it exists, else env vars only (PKDX_*).
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the parallel filter: N records of one parity, M per worker.
    Filter(FilterArgs),
    /// Every pokemon in the store, in store order.
    List,
    /// One pokemon by id.
    Get { id: u64 },
    /// Append a pokemon with an id of your choosing.
    Add {
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        pokemon: PokemonArgs,
    },
    /// Append a pokemon and let the dex pick the next id.
    Catch {
        #[command(flatten)]
        pokemon: PokemonArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// even | odd
    #[arg(long = "type", value_parser = parse_category)]
    category: Category,
    /// How many records to return in total.
    #[arg(long)]
    items: usize,
    /// The most any single worker may return.
    #[arg(long)]
    items_per_worker: usize,
    /// Also print how each worker did.
    #[arg(long)]
    report: bool,
}

#[derive(Args)]
struct PokemonArgs {
    #[arg(long)]
    number: u64,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    image_url: String,
    /// Repeat or comma-separate: --ability overgrow --ability chlorophyll
    #[arg(long = "ability", value_delimiter = ',')]
    abilities: Vec<String>,
}

impl From<PokemonArgs> for PokemonDraft {
    fn from(args: PokemonArgs) -> Self {
        PokemonDraft {
            number: args.number,
            name: args.name,
            image_url: args.image_url,
            abilities: args.abilities,
        }
    }
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse().map_err(|err: pkdx::DexError| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let app_config = load_app_config(cli.config.as_deref())?;

    match cli.command {
        Command::Filter(args) => {
            let request = FilterRequest::new(args.category, args.items, args.items_per_worker)
                .context("💀 the filter request doesn't add up")?;
            let report = pkdx::run(app_config, request).await?;
            print_report(&report, cli.json, args.report)
        }
        Command::List => {
            let dex = Dex::open(app_config).await?;
            let pokemons = dex.all().await.context("💀 nothing to list")?;
            print_pokemons(&pokemons, cli.json)
        }
        Command::Get { id } => {
            let dex = Dex::open(app_config).await?;
            let pokemon = dex.get(id).await.with_context(|| format!("💀 no luck finding {id}"))?;
            print_pokemons(std::slice::from_ref(&pokemon), cli.json)
        }
        Command::Add { id, pokemon } => {
            let dex = Dex::open(app_config).await?;
            let pokemon = dex
                .create(PokemonDraft::from(pokemon).with_id(id))
                .await
                .context("💀 could not add the pokemon")?;
            print_pokemons(std::slice::from_ref(&pokemon), cli.json)
        }
        Command::Catch { pokemon } => {
            let dex = Dex::open(app_config).await?;
            let pokemon = dex
                .catch(pokemon.into())
                .await
                .context("💀 it got away")?;
            print_pokemons(std::slice::from_ref(&pokemon), cli.json)
        }
    }
}

/// 🔧 `--config` wins. Without it, `pkdx.toml` in the cwd is used if it's there.
fn load_app_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config_file = match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 couldn't check whether '{}' exists", path.display())
            })?;
            anyhow::ensure!(
                exists,
                "💀 Configuration file '{}' doesn't exist. Relative paths resolve against the cwd, \
                 so an absolute path is the safe bet.",
                path.display()
            );
            Some(path)
        }
        None => Some(Path::new("pkdx.toml")).filter(|default| default.is_file()),
    };

    pkdx::load_config(config_file).context("💀 In pkdx-cli, we couldn't load the config. Take a look at it.")
}

fn print_pokemons(pokemons: &[Pokemon], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(pokemons).context("💀 JSON said no")?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(HEADER);
    for pokemon in pokemons {
        table.add_row(vec![
            Cell::new(pokemon.id).set_alignment(CellAlignment::Right),
            Cell::new(pokemon.number).set_alignment(CellAlignment::Right),
            Cell::new(&pokemon.name),
            Cell::new(&pokemon.image_url),
            Cell::new(pokemon.abilities.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn print_report(report: &FilterReport, json: bool, with_workers: bool) -> Result<()> {
    if json {
        let out = if with_workers {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string_pretty(&report.pokemons)
        };
        println!("{}", out.context("💀 JSON said no")?);
        return Ok(());
    }

    print_pokemons(&report.pokemons, false)?;
    if with_workers {
        println!("{}", worker_table(&report.workers));
        println!("📤 {} rows forwarded by the source", report.rows_forwarded);
    }
    Ok(())
}

fn worker_table(workers: &[WorkerReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["worker", "quota", "processed", "accepted", "state"]);
    for worker in workers {
        table.add_row(vec![
            Cell::new(worker.id).set_alignment(CellAlignment::Right),
            Cell::new(worker.quota).set_alignment(CellAlignment::Right),
            Cell::new(worker.processed).set_alignment(CellAlignment::Right),
            Cell::new(worker.accepted).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:?}", worker.state)),
        ]);
    }
    table
}
