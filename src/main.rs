use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yt_search_scraper::api::ApiServer;
use yt_search_scraper::{search_with_launcher, ChromeLauncher, Config, SearchRequest, SnapshotLauncher};

fn cli() -> Command {
    Command::new("YouTube Search Scraper (Rust)")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Search YouTube through a headless browser and collect watch links")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API")
                .arg(Arg::new("host").long("host").value_name("HOST").help("Listen address"))
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("Listen port"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Run a single search and print the results")
                .arg(
                    Arg::new("terms")
                        .value_name("TERM")
                        .help("Search terms, processed in order")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("filter-term")
                        .long("filter-term")
                        .value_name("TERM")
                        .help("Term titles must contain (defaults to the first search term)"),
                )
                .arg(
                    Arg::new("no-title-filter")
                        .long("no-title-filter")
                        .help("Keep results whose title does not mention the filter term")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("max")
                        .short('m')
                        .long("max")
                        .value_name("NUM")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum results across all terms"),
                )
                .arg(
                    Arg::new("per-term")
                        .long("per-term")
                        .value_name("NUM")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum results per term"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print full records as JSON instead of links")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("replay")
                        .long("replay")
                        .value_name("DIR")
                        .help("Replay saved result pages (*.html) instead of launching Chrome"),
                ),
        )
}

fn load_config(path: Option<&String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            // Logging is not up yet
            eprintln!("Using default configuration: {}", e);
            Config::default()
        }),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let mut logging = config.logging.clone();
    logging.debug |= verbose;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = load_config(matches.get_one::<String>("config"))?;
    init_logging(&config, matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("serve", args)) => serve(config, args).await,
        Some(("search", args)) => search(config, args).await,
        _ => unreachable!("subcommand_required is set"),
    }
}

async fn serve(mut config: Config, args: &ArgMatches) -> Result<()> {
    if let Some(host) = args.get_one::<String>("host") {
        config.server.host = host.clone();
    }
    if let Some(port) = args.get_one::<u16>("port") {
        config.server.port = *port;
    }

    config.validate()?;
    info!("{}", config.summary());

    let launcher = ChromeLauncher::new(config.browser.clone());
    ApiServer::new(launcher, Arc::new(config)).start().await
}

async fn search(mut config: Config, args: &ArgMatches) -> Result<()> {
    let terms: Vec<String> = args
        .get_many::<String>("terms")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let Some(first) = terms.first().cloned() else {
        return Err(anyhow::anyhow!("at least one search term is required"));
    };

    if let Some(max) = args.get_one::<usize>("max") {
        config.scraper.max_results = *max;
    }
    if let Some(per_term) = args.get_one::<usize>("per-term") {
        config.scraper.max_results_per_term = *per_term;
    }

    let replay = args.get_one::<String>("replay").map(PathBuf::from);
    if replay.is_some() {
        config.scraper.scroll_pause_secs = 0.0;
        config.scraper.term_delay_secs = 0.0;
    }
    config.validate()?;

    let filter_term = args.get_one::<String>("filter-term").cloned().unwrap_or_else(|| first.clone());
    let request = SearchRequest::new(&first, &config)
        .with_terms(terms)
        .with_filter_term(&filter_term)
        .with_title_filter(!args.get_flag("no-title-filter"));

    let start_time = std::time::Instant::now();
    let records = tokio::task::spawn_blocking(move || match replay {
        Some(dir) => {
            let launcher = SnapshotLauncher::from_dir(&dir)?;
            Ok::<_, anyhow::Error>(search_with_launcher(&launcher, &config, &request)?)
        }
        None => {
            let launcher = ChromeLauncher::new(config.browser.clone());
            Ok(search_with_launcher(&launcher, &config, &request)?)
        }
    })
    .await??;

    info!(
        "🎉 Search completed in {:.2}s with {} results",
        start_time.elapsed().as_secs_f64(),
        records.len()
    );
    if records.is_empty() {
        warn!("No videos matched '{}'", filter_term);
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{}", record.url);
        }
    }

    Ok(())
}
