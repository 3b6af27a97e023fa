#[macro_use]
extern crate log;

mod data;
mod generate;
mod run;

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use yomu_engine::{config::Config, engine::Engine, fetch::Fetcher, manager::SourceManager};
use yomu_lib::adapter::CatalogKind;

#[derive(Parser)]
#[clap(version, about = "Browse yomu sources from the terminal")]
struct Opts {
    /// Path to config.yml, defaults to $YOMU_HOME/config.yml
    #[clap(short, long)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    subcmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered sources
    Sources,
    Popular {
        source: String,
        #[clap(short, long, default_value_t = 1)]
        page: i64,
    },
    Latest {
        source: String,
        #[clap(short, long, default_value_t = 1)]
        page: i64,
    },
    Search {
        source: String,
        query: Option<String>,
        #[clap(short, long, default_value_t = 1)]
        page: i64,
        /// Filters as a json array, see `filters`
        #[clap(short, long)]
        filters: Option<String>,
    },
    /// Print the filters a source accepts
    Filters { source: String },
    Detail { source: String, url: String },
    Chapters { source: String, url: String },
    /// Print resolved page image urls of a chapter
    Pages { source: String, url: String },
    GenerateJson {
        #[clap(short, long, default_value = "repo")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("YOMU_LOG", "info")).init();

    let opts: Opts = Opts::parse();

    let config = Config::open(opts.config)?;
    let transport = Arc::new(Fetcher::new(&config)?);

    let mut manager = SourceManager::new();
    for adapter in yomu_sources::all(transport.clone()) {
        manager.insert(Engine::with_config(adapter, transport.clone(), &config));
    }

    match opts.subcmd {
        Command::Sources => run::print(&manager.list())?,
        Command::Popular { source, page } => {
            let engine = run::find_source(&manager, &source)?;
            run::catalog(&engine, CatalogKind::Popular, page, None, &[]).await?
        }
        Command::Latest { source, page } => {
            let engine = run::find_source(&manager, &source)?;
            run::catalog(&engine, CatalogKind::Latest, page, None, &[]).await?
        }
        Command::Search {
            source,
            query,
            page,
            filters,
        } => {
            let engine = run::find_source(&manager, &source)?;
            let filters = run::parse_filters(filters.as_deref())?;
            run::catalog(&engine, CatalogKind::Search, page, query.as_deref(), &filters).await?
        }
        Command::Filters { source } => run::print(&run::find_source(&manager, &source)?.filter_list())?,
        Command::Detail { source, url } => run::detail(&*run::find_source(&manager, &source)?, &url).await?,
        Command::Chapters { source, url } => {
            run::chapters(&*run::find_source(&manager, &source)?, &url).await?
        }
        Command::Pages { source, url } => run::pages(&*run::find_source(&manager, &source)?, &url).await?,
        Command::GenerateJson { out } => generate::generate_json(&manager, &out)?,
    }

    Ok(())
}
