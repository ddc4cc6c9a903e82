use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use rusty_ready_cli::{
    capabilities::Capabilities,
    logging::{self, ChannelLogger},
    startup::{self, StartupConfig},
};

/// Replays a client boot against the readiness broker.
#[derive(Parser, Debug)]
#[command(name = "rusty-ready", version, about)]
struct Args {
    /// Seed for the module load order.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Modules to load (comma separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    modules: Vec<String>,

    /// Capabilities the server reports (comma separated).
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "webmail,calendar,contacts,infostore,tasks"
    )]
    capabilities: Vec<String>,

    /// Language delivered in the settings payload.
    #[arg(long, default_value = "en_US")]
    language: String,

    /// Never publish settings, leaving every module waiting on it.
    #[arg(long)]
    skip_settings: bool,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

impl From<Args> for StartupConfig {
    fn from(args: Args) -> Self {
        Self {
            seed: args.seed,
            modules: args.modules,
            capabilities: Capabilities::new(args.capabilities),
            language: args.language,
            publish_settings: !args.skip_settings,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let logs = ChannelLogger::install(args.log_level)?;

    let outcome = startup::run(&args.into());

    for message in logs.try_iter() {
        println!("{}", logging::render(&message));
    }
    println!("{}", outcome?);
    Ok(())
}
