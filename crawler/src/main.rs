use anyhow::{Context, Result};
use clap::Parser as _;
use log::{error, info, LevelFilter};
use sitecrawl_crawler::{
    fetch_robots, Capabilities, CrawlConfig, CrawlReport, Crawler, FetcherOptions, HtmlParser,
    HttpFetcher,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

/// Crawl a single web site and list the links found on every page
#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[clap(env = "CRAWLER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Log level
    #[clap(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Print the report as JSON
    #[clap(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let config = CrawlConfig::from_file(&args.config)?;
    let settings = config
        .validate()
        .with_context(|| format!("Invalid config in {}", args.config.display()))?;

    let fetcher = HttpFetcher::new(FetcherOptions {
        timeout: settings.request_timeout,
        user_agent: settings.user_agent.clone(),
        ..Default::default()
    })?;

    let mut capabilities =
        Capabilities::new(Arc::new(fetcher.clone()), Arc::new(HtmlParser::new()?));
    if settings.respect_robots {
        if let Some(robots) = fetch_robots(fetcher.client(), &settings.seed).await {
            capabilities = capabilities.with_robots(Arc::new(robots));
        }
    } else {
        info!("Ignoring robots.txt");
    }

    let start = Instant::now();
    let report = Crawler::new(settings, capabilities).run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    info!("Crawler finished in {:?}", start.elapsed());

    Ok(())
}

fn print_report(report: &CrawlReport) {
    for (i, (page, record)) in report.pages.iter().enumerate() {
        match &record.error {
            Some(error) => println!("{}. {} ({})", i + 1, page, error),
            None => println!("{}. {}", i + 1, page),
        }
        for link in &record.links {
            println!("    {}", link);
        }
    }
    println!("{}", report.stats);
}
