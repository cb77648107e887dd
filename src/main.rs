use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pricefetch::batch::GroupOutcome;
use pricefetch::config::ConfigLoader;
use pricefetch::item::{Variant, WorkItem};
use pricefetch::metrics::{MetricsCollector, MetricsSnapshot};
use pricefetch::queue::CancelHandle;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

#[derive(Parser)]
#[command(name = "pricefetch")]
#[command(version = "0.1.0")]
#[command(about = "Rate-limited, cached marketplace price lookups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price every item of an items file, group by group
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the items file (JSON/YAML/TOML)
        #[arg(short, long)]
        items: PathBuf,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Price a single product link
    Fetch {
        #[arg(short, long)]
        config: PathBuf,

        /// Product page link
        #[arg(short, long)]
        url: String,

        #[arg(long)]
        foil: bool,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Seller's asking price, e.g. "1,20 €"
        #[arg(long)]
        seller_price: Option<String>,
    },
    /// Remove expired and stale cache entries
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info"); }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();
    let multi = Arc::new(indicatif::MultiProgress::new());

    let show_progress = matches!(cli.command, Commands::Run { no_progress: false, .. });
    if show_progress {
        indicatif_log_bridge::LogWrapper::new((*multi).clone(), logger).try_init()?;
    } else {
        let level = logger.filter();
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
    }

    match cli.command {
        Commands::Run { config, items, .. } => {
            log::info!("Loading config from {:?}", config);
            let config_data = ConfigLoader::load(&config)?;
            let items_file = ConfigLoader::load_items(&items)?;
            let groups = items_file.to_groups(&config_data.http.extra_query);
            log::info!("Loaded {} groups", groups.len());

            let metrics = Arc::new(MetricsCollector::new());
            let orchestrator = ConfigLoader::create_orchestrator(&config_data, Some(metrics.clone())).await?;
            orchestrator.queue().cache().sweep_expired().await;

            let mut renderer = ConfigLoader::create_renderer(
                &config_data,
                show_progress.then(|| multi.clone()),
            )?;

            let cancel = CancelHandle::new();
            let cancel_on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel_on_signal.cancel();
                }
            });

            let mut progress_bar: Option<ProgressBar> = None;
            let mut _progress_task = None;
            if show_progress {
                let pb = multi.add(ProgressBar::new(0));
                pb.set_style(ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                    .progress_chars("#>-"));

                let updates = WatchStream::new(orchestrator.queue().watch_metrics());
                let pb_clone = pb.clone();
                progress_bar = Some(pb);
                _progress_task = Some(tokio::spawn(updates.for_each(move |snapshot: MetricsSnapshot| {
                    pb_clone.set_length(snapshot.items_queued);
                    pb_clone.set_position(snapshot.items_finished());
                    pb_clone.set_message(format!(
                        "Cached: {} | 429s: {} | Delay: {}ms",
                        snapshot.cache_hits, snapshot.rate_limited, snapshot.current_delay_ms
                    ));
                    futures::future::ready(())
                })));
            }

            let cart_total = items_file.cart_total();
            let outcome = orchestrator
                .run_groups(groups, cart_total, renderer.as_mut(), cancel)
                .await;
            renderer.finish()?;

            if let Some(task) = _progress_task {
                task.abort();
            }
            if let Some(pb) = progress_bar {
                pb.finish_and_clear();
            }

            let final_metrics = orchestrator.queue().get_metrics();
            match outcome {
                GroupOutcome::Completed { groups, total } => {
                    println!("\n✅ Pricing Completed:");
                    for summary in &groups {
                        print_summary("  ", summary.name.as_str(), summary);
                    }
                    print_summary("", "Total", &total);
                }
                GroupOutcome::Cancelled => {
                    println!("\n⛔ Cancelled, no totals computed.");
                }
            }
            println!("   Items Resolved: {}", final_metrics.items_resolved);
            println!("   Cache Hits: {}", final_metrics.cache_hits);
            println!("   Requests: {} ({} rate limited)", final_metrics.requests_total, final_metrics.rate_limited);
            println!("   Average Duration: {}ms", final_metrics.avg_response_time_ms);
            println!("   Total Time: {:.1}s", final_metrics.elapsed_seconds);
        }
        Commands::Fetch { config, url, foil, quantity, seller_price } => {
            let config_data = ConfigLoader::load(&config)?;
            let orchestrator = ConfigLoader::create_orchestrator(&config_data, None).await?;
            let mut renderer = ConfigLoader::create_renderer(&config_data, None)?;

            let variant = if foil { Variant::Foil } else { Variant::Regular };
            let mut item = WorkItem::from_link(url.as_str(), Some(url.as_str()), variant, &config_data.http.extra_query)
                .with_quantity(quantity);
            item.seller_price_text = seller_price;

            let result = orchestrator.fetch_one(&item, renderer.as_mut()).await;
            renderer.finish()?;
            if let Err(e) = result {
                log::error!("Error fetching product page: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Sweep { config } => {
            let config_data = ConfigLoader::load(&config)?;
            let cache = ConfigLoader::open_cache(&config_data).await?;
            let removed = cache.sweep_expired().await;
            println!("✅ Removed {} cache entries", removed);
        }
        Commands::Check { config } => {
            match ConfigLoader::load(&config) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Base delay: {}ms (+{}ms per 429)", cfg.queue.base_delay_ms, cfg.queue.delay_increment_ms);
                    println!("   Cache: {:?} v{} ({}ms)", cfg.cache.backend, cfg.cache.version, cfg.cache.expiration_ms);
                    println!("   Output: {:?}", cfg.output);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn print_summary(indent: &str, name: &str, summary: &pricefetch::GroupSummary) {
    println!(
        "{}   {}: 30-day {:.2} € | Trend {:.2} €",
        indent, name, summary.estimated_average, summary.estimated_trend
    );
    if let (Some(average), Some(trend)) = (summary.profit_average(), summary.profit_trend()) {
        println!("{}     Profit: 30-day {:.2} € | Trend {:.2} €", indent, average, trend);
    }
}
