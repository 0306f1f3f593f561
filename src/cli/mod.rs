//! CLI mode for vidfetch: search, pick and download videos from a fetch
//! service.

mod progress;

use std::env;
use std::sync::Arc;

use crate::{
    AppConfig, BatchRunner, CancelHandle, Error, FetchService, HistoryStore, HttpService,
    JobController, OutputFormat, SelectionStore, VideoInfo, extract_video_urls, is_video_url,
};

use progress::{BarProgress, print_history, print_results, print_selection_prompt, print_summary};

enum Command {
    Search {
        query: String,
        pick: Vec<usize>,
        format: Option<OutputFormat>,
    },
    Trending,
    Download {
        urls: Vec<String>,
        format: Option<OutputFormat>,
    },
    History {
        clear: bool,
    },
}

fn print_usage() {
    eprintln!("Usage: vidfetch <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  search <query> [--pick 1,2] [--format F]   Search, optionally download picks");
    eprintln!("  trending                                   List trending videos");
    eprintln!("  download [--format F] <url>...             Download videos by URL");
    eprintln!("  history [--clear]                          Show or clear download history");
    eprintln!();
    eprintln!("Formats: mp4 (default), mp3, thumbnail");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  VIDFETCH_SERVER     Service base URL (overrides the config file)");
    eprintln!("  RUST_LOG            Log filter (default: warn)");
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!();
    print_usage();
    std::process::exit(2);
}

/// Parses "1,3" (1-based) into zero-based indices.
fn parse_picks(value: &str) -> Option<Vec<usize>> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().parse::<usize>().ok()?.checked_sub(1))
        .collect()
}

fn parse_args(args: &[String]) -> Command {
    let Some((command, rest)) = args.split_first() else {
        print_usage();
        std::process::exit(0);
    };

    let mut positional = Vec::new();
    let mut pick = Vec::new();
    let mut format = None;
    let mut clear = false;

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "-f" | "--format" => {
                i += 1;
                let Some(value) = rest.get(i) else {
                    usage_error("--format requires a value");
                };
                match value.parse::<OutputFormat>() {
                    Ok(f) => format = Some(f),
                    Err(e) => usage_error(&e.to_string()),
                }
            }
            "-p" | "--pick" => {
                i += 1;
                let Some(value) = rest.get(i) else {
                    usage_error("--pick requires a value");
                };
                match parse_picks(value) {
                    Some(indices) => pick.extend(indices),
                    None => usage_error("--pick expects result numbers such as 1,3"),
                }
            }
            "--clear" => clear = true,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => positional.push(arg.to_string()),
            other => usage_error(&format!("unknown option: {other}")),
        }
        i += 1;
    }

    match command.as_str() {
        "search" | "s" => {
            if positional.is_empty() {
                usage_error("search requires a query");
            }
            Command::Search {
                query: positional.join(" "),
                pick,
                format,
            }
        }
        "trending" | "t" => Command::Trending,
        "download" | "d" => {
            let urls = extract_video_urls(&positional.join(" "));
            if urls.is_empty() {
                usage_error("download requires at least one video URL");
            }
            Command::Download { urls, format }
        }
        "history" | "h" => Command::History { clear },
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => usage_error(&format!("unknown command: {other}")),
    }
}

/// Runs the CLI with the process arguments.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or a search fails.
/// Individual download failures are reported in the summary instead.
pub async fn run() -> crate::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_args(&args);

    let config = AppConfig::load(&AppConfig::default_path())?;
    log::debug!("Using service at {}", config.server.base_url);

    if let Command::History { clear } = command {
        return show_history(&config, clear);
    }

    let service = Arc::new(
        HttpService::new(&config.server.base_url)?
            .with_status_max_chars(config.download.status_max_chars),
    );

    match command {
        Command::Search {
            query,
            pick,
            format,
        } => run_search(&config, service, &query, &pick, format).await,
        Command::Trending => {
            let videos = service.trending().await.unwrap_or_else(|e| {
                log::warn!("Trending unavailable: {e}");
                Vec::new()
            });
            print_results(&videos);
            Ok(())
        }
        Command::Download { urls, format } => run_urls(&config, service, &urls, format).await,
        Command::History { .. } => Ok(()),
    }
}

fn show_history(config: &AppConfig, clear: bool) -> crate::Result<()> {
    let mut history = HistoryStore::load(&config.paths.history_file);
    if clear {
        history.clear()?;
        println!("History cleared.");
    } else {
        print_history(history.records());
    }
    Ok(())
}

fn select(selection: &mut SelectionStore, video: &VideoInfo) {
    if selection.contains(&video.url) {
        return;
    }
    if selection.toggle(video).show_prompt {
        print_selection_prompt();
    }
}

async fn run_search(
    config: &AppConfig,
    service: Arc<HttpService>,
    query: &str,
    pick: &[usize],
    format: Option<OutputFormat>,
) -> crate::Result<()> {
    let results = match service.search(query).await {
        Ok(results) => results,
        Err(Error::Search(reason)) => {
            log::debug!("Search for {query:?} returned nothing usable: {reason}");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    print_results(&results);

    let mut selection = SelectionStore::new();
    if is_video_url(query) && results.len() == 1 {
        selection.select_only(&results[0]);
    }
    for &index in pick {
        match results.get(index) {
            Some(video) => select(&mut selection, video),
            None => eprintln!("No result #{}", index + 1),
        }
    }

    if selection.is_empty() {
        return Ok(());
    }
    download_selection(config, service, &mut selection, format).await;
    Ok(())
}

async fn run_urls(
    config: &AppConfig,
    service: Arc<HttpService>,
    urls: &[String],
    format: Option<OutputFormat>,
) -> crate::Result<()> {
    let mut selection = SelectionStore::new();
    for url in urls {
        let video = match service.search(url).await {
            Ok(mut results) if results.len() == 1 => results.remove(0),
            Ok(_) => bare_video(url),
            Err(e) => {
                log::warn!("Lookup of {url} failed: {e}");
                bare_video(url)
            }
        };
        select(&mut selection, &video);
    }

    download_selection(config, service, &mut selection, format).await;
    Ok(())
}

fn bare_video(url: &str) -> VideoInfo {
    VideoInfo {
        id: None,
        title: None,
        url: url.to_string(),
        thumbnail: None,
        duration: None,
        uploader: None,
        view_count: None,
    }
}

/// Cancels the active job on every Ctrl-C until aborted.
fn spawn_interrupt_handler(handle: CancelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.cancel() {
                log::info!("Cancelling active download");
            } else {
                log::debug!("Interrupt with no active download");
            }
        }
    })
}

async fn download_selection(
    config: &AppConfig,
    service: Arc<HttpService>,
    selection: &mut SelectionStore,
    format: Option<OutputFormat>,
) {
    let format = format.unwrap_or(config.download.format);
    let mut history = HistoryStore::load(&config.paths.history_file);

    println!(
        "Downloading {} video(s) as {} into {}",
        selection.len(),
        format.label(),
        config.paths.download_dir.display()
    );

    let runner = BatchRunner::new(JobController::new(service, &config.paths.download_dir))
        .with_pause(config.download.inter_job_pause());
    let interrupts = spawn_interrupt_handler(runner.cancel_handle());

    let progress = BarProgress::new();
    let summary = runner
        .run_selection(selection, format, &mut history, &progress)
        .await;

    interrupts.abort();
    print_summary(&summary);
}
