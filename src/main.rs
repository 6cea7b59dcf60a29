use clap::{ArgAction, Parser, Subcommand};
use dialoguer::Confirm;
use humansize::{DECIMAL, format_size};
use log::LevelFilter;
use series_archiver::{
    ArchiverError, ConfigError, DEFAULT_CONFIG_DIR, DEFAULT_DOWNLOAD_DIR, DOWNLOAD_REPORT_FILE,
    DownloadOptions, DownloaderSettings, EpisodeOutcome, EpisodeStatus, ExtractionMethod,
    ProgressEvent, SeriesPaths, SkipReason, ToolCommand, VALIDATION_REPORT_FILE,
    ValidationReport, available_configs, count_existing_videos, ensure_tool_available,
    execute_renames, extract_series_subtitles, fetch_metadata, find_srt_files, install_tool,
    load_catalog, open_series, plan_standardization, provisioned_tool_path, run_downloads,
    user_config_dir, validate_series, verify_srt_file,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Default output directory for extracted subtitles
const DEFAULT_SUBTITLE_DIR: &str = "Subtitles_SRT";

/// Archive video series from playlists into a season/episode library
#[derive(Parser, Debug)]
#[command(name = "series-archiver", version, about, long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Additional directory to search for series configs (repeatable)
    #[arg(long = "config-dir", value_name = "DIR", global = true)]
    config_dirs: Vec<PathBuf>,

    /// Directory holding the catalog and download archive files
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download all missing episodes of a series
    Download {
        series_name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
        download_dir: PathBuf,

        /// Show what would be downloaded without downloading
        #[arg(long)]
        dry_run: bool,

        /// Download yt-dlp into the cache directory if it is missing
        #[arg(long)]
        install_tool: bool,
    },

    /// List the season playlists and write the episode catalog
    Fetch {
        series_name: String,

        /// Ignore cached playlist listings
        #[arg(long)]
        refresh: bool,

        /// Download yt-dlp into the cache directory if it is missing
        #[arg(long)]
        install_tool: bool,
    },

    /// Check downloaded files against the catalog
    Validate {
        series_name: String,

        #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
        download_dir: PathBuf,
    },

    /// Rename episode files to the configured naming pattern
    Standardize {
        series_name: String,

        #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
        download_dir: PathBuf,

        /// Perform the renames (default is preview only)
        #[arg(long)]
        execute: bool,
    },

    /// Extract and check subtitles
    Subtitles {
        #[command(subcommand)]
        action: SubtitleAction,
    },

    /// List the available series configs
    Configs,

    /// Inspect or install the download tool
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
}

#[derive(Subcommand, Debug)]
enum SubtitleAction {
    /// Extract embedded subtitles of downloaded episodes as SRT files
    Extract {
        series_name: String,

        /// Only process this season number
        #[arg(long)]
        season: Option<u32>,

        #[arg(long, default_value = DEFAULT_SUBTITLE_DIR)]
        output: PathBuf,

        #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
        download_dir: PathBuf,
    },

    /// Check the SRT files in a directory
    Verify {
        #[arg(default_value = DEFAULT_SUBTITLE_DIR)]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ToolAction {
    /// Show which yt-dlp would be used
    Status,
    /// Download the standalone yt-dlp release into the cache directory
    Install,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG, when set, overrides the -v level
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Config directories in search order
fn config_search_path(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = extra.to_vec();
    dirs.push(PathBuf::from(DEFAULT_CONFIG_DIR));
    dirs.extend(user_config_dir());
    dirs
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::FetchingPlaylist {
            season_name,
            playlist_id,
        } => {
            println!("Fetching {} ({})...", season_name, playlist_id);
        }
        ProgressEvent::PlaylistFailed { season_name, error } => {
            println!("  ✗ {} failed: {}", season_name, error);
        }
        ProgressEvent::PlaylistFetched {
            season_name,
            episode_count,
        } => {
            println!("  ✓ {}: {} episode(s)", season_name, episode_count);
        }
        ProgressEvent::CatalogSaved {
            path,
            season_count,
            episode_count,
        } => {
            println!(
                "\nSaved {} episode(s) in {} season(s) to {}",
                episode_count,
                season_count,
                path.display()
            );
        }
        ProgressEvent::SeasonStarted {
            season_name,
            episode_count,
        } => {
            println!("\n📁 {} ({} episode(s))", season_name, episode_count);
        }
        ProgressEvent::EpisodeUnparseable { title } => {
            println!("  ⚠️  Could not parse episode info from: {}", title);
        }
        ProgressEvent::EpisodeSkipped { label, reason } => match reason {
            SkipReason::AlreadyExists { path } => {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                println!("  ⏭️  {} already exists: {}", label, name);
            }
            SkipReason::Archived => {
                println!("  ⏭️  {} already in download archive", label);
            }
        },
        ProgressEvent::EpisodePlanned { label, path } => {
            println!("  📋 {} would be saved to {}", label, path.display());
        }
        ProgressEvent::EpisodeDownloading {
            index,
            total,
            label,
            title,
        } => {
            println!("  [{}/{}] ⬇️  {} {}", index + 1, total, label, title);
        }
        ProgressEvent::EpisodeDownloaded { label, path } => {
            println!("  ✅ {} saved to {}", label, path.display());
        }
        ProgressEvent::EpisodeFailed { label, error } => {
            println!("  ❌ {} failed: {}", label, error);
        }
        ProgressEvent::ExtractingSubtitles {
            index,
            total,
            video_path,
        } => {
            let name = video_path.file_name().unwrap_or_default().to_string_lossy();
            println!("[{}/{}] {}", index + 1, total, name);
        }
        ProgressEvent::SubtitlesExtracted { subtitle, .. } => {
            let how = match subtitle.method {
                ExtractionMethod::Direct => "extracted",
                ExtractionMethod::Converted => "converted from WebVTT",
            };
            println!("  ✓ {} ({})", subtitle.path.display(), how);
        }
        ProgressEvent::SubtitleExtractionFailed { error, .. } => {
            println!("  ✗ {}", error);
        }
    }
}

fn print_rule() {
    println!("{}", "=".repeat(60));
}

fn confirm(prompt: &str) -> Result<bool, ArchiverError> {
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| ArchiverError::Io(io::Error::other(e)))
}

fn run_download(
    cli: &Cli,
    series_name: &str,
    yes: bool,
    download_dir: &Path,
    dry_run: bool,
    install: bool,
) -> Result<i32, ArchiverError> {
    let config = open_series(series_name, &config_search_path(&cli.config_dirs))?;
    let paths = SeriesPaths::new(&cli.state_dir, &config);
    let catalog = load_catalog(&config, &paths)?;

    let tool = if dry_run {
        ToolCommand::from_settings(&config.downloader)
    } else {
        ensure_tool_available(&config.downloader, install)?.command
    };

    print_rule();
    println!("{}", config.series_name);
    print_rule();
    println!("Seasons:        {}", catalog.season_count());
    println!("Episodes:       {}", catalog.episode_count());
    println!("Quality:        {}", config.format_selector());
    println!("Download dir:   {}", download_dir.display());
    println!("Archive:        {}", paths.archive.display());
    println!("Already present: {}", count_existing_videos(download_dir)?);
    if dry_run {
        println!("\nDry run: nothing will be downloaded.");
    }
    println!();

    if !yes && !dry_run && !confirm("Start downloading missing episodes?")? {
        println!("Cancelled.");
        return Ok(0);
    }

    let summary = run_downloads(
        &config,
        &catalog,
        &paths,
        download_dir,
        &tool,
        DownloadOptions { dry_run },
        handle_progress_event,
    )?;

    println!();
    print_rule();
    println!("Download Summary");
    print_rule();
    if dry_run {
        println!("  To download: {}", summary.planned);
    } else {
        println!("  New downloads: {}", summary.downloaded);
    }
    println!("  Skipped:       {}", summary.skipped);
    println!("  Failed:        {}", summary.failed);
    println!("  Total:         {}", summary.total());

    if summary.has_failures() {
        println!("\nFailed episodes:");
        for failure in summary.failures() {
            let reason = match &failure.outcome {
                EpisodeOutcome::Failed { error } => error.as_str(),
                _ => "no season/episode numbers",
            };
            println!("  - {} ({}): {}", failure.title, failure.id, reason);
        }
    }

    if !dry_run {
        println!(
            "\n📄 Report saved to: {}",
            download_dir.join(DOWNLOAD_REPORT_FILE).display()
        );
    }

    Ok(if summary.has_failures() { 1 } else { 0 })
}

fn run_fetch(
    cli: &Cli,
    series_name: &str,
    refresh: bool,
    install: bool,
) -> Result<i32, ArchiverError> {
    let config = open_series(series_name, &config_search_path(&cli.config_dirs))?;
    let paths = SeriesPaths::new(&cli.state_dir, &config);

    if config.seasons.is_empty() {
        println!(
            "{} lists no season playlists; episodes come from the config itself.",
            config.series_name
        );
        return Ok(0);
    }

    let tool = ensure_tool_available(&config.downloader, install)?;
    println!("Using {} ({})\n", tool.command.display(), tool.version);

    fetch_metadata(&config, &paths, &tool.command, refresh, handle_progress_event)?;
    Ok(0)
}

fn print_validation_report(report: &ValidationReport) {
    println!();
    print_rule();
    println!("{} DOWNLOAD VALIDATION REPORT", report.series_name.to_uppercase());
    print_rule();

    println!("\n📊 Overall:");
    println!("   Expected:   {} episodes", report.expected());
    println!("   Found:      {} episodes", report.present());
    println!("   Incomplete: {} episodes", report.incomplete().len());
    println!("   Missing:    {} episodes", report.missing().len());
    println!("   Rate:       {:.1}%", report.completion_rate() * 100.0);
    println!("   Size:       {}", format_size(report.total_size(), DECIMAL));

    println!("\n📁 By Season:");
    for season in &report.seasons {
        let rate = if season.expected() > 0 {
            season.found() as f64 / season.expected() as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "   {}: {}/{} ({:.0}%)",
            season.season_label,
            season.found(),
            season.expected(),
            rate
        );
    }

    let incomplete = report.incomplete();
    if !incomplete.is_empty() {
        println!("\n⚠️  Incomplete Files ({}):", incomplete.len());
        for check in incomplete {
            if let EpisodeStatus::Incomplete { path, size } = &check.status {
                println!("   - {} ({})", path.display(), format_size(*size, DECIMAL));
            }
        }
    }

    let missing = report.missing();
    if !missing.is_empty() {
        println!("\n❌ Missing Episodes ({}):", missing.len());
        for check in missing {
            println!(
                "   - S{:02}E{:02} {} ({})",
                check.season, check.episode, check.title, check.id
            );
        }
    }

    if !report.unparseable.is_empty() {
        println!("\n❓ Catalog titles without episode numbers ({}):", report.unparseable.len());
        for title in &report.unparseable {
            println!("   - {}", title);
        }
    }

    if !report.unexpected.is_empty() {
        println!("\n🔍 Unexpected Files ({}):", report.unexpected.len());
        for path in &report.unexpected {
            println!("   - {}", path.display());
        }
    }

    println!();
    print_rule();
}

fn run_validate(cli: &Cli, series_name: &str, download_dir: &Path) -> Result<i32, ArchiverError> {
    let config = open_series(series_name, &config_search_path(&cli.config_dirs))?;
    let paths = SeriesPaths::new(&cli.state_dir, &config);
    let catalog = load_catalog(&config, &paths)?;

    let report = validate_series(&config, &catalog, download_dir)?;
    print_validation_report(&report);

    if download_dir.is_dir() {
        println!(
            "\n📄 Report saved to: {}",
            download_dir.join(VALIDATION_REPORT_FILE).display()
        );
    }

    Ok(0)
}

fn run_standardize(
    cli: &Cli,
    series_name: &str,
    download_dir: &Path,
    execute: bool,
) -> Result<i32, ArchiverError> {
    let config = open_series(series_name, &config_search_path(&cli.config_dirs))?;

    print_rule();
    println!("{} Filename Standardization", config.series_name);
    print_rule();

    let plan = plan_standardization(&config, download_dir)?;
    if plan.is_empty() {
        println!("\n✓ All files already have correct naming!");
        return Ok(0);
    }

    for rename in &plan {
        let from = rename.source.file_name().unwrap_or_default().to_string_lossy();
        let to = rename
            .destination
            .file_name()
            .unwrap_or_default()
            .to_string_lossy();
        let marker = if rename.conflict { "  ⚠️ conflict" } else { "" };
        println!("  {}\n    -> {}{}", from, to, marker);
    }

    println!("\nFiles to rename: {}", plan.len());

    if !execute {
        println!("\nPreview mode - no changes made.");
        println!("Run with --execute to perform actual renaming.");
        return Ok(0);
    }

    println!("\nExecuting renames...");
    let failures = execute_renames(&plan);
    for failure in &failures {
        println!("  ✗ {}: {}", failure.source.display(), failure.error);
    }

    println!("\nRename Summary");
    println!("  Success: {}", plan.len() - failures.len());
    println!("  Failed:  {}", failures.len());
    println!("  Total:   {}", plan.len());

    Ok(if failures.is_empty() { 0 } else { 1 })
}

fn run_subtitle_extract(
    cli: &Cli,
    series_name: &str,
    season: Option<u32>,
    output: &Path,
    download_dir: &Path,
) -> Result<i32, ArchiverError> {
    let config = open_series(series_name, &config_search_path(&cli.config_dirs))?;

    print_rule();
    println!("{} Subtitle Extractor", config.series_name);
    print_rule();
    println!("Output directory: {}\n", output.display());

    let summary = extract_series_subtitles(download_dir, season, output, handle_progress_event)?;

    let total = summary.extracted + summary.failed;
    if total == 0 {
        println!("No episode files found.");
        return Ok(1);
    }

    println!("\nSuccess: {}/{}", summary.extracted, total);
    println!("Failed:  {}/{}", summary.failed, total);

    Ok(if summary.failed == 0 { 0 } else { 1 })
}

fn run_subtitle_verify(dir: &Path) -> Result<i32, ArchiverError> {
    if !dir.is_dir() {
        println!("✗ Subtitle directory not found: {}", dir.display());
        return Ok(1);
    }

    let files = find_srt_files(dir)?;
    if files.is_empty() {
        println!("✗ No SRT files found in {}", dir.display());
        return Ok(1);
    }

    println!("Found {} subtitle file(s)\n", files.len());

    let mut valid = 0;
    let mut total_entries = 0;
    let mut total_issues = 0;

    for file in &files {
        let name = file.file_name().unwrap_or_default().to_string_lossy();
        println!("Verifying: {}", name);

        let report = verify_srt_file(file)?;
        if report.is_valid() {
            valid += 1;
            println!("  ✓ Valid format");
            println!("    Entries: {}", report.entries);
            println!("    Start: {}", report.first_time.as_deref().unwrap_or("-"));
            println!("    End: {}", report.last_time.as_deref().unwrap_or("-"));
        } else if report.issues.is_empty() {
            println!("  ✗ No subtitle entries");
        } else {
            println!("  ✗ Issues found:");
            for issue in &report.issues {
                println!("    - {}", issue);
            }
        }

        total_entries += report.entries;
        total_issues += report.issues.len();
    }

    println!();
    print_rule();
    println!("Total files:   {}", files.len());
    println!("Valid files:   {}", valid);
    println!("Total entries: {}", total_entries);
    println!("Total issues:  {}", total_issues);

    Ok(0)
}

fn run_configs(cli: &Cli) -> i32 {
    let dirs = config_search_path(&cli.config_dirs);
    let names = available_configs(&dirs);

    if names.is_empty() {
        println!("No series configs found. Searched:");
        for dir in &dirs {
            println!("  {}", dir.display());
        }
        return 1;
    }

    println!("Available series:");
    for name in names {
        println!("  - {}", name);
    }
    0
}

fn run_tool(action: &ToolAction) -> Result<i32, ArchiverError> {
    match action {
        ToolAction::Status => {
            match ensure_tool_available(&DownloaderSettings::default(), false) {
                Ok(tool) => println!("✓ {} ({})", tool.command.display(), tool.version),
                Err(e) => {
                    println!("✗ {}", e);
                    return Ok(1);
                }
            }
            println!("Provisioned location: {}", provisioned_tool_path()?.display());
            Ok(0)
        }
        ToolAction::Install => {
            install_tool()?;
            Ok(0)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Download {
            series_name,
            yes,
            download_dir,
            dry_run,
            install_tool,
        } => run_download(
            &cli,
            series_name,
            *yes,
            download_dir,
            *dry_run,
            *install_tool,
        ),
        Command::Fetch {
            series_name,
            refresh,
            install_tool,
        } => run_fetch(&cli, series_name, *refresh, *install_tool),
        Command::Validate {
            series_name,
            download_dir,
        } => run_validate(&cli, series_name, download_dir),
        Command::Standardize {
            series_name,
            download_dir,
            execute,
        } => run_standardize(&cli, series_name, download_dir, *execute),
        Command::Subtitles { action } => match action {
            SubtitleAction::Extract {
                series_name,
                season,
                output,
                download_dir,
            } => run_subtitle_extract(&cli, series_name, *season, output, download_dir),
            SubtitleAction::Verify { dir } => run_subtitle_verify(dir),
        },
        Command::Configs => Ok(run_configs(&cli)),
        Command::Tool { action } => run_tool(action),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);

            if let ArchiverError::Config(ConfigError::NotFound { .. }) = &e {
                let names = available_configs(&config_search_path(&cli.config_dirs));
                if !names.is_empty() {
                    eprintln!("\nAvailable series:");
                    for name in names {
                        eprintln!("  - {}", name);
                    }
                }
            }

            process::exit(1);
        }
    }
}
