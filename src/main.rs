use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use podplay::{
    ClientEvent, DetailScreen, DownloadRegistry, EpisodeLibrary, EpisodeMediaPanel, EventRelay,
    NoopNotifier, NowPlaying, PlaybackNotifier, PlaybackSession, ReqwestClient,
    SharedPlaybackNotifier, format_position, load_feed, parse_duration,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static PLAY: Emoji<'_, '_> = Emoji("▶️  ", "> ");
static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "|| ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static NOTES: Emoji<'_, '_> = Emoji("📝 ", "");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Browse, download and play podcast episodes from an RSS feed
#[derive(Parser, Debug)]
#[command(name = "podplay")]
#[command(about = "Browse, download and play podcast episodes from an RSS feed")]
#[command(version)]
struct Args {
    /// RSS feed URL or path to local RSS file
    feed: String,

    /// Directory for downloaded episodes (defaults to the platform cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Position tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_interval_ms: u64,

    /// Quiet mode - suppress the now-playing line and download bars
    #[arg(short, long)]
    quiet: bool,
}

/// Renders the now-playing notification as a sticky status line
struct ConsoleNotifier {
    status: ProgressBar,
}

impl ConsoleNotifier {
    fn new(multi: &MultiProgress) -> Self {
        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_bar()
                .template("{wide_msg}")
                .unwrap(),
        );
        Self { status }
    }
}

impl PlaybackNotifier for ConsoleNotifier {
    fn notify(&self, now: NowPlaying) {
        let icon = if now.playing { PLAY } else { PAUSE };
        let position = format_position(now.position_secs);
        let message = match now.duration_secs {
            Some(duration) => format!(
                "{icon}{} {} / {}",
                now.title.bold(),
                position.cyan(),
                format_position(duration)
            ),
            None => format!("{icon}{} {}", now.title.bold(), position.cyan()),
        };
        self.status.set_message(message);
    }

    fn clear(&self) {
        self.status.set_message(String::new());
    }
}

/// Per-episode download bars driven by relay events
struct DownloadBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    enabled: bool,
}

impl DownloadBars {
    fn new(multi: MultiProgress, enabled: bool) -> Self {
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            enabled,
        }
    }

    fn observe(&self, event: &ClientEvent, library: &EpisodeLibrary) {
        if !self.enabled {
            return;
        }

        match event {
            ClientEvent::DownloadProgress {
                episode_id,
                received,
                total,
            } => {
                let mut bars = self.bars.lock().unwrap();
                let bar = bars.entry(episode_id.to_string()).or_insert_with(|| {
                    let style = ProgressStyle::default_bar()
                        .template(&format!(
                            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
                        ))
                        .unwrap()
                        .progress_chars("█▓░");

                    let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
                    bar.set_style(style);
                    let title = library
                        .find_by_id(episode_id)
                        .map(|e| e.display_title().to_string())
                        .unwrap_or_else(|| episode_id.to_string());
                    bar.set_message(title);
                    bar
                });
                if let Some(total) = total {
                    bar.set_length(*total);
                }
                bar.set_position(*received);
            }
            ClientEvent::DownloadComplete { episode_id } => {
                if let Some(bar) = self.bars.lock().unwrap().remove(episode_id.as_str()) {
                    bar.finish_and_clear();
                }
            }
            ClientEvent::DownloadFailed { episode_id, .. } => {
                if let Some(bar) = self.bars.lock().unwrap().remove(episode_id.as_str()) {
                    bar.finish_and_clear();
                }
            }
            _ => {}
        }
    }
}

struct Client {
    library: EpisodeLibrary,
    session: PlaybackSession,
    registry: Arc<DownloadRegistry>,
    relay: EventRelay,
    notifier: SharedPlaybackNotifier,
    /// The open detail screen with its media panel, if any
    screen: Option<(DetailScreen, EpisodeMediaPanel)>,
}

impl Client {
    /// Handle one command line. Returns false when the client should exit.
    async fn handle_command(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.trim().split_whitespace();
        let command = parts.next().unwrap_or("");
        let arg = parts.next();

        match command {
            "" => {}
            "help" => print_help(),
            "list" => self.render_list(),
            "open" => match arg {
                Some(target) => self.open(target).await,
                None => println!("usage: open <number|id>"),
            },
            "play" => {
                if let Some((_, panel)) = self.screen.as_mut() {
                    if !panel.view().toggle_playing {
                        panel.toggle().await;
                    }
                    render_panel(panel);
                } else {
                    println!("no episode open");
                }
            }
            "pause" => {
                if let Some((_, panel)) = self.screen.as_mut() {
                    if panel.view().toggle_playing {
                        panel.toggle().await;
                    }
                    render_panel(panel);
                } else {
                    println!("no episode open");
                }
            }
            "seek" => match (self.screen.as_mut(), arg.and_then(parse_duration)) {
                (Some((_, panel)), Some(secs)) => match panel.seek_to(secs).await {
                    Ok(()) => render_panel(panel),
                    Err(e) => println!("{FAILURE}{}", e.to_string().red()),
                },
                (None, _) => println!("no episode open"),
                (_, None) => println!("usage: seek <m:ss|seconds>"),
            },
            "download" | "clear" => {
                if let Some((_, panel)) = self.screen.as_mut() {
                    match panel.press_download() {
                        Ok(()) => render_panel(panel),
                        Err(e) => println!("{FAILURE}{}", e.to_string().red()),
                    }
                } else {
                    println!("no episode open");
                }
            }
            "scroll" => match (self.screen.as_mut(), arg.and_then(|a| a.parse().ok())) {
                (Some((screen, _)), Some(y)) => {
                    screen.scroll(y);
                    let toolbar = screen.toolbar();
                    println!(
                        "toolbar alpha {} title {}",
                        toolbar.alpha.to_string().cyan(),
                        toolbar.title.bold()
                    );
                }
                (None, _) => println!("no episode open"),
                (_, None) => println!("usage: scroll <offset>"),
            },
            // Simulated remote controls (notification / headset buttons)
            "remote-pause" => self.relay.publish(ClientEvent::PauseRequested),
            "remote-resume" => self.relay.publish(ClientEvent::ResumeRequested),
            "back" => {
                // Dropping the panel is the unregistration
                self.screen = None;
                self.notifier.clear();
            }
            "quit" | "exit" => return Ok(false),
            other => println!("unknown command '{}', try 'help'", other),
        }

        Ok(true)
    }

    fn render_list(&self) {
        println!("\n{MICROPHONE}{}", self.library.title().bold().magenta());
        for (i, episode) in self.library.episodes().iter().enumerate() {
            let marker = if self.registry.is_downloaded(episode) {
                format!("{SUCCESS}")
            } else {
                "   ".to_string()
            };
            let duration = episode
                .duration_secs()
                .map(|secs| format_position(secs).dimmed().to_string())
                .unwrap_or_default();
            println!(
                "{:>3}. {}{} {}",
                (i + 1).to_string().cyan(),
                marker,
                episode.display_title(),
                duration
            );
        }
        println!();
    }

    async fn open(&mut self, target: &str) {
        let episode = target
            .parse::<usize>()
            .ok()
            .and_then(|n| self.library.by_position(n))
            .or_else(|| self.library.find_by_id(&target.into()))
            .cloned();

        let Some(episode) = episode else {
            println!("no episode '{}'", target);
            return;
        };

        let panel = EpisodeMediaPanel::bind(
            episode.clone(),
            self.session.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.notifier),
        )
        .await;

        let screen = DetailScreen::new(episode);
        self.render_detail(&screen, &panel);
        self.screen = Some((screen, panel));
    }

    fn render_detail(&self, screen: &DetailScreen, panel: &EpisodeMediaPanel) {
        println!("\n{}", screen.toolbar().title.bold().magenta());
        if let Some(notes) = screen.show_notes() {
            println!("{NOTES}{}", notes.dimmed());
        }
        render_panel(panel);
    }
}

fn render_panel(panel: &EpisodeMediaPanel) {
    let view = panel.view();
    let toggle = if view.toggle_playing { PLAY } else { PAUSE };
    let seek = if view.seek_enabled {
        format!(
            "{} / {}",
            format_position(view.seek_position_secs).cyan(),
            format_position(view.seek_max_secs)
        )
    } else {
        format_position(view.seek_max_secs).dimmed().to_string()
    };
    let button = if view.download.enabled() {
        format!("[{}]", view.download.label())
    } else {
        format!("({})", view.download.label().dimmed())
    };

    println!("{toggle}{} {} {}", view.title.bold(), seek, button);
}

fn print_help() {
    println!(
        "commands: list, open <n|id>, play, pause, seek <pos>, download, clear,\n          scroll <y>, remote-pause, remote-resume, back, quit"
    );
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("podplay"))
        .unwrap_or_else(|| PathBuf::from(".podplay-cache"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cache_dir = args.cache_dir.clone().unwrap_or_else(default_cache_dir);

    println!(
        "\n{}{} {}\n",
        MICROPHONE,
        "podplay".bold().magenta(),
        "- Podcast Player".dimmed()
    );

    let http = Arc::new(ReqwestClient::new());

    let podcast = load_feed(http.as_ref(), &args.feed)
        .await
        .context("Failed to load feed")?;
    let library = EpisodeLibrary::from_podcast(podcast);

    let relay = EventRelay::new();
    let registry = Arc::new(
        DownloadRegistry::open(&cache_dir, http, relay.clone())
            .context("Failed to open download cache")?,
    );

    let session = PlaybackSession::new();
    let _ticker = session.spawn_ticker(Duration::from_millis(args.tick_interval_ms));

    let multi = MultiProgress::new();
    let notifier: SharedPlaybackNotifier = if args.quiet {
        NoopNotifier::shared()
    } else {
        Arc::new(ConsoleNotifier::new(&multi))
    };
    let bars = DownloadBars::new(multi, !args.quiet);

    println!("{FOLDER}Cache: {}", cache_dir.display().to_string().cyan());

    let mut client = Client {
        library,
        session: session.clone(),
        registry,
        relay: relay.clone(),
        notifier,
        screen: None,
    };

    client.render_list();
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticks = session.subscribe_position();
    let mut events = relay.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command")? else {
                    break;
                };
                if !client.handle_command(&line).await? {
                    break;
                }
            }
            tick = ticks.recv() => {
                // Only a live panel consumes ticks
                if let Ok(tick) = tick
                    && let Some((_, panel)) = client.screen.as_mut()
                {
                    panel.apply_tick(&tick);
                }
            }
            event = events.recv() => {
                if let Ok(event) = event {
                    bars.observe(&event, &client.library);
                    if let Some((_, panel)) = client.screen.as_mut() {
                        let toast = matches!(
                            &event,
                            ClientEvent::DownloadComplete { episode_id }
                                if *episode_id == panel.episode().id
                        );
                        panel.handle_event(&event).await;
                        if toast {
                            println!(
                                "{SUCCESS}{} downloaded",
                                panel.episode().display_title().green()
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
