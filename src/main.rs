//! `apod` command line entry point
use apod_client::{
    ApodRecord, AppConfig, DateChoice, DateChooser, DateKey, FetchCachePipeline, HttpClient,
    Presenter, Screen, ViewState,
};
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "apod")]
#[command(about = "Show NASA's Astronomy Picture of the Day")]
#[command(version)]
struct Args {
    /// Day to show (YYYY-MM-DD); defaults to APOD_DEFAULT_DATE or today
    #[arg(short, long)]
    date: Option<DateKey>,

    /// Keep asking for further dates on stdin
    #[arg(short, long)]
    interactive: bool,
}

/// Prints view states to stdout
struct TerminalPresenter;

impl TerminalPresenter {
    fn print_record(record: &ApodRecord) {
        if let Some(date) = record.date {
            println!("{}", date);
        }
        println!("{}", record.title.as_deref().unwrap_or("(untitled)"));
        if let Some(description) = &record.description {
            println!();
            println!("{}", description);
        }
        if let Some(url) = &record.url {
            println!();
            println!("{}: {}", record.media_type.as_deref().unwrap_or("media"), url);
        }
        if let Some(copyright) = &record.copyright {
            println!("(c) {}", copyright.trim());
        }
    }
}

impl Presenter for TerminalPresenter {
    fn on_state_changed(&mut self, state: &ViewState) {
        match state {
            ViewState::Loading { shown: None } => println!("loading.."),
            ViewState::Loading { shown: Some(record) } => {
                Self::print_record(record);
                println!("(refreshing..)");
            }
            ViewState::Error { message, shown } => {
                if let Some(record) = shown {
                    Self::print_record(record);
                }
                eprintln!("error: {}", message);
            }
            ViewState::Ready { data } => {
                println!();
                Self::print_record(data);
            }
        }
    }

    fn show_notice(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Reads a date from stdin; an empty line or `q` backs out
struct StdinDateChooser {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinDateChooser {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl DateChooser for StdinDateChooser {
    async fn choose_date(
        &self,
        current: Option<DateKey>,
        cancel: &CancellationToken,
    ) -> Option<DateKey> {
        let mut lines = self.lines.lock().await;
        loop {
            let current = current.map(|d| d.to_string()).unwrap_or_default();
            let mut stdout = tokio::io::stdout();
            let _ = stdout
                .write_all(format!("\ndate [{}] (empty to quit): ", current).as_bytes())
                .await;
            let _ = stdout.flush().await;

            let line = tokio::select! {
                _ = cancel.cancelled() => return None,
                line = lines.next_line() => line.ok().flatten()?,
            };

            let line = line.trim();
            if line.is_empty() || line.eq_ignore_ascii_case("q") {
                return None;
            }
            match line.parse::<DateKey>() {
                Ok(date) => return Some(date),
                Err(e) => eprintln!("{}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    let client = HttpClient::with_timeout(Duration::from_secs(config.http_timeout_seconds))?;
    let pipeline = FetchCachePipeline::from_config(Arc::new(client), &config)?;
    let mut screen = Screen::new(Arc::new(pipeline), TerminalPresenter);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    screen.refresh(args.date);
    settle(&mut screen, &shutdown).await;

    if args.interactive {
        let chooser = StdinDateChooser::new();
        while !shutdown.is_cancelled() {
            match screen.choose_date(&chooser, &shutdown).await {
                DateChoice::Cancelled => break,
                DateChoice::Rejected(_) => continue,
                DateChoice::Requested(_) => settle(&mut screen, &shutdown).await,
            }
        }
    }

    screen.close();
    info!("apod finished");
    Ok(())
}

async fn settle(screen: &mut Screen<TerminalPresenter>, shutdown: &CancellationToken) {
    let settled = tokio::select! {
        _ = shutdown.cancelled() => false,
        state = screen.render_until_settled() => state.is_some(),
    };
    if !settled {
        screen.close();
    }
}
