use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

use soundstage::utils::{sine_tone, Ticker};
use soundstage::{AppResult, LibraryConfig, SoundEvent, SoundLibrary, SoundOptions};

const USAGE: &str = "Usage: soundstage [--config <library.json>] [--legacy] [<alias-or-file>...]";

struct Args {
    config: Option<PathBuf>,
    legacy: bool,
    targets: Vec<String>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        legacy: false,
        targets: Vec::new(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--legacy" => args.legacy = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("Unknown option {}\n{}", flag, USAGE),
            _ => args.targets.push(arg),
        }
    }
    Ok(args)
}

/// Console logging, `info` unless RUST_LOG says otherwise
fn initialize_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .init();
}

fn main() -> AppResult<()> {
    initialize_tracing();
    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => LibraryConfig::load(path)
            .with_context(|| format!("Failed to read library config {}", path.display()))?,
        None => LibraryConfig::default(),
    };
    config.use_legacy |= args.legacy;

    let mut library = SoundLibrary::from_config(&config);
    let (events, _subscriber) = library.events().subscribe();

    let mut aliases = Vec::new();
    for target in &args.targets {
        if !library.exists(target, false) {
            library.add(
                target.clone(),
                SoundOptions::from_url(target.clone()).with_preload(true),
            );
        }
        aliases.push(target.clone());
    }
    if aliases.is_empty() {
        aliases = config.sounds.keys().cloned().collect();
    }
    if aliases.is_empty() {
        tracing::info!("Nothing to play, using a test tone");
        library.add("tone", sine_tone(440.0, 1.0, config.sample_rate));
        aliases.push("tone".to_string());
    }

    library.flush_loads(Duration::from_secs(10));
    for alias in &aliases {
        if let Some(err) = library.find(alias).load_error() {
            tracing::error!("Skipping '{}': {}", alias, err);
            continue;
        }
        library.play(alias, ());
    }

    let mut ticker = Ticker::new(60);
    ticker.tick();
    loop {
        ticker.wait();
        library.update(ticker.tick());
        for event in events.try_iter() {
            match &event {
                SoundEvent::Progress { .. } => tracing::trace!("{:?}", event),
                SoundEvent::LoadFailed { alias, error } => {
                    tracing::error!("'{}' failed to load: {}", alias, error)
                }
                _ => tracing::info!("{:?}", event),
            }
        }
        if !library.is_playing() && !library.is_loading() {
            break;
        }
    }

    library.close();
    Ok(())
}
