mod config;
use clap::{Parser, Subcommand};
use config::PecsBoardConfig;
use pecs_audio::{register_speech_tools, SharedSettings, SpeechDispatcher, SpeechOutcome};
use pecs_core::board::{self, CardFace, Category, Sentence};
use pecs_core::{PecsRuntime, SearchMode};
use std::sync::Arc;
use tracing::info;

const DEFAULT_LOG: &str = "info,pecs_core=info,pecs_audio=info,pecs_board=info";

#[derive(Parser)]
#[command(name = "pecs-board")]
#[command(about = "PECS communication board: pictograms and speech from the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board, with a cached pictogram path or the emoji for each card
    Board {
        /// Only this category (Food, Activities, Feelings, Actions)
        category: Option<String>,
    },

    /// Search pictograms for a word
    Search {
        term: String,

        #[arg(long, short)]
        lang: Option<String>,

        #[arg(long, default_value = "10")]
        limit: usize,

        /// Also search the lexicon translation
        #[arg(long)]
        smart: bool,
    },

    /// Download the pictogram for a word and print its path
    Fetch {
        term: String,

        #[arg(long, short)]
        lang: Option<String>,

        #[arg(long, short)]
        resolution: Option<u32>,
    },

    /// Speak a sentence built from the given words
    Say {
        #[arg(required = true)]
        words: Vec<String>,

        #[arg(long, short)]
        lang: Option<String>,
    },

    /// List installed voices
    Voices {
        lang: Option<String>,
    },

    /// Show speech engines and cache status
    Info,

    /// Inspect or clear the pictogram cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List the registered tools
    Tools,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Bytes used by the cache directory
    Size,
    /// Delete every cached file
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging / tracing
    let default_log = if cli.verbose {
        "debug,pecs_core=debug,pecs_audio=debug,pecs_board=debug"
    } else {
        DEFAULT_LOG
    };
    pecs_core::telemetry::init_tracing(default_log)?;

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = PecsBoardConfig::load();

    let runtime = PecsRuntime::new(cfg.pictogram.clone(), cfg.arasaac.clone()).await?;
    let settings: SharedSettings = pecs_audio::settings::shared(cfg.tts.clone());
    let dispatcher = Arc::new(SpeechDispatcher::new(settings, cfg.dispatcher.clone()));
    register_speech_tools(&runtime.tool_registry, Arc::clone(&dispatcher)).await;

    match cli.command {
        Commands::Board { category } => {
            let categories: Vec<&Category> = match category {
                Some(name) => match board::category(&name) {
                    Some(c) => vec![c],
                    None => return Err(format!("unknown category '{}'", name).into()),
                },
                None => board::categories().iter().collect(),
            };

            for category in categories {
                println!("{}", category.name);
                for card in category.cards {
                    let face = CardFace::resolve(
                        card,
                        &runtime.provider,
                        &cfg.board.lang,
                        cfg.board.resolution,
                    )
                    .await;
                    match face {
                        CardFace::Pictogram(path) => {
                            println!("  {} {:<12} {}", card.emoji, card.label, path.display())
                        }
                        CardFace::Glyph(glyph) => println!("  {} {:<12} -", glyph, card.label),
                    }
                }
            }
        }

        Commands::Search {
            term,
            lang,
            limit,
            smart,
        } => {
            let lang = lang.unwrap_or_else(|| cfg.board.lang.clone());
            let mode = if smart {
                SearchMode::Smart
            } else {
                cfg.board.search_mode
            };
            let matches = runtime
                .provider
                .search_multiple(&term, &lang, limit, mode)
                .await;
            if matches.is_empty() {
                println!("No pictograms found for '{}'", term);
            }
            for m in matches {
                let label = m.label.map(|l| format!(" ({})", l)).unwrap_or_default();
                println!("{:>6}  {}{}", m.id, m.keywords.join(", "), label);
            }
        }

        Commands::Fetch {
            term,
            lang,
            resolution,
        } => {
            let lang = lang.unwrap_or_else(|| cfg.board.lang.clone());
            let resolution = resolution.unwrap_or(cfg.pictogram.default_resolution);
            match runtime
                .provider
                .get_pictogram(&term, &lang, resolution)
                .await
            {
                Some(path) => println!("{}", path.display()),
                None => return Err(format!("no pictogram for '{}'", term).into()),
            }
        }

        Commands::Say { words, lang } => {
            let mut sentence = Sentence::new();
            for word in words {
                sentence.push(word);
            }
            let lang = lang.unwrap_or_else(|| cfg.board.speech_lang.clone());
            info!(target: "pecs_board", text = %sentence.text(), lang = %lang, "Speaking sentence");

            let outcome = dispatcher.speak(&sentence.text(), &lang).finished().await;
            match outcome {
                SpeechOutcome::Spoken { engine } => println!("Spoken with {}", engine),
                SpeechOutcome::Silent => println!("No TTS available: {}", sentence.text()),
                other => println!("{:?}", other),
            }
        }

        Commands::Voices { lang } => {
            let lang = lang.unwrap_or_default();
            let voices = dispatcher.get_available_voices(&lang).await;
            if voices.is_empty() {
                println!("No voices found");
            }
            for voice in voices {
                println!(
                    "{:<10} {:<32} {}",
                    voice.engine,
                    voice.name,
                    voice.description.unwrap_or_default()
                );
            }
        }

        Commands::Info => {
            let provider = &runtime.provider;
            println!("TTS:        {}", dispatcher.get_tts_info());
            println!("Cache dir:  {}", provider.config().cache_dir.display());
            println!("Cache size: {} bytes", provider.cache_size());
            println!("Lexicon:    {} entries", provider.lexicon().len());
            println!("ARASAAC:    {}", cfg.arasaac.api_base);
        }

        Commands::Cache { action } => match action {
            CacheAction::Size => println!("{}", runtime.provider.cache_size()),
            CacheAction::Clear => {
                let removed = runtime.provider.clear_cache().await;
                println!("Removed {} files", removed);
            }
        },

        Commands::Tools => {
            for tool in runtime.tool_registry.list_tools() {
                println!("{:<18} {}", tool.name(), tool.description());
            }
        }
    }

    Ok(())
}
