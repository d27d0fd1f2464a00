use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use voice_chess::command::UserCommand;
use voice_chess::config::Config;
use voice_chess::dialogue::{Controller, Event, Flow, Options};
use voice_chess::engine::{Engine, UciEngine};
use voice_chess::game::Game;
use voice_chess::interpret::{self, Phrase, describe};
use voice_chess::{normalize, speech, ui};

#[derive(Parser)]
#[command(name = "voice-chess", about = "Play chess by speaking your moves")]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play a game (default)
    Play,
    /// Show how a spoken phrase is interpreted, without playing it
    Interpret {
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[hotpath::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Interpret { words }) => {
            run_interpret(&words.join(" "));
            Ok(())
        }
        Some(Command::Play) | None => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(play(cli.config)),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,voice_chess={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_interpret(text: &str) {
    let phrase = Phrase::from_utterance(text);
    println!("cleaned: {}", normalize::clean(text));
    println!("tokens:  {:?}", phrase.tokens());
    match interpret::analyze(&phrase) {
        Some(found) => {
            println!("matcher: {}", found.matcher);
            println!("shape:   {:?}", found.shape);
            println!("san:     {}", found.san);
            if !found.san.is_empty() {
                println!("spoken:  {}", describe(&found.san));
            }
        }
        None => println!("san:     (not understood)"),
    }
}

async fn play(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path);
    let (events_tx, events_rx) = flume::unbounded::<Event>();

    let quit_tx = events_tx.clone();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(Event::Command(UserCommand::Quit));
    })?;

    let input = match speech::build_input(&config.speech, events_tx.clone()) {
        Ok(input) => input,
        Err(e) => {
            ui::error(&format!("Speech input unavailable: {:#}", e));
            return Ok(());
        }
    };
    let output = speech::build_output(&config.voice);

    let engine: Option<Box<dyn Engine>> = if config.engine.enabled {
        match UciEngine::spawn(&config.engine, events_tx.clone()).await {
            Ok(engine) => Some(Box::new(engine)),
            Err(e) => {
                warn!("engine unavailable: {}", e);
                ui::error(&format!("{}. Playing without an engine.", e));
                None
            }
        }
    } else {
        None
    };
    drop(events_tx);

    let options = Options {
        player: config.game.player.into(),
        depth: config.engine.depth,
        whole_word: config.confirm.whole_word,
    };
    let mut controller = Controller::new(input, output, Box::new(Game::new()), engine, options);

    ui::notice("Type /help for commands.");
    controller.new_game();

    while let Ok(event) = events_rx.recv_async().await {
        if controller.handle(event) == Flow::Quit {
            break;
        }
    }

    controller.shutdown();
    Ok(())
}
