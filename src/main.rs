mod app;
mod asm;
mod config;

use crate::app::{App, AppEvent};
use crate::config::{AppConfig, CONFIG_FILE};
use clap::{Parser, Subcommand};
use orbview_asm::Direction;
use std::path::PathBuf;
use winit::event_loop::EventLoop;

#[derive(Parser)]
#[command(name = "orbview")]
#[command(about = "Single-model glTF viewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the viewer window (default if no subcommand)
    View,
    /// Assemble a program for the redstone CPU and print its encoding,
    /// redstone shape and /fill commands
    Asm {
        /// Source file; the built-in Fibonacci program when omitted
        file: Option<PathBuf>,

        /// Echo each source line next to its encoding
        #[arg(long)]
        echo: bool,

        /// Build direction for the /fill commands: x, z, -x or -z
        #[arg(short, long, default_value = "x")]
        direction: Direction,
    },
}

fn run_app(event_loop: EventLoop<AppEvent>, mut app: App) -> anyhow::Result<()> {
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn view() -> anyhow::Result<()> {
    let config = AppConfig::load(CONFIG_FILE)?;
    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;

    let app = App::new(&event_loop, config);
    run_app(event_loop, app)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli.command {
        Some(Commands::Asm {
            file,
            echo,
            direction,
        }) => asm::run(file.as_deref(), echo, direction),
        Some(Commands::View) | None => view(),
    }
}
