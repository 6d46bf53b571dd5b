mod audio;
mod audio_api;
mod config;
mod error;
mod loader;
mod middle;
mod pipeline;
mod shared;
mod tui;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use anyhow::Context;
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;

use audio_api::AudioGraph;
use config::Config;
use loader::sample_loader::{LoadRequest, LoaderHandle};
use middle::Middle;
use shared::InputEvent;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// The terminal is in raw mode while we run, so logs go to a file
fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config = Config::load(&project_dir);
    init_logging(&config.log_file)?;
    log::info!("clipdeck starting in {}", project_dir.display());

    let audio = audio::start_audio()?;
    let loader = LoaderHandle::spawn(audio.sample_rate())?;
    for (id, path) in config.sample_paths() {
        loader.request(LoadRequest::Sample { id, path });
    }
    let mut middle = Middle::new(config, audio);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let size = term.size()?;
        let lanes = tui::view::lanes_area(Rect::new(0, 0, size.width, size.height));
        middle.set_view_width(lanes.width);
        let ds = middle.display_state();

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        for event in tui::input::poll_input(tick_rate, &mut tui_state)? {
            let quit = event == InputEvent::Quit;
            middle.handle_input(event);
            if quit {
                log::info!("clipdeck quitting");
                return Ok(());
            }
        }

        // captures that closed since the last frame
        loop {
            let Some(event) = middle.graph_mut().poll_event() else {
                break;
            };
            if let Some(request) = middle.on_engine_event(event) {
                loader.request(request);
            }
        }
        while let Some(result) = loader.poll() {
            middle.on_load_result(result);
        }

        middle.tick();
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
