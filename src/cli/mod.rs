//! TUI front-end entry (Ratatui + Crossterm)
//! - Builds the backend and identity clients from config
//! - Sets up the terminal and drives the draw / input / effect loop

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use crate::auth::{IdentityClient, SessionStore};
use crate::config::Config;

pub mod api;
pub mod input;
pub mod state;
pub mod ui;
pub mod util;

pub async fn run(config: &Config) -> Result<()> {
    let mut app = init_app(config)?;
    app.restore_stored_session();

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut state::App,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // One effect per frame so loading states are on screen while requests run.
        if app.run_next_effect().await {
            continue;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick(Instant::now());
            last_tick = Instant::now();
        }

        if app.quit {
            info!("quit requested");
            break;
        }
    }
    Ok(())
}

pub fn init_app(config: &Config) -> Result<state::App> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("devbills/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout())
        .build()
        .context("building HTTP client")?;

    let client = api::Client::new(http.clone(), config.api_url.clone());
    let identity = IdentityClient::new(
        http,
        config.auth_url.clone(),
        config.token_url.clone(),
        config.firebase_api_key.clone(),
    );
    let store = SessionStore::new(config.session_path());
    info!(api = %config.api_url, session = ?store.path(), "client configured");

    Ok(state::App::new(client, identity, store))
}
