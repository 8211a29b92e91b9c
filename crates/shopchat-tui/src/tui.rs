use anyhow::Result;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind,
        MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use shopchat_core::ConversationState;
use std::io::{self, Stderr};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Frame period of the "Thinking..." animation
const ANIMATION_PERIOD: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// New conversation state published by the store
    Conversation(ConversationState),
}

impl AppEvent {
    /// Terminal events the app reacts to; key releases and repeats are dropped
    fn from_terminal(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(Self::Key(key)),
            Event::Mouse(mouse) => Some(Self::Mouse(mouse)),
            Event::Resize(cols, rows) => Some(Self::Resize(cols, rows)),
            _ => None,
        }
    }
}

type EventSender = mpsc::UnboundedSender<AppEvent>;

/// Single queue the draw loop waits on
///
/// Terminal input, store updates and animation ticks each feed it from their
/// own task. The tasks stop when the handler is dropped.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    sources: Vec<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new(updates: watch::Receiver<ConversationState>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let sources = vec![
            tokio::spawn(forward_terminal(tx.clone())),
            tokio::spawn(forward_conversation(updates, tx.clone())),
            tokio::spawn(tick(ANIMATION_PERIOD, tx)),
        ];
        Self { rx, sources }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        for source in &self.sources {
            source.abort();
        }
    }
}

async fn forward_terminal(tx: EventSender) {
    let mut stream = EventStream::new();
    while let Some(event) = stream.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "could not read terminal event");
                continue;
            }
        };
        if let Some(event) = AppEvent::from_terminal(event) {
            if tx.send(event).is_err() {
                return;
            }
        }
    }
    tracing::debug!("terminal event stream closed");
}

async fn forward_conversation(mut updates: watch::Receiver<ConversationState>, tx: EventSender) {
    // Intermediate states may be skipped; the latest one always arrives.
    while updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().clone();
        if tx.send(AppEvent::Conversation(state)).is_err() {
            return;
        }
    }
}

async fn tick(period: Duration, tx: EventSender) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if tx.send(AppEvent::Tick).is_err() {
            return;
        }
    }
}

/// Raw mode, alternate screen and mouse capture, drawing on stderr
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stderr()))?)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Give the terminal back before a panic on the UI thread is printed
///
/// Panics on runtime worker threads are only logged: the submission cycle
/// catches client panics, and anything else surfaces as a join error.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if std::thread::current().name() != Some("main") {
            tracing::error!(%info, "panic on worker thread");
            return;
        }
        if let Err(e) = restore() {
            eprintln!("failed to restore terminal: {}", e);
        }
        previous(info);
    }));
}
