use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Terminal input after key decoding, independent of crossterm
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Left,
    Right,
    Back,
    Quit,
}

impl Input {
    /// Decode a key press. Keys the trainer has no use for map to `None`.
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Input::Quit),
                _ => None,
            };
        }
        match key.code {
            KeyCode::Esc => Some(Input::Quit),
            KeyCode::Char(c) => Some(Input::Char(c)),
            KeyCode::Left => Some(Input::Left),
            KeyCode::Right => Some(Input::Right),
            KeyCode::Backspace => Some(Input::Back),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerEvent {
    Input(Input),
    Resize,
    Tick,
}

pub trait EventSource: Send + 'static {
    /// Wait up to `timeout` for the next event
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError>;
}

/// Events delivered over a channel, from the terminal reader thread or a test
pub struct ChannelEventSource {
    rx: Receiver<TrainerEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<TrainerEvent>) -> Self {
        Self { rx }
    }

    /// Source paired with a sender the caller feeds by hand
    pub fn pair() -> (Sender<TrainerEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }

    /// Source fed by a background thread reading crossterm events
    pub fn terminal() -> Self {
        let (tx, source) = Self::pair();

        thread::spawn(move || loop {
            let event = match event::read() {
                Ok(Event::Key(key)) => Input::from_key(key).map(TrainerEvent::Input),
                Ok(Event::Resize(_, _)) => Some(TrainerEvent::Resize),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(event) = event {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        source
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event at a time, turning silence into ticks that redraw the timer
pub struct Runner<E: EventSource> {
    source: E,
    tick_rate: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(source: E, tick_rate: Duration) -> Self {
        Self { source, tick_rate }
    }

    pub fn step(&self) -> TrainerEvent {
        self.source
            .recv_timeout(self.tick_rate)
            .unwrap_or(TrainerEvent::Tick)
    }
}
