//! Pause, resume and exit handling for an interactive crawl.
//!
//! The crawl loop only sees [`ControlEvent`]s; [`spawn_terminal_events`] is the adapter that
//! turns stdin lines and Ctrl+C into events.

use std::io::IsTerminal;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::spawn_local;
use tracing::debug;

/// How often the crawl loop checks for input while paused.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

const EVENT_BUFFER: usize = 16;

/// Input delivered to the crawl loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// A key command. An empty or whitespace-only line arrives as `' '`.
    Key(char),
    /// Ctrl+C.
    Interrupt,
}

/// Where the crawl loop is in its interactive lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Fetching batches.
    Running,
    /// Waiting for a command.
    Paused,
    /// Ctrl+C was pressed; waiting for y/n.
    ConfirmExit,
    /// Write the checkpoint and stop.
    SavingAndExiting,
    /// Remove the checkpoint and stop.
    DeletingAndExiting,
    /// Reload the checkpoint, then continue.
    Resuming,
    /// Stop without touching the checkpoint.
    Exiting,
}

impl ControlState {
    /// Applies `event`, returning the next state.
    pub fn transition(self, event: ControlEvent) -> Self {
        use ControlEvent::{Interrupt, Key};
        use ControlState::*;

        let event = match event {
            Key(key) => Key(key.to_ascii_lowercase()),
            other => other,
        };
        match (self, event) {
            (Running | Resuming, Key(' ' | 'p')) => Paused,
            (Running | Resuming | Paused, Interrupt) => ConfirmExit,
            (Paused, Key('c')) => Running,
            (Paused, Key('s')) => SavingAndExiting,
            (Paused, Key('d')) => DeletingAndExiting,
            (Paused, Key('r')) => Resuming,
            (ConfirmExit, Key('y' | 's')) => SavingAndExiting,
            (ConfirmExit, Key('n')) => Exiting,
            (ConfirmExit, Key('c')) => Running,
            (ConfirmExit, Interrupt) => Exiting,
            (state, _) => state,
        }
    }

    /// The loop should stop fetching and wait for input.
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Paused | Self::ConfirmExit)
    }

    /// The loop should stop for good.
    pub fn is_exit(self) -> bool {
        matches!(
            self,
            Self::SavingAndExiting | Self::DeletingAndExiting | Self::Exiting
        )
    }

    /// Menu printed when entering a waiting state.
    pub fn prompt(self) -> Option<&'static str> {
        match self {
            Self::Paused => Some(
                "\n⏸  Paused. [c] continue  [s] save & exit  [d] delete progress & exit  [r] reload & continue",
            ),
            Self::ConfirmExit => Some(
                "\n⚠️  Interrupted. Save progress before exiting? [y] save  [n] discard  [c] continue",
            ),
            _ => None,
        }
    }
}

fn key_for_line(line: &str) -> Option<char> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Some(' ');
    }
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

/// Spawns stdin and Ctrl+C readers on the current `LocalSet`.
///
/// Stdin is only read when it is a terminal, so piped or redirected runs are not interrupted by
/// stray input.
pub fn spawn_terminal_events() -> mpsc::Receiver<ControlEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    if std::io::stdin().is_terminal() {
        let keys = tx.clone();
        spawn_local(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match key_for_line(&line) {
                    Some(key) => {
                        if keys.send(ControlEvent::Key(key)).await.is_err() {
                            break;
                        }
                    }
                    None => debug!(%line, "ignoring unrecognised input"),
                }
            }
        });
    }

    spawn_local(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(ControlEvent::Interrupt).await.is_err() {
                break;
            }
        }
    });

    rx
}
