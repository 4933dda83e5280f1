//! Line source plumbing
//!
//! The physical transport lives outside this crate. Anything that can hand
//! over complete text lines implements [`LineSource`]; the [`LinePump`] task
//! pulls lines from it and feeds them to a [`SerialLineDispatcher`].
//!
//! ```text
//! LineSource ──[String]──► LinePump ──► SerialLineDispatcher ──► InputRouter
//! ```

use async_trait::async_trait;
use statum::{machine, state};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::router::dispatcher::{DispatchStats, DispatcherError, SerialLineDispatcher};

const MIN_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Push-style supplier of complete text lines.
#[async_trait]
pub trait LineSource: Send + fmt::Debug {
    /// Next complete line without its terminator, `None` once the source is closed.
    ///
    /// Must be cancel safe: dropping the future may not lose a line.
    async fn next_line(&mut self) -> Option<io::Result<String>>;

    /// Switches line notification mode on or off. A source with notifications
    /// off delivers no lines.
    fn set_line_notifications(&mut self, enabled: bool);

    fn line_notifications(&self) -> bool;
}

/// Line source over any buffered async reader (stdin, a file, a serial device node).
#[derive(Debug)]
pub struct ReaderLineSource<R> {
    lines: Lines<R>,
    notifications: bool,
}

impl<R: AsyncBufRead + Unpin + Send + fmt::Debug> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            notifications: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + fmt::Debug> LineSource for ReaderLineSource<R> {
    async fn next_line(&mut self) -> Option<io::Result<String>> {
        if !self.notifications {
            return None;
        }
        self.lines
            .next_line()
            .await
            .transpose()
            .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
    }

    fn set_line_notifications(&mut self, enabled: bool) {
        self.notifications = enabled;
    }

    fn line_notifications(&self) -> bool {
        self.notifications
    }
}

/// Line source fed from a channel, for transports that push lines from their own task.
#[derive(Debug)]
pub struct ChannelLineSource {
    receiver: mpsc::Receiver<String>,
    notifications: bool,
}

impl ChannelLineSource {
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self {
            receiver,
            notifications: false,
        }
    }
}

#[async_trait]
impl LineSource for ChannelLineSource {
    async fn next_line(&mut self) -> Option<io::Result<String>> {
        if !self.notifications {
            return None;
        }
        self.receiver.recv().await.map(Ok)
    }

    fn set_line_notifications(&mut self, enabled: bool) {
        self.notifications = enabled;
    }

    fn line_notifications(&self) -> bool {
        self.notifications
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PumpState {
    Initializing,
    Pumping,
}

#[machine]
#[derive(Debug)]
pub struct LinePump<S: PumpState> {
    dispatcher: Arc<SerialLineDispatcher>,

    source: Box<dyn LineSource>,

    // Stops the pump from outside
    cancel: CancellationToken,

    stats_interval: Duration,
}

impl LinePump<Initializing> {
    /// Fails hard when no source is given: the dispatcher is disabled and
    /// stays that way until a later pump initializes successfully.
    ///
    /// A dispatcher that is already fed by another pump is left untouched.
    pub fn create(
        dispatcher: Arc<SerialLineDispatcher>,
        source: Option<Box<dyn LineSource>>,
        cancel: CancellationToken,
        stats_interval: Duration,
    ) -> Result<Self, DispatcherError> {
        dispatcher.attach_source()?;

        let Some(source) = source else {
            error!("No line source present, disabling dispatcher");
            dispatcher.disable();
            dispatcher.detach_source();
            return Err(DispatcherError::MissingLineSource);
        };
        debug!("Line source attached to dispatcher");

        Ok(Self::new(
            dispatcher,
            source,
            cancel,
            stats_interval.max(MIN_STATS_INTERVAL),
        ))
    }

    pub fn initialize(mut self) -> LinePump<Pumping> {
        self.source.set_line_notifications(true);
        self.dispatcher.enable();
        info!("Line notifications enabled, pumping lines");
        self.transition()
    }
}

impl LinePump<Pumping> {
    /// Pumps until the source closes, fails, or the token is cancelled.
    pub async fn run(mut self) -> Result<DispatchStats, DispatcherError> {
        let mut stats_timer = tokio::time::interval(self.stats_interval);
        // First tick fires immediately
        stats_timer.tick().await;

        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Line pump cancelled");
                    break Ok(());
                }
                _ = stats_timer.tick() => {
                    let stats = self.dispatcher.stats();
                    info!(
                        "Dispatcher stats: {} lines, {} broadcast, {} skipped (empty {}, malformed {}, bad pin {}, bad value {}, unknown pin {})",
                        stats.lines,
                        stats.broadcast,
                        stats.skipped(),
                        stats.empty_line,
                        stats.malformed_line,
                        stats.invalid_pin_number,
                        stats.invalid_value,
                        stats.unknown_pin
                    );
                }
                line = self.source.next_line() => match line {
                    Some(Ok(line)) => {
                        self.dispatcher.on_line(&line);
                    }
                    Some(Err(e)) => {
                        error!("Reading from line source failed: {}", e);
                        break Err(DispatcherError::Io(e));
                    }
                    None => {
                        info!("Line source closed");
                        break Ok(());
                    }
                },
            }
        };

        self.source.set_line_notifications(false);
        self.dispatcher.detach_source();
        result.map(|()| self.dispatcher.stats())
    }
}

/// Handle to a pump running on its own tokio task
pub struct PumpHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<DispatchStats, DispatcherError>>,
}

impl PumpHandle {
    /// Starts pumping `source` into `dispatcher`.
    ///
    /// # Errors
    ///
    /// * [`DispatcherError::AlreadyRunning`] - another source is attached,
    ///   checked before anything else
    /// * [`DispatcherError::MissingLineSource`] - `source` is `None`
    pub fn spawn<L: LineSource + 'static>(
        dispatcher: Arc<SerialLineDispatcher>,
        source: Option<L>,
        cancel: CancellationToken,
        stats_interval: Duration,
    ) -> Result<Self, DispatcherError> {
        let source = source.map(|s| Box::new(s) as Box<dyn LineSource>);
        let pump = LinePump::create(dispatcher, source, cancel.clone(), stats_interval)?
            .initialize();

        let task = tokio::spawn(async move {
            let result = pump.run().await;
            match &result {
                Ok(stats) => info!("Line pump finished after {} lines", stats.lines),
                Err(e) => error!("Line pump terminated with error: {}", e),
            }
            result
        });

        Ok(Self { cancel, task })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the source to close on its own.
    pub async fn join(self) -> Result<DispatchStats, DispatcherError> {
        self.task
            .await
            .map_err(|e| DispatcherError::TaskFailed(e.to_string()))?
    }

    pub async fn shutdown(self) -> Result<DispatchStats, DispatcherError> {
        self.cancel.cancel();
        self.join().await
    }
}
