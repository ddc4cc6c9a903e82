//! `log` backend that forwards records over a channel.
//!
//! The broker and the startup simulation log through the `log` facade. The CLI
//! installs a [`ChannelLogger`] and drains the receiver after the run, so log
//! lines and the final report are printed by one owner in a stable order.

use crossbeam::channel::{Receiver, Sender, unbounded};
use crossterm::style::Stylize;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: Level,
    pub target: String,
    pub message: String,
}

pub struct ChannelLogger {
    sender: Sender<LogMessage>,
    level: LevelFilter,
}

impl Log for ChannelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = self.sender.try_send(LogMessage {
                level: record.level(),
                target: record.target().to_string(),
                message: format!("{}", record.args()),
            });
        }
    }

    fn flush(&self) {}
}

impl ChannelLogger {
    pub fn new(sender: Sender<LogMessage>, level: LevelFilter) -> Self {
        Self { sender, level }
    }

    pub fn with_receiver(level: LevelFilter) -> (Self, Receiver<LogMessage>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender, level), receiver)
    }

    /// Installs a channel logger as the global `log` backend.
    ///
    /// Fails if a logger was already installed in this process.
    pub fn install(level: LevelFilter) -> Result<Receiver<LogMessage>, SetLoggerError> {
        let (logger, receiver) = Self::with_receiver(level);
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(receiver)
    }
}

/// Formats one message for the terminal, coloring the level.
pub fn render(message: &LogMessage) -> String {
    let level = format!("{:<5}", message.level);
    let level = match message.level {
        Level::Error => level.red().bold(),
        Level::Warn => level.yellow(),
        Level::Info => level.green(),
        Level::Debug => level.blue(),
        Level::Trace => level.dark_grey(),
    };
    format!(
        "{level} {} {}",
        message.target.as_str().dark_grey(),
        message.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(logger: &ChannelLogger, level: Level, text: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("rusty_ready::event::broker")
                .args(format_args!("{text}"))
                .build(),
        );
    }

    #[test]
    fn forwards_enabled_records() {
        let (logger, rx) = ChannelLogger::with_receiver(LevelFilter::Info);

        emit(&logger, Level::Warn, "topic 'settings' has 64 pending subscribers");

        assert_eq!(
            rx.try_recv(),
            Ok(LogMessage {
                level: Level::Warn,
                target: "rusty_ready::event::broker".into(),
                message: "topic 'settings' has 64 pending subscribers".into(),
            })
        );
    }

    #[test]
    fn drops_records_above_level() {
        let (logger, rx) = ChannelLogger::with_receiver(LevelFilter::Info);

        emit(&logger, Level::Debug, "queued subscriber #0 on 'settings'");

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn render_keeps_target_and_message() {
        let line = render(&LogMessage {
            level: Level::Info,
            target: "startup".into(),
            message: "topic 'settings' is ready".into(),
        });

        assert!(line.contains("INFO"));
        assert!(line.contains("startup"));
        assert!(line.ends_with("topic 'settings' is ready"));
    }
}
