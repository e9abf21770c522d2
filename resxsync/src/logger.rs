//! User-facing messages produced by the engine.
//!
//! Diagnostics go through `tracing`. Messages meant for the person running a sync (which files
//! were added, which groups were dropped) go through a [`Logger`] handed to the engine, so a
//! front end can show them next to its own output.

use std::sync::{Arc, Mutex};

use tracing::info;

pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards messages to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        info!(target: "resxsync::engine", "{message}");
    }
}

/// Collects messages in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Logger for MemoryLogger {
    fn log(&self, message: &str) {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push(message.to_string());
    }
}

/// Sends every message to each inner logger, in order.
#[derive(Clone, Default)]
pub struct CombinedLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl CombinedLogger {
    pub fn new(loggers: Vec<Arc<dyn Logger>>) -> Self {
        CombinedLogger { loggers }
    }

    pub fn with(mut self, logger: Arc<dyn Logger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Logger for CombinedLogger {
    fn log(&self, message: &str) {
        for logger in &self.loggers {
            logger.log(message);
        }
    }
}
