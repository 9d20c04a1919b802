//! Motion handlers and the name -> handler registry.
//!
//! Handlers receive each admitted event concurrently with one another, so
//! implementations must not assume exclusive access to anything they share.

mod archive;
mod console;
mod mail;

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::event::MotionEvent;

pub use archive::ArchiveHandler;
pub use console::ConsoleHandler;
pub use mail::MailHandler;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] opencv::Error),
    #[error("mail delivery failed: {0}")]
    Mail(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown handler: {0}")]
    UnknownHandler(String),
    #[error("mail handler requires a [mail] config section")]
    MissingMailConfig,
    #[error("invalid mail settings: {0}")]
    Mail(String),
}

pub trait Handler: Send + Sync {
    fn handle(&self, event: &MotionEvent) -> Result<(), HandlerError>;
}

#[derive(Clone)]
pub struct NamedHandler {
    pub name: String,
    pub handler: Arc<dyn Handler>,
}

impl NamedHandler {
    pub fn new(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Console,
    Archive,
    Mail,
}

impl HandlerKind {
    pub fn name(self) -> &'static str {
        match self {
            HandlerKind::Console => "console",
            HandlerKind::Archive => "archive",
            HandlerKind::Mail => "mail",
        }
    }

    fn build(self, config: &Config) -> Result<Arc<dyn Handler>, RegistryError> {
        let handler: Arc<dyn Handler> = match self {
            HandlerKind::Console => Arc::new(ConsoleHandler),
            HandlerKind::Archive => Arc::new(ArchiveHandler::new(config.data_dir.clone())),
            HandlerKind::Mail => {
                let mail = config.mail.as_ref().ok_or(RegistryError::MissingMailConfig)?;
                Arc::new(MailHandler::new(mail)?)
            }
        };
        Ok(handler)
    }
}

impl FromStr for HandlerKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "console" => Ok(HandlerKind::Console),
            "archive" => Ok(HandlerKind::Archive),
            "mail" => Ok(HandlerKind::Mail),
            other => Err(RegistryError::UnknownHandler(other.to_string())),
        }
    }
}

/// Builds handlers in declaration order. Every name is resolved before
/// any handler is constructed.
pub fn build_handlers(names: &[String], config: &Config) -> Result<Vec<NamedHandler>, RegistryError> {
    let kinds = names
        .iter()
        .map(|name| name.parse::<HandlerKind>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut handlers = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let handler = kind.build(config)?;
        tracing::info!(handler = kind.name(), "adding motion handler");
        handlers.push(NamedHandler::new(kind.name(), handler));
    }
    Ok(handlers)
}
