//! MOTD (Message of the Day)

use crate::config::ServerConfig;
use crate::{Error, Message, NumericReply, ReplyError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Message of the Day, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Motd {
    lines: Vec<String>,
}

impl Motd {
    /// MOTD with the given lines
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Build the MOTD from configuration.
    ///
    /// A configured file takes precedence over inline lines. A missing file
    /// only disables the MOTD; an unreadable one is a configuration error.
    pub fn load(config: &ServerConfig) -> Result<Self> {
        let Some(motd_file) = &config.motd_file else {
            return Ok(Self::from_lines(config.motd.clone()));
        };

        let path = Self::resolve_path(motd_file)?;
        if !path.exists() {
            warn!("MOTD file not found: {} (resolved from: {})", path.display(), motd_file);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read MOTD file {}: {}", path.display(), e)))?;
        let lines: Vec<String> = content.lines().map(|line| line.to_string()).collect();

        info!("Loaded MOTD from {} ({} lines)", path.display(), lines.len());
        debug!("MOTD lines: {:?}", lines);
        Ok(Self::from_lines(lines))
    }

    /// Resolve relative paths against the working directory
    pub fn resolve_path(motd_file: &str) -> Result<PathBuf> {
        let path = Path::new(motd_file);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(std::env::current_dir()
            .map_err(|e| Error::Config(format!("Failed to get current directory: {}", e)))?
            .join(path))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// RPL_MOTDSTART, one RPL_MOTD per line, RPL_ENDOFMOTD.
    /// Fails with `NoMotd` when there is nothing to show.
    pub fn messages(&self, server: &str, nick: &str) -> std::result::Result<Vec<Message>, ReplyError> {
        if self.lines.is_empty() {
            return Err(ReplyError::NoMotd);
        }

        let mut messages = Vec::with_capacity(self.lines.len() + 2);
        messages.push(NumericReply::motd_start(server, nick));
        messages.extend(
            self.lines
                .iter()
                .map(|line| NumericReply::motd_line(server, nick, line)),
        );
        messages.push(NumericReply::end_of_motd(server, nick));
        Ok(messages)
    }
}
