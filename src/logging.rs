//! Optional per-session log of executed commands.

use crate::error::CdoError;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Where the session log goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    File(PathBuf),
    /// Kept in memory, read back with [`Cdo::collect_logs`](crate::Cdo::collect_logs).
    #[default]
    Buffer,
}

#[derive(Debug)]
pub(crate) struct SessionLog {
    target: LogTarget,
    buffer: Mutex<String>,
}

impl SessionLog {
    pub fn new(target: LogTarget) -> Self {
        Self {
            target,
            buffer: Mutex::new(String::new()),
        }
    }

    pub async fn info(&self, message: &str) -> Result<(), CdoError> {
        self.append("INFO", message).await
    }

    pub async fn error(&self, message: &str) -> Result<(), CdoError> {
        self.append("ERROR", message).await
    }

    async fn append(&self, level: &str, message: &str) -> Result<(), CdoError> {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            level,
            message
        );
        match &self.target {
            LogTarget::Buffer => {
                self.buffer
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push_str(&line);
                Ok(())
            }
            LogTarget::File(path) => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| CdoError::Log(path.clone(), e))?;
                file.write_all(line.as_bytes())
                    .await
                    .map_err(|e| CdoError::Log(path.clone(), e))?;
                file.flush().await.map_err(|e| CdoError::Log(path.clone(), e))
            }
        }
    }

    pub async fn collect(&self) -> Result<String, CdoError> {
        match &self.target {
            LogTarget::Buffer => Ok(self
                .buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()),
            LogTarget::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(content) => Ok(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(CdoError::Log(path.clone(), e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_buffer_log_format() -> Result<(), CdoError> {
        let log = SessionLog::new(LogTarget::Buffer);
        log.info("cdo -O stdatm,0 /tmp/out.nc").await?;
        log.error("cdo -O sinfov nofile.nc with:Open failed").await?;

        let content = log.collect().await?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - cdo -O stdatm,0 /tmp/out.nc"));
        assert!(lines[1].contains(" - ERROR - cdo -O sinfov nofile.nc with:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_log_appends() -> Result<(), CdoError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cdo.log");
        let log = SessionLog::new(LogTarget::File(path.clone()));
        assert_eq!(log.collect().await?, "");

        log.info("first").await?;
        log.info("second").await?;
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("INFO - second"));
        Ok(())
    }
}
