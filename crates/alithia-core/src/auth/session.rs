use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in the session directory
const SESSION_FILE: &str = "session.json";

/// Refresh the id token this long before it actually expires.
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub id_token: String,
    pub refresh_token: String,
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the id token will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }

    /// Name recorded as `authorName` on new records: display name, else email.
    pub fn author_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Signed-in user, persisted between runs.
///
/// An expired id token is still kept: its refresh token can mint a new one.
pub struct Session {
    dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, data: None }
    }

    /// Load session from disk
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;
            self.data = Some(data);
            return Ok(true);
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn uid(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.uid.as_str())
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expires_in_minutes: i64) -> SessionData {
        SessionData {
            id_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            uid: "u1".to_string(),
            email: "mira@alithia.world".to_string(),
            display_name: None,
            expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        }
    }

    #[test]
    fn test_needs_refresh_inside_buffer() {
        assert!(!sample(30).needs_refresh());
        assert!(sample(3).needs_refresh());
        assert!(!sample(3).is_expired());
        assert!(sample(-1).is_expired());
    }

    #[test]
    fn test_author_name_falls_back_to_email() {
        let mut data = sample(30);
        assert_eq!(data.author_name(), "mira@alithia.world");
        data.display_name = Some("Mira".to_string());
        assert_eq!(data.author_name(), "Mira");
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(!session.load().unwrap());

        session.update(sample(30));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.uid(), Some("u1"));
        assert!(!reloaded.data.as_ref().unwrap().is_expired());

        reloaded.clear().unwrap();
        assert!(!Session::new(dir.path().to_path_buf()).load().unwrap());
    }

    #[test]
    fn test_expired_session_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(sample(-10));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        let data = reloaded.data.as_ref().unwrap();
        assert!(data.is_expired());
        assert!(data.needs_refresh());
    }
}
