//! Key=value credentials file shared by both commands.
//!
//! The file uses the `.env` convention. Reads go through `dotenvy` so quoting
//! and comments behave as operators expect; writes are a line-level rewrite
//! that only touches the two token keys and leaves every other line as-is.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Result, SyncError, TokenSet};

pub const CLIENT_ID_KEY: &str = "CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";
pub const ACCESS_TOKEN_KEY: &str = "ACCESS_TOKEN";
pub const REFRESH_TOKEN_KEY: &str = "REFRESH_TOKEN";

/// Parsed contents of the credentials file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Value for `key`, treating blank values as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn client_id(&self) -> Option<&str> {
        self.get(CLIENT_ID_KEY)
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.get(CLIENT_SECRET_KEY)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.get(REFRESH_TOKEN_KEY)
    }

    /// All parsed pairs, including keys this tool does not use
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// Reads and rewrites the credentials file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the credentials file. A missing file yields empty credentials.
    ///
    /// Lines `dotenvy` cannot parse (an unquoted value with spaces, a line
    /// without `=`) belong to other tools; they are logged at WARN and
    /// skipped, and `update` leaves them in place.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the file cannot be read.
    pub fn read(&self) -> Result<Credentials> {
        let iter = match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Credentials file not found");
                return Ok(Credentials::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let mut values = BTreeMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    values.insert(key, value);
                }
                Err(e @ dotenvy::Error::LineParse(..)) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Skipping unparseable line in credentials file"
                    );
                }
                Err(e) => return Err(self.read_error(e)),
            }
        }
        Ok(Credentials { values })
    }

    /// Write the token pair back to the file.
    ///
    /// Existing `ACCESS_TOKEN`/`REFRESH_TOKEN` lines are replaced in place,
    /// all other lines are kept verbatim and missing keys are appended.
    pub fn update(&self, tokens: &TokenSet) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        let rewritten = rewrite_token_lines(&existing, tokens);
        fs::write(&self.path, rewritten).map_err(|e| SyncError::io(&self.path, e))?;

        tracing::info!(path = %self.path.display(), "Saved tokens to credentials file");
        Ok(())
    }

    fn read_error(&self, e: dotenvy::Error) -> SyncError {
        SyncError::Configuration(format!(
            "cannot read credentials file {}: {}",
            self.path.display(),
            e
        ))
    }
}

fn rewrite_token_lines(content: &str, tokens: &TokenSet) -> String {
    let replacements = [
        (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
        (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
    ];
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut written = [false; 2];
    let mut out = String::with_capacity(content.len() + 128);

    for chunk in content.split_inclusive('\n') {
        let (line, ending) = match chunk.strip_suffix("\r\n") {
            Some(line) => (line, "\r\n"),
            None => match chunk.strip_suffix('\n') {
                Some(line) => (line, "\n"),
                None => (chunk, newline),
            },
        };
        let slot = line_key(line).and_then(|key| replacements.iter().position(|(k, _)| *k == key));
        match slot {
            // A repeated token key would leave the file ambiguous; keep the first only.
            Some(i) if written[i] => continue,
            Some(i) => {
                let (key, value) = replacements[i];
                out.push_str(&format!("{key}={value}{ending}"));
                written[i] = true;
            }
            None => {
                out.push_str(line);
                out.push_str(ending);
            }
        }
    }

    for (i, (key, value)) in replacements.iter().enumerate() {
        if !written[i] {
            out.push_str(&format!("{key}={value}{newline}"));
        }
    }
    out
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}
