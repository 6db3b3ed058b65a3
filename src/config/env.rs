//! `.env` handling.
//!
//! A `.env` file holds whitespace separated `KEY=VALUE` tokens, any number per
//! line, the way `export $(cat .env | xargs)` reads it. Quoted values may
//! contain whitespace and follow dotenv quoting rules. A `#` starting a token
//! comments out the rest of the line.
//!
//! The file is either loaded into this process before the command line is
//! parsed, so every flag with an environment fallback can be set from it, or
//! read into a list of pairs that is handed to a child process only.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::{debug, Error, ErrorKind, Result};

// Tracing filter directive.
pub const LOG_DIRECTIVE: &str = "BATMON_LOG";

// Overrides the env file loaded at startup.
pub const ENV_FILE: &str = "BATMON_ENV_FILE";

pub const DEFAULT_ENV_FILE: &str = ".env";

pub fn env_file_path() -> PathBuf {
    env::var_os(ENV_FILE)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
}

/// Load `path` into the process environment.
///
/// Variables already present in the environment are left untouched. Returns
/// `None` when the file does not exist.
pub fn load_process_env(path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    for (key, value) in parse(&content)? {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
        }
    }
    Ok(Some(path.to_path_buf()))
}

/// Parse `path` without modifying the process environment.
pub fn read_env_file(path: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::from(ErrorKind::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("env file {} not found", path.display()),
            )))
        } else {
            Error::from(err)
        }
    })?;

    parse(&content)
}

// Split every line into tokens and hand them to dotenvy one per line, which
// takes care of quotes and escapes.
fn parse(content: &str) -> Result<Vec<(String, String)>> {
    let mut entries = String::with_capacity(content.len());
    for line in content.lines() {
        for token in tokens(line) {
            entries.push_str(token);
            entries.push('\n');
        }
    }

    let vars = dotenvy::from_read_iter(entries.as_bytes())
        .map(|item| item.map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;
    debug!("Parsed {} env entries", vars.len());
    Ok(vars)
}

fn tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            '#' if start.is_none() => break,
            c if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(&line[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        tokens.push(&line[s..]);
    }

    tokens.retain(|token| *token != "export");
    tokens
}
