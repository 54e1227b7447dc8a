//! Backend roster metadata.
//!
//! The roster is described by a plain text file, one backend per line in the
//! form `name address port`. Provides parsing for single lines and whole
//! files plus the interactive fallback used when the configured file cannot
//! be opened.
use crate::backend::MAX_SERVERS;
use log::warn;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::Ipv4Addr;

/// Path probed when no other metadata location is configured.
pub const DEFAULT_METADATA_PATH: &str = "./servers_metadata.txt";

/// Longest accepted backend name.
pub const MAX_NAME_LEN: usize = 19;

#[derive(Debug, PartialEq)]
pub enum MetadataError {
    TooFewFields,
    NameTooLong,
    InvalidAddress,
    InvalidPort,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::TooFewFields => write!(f, "expected `name address port`"),
            MetadataError::NameTooLong => {
                write!(f, "backend name longer than {} characters", MAX_NAME_LEN)
            }
            MetadataError::InvalidAddress => write!(f, "not a dotted-quad IPv4 address"),
            MetadataError::InvalidPort => write!(f, "not a valid decimal port"),
        }
    }
}

impl Error for MetadataError {}

/// One parsed roster line: the identity of a single upstream server.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendMeta {
    pub name: String,
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl fmt::Display for BackendMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.addr, self.port)
    }
}

/// Parse one metadata line into a `BackendMeta`.
///
/// # Errors
///
/// Returns a `MetadataError` describing the first offending field when the
/// line does not carry three well-formed whitespace-separated fields.
pub fn parse_line(line: &str) -> Result<BackendMeta, MetadataError> {
    let mut fields = line.split_whitespace();
    let name = fields.next().ok_or(MetadataError::TooFewFields)?;
    let addr = fields.next().ok_or(MetadataError::TooFewFields)?;
    let port = fields.next().ok_or(MetadataError::TooFewFields)?;
    if name.len() > MAX_NAME_LEN {
        return Err(MetadataError::NameTooLong);
    }
    let addr: Ipv4Addr = addr.parse().map_err(|_| MetadataError::InvalidAddress)?;
    let port: u16 = port.parse().map_err(|_| MetadataError::InvalidPort)?;
    Ok(BackendMeta {
        name: name.to_string(),
        addr,
        port,
    })
}

/// Read every backend described by the file at `path`.
///
/// Malformed lines are skipped with a warning, blank lines silently. Lines
/// beyond the roster capacity are dropped.
///
/// # Errors
///
/// Returns `Err` only when the file itself cannot be opened or read.
pub fn load(path: &str) -> io::Result<Vec<BackendMeta>> {
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    let mut backends = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(meta) => backends.push(meta),
            Err(e) => warn!("skipping metadata line {} of {}: {}", lineno + 1, path, e),
        }
    }
    backends.truncate(MAX_SERVERS);
    Ok(backends)
}

/// Load the roster from `path`, prompting on stdout for a replacement path
/// whenever the current one cannot be opened.
///
/// # Errors
///
/// Returns `Err` when stdin is closed while a replacement path is awaited,
/// or on a stdin/stdout transport error.
pub fn load_or_prompt(path: &str) -> io::Result<Vec<BackendMeta>> {
    let mut path = path.to_string();
    loop {
        match load(&path) {
            Ok(backends) => return Ok(backends),
            Err(e) => warn!("can't open metadata file {}: {}", path, e),
        }
        print!("Provide file path to server metadata: ");
        io::stdout().flush()?;
        let mut replacement = String::new();
        if io::stdin().read_line(&mut replacement)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for a metadata path",
            ));
        }
        path = replacement
            .trim_end_matches(|c| c == '\r' || c == '\n')
            .to_string();
    }
}
