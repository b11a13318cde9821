use super::SampleSource;
use crate::signal::Reading;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse one line of the board protocol: `[DATA:]raw,<unused>,voltage,temperature`.
///
/// Returns `None` for anything that is not a complete record.
pub fn parse_line(line: &str) -> Option<Reading> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("DATA:").unwrap_or(trimmed).trim();
    if payload.is_empty() || !payload.contains(',') {
        return None;
    }
    let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return None;
    }
    let ecg_raw = fields[0].parse::<i32>().ok()?;
    let ecg_voltage = fields[2].parse::<f64>().ok()?;
    let temperature = fields[3].parse::<f64>().ok()?;
    if !ecg_voltage.is_finite() || !temperature.is_finite() {
        return None;
    }
    Some(Reading {
        ecg_raw,
        ecg_voltage,
        temperature,
    })
}

/// Line-oriented hardware source reading one record per tick.
///
/// Works over anything buffered: a serial device node already configured for the
/// board's baud rate, a pipe, or a captured log.
pub struct LineSource<R: BufRead> {
    reader: R,
    name: String,
    line: String,
    exhausted: bool,
}

impl LineSource<BufReader<File>> {
    /// Open a device node or capture file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line: String::new(),
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<R: BufRead> SampleSource for LineSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_reading(&mut self) -> Option<Reading> {
        if self.exhausted {
            return None;
        }
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => {
                warn!("{}: end of stream", self.name);
                self.exhausted = true;
                None
            }
            Ok(_) => {
                let parsed = parse_line(&self.line);
                if parsed.is_none() {
                    debug!("{}: skipping malformed line {:?}", self.name, self.line.trim());
                }
                parsed
            }
            Err(err) => {
                warn!("{}: read failed: {}", self.name, err);
                None
            }
        }
    }
}
