use crate::source::parse_line;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse an offline ECG trace: one voltage per line, or full board protocol lines
/// (`DATA:raw,_,voltage,temp`) from which the voltage column is taken. Blank and
/// `#` comment lines are ignored.
pub fn parse_voltage_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val = if trimmed.contains(',') {
            parse_line(trimmed)
                .map(|reading| reading.ecg_voltage)
                .with_context(|| format!("line {} is not a sensor record: {}", idx + 1, trimmed))?
        } else {
            trimmed
                .parse::<f64>()
                .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?
        };
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no voltage samples found");
    }
    Ok(out)
}

/// Read an offline ECG trace from disk.
pub fn read_voltage_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_voltage_series(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_protocol_lines() {
        let text = "# trace\n1.6\n\nDATA:410,0,2.0,36.5\n1.55\n";
        let series = parse_voltage_series(text).unwrap();
        assert_eq!(series, vec![1.6, 2.0, 1.55]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_voltage_series("1.6\nnot-a-number\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_voltage_series("# only comments\n").is_err());
    }
}
