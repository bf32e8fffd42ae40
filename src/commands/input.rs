//! Sample line parsing for `replay` and `run`

use crate::error::{AppError, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A metric sample read from text input
#[derive(Debug, Clone, PartialEq)]
pub struct SampleLine {
    pub timestamp: Option<SystemTime>,
    pub metric: String,
    pub value: f64,
}

fn invalid(line: usize, message: impl Into<String>) -> AppError {
    AppError::InvalidInput {
        line,
        message: message.into(),
    }
}

fn is_skippable(text: &str) -> bool {
    text.is_empty() || text.starts_with('#')
}

fn parse_value(line: usize, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| invalid(line, format!("'{}' is not a number", raw)))?;
    if !value.is_finite() {
        return Err(invalid(line, format!("'{}' is not a finite number", raw)));
    }
    Ok(value)
}

/// Parse `<unix_secs> <metric> <value>`. Blank lines and `#` comments yield `None`.
pub fn parse_timestamped(line: usize, text: &str) -> Result<Option<SampleLine>> {
    let text = text.trim();
    if is_skippable(text) {
        return Ok(None);
    }

    let fields: Vec<&str> = text.split_whitespace().collect();
    let [secs, metric, value] = fields.as_slice() else {
        return Err(invalid(line, "expected `<unix_secs> <metric> <value>`"));
    };

    let secs: u64 = secs
        .parse()
        .map_err(|_| invalid(line, format!("'{}' is not a unix timestamp", secs)))?;

    Ok(Some(SampleLine {
        timestamp: Some(UNIX_EPOCH + Duration::from_secs(secs)),
        metric: metric.to_string(),
        value: parse_value(line, value)?,
    }))
}

/// Parse `<metric> <value>`. Blank lines and `#` comments yield `None`.
pub fn parse_live(line: usize, text: &str) -> Result<Option<SampleLine>> {
    let text = text.trim();
    if is_skippable(text) {
        return Ok(None);
    }

    let fields: Vec<&str> = text.split_whitespace().collect();
    let [metric, value] = fields.as_slice() else {
        return Err(invalid(line, "expected `<metric> <value>`"));
    };

    Ok(Some(SampleLine {
        timestamp: None,
        metric: metric.to_string(),
        value: parse_value(line, value)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamped() {
        let sample = parse_timestamped(1, "1700000000 api.error_rate 6.5")
            .unwrap()
            .unwrap();
        assert_eq!(sample.metric, "api.error_rate");
        assert_eq!(sample.value, 6.5);
        assert_eq!(
            sample.timestamp,
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        assert_eq!(parse_timestamped(1, "   ").unwrap(), None);
        assert_eq!(parse_timestamped(2, "# header").unwrap(), None);
        assert_eq!(parse_live(3, "#").unwrap(), None);
    }

    #[test]
    fn test_malformed_lines_report_line_number() {
        let err = parse_timestamped(7, "1700000000 api.error_rate").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { line: 7, .. }));

        let err = parse_timestamped(8, "yesterday cpu 1").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { line: 8, .. }));

        let err = parse_live(9, "cpu NaN").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { line: 9, .. }));
    }

    #[test]
    fn test_parse_live() {
        let sample = parse_live(1, "cpu 91").unwrap().unwrap();
        assert_eq!(sample.metric, "cpu");
        assert_eq!(sample.value, 91.0);
        assert_eq!(sample.timestamp, None);
    }
}
