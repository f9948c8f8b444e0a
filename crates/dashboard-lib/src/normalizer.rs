//! Conversion of raw node usage quantities into display units
//!
//! CPU arrives from the metrics API in nanocores and is shown in millicores
//! against a single-core baseline. Memory arrives with a binary unit suffix
//! and is shown in mebibytes plus a share of the node's allocatable memory.

use crate::error::ParseError;
use crate::models::{DisplayMetric, NodeMetricSample};

const MIB: f64 = 1024.0 * 1024.0;

/// Millicores that count as 100% CPU
const CPU_BASELINE_MILLICORES: f64 = 1000.0;

/// Normalize one node sample into a display row
pub fn normalize(sample: &NodeMetricSample) -> Result<DisplayMetric, ParseError> {
    let millicores = parse_cpu_millicores(&sample.cpu_usage)?;
    let usage_bytes = parse_memory_bytes(&sample.memory_usage)?;

    let allocatable = sample
        .memory_allocatable
        .as_deref()
        .ok_or_else(|| ParseError::MissingAllocatable(sample.name.clone()))?;
    let allocatable_bytes = parse_memory_bytes(allocatable)?;
    if allocatable_bytes == 0 {
        return Err(ParseError::ZeroAllocatable(sample.name.clone()));
    }

    let cpu_percent = millicores / CPU_BASELINE_MILLICORES * 100.0;
    let memory_percent = usage_bytes as f64 / allocatable_bytes as f64 * 100.0;

    Ok(DisplayMetric {
        name: sample.name.clone(),
        cpu_usage: format!("{}m", millicores.round() as i64),
        cpu_usage_percent: format!("{}%", cpu_percent.round() as i64),
        memory_usage: format!("{}Mi", (usage_bytes as f64 / MIB).round() as u64),
        memory_usage_percent: format!("{:.2}%", memory_percent),
    })
}

/// Parse a CPU quantity into millicores
///
/// Metrics-server reports nanocores (`n`); microcores (`u`), millicores (`m`)
/// and whole cores are accepted as well since node objects use them.
pub fn parse_cpu_millicores(quantity: &str) -> Result<f64, ParseError> {
    let quantity = quantity.trim();
    if let Some(n) = quantity.strip_suffix('n') {
        Ok(parse_number(n, quantity)? / 1e6)
    } else if let Some(u) = quantity.strip_suffix('u') {
        Ok(parse_number(u, quantity)? / 1e3)
    } else if let Some(m) = quantity.strip_suffix('m') {
        parse_number(m, quantity)
    } else {
        Ok(parse_number(quantity, quantity)? * 1e3)
    }
}

/// Parse a memory quantity into bytes
///
/// `M`, `G` and `T` are read as their binary counterparts. A quantity
/// without a suffix is taken as bytes.
pub fn parse_memory_bytes(quantity: &str) -> Result<u64, ParseError> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(quantity.len());
    let (number, unit) = quantity.split_at(split);

    let multiplier: u64 = match unit {
        "" => 1,
        "Ki" => 1 << 10,
        "M" | "Mi" => 1 << 20,
        "G" | "Gi" => 1 << 30,
        "T" | "Ti" => 1 << 40,
        _ => {
            return Err(ParseError::UnknownUnit {
                quantity: quantity.to_string(),
                unit: unit.to_string(),
            })
        }
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| ParseError::Malformed(quantity.to_string()));
    }

    let value = parse_number(number, quantity)?;
    Ok((value * multiplier as f64).round() as u64)
}

fn parse_number(number: &str, quantity: &str) -> Result<f64, ParseError> {
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ParseError::Malformed(quantity.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: &str, memory: &str, allocatable: Option<&str>) -> NodeMetricSample {
        NodeMetricSample {
            name: "node-1".to_string(),
            cpu_usage: cpu.to_string(),
            memory_usage: memory.to_string(),
            memory_allocatable: allocatable.map(str::to_string),
        }
    }

    #[test]
    fn test_cpu_nanocores() {
        let metric = normalize(&sample("500000000n", "1Gi", Some("2Gi"))).unwrap();
        assert_eq!(metric.cpu_usage, "500m");
        assert_eq!(metric.cpu_usage_percent, "50%");
    }

    #[test]
    fn test_cpu_other_units() {
        assert_eq!(parse_cpu_millicores("250m").unwrap(), 250.0);
        assert_eq!(parse_cpu_millicores("2").unwrap(), 2000.0);
        assert_eq!(parse_cpu_millicores("1500u").unwrap(), 1.5);
        assert!(matches!(
            parse_cpu_millicores("abcn"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_memory_usage_and_percent() {
        let metric = normalize(&sample("0n", "1048576Ki", Some("2097152Ki"))).unwrap();
        assert_eq!(metric.memory_usage, "1024Mi");
        assert_eq!(metric.memory_usage_percent, "50.00%");
    }

    #[test]
    fn test_memory_suffix_multipliers_exact() {
        let cases = [
            ("3Ki", 3 * 1024u64),
            ("3M", 3 * 1024 * 1024),
            ("3Mi", 3 * 1024 * 1024),
            ("3G", 3 * 1024 * 1024 * 1024),
            ("3Gi", 3 * 1024 * 1024 * 1024),
            ("3T", 3 * 1024u64.pow(4)),
            ("3Ti", 3 * 1024u64.pow(4)),
        ];

        for (quantity, expected) in cases {
            assert_eq!(parse_memory_bytes(quantity).unwrap(), expected, "{}", quantity);
        }
    }

    #[test]
    fn test_memory_unknown_suffix() {
        for quantity in ["12Pi", "12k", "12Kb", "12E"] {
            assert!(
                matches!(
                    parse_memory_bytes(quantity),
                    Err(ParseError::UnknownUnit { .. })
                ),
                "{}",
                quantity
            );
        }
    }

    #[test]
    fn test_memory_bare_bytes_and_malformed() {
        assert_eq!(parse_memory_bytes("4096").unwrap(), 4096);
        assert!(matches!(
            parse_memory_bytes("Mi"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_percent_rounded_to_two_places() {
        let metric = normalize(&sample("0n", "1Gi", Some("3Gi"))).unwrap();
        assert_eq!(metric.memory_usage_percent, "33.33%");
    }

    #[test]
    fn test_missing_allocatable_fails() {
        let err = normalize(&sample("1n", "1Gi", None)).unwrap_err();
        assert_eq!(err, ParseError::MissingAllocatable("node-1".to_string()));
    }

    #[test]
    fn test_zero_allocatable_fails() {
        let err = normalize(&sample("1n", "1Gi", Some("0Ki"))).unwrap_err();
        assert_eq!(err, ParseError::ZeroAllocatable("node-1".to_string()));
    }
}
