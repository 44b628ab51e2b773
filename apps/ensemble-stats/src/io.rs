use crate::correlation::Correlation;
use crate::frame::{Column, Frame, Key};
use crate::statistics::{StatisticKind, StatisticsPartition};
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::io::{Read, Write};

const MISSING_TOKENS: [&str; 5] = ["", "nan", "na", "null", "none"];

fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Parse an identifier / timestamp cell. Empty cells are missing.
pub fn parse_key(raw: &str) -> Option<Key> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(Key::Int(v));
    }
    if let Ok(v) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Key::Date(v));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(v) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Key::DateTime(v));
        }
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Key::from_f64(v);
    }
    Some(Key::Text(trimmed.to_string()))
}

/// Read a headered CSV table. Columns named in `key_columns` become key columns, every other
/// column must be numeric (missing tokens become NaN).
pub fn read_frame_csv<R: Read>(reader: R, key_columns: &[&str]) -> Result<Frame> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let key_set: HashSet<&str> = key_columns.iter().copied().collect();

    let mut keys: Vec<Vec<Option<Key>>> = vec![Vec::new(); headers.len()];
    let mut numbers: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV record {}", idx + 1))?;
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 2);
        if record.len() != headers.len() {
            bail!(
                "line {line}: expected {} fields, found {}",
                headers.len(),
                record.len()
            );
        }
        for (col, raw) in record.iter().enumerate() {
            let name = headers[col].as_str();
            if key_set.contains(name) {
                keys[col].push(parse_key(raw));
            } else if is_missing(raw) {
                numbers[col].push(f64::NAN);
            } else {
                let value = raw.trim().parse::<f64>().with_context(|| {
                    format!("line {line}: column `{name}` value `{raw}` is not numeric")
                })?;
                numbers[col].push(value);
            }
        }
    }

    let columns = headers
        .into_iter()
        .zip(keys.into_iter().zip(numbers))
        .map(|(name, (key_values, numeric_values))| {
            if key_set.contains(name.as_str()) {
                Column::keys(name, key_values)
            } else {
                Column::numeric(name, numeric_values)
            }
        })
        .collect();
    let frame = Frame::new(columns)?;
    tracing::debug!(
        rows = frame.len(),
        columns = frame.columns().len(),
        "read CSV table"
    );
    Ok(frame)
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn partition_columns(partitions: &[StatisticsPartition]) -> Vec<String> {
    partitions
        .first()
        .map(|p| p.partition.iter().map(|v| v.column.clone()).collect())
        .unwrap_or_default()
}

fn partition_values(partition: &StatisticsPartition) -> Vec<String> {
    partition.partition.iter().map(|v| v.value.to_string()).collect()
}

/// Wide layout: two header rows (vector names, then statistic labels), then one row per
/// timestamp. Partition values lead each row. Nothing is written for an empty partition list.
pub fn write_statistics_csv<W: Write>(
    writer: W,
    partitions: &[StatisticsPartition],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let Some(first) = partitions.first() else {
        wtr.flush()?;
        return Ok(());
    };

    let mut vector_header = partition_columns(partitions);
    let mut kind_header = vec![String::new(); vector_header.len()];
    vector_header.push(first.table.time_column().to_string());
    kind_header.push(String::new());
    for vector in first.table.vectors() {
        for kind in StatisticKind::ALL {
            vector_header.push(vector.name.clone());
            kind_header.push(kind.label().to_string());
        }
    }
    wtr.write_record(&vector_header)?;
    wtr.write_record(&kind_header)?;

    for partition in partitions {
        let prefix = partition_values(partition);
        let table = &partition.table;
        for (row, timestamp) in table.timestamps().iter().enumerate() {
            let mut record = prefix.clone();
            record.push(timestamp.to_string());
            for vector in table.vectors() {
                let values = vector.values[row];
                record.extend(
                    StatisticKind::ALL
                        .iter()
                        .map(|kind| format_value(values.get(*kind))),
                );
            }
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Long layout: one `(partition..., timestamp, vector, statistic, value)` row per cell.
pub fn write_statistics_long_csv<W: Write>(
    writer: W,
    partitions: &[StatisticsPartition],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let Some(first) = partitions.first() else {
        wtr.flush()?;
        return Ok(());
    };

    let mut header = partition_columns(partitions);
    header.push(first.table.time_column().to_string());
    header.extend(["vector", "statistic", "value"].map(str::to_string));
    wtr.write_record(&header)?;

    for partition in partitions {
        let prefix = partition_values(partition);
        for cell in partition.table.cells() {
            let mut record = prefix.clone();
            record.push(cell.timestamp.to_string());
            record.push(cell.vector.to_string());
            record.push(cell.kind.label().to_string());
            record.push(format_value(cell.value));
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_correlations_csv<'a, W: Write>(
    writer: W,
    correlations: impl IntoIterator<Item = &'a Correlation>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["name", "coefficient"])?;
    for entry in correlations {
        wtr.write_record([entry.name.clone(), format_value(entry.coefficient)])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::correlate;
    use crate::statistics::{compute_partitioned_statistics, StatisticsRequest};

    const VECTORS_CSV: &str = "\
DATE,REAL,FOPT,FWCT
2020-01-01,0,10,0.1
2020-01-01,1,20,
2020-02-01,0,5,0.3
2020-02-01,1,15,NaN
";

    #[test]
    fn parses_keys_by_shape() {
        assert_eq!(parse_key(" 7 "), Some(Key::Int(7)));
        assert_eq!(
            parse_key("2020-01-01"),
            Some(Key::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()))
        );
        assert!(matches!(parse_key("2020-01-01T06:30:00"), Some(Key::DateTime(_))));
        assert_eq!(parse_key("0.25"), Some(Key::Float(0.25)));
        assert_eq!(parse_key("iter-0"), Some(Key::Text("iter-0".to_string())));
        assert_eq!(parse_key(""), None);
    }

    #[test]
    fn reads_key_and_numeric_columns() {
        let frame = read_frame_csv(VECTORS_CSV.as_bytes(), &["DATE", "REAL"]).unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            vec!["DATE", "REAL", "FOPT", "FWCT"]
        );
        let fwct = frame.numeric("FWCT").unwrap();
        assert!(fwct[1].is_nan());
        assert!(fwct[3].is_nan());
        assert!(frame.numeric("DATE").is_err());
    }

    #[test]
    fn rejects_non_numeric_cells_with_location() {
        let csv = "REAL,FOPT\n0,abc\n";
        let err = read_frame_csv(csv.as_bytes(), &["REAL"]).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("FOPT"), "{message}");
        assert!(message.contains("abc"), "{message}");
    }

    fn statistics_of(
        csv: &str,
        key_columns: &[&str],
        request: &StatisticsRequest,
    ) -> Vec<StatisticsPartition> {
        let frame = read_frame_csv(csv.as_bytes(), key_columns).unwrap();
        compute_partitioned_statistics(&frame, request).unwrap()
    }

    #[test]
    fn mixed_date_and_datetime_rows_sort_chronologically() {
        let csv = "DATE,REAL,FOPT\n2020-02-01,0,3\n2020-01-01 06:00:00,0,2\n2020-01-01,0,1\n";
        let partitions = statistics_of(csv, &["DATE", "REAL"], &StatisticsRequest::default());
        let timestamps: Vec<String> = partitions[0]
            .table
            .timestamps()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            timestamps,
            vec!["2020-01-01", "2020-01-01 06:00:00", "2020-02-01"]
        );
    }

    #[test]
    fn writes_two_level_statistics_header() {
        let partitions =
            statistics_of(VECTORS_CSV, &["DATE", "REAL"], &StatisticsRequest::default());
        let mut out = Vec::new();
        write_statistics_csv(&mut out, &partitions).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "DATE,FOPT,FOPT,FOPT,FOPT,FOPT,FOPT,FWCT,FWCT,FWCT,FWCT,FWCT,FWCT"
        );
        assert_eq!(lines[1], ",MEAN,MIN,MAX,P10,P90,P50,MEAN,MIN,MAX,P10,P90,P50");
        assert!(lines[2].starts_with("2020-01-01,15,10,20,19,11,15,"));
    }

    #[test]
    fn partition_values_lead_every_statistics_row() {
        let csv = "\
ENSEMBLE,SATNUM,SW,REAL,KRW
iter-0,1,0.5,0,0.2
iter-0,1,0.5,1,0.4
iter-1,1,0.5,0,0.1
";
        let request = StatisticsRequest {
            time_column: "SW".to_string(),
            ..StatisticsRequest::default()
        }
        .with_group_by(["ENSEMBLE", "SATNUM"]);
        let partitions = statistics_of(csv, &["ENSEMBLE", "SW", "REAL"], &request);

        let mut out = Vec::new();
        write_statistics_csv(&mut out, &partitions).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ENSEMBLE,SATNUM,SW,KRW,KRW,KRW,KRW,KRW,KRW");
        assert_eq!(lines[1], ",,,MEAN,MIN,MAX,P10,P90,P50");
        assert!(lines[2].starts_with("iter-0,1,0.5,"), "{}", lines[2]);
        assert!(lines[3].starts_with("iter-1,1,0.5,0.1,0.1,0.1,"), "{}", lines[3]);

        let mut out = Vec::new();
        write_statistics_long_csv(&mut out, &partitions).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ENSEMBLE,SATNUM,SW,vector,statistic,value");
        assert_eq!(lines.len(), 1 + 2 * StatisticKind::ALL.len());
        assert!(lines[1].starts_with("iter-0,1,0.5,KRW,MEAN,0.3"), "{}", lines[1]);
        assert_eq!(lines[7], "iter-1,1,0.5,KRW,MEAN,0.1");
    }

    #[test]
    fn empty_partition_list_writes_nothing() {
        let mut out = Vec::new();
        write_statistics_csv(&mut out, &[]).unwrap();
        write_statistics_long_csv(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn writes_correlations_with_blank_for_undefined() {
        let csv = "A,B,C\n1,2,5\n2,4,5\n3,6,5\n";
        let frame = read_frame_csv(csv.as_bytes(), &[]).unwrap();
        let series = correlate(&frame, "A").unwrap();
        let mut out = Vec::new();
        write_correlations_csv(&mut out, series.iter()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "name,coefficient\nB,1\nC,\n");
    }
}
