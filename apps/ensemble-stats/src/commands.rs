use anyhow::{bail, Context, Result};
use ensemble_stats::config::AnalysisConfig;
use ensemble_stats::correlation::{correlate, Correlation};
use ensemble_stats::frame::Frame;
use ensemble_stats::io::{
    read_frame_csv, write_correlations_csv, write_statistics_csv, write_statistics_long_csv,
};
use ensemble_stats::parameter_response::{
    analyze_parameter_response, non_constant_parameters, response_key, ParameterResponse,
    ParameterResponseQuery,
};
use ensemble_stats::statistics::{
    compute_partitioned_statistics, FanChart, PartitionValue, StatisticsPartition,
    StatisticsRequest, StatisticsTable,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::cli::{
    CorrelateArgs, OutputFormat, ParameterResponseArgs, StatisticsArgs, StatisticsFormat,
};

fn read_input(path: &Path, key_columns: &[&str]) -> Result<Frame> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_frame_csv(BufReader::new(file), key_columns)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

fn write_json<T: Serialize>(mut out: impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct VectorFanChart<'a> {
    vector: &'a str,
    #[serde(flatten)]
    bands: FanChart,
}

#[derive(Serialize)]
struct StatisticsReport<'a> {
    #[serde(skip_serializing_if = "is_whole_frame")]
    partition: &'a [PartitionValue],
    #[serde(flatten)]
    table: &'a StatisticsTable,
    /// Renderer bands; `low` is P90 and `high` is P10.
    fan_charts: Vec<VectorFanChart<'a>>,
}

fn is_whole_frame(partition: &&[PartitionValue]) -> bool {
    partition.is_empty()
}

impl<'a> From<&'a StatisticsPartition> for StatisticsReport<'a> {
    fn from(partition: &'a StatisticsPartition) -> Self {
        Self {
            partition: &partition.partition,
            table: &partition.table,
            fan_charts: partition
                .table
                .vectors()
                .iter()
                .map(|vector| VectorFanChart {
                    vector: &vector.name,
                    bands: vector.fan_chart(),
                })
                .collect(),
        }
    }
}

pub fn statistics(args: StatisticsArgs, config: &AnalysisConfig) -> Result<()> {
    let time_column = args.time_column.unwrap_or_else(|| config.time_column.clone());
    let id_column = args.id_column.unwrap_or_else(|| config.id_column.clone());
    let mut key_columns = vec![time_column.as_str(), id_column.as_str()];
    key_columns.extend(args.group_by.iter().map(String::as_str));
    let frame = read_input(&args.input, &key_columns)?;

    let mut request = StatisticsRequest {
        time_column: time_column.clone(),
        id_column: id_column.clone(),
        ..StatisticsRequest::default()
    }
    .with_group_by(args.group_by.iter().cloned());
    if !args.vectors.is_empty() {
        request = request.with_vectors(args.vectors);
    }
    let partitions = compute_partitioned_statistics(&frame, &request)?;
    tracing::info!(
        partitions = partitions.len(),
        timestamps = partitions.iter().map(|p| p.table.len()).sum::<usize>(),
        format = %args.format,
        "writing statistics"
    );

    let out = open_output(args.output.as_deref())?;
    match args.format {
        StatisticsFormat::Csv => write_statistics_csv(out, &partitions),
        StatisticsFormat::Long => write_statistics_long_csv(out, &partitions),
        StatisticsFormat::Json if args.group_by.is_empty() => match partitions.first() {
            Some(partition) => write_json(out, &StatisticsReport::from(partition)),
            None => bail!("no statistics were computed"),
        },
        StatisticsFormat::Json => {
            let reports: Vec<StatisticsReport<'_>> =
                partitions.iter().map(StatisticsReport::from).collect();
            write_json(out, &reports)
        }
    }
}

#[derive(Serialize)]
struct CorrelationReport<'a> {
    target: &'a str,
    correlations: Vec<&'a Correlation>,
}

pub fn correlate_columns(args: CorrelateArgs, config: &AnalysisConfig) -> Result<()> {
    let excluded: Vec<&str> = args.exclude.iter().map(String::as_str).collect();
    let frame = read_input(&args.input, &excluded)?;
    let kept: Vec<&str> = frame
        .column_names()
        .filter(|name| !excluded.contains(name))
        .collect();
    let series = correlate(&frame.select(&kept)?, &args.target)?;

    let entries: Vec<&Correlation> = if args.ranked || args.top.is_some() {
        series.top(args.top.unwrap_or(config.top_n))
    } else {
        series.iter().collect()
    };
    tracing::info!(
        target = %args.target,
        candidates = series.len(),
        written = entries.len(),
        "writing correlations"
    );

    let out = open_output(args.output.as_deref())?;
    match args.format {
        OutputFormat::Csv => write_correlations_csv(out, entries),
        OutputFormat::Json => write_json(
            out,
            &CorrelationReport {
                target: series.target(),
                correlations: entries,
            },
        ),
    }
}

#[derive(Serialize)]
struct ParameterResponseReport<'a> {
    #[serde(flatten)]
    analysis: &'a ParameterResponse,
    /// Bar chart rows, strongest first.
    ranked: Vec<&'a Correlation>,
}

fn selected_response_key(args: &ParameterResponseArgs) -> Result<String> {
    match (&args.response_key, &args.well, &args.date, &args.zone) {
        (Some(key), None, None, None) => Ok(key.clone()),
        (None, Some(well), Some(date), Some(zone)) => Ok(response_key(well, date, zone)),
        _ => bail!("pass either --response-key or all of --well, --date and --zone"),
    }
}

pub fn parameter_response(args: ParameterResponseArgs, config: &AnalysisConfig) -> Result<()> {
    let key = selected_response_key(&args)?;
    let mut key_columns: Vec<&str> = args.exclude.iter().map(String::as_str).collect();
    key_columns.push(config.id_column.as_str());
    let frame = read_input(&args.input, &key_columns)?;

    let responses = if args.responses.is_empty() {
        vec![key.clone()]
    } else {
        args.responses.clone()
    };
    let candidates: Vec<&str> = frame
        .column_names()
        .filter(|name| {
            !key_columns.contains(name)
                && *name != key
                && !responses.iter().any(|r| r == name)
        })
        .collect();
    let parameters = non_constant_parameters(&frame, &candidates);
    tracing::debug!(
        candidates = candidates.len(),
        parameters = parameters.len(),
        "resolved non-constant parameters"
    );

    let query = ParameterResponseQuery {
        response_key: &key,
        parameters: &parameters,
        responses: &responses,
        parameter: args.parameter.as_deref(),
        mode: args.mode.into(),
    };
    let analysis = analyze_parameter_response(&frame, &query)?;
    tracing::info!(
        mode = analysis.mode.as_str(),
        parameter = %analysis.parameter,
        response = %analysis.response_key,
        "writing parameter response"
    );

    let report = ParameterResponseReport {
        analysis: &analysis,
        ranked: analysis
            .correlations
            .top(args.top.unwrap_or(config.top_n)),
    };
    write_json(open_output(args.output.as_deref())?, &report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModeArg;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    const VECTORS: &str = "\
DATE,REAL,FOPT
2020-01-01,1,10
2020-01-01,2,20
2020-02-01,1,5
2020-02-01,2,15
";

    const PIVOT: &str = "\
REAL,ENSEMBLE,PERM,PORO,MULT,A-1 2020-01-01 Z1
0,iter-0,1,4,1,200
1,iter-0,2,3,1,210
2,iter-0,3,2,1,220
3,iter-0,4,1,1,235
";

    #[test]
    fn statistics_writes_selected_vector_as_json() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "vectors.csv", VECTORS);
        let output = dir.path().join("stats.json");
        let args = StatisticsArgs {
            input,
            time_column: None,
            id_column: None,
            vectors: vec!["FOPT".to_string()],
            group_by: Vec::new(),
            format: StatisticsFormat::Json,
            output: Some(output.clone()),
        };
        statistics(args, &AnalysisConfig::default()).unwrap();

        let json = read_json(&output);
        assert_eq!(json["time_column"], "DATE");
        assert_eq!(json["timestamps"][0], "2020-01-01");
        let first = &json["vectors"][0]["values"][0];
        assert_eq!(first["P10"].as_f64().unwrap(), 19.0);
        assert_eq!(first["P90"].as_f64().unwrap(), 11.0);
        assert!(json.get("partition").is_none());

        let fan = &json["fan_charts"][0];
        assert_eq!(fan["vector"], "FOPT");
        assert_eq!(fan["high"][0].as_f64().unwrap(), 19.0);
        assert_eq!(fan["low"][0].as_f64().unwrap(), 11.0);
        assert_eq!(fan["mean"][1].as_f64().unwrap(), 10.0);
    }

    #[test]
    fn statistics_splits_partitions_into_a_json_array() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "relperm.csv",
            "\
ENSEMBLE,SATNUM,SW,REAL,KRW
iter-0,1,0.0,0,0.0
iter-0,1,0.0,1,0.0
iter-0,1,1.0,0,0.9
iter-0,1,1.0,1,0.7
iter-0,2,0.0,0,0.1
iter-0,2,0.0,1,0.3
",
        );
        let output = dir.path().join("relperm.json");
        let args = StatisticsArgs {
            input,
            time_column: Some("SW".to_string()),
            id_column: None,
            vectors: Vec::new(),
            group_by: vec!["ENSEMBLE".to_string(), "SATNUM".to_string()],
            format: StatisticsFormat::Json,
            output: Some(output.clone()),
        };
        statistics(args, &AnalysisConfig::default()).unwrap();

        let json = read_json(&output);
        let partitions = json.as_array().unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0]["partition"][0]["column"], "ENSEMBLE");
        assert_eq!(partitions[0]["partition"][0]["value"], "iter-0");
        assert_eq!(partitions[0]["partition"][1]["value"], 1);
        assert_eq!(partitions[0]["timestamps"], serde_json::json!([0, 1]));
        assert_eq!(partitions[1]["partition"][1]["value"], 2);
        let krw = &partitions[0]["fan_charts"][0];
        assert_eq!(krw["vector"], "KRW");
        assert_eq!(krw["maximum"][1].as_f64().unwrap(), 0.9);
        assert_eq!(krw["minimum"][1].as_f64().unwrap(), 0.7);
    }

    #[test]
    fn statistics_rejects_text_vectors() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "vectors.csv",
            "DATE,REAL,ENSEMBLE,FOPT\n2020-01-01,1,iter-0,10\n",
        );
        let args = StatisticsArgs {
            input,
            time_column: None,
            id_column: None,
            vectors: Vec::new(),
            group_by: Vec::new(),
            format: StatisticsFormat::Csv,
            output: Some(dir.path().join("stats.csv")),
        };
        let err = statistics(args, &AnalysisConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("ENSEMBLE"), "{err:#}");
    }

    #[test]
    fn correlate_ranks_and_truncates() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "pivot.csv", PIVOT);
        let output = dir.path().join("corr.csv");
        let args = CorrelateArgs {
            input,
            target: "A-1 2020-01-01 Z1".to_string(),
            exclude: vec!["REAL".to_string(), "ENSEMBLE".to_string()],
            ranked: true,
            top: Some(2),
            format: OutputFormat::Csv,
            output: Some(output.clone()),
        };
        correlate_columns(args, &AnalysisConfig::default()).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let names: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(names, vec!["PERM", "PORO"]);
    }

    #[test]
    fn parameter_response_skips_constant_and_excluded_columns() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "pivot.csv", PIVOT);
        let output = dir.path().join("response.json");
        let args = ParameterResponseArgs {
            input,
            response_key: Some("A-1 2020-01-01 Z1".to_string()),
            well: None,
            date: None,
            zone: None,
            responses: Vec::new(),
            parameter: None,
            mode: ModeArg::SimVsParam,
            exclude: vec!["ENSEMBLE".to_string()],
            top: None,
            output: Some(output.clone()),
        };
        parameter_response(args, &AnalysisConfig::default()).unwrap();

        let json = read_json(&output);
        assert_eq!(json["mode"], "sim_vs_param");
        assert_eq!(json["parameter"], "PERM");
        assert_eq!(json["title"], "A-1 2020-01-01 Z1 vs parameters");
        let names: Vec<&str> = json["correlations"]["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["PERM", "PORO"]);
        assert_eq!(json["parameter_range"][0].as_f64().unwrap(), 1.0);
        assert_eq!(json["parameter_range"][1].as_f64().unwrap(), 4.0);
    }

    #[test]
    fn parameter_response_builds_key_from_well_date_zone() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "pivot.csv", PIVOT);
        let output = dir.path().join("response.json");
        let args = ParameterResponseArgs {
            input,
            response_key: None,
            well: Some("A-1".to_string()),
            date: Some("2020-01-01".to_string()),
            zone: Some("Z1".to_string()),
            responses: Vec::new(),
            parameter: Some("PORO".to_string()),
            mode: ModeArg::ParamVsSim,
            exclude: vec!["ENSEMBLE".to_string()],
            top: None,
            output: Some(output.clone()),
        };
        parameter_response(args, &AnalysisConfig::default()).unwrap();

        let json = read_json(&output);
        assert_eq!(json["response_key"], "A-1 2020-01-01 Z1");
        assert_eq!(json["highlight"], "A-1 2020-01-01 Z1");
        assert_eq!(json["title"], "PORO vs simulated RFTs");
        let normalized: Vec<f64> = json["normalized_parameter"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        for (actual, expected) in normalized.iter().zip([1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0]) {
            assert!((actual - expected).abs() < 1e-12, "{normalized:?}");
        }
        assert_eq!(normalized.len(), 4);
    }

    #[test]
    fn parameter_response_needs_a_complete_response_selection() {
        let args = ParameterResponseArgs {
            input: PathBuf::from("unused.csv"),
            response_key: None,
            well: Some("A-1".to_string()),
            date: None,
            zone: Some("Z1".to_string()),
            responses: Vec::new(),
            parameter: None,
            mode: ModeArg::SimVsParam,
            exclude: Vec::new(),
            top: None,
            output: None,
        };
        let err = parameter_response(args, &AnalysisConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("--well"), "{err:#}");
    }

    #[test]
    fn parameter_response_rejects_unknown_parameter() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "pivot.csv", PIVOT);
        let args = ParameterResponseArgs {
            input,
            response_key: Some("A-1 2020-01-01 Z1".to_string()),
            well: None,
            date: None,
            zone: None,
            responses: Vec::new(),
            parameter: Some("MULT".to_string()),
            mode: ModeArg::ParamVsSim,
            exclude: vec!["ENSEMBLE".to_string()],
            top: None,
            output: Some(dir.path().join("response.json")),
        };
        let err = parameter_response(args, &AnalysisConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("MULT"), "{err:#}");
    }
}
