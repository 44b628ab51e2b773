use clap::{Args, Parser, Subcommand, ValueEnum};
use ensemble_stats::parameter_response::CorrelationMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ensemble-stats",
    version,
    about = "Ensemble vector statistics and parameter correlation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Per-timestamp MEAN/MIN/MAX/P10/P90/P50 of every vector.
    Statistics(StatisticsArgs),
    /// Pearson correlation of every column against a target column.
    Correlate(CorrelateArgs),
    /// Parameter vs. simulated response analysis for one well/date/zone.
    ParameterResponse(ParameterResponseArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics output; `long` writes one row per (timestamp, vector, statistic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatisticsFormat {
    #[default]
    Csv,
    Long,
    Json,
}

impl StatisticsFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Long => "long",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for StatisticsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    #[default]
    SimVsParam,
    ParamVsSim,
}

impl From<ModeArg> for CorrelationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::SimVsParam => CorrelationMode::SimVsParam,
            ModeArg::ParamVsSim => CorrelationMode::ParamVsSim,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatisticsArgs {
    #[arg(long)]
    pub input: PathBuf,
    #[arg(long)]
    pub time_column: Option<String>,
    #[arg(long)]
    pub id_column: Option<String>,
    /// Restrict to these vectors (repeatable). Default: every other column.
    #[arg(long = "vector")]
    pub vectors: Vec<String>,
    /// Compute separate statistics per value of these columns (repeatable), e.g. SATNUM.
    #[arg(long = "group-by")]
    pub group_by: Vec<String>,
    #[arg(long, value_enum, default_value_t = StatisticsFormat::Csv)]
    pub format: StatisticsFormat,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CorrelateArgs {
    #[arg(long)]
    pub input: PathBuf,
    #[arg(long)]
    pub target: String,
    /// Columns left out of the correlation (repeatable). Read as text.
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,
    /// Sort by absolute coefficient instead of column order.
    #[arg(long, default_value_t = false)]
    pub ranked: bool,
    /// Keep the n strongest entries; implies `--ranked`.
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ParameterResponseArgs {
    #[arg(long)]
    pub input: PathBuf,
    /// Selected response column. Alternative to `--well/--date/--zone`.
    #[arg(
        long,
        required_unless_present_all = ["well", "date", "zone"],
        conflicts_with_all = ["well", "date", "zone"]
    )]
    pub response_key: Option<String>,
    #[arg(long, requires_all = ["date", "zone"])]
    pub well: Option<String>,
    #[arg(long, requires_all = ["well", "zone"])]
    pub date: Option<String>,
    #[arg(long, requires_all = ["well", "date"])]
    pub zone: Option<String>,
    /// Simulated response columns (repeatable). Default: the response key only.
    #[arg(long = "response")]
    pub responses: Vec<String>,
    #[arg(long)]
    pub parameter: Option<String>,
    #[arg(long, value_enum, default_value_t = ModeArg::SimVsParam)]
    pub mode: ModeArg,
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("ensemble-stats").chain(args.iter().copied()))
    }

    #[test]
    fn statistics_accepts_repeated_partition_columns() {
        let cli = parse(&[
            "statistics",
            "--input",
            "relperm.csv",
            "--time-column",
            "SW",
            "--group-by",
            "ENSEMBLE",
            "--group-by",
            "SATNUM",
            "--format",
            "long",
        ])
        .unwrap();
        let Commands::Statistics(args) = cli.command else {
            panic!("expected statistics");
        };
        assert_eq!(args.group_by, vec!["ENSEMBLE", "SATNUM"]);
        assert_eq!(args.format, StatisticsFormat::Long);
    }

    #[test]
    fn response_is_selected_by_key_or_by_well_date_zone() {
        let cli = parse(&[
            "parameter-response",
            "--input",
            "pivot.csv",
            "--well",
            "A-1",
            "--date",
            "2020-01-01",
            "--zone",
            "Z1",
            "--mode",
            "param-vs-sim",
        ])
        .unwrap();
        let Commands::ParameterResponse(args) = cli.command else {
            panic!("expected parameter-response");
        };
        assert_eq!(args.well.as_deref(), Some("A-1"));
        assert_eq!(args.response_key, None);
        assert_eq!(args.mode, ModeArg::ParamVsSim);

        assert!(parse(&["parameter-response", "--input", "pivot.csv"]).is_err());
        assert!(parse(&[
            "parameter-response",
            "--input",
            "pivot.csv",
            "--well",
            "A-1",
            "--zone",
            "Z1",
        ])
        .is_err());
        assert!(parse(&[
            "parameter-response",
            "--input",
            "pivot.csv",
            "--response-key",
            "A-1 2020-01-01 Z1",
            "--well",
            "A-1",
            "--date",
            "2020-01-01",
            "--zone",
            "Z1",
        ])
        .is_err());
    }
}
