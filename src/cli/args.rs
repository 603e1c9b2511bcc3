use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::processors::{EncodingPolicy, OverridePolicy};

#[derive(Parser)]
#[command(name = "badspot-predictor")]
#[command(about = "Predict LTE coverage badspots from drive-test spreadsheets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Configuration file [default: badspot.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

/// Signal-quality override rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Non-badspot when RSRP >= -80 and RSRQ >= -10
    RsrpAndRsrq,
    /// Non-badspot when RSRQ > -15
    RsrqOnly,
}

impl From<PolicyArg> for OverridePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::RsrpAndRsrq => OverridePolicy::rsrp_and_rsrq(),
            PolicyArg::RsrqOnly => OverridePolicy::rsrq_only(),
        }
    }
}

/// Handling of Cat values the encoder has never seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnseenArg {
    /// Reject the whole batch
    Reject,
    /// Drop the affected rows
    Drop,
}

impl From<UnseenArg> for EncodingPolicy {
    fn from(arg: UnseenArg) -> Self {
        match arg {
            UnseenArg::Reject => EncodingPolicy::RejectBatch,
            UnseenArg::Drop => EncodingPolicy::DropRows,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict badspots for a spreadsheet of measurements
    Predict {
        #[arg(short, long, help = "Input file (.xlsx, .xls, .ods or .csv)")]
        input: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file, .csv or .parquet [default: output/badspot-predictions-{YYMMDD}.csv]"
        )]
        output: Option<PathBuf>,

        #[arg(
            short,
            long,
            help = "Map HTML file [default: output/badspot-map-{YYMMDD}.html]"
        )]
        map: Option<PathBuf>,

        #[arg(long, default_value = "false", help = "Skip map rendering")]
        no_map: bool,

        #[arg(long, help = "Service-account JSON key file (overrides the environment)")]
        credentials: Option<PathBuf>,

        #[arg(long, value_enum, help = "Override rule [default: from config]")]
        policy: Option<PolicyArg>,

        #[arg(long, value_enum, help = "Unseen Cat handling [default: from config]")]
        on_unseen: Option<UnseenArg>,

        #[arg(short, long, help = "Parquet compression [default: from config]")]
        compression: Option<String>,

        #[arg(long, default_value = "false", help = "Upload the labeled CSV to the bucket")]
        publish: bool,

        #[arg(long, default_value = "10", help = "Number of labeled rows to print")]
        show: usize,
    },

    /// Check an input file against the required columns without predicting
    Validate {
        #[arg(short, long, help = "Input file (.xlsx, .xls, .ods or .csv)")]
        input: PathBuf,
    },

    /// Connect to storage and describe the model artifacts
    Artifacts {
        #[arg(long, help = "Service-account JSON key file (overrides the environment)")]
        credentials: Option<PathBuf>,
    },

    /// Display information about a Parquet output file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },

    /// Interactive session: connect, upload, predict, map, export, publish
    Shell {
        #[arg(long, help = "Service-account JSON key file (overrides the environment)")]
        credentials: Option<PathBuf>,
    },
}
