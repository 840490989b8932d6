//! The harness configuration surface.

use std::num::NonZero;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use argh::FromArgs;
use new_zealand::nz;
use thiserror::Error;

use crate::ERR_POISONED_LOCK;

/// Errors arising from invalid configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The arguments did not parse against the recognized option surface.
    #[error("invalid benchmark options: {message}")]
    InvalidArguments { message: String },

    /// An output format was not one of `console`, `json` or `csv`.
    #[error("unexpected format: '{value}'")]
    InvalidFormat { value: String },

    /// A color mode was not `auto` or a recognized boolean value.
    #[error("unexpected color setting: '{value}'")]
    InvalidColor { value: String },

    /// A `--context` entry was not a `key=value` pair.
    #[error("invalid context entry: '{entry}' is not a key=value pair")]
    InvalidContext { entry: String },
}

/// The serialization format of a reporter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(ConfigError::InvalidFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Whether the console reporter colorizes its output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColorMode {
    /// Colorize when writing to a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(Self::Auto),
            "true" | "yes" | "1" => Ok(Self::Always),
            "false" | "no" | "0" => Ok(Self::Never),
            _ => Err(ConfigError::InvalidColor {
                value: value.to_string(),
            }),
        }
    }
}

/// The recognized configuration options and their effective values.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Print matching instance names instead of executing them.
    pub list_tests: bool,

    /// Instance name filter; a regular expression, `-`-prefixed to negate.
    pub filter: String,

    /// The measurement time calibration targets, in seconds.
    pub min_time: f64,

    /// Repetitions per instance, unless a family overrides it.
    pub repetitions: NonZero<usize>,

    /// Shuffle the repetition schedule across instances.
    pub enable_random_interleaving: bool,

    /// Suppress per-repetition runs in every reporter.
    pub report_aggregates_only: bool,

    /// Suppress per-repetition runs in the display reporter only.
    pub display_aggregates_only: bool,

    /// Display reporter format.
    pub format: OutputFormat,

    /// File reporter format.
    pub out_format: OutputFormat,

    /// Path the file reporter writes to.
    pub out: Option<PathBuf>,

    /// Console color handling.
    pub color: ColorMode,

    /// Lay user counters out as console columns instead of inline pairs.
    pub counters_tabular: bool,

    /// Backend-specific hardware counter names to collect.
    pub perf_counters: Vec<String>,

    /// `key=value` pairs merged into the global context.
    pub context: Vec<(String, String)>,

    /// Diagnostic logging verbosity.
    pub verbosity: i32,

    /// Hard upper bound for the calibrated iteration count.
    pub max_iterations: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            list_tests: false,
            filter: ".".to_string(),
            min_time: 0.5,
            repetitions: nz!(1),
            enable_random_interleaving: false,
            report_aggregates_only: false,
            display_aggregates_only: false,
            format: OutputFormat::Console,
            out_format: OutputFormat::Json,
            out: None,
            color: ColorMode::Auto,
            counters_tabular: false,
            perf_counters: Vec::new(),
            context: Vec::new(),
            verbosity: 0,
            max_iterations: 1_000_000_000,
        }
    }
}

/// Runs registered benchmarks after measuring each body over a calibrated
/// number of iterations.
#[derive(Debug, FromArgs)]
struct Flags {
    /// print a list of benchmarks and skip execution
    #[argh(switch)]
    list_tests: bool,

    /// regular expression selecting the benchmarks to execute; prefix with
    /// '-' to negate
    #[argh(option)]
    filter: Option<String>,

    /// minimum measurement time per benchmark, in seconds
    #[argh(option)]
    min_time: Option<f64>,

    /// number of repetitions of each benchmark
    #[argh(option)]
    repetitions: Option<NonZero<usize>>,

    /// randomly interleave repetitions across benchmarks
    #[argh(switch)]
    enable_random_interleaving: bool,

    /// report only aggregate results in every reporter
    #[argh(switch)]
    report_aggregates_only: bool,

    /// report only aggregate results in the display reporter
    #[argh(switch)]
    display_aggregates_only: bool,

    /// display output format: console, json or csv
    #[argh(option)]
    format: Option<String>,

    /// file output format: console, json or csv
    #[argh(option)]
    out_format: Option<String>,

    /// file to write additional output to
    #[argh(option)]
    out: Option<PathBuf>,

    /// whether to color console output: auto, true or false
    #[argh(option)]
    color: Option<String>,

    /// lay user counters out as console columns
    #[argh(switch)]
    counters_tabular: bool,

    /// comma-separated hardware counter names to collect
    #[argh(option)]
    perf_counters: Option<String>,

    /// comma-separated key=value pairs added to the output context
    #[argh(option)]
    context: Option<String>,

    /// diagnostic logging verbosity
    #[argh(option, default = "0")]
    v: i32,

    /// hard upper bound for the calibrated iteration count
    #[argh(option)]
    max_iterations: Option<NonZero<u64>>,

    /// arguments the harness does not interpret, handed back to the caller
    #[argh(positional, greedy)]
    rest: Vec<String>,
}

impl Settings {
    /// Parses command-line arguments (without the program name) into
    /// settings, returning the arguments the harness did not consume.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<(Self, Vec<String>), ConfigError> {
        let arg_refs: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

        let flags = Flags::from_args(&["bench_press"], &arg_refs).map_err(|early_exit| {
            ConfigError::InvalidArguments {
                message: early_exit.output.trim().to_string(),
            }
        })?;

        let mut settings = Self::default();
        settings.list_tests = flags.list_tests;
        if let Some(filter) = flags.filter {
            settings.filter = filter;
        }
        if let Some(min_time) = flags.min_time {
            settings.min_time = min_time;
        }
        if let Some(repetitions) = flags.repetitions {
            settings.repetitions = repetitions;
        }
        settings.enable_random_interleaving = flags.enable_random_interleaving;
        settings.report_aggregates_only = flags.report_aggregates_only;
        settings.display_aggregates_only = flags.display_aggregates_only;
        if let Some(format) = flags.format {
            settings.format = format.parse()?;
        }
        if let Some(out_format) = flags.out_format {
            settings.out_format = out_format.parse()?;
        }
        settings.out = flags.out;
        if let Some(color) = flags.color {
            settings.color = color.parse()?;
        }
        settings.counters_tabular = flags.counters_tabular;
        if let Some(perf_counters) = flags.perf_counters {
            settings.perf_counters = perf_counters
                .split(',')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(context) = flags.context {
            settings.context = parse_context_pairs(&context)?;
        }
        settings.verbosity = flags.v;
        if let Some(max_iterations) = flags.max_iterations {
            settings.max_iterations = max_iterations.get();
        }

        Ok((settings, flags.rest))
    }
}

fn parse_context_pairs(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| ConfigError::InvalidContext {
                    entry: entry.to_string(),
                })
        })
        .collect()
}

static GLOBAL_SETTINGS: Mutex<Option<Settings>> = Mutex::new(None);

pub(crate) fn set_global_settings(settings: Settings) {
    *GLOBAL_SETTINGS.lock().expect(ERR_POISONED_LOCK) = Some(settings);
}

/// A snapshot of the settings established by [`initialize`](crate::initialize),
/// or the defaults when initialization never ran.
pub(crate) fn global_settings() -> Settings {
    GLOBAL_SETTINGS
        .lock()
        .expect(ERR_POISONED_LOCK)
        .clone()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let settings = Settings::default();

        assert_eq!(settings.filter, ".");
        assert_eq!(settings.min_time, 0.5);
        assert_eq!(settings.repetitions, nz!(1));
        assert_eq!(settings.format, OutputFormat::Console);
        assert_eq!(settings.out_format, OutputFormat::Json);
        assert_eq!(settings.color, ColorMode::Auto);
        assert_eq!(settings.max_iterations, 1_000_000_000);
    }

    #[test]
    fn options_parse_into_settings() {
        let (settings, rest) = Settings::from_args(&[
            "--filter",
            "BM_Foo",
            "--min-time",
            "2.5",
            "--repetitions",
            "9",
            "--enable-random-interleaving",
            "--format",
            "json",
            "--counters-tabular",
            "--perf-counters",
            "cycles,instructions",
            "--context",
            "branch=main,host=ci",
        ])
        .unwrap();

        assert_eq!(settings.filter, "BM_Foo");
        assert_eq!(settings.min_time, 2.5);
        assert_eq!(settings.repetitions.get(), 9);
        assert!(settings.enable_random_interleaving);
        assert_eq!(settings.format, OutputFormat::Json);
        assert!(settings.counters_tabular);
        assert_eq!(settings.perf_counters, vec!["cycles", "instructions"]);
        assert_eq!(
            settings.context,
            vec![
                ("branch".to_string(), "main".to_string()),
                ("host".to_string(), "ci".to_string()),
            ]
        );
        assert!(rest.is_empty());
    }

    #[test]
    fn unconsumed_positionals_are_returned() {
        let (_, rest) = Settings::from_args(&["--list-tests", "3"]).unwrap();

        assert_eq!(rest, vec!["3"]);
    }

    #[test]
    fn invalid_format_is_rejected() {
        let error = Settings::from_args(&["--format", "yaml"]).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidFormat { value } if value == "yaml"));
    }

    #[test]
    fn invalid_color_is_rejected() {
        let error = Settings::from_args(&["--color", "sometimes"]).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidColor { .. }));
    }

    #[test]
    fn malformed_context_entry_is_rejected() {
        let error = Settings::from_args(&["--context", "justakey"]).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidContext { .. }));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Settings::from_args(&["--no-such-option"]).is_err());
    }
}
