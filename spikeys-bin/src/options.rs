use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{fs, time::Duration};

use anyhow::{Context, Error, Result, anyhow};
use clap::{
    Parser,
    builder::{PossibleValuesParser, TypedValueParser},
};
use const_format::{concatcp, formatcp};
use http::{
    HeaderMap,
    header::{HeaderName, HeaderValue},
};
use serde::{Deserialize, Deserializer};
use spikeys_lib::{
    BenchmarkConfig, DEFAULT_BENCHMARK_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_REDIRECTS, DEFAULT_REQUEST_COUNT, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, PerformerBuilder,
};
use strum::{Display, VariantNames};

use crate::verbosity::Verbosity;

pub(crate) const SPIKEYS_CONFIG_FILE: &str = "spikeys.toml";

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const REQUESTS_STR: &str = concatcp!(DEFAULT_REQUEST_COUNT);
const CONCURRENCY_STR: &str = concatcp!(DEFAULT_MAX_CONCURRENCY);
const TIMELIMIT_STR: &str = concatcp!(DEFAULT_BENCHMARK_TIMEOUT_SECS);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_REQUEST_TIMEOUT_SECS);
const MAX_REDIRECTS_STR: &str = concatcp!(DEFAULT_MAX_REDIRECTS);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    SPIKEYS_CONFIG_FILE,
);

/// The format to use for the final benchmark report
#[derive(Debug, Deserialize, Default, Clone, Copy, Display, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum StatsFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for StatsFormat {
    type Err = Error;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "compact" => Ok(StatsFormat::Compact),
            "json" => Ok(StatsFormat::Json),
            _ => Err(anyhow!("Unknown format {format}")),
        }
    }
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    requests: usize = DEFAULT_REQUEST_COUNT;
    concurrency: usize = DEFAULT_MAX_CONCURRENCY;
    timelimit: u64 = DEFAULT_BENCHMARK_TIMEOUT_SECS;
    timeout: u64 = DEFAULT_REQUEST_TIMEOUT_SECS;
    max_redirects: usize = DEFAULT_MAX_REDIRECTS;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Parse a single header into a [`HeaderName`] and [`HeaderValue`]
///
/// Headers are expected to be in format `Header-Name: Header-Value`.
/// The header name and value are trimmed of whitespace.
///
/// If the header contains multiple colons, the part after the first colon is
/// considered the value.
///
/// # Errors
///
/// This fails if the header does not contain a `:` character or
/// if the header name contains non-ASCII characters.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let parts: Vec<&str> = header.splitn(2, ':').collect();
    match parts.as_slice() {
        [name, value] => {
            let name = name.trim();
            let name = HeaderName::from_str(name)
                .map_err(|e| anyhow!("Unable to convert header name '{name}': {e}"))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
            Ok((name, value))
        }
        _ => Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        )),
    }
}

/// Parses a single HTTP header into a tuple of (String, String)
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let invalid = |msg: String| clap::Error::raw(clap::error::ErrorKind::InvalidValue, msg);

        let header_str = value
            .to_str()
            .ok_or_else(|| invalid("Header value contains invalid UTF-8".to_string()))?;
        let (name, value) = parse_single_header(header_str).map_err(|e| invalid(e.to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| invalid("Header value contains invalid UTF-8".to_string()))?;

        Ok((name.to_string(), value.to_string()))
    }
}

impl clap::builder::ValueParserFactory for HeaderParser {
    type Parser = HeaderParser;
    fn value_parser() -> Self::Parser {
        HeaderParser
    }
}

/// Extension trait for converting a Vec of header pairs to a `HeaderMap`
pub(crate) trait HeaderMapExt {
    /// Convert a collection of header key-value pairs to a `HeaderMap`
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value '{value}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// spikeys sends a number of GET requests to a URL, a few at a time, and
/// reports latency and throughput of the target.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct SpikeysOptions {
    /// Absolute URL to benchmark, e.g. `http://localhost:8080/path`
    #[arg(name = "url", value_name = "URL")]
    pub(crate) url: String,

    /// Configuration file to use
    #[arg(long = "config", value_name = "PATH")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl SpikeysOptions {
    /// Validate the merged options into the configuration of a run
    pub(crate) fn benchmark_config(&self) -> Result<BenchmarkConfig> {
        let cfg = &self.config;
        Ok(BenchmarkConfig::new(
            &self.url,
            cfg.requests,
            cfg.concurrency,
            Duration::from_secs(cfg.timeout),
            Duration::from_secs(cfg.timelimit),
        )?)
    }
}

/// The main configuration for spikeys
#[derive(Parser, Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Number of requests to perform
    #[arg(short = 'n', long, value_name = "COUNT", default_value = &REQUESTS_STR)]
    #[serde(default = "requests")]
    pub(crate) requests: usize,

    /// Number of requests to run in parallel
    #[arg(short = 'c', long, value_name = "COUNT", default_value = &CONCURRENCY_STR)]
    #[serde(default = "concurrency")]
    pub(crate) concurrency: usize,

    /// Seconds the whole benchmark may take before it is aborted
    #[arg(short = 't', long, value_name = "SECONDS", default_value = &TIMELIMIT_STR)]
    #[serde(default = "timelimit")]
    pub(crate) timelimit: u64,

    /// Seconds a single request may take before the benchmark is aborted
    #[arg(short = 's', long, value_name = "SECONDS", default_value = &TIMEOUT_STR)]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long,
        action = clap::ArgAction::Append,
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

Specify custom headers in the format 'Name: Value', e.g. 'Accept: text/html'.
Multiple headers can be specified by using the flag multiple times.
The specified headers are used for ALL requests."
    )]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Maximum number of redirects followed per request
    #[arg(long, default_value = &MAX_REDIRECTS_STR)]
    #[serde(default = "max_redirects")]
    pub(crate) max_redirects: usize,

    /// Output format of the final report
    #[arg(short, long, default_value = "compact", value_parser = PossibleValuesParser::new(StatsFormat::VARIANTS).map(|s| s.parse::<StatsFormat>().unwrap()))]
    #[serde(default)]
    pub(crate) format: StatsFormat,

    /// Write the report to the given file instead of stdout
    #[arg(short, long, value_parser)]
    #[serde(default)]
    pub(crate) output: Option<PathBuf>,
}

impl Config {
    /// Special handling for merging headers
    ///
    /// Overwrites existing headers in `self` with the values from `other`.
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let self_map = self.header.iter().cloned().collect::<HashMap<_, _>>();
        let other_map = other.iter().cloned().collect::<HashMap<_, _>>();

        // Merge the two maps, with `other` taking precedence
        let merged_map: HashMap<_, _> = self_map.into_iter().chain(other_map).collect();

        // Convert the merged map back to a Vec of tuples
        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        self.merge_headers(&toml.header);

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,

                // Keys with defaults to assign
                verbose: Verbosity::default(),
                requests: DEFAULT_REQUEST_COUNT,
                concurrency: DEFAULT_MAX_CONCURRENCY,
                timelimit: DEFAULT_BENCHMARK_TIMEOUT_SECS,
                timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT,
                max_redirects: DEFAULT_MAX_REDIRECTS,
                format: StatsFormat::default(),
                output: None,
            }
        }
    }

    /// Builder for the performer sending the requests
    pub(crate) fn performer_builder(&self) -> Result<PerformerBuilder> {
        Ok(PerformerBuilder::builder()
            .user_agent(self.user_agent.clone())
            .custom_headers(HeaderMap::from_header_pairs(&self.header)?)
            .max_redirects(self.max_redirects)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use spikeys_lib::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> SpikeysOptions {
        SpikeysOptions::parse_from(std::iter::once("spikeys").chain(args.iter().copied()))
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        SpikeysOptions::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&["http://validUrl.com"]);
        let config = opts.benchmark_config().unwrap();

        assert_eq!(config.request_count(), DEFAULT_REQUEST_COUNT);
        assert_eq!(config.max_concurrency(), DEFAULT_MAX_CONCURRENCY);
        assert_eq!(
            config.benchmark_timeout(),
            Duration::from_secs(DEFAULT_BENCHMARK_TIMEOUT_SECS)
        );
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(opts.config.format, StatsFormat::Compact);
    }

    #[test]
    fn test_format_values() {
        use clap::CommandFactory;

        assert_eq!(StatsFormat::VARIANTS.to_vec(), vec!["compact", "json"]);
        assert_eq!(
            parse(&["-f", "json", "http://localhost"]).config.format,
            StatsFormat::Json
        );
        assert!(
            SpikeysOptions::try_parse_from(["spikeys", "--format", "xml", "http://localhost"])
                .is_err()
        );

        let help = SpikeysOptions::command().render_long_help().to_string();
        assert!(help.contains("[possible values: compact, json]"));
    }

    #[test]
    fn test_all_flags() {
        let opts = parse(&[
            "--requests=50",
            "--concurrency=5",
            "--timelimit=120",
            "--timeout=10",
            "https://example.com",
        ]);
        let config = opts.benchmark_config().unwrap();

        assert_eq!(config.url().as_str(), "https://example.com/");
        assert_eq!(config.request_count(), 50);
        assert_eq!(config.max_concurrency(), 5);
        assert_eq!(config.benchmark_timeout(), Duration::from_secs(120));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_short_flags() {
        let opts = parse(&["-n", "7", "-c", "3", "-t", "9", "-s", "2", "http://localhost"]);
        assert_eq!(opts.config.requests, 7);
        assert_eq!(opts.config.concurrency, 3);
        assert_eq!(opts.config.timelimit, 9);
        assert_eq!(opts.config.timeout, 2);
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("--requests=0", "invalid request count: must be greater than 0"),
            ("--concurrency=0", "invalid concurrency: must be greater than 0"),
            ("--timelimit=0", "invalid benchmark timeout: must be greater than 0"),
            ("--timeout=0", "invalid request timeout: must be greater than 0"),
        ];
        for (flag, expected) in cases {
            let err = parse(&[flag, "https://example.com"])
                .benchmark_config()
                .unwrap_err();
            assert!(err.to_string().contains(expected), "{flag}: {err}");
            assert!(err.downcast_ref::<ErrorKind>().is_some_and(ErrorKind::is_config_error));
        }
    }

    #[test]
    fn test_invalid_url() {
        let err = parse(&["example.com"]).benchmark_config().unwrap_err();
        assert_eq!(err.to_string(), "invalid url value: example.com");
    }

    #[test]
    fn test_negative_count_is_rejected_by_parser() {
        let result = SpikeysOptions::try_parse_from(["spikeys", "-n", "-3", "http://localhost"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_custom_headers() {
        assert_eq!(
            parse_single_header("accept:text/html").unwrap(),
            (
                HeaderName::from_static("accept"),
                HeaderValue::from_static("text/html")
            )
        );
        assert_eq!(
            parse_single_header("key:x-test:check=this").unwrap(),
            (
                HeaderName::from_static("key"),
                HeaderValue::from_static("x-test:check=this")
            )
        );
        assert!(parse_single_header("no-colon").is_err());
    }

    #[test]
    fn test_header_flags() {
        let opts = parse(&[
            "--header",
            "Accept: text/html",
            "-H",
            "X-Test: check=this",
            "http://localhost",
        ]);
        let header_map: HashMap<String, String> = opts.config.header.iter().cloned().collect();
        assert_eq!(header_map["accept"], "text/html");
        assert_eq!(header_map["x-test"], "check=this");
    }

    #[test]
    fn test_merge_keeps_explicit_cli_values() {
        let toml: Config = toml::from_str(
            r#"
requests = 100
concurrency = 10
timeout = 2
format = "json"

[header]
X-Test = "check=this"
"#,
        )
        .unwrap();

        let mut cli = parse(&["-c", "4", "http://localhost"]).config;
        cli.merge(toml);

        assert_eq!(cli.requests, 100);
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.timeout, 2);
        assert_eq!(cli.timelimit, DEFAULT_BENCHMARK_TIMEOUT_SECS);
        assert_eq!(cli.format, StatsFormat::Json);
        assert_eq!(cli.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(
            cli.header,
            vec![("X-Test".to_string(), "check=this".to_string())]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
requests = 20
concurrency = 4
timelimit = 60
verbose = "info"
format = "json"

[header]
Accept = "application/json"
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.requests, 20);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timelimit, 60);
        assert_eq!(config.timeout, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.format, StatsFormat::Json);
        assert_eq!(config.verbose.log_level(), log::Level::Info);
        assert_eq!(
            config.header,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retries = 3").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }
}
