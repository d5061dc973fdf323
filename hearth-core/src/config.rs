//! runtime configs

pub mod cli {
    //! Parse from either cli or env var

    /// the default path to the coordination config
    pub static DEFAULT_CONFIG_PATH: &str = "/etc/hearth/config.yaml";
    /// default path of the json parent store
    pub static DEFAULT_STORE_PATH: &str = "/var/lib/hearth/parents.json";
    /// tokio worker thread name
    pub static DEFAULT_THREAD_NAME: &str = "hearth-worker";
    /// default log level. Can use this argument or HEARTH_LOG env var
    pub const DEFAULT_HEARTH_LOG: &str = "info";

    use std::path::PathBuf;

    pub use clap::Parser;

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "hearth", bin_name = "hearth", about, long_about = None)]
    /// parses from cli & environment var. hearth will load `.env` in the working dir as well
    pub struct Config {
        /// path to the coordination config (yaml or json). Defaults are used if it's missing
        #[clap(
            short,
            long,
            value_parser,
            env,
            default_value = DEFAULT_CONFIG_PATH
        )]
        pub config_path: PathBuf,
        /// path to the json file holding parent records
        #[clap(short, long, env, value_parser, default_value = DEFAULT_STORE_PATH)]
        pub store_path: PathBuf,
        /// Worker thread name
        #[clap(long, env, value_parser, default_value = DEFAULT_THREAD_NAME)]
        pub thread_name: String,
        /// number of tokio worker threads, defaults to the number of logical CPUs
        #[clap(long, env, value_parser)]
        pub threads: Option<usize>,
        /// set the log level. All valid RUST_LOG arguments are accepted
        #[clap(long, env, value_parser, default_value = DEFAULT_HEARTH_LOG)]
        pub hearth_log: String,
    }
}

pub mod trace {
    //! tracing configuration
    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    use crate::env::parse_var_with_err;

    /// log as "json", "pretty" or "standard" (unstructured)
    static DEFAULT_LOG_FORMAT: &str = "standard";

    /// Configuration for the global tracing subscriber
    #[derive(Debug)]
    pub struct Config {
        /// formatting to apply to logs
        pub log_frmt: String,
    }

    impl Config {
        /// Install the global subscriber. Log level comes from HEARTH_LOG,
        /// format from LOG_FORMAT
        pub fn parse(hearth_log: &str) -> Result<Self> {
            let log_frmt: String = parse_var_with_err("LOG_FORMAT", DEFAULT_LOG_FORMAT)?;

            let filter = EnvFilter::try_new(hearth_log).or_else(|_| EnvFilter::try_new("info"))?;

            // logs go to stderr, stdout is reserved for command output
            match &log_frmt[..] {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_writer(std::io::stderr))
                        .init();
                }
                "pretty" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            fmt::layer()
                                .event_format(
                                    Format::default().pretty().with_source_location(false),
                                )
                                .fmt_fields(PrettyFields::new())
                                .with_writer(std::io::stderr),
                        )
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_writer(std::io::stderr))
                        .init();
                }
            }

            Ok(Self { log_frmt })
        }
    }
}
