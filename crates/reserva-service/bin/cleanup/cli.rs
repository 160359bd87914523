use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};

pub const MYSQL_DSN_ENV: &str = "RESERVA_MYSQL_DSN";
pub const LOG_FORMAT_ENV: &str = "RESERVA_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "pretty")]
    Pretty,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Pretty => write!(f, "pretty"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "reserva-cleanup")]
pub struct CLI {
    #[arg(long, env = MYSQL_DSN_ENV)]
    pub mysql_dsn: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Pretty
    )]
    pub log_format: LogFormatArg,

    /// Create the `reserved_values` table before purging, if it is missing.
    #[arg(long, default_value_t = false)]
    pub ensure_schema: bool,
}
