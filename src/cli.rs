use clap::ValueHint;

use std::path::PathBuf;

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file.
    ///
    /// By default, nexbrief looks for a file named `nexbrief.toml` in the following directories
    /// (in order):
    ///
    /// - `./` (the current directory)
    /// - `/etc`
    #[arg(
        short,
        env = "NEXBRIEF_CONFIG",
        value_hint(ValueHint::FilePath)
    )]
    pub config_path: Option<PathBuf>,

    /// HTTP server address to bind to.
    #[arg(long, env = "NEXBRIEF_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Path to the database file.
    #[arg(long, env = "NEXBRIEF_DB", value_hint(ValueHint::FilePath))]
    pub db_path: Option<PathBuf>,

    /// API key for the news provider.
    #[arg(long, env = "NEXBRIEF_NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// API key for the LLM chat completion API.
    #[arg(long, env = "NEXBRIEF_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Model identifier passed to the LLM chat completion API.
    #[arg(long, env = "NEXBRIEF_LLM_MODEL")]
    pub llm_model: Option<String>,
}

impl Args {
    pub fn parse() -> Self {
        clap::Parser::parse()
    }
}
