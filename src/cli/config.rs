use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{
    ai_model::{DEFAULT_ENDPOINT, DEFAULT_MODEL},
    config::AgentConfig,
    error::AgentResult,
};

pub const DEFAULT_CONFIG_PATH: &str = "mobile-agent.yaml";
pub const DEFAULT_TOKEN_ENV: &str = "HUGGINGFACE_API_TOKEN";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "mobile-agent",
    version,
    about = "Drive an Android app towards a natural-language goal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: mobile-agent.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one task on the attached device
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Natural-language instruction, e.g. "search for shoes on flipkart"
    #[arg(long)]
    pub task: String,

    /// Target app identifier or package (detected from the task if omitted)
    #[arg(long)]
    pub app: Option<String>,

    /// Maximum executed actions before giving up
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Primary strategy backend
    #[arg(long, value_enum, default_value_t = InferenceMode::Chat)]
    pub inference: InferenceMode,

    /// adb device serial (first attached device if omitted)
    #[arg(long)]
    pub serial: Option<String>,

    /// Append one JSON line per step to this file
    #[arg(long)]
    pub trace: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InferenceMode {
    /// Vision model over an OpenAI-compatible chat-completions endpoint
    Chat,
    /// No reasoning service; structural and last-resort strategies only
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Console,
    Json,
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `mobile-agent.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            token_env: default_token_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub serial: Option<String>,

    #[serde(default = "default_adb")]
    pub adb_binary: String,

    /// Pause after each input so the UI can settle before the next capture
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            adb_binary: default_adb(),
            settle_ms: default_settle_ms(),
        }
    }
}

// Serde default helpers
fn default_endpoint() -> String { DEFAULT_ENDPOINT.to_string() }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_token_env() -> String { DEFAULT_TOKEN_ENV.to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 300 }
fn default_adb() -> String { "adb".to_string() }
fn default_settle_ms() -> u64 { 1500 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Parse a YAML config document. Absent sections and fields take defaults.
pub fn parse_config(content: &str) -> AgentResult<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Load config from a YAML file. A missing file yields defaults; a
/// malformed one is an error.
pub fn load_config(path: Option<&str>) -> AgentResult<AppConfig> {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = config_path, "no config file, using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Apply CLI overrides to the agent section and validate the result.
pub fn build_agent_config(config: &AppConfig, args: &RunArgs) -> AgentResult<AgentConfig> {
    let mut agent = config.agent.clone();
    if let Some(max_steps) = args.max_steps {
        agent.max_steps = max_steps;
    }
    agent.validate()?;
    Ok(agent)
}
