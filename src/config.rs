use clap::Parser;
use serde::Deserialize;
use std::io;
use thiserror::Error;

/// Settings file looked up in the working directory
pub const CONFIG_FILE: &str = "niosim.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read niosim.toml: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse niosim.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No file specified")]
    NoFile,
}

#[derive(Parser, Deserialize, Debug, Default, PartialEq, Eq)]
#[command(author, version, about)]
#[clap(disable_help_flag = true)]
#[serde(default)]
pub struct OptionalConfig {
    #[clap(long, action = clap::ArgAction::HelpLong)]
    help: Option<bool>,

    /// Starts execution at this `.global` label instead of the first instruction
    #[arg(short, long)]
    pub entry: Option<String>,

    /// Stops after this many instructions
    #[arg(short, long)]
    pub max_steps: Option<u64>,

    /// Text fed to the serial port before the program starts
    #[arg(short, long)]
    pub input: Option<String>,

    /// Prints the assembled instructions before running them
    #[arg(long)]
    pub print_instructions: bool,

    /// Prints the final state of the program after execution
    #[arg(long)]
    pub print_state: bool,

    /// The assembly file to execute
    pub file: Option<String>,
}

impl OptionalConfig {
    pub fn get_args() -> Self {
        Self::parse()
    }

    /// Reads [`CONFIG_FILE`], if there is one
    pub fn get_toml() -> Result<Self, ConfigError> {
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(config) => Self::from_toml(&config),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(config: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config)?)
    }

    /// Fields set in `self` win over the ones in `rhs`
    pub fn merge(self, rhs: Self) -> Self {
        Self {
            help: self.help.or(rhs.help),
            entry: self.entry.or(rhs.entry),
            max_steps: self.max_steps.or(rhs.max_steps),
            input: self.input.or(rhs.input),
            print_instructions: self.print_instructions || rhs.print_instructions,
            print_state: self.print_state || rhs.print_state,
            file: self.file.or(rhs.file),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub entry: Option<String>,
    pub max_steps: Option<u64>,
    pub input: String,
    pub print_instructions: bool,
    pub print_state: bool,
    pub file: String,
}

impl TryFrom<OptionalConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: OptionalConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            entry: config.entry,
            max_steps: config.max_steps,
            input: config.input.unwrap_or_default(),
            print_instructions: config.print_instructions,
            print_state: config.print_state,
            file: config.file.ok_or(ConfigError::NoFile)?,
        })
    }
}

impl Config {
    /// Command-line arguments, falling back to [`CONFIG_FILE`]
    pub fn get() -> Result<Self, ConfigError> {
        OptionalConfig::get_args()
            .merge(OptionalConfig::get_toml()?)
            .try_into()
    }
}
