use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "cask",
    about = "Encrypted local credential store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to listing sections when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List section names.
    List,
    /// Print a section (or one of its fields).
    Get {
        section: String,
        /// Print only this field.
        #[arg(long)]
        field: Option<String>,
    },
    /// Create a section.
    Add {
        section: String,
        /// Field as KEY=VALUE; repeatable. Values are stored as strings.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Field map as a JSON object; `--field` entries are layered on top.
        #[arg(long)]
        json: Option<String>,
        /// Replace the section if it already exists.
        #[arg(long)]
        overwrite: bool,
    },
    /// Replace an existing section's fields wholesale.
    Modify {
        section: String,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        #[arg(long)]
        json: Option<String>,
    },
    /// Remove a section.
    Delete { section: String },
    /// Round-trip a scratch section through the encrypted file.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
