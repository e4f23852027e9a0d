//! This module defines the command line arguments we accept.

use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::cmd;


#[derive(Debug, clap::Parser)]
#[clap(about = "Small GraphQL server with two nested, static records.")]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors and other styling in the output. One of
    /// `auto`, `always` or `never`.
    #[clap(long, global = true, default_value = "auto", value_parser = parse_color_choice)]
    pub(crate) color: ColorChoice,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks the config and the API schema and whether the configured
    /// address can be bound. Exits with 0 if everything is Ok, and with 1
    /// otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions of all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        #[clap(flatten)]
        args: cmd::export_api_schema::Args,
    },
}

impl Command {
    /// Name used in log file paths (`${cmd}`).
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Check { .. } => "check",
            _ => "other",
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, we try
    /// opening `config.toml` or `/etc/graphql-layers/config.toml` and fall
    /// back to default values if neither exists.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

impl Args {
    /// Color choice for stdout, resolving `auto` by checking for a terminal.
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        resolve_color(self.color, std::io::stdout())
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        resolve_color(self.color, std::io::stderr())
    }
}

fn resolve_color(choice: ColorChoice, stream: impl std::io::IsTerminal) -> ColorChoice {
    match choice {
        ColorChoice::Auto if !stream.is_terminal() => ColorChoice::Never,
        other => other,
    }
}

fn parse_color_choice(s: &str) -> Result<ColorChoice, String> {
    match s {
        "auto" => Ok(ColorChoice::Auto),
        "always" => Ok(ColorChoice::Always),
        "never" => Ok(ColorChoice::Never),
        other => Err(format!("invalid color choice '{other}' (valid: auto, always, never)")),
    }
}
