//! Operator commands.
//!
//! A line like `!map shippuden -> naruto` is parsed into a [`Command`] and
//! executed against the service. The leading `!` or `/` is optional.

use std::fmt::Write as _;
use thiserror::Error;
use tracing::info;

use crate::service::WatcherService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    /// Show all aliases
    ListMappings,
    AddMapping { alias: String, series: String },
    /// Rebuild the index and run a deep pass
    Reload,
    Check { deep: bool },
    Stop,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command `{0}`, try `!help`")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

const MAP_USAGE: &str = "!map <name in downloads> -> <series name on the server>";

pub const HELP: &str = "\
!help                      show this help
!ping                      check that the watcher is alive
!map                       list all mappings
!map <alt> -> <series>     map a download name onto a library folder
!reload                    rescan the libraries and re-check quarantined files
!check                     check the download folder now
!check deep                also re-check quarantined files
!stop                      stop the watcher";

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let line = line
        .strip_prefix('!')
        .or_else(|| line.strip_prefix('/'))
        .unwrap_or(line)
        .trim_start();

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name.to_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "help" => Ok(Command::Help),
        "ping" => Ok(Command::Ping),
        "reload" => Ok(Command::Reload),
        "stop" | "shutdown" => Ok(Command::Stop),
        "check" => match rest {
            "" => Ok(Command::Check { deep: false }),
            deep if deep.eq_ignore_ascii_case("deep") => Ok(Command::Check { deep: true }),
            _ => Err(CommandError::Usage("!check [deep]")),
        },
        "map" => parse_map(rest),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// `map`, `map all`, `map <alt> -> <series>` or `map new alt:<alt> og:<series>`
fn parse_map(rest: &str) -> Result<Command, CommandError> {
    if rest.is_empty() || rest.eq_ignore_ascii_case("all") {
        return Ok(Command::ListMappings);
    }

    let (alias, series) = if let Some((alias, series)) = rest.split_once("->") {
        (alias, series)
    } else if let Some(options) = rest.strip_prefix("new ") {
        let options = options.trim();
        let (alias, series) = options
            .strip_prefix("alt:")
            .and_then(|o| o.split_once(" og:"))
            .ok_or(CommandError::Usage(MAP_USAGE))?;
        (alias, series)
    } else {
        return Err(CommandError::Usage(MAP_USAGE));
    };

    let (alias, series) = (alias.trim(), series.trim());
    if alias.is_empty() || series.is_empty() {
        return Err(CommandError::Usage(MAP_USAGE));
    }
    Ok(Command::AddMapping {
        alias: alias.to_string(),
        series: series.to_string(),
    })
}

/// Run a command and return the reply for the operator
///
/// Blocks while a pass is running. `Stop` only acknowledges, shutting
/// down is up to the caller.
pub fn execute(service: &WatcherService, command: &Command) -> String {
    match command {
        Command::Help => HELP.to_string(),
        Command::Ping => "Pong!".to_string(),
        Command::ListMappings => format_mappings(service),
        Command::AddMapping { alias, series } => match service.add_alias(alias, series) {
            Ok(path) => {
                let mut reply = format!("Mapped `{}` to `{}`", alias, path.display());
                if let Err(e) = service.trigger_pass(true) {
                    let _ = write!(reply, ", but checking the downloads failed: {}", e);
                }
                reply
            }
            Err(e) => format!("Could not add the mapping: {}", e),
        },
        Command::Reload => {
            info!("Reloading all directories");
            match service.rebuild_index() {
                Ok(names) => match service.trigger_pass(true) {
                    Ok(report) => format!(
                        "Reloaded all directories ({} names), moved {} files",
                        names, report.moved
                    ),
                    Err(e) => format!("Reloaded all directories, but checking failed: {}", e),
                },
                Err(e) => format!("Could not reload the directories: {}", e),
            }
        }
        Command::Check { deep } => match service.trigger_pass(*deep) {
            Ok(report) if report.is_idle() => "Nothing to do".to_string(),
            Ok(report) => format!(
                "Moved {}, unknown series {}, unparseable {}, without season {}, duplicates {}, failed {}",
                report.moved,
                report.unknown_series,
                report.unparseable,
                report.needs_season,
                report.duplicates,
                report.failed
            ),
            Err(e) => format!("Check failed: {}", e),
        },
        Command::Stop => "Stopping".to_string(),
    }
}

fn format_mappings(service: &WatcherService) -> String {
    let mappings = service.list_known_mappings();
    if mappings.is_empty() {
        return "No mappings".to_string();
    }

    let mut output = String::from("Here are all the mappings:");
    for (series, aliases) in mappings {
        let _ = write!(output, "\n{} : {}", series, aliases.join(", "));
    }
    output
}
