//! Config command - read and change configuration values

use crate::{G4TrackError, cli::ConfigCommands, config::G4TrackConfig};

type Result<T> = std::result::Result<T, G4TrackError>;

/// Execute a config subcommand against `config`, saving changes
///
/// # Errors
///
/// Returns `G4TrackError` for malformed settings, unknown keys, or save failures.
pub fn execute(command: &ConfigCommands, config: &mut G4TrackConfig, quiet: bool) -> Result<()> {
    match command {
        ConfigCommands::Set { setting } => {
            let (key, value) = parse_setting(setting)?;
            config.set(key, value)?;
            config.save()?;
            if !quiet {
                println!("Set {key} = {value}");
            }
        }
        ConfigCommands::Get { key } => {
            let value = config.get(key).ok_or_else(|| {
                G4TrackError::InvalidInput(format!(
                    "Unknown configuration key: '{key}'. Available keys: {}",
                    crate::config::KEYS.join(", ")
                ))
            })?;
            println!("{value}");
        }
        ConfigCommands::Path => {
            println!("{}", G4TrackConfig::config_path()?.display());
        }
    }
    Ok(())
}

/// Split `key=value`, trimming both sides
///
/// # Errors
///
/// Returns `G4TrackError::InvalidInput` if there is no `=`.
pub fn parse_setting(setting: &str) -> Result<(&str, &str)> {
    let (key, value) = setting.split_once('=').ok_or_else(|| {
        G4TrackError::InvalidInput("Invalid format. Use: g4track config set key=value".into())
    })?;
    Ok((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting("workers = 4").unwrap(), ("workers", "4"));
        assert_eq!(
            parse_setting("codec_command=a {input} --x=1 {output}").unwrap(),
            ("codec_command", "a {input} --x=1 {output}")
        );
        assert!(parse_setting("workers").is_err());
    }
}
