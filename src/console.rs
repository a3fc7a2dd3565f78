// Line-based command console for playing from a terminal.

use thiserror::Error;

use crate::engine::attack::AttackRequest;
use crate::engine::monster::MonsterId;
use crate::engine::server::EngineCommand;

/// What the user typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Engine(EngineCommand),
    Snapshot,
    Metrics,
    Help,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a valid id")]
    InvalidId(String),
}

pub const HELP: &str = "\
commands:
  start <level>              start a level
  pause | continue | stop    control the running game
  attack <src,src,...> <dst> send attack pillows from your monsters
  snapshot                   print the current state as JSON
  metrics                    print Prometheus metrics
  quit                       stop and exit";

fn parse_id(s: &str) -> Result<u32, ConsoleError> {
    s.parse().map_err(|_| ConsoleError::InvalidId(s.to_string()))
}

/// Parse one console line. Blank lines yield None.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" => match args.as_slice() {
            [level] => ConsoleCommand::Engine(EngineCommand::StartGame(parse_id(level)?)),
            _ => return Err(ConsoleError::Usage("start <level>")),
        },
        "pause" => ConsoleCommand::Engine(EngineCommand::Pause),
        "continue" | "resume" => ConsoleCommand::Engine(EngineCommand::Continue),
        "stop" => ConsoleCommand::Engine(EngineCommand::Stop),
        "quit" | "exit" => ConsoleCommand::Engine(EngineCommand::Shutdown),
        "attack" => match args.as_slice() {
            [sources, destination] => {
                let source_ids = sources
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(parse_id)
                    .collect::<Result<Vec<MonsterId>, _>>()?;
                if source_ids.is_empty() {
                    return Err(ConsoleError::Usage("attack <src,src,...> <dst>"));
                }
                ConsoleCommand::Engine(EngineCommand::Attack(AttackRequest::new(
                    source_ids,
                    parse_id(destination)?,
                )))
            }
            _ => return Err(ConsoleError::Usage("attack <src,src,...> <dst>")),
        },
        "snapshot" => ConsoleCommand::Snapshot,
        "metrics" => ConsoleCommand::Metrics,
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifecycle() {
        assert_eq!(
            parse_line("start 2").unwrap(),
            Some(ConsoleCommand::Engine(EngineCommand::StartGame(2)))
        );
        assert_eq!(
            parse_line("  PAUSE ").unwrap(),
            Some(ConsoleCommand::Engine(EngineCommand::Pause))
        );
        assert_eq!(
            parse_line("quit").unwrap(),
            Some(ConsoleCommand::Engine(EngineCommand::Shutdown))
        );
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn test_parse_attack() {
        assert_eq!(
            parse_line("attack 1,4 7").unwrap(),
            Some(ConsoleCommand::Engine(EngineCommand::Attack(
                AttackRequest::new(vec![1, 4], 7)
            )))
        );
        assert_eq!(
            parse_line("attack 1").unwrap_err(),
            ConsoleError::Usage("attack <src,src,...> <dst>")
        );
        assert_eq!(
            parse_line("attack 1,x 2").unwrap_err(),
            ConsoleError::InvalidId("x".into())
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_line("fly 3").unwrap_err();
        assert_eq!(err, ConsoleError::Unknown("fly".into()));
        assert!(err.to_string().contains("help"));
    }
}
