//! Line commands read from stdin.
//!
//! ```text
//! set <slot> <value> [persist] [ttl=<ms>]
//! inc <slot> [delta]
//! rm <slot>
//! get <slot>
//! event <screen_event>
//! sync
//! quit
//! ```
//!
//! A slot is `key`, `global:key` or `screen:key`. Values are parsed as JSON
//! and fall back to a plain string.

use std::str::FromStr;

use screenstate_domain::time::Millis;
use screenstate_domain::trigger::{ScreenEventType, UnknownScreenEvent};
use screenstate_domain::value::VariableValue;
use screenstate_domain::variable::{Scope, WritePolicy};

/// Variable addressed by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub key: String,
    pub scope: Scope,
}

impl FromStr for Slot {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, key) = match s.split_once(':') {
            Some(("global", key)) => (Scope::Global, key),
            Some(("screen", key)) => (Scope::Screen, key),
            Some((prefix, _)) => return Err(CommandError::UnknownScope(prefix.to_string())),
            None => (Scope::Global, s),
        };
        if key.is_empty() {
            return Err(CommandError::Missing("key"));
        }
        Ok(Self {
            key: key.to_string(),
            scope,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set {
        slot: Slot,
        value: VariableValue,
        policy: WritePolicy,
        ttl_millis: Option<Millis>,
    },
    Increment {
        slot: Slot,
        delta: f64,
    },
    Remove(Slot),
    Get(Slot),
    Event(ScreenEventType),
    Sync,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;
        let command = match verb {
            "set" => {
                let slot = required(words.next(), "slot")?.parse()?;
                let value = parse_value(required(words.next(), "value")?);
                let mut policy = WritePolicy::InMemory;
                let mut ttl_millis = None;
                for option in words.by_ref() {
                    if option == "persist" {
                        policy = WritePolicy::Persistent;
                    } else if let Some(ttl) = option.strip_prefix("ttl=") {
                        ttl_millis = Some(ttl.parse().map_err(|_| CommandError::Invalid("ttl"))?);
                    } else {
                        return Err(CommandError::UnknownOption(option.to_string()));
                    }
                }
                Self::Set {
                    slot,
                    value,
                    policy,
                    ttl_millis,
                }
            }
            "inc" => {
                let slot = required(words.next(), "slot")?.parse()?;
                let delta = match words.next() {
                    Some(delta) => delta.parse().map_err(|_| CommandError::Invalid("delta"))?,
                    None => 1.0,
                };
                Self::Increment { slot, delta }
            }
            "rm" => Self::Remove(required(words.next(), "slot")?.parse()?),
            "get" => Self::Get(required(words.next(), "slot")?.parse()?),
            "event" => Self::Event(required(words.next(), "event")?.parse()?),
            "sync" => Self::Sync,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::UnknownVerb(other.to_string())),
        };
        if let Some(extra) = words.next() {
            return Err(CommandError::UnknownOption(extra.to_string()));
        }
        Ok(command)
    }
}

fn required<'a>(word: Option<&'a str>, what: &'static str) -> Result<&'a str, CommandError> {
    word.ok_or(CommandError::Missing(what))
}

fn parse_value(raw: &str) -> VariableValue {
    serde_json::from_str(raw).unwrap_or_else(|_| VariableValue::String(raw.to_string()))
}

/// Command parse errors.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownVerb(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {0}")]
    Invalid(&'static str),
    #[error("unknown scope `{0}`, expected `global` or `screen`")]
    UnknownScope(String),
    #[error("unexpected argument `{0}`")]
    UnknownOption(String),
    #[error(transparent)]
    Event(#[from] UnknownScreenEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(key: &str) -> Slot {
        Slot {
            key: key.to_string(),
            scope: Scope::Global,
        }
    }

    #[test]
    fn should_parse_set_with_options() {
        let command: Command = "set screen:otp 1234 persist ttl=500".parse().unwrap();
        assert_eq!(
            command,
            Command::Set {
                slot: Slot {
                    key: "otp".to_string(),
                    scope: Scope::Screen,
                },
                value: VariableValue::Number(1234.0),
                policy: WritePolicy::Persistent,
                ttl_millis: Some(500),
            }
        );
    }

    #[test]
    fn should_fall_back_to_string_values() {
        let command: Command = "set theme dark".parse().unwrap();
        assert!(matches!(command, Command::Set { value: VariableValue::String(ref s), .. } if s == "dark"));
    }

    #[test]
    fn should_parse_json_object_values() {
        let command: Command = r#"set user {"name":"ada"}"#.parse().unwrap();
        assert!(matches!(command, Command::Set { value: VariableValue::Object(_), .. }));
    }

    #[test]
    fn should_default_increment_delta() {
        let command: Command = "inc visits".parse().unwrap();
        assert_eq!(
            command,
            Command::Increment {
                slot: global("visits"),
                delta: 1.0,
            }
        );
    }

    #[test]
    fn should_parse_remaining_verbs() {
        assert_eq!("rm global:k".parse::<Command>().unwrap(), Command::Remove(global("k")));
        assert_eq!("get k".parse::<Command>().unwrap(), Command::Get(global("k")));
        assert_eq!(
            "event on_appear".parse::<Command>().unwrap(),
            Command::Event(ScreenEventType::OnAppear)
        );
        assert_eq!("sync".parse::<Command>().unwrap(), Command::Sync);
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn should_reject_bad_input() {
        assert!(matches!("".parse::<Command>(), Err(CommandError::Empty)));
        assert!(matches!("jump".parse::<Command>(), Err(CommandError::UnknownVerb(_))));
        assert!(matches!("get".parse::<Command>(), Err(CommandError::Missing("slot"))));
        assert!(matches!("get app:k".parse::<Command>(), Err(CommandError::UnknownScope(_))));
        assert!(matches!("inc k many".parse::<Command>(), Err(CommandError::Invalid("delta"))));
        assert!(matches!("event on_close".parse::<Command>(), Err(CommandError::Event(_))));
        assert!(matches!("sync now".parse::<Command>(), Err(CommandError::UnknownOption(_))));
    }
}
