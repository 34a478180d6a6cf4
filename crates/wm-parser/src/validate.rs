//! Opt-in structural validation
//!
//! Checks each command against its keyword's required-parameter rule and
//! reports violations as diagnostics. Unknown keywords always fail.

use crate::command::{CommandType, ParamRule};
use crate::model::{ParamKind, ParseError, ParsedCommand};

/// Validate one command; `None` means it passed
pub fn validate_command(cmd: &ParsedCommand) -> Option<ParseError> {
    if let CommandType::Unknown(keyword) = &cmd.command {
        return Some(error(cmd, format!("Unknown command: {keyword}")));
    }

    match cmd.command.param_rule() {
        ParamRule::None => None,
        ParamRule::Keys(keys) => keys
            .iter()
            .find(|key| cmd.param(key).is_none())
            .map(|key| {
                error(
                    cmd,
                    format!("{} requires parameter {key}", cmd.command.keyword()),
                )
            }),
        ParamRule::AnyOf(keys) => {
            let any = keys
                .iter()
                .any(|key| cmd.param(key).is_some() || cmd.has_flag(key));
            if any {
                None
            } else {
                Some(error(
                    cmd,
                    format!(
                        "{} requires one of: {}",
                        cmd.command.keyword(),
                        keys.join(", ")
                    ),
                ))
            }
        }
        ParamRule::Positional(count) => {
            let have = cmd
                .parameters
                .iter()
                .filter(|p| p.kind == ParamKind::Positional)
                .count();
            if have >= count {
                None
            } else {
                Some(error(
                    cmd,
                    format!(
                        "{} requires {count} argument(s), found {have}",
                        cmd.command.keyword()
                    ),
                ))
            }
        }
    }
}

fn error(cmd: &ParsedCommand, message: String) -> ParseError {
    ParseError {
        line: cmd.line,
        message,
        raw: cmd.raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Parser;

    fn command(line: &str) -> ParsedCommand {
        Parser::new().parse_command(line, 1)
    }

    #[test]
    fn test_unknown_command_fails() {
        let err = validate_command(&command("FOOBAR X=1")).unwrap();
        assert_eq!(err.message, "Unknown command: FOOBAR");
        assert_eq!(err.line, 1);
        assert_eq!(err.raw, "FOOBAR X=1");
    }

    #[test]
    fn test_required_keys() {
        assert!(validate_command(&command("TAG POS=1 TYPE=A")).is_none());
        let err = validate_command(&command("TAG POS=1")).unwrap();
        assert!(err.message.contains("TYPE"));
    }

    #[test]
    fn test_wait_requires_seconds() {
        assert!(validate_command(&command("WAIT SECONDS=3")).is_none());
        assert!(validate_command(&command("WAIT")).is_some());
    }

    #[test]
    fn test_any_of_accepts_flags() {
        assert!(validate_command(&command("TAB T=2")).is_none());
        assert!(validate_command(&command("TAB CLOSEALLOTHERS")).is_none());
        assert!(validate_command(&command("TAB")).is_some());
    }

    #[test]
    fn test_set_needs_name_and_value() {
        assert!(validate_command(&command("SET !VAR1 10")).is_none());
        let err = validate_command(&command("SET !VAR1")).unwrap();
        assert!(err.message.contains("SET requires 2"));
    }

    #[test]
    fn test_no_rule_commands_pass() {
        assert!(validate_command(&command("PAUSE")).is_none());
        assert!(validate_command(&command("BACK")).is_none());
        assert!(validate_command(&command("VERSION BUILD=1011")).is_none());
    }
}
