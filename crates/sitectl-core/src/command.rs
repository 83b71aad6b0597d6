//! Command line parsing: `<verb>:<argument>` or a bare `<verb>`.

use regex::Regex;
use std::sync::OnceLock;

/// Which of the two command shapes a line had.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandForm {
    /// `verb` with no colon.
    Bare,
    /// `verb:argument` (argument may be empty).
    WithArgument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub argument: String,
    pub form: CommandForm,
}

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([a-z0-9]+):(.*)$").expect("static command pattern"))
}

fn is_verb(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Split a raw command line into verb and argument.
///
/// Never fails: a line that fits neither shape yields an empty verb, which no
/// operation matches.
pub fn parse(line: &str) -> Command {
    // `.` does not cross newlines; a single trailing newline is tolerated.
    let trimmed = line.strip_suffix('\n').unwrap_or(line);
    if !trimmed.contains('\n') {
        if let Some(caps) = command_pattern().captures(trimmed) {
            return Command {
                verb: caps[1].to_string(),
                argument: caps[2].to_string(),
                form: CommandForm::WithArgument,
            };
        }
    }

    let verb = if is_verb(line) { line.to_string() } else { String::new() };
    Command {
        verb,
        argument: String::new(),
        form: CommandForm::Bare,
    }
}
