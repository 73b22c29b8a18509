use std::ffi::{OsStr, OsString};
use std::num::NonZeroI32;
use std::time::Duration;

/// Usage text printed when the supervisor is run without directives
pub const USAGE: &str = "\
usage: e2e-fio [sleep <secs>] [segfault-after <secs>] [command <args..> +]
               [-- <fio args..>] [--- <executable> <args..>] [exitv <value>]
  sleep <secs>              pause the scan for <secs> seconds
  segfault-after <secs>     once all workloads are launched, wait <secs>, kill
                            them and crash the supervisor with SIGSEGV
  -- <args..>               launch the default executable with <args..>
  --- <exe> <args..>        launch <exe> with <args..>
                            a group ends at the next --, --- or & or at the end
  command <args..> +        run <args..> through the shell, abort on failure
  exitv <value>             exit with <value> whatever the workloads did
All directives are optional and may be repeated. Invalid directives are skipped.";

const SLEEP: &str = "sleep";
const SEGFAULT_AFTER: &str = "segfault-after";
const EXIT_OVERRIDE: &str = "exitv";
const COMMAND: &str = "command";
const COMMAND_END: &str = "+";
const GROUP: &str = "--";
const GROUP_WITH_EXECUTABLE: &str = "---";
const GROUP_END: &str = "&";

/// One recognized element of the directive stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Pause the scan
    Sleep(Duration),
    /// Crash after all launches, once this delay has elapsed
    SegfaultAfter(Duration),
    /// Launch a workload with this fully assembled command line
    Launch(OsString),
    /// Run this command line synchronously through the shell
    Command(OsString),
    /// Override the final exit value
    ExitOverride(NonZeroI32),
    /// A token that was skipped
    Ignored(OsString),
}

/// Left-to-right scanner over the directive stream.
///
/// Each call to `next` consumes a directive keyword plus whatever arguments
/// it owns. Malformed directives never stop the scan: the keyword is reported
/// as [`Directive::Ignored`] and scanning resumes at the following token.
/// Arguments are carried as raw OS strings, so workloads get exactly the bytes
/// they were given.
pub struct Directives<'a> {
    tokens: &'a [OsString],
    cursor: usize,
    default_executable: &'a OsStr,
}

impl<'a> Directives<'a> {
    pub fn new(tokens: &'a [OsString], default_executable: &'a OsStr) -> Self {
        Self {
            tokens,
            cursor: 0,
            default_executable,
        }
    }

    fn peek(&self, offset: usize) -> Option<&'a OsStr> {
        self.tokens.get(self.cursor + offset).map(OsString::as_os_str)
    }

    fn peek_is(&self, keyword: &str) -> bool {
        self.peek(0).and_then(OsStr::to_str) == Some(keyword)
    }

    /// Consumes `keyword <value>` if the value parses, otherwise only the keyword
    fn keyword_with_value<T>(
        &mut self,
        keyword: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<T, Directive> {
        match self.peek(1).and_then(OsStr::to_str).and_then(parse) {
            Some(value) => {
                self.cursor += 2;
                Ok(value)
            }
            None => {
                self.cursor += 1;
                Err(Directive::Ignored(keyword.into()))
            }
        }
    }

    /// Consumes a launch group starting at the cursor (the group token
    /// itself included) and returns its command line, or `None` for an
    /// empty group.
    fn launch_group(&mut self, explicit_executable: bool) -> Option<OsString> {
        self.cursor += 1;
        let executable = if explicit_executable {
            match self.peek(0) {
                Some(token) if !is_group_boundary(token) => {
                    self.cursor += 1;
                    token
                }
                _ => {
                    self.skip_group_end();
                    return None;
                }
            }
        } else {
            self.default_executable
        };

        let start = self.cursor;
        while let Some(token) = self.peek(0) {
            if is_group_boundary(token) {
                break;
            }
            self.cursor += 1;
        }
        let args = &self.tokens[start..self.cursor];
        self.skip_group_end();

        if args.is_empty() && !explicit_executable {
            return None;
        }
        Some(command_line(executable, args))
    }

    fn skip_group_end(&mut self) {
        if self.peek_is(GROUP_END) {
            self.cursor += 1;
        }
    }

    /// Consumes `command <args..> +`, the terminator being optional at end of input
    fn command(&mut self) -> OsString {
        self.cursor += 1;
        let start = self.cursor;
        while self.peek(0).is_some() && !self.peek_is(COMMAND_END) {
            self.cursor += 1;
        }
        let line = match self.tokens[start..self.cursor].split_first() {
            Some((first, rest)) => command_line(first, rest),
            None => OsString::new(),
        };
        if self.peek_is(COMMAND_END) {
            self.cursor += 1;
        }
        line
    }
}

impl Iterator for Directives<'_> {
    type Item = Directive;

    fn next(&mut self) -> Option<Directive> {
        loop {
            let token = self.peek(0)?;
            let directive = match token.to_str() {
                Some(SLEEP) => self
                    .keyword_with_value(SLEEP, parse_seconds)
                    .map_or_else(|ignored| ignored, Directive::Sleep),
                Some(SEGFAULT_AFTER) => self
                    .keyword_with_value(SEGFAULT_AFTER, parse_seconds)
                    .map_or_else(|ignored| ignored, Directive::SegfaultAfter),
                Some(EXIT_OVERRIDE) => self
                    .keyword_with_value(EXIT_OVERRIDE, parse_exit_value)
                    .map_or_else(|ignored| ignored, Directive::ExitOverride),
                Some(COMMAND) => Directive::Command(self.command()),
                Some(group @ (GROUP | GROUP_WITH_EXECUTABLE)) => {
                    match self.launch_group(group == GROUP_WITH_EXECUTABLE) {
                        Some(line) => Directive::Launch(line),
                        None => continue,
                    }
                }
                _ => {
                    self.cursor += 1;
                    Directive::Ignored(token.to_os_string())
                }
            };
            return Some(directive);
        }
    }
}

fn is_group_boundary(token: &OsStr) -> bool {
    matches!(token.to_str(), Some(GROUP | GROUP_WITH_EXECUTABLE | GROUP_END))
}

/// Joins an executable and its arguments with single spaces
pub fn command_line(executable: &OsStr, args: &[OsString]) -> OsString {
    let mut line = executable.to_os_string();
    for arg in args {
        line.push(" ");
        line.push(arg);
    }
    line
}

/// A positive whole number of seconds; zero reads as "not given"
fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// A non-zero exit value; zero reads as "not given"
fn parse_exit_value(value: &str) -> Option<NonZeroI32> {
    value.parse::<i32>().ok().and_then(NonZeroI32::new)
}
