//! Command-line helpers shared by the tool binaries.
//!
//! The tools accept the single-dash long flags of the recording scripts
//! (`-input clip.avi -display on`) as well as the usual `--input` form.
//! [`normalize_args`] rewrites the former into the latter before `clap`
//! parses the result. Flags a tool does not know are dropped together with
//! their values, as are values beyond a known flag's [`Arity`].

use clap::ValueEnum;

/// How many values a flag consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No value
    Switch,
    /// Exactly one value
    One,
    /// Every following value up to the next flag
    Many,
}

/// A flag the tool understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    /// Name without dashes; single letters become short flags
    pub name: &'static str,
    pub arity: Arity,
}

impl FlagSpec {
    #[must_use]
    pub const fn new(name: &'static str, arity: Arity) -> Self {
        Self { name, arity }
    }

    /// Values still accepted after the flag, `None` for no limit
    fn values_after(self, inline_value: bool) -> Option<usize> {
        match (self.arity, inline_value) {
            (Arity::Switch, _) | (Arity::One, true) => Some(0),
            (Arity::One, false) => Some(1),
            (Arity::Many, _) => None,
        }
    }
}

/// Flags every binary accepts through `clap`
const BUILTIN_FLAGS: [FlagSpec; 4] = [
    FlagSpec::new("help", Arity::Switch),
    FlagSpec::new("h", Arity::Switch),
    FlagSpec::new("version", Arity::Switch),
    FlagSpec::new("V", Arity::Switch),
];

fn looks_like_flag(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('-') else {
        return false;
    };
    // Negative numbers are values
    !rest.is_empty() && !rest.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn render(spec: &FlagSpec) -> String {
    if spec.name.chars().count() == 1 {
        format!("-{}", spec.name)
    } else {
        format!("--{}", spec.name)
    }
}

/// Rewrite `args` for `clap`: the program name is kept, `-flag` becomes
/// `--flag`, unknown flags are removed along with the values after them,
/// and values a known flag cannot take are removed too.
pub fn normalize_args<I, S>(args: I, known: &[FlagSpec]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens = args.into_iter().map(Into::into);
    let mut out: Vec<String> = tokens.next().into_iter().collect();
    // Values the current flag may still take; `None` is unlimited
    let mut accepting: Option<usize> = None;

    for token in tokens {
        if token == "--" {
            accepting = None;
            out.push(token);
            continue;
        }
        if !looks_like_flag(&token) {
            match accepting {
                Some(0) => log::debug!("Ignoring stray value {token}"),
                Some(n) => {
                    accepting = Some(n - 1);
                    out.push(token);
                }
                None => out.push(token),
            }
            continue;
        }

        let body = token.trim_start_matches('-');
        let (name, inline_value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        match known.iter().chain(BUILTIN_FLAGS.iter()).find(|spec| spec.name == name) {
            Some(spec) => {
                accepting = spec.values_after(inline_value.is_some());
                let flag = render(spec);
                match inline_value {
                    Some(value) => out.push(format!("{flag}={value}")),
                    None => out.push(flag),
                }
            }
            None => {
                log::debug!("Ignoring unknown flag {token}");
                accepting = Some(0);
            }
        }
    }
    out
}

/// Preview window switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Display {
    On,
    #[default]
    Off,
}

impl Display {
    #[must_use]
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

/// Head-pose tool verbosity: `war` shows warnings, `cam` adds head-turn
/// messages and run progress, `all` logs every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    War,
    Cam,
    All,
}

impl Verbosity {
    /// `env_logger` filter for an optional verbosity
    #[must_use]
    pub fn filter(verbosity: Option<Self>) -> &'static str {
        match verbosity {
            None => "error",
            Some(Self::War) => "warn",
            Some(Self::Cam) => "info",
            Some(Self::All) => "debug",
        }
    }
}

/// Initialise logging with `default_level` unless `RUST_LOG` says otherwise
pub fn init_logging(default_level: &str) {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_level));
}
