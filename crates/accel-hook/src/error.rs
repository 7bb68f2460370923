use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpFailure {
    /// Checkpoint binary exited non-zero (`None` when killed by a signal).
    Exit(Option<i32>),
    /// A checkpoint-mode variable that must be cleared was not set.
    MissingEnv(String),
}

#[derive(Debug)]
pub enum Error {
    /// `argv` is the display form, credentials already masked.
    Command { argv: Vec<String>, code: Option<i32> },
    Dump(DumpFailure),
    MissingEnv(String),
    MissingParam(String),
    Io(String),
    Config(String),
    Msg(String),
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self::Msg(msg.into())
    }

    pub fn command(argv: &[String], code: Option<i32>) -> Self {
        Self::Command {
            argv: argv.to_vec(),
            code,
        }
    }

    /// Exit code carried by a failed external command, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => *code,
            Self::Dump(DumpFailure::Exit(code)) => *code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command { argv, code } => match code {
                Some(code) => write!(f, "command [{}] return code is {code}", argv.join(" ")),
                None => write!(f, "command [{}] terminated by signal", argv.join(" ")),
            },
            Self::Dump(DumpFailure::Exit(Some(code))) => {
                write!(f, "dump error: return code {code}")
            }
            Self::Dump(DumpFailure::Exit(None)) => write!(f, "dump error: terminated by signal"),
            Self::Dump(DumpFailure::MissingEnv(name)) => write!(
                f,
                "dump error: environment variable '{name}' must be set before dump"
            ),
            Self::MissingEnv(name) => write!(f, "environment variable '{name}' is not set"),
            Self::MissingParam(key) => write!(f, "missing request parameter '{key}'"),
            Self::Io(msg) | Self::Config(msg) | Self::Msg(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
