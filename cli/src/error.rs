//! CLI-level error wrapping: every command returns a [`CliResult`], and
//! `main` turns a final `Err` into the process exit code from §6.

pub type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] domainlang_package::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => e.exit_code(),
            CliError::Io(_) | CliError::Other(_) => 1,
        }
    }
}
