use moltopo::core::io::gro::GroError;
use moltopo::external::ConvertError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Gro(#[from] GroError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

pub type Result<T> = std::result::Result<T, CliError>;
