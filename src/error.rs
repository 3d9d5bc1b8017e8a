//! Command Error Types
//!
//! Library crates raise their own kinds; the commands here wrap them in one
//! of these so the top-level report says which stage gave up.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not load track data from `{}`", _0.display())]
    Data(#[error(not(source))] PathBuf),
    #[display("input directory `{}` is unusable", _0.display())]
    Input(#[error(not(source))] PathBuf),
    #[display("could not prepare the distribution volume")]
    Volume,
    #[display("`wszst` is unavailable")]
    Tool,
    #[display("could not set up thumbnail downloads")]
    Thumbnails,
    #[display("could not open the output directory `{}`", _0.display())]
    Output(#[error(not(source))] PathBuf),
    #[display("pack build failed")]
    Pack,
    #[display("could not write the pack outputs")]
    Write,
    #[display("`{_0}` is not a content hash")]
    InvalidHash(#[error(not(source))] String),
}
