use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid momentum windows: short={short}, long={long}")]
    InvalidWindows { short: usize, long: usize },
}
