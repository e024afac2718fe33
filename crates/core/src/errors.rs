use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown weekday `{0}`")]
    UnknownWeekday(String),
    #[error("invalid business-hours interval {from}-{to}")]
    InvalidHourRange { from: u8, to: u8 },
}
