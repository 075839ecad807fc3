#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {name} threshold `{value}`: expected a percentage between 0 and 100")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("no notification with id `{0}`")]
    UnknownNotification(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
