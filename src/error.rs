pub type StripResult<T> = Result<T, StripError>;

#[derive(thiserror::Error, Debug)]
pub enum StripError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("request error: {0}")]
    Request(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StripError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn bus(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(StripError::config("x").to_string().contains("configuration error:"));
        assert!(StripError::bus("x").to_string().contains("bus error:"));
        assert!(StripError::request("x").to_string().contains("request error:"));
    }

    #[test]
    fn io_preserves_source() {
        let err = StripError::from(std::io::Error::other("boom"));
        assert!(err.to_string().contains("boom"));
    }
}
