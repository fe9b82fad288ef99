use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// Two sizes that must agree do not (dataset rows and labels, batch width and model input, ...).
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A dataset was indexed outside of `[0, len)`.
    IndexOutOfBounds { index: usize, len: usize },
    /// A class label does not fit the amount of classes the model scores.
    LabelOutOfRange { label: usize, classes: usize },
    /// There are no samples where at least one is required.
    EmptyDataset { what: &'static str },
    /// A configuration value is outside of its valid domain.
    InvalidConfig(String),
    /// An input file does not follow its expected format.
    InvalidFormat { what: String, reason: String },
    Io(io::Error),
}

impl MlErr {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn invalid_format(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => format!("shape mismatch for {what}: got {got}, expected {expected}"),
            MlErr::IndexOutOfBounds { index, len } => {
                format!("sample index {index} is out of bounds for a dataset of {len} samples")
            }
            MlErr::LabelOutOfRange { label, classes } => {
                format!("label {label} is out of range for {classes} classes")
            }
            MlErr::EmptyDataset { what } => format!("the {what} has no samples"),
            MlErr::InvalidConfig(msg) => format!("invalid config: {msg}"),
            MlErr::InvalidFormat { what, reason } => format!("invalid {what}: {reason}"),
            MlErr::Io(e) => format!("io error: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_both_sizes() {
        let err = MlErr::ShapeMismatch {
            what: "labels",
            got: 3,
            expected: 4,
        };

        assert_eq!(err.to_string(), "shape mismatch for labels: got 3, expected 4");
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = MlErr::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("io error"));
    }
}
