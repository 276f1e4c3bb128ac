use std::fmt;

use crate::types::{ColIndex, RowIndex};

#[derive(Debug)]
pub enum CreaseError {
    EmptyRowGroup,
    SpanOutOfBounds {
        row: RowIndex,
        col: ColIndex,
        span: usize,
        rows: usize,
    },
    ZeroSpan {
        row: RowIndex,
        col: ColIndex,
    },
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for CreaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreaseError::EmptyRowGroup => write!(f, "row-group contains no rows"),
            CreaseError::SpanOutOfBounds {
                row,
                col,
                span,
                rows,
            } => write!(
                f,
                "cell at row {} column {} spans {} rows but the group has {}",
                row, col, span, rows
            ),
            CreaseError::ZeroSpan { row, col } => {
                write!(f, "cell at row {} column {} has a zero span", row, col)
            }
            CreaseError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            CreaseError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CreaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CreaseError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CreaseError {
    fn from(value: std::io::Error) -> Self {
        CreaseError::Io(value)
    }
}
