//! Error types and stable error codes.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("room {room} is full")]
    RoomFull { room: String },

    #[error("invalid seat number: {0}")]
    InvalidSeat(u8),

    #[error("invalid cell value {value} at row {row}, column {col}")]
    InvalidCell { row: usize, col: usize, value: u8 },
}

impl RelayError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::RoomFull { .. } => "room_full",
            Self::InvalidSeat(_) => "invalid_seat",
            Self::InvalidCell { .. } => "invalid_cell",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(
            RelayError::RoomFull {
                room: "R1".to_string()
            }
            .error_code(),
            "room_full"
        );
        assert_eq!(RelayError::InvalidSeat(3).error_code(), "invalid_seat");
        assert_eq!(
            RelayError::InvalidCell {
                row: 0,
                col: 1,
                value: 7
            }
            .error_code(),
            "invalid_cell"
        );
    }

    #[test]
    fn display_messages() {
        let err = RelayError::RoomFull {
            room: "lobby".to_string(),
        };
        assert_eq!(err.to_string(), "room lobby is full");

        let err = RelayError::InvalidCell {
            row: 2,
            col: 0,
            value: 9,
        };
        assert_eq!(err.to_string(), "invalid cell value 9 at row 2, column 0");
    }
}
