//! Native result codes and their translation

use crate::error::DriverError;

pub const OK: i32 = 0;
/// Returned by future-call extensions on success
pub const SUCCESS: i32 = 0x3f48_47a0;
pub const NOT_PRESENT: i32 = -1000;
pub const HW_MALFUNCTION: i32 = -999;
pub const INVALID_PARAMETER: i32 = -998;
pub const INVALID_MODE: i32 = -997;
pub const SP_NOT_ADVANCING: i32 = -996;
pub const NO_CLOCK: i32 = -995;
pub const NO_MEMORY: i32 = -994;

/// Translate a native result code
pub fn check(code: i32) -> Result<(), DriverError> {
    match code {
        OK | SUCCESS => Ok(()),
        NOT_PRESENT => Err(DriverError::DriverUnavailable(
            "hardware input or output is not present or available",
        )),
        HW_MALFUNCTION => Err(DriverError::DriverUnavailable("hardware is malfunctioning")),
        INVALID_PARAMETER => Err(DriverError::InvalidParameter),
        INVALID_MODE => Err(DriverError::InvalidMode),
        SP_NOT_ADVANCING => Err(DriverError::SamplePositionNotAdvancing),
        NO_CLOCK => Err(DriverError::ClockUnavailable),
        NO_MEMORY => Err(DriverError::OutOfMemory),
        other => Err(DriverError::Unknown(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes() {
        assert!(check(OK).is_ok());
        assert!(check(SUCCESS).is_ok());
    }

    #[test]
    fn test_error_translation() {
        assert!(matches!(check(NOT_PRESENT), Err(DriverError::DriverUnavailable(_))));
        assert!(matches!(check(HW_MALFUNCTION), Err(DriverError::DriverUnavailable(_))));
        assert_eq!(check(INVALID_PARAMETER), Err(DriverError::InvalidParameter));
        assert_eq!(check(INVALID_MODE), Err(DriverError::InvalidMode));
        assert_eq!(check(SP_NOT_ADVANCING), Err(DriverError::SamplePositionNotAdvancing));
        assert_eq!(check(NO_CLOCK), Err(DriverError::ClockUnavailable));
        assert_eq!(check(NO_MEMORY), Err(DriverError::OutOfMemory));
        assert_eq!(check(-1), Err(DriverError::Unknown(-1)));
    }
}
