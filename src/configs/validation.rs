use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid calibration value: {0} (must be positive and finite)")]
    InvalidCalibration(f64),
    #[error("Invalid duration: {0} ms (must be greater than zero)")]
    ZeroDuration(u64),
}

pub fn is_positive_finite(value: &f64) -> Result<(), ValidationError> {
    if value.is_finite() && *value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidCalibration(*value))
    }
}

pub fn is_non_zero_millis(value: &u64) -> Result<(), ValidationError> {
    if *value > 0 {
        Ok(())
    } else {
        Err(ValidationError::ZeroDuration(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_rejects_non_physical_values() {
        assert!(is_positive_finite(&31.0).is_ok());
        assert!(is_positive_finite(&0.0).is_err());
        assert!(is_positive_finite(&-1.0).is_err());
        assert!(is_positive_finite(&f64::NAN).is_err());
        assert!(is_positive_finite(&f64::INFINITY).is_err());
    }

    #[test]
    fn durations_must_be_non_zero() {
        assert!(is_non_zero_millis(&200).is_ok());
        assert_eq!(
            is_non_zero_millis(&0),
            Err(ValidationError::ZeroDuration(0))
        );
    }
}
