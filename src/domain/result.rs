//! Result type alias for sheetbridge

use super::errors::TransferError;

/// Result type alias for sheetbridge operations
///
/// # Examples
///
/// ```
/// use sheetbridge::domain::result::Result;
/// use sheetbridge::domain::errors::TransferError;
///
/// fn page_size(value: usize) -> Result<usize> {
///     if value == 0 {
///         return Err(TransferError::Configuration("page size must be > 0".to_string()));
///     }
///     Ok(value)
/// }
///
/// assert!(page_size(0).is_err());
/// ```
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
