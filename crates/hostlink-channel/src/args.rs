//! Argument extraction helpers for handler implementations.
//!
//! Inbound call arguments are positional JSON values; handlers use these to
//! unpack them with uniform error messages.

use serde_json::Value;

use crate::error::HandlerError;

pub fn arg_value<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, HandlerError> {
    args.get(index)
        .ok_or_else(|| HandlerError::new(format!("missing argument {index}")))
}

pub fn arg_str<'a>(args: &'a [Value], index: usize) -> Result<&'a str, HandlerError> {
    arg_value(args, index)?
        .as_str()
        .ok_or_else(|| HandlerError::new(format!("argument {index} must be a string")))
}

pub fn arg_i64(args: &[Value], index: usize) -> Result<i64, HandlerError> {
    arg_value(args, index)?
        .as_i64()
        .ok_or_else(|| HandlerError::new(format!("argument {index} must be an integer")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_present_arguments() {
        let args = vec![json!("key"), json!(42)];
        assert_eq!(arg_str(&args, 0).unwrap(), "key");
        assert_eq!(arg_i64(&args, 1).unwrap(), 42);
    }

    #[test]
    fn missing_argument_is_an_error() {
        let err = arg_str(&[], 0).unwrap_err();
        assert!(err.to_string().contains("missing argument 0"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let args = vec![json!(1)];
        let err = arg_str(&args, 0).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }
}
