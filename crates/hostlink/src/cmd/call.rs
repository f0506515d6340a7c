use std::time::Duration;

use serde_json::Value;

use crate::cmd::CallArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_result, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let call_args = parse_call_args(&args.args);

    let channel =
        hostlink_channel::connect(&args.path).map_err(|err| channel_error("connect failed", err))?;

    let result = channel
        .call_with_timeout(&args.method, call_args, timeout)
        .map_err(|err| channel_error("call failed", err))?;

    print_result(&args.method, &result, format);
    Ok(SUCCESS)
}

/// Each argument is JSON when it parses as JSON, a plain string otherwise;
/// `42` is a number but `hello` needs no quoting.
pub fn parse_call_args(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|arg| {
            serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone()))
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_arguments_keep_their_types() {
        let parsed = parse_call_args(&[
            "42".to_string(),
            "true".to_string(),
            r#"{"k": 1}"#.to_string(),
            "plain text".to_string(),
        ]);
        assert_eq!(
            parsed,
            vec![json!(42), json!(true), json!({"k": 1}), json!("plain text")]
        );
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
