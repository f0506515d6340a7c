use crate::cmd::call::parse_call_args;
use crate::cmd::NotifyArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};

pub fn run(args: NotifyArgs) -> CliResult<i32> {
    let call_args = parse_call_args(&args.args);

    let channel =
        hostlink_channel::connect(&args.path).map_err(|err| channel_error("connect failed", err))?;

    channel
        .notify(&args.method, call_args)
        .map_err(|err| channel_error("notify failed", err))?;

    Ok(SUCCESS)
}
