use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::api::group::ApiGroup;
use crate::args::arg_str;
use crate::channel::ControlChannel;
use crate::error::Result;

const GROUP: &str = "Notify";

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, message: &str) -> std::result::Result<(), String>;
}

/// Register `Notify_show` (async) backed by `notifier`.
pub fn register_notify<R: Read, W: Write>(
    channel: &ControlChannel<R, W>,
    notifier: Arc<dyn Notifier>,
) {
    let group = ApiGroup::new(channel, GROUP);
    group.register_async("show", move |args: &[Value]| {
        let title = arg_str(args, 0)?;
        let message = arg_str(args, 1)?;
        notifier.show(title, message)?;
        Ok(Value::Null)
    });
}

/// Typed caller for a remote Notify group.
pub struct NotifyClient<R, W> {
    group: ApiGroup<R, W>,
}

impl<R: Read, W: Write> NotifyClient<R, W> {
    pub fn new(channel: &ControlChannel<R, W>) -> Self {
        Self {
            group: ApiGroup::new(channel, GROUP),
        }
    }

    pub fn show(&self, title: &str, message: &str) -> Result<()> {
        self.group.invoke_event(
            "show",
            vec![
                Value::String(title.to_string()),
                Value::String(message.to_string()),
            ],
        )
    }
}

/// Notifier that writes notifications to the log, used by the CLI host.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, title: &str, message: &str) -> std::result::Result<(), String> {
        info!(title, message, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        shown: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for Recording {
        fn show(&self, title: &str, message: &str) -> std::result::Result<(), String> {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[test]
    fn show_reaches_the_backend() {
        let (client_side, host_side) = crate::channel::test_pair();
        let recording = Arc::new(Recording {
            shown: Mutex::new(Vec::new()),
        });
        register_notify(&host_side, Arc::clone(&recording) as Arc<dyn Notifier>);
        let server = host_side.spawn_dispatcher().unwrap();

        NotifyClient::new(&client_side)
            .show("Update", "runtime ready")
            .unwrap();
        assert_eq!(
            recording.shown.lock().unwrap().as_slice(),
            &[("Update".to_string(), "runtime ready".to_string())]
        );

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }

    #[test]
    fn missing_message_argument_is_a_remote_error() {
        let (client_side, host_side) = crate::channel::test_pair();
        register_notify(&host_side, Arc::new(LogNotifier));
        let server = host_side.spawn_dispatcher().unwrap();

        let err = client_side
            .call("Notify_show", vec![Value::String("only title".into())])
            .unwrap_err();
        assert!(matches!(err, crate::error::ChannelError::Remote(ref m) if m.contains("argument")));

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }
}
