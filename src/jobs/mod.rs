pub mod alpha;
pub mod monitor;
pub mod reset;

use std::sync::Arc;
use std::time::Duration;
use crate::notify::{Button, ChatNotifier, SendOutcome};
use crate::services::{split_message, MessageStyle};

pub use alpha::AlphaJob;
pub use monitor::MonitorJob;
pub use reset::ResetJob;

/// Renders per notifier style, chunks to each notifier's limit and sends in order.
/// Only the first chunk carries `button`. Returns the number of chunks delivered.
pub(crate) async fn broadcast<F>(
    notifiers: &[Arc<dyn ChatNotifier>],
    render: F,
    button: Option<&Button>,
    pause: Duration,
) -> usize
where
    F: Fn(MessageStyle) -> String,
{
    let mut delivered = 0;
    let mut first_send = true;

    for notifier in notifiers {
        let text = render(notifier.style());
        let chunks = split_message(&text, notifier.max_message_len());

        for (i, chunk) in chunks.iter().enumerate() {
            if !first_send && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            first_send = false;

            let chunk_button = if i == 0 { button } else { None };
            match notifier.send_text(chunk, chunk_button).await {
                Ok(SendOutcome::Sent) => delivered += 1,
                Ok(SendOutcome::Skipped) => {
                    tracing::debug!("{} skipped, remaining chunks dropped", notifier.name());
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "❌ {} chunk {}/{} failed: {}",
                        notifier.name(),
                        i + 1,
                        chunks.len(),
                        e
                    );
                }
            }
        }
    }
    delivered
}
