use tokio::sync::mpsc;

use swupdd::errors::Result;
use swupdd::notify::{CompletionEvent, CompletionNotifier};

/// A notifier that forwards every completion event to the test.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionNotifier for ChannelNotifier {
    fn notify(&mut self, event: CompletionEvent) -> Result<()> {
        // The test may have stopped listening; that's fine.
        let _ = self.tx.send(event);
        Ok(())
    }
}
