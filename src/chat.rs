use std::io::Write;
use std::sync::Mutex;

use tracing::debug;

use crate::error::ChatbotError;
use crate::providers::{Message, Provider};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// Label written in front of every call failure on the diagnostic sink.
pub const DIAGNOSTIC_LABEL: &str = "Error calling OpenAI API:";

/// The fixed system instruction followed by one user prompt. Built per call,
/// never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    messages: [Message; 2],
}

impl ConversationTurn {
    pub fn new(prompt: &str) -> Self {
        Self {
            messages: [Message::system(SYSTEM_INSTRUCTION), Message::user(prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Sends a prompt through a `Provider` and hands back the reply text.
///
/// Failures are written once to the diagnostic sink and then returned
/// unchanged. No retry, no fallback text.
pub struct ChatRequestHandler {
    provider: Box<dyn Provider>,
    diagnostics: Mutex<Box<dyn Write + Send>>,
}

impl ChatRequestHandler {
    /// Handler reporting failures on stderr.
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            diagnostics: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_diagnostics(mut self, sink: impl Write + Send + 'static) -> Self {
        self.diagnostics = Mutex::new(Box::new(sink));
        self
    }

    /// Ask the provider for a reply to `prompt`.
    ///
    /// `Ok(None)` means the provider answered with no choices or no content.
    /// That is a valid answer, not an error.
    pub async fn respond(&self, prompt: &str) -> Result<Option<String>, ChatbotError> {
        let turn = ConversationTurn::new(prompt);
        debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            prompt_len = prompt.len(),
            "requesting completion"
        );

        match self.provider.complete(turn.messages()).await {
            Ok(content) => Ok(content),
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    fn report(&self, err: &ChatbotError) {
        debug!(provider = self.provider.name(), error = %err, "completion call failed");
        // A poisoned or broken sink must not mask the original error.
        if let Ok(mut sink) = self.diagnostics.lock() {
            let _ = writeln!(sink, "{DIAGNOSTIC_LABEL} {err}");
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    enum Canned {
        Reply(Option<String>),
        Fail(String),
    }

    /// Records every message list it receives and answers with a canned result.
    struct RecordingProvider {
        canned: Canned,
        calls: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    impl RecordingProvider {
        fn new(canned: Canned) -> (Self, Arc<Mutex<Vec<Vec<Message>>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let provider = Self {
                canned,
                calls: Arc::clone(&calls),
            };
            (provider, calls)
        }
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, messages: &[Message]) -> Result<Option<String>, ChatbotError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            match &self.canned {
                Canned::Reply(content) => Ok(content.clone()),
                Canned::Fail(detail) => Err(ChatbotError::Upstream(detail.clone())),
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn turn_is_system_then_user() {
        let turn = ConversationTurn::new("hello");
        assert_eq!(
            turn.messages(),
            &[
                Message::system("You are a helpful assistant."),
                Message::user("hello"),
            ]
        );
    }

    #[tokio::test]
    async fn sends_one_call_with_both_messages() {
        let (provider, calls) = RecordingProvider::new(Canned::Reply(Some("ok".to_owned())));
        let handler = ChatRequestHandler::new(provider);

        handler.respond("What is Rust?").await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                Message::system(SYSTEM_INSTRUCTION),
                Message::user("What is Rust?"),
            ]
        );
    }

    #[tokio::test]
    async fn reply_is_returned_unchanged() {
        let reply = "  functions calling /\nthemselves  ";
        let (provider, _) = RecordingProvider::new(Canned::Reply(Some(reply.to_owned())));
        let handler = ChatRequestHandler::new(provider);

        let content = handler.respond("haiku").await.unwrap();
        assert_eq!(content.as_deref(), Some(reply));
    }

    #[tokio::test]
    async fn empty_prompt_is_forwarded() {
        let (provider, calls) = RecordingProvider::new(Canned::Reply(None));
        let handler = ChatRequestHandler::new(provider);

        handler.respond("").await.unwrap();
        assert_eq!(calls.lock().unwrap()[0][1], Message::user(""));
    }

    #[tokio::test]
    async fn absent_content_is_not_an_error() {
        let (provider, _) = RecordingProvider::new(Canned::Reply(None));
        let sink = SharedBuffer::default();
        let handler = ChatRequestHandler::new(provider).with_diagnostics(sink.clone());

        let content = handler.respond("anything").await.unwrap();
        assert!(content.is_none());
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn failure_is_logged_once_and_returned() {
        let (provider, calls) =
            RecordingProvider::new(Canned::Fail("connection refused".to_owned()));
        let sink = SharedBuffer::default();
        let handler = ChatRequestHandler::new(provider).with_diagnostics(sink.clone());

        let err = handler.respond("anything").await.unwrap_err();

        assert!(matches!(&err, ChatbotError::Upstream(detail) if detail == "connection refused"));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(
            sink.contents(),
            "Error calling OpenAI API: upstream call failed: connection refused\n"
        );
    }
}
