//! PRIVMSG and NOTICE

use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::utils::string::is_channel_target;
use crate::{Message, MessageType, ReplyError};

impl Dispatcher {
    /// Handle PRIVMSG command
    pub(crate) fn handle_privmsg(&self, message: &Message) -> HandlerResult {
        for error in self.relay(message, MessageType::PrivMsg)? {
            self.reply_error(&error);
        }
        Ok(Flow::Continue)
    }

    /// Handle NOTICE command.
    /// Failures are never reported back.
    pub(crate) fn handle_notice(&self, message: &Message) -> Flow {
        let _ = self.relay(message, MessageType::Notice);
        Flow::Continue
    }

    /// Route `message` to each of its comma separated targets.
    ///
    /// Fails outright if there is no target or no text; otherwise returns
    /// the per-target failures.
    fn relay(&self, message: &Message, kind: MessageType) -> Result<Vec<ReplyError>, ReplyError> {
        let targets = message
            .param(0)
            .ok_or_else(|| ReplyError::NoRecipient(kind.to_string()))?;
        let text = message.param(1).ok_or(ReplyError::NoTextToSend)?;

        let router = &self.state().router;
        let sender = self.session().id();
        let mut failures = Vec::new();

        for target in targets.split(',').filter(|t| !t.is_empty()) {
            let relayed = Message::with_prefix(
                self.session().prefix(),
                kind.clone(),
                vec![target.to_string(), text.to_string()],
            );

            let result = if is_channel_target(target) {
                router.send_to_channel(target, sender, &relayed).map(|_| ())
            } else {
                router.send_to_nick(target, &relayed)
            };
            if let Err(error) = result {
                failures.push(error);
            }
        }
        Ok(failures)
    }
}
