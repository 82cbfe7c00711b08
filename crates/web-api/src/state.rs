use std::sync::Arc;

use application::{
    ChatRouter, ConversationRepository, MessageStore, PresenceStore, UnseenCountStore,
};

#[derive(Clone)]
pub struct AppState {
    pub chat_router: Arc<ChatRouter>,
    pub presence: Arc<dyn PresenceStore>,
    pub unseen_counts: Arc<dyn UnseenCountStore>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageStore>,
}

impl AppState {
    pub fn new(
        chat_router: Arc<ChatRouter>,
        presence: Arc<dyn PresenceStore>,
        unseen_counts: Arc<dyn UnseenCountStore>,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            chat_router,
            presence,
            unseen_counts,
            conversations,
            messages,
        }
    }
}
