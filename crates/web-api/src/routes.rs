use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use domain::{ActorId, ChatMessage, ConversationGroup};

use crate::{error::ApiError, state::AppState, ws_connection};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationPayload {
    user_id: String,
    seller_id: String,
}

#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    actor: String,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationDto {
    id: String,
    is_group: bool,
    creator_id: String,
    participant_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 创建会话的响应：会话本身加上本次是否新建的标记
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationDto {
    #[serde(flatten)]
    conversation: ConversationDto,
    is_new: bool,
}

impl From<ConversationGroup> for ConversationDto {
    fn from(group: ConversationGroup) -> Self {
        Self {
            id: group.id,
            is_group: group.is_group,
            creator_id: group.creator_id,
            participant_ids: group.participant_ids,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

/// 会话列表条目：会话本身加上对端在线状态和未读计数
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationSummaryDto {
    id: String,
    peer_id: Option<String>,
    peer_online: bool,
    unseen_count: i64,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageDto {
    conversation_id: String,
    sender_id: String,
    sender_type: String,
    content: String,
    attachments: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_type: message.sender_type.as_str().to_string(),
            content: message.content,
            attachments: message.attachments,
            created_at: message.created_at,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(get_messages),
        )
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 查找或创建买家与卖家之间的 1:1 会话
///
/// 同一无序 {user, seller} 对复用既有会话，不存在时创建
/// 会话组和两行参与者记录。
async fn create_conversation(
    State(state): State<AppState>,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<(StatusCode, Json<CreateConversationDto>), ApiError> {
    if let Some(existing) = state
        .conversations
        .find_by_pair(&payload.user_id, &payload.seller_id)
        .await?
    {
        let body = CreateConversationDto {
            conversation: existing.into(),
            is_new: false,
        };
        return Ok((StatusCode::OK, Json(body)));
    }

    let group = ConversationGroup::new_direct(&payload.user_id, &payload.seller_id)?;
    state.conversations.create_with_participants(&group).await?;

    let body = CreateConversationDto {
        conversation: group.into(),
        is_new: true,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// 某参与者的会话列表，附带对端在线状态和未读计数
///
/// 在线状态和未读计数都是尽力而为的装饰：缓存故障时分别退化
/// 为离线和 0，列表本身照常返回。
async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<ConversationSummaryDto>>, ApiError> {
    let actor: ActorId = query
        .actor
        .parse()
        .map_err(|_| ApiError::bad_request(format!("无效的参与者身份: {}", query.actor)))?;

    let groups = state.conversations.list_for_participant(&actor.id).await?;

    let mut summaries = Vec::with_capacity(groups.len());
    for group in groups {
        let peer_id = group.peer_of(&actor.id).map(str::to_string);

        let peer_online = match &peer_id {
            Some(peer) => match ActorId::new(actor.role.opposite(), peer) {
                Ok(peer_actor) => state.presence.is_online(&peer_actor).await.unwrap_or_else(|err| {
                    warn!(peer = %peer_actor, error = %err, "读取在线状态失败，按离线处理");
                    false
                }),
                Err(_) => false,
            },
            None => false,
        };

        let unseen_count = state
            .unseen_counts
            .read(actor.role, &group.id)
            .await
            .unwrap_or_else(|err| {
                warn!(conversation_id = %group.id, error = %err, "读取未读计数失败，按 0 处理");
                0
            });

        summaries.push(ConversationSummaryDto {
            id: group.id,
            peer_id,
            peer_online,
            unseen_count,
            updated_at: group.updated_at,
        });
    }

    Ok(Json(summaries))
}

/// 分页读取会话历史，读取成功后清零该侧未读计数
async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let actor: ActorId = query
        .actor
        .parse()
        .map_err(|_| ApiError::bad_request(format!("无效的参与者身份: {}", query.actor)))?;

    let group = state
        .conversations
        .get(&conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("会话不存在"))?;

    if !group.has_participant(&actor.id) {
        return Err(ApiError::forbidden("无权访问该会话"));
    }

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);

    let messages = state
        .messages
        .list_page(&conversation_id, page, page_size)
        .await?;

    // 打开历史视为已读，清零失败不影响响应
    if let Err(err) = state.unseen_counts.clear(actor.role, &conversation_id).await {
        warn!(conversation_id, error = %err, "清零未读计数失败，已忽略");
    }

    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| ws_connection::handle_socket(socket, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::{
        ApplicationError, ChatRouter, ConnectionRegistry, ConversationRepository, MessageQueue,
        MessageStore, PresenceStore, UnseenCountStore,
    };
    use async_trait::async_trait;
    use domain::{ActorRole, MessagePayload};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct InMemoryConversations {
        groups: Mutex<Vec<ConversationGroup>>,
    }

    #[async_trait]
    impl ConversationRepository for InMemoryConversations {
        async fn create_with_participants(
            &self,
            group: &ConversationGroup,
        ) -> Result<(), ApplicationError> {
            self.groups.lock().unwrap().push(group.clone());
            Ok(())
        }

        async fn find_by_pair(
            &self,
            user_id: &str,
            seller_id: &str,
        ) -> Result<Option<ConversationGroup>, ApplicationError> {
            Ok(self
                .groups
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.matches_pair(user_id, seller_id))
                .cloned())
        }

        async fn get(
            &self,
            conversation_id: &str,
        ) -> Result<Option<ConversationGroup>, ApplicationError> {
            Ok(self
                .groups
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.id == conversation_id)
                .cloned())
        }

        async fn list_for_participant(
            &self,
            participant_id: &str,
        ) -> Result<Vec<ConversationGroup>, ApplicationError> {
            Ok(self
                .groups
                .lock()
                .unwrap()
                .iter()
                .filter(|g| g.has_participant(participant_id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct InMemoryMessages {
        messages: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl MessageStore for InMemoryMessages {
        async fn insert_batch(&self, messages: &[ChatMessage]) -> Result<(), ApplicationError> {
            self.messages.lock().unwrap().extend_from_slice(messages);
            Ok(())
        }

        async fn list_page(
            &self,
            conversation_id: &str,
            page: u32,
            page_size: u32,
        ) -> Result<Vec<ChatMessage>, ApplicationError> {
            let messages = self.messages.lock().unwrap();
            let mut matched: Vec<ChatMessage> = messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(matched
                .into_iter()
                .skip(((page - 1) * page_size) as usize)
                .take(page_size as usize)
                .collect())
        }
    }

    struct StubPresence {
        online: bool,
    }

    #[async_trait]
    impl PresenceStore for StubPresence {
        async fn mark_online(&self, _actor: &ActorId) -> Result<(), ApplicationError> {
            Ok(())
        }
        async fn mark_offline(&self, _actor: &ActorId) -> Result<(), ApplicationError> {
            Ok(())
        }
        async fn is_online(&self, _actor: &ActorId) -> Result<bool, ApplicationError> {
            Ok(self.online)
        }
    }

    #[derive(Default)]
    struct StubUnseen {
        count: i64,
    }

    #[async_trait]
    impl UnseenCountStore for StubUnseen {
        async fn increment(
            &self,
            _role: ActorRole,
            _conversation_id: &str,
        ) -> Result<i64, ApplicationError> {
            Ok(self.count + 1)
        }
        async fn clear(
            &self,
            _role: ActorRole,
            _conversation_id: &str,
        ) -> Result<(), ApplicationError> {
            Ok(())
        }
        async fn read(
            &self,
            _role: ActorRole,
            _conversation_id: &str,
        ) -> Result<i64, ApplicationError> {
            Ok(self.count)
        }
    }

    struct NoopQueue;

    #[async_trait]
    impl MessageQueue for NoopQueue {
        async fn publish(&self, _payload: &MessagePayload) -> Result<(), ApplicationError> {
            Ok(())
        }
    }

    fn test_state(presence_online: bool, unseen: i64) -> AppState {
        let presence: Arc<dyn PresenceStore> = Arc::new(StubPresence {
            online: presence_online,
        });
        let unseen_counts: Arc<dyn UnseenCountStore> = Arc::new(StubUnseen { count: unseen });
        let registry = Arc::new(ConnectionRegistry::new(presence.clone()));
        let chat_router = Arc::new(ChatRouter::new(
            registry,
            unseen_counts.clone(),
            Arc::new(NoopQueue),
        ));
        AppState::new(
            chat_router,
            presence,
            unseen_counts,
            Arc::new(InMemoryConversations::default()),
            Arc::new(InMemoryMessages::default()),
        )
    }

    #[tokio::test]
    async fn test_create_conversation_reuses_existing_pair() {
        let state = test_state(false, 0);

        let (status, Json(first)) = create_conversation(
            State(state.clone()),
            Json(CreateConversationPayload {
                user_id: "1".to_string(),
                seller_id: "9".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(first.is_new);

        // 顺序颠倒同样命中既有会话
        let (status, Json(second)) = create_conversation(
            State(state),
            Json(CreateConversationPayload {
                user_id: "1".to_string(),
                seller_id: "9".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(!second.is_new);
        assert_eq!(first.conversation.id, second.conversation.id);
    }

    #[tokio::test]
    async fn test_create_conversation_rejects_identical_parties() {
        let state = test_state(false, 0);

        let result = create_conversation(
            State(state),
            Json(CreateConversationPayload {
                user_id: "1".to_string(),
                seller_id: "1".to_string(),
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_conversations_decorates_online_and_unseen() {
        let state = test_state(true, 3);
        let group = ConversationGroup::new_direct("1", "9").unwrap();
        state.conversations.create_with_participants(&group).await.unwrap();

        let Json(summaries) = list_conversations(
            State(state),
            Query(ActorQuery {
                actor: "user_1".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].peer_id.as_deref(), Some("9"));
        assert!(summaries[0].peer_online);
        assert_eq!(summaries[0].unseen_count, 3);
    }

    #[tokio::test]
    async fn test_list_conversations_rejects_bare_id() {
        let state = test_state(false, 0);

        let result = list_conversations(
            State(state),
            Query(ActorQuery {
                actor: "1".to_string(),
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_messages_enforces_membership() {
        let state = test_state(false, 0);
        let group = ConversationGroup::new_direct("1", "9").unwrap();
        state.conversations.create_with_participants(&group).await.unwrap();

        let result = get_messages(
            State(state),
            Path(group.id.clone()),
            Query(HistoryQuery {
                actor: "user_2".to_string(),
                page: None,
                page_size: None,
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_get_messages_unknown_conversation_is_404() {
        let state = test_state(false, 0);

        let result = get_messages(
            State(state),
            Path("missing".to_string()),
            Query(HistoryQuery {
                actor: "user_1".to_string(),
                page: None,
                page_size: None,
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_messages_paginates_newest_first() {
        let state = test_state(false, 0);
        let group = ConversationGroup::new_direct("1", "9").unwrap();
        state.conversations.create_with_participants(&group).await.unwrap();

        let batch: Vec<ChatMessage> = (0..5i64)
            .map(|i| {
                let mut m = ChatMessage::new(&group.id, "1", ActorRole::User, format!("m{}", i))
                    .unwrap();
                m.created_at = Utc::now() + chrono::Duration::milliseconds(i);
                m
            })
            .collect();
        state.messages.insert_batch(&batch).await.unwrap();

        let Json(page) = get_messages(
            State(state),
            Path(group.id.clone()),
            Query(HistoryQuery {
                actor: "user_1".to_string(),
                page: Some(1),
                page_size: Some(3),
            }),
        )
        .await
        .unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(page[0].content, "m4");
    }

    #[tokio::test]
    async fn test_get_messages_defaults_to_ten_per_page() {
        let state = test_state(false, 0);
        let group = ConversationGroup::new_direct("1", "9").unwrap();
        state.conversations.create_with_participants(&group).await.unwrap();

        let batch: Vec<ChatMessage> = (0..12i64)
            .map(|i| {
                let mut m = ChatMessage::new(&group.id, "1", ActorRole::User, format!("m{}", i))
                    .unwrap();
                m.created_at = Utc::now() + chrono::Duration::milliseconds(i);
                m
            })
            .collect();
        state.messages.insert_batch(&batch).await.unwrap();

        let Json(page) = get_messages(
            State(state),
            Path(group.id.clone()),
            Query(HistoryQuery {
                actor: "user_1".to_string(),
                page: None,
                page_size: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(page.len(), 10);
        assert_eq!(page[0].content, "m11");
    }
}
