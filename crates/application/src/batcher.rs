//! 批量落库器
//!
//! 单一任务独占缓冲区的 actor：消费者把解码后的消息经有界通道
//! 提交进来，首条进入空缓冲区的消息启动一次刷盘倒计时，到期后
//! 整批单事务写库。插入失败时整批放回缓冲区重新计时，无限重试
//! 直到成功，不丢消息。通道写满时提交方阻塞等待（背压），不做
//! 丢弃。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use domain::ChatMessage;

use crate::error::ApplicationError;
use crate::ports::MessageStore;

/// 批量落库器配置
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// 首条消息进入缓冲区后到刷盘的间隔
    pub flush_interval: Duration,
    /// 提交通道容量，写满后提交方阻塞
    pub channel_capacity: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(3000),
            channel_capacity: 1024,
        }
    }
}

/// 批量落库器
pub struct MessageBatcher {
    store: Arc<dyn MessageStore>,
    config: BatcherConfig,
}

/// 落库任务的提交句柄
///
/// 克隆廉价，可被多个提交方共同持有。关停时调用 [`BatcherHandle::stop`]
/// 做最后一次尽力刷盘。
pub struct BatcherHandle {
    tx: mpsc::Sender<ChatMessage>,
    join: JoinHandle<()>,
}

impl MessageBatcher {
    pub fn new(store: Arc<dyn MessageStore>, config: BatcherConfig) -> Self {
        Self { store, config }
    }

    /// 启动落库任务并返回提交句柄
    pub fn start(self) -> BatcherHandle {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let join = tokio::spawn(run_loop(self.store, self.config.flush_interval, rx));
        BatcherHandle { tx, join }
    }
}

impl BatcherHandle {
    /// 提交一条待落库的消息，通道写满时阻塞等待
    pub async fn submit(&self, message: ChatMessage) -> Result<(), ApplicationError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| ApplicationError::storage("落库任务已停止，无法提交消息"))
    }

    /// 关停落库任务：关闭通道，排空余量后做最后一次尽力刷盘
    pub async fn stop(self) {
        drop(self.tx);
        if let Err(err) = self.join.await {
            error!(error = %err, "落库任务异常退出");
        }
    }
}

async fn run_loop(
    store: Arc<dyn MessageStore>,
    flush_interval: Duration,
    mut rx: mpsc::Receiver<ChatMessage>,
) {
    let mut buffer: Vec<ChatMessage> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(message) => {
                    // 首条消息启动倒计时，后续消息搭同一班车
                    if buffer.is_empty() {
                        deadline = Some(Instant::now() + flush_interval);
                    }
                    buffer.push(message);
                }
                None => break,
            },
            _ = wait_until(deadline) => {
                flush(&store, &mut buffer, &mut deadline, flush_interval).await;
            }
        }
    }

    // 关停路径：通道已排空，余量做最后一次尽力刷盘，失败只记日志
    if !buffer.is_empty() {
        let count = buffer.len();
        match store.insert_batch(&buffer).await {
            Ok(()) => info!(count, "关停前余量已落库"),
            Err(err) => error!(count, error = %err, "关停刷盘失败，该批消息丢失"),
        }
    }
    info!("落库任务已退出");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn flush(
    store: &Arc<dyn MessageStore>,
    buffer: &mut Vec<ChatMessage>,
    deadline: &mut Option<Instant>,
    flush_interval: Duration,
) {
    let batch = std::mem::take(buffer);
    if batch.is_empty() {
        *deadline = None;
        return;
    }

    let count = batch.len();
    match store.insert_batch(&batch).await {
        Ok(()) => {
            debug!(count, "批量落库成功");
            *deadline = None;
        }
        Err(err) => {
            // 整批放回并重新计时，无限重试直到数据库恢复
            warn!(count, error = %err, "批量落库失败，整批重新排队");
            *buffer = batch;
            *deadline = Some(Instant::now() + flush_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::ActorRole;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 记录每次插入批次的存储，可配置前 N 次失败
    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<Vec<ChatMessage>>>,
        failures_left: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl RecordingStore {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                ..Default::default()
            }
        }

        fn inserted(&self) -> Vec<ChatMessage> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn insert_batch(&self, messages: &[ChatMessage]) -> Result<(), ApplicationError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ApplicationError::storage("database unavailable"));
            }
            self.batches.lock().unwrap().push(messages.to_vec());
            Ok(())
        }

        async fn list_page(
            &self,
            _conversation_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<ChatMessage>, ApplicationError> {
            Ok(Vec::new())
        }
    }

    fn message(content: &str) -> ChatMessage {
        ChatMessage::new("c1", "1", ActorRole::User, content).unwrap()
    }

    fn start(store: Arc<RecordingStore>, flush_ms: u64) -> BatcherHandle {
        MessageBatcher::new(
            store,
            BatcherConfig {
                flush_interval: Duration::from_millis(flush_ms),
                channel_capacity: 16,
            },
        )
        .start()
    }

    #[tokio::test]
    async fn test_interval_messages_land_in_one_batch() {
        let store = Arc::new(RecordingStore::default());
        let handle = start(store.clone(), 100);

        for i in 0..5 {
            handle.submit(message(&format!("m{}", i))).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(300)).await;

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1, "五条消息应落在同一批次");
        assert_eq!(batches[0].len(), 5);
        drop(batches);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_failed_batch_retried_without_loss_or_duplication() {
        let store = Arc::new(RecordingStore::failing(2));
        let handle = start(store.clone(), 50);

        handle.submit(message("a")).await.unwrap();
        handle.submit(message("b")).await.unwrap();

        // 前两次插入失败，整批重排后第三次成功
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(store.attempts.load(Ordering::SeqCst) >= 3);
        let inserted = store.inserted();
        assert_eq!(inserted.len(), 2, "重试不得丢失或重复");
        let contents: Vec<&str> = inserted.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_flushes_remaining_buffer() {
        let store = Arc::new(RecordingStore::default());
        // 间隔远大于测试时长，只有关停路径会刷盘
        let handle = start(store.clone(), 60_000);

        for i in 0..3 {
            handle.submit(message(&format!("m{}", i))).await.unwrap();
        }
        handle.stop().await;

        assert_eq!(store.inserted().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_submitters_lose_nothing() {
        let store = Arc::new(RecordingStore::default());
        let handle = Arc::new(start(store.clone(), 50));

        let mut tasks = Vec::new();
        for t in 0..5 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..10 {
                    handle
                        .submit(message(&format!("t{}-m{}", t, i)))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = Arc::into_inner(handle).unwrap();
        handle.stop().await;

        let mut contents: Vec<String> =
            store.inserted().into_iter().map(|m| m.content).collect();
        assert_eq!(contents.len(), 50, "并发提交不得丢消息");
        contents.sort();
        contents.dedup();
        assert_eq!(contents.len(), 50, "并发提交不得出现重复");
    }

    #[tokio::test]
    async fn test_late_message_starts_new_batch() {
        let store = Arc::new(RecordingStore::default());
        let handle = start(store.clone(), 50);

        handle.submit(message("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.submit(message("second")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 2, "间隔外到达的消息开启新批次");
        assert_eq!(batches[0][0].content, "first");
        assert_eq!(batches[1][0].content, "second");
        drop(batches);

        handle.stop().await;
    }
}
