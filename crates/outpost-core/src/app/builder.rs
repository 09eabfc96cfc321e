//! QueueBuilder - OfflineQueue の構築とワイヤリング
//!
//! # 設計原則
//! - 必須の port（store / connectivity / executor）が欠けていたら build() で失敗
//! - 設定は build() 時に検証（Fail-fast）
//! - 省略可能な port は本番用のデフォルトで埋める
//!   （TokioScheduler, SystemClock, UlidGenerator）
//! - builder で登録したリスナーは、復元アイテムの最初の drain より前に登録される

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::impls::TokioScheduler;
use crate::ports::{
    Clock, ConnectivityProvider, DurableStore, IdGenerator, RequestExecutor, Scheduler,
    SystemClock, UlidGenerator,
};
use crate::domain::QueueEvent;
use crate::queue::{ConfigError, Listener, OfflineQueue, QueueConfig, QueueParts};

/// QueueBuilder は OfflineQueue を構築
///
/// # 使用例
/// ```ignore
/// let queue = QueueBuilder::new()
///     .config(QueueConfig::from_env()?)
///     .store(Arc::new(FileStore::new("./state")))
///     .connectivity(connectivity.clone())
///     .executor(Arc::new(HttpExecutor::new(client)))
///     .build()?;
/// ```
#[derive(Default)]
pub struct QueueBuilder {
    config: QueueConfig,
    store: Option<Arc<dyn DurableStore>>,
    connectivity: Option<Arc<dyn ConnectivityProvider>>,
    executor: Option<Arc<dyn RequestExecutor>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    listeners: Vec<Listener>,
}

/// BuildError はキュー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}. Call QueueBuilder::{0}() before build().")]
    MissingComponent(&'static str),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivityProvider>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// 省略時は TokioScheduler
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// 省略時は SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 省略時は clock を使う UlidGenerator
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 起動直後から全イベントを受け取るリスナーを登録
    ///
    /// `build()` 後の `OfflineQueue::subscribe` では、復元済みアイテムの
    /// 最初の配送イベントを取りこぼしうる。こちらはその前に登録される。
    /// 登録は `destroy()` まで有効。
    pub fn subscribe(mut self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// 永続化スロットを読み込み、監視を開始して OfflineQueue を返す
    ///
    /// # 検証
    /// - store / connectivity / executor が設定されているか
    /// - 設定値が妥当か
    /// - tokio ランタイムの中で呼ばれているか
    pub fn build(self) -> Result<OfflineQueue, BuildError> {
        let store = self.store.ok_or(BuildError::MissingComponent("store"))?;
        let connectivity = self
            .connectivity
            .ok_or(BuildError::MissingComponent("connectivity"))?;
        let executor = self
            .executor
            .ok_or(BuildError::MissingComponent("executor"))?;
        self.config.validate()?;

        let runtime = Handle::try_current().map_err(|e| BuildError::NoRuntime(e.to_string()))?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new(runtime.clone())));
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        Ok(OfflineQueue::start(QueueParts {
            config: self.config,
            store,
            connectivity,
            executor,
            scheduler,
            clock,
            ids,
            listeners: self.listeners,
            runtime,
        }))
    }
}
