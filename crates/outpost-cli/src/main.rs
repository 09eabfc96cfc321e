use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use outpost_core::impls::{FileStore, ManualConnectivity};
use outpost_core::ports::{ConnectivityProvider, RequestExecutor};
use outpost_core::{
    EnqueueOptions, ExecutorError, Method, QueueBuilder, QueueConfig, QueueEvent, QueueItem,
};

/// Demo host: buffers requests while "offline", then drains them.
#[derive(Debug, Parser)]
#[command(name = "outpost", version)]
struct Args {
    /// Directory holding the persisted queue
    #[arg(long, env = "OUTPOST_STATE_DIR", default_value = "./outpost-state")]
    state_dir: PathBuf,

    /// Number of requests to enqueue
    #[arg(long, default_value_t = 3)]
    requests: u32,

    /// Transient failures the simulated server returns before succeeding
    #[arg(long, default_value_t = 2)]
    fail_first: u32,

    /// Stay offline this long before connectivity comes back
    #[arg(long, default_value_t = 500)]
    offline_ms: u64,

    /// Backoff base; overrides OUTPOST_BASE_DELAY_MS
    #[arg(long)]
    base_delay_ms: Option<u64>,
}

/// 最初の N 回だけ一時的に失敗する executor
struct FlakyExecutor {
    remaining_failures: AtomicU32,
    connectivity: Arc<ManualConnectivity>,
}

impl FlakyExecutor {
    fn new(n: u32, connectivity: Arc<ManualConnectivity>) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
            connectivity,
        }
    }
}

#[async_trait]
impl RequestExecutor for FlakyExecutor {
    async fn execute(&self, item: &QueueItem) -> Result<(), ExecutorError> {
        if !self.connectivity.is_online() {
            return Err(ExecutorError::connectivity("network unreachable"));
        }
        sleep(Duration::from_millis(20)).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ExecutorError::transient(format!(
                "503 from {} (failures left={left})",
                item.target
            )));
        }
        Ok(())
    }
}

fn log_event(event: &QueueEvent) {
    match event {
        QueueEvent::Queued { item, queue_size } => {
            info!(item_id = %item.id, queue_size, "queued")
        }
        QueueEvent::Processing { item, .. } => info!(item_id = %item.id, "processing"),
        QueueEvent::Success { item, queue_size } => {
            info!(item_id = %item.id, queue_size, "success")
        }
        QueueEvent::Retry {
            item, error, delay, ..
        } => warn!(
            item_id = %item.id,
            retry_count = item.retry_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "retry"
        ),
        QueueEvent::Error { item, error, .. } => {
            warn!(item_id = %item.id, error = %error, "gave up")
        }
        QueueEvent::Cleared { queue_size } => info!(queue_size, "cleared"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // (A) 設定：環境変数 + CLI 上書き
    let mut config = QueueConfig::from_env().context("reading OUTPOST_* configuration")?;
    if let Some(base) = args.base_delay_ms {
        let base = Duration::from_millis(base);
        let max_delay = config.max_delay.max(base);
        config = config.with_backoff(base, max_delay);
    }

    // (B) ports を用意してキューを組み立てる（オフラインで開始）
    let connectivity = Arc::new(ManualConnectivity::new(false));
    let executor = Arc::new(FlakyExecutor::new(args.fail_first, connectivity.clone()));
    let queue = QueueBuilder::new()
        .config(config)
        .store(Arc::new(FileStore::new(&args.state_dir)))
        .connectivity(connectivity.clone())
        .executor(executor)
        .subscribe(log_event)
        .build()
        .context("building queue")?;

    if let Some(diagnostic) = queue.load_diagnostic() {
        warn!(diagnostic, "problem loading previous queue state");
    }
    info!(
        restored = queue.len(),
        state_dir = %args.state_dir.display(),
        "queue ready"
    );

    // (C) オフライン中に投入
    for n in 0..args.requests {
        queue
            .enqueue(
                "demo.note.create",
                Method::Post,
                "/api/notes",
                Some(serde_json::json!({ "n": n })),
                EnqueueOptions::new().with_priority(i32::try_from(n % 2).unwrap_or(0)),
            )
            .context("enqueue")?;
    }

    // (D) しばらくしてからオンラインへ
    sleep(Duration::from_millis(args.offline_ms)).await;
    info!("connectivity restored");
    connectivity.set_online(true);

    // (E) 空になるか Ctrl-C まで待つ
    loop {
        if queue.is_empty() {
            break;
        }
        tokio::select! {
            _ = sleep(Duration::from_millis(50)) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!(pending = queue.len(), "interrupted; pending requests stay on disk");
                break;
            }
        }
    }

    queue.wait_idle().await;
    info!(status = ?queue.status(), "done");
    queue.destroy();
    Ok(())
}
