//! 全局任务池 - 编排层
//!
//! ## 职责
//!
//! 限制同时运行的批量任务数量（`MAX_WORKERS`），按提交顺序放行。
//!
//! ## 实现
//!
//! - 提交方只往无界通道里塞任务，永远不会阻塞
//! - 唯一的调度协程按 FIFO 取任务，先拿到 Semaphore 许可再 spawn
//! - 许可随任务结束释放，不存在抢占

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info};

use crate::error::{JobError, JobResult};
use crate::models::JobId;

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueuedJob {
    id: JobId,
    work: BoxedJob,
    done: oneshot::Sender<()>,
}

/// 任务池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub max_workers: usize,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub available_slots: usize,
}

pub struct WorkerPool {
    sender: mpsc::UnboundedSender<QueuedJob>,
    semaphore: Arc<Semaphore>,
    max_workers: usize,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// 创建任务池并启动调度协程（需要在 tokio 运行时内调用）
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(max_workers));
        let queued = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        tokio::spawn(dispatch(
            receiver,
            semaphore.clone(),
            queued.clone(),
            active.clone(),
        ));

        info!("✓ 任务池已启动，最大并发任务数: {}", max_workers);

        Self {
            sender,
            semaphore,
            max_workers,
            queued,
            active,
        }
    }

    /// 提交任务，立即返回；任务结束时返回的接收端会收到通知
    pub fn submit<F>(&self, id: JobId, work: F) -> JobResult<oneshot::Receiver<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done, finished) = oneshot::channel();
        self.queued.fetch_add(1, Ordering::SeqCst);

        let job = QueuedJob {
            id,
            work: Box::pin(work),
            done,
        };
        if self.sender.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(JobError::PoolClosed);
        }

        debug!("[任务 {}] 已进入队列", id);
        Ok(finished)
    }

    /// 调度协程是否已退出（此时不再接收任务）
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_workers: self.max_workers,
            active_jobs: self.active.load(Ordering::SeqCst),
            queued_jobs: self.queued.load(Ordering::SeqCst),
            available_slots: self.semaphore.available_permits(),
        }
    }
}

/// 运行中任务计数，任务结束（包括 panic）时自动减一
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
    semaphore: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
) {
    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        queued.fetch_sub(1, Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(active.clone());

        debug!("[任务 {}] 获得执行许可", job.id);
        tokio::spawn(async move {
            job.work.await;
            // 先释放许可再通知
            drop(guard);
            drop(permit);
            let _ = job.done.send(());
        });
    }
    debug!("任务池调度协程退出");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ConcurrencyGauge;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_never_exceeds_max_workers() {
        let pool = WorkerPool::new(2);
        let gauge = Arc::new(ConcurrencyGauge::default());

        let mut handles = Vec::new();
        for _ in 0..6 {
            let gauge = gauge.clone();
            let handle = pool
                .submit(Uuid::new_v4(), async move {
                    let _guard = gauge.enter();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                })
                .unwrap();
            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(gauge.peak(), 2);
        assert_eq!(pool.stats().active_jobs, 0);
        assert_eq!(pool.stats().available_slots, 2);
    }

    #[tokio::test]
    async fn test_fifo_admission() {
        let pool = WorkerPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let order = order.clone();
            handles.push(
                pool.submit(Uuid::new_v4(), async move {
                    order.lock().unwrap().push(i);
                })
                .unwrap(),
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stats_report_queue() {
        let pool = WorkerPool::new(1);
        let (release, wait) = oneshot::channel::<()>();

        let first = pool
            .submit(Uuid::new_v4(), async move {
                let _ = wait.await;
            })
            .unwrap();
        let second = pool.submit(Uuid::new_v4(), async {}).unwrap();

        // 等调度协程放行第一个任务
        for _ in 0..50 {
            if pool.stats().active_jobs == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let stats = pool.stats();
        assert_eq!(stats.max_workers, 1);
        assert_eq!(stats.active_jobs, 1);
        assert_eq!(stats.queued_jobs, 1);
        assert_eq!(stats.available_slots, 0);

        release.send(()).unwrap();
        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(pool.stats().queued_jobs, 0);
    }
}
