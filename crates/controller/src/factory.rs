//! ConnectionFactory 核心实现
//!
//! 为每个 worker 打开一个独占的控制器连接。

use tracing::{info, instrument, warn};

use crate::connector::Connector;

/// Connection Factory
///
/// 负责在启动时为所有 worker 打开连接。
/// 与回滚不同：单个连接打开失败不会中止启动，该 worker 在每个周期报告连接错误。
pub struct ConnectionFactory<'a, C: Connector> {
    connector: &'a C,
}

impl<'a, C: Connector> ConnectionFactory<'a, C> {
    /// 创建新的 ConnectionFactory
    pub fn new(connector: &'a C) -> Self {
        Self { connector }
    }

    /// 为 `worker_count` 个 worker 打开连接
    ///
    /// 返回值按 worker 序号排列，打开失败的位置为 `None`。
    #[instrument(
        name = "connection_factory_open_all",
        skip(self),
        fields(endpoint = %self.connector.endpoint())
    )]
    pub async fn open_all(&self, worker_count: usize) -> Vec<Option<C::Reader>> {
        let mut readers = Vec::with_capacity(worker_count);
        let mut failed = 0usize;

        for worker in 0..worker_count {
            match self.connector.open(worker).await {
                Ok(reader) => readers.push(Some(reader)),
                Err(e) => {
                    warn!(worker, error = %e, "connection open failed, worker starts disconnected");
                    failed += 1;
                    readers.push(None);
                }
            }
        }

        info!(
            opened = worker_count - failed,
            failed, "controller connections opened"
        );

        readers
    }
}
