//! 模拟控制器
//!
//! 内存中的 PLC 镜像，用于测试和无硬件运行，支持注入失败场景。
//!
//! 数值类型由地址后缀推断：
//! - `*.bool` / 含 `flag` → 布尔
//! - `*.str` → 文本
//! - `*.int` / 含 `count` → 整数
//! - 其他 → 浮点

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ContractError, SimulationConfig, TagAddress, TagRead, TagReader, TagValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::connector::Connector;
use crate::error::{ControllerError, Result};

/// 模拟控制器配置
#[derive(Debug, Clone, Default)]
pub struct SimulatedConfig {
    /// 控制器地址 (仅用于日志)
    pub endpoint: String,
    /// 每次批量读取的延迟
    pub latency: Duration,
    /// 每次读取时数值变化的概率
    pub change_probability: f64,
    /// 总是读取失败的地址
    pub failing_tags: Vec<String>,
    /// 连接不可用的 worker
    pub offline_workers: Vec<usize>,
    /// 拒绝打开连接的 worker
    pub refuse_workers: Vec<usize>,
    /// 随机种子
    pub seed: u64,
}

impl SimulatedConfig {
    /// 从配置文件的模拟参数构建
    pub fn from_blueprint(endpoint: impl Into<String>, sim: &SimulationConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            latency: Duration::from_millis(sim.latency_ms),
            change_probability: sim.change_probability,
            failing_tags: sim.failing_tags.clone(),
            offline_workers: sim.offline_workers.clone(),
            refuse_workers: Vec::new(),
            seed: sim.seed,
        }
    }
}

/// 共享的 PLC 镜像
struct PlcImage {
    config: SimulatedConfig,
    values: Mutex<HashMap<TagAddress, TagValue>>,
    failing: Mutex<HashSet<TagAddress>>,
    offline: Mutex<HashSet<usize>>,
    rng: Mutex<StdRng>,
    open_connections: AtomicUsize,
    batch_reads: AtomicU64,
}

impl fmt::Debug for PlcImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlcImage")
            .field("endpoint", &self.config.endpoint)
            .field("open_connections", &self.open_connections.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlcImage {
    fn read(&self, address: &TagAddress) -> TagValue {
        let mut values = lock(&self.values);
        let value = values
            .entry(address.clone())
            .or_insert_with(|| initial_value(address, self.config.seed));

        if self.config.change_probability > 0.0 {
            let mut rng = lock(&self.rng);
            if rng.random_bool(self.config.change_probability) {
                drift(value, &mut rng);
            }
        }

        value.clone()
    }
}

/// 根据地址与种子生成确定性的初始值
fn initial_value(address: &TagAddress, seed: u64) -> TagValue {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    address.as_str().hash(&mut hasher);
    let h = hasher.finish();

    let lower = address.to_lowercase();
    if lower.ends_with(".bool") || lower.contains("flag") {
        TagValue::Bool(h % 2 == 0)
    } else if lower.ends_with(".str") {
        TagValue::Text(format!("state-{}", h % 4))
    } else if lower.ends_with(".int") || lower.contains("count") {
        TagValue::Int((h % 1000) as i64)
    } else {
        TagValue::Float((h % 10_000) as f64 / 10.0)
    }
}

/// 随机游走
fn drift(value: &mut TagValue, rng: &mut StdRng) {
    match value {
        TagValue::Bool(b) => *b = !*b,
        TagValue::Int(i) => {
            let step: i64 = rng.random_range(1..=5);
            *i += if rng.random_bool(0.5) { step } else { -step };
        }
        TagValue::Float(f) => {
            let step: f64 = rng.random_range(0.1..1.0);
            *f += if rng.random_bool(0.5) { step } else { -step };
        }
        TagValue::Text(s) => {
            let next = rng.random_range(0..4u32);
            *s = format!("state-{next}");
        }
    }
}

/// 模拟控制器
///
/// 克隆后共享同一个 PLC 镜像，便于测试在运行中修改数值或注入故障。
#[derive(Debug, Clone)]
pub struct SimulatedController {
    image: Arc<PlcImage>,
}

impl SimulatedController {
    /// 使用配置创建模拟控制器
    pub fn new(config: SimulatedConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let failing = config
            .failing_tags
            .iter()
            .map(|t| TagAddress::from(t.as_str()))
            .collect();
        let offline = config.offline_workers.iter().copied().collect();

        Self {
            image: Arc::new(PlcImage {
                config,
                values: Mutex::new(HashMap::new()),
                failing: Mutex::new(failing),
                offline: Mutex::new(offline),
                rng: Mutex::new(rng),
                open_connections: AtomicUsize::new(0),
                batch_reads: AtomicU64::new(0),
            }),
        }
    }

    /// 设置地址的当前值
    pub fn set_value(&self, address: impl Into<TagAddress>, value: impl Into<TagValue>) {
        lock(&self.image.values).insert(address.into(), value.into());
    }

    /// 获取地址的当前值 (不触发随机变化)
    pub fn value(&self, address: &str) -> Option<TagValue> {
        lock(&self.image.values).get(address).cloned()
    }

    /// 设置地址是否读取失败
    pub fn set_tag_failing(&self, address: impl Into<TagAddress>, failing: bool) {
        let address = address.into();
        let mut set = lock(&self.image.failing);
        if failing {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    /// 设置 worker 连接是否离线
    pub fn set_worker_offline(&self, worker: usize, offline: bool) {
        let mut set = lock(&self.image.offline);
        if offline {
            set.insert(worker);
        } else {
            set.remove(&worker);
        }
    }

    /// 当前打开的连接数
    pub fn open_connections(&self) -> usize {
        self.image.open_connections.load(Ordering::SeqCst)
    }

    /// 已执行的批量读取次数
    pub fn batch_reads(&self) -> u64 {
        self.image.batch_reads.load(Ordering::SeqCst)
    }
}

impl Connector for SimulatedController {
    type Reader = SimulatedConnection;

    fn endpoint(&self) -> String {
        self.image.config.endpoint.clone()
    }

    #[instrument(name = "simulated_controller_open", skip(self), fields(worker = worker_index))]
    async fn open(&self, worker_index: usize) -> Result<SimulatedConnection> {
        if self.image.config.refuse_workers.contains(&worker_index) {
            return Err(ControllerError::open_failed(
                self.endpoint(),
                worker_index,
                "connection refused (simulated)",
            ));
        }

        self.image.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedConnection {
            id: format!("{}#{}", self.image.config.endpoint, worker_index),
            worker: worker_index,
            image: Arc::clone(&self.image),
            open: true,
        })
    }
}

/// 模拟连接
#[derive(Debug)]
pub struct SimulatedConnection {
    id: String,
    worker: usize,
    image: Arc<PlcImage>,
    open: bool,
}

impl SimulatedConnection {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.image.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl TagReader for SimulatedConnection {
    fn connection_id(&self) -> &str {
        &self.id
    }

    #[instrument(
        name = "simulated_read_batch",
        skip(self, addresses),
        fields(connection = %self.id, batch = addresses.len())
    )]
    async fn read_batch(
        &mut self,
        addresses: &[TagAddress],
    ) -> std::result::Result<Vec<TagRead>, ContractError> {
        if !self.open {
            return Err(ContractError::controller_connection(
                &self.id,
                "connection closed",
            ));
        }

        let latency = self.image.config.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if lock(&self.image.offline).contains(&self.worker) {
            return Err(ContractError::controller_connection(
                &self.id,
                "controller unreachable (simulated)",
            ));
        }

        self.image.batch_reads.fetch_add(1, Ordering::SeqCst);

        let failing = lock(&self.image.failing).clone();
        let reads = addresses
            .iter()
            .map(|address| {
                if failing.contains(address) {
                    TagRead::failed(address.clone(), "path destination unknown (simulated)")
                } else {
                    TagRead::ok(address.clone(), self.image.read(address))
                }
            })
            .collect();

        Ok(reads)
    }

    async fn close(&mut self) -> std::result::Result<(), ContractError> {
        self.release();
        debug!(connection = %self.id, "simulated connection closed");
        Ok(())
    }
}

impl Drop for SimulatedConnection {
    fn drop(&mut self) {
        self.release();
    }
}
