//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 地址列表加载
//! - 模拟 e2e 测试（无需真实 PLC）：SimulatedController → CycleScheduler → Dispatcher → sinks
//! - 慢 sink 隔离

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use config_loader::ConfigLoader;
    use contracts::{PayloadChannel, SinkType};
    use tempfile::tempdir;

    #[test]
    fn test_blueprint_with_csv_addresses() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("plc_addresses.csv");
        let mut file = std::fs::File::create(&csv).unwrap();
        writeln!(file, "Motor1.Speed,REAL\nMotor1.Running,BOOL\n# spare\nTank.Level,REAL").unwrap();

        let toml = format!(
            r#"
            [controller]
            host = "192.168.1.10"
            read_timeout_ms = 2000

            [addresses]
            file = "{}"

            [polling]
            workers = 2
            batch_size = 50
            period_ms = 1000

            [publish]
            full = true

            [[sinks]]
            name = "bus"
            sink_type = "nats"
            channels = ["changed"]
            [sinks.params]
            url = "nats://127.0.0.1:4222"
            "#,
            csv.display().to_string().replace('\\', "/")
        );

        let blueprint =
            ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.controller.read_timeout_ms, Some(2000));
        assert!(blueprint.publish.full && blueprint.publish.changed);
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::Nats);
        assert_eq!(blueprint.sinks[0].channels, vec![PayloadChannel::Changed]);

        let addresses = ConfigLoader::load_addresses(&blueprint).unwrap();
        assert_eq!(addresses, vec!["Motor1.Speed", "Motor1.Running", "Tank.Level"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ContractError, DataSink, PayloadChannel, PublishBatch, PublishConfig, SinkConfig,
        SinkType, TagAddress,
    };
    use controller::{SimulatedConfig, SimulatedController};
    use dispatcher::{create_dispatcher, Dispatcher, SinkHandle};
    use poller::{CancellationToken, CycleScheduler, SchedulerConfig};
    use tempfile::tempdir;

    fn addresses(tags: &[&str]) -> Vec<TagAddress> {
        tags.iter().map(|t| TagAddress::from(*t)).collect()
    }

    fn file_sink(name: &str, base: &Path, channels: Vec<PayloadChannel>) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::File,
            enabled: true,
            channels,
            queue_capacity: 64,
            params: HashMap::from([(
                "base_path".to_string(),
                base.to_string_lossy().to_string(),
            )]),
        }
    }

    fn scheduler_config(workers: usize, period_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            batch_size: 2,
            period: Duration::from_millis(period_ms),
            read_timeout: None,
            max_cycles: None,
        }
    }

    fn scripted_controller(values: &[(&str, i64)]) -> SimulatedController {
        let controller = SimulatedController::new(SimulatedConfig {
            endpoint: "sim:44818".to_string(),
            ..Default::default()
        });
        for (tag, v) in values {
            controller.set_value(*tag, *v);
        }
        controller
    }

    /// End-to-end test: SimulatedController -> CycleScheduler -> Dispatcher -> FileSink
    ///
    /// 验证完整的数据流：
    /// 1. 第一个周期所有地址都算作变化
    /// 2. 数值不变时 changed 通道为空，full 通道仍然完整
    /// 3. 修改一个数值后只有该地址出现在 changed 通道
    #[tokio::test]
    async fn test_e2e_simulated_pipeline() {
        let dir = tempdir().unwrap();
        let tags = ["A", "B", "C", "D", "E"];
        let controller = scripted_controller(&[("A", 1), ("B", 2), ("C", 3), ("D", 4), ("E", 5)]);

        let publish = PublishConfig {
            full: true,
            changed: true,
        };
        let dispatcher = create_dispatcher(
            vec![file_sink("out", dir.path(), PayloadChannel::ALL.to_vec())],
            publish,
        )
        .await
        .unwrap();

        let mut scheduler =
            CycleScheduler::new(scheduler_config(2, 10), &addresses(&tags), dispatcher).unwrap();
        scheduler.start(&controller).await.unwrap();

        let first = scheduler.run_cycle().await.unwrap();
        assert_eq!(first.full_count, 5);
        assert_eq!(first.changed_count, 5);

        let second = scheduler.run_cycle().await.unwrap();
        assert_eq!(second.full_count, 5);
        assert_eq!(second.changed_count, 0);

        controller.set_value("D", 40i64);
        let third = scheduler.run_cycle().await.unwrap();
        assert_eq!(third.changed_count, 1);

        let dispatcher = scheduler.shutdown().await;
        assert_eq!(controller.open_connections(), 0);
        let report = dispatcher.shutdown().await;
        assert_eq!(report[0].1.write_count, 6);
        assert_eq!(report[0].1.failure_count, 0);

        let full = std::fs::read_to_string(dir.path().join("full.log")).unwrap();
        assert_eq!(full.lines().count(), 15);
        // every cycle keeps shard order A..E
        let first_cycle: Vec<&str> = full
            .lines()
            .take(5)
            .map(|l| l.split(", ").next().unwrap())
            .collect();
        assert_eq!(first_cycle, tags);

        let changed = std::fs::read_to_string(dir.path().join("changed.log")).unwrap();
        let lines: Vec<&str> = changed.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[5].starts_with("D, "));
        assert!(lines[5].ends_with(", 40"));
    }

    /// Scenario C end to end: one worker's connection drops for a cycle
    #[tokio::test]
    async fn test_e2e_degraded_cycle_keeps_stale_shard() {
        let dir = tempdir().unwrap();
        let controller = scripted_controller(&[("A", 1), ("B", 2), ("C", 3), ("D", 4)]);

        let dispatcher = create_dispatcher(
            vec![file_sink("out", dir.path(), vec![PayloadChannel::Changed])],
            PublishConfig::default(),
        )
        .await
        .unwrap();

        let mut scheduler = CycleScheduler::new(
            scheduler_config(2, 10),
            &addresses(&["A", "B", "C", "D"]),
            dispatcher,
        )
        .unwrap();
        scheduler.start(&controller).await.unwrap();
        scheduler.run_cycle().await.unwrap();

        // shard 1 owns C and D
        controller.set_worker_offline(1, true);
        controller.set_value("A", 10i64);
        controller.set_value("C", 30i64);
        let degraded = scheduler.run_cycle().await.unwrap();
        assert!(degraded.degraded);
        assert_eq!(degraded.failed_shards, vec![1]);
        assert_eq!(degraded.full_count, 2);
        assert_eq!(degraded.changed_count, 1);

        // C is still compared against its pre-outage value
        controller.set_worker_offline(1, false);
        let recovered = scheduler.run_cycle().await.unwrap();
        assert!(!recovered.degraded);
        assert_eq!(recovered.changed_count, 1);

        let dispatcher = scheduler.shutdown().await;
        dispatcher.shutdown().await;

        let changed = std::fs::read_to_string(dir.path().join("changed.log")).unwrap();
        let tags: Vec<&str> = changed
            .lines()
            .map(|l| l.split(", ").next().unwrap())
            .collect();
        assert_eq!(tags, vec!["A", "B", "C", "D", "A", "C"]);
    }

    /// Sink that is much slower than the poll period
    struct SlowSink {
        written: Arc<AtomicU64>,
    }

    impl DataSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn write(&mut self, _batch: &PublishBatch) -> Result<(), ContractError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.written.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// A slow sink drops batches instead of stalling the polling loop
    #[tokio::test]
    async fn test_slow_sink_does_not_block_polling() {
        let controller = scripted_controller(&[("A", 1), ("B", 2)]);
        let written = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(
            SlowSink {
                written: Arc::clone(&written),
            },
            1,
        );
        let dispatcher = Dispatcher::with_handles(vec![handle], PublishConfig::default());

        let config = SchedulerConfig {
            max_cycles: Some(6),
            ..scheduler_config(2, 10)
        };
        let mut scheduler =
            CycleScheduler::new(config, &addresses(&["A", "B"]), dispatcher).unwrap();
        scheduler.start(&controller).await.unwrap();

        let (summary, dispatcher) = scheduler.run(CancellationToken::new()).await.unwrap();
        assert_eq!(summary.cycles, 6);
        assert_eq!(summary.late_cycles, 0);

        let report = dispatcher.shutdown().await;
        let metrics = report[0].1;
        assert!(metrics.dropped_count >= 1);
        assert_eq!(metrics.write_count + metrics.dropped_count, 6);
        assert_eq!(written.load(Ordering::Relaxed), metrics.write_count);
    }

    /// Cancellation from outside stops the loop between cycles
    #[tokio::test]
    async fn test_cancel_stops_running_pipeline() {
        let dir = tempdir().unwrap();
        let controller = scripted_controller(&[("A", 1)]);
        let dispatcher = create_dispatcher(
            vec![file_sink("out", dir.path(), vec![PayloadChannel::Full])],
            PublishConfig {
                full: true,
                changed: false,
            },
        )
        .await
        .unwrap();

        let mut scheduler =
            CycleScheduler::new(scheduler_config(1, 20), &addresses(&["A"]), dispatcher).unwrap();
        scheduler.start(&controller).await.unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn(scheduler.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(70)).await;
        cancel.cancel();

        let (summary, dispatcher) = run.await.unwrap().unwrap();
        assert!(summary.cycles >= 1);
        assert_eq!(controller.open_connections(), 0);

        let report = dispatcher.shutdown().await;
        assert_eq!(report[0].1.write_count, summary.cycles);

        let full = std::fs::read_to_string(dir.path().join("full.log")).unwrap();
        assert_eq!(full.lines().count() as u64, summary.cycles);
    }
}
