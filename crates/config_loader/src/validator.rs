//! 配置校验模块
//!
//! 校验规则：
//! - workers >= 1, batch_size >= 1, period_ms >= 1
//! - read_timeout_ms >= 1 (如已设置)
//! - 地址来源二选一，内联列表不能为空
//! - change_probability 在 [0, 1] 之间
//! - sink 名称非空且唯一，queue_capacity >= 1

use std::collections::HashSet;

use contracts::{ContractError, PollerBlueprint};

/// 校验 PollerBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    validate_polling(blueprint)?;
    validate_controller(blueprint)?;
    validate_addresses(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 校验轮询节奏
fn validate_polling(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    let polling = &blueprint.polling;

    if polling.workers == 0 {
        return Err(ContractError::config_validation(
            "polling.workers",
            "workers must be >= 1",
        ));
    }

    if polling.batch_size == 0 {
        return Err(ContractError::config_validation(
            "polling.batch_size",
            "batch_size must be >= 1",
        ));
    }

    if polling.period_ms == 0 {
        return Err(ContractError::config_validation(
            "polling.period_ms",
            "period_ms must be >= 1",
        ));
    }

    Ok(())
}

/// 校验控制器配置
fn validate_controller(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    let controller = &blueprint.controller;

    if controller.read_timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            "controller.read_timeout_ms",
            "read_timeout_ms must be >= 1",
        ));
    }

    let p = controller.simulation.change_probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(ContractError::config_validation(
            "controller.simulation.change_probability",
            format!("change_probability must be within [0, 1], got {p}"),
        ));
    }

    Ok(())
}

/// 校验地址来源
fn validate_addresses(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    let addresses = &blueprint.addresses;

    match (&addresses.file, &addresses.tags) {
        (Some(_), Some(_)) => Err(ContractError::config_validation(
            "addresses",
            "set either addresses.file or addresses.tags, not both",
        )),
        (None, None) => Err(ContractError::config_validation(
            "addresses",
            "one of addresses.file or addresses.tags is required",
        )),
        (None, Some(tags)) if tags.is_empty() => Err(ContractError::config_validation(
            "addresses.tags",
            "address list cannot be empty",
        )),
        (None, Some(tags)) => {
            if let Some(idx) = tags.iter().position(|t| t.trim().is_empty()) {
                return Err(ContractError::config_validation(
                    format!("addresses.tags[{idx}]"),
                    "tag address cannot be empty",
                ));
            }
            Ok(())
        }
        (Some(_), None) => Ok(()),
    }
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be >= 1",
            ));
        }
    }
    Ok(())
}
