//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PollerBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PollerBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PollerBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PollerBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}
