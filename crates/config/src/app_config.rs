use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 工作台配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub refresh: RefreshConfig,
    pub timeline: TimelineOptions,
}

/// 后端调度器（simal）访问配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    /// 随每次改期请求以 X-User-Id 头上送的操作员标识
    pub operator_id: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineOptions {
    pub editable: bool,
    pub show_current_time: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8081".to_string(),
                operator_id: default_operator_id(),
                request_timeout_seconds: 30,
            },
            refresh: RefreshConfig { interval_ms: 30_000 },
            timeline: TimelineOptions {
                editable: true,
                show_current_time: true,
            },
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("backend.base_url", "http://localhost:8081")?
            .set_default("backend.operator_id", default_operator_id())?
            .set_default("backend.request_timeout_seconds", 30i64)?
            .set_default("refresh.interval_ms", 30_000i64)?
            .set_default("timeline.editable", true)?
            .set_default("timeline.show_current_time", true)?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/workbench.toml",
                "workbench.toml",
                "/etc/workbench/config.toml",
            ];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        let config: AppConfig = builder
            .add_source(Environment::with_prefix("WORKBENCH").separator("__"))
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("解析配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("backend.base_url 不能为空"));
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "backend.base_url 必须以 http:// 或 https:// 开头: {}",
                self.backend.base_url
            ));
        }
        if self.backend.operator_id.trim().is_empty() {
            return Err(anyhow::anyhow!("backend.operator_id 不能为空"));
        }
        if self.backend.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("backend.request_timeout_seconds 必须大于0"));
        }
        if self.refresh.interval_ms < 1_000 {
            return Err(anyhow::anyhow!(
                "refresh.interval_ms 不得小于1000，收到 {}",
                self.refresh.interval_ms
            ));
        }
        Ok(())
    }

    /// 去掉末尾斜杠的基础URL，便于拼接路径
    pub fn backend_base(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }
}

/// 操作员标识默认取 planner@主机名，和Worker按主机命名的方式一致
fn default_operator_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("planner@{host}")
}
