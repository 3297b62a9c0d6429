//! 割接报告

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::orchestrator::WorkflowState;

/// 割接报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// 流程名称
    pub name: String,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 结束时间
    pub end_time: Option<DateTime<Utc>>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,

    /// 结束时的流程状态
    pub final_state: WorkflowState,

    /// 涉及的主机数
    pub total_hosts: usize,

    /// 总步骤数
    pub total_steps: usize,

    /// 成功步骤数
    pub success_count: usize,

    /// 失败步骤数
    pub failed_count: usize,

    /// 跳过步骤数
    pub skipped_count: usize,

    /// 首个失败的错误信息
    pub error: Option<String>,

    /// 步骤结果列表
    pub steps: Vec<StepRecord>,
}

impl MigrationReport {
    /// 创建新的割接报告
    pub fn new(name: &str, total_hosts: usize) -> Self {
        Self {
            name: name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            final_state: WorkflowState::Start,
            total_hosts,
            total_steps: 0,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            error: None,
            steps: Vec::new(),
        }
    }

    /// 添加步骤结果
    pub fn add_step(&mut self, record: StepRecord) {
        match record.status {
            StepStatus::Success => self.success_count += 1,
            StepStatus::Failed => self.failed_count += 1,
            StepStatus::Skipped => self.skipped_count += 1,
        }
        self.total_steps += 1;
        self.steps.push(record);
    }

    /// 完成报告
    pub fn finalize(&mut self, final_state: WorkflowState) {
        let end_time = Utc::now();
        self.end_time = Some(end_time);
        self.duration_ms = (end_time - self.start_time).num_milliseconds().max(0) as u64;
        self.final_state = final_state;
    }

    /// 割接是否成功
    pub fn is_success(&self) -> bool {
        self.final_state == WorkflowState::Done && self.failed_count == 0
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// 步骤结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 步骤索引
    pub step_index: usize,

    /// 步骤描述
    pub description: String,

    /// 步骤状态
    pub status: StepStatus,

    /// 错误信息
    pub error: Option<String>,

    /// 耗时（毫秒）
    pub duration_ms: u64,

    /// 输出摘要
    pub output: Option<String>,
}

impl StepRecord {
    /// 创建成功的步骤结果
    pub fn success(step_index: usize, description: &str) -> Self {
        Self {
            step_index,
            description: description.to_string(),
            status: StepStatus::Success,
            error: None,
            duration_ms: 0,
            output: None,
        }
    }

    /// 创建失败的步骤结果
    pub fn failed(step_index: usize, description: &str, error: &str) -> Self {
        Self {
            step_index,
            description: description.to_string(),
            status: StepStatus::Failed,
            error: Some(error.to_string()),
            duration_ms: 0,
            output: None,
        }
    }

    /// 创建跳过的步骤结果
    pub fn skipped(step_index: usize, description: &str) -> Self {
        Self {
            step_index,
            description: description.to_string(),
            status: StepStatus::Skipped,
            error: None,
            duration_ms: 0,
            output: None,
        }
    }
}

/// 步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// 成功
    Success,

    /// 失败
    Failed,

    /// 跳过
    Skipped,
}
