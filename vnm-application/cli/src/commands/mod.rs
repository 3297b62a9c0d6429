//! CLI 命令处理模块

pub mod common; // 公共输出函数
pub mod migrate;
pub mod report;
pub mod spec;
