// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/lib.rs - 库主文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! # Gaitcheck
//!
//! 基于预训练模型的图片/视频检测与分割，以及“视频中是否有人行走”的预检。
//!
//! - [`profile`]：模型类型到（网络配置, 权重, 阈值）的查表
//! - [`model`]：推理器接口与预测结果，`onnx` 特性提供 ONNX Runtime 实现
//! - [`task`]：逐帧扫描与人物验证状态机
//! - [`detector`]：图片、视频、交互显示与验证任务

pub mod config;
pub mod detector;
pub mod error;
pub mod frame;
pub mod input;
pub mod label;
pub mod model;
pub mod output;
pub mod profile;
pub mod task;

pub use self::config::{Device, DetectorConfig, LabelMatch};
pub use self::detector::{Detector, RenderSummary, processed_path};
pub use self::error::{ConfigurationError, Error, InferenceError, SinkWriteError, SourceOpenError};
pub use self::frame::Frame;
pub use self::model::{DetectItem, DetectionSet, LabelHit, Predictor};
pub use self::profile::{ModelProfile, ModelType, TaskKind};
pub use self::task::{FrameScanLoop, PersonValidation, ScanEnd, ScanSummary, ValidationResult};
