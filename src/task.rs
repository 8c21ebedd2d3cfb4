// 该文件是 Gaitcheck （步态预检） 项目的一部分。
// src/task.rs - 逐帧扫描与人物验证
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

use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{
  Arc, OnceLock,
  atomic::{AtomicBool, Ordering},
};
use std::{thread, time::Duration};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  config::LabelMatch,
  error::Error,
  frame::Frame,
  input::VideoSource,
  model::{DetectionSet, Predictor},
  output::{EvidenceSink, Render},
};

/// 默认的验证目标标签
pub const PERSON_LABEL: &str = "person";

/// 中断后强制退出前的等待时间
const FORCE_EXIT_SECS: u64 = 30;

/// 停止请求，在帧之间检查
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
  pub fn new() -> Self {
    Self::default()
  }

  /// 进程级的中断信号。第一次调用时安装 Ctrl-C 处理器，
  /// 并启动读取标准输入的线程，读到 `q` 时发出停止请求
  pub fn interrupt() -> Self {
    static INTERRUPT: OnceLock<StopSignal> = OnceLock::new();
    INTERRUPT
      .get_or_init(|| {
        let signal = StopSignal::new();
        let handler = signal.clone();
        if let Err(e) = ctrlc::set_handler(move || {
          if handler.is_raised() {
            return;
          }
          info!("收到中断信号，准备退出...");
          handler.raise();
          thread::spawn(|| {
            thread::sleep(Duration::from_secs(FORCE_EXIT_SECS));
            warn!("强制退出程序");
            std::process::exit(1);
          });
        }) {
          warn!("无法安装 Ctrl-C 处理器: {}", e);
        }
        watch_stdin(signal.clone());
        signal
      })
      .clone()
  }

  pub fn raise(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn reset(&self) {
    self.0.store(false, Ordering::SeqCst);
  }

  pub fn is_raised(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 每读到一行 `q` 就发出一次停止请求，直到标准输入关闭
fn watch_stdin(signal: StopSignal) {
  thread::spawn(move || {
    for line in std::io::stdin().lock().lines() {
      let Ok(line) = line else {
        break;
      };
      if is_quit_command(&line) {
        info!("收到退出指令");
        signal.raise();
      }
    }
  });
}

fn is_quit_command(line: &str) -> bool {
  line.trim().eq_ignore_ascii_case("q")
}

/// 扫描结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanEnd {
  /// 没有读到任何帧
  Empty,
  /// 读完了所有帧
  Exhausted,
  /// 回调、帧数上限或操作者提前结束
  Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
  pub frames_scanned: u64,
  pub end: ScanEnd,
}

/// 单线程逐帧扫描：每帧推理一次，再交给回调
#[derive(Debug, Clone, Default)]
pub struct FrameScanLoop {
  frame_limit: Option<u64>,
  stop: Option<StopSignal>,
}

impl FrameScanLoop {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.frame_limit = frame_limit.filter(|n| *n > 0);
    self
  }

  pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
    self.stop = Some(stop);
    self
  }

  /// 回调返回 `ControlFlow::Break` 时提前结束。推理或回调出错时中止扫描。
  /// 输入源在返回前被丢弃。
  pub fn run<S, P, F>(
    &self,
    mut source: S,
    predictor: &mut P,
    mut on_frame: F,
  ) -> Result<ScanSummary, Error>
  where
    S: VideoSource,
    P: Predictor + ?Sized,
    F: FnMut(&Frame, &DetectionSet) -> Result<ControlFlow<()>, Error>,
  {
    let mut frames_scanned = 0u64;
    let mut now = std::time::Instant::now();

    let end = loop {
      if let Some(limit) = self.frame_limit
        && frames_scanned >= limit
      {
        info!("达到指定帧数 {}, 退出扫描", limit);
        break ScanEnd::Stopped;
      }
      if let Some(stop) = &self.stop
        && stop.is_raised()
      {
        warn!("收到停止请求，退出扫描");
        break ScanEnd::Stopped;
      }

      let Some(frame) = source.next() else {
        break if frames_scanned == 0 {
          ScanEnd::Empty
        } else {
          ScanEnd::Exhausted
        };
      };
      frames_scanned += 1;

      let result = predictor.infer(&frame)?;
      let elapsed_infer = now.elapsed();
      let flow = on_frame(&frame, &result)?;
      let elapsed_frame = now.elapsed();
      now = std::time::Instant::now();
      debug!(
        "第 {} 帧: {} 个检测, 耗时 {:.2?} / {:.2?}",
        frame.number(),
        result.len(),
        elapsed_infer,
        elapsed_frame
      );
      log_detections(&result);

      if flow.is_break() {
        break ScanEnd::Stopped;
      }
    };

    drop(source);
    info!("扫描结束: {} 帧, {:?}", frames_scanned, end);
    Ok(ScanSummary { frames_scanned, end })
  }
}

fn log_detections(result: &DetectionSet) {
  for item in result.items.iter() {
    debug!(
      "  {} {:.2} [{:.1}, {:.1}, {:.1}, {:.1}]",
      item.label, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
    );
  }
  if let Some(panoptic) = &result.panoptic {
    for segment in &panoptic.segments {
      debug!(
        "  区域 {}: {} ({})",
        segment.id,
        segment.label,
        if segment.is_thing { "thing" } else { "stuff" }
      );
    }
  }
}

pub trait Task<S, P: ?Sized, O>: Sized {
  fn run_task(self, source: S, predictor: &mut P, output: O) -> Result<ScanSummary, Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<S: VideoSource, P: Predictor + ?Sized, O: Render> Task<S, P, O> for OneShotTask {
  fn run_task(self, source: S, predictor: &mut P, mut output: O) -> Result<ScanSummary, Error> {
    FrameScanLoop::new()
      .with_frame_limit(Some(1))
      .run(source, predictor, |frame, result| {
        output.render_result(frame, result)?;
        Ok(ControlFlow::Continue(()))
      })
  }
}

/// 处理所有帧并逐帧渲染
#[derive(Debug, Default)]
pub struct ContinuousTask {
  scan: FrameScanLoop,
}

impl ContinuousTask {
  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.scan = self.scan.with_frame_limit(frame_limit);
    self
  }

  pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
    self.scan = self.scan.with_stop_signal(stop);
    self
  }
}

impl<S: VideoSource, P: Predictor + ?Sized, O: Render> Task<S, P, O> for ContinuousTask {
  fn run_task(self, source: S, predictor: &mut P, mut output: O) -> Result<ScanSummary, Error> {
    info!("开始任务...");
    let summary = self.scan.run(source, predictor, |frame, result| {
      output.render_result(frame, result)?;
      Ok(ControlFlow::Continue(()))
    })?;
    info!("任务完成，共处理 {} 帧", summary.frames_scanned);
    Ok(summary)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
  pub passed: bool,
  pub frames_scanned: u64,
  pub evidence_frame_path: Option<PathBuf>,
}

/// 人物验证的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationState {
  Scanning,
  /// 第 `frame_number` 帧（从 1 开始）发现目标，证据已保存
  Found {
    frame_number: u64,
    evidence: PathBuf,
  },
  NotFound {
    frames_scanned: u64,
  },
}

impl ValidationState {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, ValidationState::Scanning)
  }

  /// 终止状态对应的结果
  pub fn result(&self) -> Option<ValidationResult> {
    match self {
      ValidationState::Scanning => None,
      ValidationState::Found {
        frame_number,
        evidence,
      } => Some(ValidationResult {
        passed: true,
        frames_scanned: *frame_number,
        evidence_frame_path: Some(evidence.clone()),
      }),
      ValidationState::NotFound { frames_scanned } => Some(ValidationResult {
        passed: false,
        frames_scanned: *frames_scanned,
        evidence_frame_path: None,
      }),
    }
  }

  /// 扫描结束后调用：仍在扫描时转为 `NotFound`
  fn conclude(&mut self, frames_scanned: u64) -> ValidationResult {
    if !self.is_terminal() {
      *self = ValidationState::NotFound { frames_scanned };
    }
    self.result().unwrap_or(ValidationResult {
      passed: false,
      frames_scanned,
      evidence_frame_path: None,
    })
  }
}

/// 判断视频中是否出现行人：第一帧命中即通过，保存该帧后停止读取
pub struct PersonValidation<E> {
  sink: E,
  target: String,
  policy: LabelMatch,
  scan: FrameScanLoop,
  state: ValidationState,
}

impl<E: EvidenceSink> PersonValidation<E> {
  pub fn new(sink: E) -> Self {
    Self {
      sink,
      target: PERSON_LABEL.to_string(),
      policy: LabelMatch::default(),
      scan: FrameScanLoop::new(),
      state: ValidationState::Scanning,
    }
  }

  pub fn with_label(mut self, target: impl Into<String>) -> Self {
    self.target = target.into();
    self
  }

  pub fn with_match(mut self, policy: LabelMatch) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.scan = self.scan.with_frame_limit(frame_limit);
    self
  }

  pub fn state(&self) -> &ValidationState {
    &self.state
  }

  pub fn run<S, P>(&mut self, source: S, predictor: &mut P) -> Result<ValidationResult, Error>
  where
    S: VideoSource,
    P: Predictor + ?Sized,
  {
    self.state = ValidationState::Scanning;
    info!("开始验证，目标标签: {} ({})", self.target, self.policy);

    let Self {
      sink,
      target,
      policy,
      scan,
      state,
    } = self;

    let summary = scan.run(source, predictor, |frame, result| {
      let Some(hit) = result.find_label(target, *policy) else {
        return Ok(ControlFlow::Continue(()));
      };
      match hit.score() {
        Some(score) => info!(
          "第 {} 帧发现 {} (置信度 {:.2})",
          frame.number(),
          hit.label(),
          score
        ),
        None => info!("第 {} 帧发现区域 {}", frame.number(), hit.label()),
      }
      let evidence = sink.persist(frame, result)?;
      *state = ValidationState::Found {
        frame_number: frame.number(),
        evidence,
      };
      Ok(ControlFlow::Break(()))
    })?;

    if !state.is_terminal() {
      info!("扫描 {} 帧，未发现 {}", summary.frames_scanned, target);
    }
    Ok(state.conclude(summary.frames_scanned))
  }
}
