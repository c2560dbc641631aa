// src/engine.rs
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::{DashboardConfig, MetricConfig};
use crate::drivers::{Batch, DataSource, StreamError, StreamingSmoother};
use crate::recorder::CsvRecorder;
use crate::scheduler::{Scheduler, Ticket};
use crate::types::*;

// 最长等待时间, 保证命令能被及时处理
const IDLE_WAIT: Duration = Duration::from_millis(50);
// 超时被放弃的抓取线程仍在运行, 总数受此限制
const MAX_FETCH_WORKERS: usize = 8;

// 工作线程结束 (包括 panic) 时归还名额
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FetchOutcome {
    ticket: Ticket,
    result: Result<Batch, StreamError>,
}

// 专注度 / 放松度: 各自拥有一个窗口
struct Metric {
    smoother: StreamingSmoother,
    channels: Vec<String>,
    smoothing_window: usize,
}

impl Metric {
    fn new(config: &MetricConfig) -> Result<Self, StreamError> {
        if config.smoothing_window == 0 {
            return Err(StreamError::InvalidSmoothingWindow);
        }
        Ok(Self {
            smoother: StreamingSmoother::new(config.capacity)?,
            channels: config.channels.clone(),
            smoothing_window: config.smoothing_window,
        })
    }

    /// 尚无数据时返回 None
    fn value(&self) -> Option<f64> {
        match self.smoother.selector(&self.channels)? {
            Ok(selector) => Some(self.smoother.smoothed(&selector, self.smoothing_window)),
            Err(err) => {
                warn!("cannot smooth: {err}");
                None
            }
        }
    }
}

struct Engine {
    config: DashboardConfig,
    source: Arc<dyn DataSource>,
    tx: Sender<DashMessage>,
    scheduler: Scheduler,
    stream: StreamingSmoother,
    attention: Metric,
    meditation: Metric,
    noise: Option<StreamingSmoother>,
    recorder: Option<CsvRecorder>,
    results_tx: Sender<FetchOutcome>,
    results_rx: Receiver<FetchOutcome>,
    workers: Arc<AtomicUsize>,
}

pub fn spawn_thread(
    config: DashboardConfig,
    source: Arc<dyn DataSource>,
    tx: Sender<DashMessage>,
    rx_cmd: Receiver<DashCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut engine = match Engine::new(config, source, tx.clone()) {
            Ok(engine) => engine,
            Err(err) => {
                warn!("engine failed to start: {err}");
                tx.send(DashMessage::Log(format!("❌ Engine failed: {err}"))).ok();
                tx.send(DashMessage::Status(false)).ok();
                return;
            }
        };
        engine.run(rx_cmd);
    })
}

impl Engine {
    fn new(config: DashboardConfig, source: Arc<dyn DataSource>, tx: Sender<DashMessage>) -> Result<Self, StreamError> {
        let periods: Vec<_> = config.triggers().into_iter().map(|kind| (kind, config.period(kind))).collect();
        let scheduler = Scheduler::new(&periods, config.fetch_timeout(), Instant::now());
        let recorder = config.record_dir.as_ref().map(CsvRecorder::new).transpose()?;
        let (results_tx, results_rx) = channel();
        Ok(Self {
            stream: StreamingSmoother::new(config.stream.capacity)?,
            attention: Metric::new(&config.attention)?,
            meditation: Metric::new(&config.meditation)?,
            noise: config.noise.as_ref().map(|n| StreamingSmoother::new(n.capacity)).transpose()?,
            config,
            source,
            tx,
            scheduler,
            recorder,
            results_tx,
            results_rx,
            workers: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn run(&mut self, rx_cmd: Receiver<DashCommand>) {
        info!("engine started");
        self.send(DashMessage::Log("⚙️ Engine Ready.".to_owned()));
        self.send(DashMessage::Status(true));

        while !self.scheduler.is_torn_down() {
            // ============================================================
            // 1. 消息处理 (处理 GUI 发来的命令)
            // ============================================================
            loop {
                match rx_cmd.try_recv() {
                    Ok(DashCommand::Refresh(kind)) => self.scheduler.request(kind, Instant::now()),
                    Ok(DashCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                        self.teardown();
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
            if self.scheduler.is_torn_down() {
                break;
            }

            // ============================================================
            // 2. 到期的触发器发起抓取
            // ============================================================
            let now = Instant::now();
            for ticket in self.scheduler.due(now) {
                self.spawn_fetch(ticket);
            }

            // ============================================================
            // 3. 等待抓取结果
            // ============================================================
            let wait = self
                .scheduler
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now))
                .unwrap_or(IDLE_WAIT)
                .min(IDLE_WAIT);
            match self.results_rx.recv_timeout(wait) {
                Ok(outcome) => self.apply(outcome),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        info!("engine stopped");
    }

    /// Runs the fetch on its own thread. A fetch that never returns keeps its
    /// thread; once `MAX_FETCH_WORKERS` are alive no new fetch starts, and the
    /// ticket is left to time out in the scheduler.
    fn spawn_fetch(&self, ticket: Ticket) {
        if self.workers.load(Ordering::SeqCst) >= MAX_FETCH_WORKERS {
            warn!(
                "{} fetch #{} not started, {MAX_FETCH_WORKERS} fetches still running",
                ticket.kind.label(),
                ticket.generation
            );
            return;
        }
        self.workers.fetch_add(1, Ordering::SeqCst);
        let slot = WorkerSlot(Arc::clone(&self.workers));
        let source = Arc::clone(&self.source);
        let dataset = self.config.dataset(ticket.kind).to_owned();
        let results_tx = self.results_tx.clone();
        debug!("{} fetch #{} of `{dataset}`", ticket.kind.label(), ticket.generation);
        thread::spawn(move || {
            let _slot = slot;
            let result = source.fetch(&dataset);
            // 引擎已退出时接收端不存在, 结果直接丢弃
            results_tx.send(FetchOutcome { ticket, result }).ok();
        });
    }

    fn apply(&mut self, outcome: FetchOutcome) {
        let FetchOutcome { ticket, result } = outcome;
        if !self.scheduler.complete(ticket) {
            debug!("discarding stale {} fetch #{}", ticket.kind.label(), ticket.generation);
            return;
        }
        let dataset = self.config.dataset(ticket.kind).to_owned();
        let batch = result.unwrap_or_else(|err| {
            warn!("fetch of `{dataset}` failed: {err}");
            Batch::empty()
        });
        let smoother = match ticket.kind {
            TriggerKind::Stream => &mut self.stream,
            TriggerKind::Attention => &mut self.attention.smoother,
            TriggerKind::Meditation => &mut self.meditation.smoother,
            TriggerKind::Noise => match self.noise.as_mut() {
                Some(noise) => noise,
                None => return,
            },
        };
        let accepted = smoother.ingest(batch);
        if !accepted.is_empty() {
            debug!("{}: {} new samples", ticket.kind.label(), accepted.len());
        }
        if let (Some(recorder), Some(window)) = (self.recorder.as_mut(), smoother.window()) {
            if let Err(err) = recorder.record(&dataset, window.channel_labels(), &accepted) {
                warn!("recording `{dataset}` failed: {err}");
            }
        }
        self.publish(ticket.kind);
    }

    fn publish(&mut self, kind: TriggerKind) {
        let message = match kind {
            TriggerKind::Stream => {
                if self.stream.window().map_or(true, |w| w.is_empty()) {
                    return;
                }
                DashMessage::Stream(self.stream.frame(self.config.stream.visible))
            }
            TriggerKind::Attention => match self.attention.value() {
                Some(value) => DashMessage::Attention(value),
                None => return,
            },
            TriggerKind::Meditation => match self.meditation.value() {
                Some(value) => DashMessage::Meditation(value),
                None => return,
            },
            TriggerKind::Noise => {
                let latest = self
                    .noise
                    .as_ref()
                    .and_then(|noise| noise.recent(1).first().and_then(|s| s.values.first().copied()));
                match latest {
                    Some(value) => DashMessage::Noise(value),
                    None => return,
                }
            }
        };
        self.send(message);
    }

    fn send(&mut self, message: DashMessage) {
        if self.tx.send(message).is_err() && !self.scheduler.is_torn_down() {
            // GUI 已关闭
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        if self.scheduler.is_torn_down() {
            return;
        }
        self.scheduler.teardown();
        self.stream.teardown();
        self.attention.smoother.teardown();
        self.meditation.smoother.teardown();
        if let Some(noise) = self.noise.as_mut() {
            noise.teardown();
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
        info!("engine torn down");
        self.tx.send(DashMessage::Status(false)).ok();
    }
}
