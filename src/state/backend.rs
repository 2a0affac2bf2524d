/// 陰影投射後端
///
/// 同一套投射演算法的兩種執行方式：`CpuBackend` 在提交時同步算完，作為基準；
/// `ParallelBackend` 丟到專屬執行緒池非同步計算，以通道回報完成
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::vision::shadow_cast::{run_job, JobOutput, ShadowCastJob};

pub trait ShadowCastBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// 提交一批工作，回傳完成憑證
    fn submit(&self, batch: Vec<ShadowCastJob>) -> BatchTicket;
}

/// 一批投射工作的完成憑證
pub enum BatchTicket {
    Ready(Vec<JobOutput>),
    Pending(Receiver<Vec<JobOutput>>),
}

impl BatchTicket {
    pub fn is_ready(&self) -> bool {
        matches!(self, BatchTicket::Ready(_))
    }

    /// 等待完成但保留結果
    pub fn wait(&mut self) {
        if let BatchTicket::Pending(rx) = self {
            let outputs = match rx.recv() {
                Ok(outputs) => outputs,
                Err(err) => {
                    log::warn!("投射後端未回傳結果: {}", err);
                    Vec::new()
                }
            };
            *self = BatchTicket::Ready(outputs);
        }
    }

    pub fn into_outputs(mut self) -> Vec<JobOutput> {
        self.wait();
        match self {
            BatchTicket::Ready(outputs) => outputs,
            BatchTicket::Pending(_) => Vec::new(),
        }
    }
}

/// 同步參考實作
#[derive(Debug, Default)]
pub struct CpuBackend;

impl ShadowCastBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn submit(&self, batch: Vec<ShadowCastJob>) -> BatchTicket {
        BatchTicket::Ready(batch.iter().map(run_job).collect())
    }
}

/// 非同步平行實作
pub struct ParallelBackend {
    pool: Arc<ThreadPool>,
}

impl ParallelBackend {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }
}

impl ShadowCastBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn submit(&self, batch: Vec<ShadowCastJob>) -> BatchTicket {
        let (tx, rx) = bounded(1);
        self.pool.spawn(move || {
            let outputs: Vec<JobOutput> = batch.par_iter().map(run_job).collect();
            if tx.send(outputs).is_err() {
                log::debug!("投射結果無人接收");
            }
        });
        BatchTicket::Pending(rx)
    }
}
