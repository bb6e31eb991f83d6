// ==========================================
// 八字排盘引擎 - 性能统计
// ==========================================
// PerfGuard 在 drop 时以 target "perf" 输出耗时
// 可附带缓存命中/模块数等计数
// ==========================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 性能统计 Guard：记录 elapsed_ms 与附加计数
///
/// 使用方式：
/// ```ignore
/// let perf = bazi_engine::perf::PerfGuard::new("orchestrator.execute");
/// perf.add_cache_hit();
/// // do work...
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    cache_hits: AtomicU64,
    modules: AtomicU64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            cache_hits: AtomicU64::new(0),
            modules: AtomicU64::new(0),
        }
    }

    pub fn add_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_module(&self) {
        self.modules.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.elapsed_ms(),
            modules = self.modules.load(Ordering::Relaxed),
            cache_hits = self.cache_hits.load(Ordering::Relaxed),
            "done"
        );
    }
}
