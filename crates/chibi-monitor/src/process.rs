//! 현재 프로세스 자원 카운터.
//!
//! `ProcessProbe` 포트 구현. sysinfo 기반 누적 CPU 시간/상주 메모리 수집.

use chibi_core::error::CoreError;
use chibi_core::models::metrics::MemoryCounters;
use chibi_core::ports::host::ProcessProbe;
use std::sync::Mutex;
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

/// sysinfo 기반 프로세스 프로브: `ProcessProbe` 포트 구현
///
/// 네이티브 프로세스에는 관리 힙의 빈 영역 개념이 없으므로
/// 메모리 카운터는 상주 메모리(RSS)를 전체로, 빈 영역을 0으로 보고한다.
pub struct SysInfoProbe {
    sys: Mutex<System>,
    pid: Pid,
    cores: usize,
}

/// 프로세스 1회 갱신 결과
struct ProcessReading {
    cpu_time_ms: u64,
    resident_bytes: u64,
}

impl SysInfoProbe {
    /// 현재 프로세스용 프로브 생성
    pub fn new() -> Result<Self, CoreError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| CoreError::Sampling(format!("현재 PID 조회 실패: {e}")))?;

        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
        );
        let cores = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        debug!("프로세스 프로브 생성: pid={pid}, 논리 코어={cores}");

        Ok(Self {
            sys: Mutex::new(sys),
            pid,
            cores,
        })
    }

    fn read(&self) -> Result<ProcessReading, CoreError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| CoreError::Internal(format!("시스템 잠금 실패: {e}")))?;

        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        let process = sys
            .process(self.pid)
            .ok_or_else(|| CoreError::Sampling(format!("프로세스 정보 없음: pid={}", self.pid)))?;

        Ok(ProcessReading {
            cpu_time_ms: process.accumulated_cpu_time(),
            resident_bytes: process.memory(),
        })
    }
}

impl ProcessProbe for SysInfoProbe {
    fn cpu_time_nanos(&self) -> Result<u64, CoreError> {
        Ok(self.read()?.cpu_time_ms.saturating_mul(1_000_000))
    }

    fn available_cores(&self) -> usize {
        self.cores
    }

    fn memory_counters(&self) -> Result<MemoryCounters, CoreError> {
        Ok(MemoryCounters {
            total_bytes: self.read()?.resident_bytes,
            free_bytes: 0,
        })
    }
}
