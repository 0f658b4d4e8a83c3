use procfs::{ProcError, process::Process as ProcfsProcess};
use std::convert::TryFrom;

/// Kernel view of a worker, read from /proc/[pid]/stat.
#[derive(Debug, Clone)]
pub struct ProcStatus {
    pub process_id: u32,
    pub state: char,
    pub memory_rss_mb: u64,
    pub cpu_time_jiffies: u64,
}

impl TryFrom<u32> for ProcStatus {
    type Error = ProcError;

    fn try_from(pid: u32) -> Result<Self, Self::Error> {
        let procfs_proc = ProcfsProcess::new(pid as i32)?;
        let stat = procfs_proc.stat()?;
        let page_size: u64 = procfs::page_size();
        let memory_rss_mb = (stat.rss * page_size) / 1024 / 1024;

        Ok(ProcStatus {
            process_id: pid,
            state: stat.state,
            memory_rss_mb,
            // Total CPU time = user time + system time (in jiffies)
            cpu_time_jiffies: stat.utime + stat.stime,
        })
    }
}

impl ProcStatus {
    /// A zombie has exited but has not been waited on yet.
    pub fn is_zombie(&self) -> bool {
        self.state == 'Z'
    }
}
