// Host facts logged once at startup
use std::path::Path;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::info;

const MIB: u64 = 1024 * 1024;

/// Snapshot of the machine the worker runs on
#[derive(Debug, Clone, PartialEq)]
pub struct HostFacts {
    pub hostname: String,
    pub cpus: usize,
    pub memory_total_mb: u64,
    pub memory_available_mb: u64,
    /// Free space on the volume holding the temp dir (conversions write there)
    pub temp_free_mb: Option<u64>,
}

impl HostFacts {
    pub fn collect() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::new()),
        );

        let temp_dir = std::env::temp_dir();
        let disks = Disks::new_with_refreshed_list();
        let temp_free_mb = free_space_under(
            disks.iter().map(|d| (d.mount_point(), d.available_space())),
            &temp_dir,
        )
        .map(|bytes| bytes / MIB);

        Self {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            cpus: sys.cpus().len(),
            memory_total_mb: sys.total_memory() / MIB,
            memory_available_mb: sys.available_memory() / MIB,
            temp_free_mb,
        }
    }

    pub fn log_service_start(&self, version: &str) {
        info!(
            event = "service_start",
            version,
            hostname = %self.hostname,
            cpus = self.cpus,
            memory_total_mb = self.memory_total_mb,
            memory_available_mb = self.memory_available_mb,
            temp_free_mb = ?self.temp_free_mb,
            "Doctrans worker starting"
        );
    }
}

/// Available bytes of the mount point that most specifically contains `path`
fn free_space_under<'a>(
    mounts: impl Iterator<Item = (&'a Path, u64)>,
    path: &Path,
) -> Option<u64> {
    mounts
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, free)| free)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_space_picks_deepest_mount() {
        let mounts = [
            (Path::new("/"), 100),
            (Path::new("/tmp"), 7),
            (Path::new("/var"), 50),
        ];
        let free = free_space_under(mounts.iter().map(|(p, f)| (*p, *f)), Path::new("/tmp/work"));
        assert_eq!(free, Some(7));

        let free = free_space_under(mounts.iter().map(|(p, f)| (*p, *f)), Path::new("/home/u"));
        assert_eq!(free, Some(100));

        assert_eq!(free_space_under(std::iter::empty(), Path::new("/tmp")), None);
    }

    #[test]
    fn test_collect_reports_memory() {
        let facts = HostFacts::collect();
        assert!(facts.cpus > 0);
        assert!(facts.memory_total_mb > 0);
    }
}
