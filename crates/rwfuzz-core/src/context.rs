use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use rwfuzz_ir::ContractInfo;
use rwfuzz_ledger::ExecutionService;

use crate::config::RunConfig;

/// Everything one run shares between stages.
pub struct RunContext {
    pub config: RunConfig,
    pub info: ContractInfo,
    pub service: Arc<dyn ExecutionService>,
    /// `<result_root>/<contract>_<YYYYMMDD_HHMMSS>`, created on construction.
    pub run_dir: PathBuf,
}

impl RunContext {
    pub fn create(
        config: RunConfig,
        info: ContractInfo,
        service: Arc<dyn ExecutionService>,
    ) -> std::io::Result<Self> {
        let run_dir = run_dir_for(&config.result_root, &info.name, Local::now());
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self {
            config,
            info,
            service,
            run_dir,
        })
    }
}

pub fn run_dir_for(root: &Path, contract: &str, at: DateTime<Local>) -> PathBuf {
    root.join(format!("{}_{}", contract, at.format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rwfuzz_ledger::MockLedger;

    #[test]
    fn test_run_dir_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            run_dir_for(Path::new("/r"), "fact", at),
            PathBuf::from("/r/fact_20240309_070501")
        );
    }

    #[test]
    fn test_create_makes_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = RunConfig {
            result_root: root.path().join("nested"),
            ..RunConfig::default()
        };
        let ctx = RunContext::create(config, ContractInfo::new("fact"), Arc::new(MockLedger::new()))
            .unwrap();
        assert!(ctx.run_dir.is_dir());
        assert!(ctx
            .run_dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("fact_"));
    }
}
