use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub identifier: String,
    pub url: String,
    pub declared_size: u64,
    pub output: PathBuf,
}

/// Serializable summary of a retrieval: what would be downloaded, from where, to where.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
}

impl DownloadPlan {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        Self { tasks }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent_dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn total_declared_size(self: &Self) -> u64 {
        self.tasks.iter().map(|task| task.declared_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_download_plan() -> DownloadPlan {
        let task = |id: &str, size| DownloadTask {
            identifier: id.to_string(),
            url: format!(
                "https://api.eumetsat.int/data/download/collections/EO%3AEUM%3ADAT%3AMETOP%3AGLB-SST-NC/products/{id}"
            ),
            declared_size: size,
            output: PathBuf::from("outputs").join(id),
        };
        DownloadPlan::new(vec![task("a", 1024), task("b", 2048), task("c", 5120)])
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans").join("download_plan.json");
        mock_download_plan().write(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download_plan.json");
        mock_download_plan().write(&path).unwrap();

        let plan = DownloadPlan::read(&path).unwrap();
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan, mock_download_plan());
    }

    #[test]
    fn test_total_declared_size() {
        assert_eq!(mock_download_plan().total_declared_size(), 8192);
    }
}
