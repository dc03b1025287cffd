use crate::download_plan::{DownloadPlan, DownloadTask};
use crate::error::{Error, Result};
use crate::resource::LazyResource;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::slice;

/// The products of one retrieval, kept in search order.
#[derive(Debug, Clone, Default)]
pub struct CompositeSource {
    resources: Vec<LazyResource>,
}

impl CompositeSource {
    pub fn aggregate(resources: impl IntoIterator<Item = LazyResource>) -> Self {
        Self {
            resources: resources.into_iter().collect(),
        }
    }

    pub fn len(self: &Self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(self: &Self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(self: &Self) -> slice::Iter<'_, LazyResource> {
        self.resources.iter()
    }

    pub fn into_resources(self) -> Vec<LazyResource> {
        self.resources
    }

    pub fn total_declared_size(self: &Self) -> u64 {
        self.iter().map(|r| r.descriptor().content_length).sum()
    }

    /// One output path per product under `output_dir`, in composite order.
    ///
    /// Paths are unique within the composite: a file name already taken by an earlier product
    /// (a repeated search record, or two identifiers that sanitize alike) gets the product's
    /// position appended.
    pub fn output_paths<P: AsRef<Path>>(self: &Self, output_dir: P) -> Vec<PathBuf> {
        let output_dir = output_dir.as_ref();
        let mut taken = HashSet::new();
        self.iter()
            .enumerate()
            .map(|(index, resource)| {
                let base = resource.descriptor().file_name();
                let mut name = base.clone();
                let mut attempt = 0;
                while !taken.insert(name.clone()) {
                    attempt += 1;
                    name = match attempt {
                        1 => format!("{base}.{index}"),
                        n => format!("{base}.{index}-{n}"),
                    };
                }
                output_dir.join(name)
            })
            .collect()
    }

    /// Where each product would land under `output_dir`.
    pub fn plan<P: AsRef<Path>>(self: &Self, output_dir: P) -> DownloadPlan {
        let tasks = self
            .iter()
            .zip(self.output_paths(output_dir))
            .map(|(resource, output)| {
                let descriptor = resource.descriptor();
                DownloadTask {
                    identifier: descriptor.identifier.clone(),
                    url: descriptor.url.to_string(),
                    declared_size: descriptor.content_length,
                    output,
                }
            })
            .collect();
        DownloadPlan::new(tasks)
    }

    /// Download every product into `output_dir`, at most `jobs` at a time.
    ///
    /// The returned paths follow the composite order. The first failure stops the batch.
    pub async fn download_all<P: AsRef<Path>>(
        self: &Self,
        output_dir: P,
        jobs: usize,
    ) -> Result<Vec<PathBuf>> {
        stream::iter(self.iter().zip(self.output_paths(output_dir)))
            .map(|(resource, output)| async move {
                resource.download_to(&output).await?;
                Ok::<_, Error>(output)
            })
            .buffered(jobs.max(1))
            .try_collect()
            .await
    }
}

impl<'a> IntoIterator for &'a CompositeSource {
    type Item = &'a LazyResource;
    type IntoIter = slice::Iter<'a, LazyResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::resolve::ProductResolver;
    use crate::search::ProductRecord;
    use crate::token::TokenProvider;
    use std::sync::Arc;
    use url::Url;

    fn composite(ids: &[(&str, u64)]) -> CompositeSource {
        let token = TokenProvider::new(
            reqwest::Client::new(),
            Url::parse("https://api.eumetsat.int/token").unwrap(),
            Credentials::new("key", "secret"),
        );
        let resolver = ProductResolver::new(
            Url::parse("https://api.eumetsat.int/data/download").unwrap(),
            Arc::new(token),
        );
        CompositeSource::aggregate(ids.iter().map(|&(id, size)| {
            resolver.lazy(&ProductRecord {
                identifier: id.to_string(),
                parent_identifier: "EO:EUM:DAT:MSG:HRSEVIRI".to_string(),
                size_kib: size,
            })
        }))
    }

    #[test]
    fn test_keeps_discovery_order() {
        let source = composite(&[("c", 1), ("a", 2), ("b", 3)]);
        let ids: Vec<_> = source
            .iter()
            .map(|r| r.descriptor().identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_total_declared_size() {
        let source = composite(&[("a", 1), ("b", 4)]);
        assert_eq!(source.len(), 2);
        assert_eq!(source.total_declared_size(), 5 * 1024);
    }

    #[test]
    fn test_plan() {
        let source = composite(&[("a", 1), ("b", 2)]);
        let plan = source.plan("outputs");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].output, PathBuf::from("outputs/b"));
        assert_eq!(plan.tasks[1].declared_size, 2048);
        assert_eq!(plan.total_declared_size(), source.total_declared_size());
    }

    #[test]
    fn test_output_paths_are_unique() {
        let source = composite(&[("a", 1), ("a:b", 1), ("a", 1), ("a_b", 1), ("a.2", 1)]);
        let paths = source.output_paths("outputs");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("outputs/a"),
                PathBuf::from("outputs/a_b"),
                PathBuf::from("outputs/a.2"),
                PathBuf::from("outputs/a_b.3"),
                PathBuf::from("outputs/a.2.4"),
            ]
        );
        assert_eq!(paths.iter().collect::<HashSet<_>>().len(), paths.len());
        assert_eq!(source.plan("outputs").tasks[2].output, paths[2]);
    }

    #[test]
    fn test_empty() {
        let source = CompositeSource::aggregate(Vec::new());
        assert!(source.is_empty());
        assert!(source.plan("outputs").tasks.is_empty());
    }
}
