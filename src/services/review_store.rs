//! 评论存储服务 - 业务能力层
//!
//! 以评论 ID 为键保存到 JSON 文件，支持覆盖或合并已有评论
//!
//! 同一文件的合并（读取 → 合并 → 写回）通过 `StoreLocks` 串行化，
//! 多个任务写同一个 `json_path` 时不会互相覆盖

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppResult, StorageError};
use crate::models::Review;

/// 合并结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// 新增的评论
    pub inserted: usize,
    /// 更新的已有评论
    pub updated: usize,
    /// 文件中评论总数
    pub total: usize,
}

/// 按文件路径分配的合并锁
///
/// 同一路径（相对路径按当前目录展开）总是拿到同一把锁
#[derive(Default)]
pub struct StoreLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl StoreLocks {
    /// 打开共享该路径合并锁的存储
    pub fn store(&self, path: impl Into<PathBuf>) -> JsonReviewStore {
        let path = path.into();
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(lock_key(&path)).or_default())
        };
        JsonReviewStore { path, lock }
    }
}

fn lock_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let canonical = absolute
        .parent()
        .zip(absolute.file_name())
        .and_then(|(parent, name)| parent.canonicalize().ok().map(|dir| dir.join(name)));
    canonical.unwrap_or(absolute)
}

/// JSON 文件评论存储
pub struct JsonReviewStore {
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl JsonReviewStore {
    /// 使用独立的合并锁；多个任务共享文件时用 `StoreLocks::store`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部评论，文件不存在时返回空
    pub async fn load(&self) -> AppResult<BTreeMap<String, Review>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: self.path.display().to_string(),
                    source,
                }
                .into())
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let reviews = serde_json::from_str(&content).map_err(|source| StorageError::Corrupted {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(reviews)
    }

    /// 已存储的评论 ID
    pub async fn known_ids(&self) -> AppResult<HashSet<String>> {
        Ok(self.load().await?.into_keys().collect())
    }

    /// 合并一批评论并写回文件
    pub async fn merge(
        &self,
        reviews: Vec<Review>,
        overwrite: bool,
        custom_params: &Map<String, JsonValue>,
    ) -> AppResult<MergeSummary> {
        let _guard = self.lock.lock().await;
        let mut stored = self.load().await?;
        let mut summary = MergeSummary::default();

        for mut review in reviews {
            for (key, value) in custom_params {
                review.custom.insert(key.clone(), value.clone());
            }

            match stored.get_mut(&review.review_id) {
                Some(existing) if !overwrite => {
                    merge_review(existing, review);
                    summary.updated += 1;
                }
                Some(existing) => {
                    *existing = review;
                    summary.updated += 1;
                }
                None => {
                    stored.insert(review.review_id.clone(), review);
                    summary.inserted += 1;
                }
            }
        }
        summary.total = stored.len();

        self.write(&stored).await?;
        info!(
            "💾 评论已保存: 新增 {}, 更新 {}, 共 {} ({})",
            summary.inserted,
            summary.updated,
            summary.total,
            self.path.display()
        );
        Ok(summary)
    }

    /// 先写临时文件再重命名，避免写到一半的文件
    async fn write(&self, stored: &BTreeMap<String, Review>) -> AppResult<()> {
        let write_failed = |source| StorageError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let content = serde_json::to_string_pretty(stored).map_err(|e| {
            write_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let tmp_path = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp_path, content).await.map_err(write_failed)?;
        fs::rename(&tmp_path, &self.path).await.map_err(write_failed)?;
        debug!("写入完成: {}", self.path.display());
        Ok(())
    }
}

/// 保留已有的非空字段，用新值补全空字段，并追加新图片
fn merge_review(existing: &mut Review, incoming: Review) {
    if existing.author.is_empty() {
        existing.author = incoming.author;
    }
    if existing.rating.is_none() {
        existing.rating = incoming.rating;
    }
    if existing.text.is_empty() {
        existing.text = incoming.text;
    }
    if existing.date_text.is_empty() {
        existing.date_text = incoming.date_text;
    }
    for image in incoming.images {
        if !existing.images.contains(&image) {
            existing.images.push(image);
        }
    }
    for (key, value) in incoming.custom {
        existing.custom.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(name: &str) -> JsonReviewStore {
        let path = std::env::temp_dir().join(format!(
            "review_store_{}_{}.json",
            name,
            uuid::Uuid::new_v4()
        ));
        JsonReviewStore::new(path)
    }

    fn review(id: &str, text: &str, images: &[&str]) -> Review {
        Review {
            review_id: id.to_string(),
            author: "Ann".to_string(),
            rating: Some(4.0),
            text: text.to_string(),
            date_text: "a week ago".to_string(),
            images: images.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let store = temp_store("missing");
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_keeps_existing_text_and_appends_images() {
        let store = temp_store("merge");
        store
            .merge(vec![review("r1", "great", &["a.jpg"])], false, &Map::new())
            .await
            .unwrap();

        let summary = store
            .merge(
                vec![review("r1", "changed", &["a.jpg", "b.jpg"]), review("r2", "ok", &[])],
                false,
                &Map::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary, MergeSummary { inserted: 1, updated: 1, total: 2 });
        let stored = store.load().await.unwrap();
        assert_eq!(stored["r1"].text, "great");
        assert_eq!(stored["r1"].images, vec!["a.jpg", "b.jpg"]);

        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_and_adds_custom_params() {
        let store = temp_store("overwrite");
        store
            .merge(vec![review("r1", "old", &["a.jpg"])], false, &Map::new())
            .await
            .unwrap();

        let mut params = Map::new();
        params.insert("company".into(), json!("acme"));
        store
            .merge(vec![review("r1", "new", &[])], true, &params)
            .await
            .unwrap();

        let stored = store.load().await.unwrap();
        assert_eq!(stored["r1"].text, "new");
        assert!(stored["r1"].images.is_empty());
        assert_eq!(stored["r1"].custom["company"], json!("acme"));

        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_merges_into_same_file_keep_every_review() {
        let dir = std::env::temp_dir().join(format!("review_store_shared_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reviews.json");
        let locks = Arc::new(StoreLocks::default());

        let tasks: Vec<_> = (0..8)
            .map(|task| {
                let locks = Arc::clone(&locks);
                let path = path.clone();
                tokio::spawn(async move {
                    let batch = (0..50)
                        .map(|i| review(&format!("t{}-r{}", task, i), "text", &[]))
                        .collect();
                    let store = locks.store(path);
                    store.merge(batch, false, &Map::new()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = locks.store(&path).load().await.unwrap();
        assert_eq!(stored.len(), 400);
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                name.to_string_lossy().ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_relative_and_absolute_paths_share_a_lock() {
        let locks = StoreLocks::default();
        let relative = locks.store("reviews.json");
        let absolute = locks.store(std::env::current_dir().unwrap().join("reviews.json"));
        assert!(Arc::ptr_eq(&relative.lock, &absolute.lock));
        assert!(!Arc::ptr_eq(&relative.lock, &locks.store("other.json").lock));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let store = temp_store("corrupt");
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().await.is_err());
        let _ = std::fs::remove_file(store.path());
    }
}
