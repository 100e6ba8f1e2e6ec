//! 内存存储
//!
//! 链接按序号存放在 `Vec` 中（数组下标即 ID），另有一个未删除 URL → ID 的索引用于查重。
//! 整张表由一把读写锁保护；配置了快照文件时，每次成功的写操作在返回前落盘，
//! 删除在管道刷盘完成时落盘。

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, info, trace, warn};

use super::deletion::{DeletePipeline, DeleteReport, DeleteSink};
use super::{BatchPutOutcome, LinkStore};
use crate::config::DeletionConfig;
use crate::errors::{Result, UrlshrtError};
use crate::model::{DeleteRequest, LinkId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LinkRecord {
    url: String,
    owner_user_id: UserId,
    deleted: bool,
}

/// 快照文件格式
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    links: Vec<LinkRecord>,
    next_user_id: u64,
}

#[derive(Default)]
struct TableState {
    links: Vec<LinkRecord>,
    /// 未删除 URL → ID
    live_urls: HashMap<String, LinkId>,
    next_user_id: u64,
}

impl TableState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let live_urls = snapshot
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| !link.deleted)
            .map(|(idx, link)| (link.url.clone(), LinkId::new(idx as u64)))
            .collect();

        Self {
            links: snapshot.links,
            live_urls,
            next_user_id: snapshot.next_user_id,
        }
    }

    fn next_link_id(&self) -> LinkId {
        LinkId::new(self.links.len() as u64)
    }

    fn insert(&mut self, owner: UserId, url: &str) -> LinkId {
        let id = self.next_link_id();
        self.links.push(LinkRecord {
            url: url.to_string(),
            owner_user_id: owner,
            deleted: false,
        });
        self.live_urls.insert(url.to_string(), id);
        id
    }

    /// 撤销 `len` 之后追加的链接
    fn truncate(&mut self, len: usize) {
        for link in self.links.drain(len..) {
            self.live_urls.remove(&link.url);
        }
    }

    fn record(&self, id: LinkId) -> Option<&LinkRecord> {
        usize::try_from(id.get())
            .ok()
            .and_then(|idx| self.links.get(idx))
    }

    fn record_mut(&mut self, id: LinkId) -> Option<&mut LinkRecord> {
        usize::try_from(id.get())
            .ok()
            .and_then(|idx| self.links.get_mut(idx))
    }

    fn to_json(&self) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            links: &'a [LinkRecord],
            next_user_id: u64,
        }

        Ok(serde_json::to_vec(&SnapshotRef {
            links: &self.links,
            next_user_id: self.next_user_id,
        })?)
    }
}

/// 表及其快照文件，同时作为删除管道的 Sink
struct MemoryTable {
    state: RwLock<TableState>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryTable {
    /// 持有写锁时调用：写临时文件后 rename，保证快照文件始终完整
    fn persist(&self, state: &TableState) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let data = state.to_json()?;
        run_blocking(|| write_snapshot(path, &data))?;

        trace!(
            "MemoryStore: snapshot written ({} links) to {}",
            state.links.len(),
            path.display()
        );
        Ok(())
    }
}

/// 多线程运行时中用 `block_in_place` 执行阻塞 IO，让出当前 worker 上的其它任务；
/// 单线程运行时（actix worker、测试）不支持 `block_in_place`，直接执行
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn write_snapshot(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, data).map_err(|e| {
        UrlshrtError::file_operation(format!("Failed to write {}: {}", tmp.display(), e))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        UrlshrtError::file_operation(format!(
            "Failed to move snapshot into {}: {}",
            path.display(),
            e
        ))
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// 加载快照：文件不存在视为空表，内容损坏则报错
fn load_snapshot(path: &Path) -> Result<Snapshot> {
    match std::fs::read(path) {
        Ok(data) => serde_json::from_slice(&data).map_err(|e| {
            UrlshrtError::serialization(format!(
                "Corrupt snapshot file {}: {}",
                path.display(),
                e
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "MemoryStore: snapshot {} not found, starting empty",
                path.display()
            );
            Ok(Snapshot::default())
        }
        Err(e) => Err(UrlshrtError::file_operation(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait::async_trait]
impl DeleteSink for MemoryTable {
    async fn apply_deletes(&self, batch: Vec<DeleteRequest>) -> anyhow::Result<DeleteReport> {
        let mut state = self.state.write();
        let mut report = DeleteReport::default();
        let mut changed = Vec::new();

        for request in &batch {
            let Some(link) = state.record_mut(request.link_id) else {
                debug!("MemoryStore: delete of unknown link {} ignored", request.link_id);
                report.rejected += 1;
                continue;
            };

            if link.owner_user_id != request.owner {
                let err = UrlshrtError::ownership_mismatch(format!(
                    "user {} does not own link {}",
                    request.owner, request.link_id
                ));
                warn!("MemoryStore: delete dropped: {}", err);
                report.rejected += 1;
                continue;
            }

            if link.deleted {
                trace!("MemoryStore: link {} already deleted", request.link_id);
                report.rejected += 1;
                continue;
            }

            link.deleted = true;
            let url = link.url.clone();
            state.live_urls.remove(&url);
            changed.push((request.link_id, url));
            report.applied += 1;
        }

        if changed.is_empty() {
            return Ok(report);
        }

        if let Err(e) = self.persist(&state) {
            // 快照写入失败时恢复内存状态，整批视为未生效
            for (id, url) in changed {
                if let Some(link) = state.record_mut(id) {
                    link.deleted = false;
                }
                state.live_urls.insert(url, id);
            }
            return Err(e.into());
        }

        Ok(report)
    }
}

/// 内存存储（可选快照持久化）
pub struct MemoryStore {
    table: Arc<MemoryTable>,
    pipeline: DeletePipeline,
}

impl MemoryStore {
    /// 打开内存存储；`snapshot_path` 为 `None` 时不持久化
    ///
    /// 需要在 tokio runtime 内调用（删除管道 worker 会被 spawn）。
    pub fn open(
        snapshot_path: Option<PathBuf>,
        deletion: DeletionConfig,
        span: Span,
    ) -> Result<Self> {
        let state = match &snapshot_path {
            Some(path) => {
                let snapshot = load_snapshot(path)?;
                info!(
                    "MemoryStore: loaded {} links from {}",
                    snapshot.links.len(),
                    path.display()
                );
                TableState::from_snapshot(snapshot)
            }
            None => TableState::default(),
        };

        let table = Arc::new(MemoryTable {
            state: RwLock::new(state),
            snapshot_path,
        });
        let pipeline = DeletePipeline::spawn(
            Arc::clone(&table) as Arc<dyn DeleteSink>,
            deletion,
            span,
        );

        Ok(Self { table, pipeline })
    }

    /// 当前链接总数（包括已删除的）
    pub fn len(&self) -> usize {
        self.table.state.read().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl LinkStore for MemoryStore {
    async fn put(&self, owner: UserId, url: &str) -> Result<LinkId> {
        let mut state = self.table.state.write();

        if let Some(&existing) = state.live_urls.get(url) {
            return Err(UrlshrtError::duplicate_url(url, existing));
        }

        let len = state.links.len();
        let id = state.insert(owner, url);
        if let Err(e) = self.table.persist(&state) {
            state.truncate(len);
            return Err(e);
        }

        trace!("MemoryStore: stored link {} for user {}", id, owner);
        Ok(id)
    }

    async fn batch_put(&self, owner: UserId, urls: &[String]) -> Result<BatchPutOutcome> {
        let mut state = self.table.state.write();
        let len = state.links.len();
        let mut outcome = BatchPutOutcome {
            ids: Vec::with_capacity(urls.len()),
            duplicates: Vec::new(),
        };

        for url in urls {
            // 同一批次内重复的 URL 也会命中索引
            if let Some(&existing) = state.live_urls.get(url.as_str()) {
                outcome.ids.push(existing);
                outcome.duplicates.push(url.clone());
                continue;
            }
            let id = state.insert(owner, url);
            outcome.ids.push(id);
        }

        if state.links.len() > len
            && let Err(e) = self.table.persist(&state)
        {
            state.truncate(len);
            return Err(e);
        }

        debug!(
            "MemoryStore: batch stored {} links ({} duplicates) for user {}",
            state.links.len() - len,
            outcome.duplicates.len(),
            owner
        );
        Ok(outcome)
    }

    async fn get(&self, id: LinkId) -> Result<String> {
        let state = self.table.state.read();
        match state.record(id) {
            Some(link) if link.deleted => Err(UrlshrtError::gone(format!("link {} is deleted", id))),
            Some(link) => Ok(link.url.clone()),
            None => Err(UrlshrtError::not_found(format!("link {} not found", id))),
        }
    }

    async fn user_links(&self, owner: UserId) -> Result<BTreeMap<LinkId, String>> {
        let state = self.table.state.read();
        Ok(state
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.owner_user_id == owner)
            .map(|(idx, link)| (LinkId::new(idx as u64), link.url.clone()))
            .collect())
    }

    async fn create_user(&self) -> Result<UserId> {
        let mut state = self.table.state.write();
        let id = UserId::new(state.next_user_id);
        state.next_user_id += 1;

        if let Err(e) = self.table.persist(&state) {
            state.next_user_id -= 1;
            return Err(e);
        }

        debug!("MemoryStore: created user {}", id);
        Ok(id)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn request_delete(&self, owner: UserId, ids: &[LinkId]) -> Result<()> {
        let requests = ids
            .iter()
            .map(|&id| DeleteRequest::new(owner, id))
            .collect();
        self.pipeline.submit(requests).await
    }

    async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
