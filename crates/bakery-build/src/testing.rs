//! エンジン・resolver・identity store の呼び出しを記録するフェイク

use async_trait::async_trait;
use bakery_chef::{ChefError, DeleteStatus, DependencyResolver, RemoteIdentityStore};
use bakery_container::{
    ContainerEngine, ContainerError, HistoryEntry, ImageHandle, ImageId,
    Result as ContainerResult,
};
use bakery_core::ImageReference;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Pull(String),
    Build(PathBuf, String, Vec<PathBuf>),
    Tag(String, String, String),
    Get(String),
    Remove(String),
    History(String),
}

pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    images: Mutex<HashMap<String, ImageId>>,
    built_id: ImageId,
    build_error: Option<String>,
    tag_error: Option<String>,
    pull_id: ImageId,
    history: Vec<HistoryEntry>,
    in_use: HashSet<String>,
    unavailable: bool,
    watch: Option<PathBuf>,
    /// ビルド実行時点での監視するファイルの内容
    pub observed: Mutex<Option<Option<String>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            images: Mutex::new(HashMap::new()),
            built_id: ImageId::new("sha256:built"),
            build_error: None,
            tag_error: None,
            pull_id: ImageId::new("sha256:fresh"),
            history: Vec::new(),
            in_use: HashSet::new(),
            unavailable: false,
            watch: None,
            observed: Mutex::new(None),
        }
    }

    pub fn with_image(self, reference: &str, id: &str) -> Self {
        self.images
            .lock()
            .unwrap()
            .insert(reference.to_string(), ImageId::new(id));
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn failing_build(mut self, message: &str) -> Self {
        self.build_error = Some(message.to_string());
        self
    }

    pub fn failing_tag(mut self, message: &str) -> Self {
        self.tag_error = Some(message.to_string());
        self
    }

    pub fn in_use(mut self, id: &str) -> Self {
        self.in_use.insert(id.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// ビルド時に `path` を読む
    pub fn watching(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch = Some(path.into());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Remove(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn tags(&self) -> Vec<(String, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Tag(id, repo, tag) => Some((id, repo, tag)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: EngineCall) -> ContainerResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.unavailable {
            return Err(ContainerError::DockerConnectionFailed(
                "Connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull(&self, image: &ImageReference) -> ContainerResult<ImageId> {
        self.record(EngineCall::Pull(image.to_string()))?;
        self.images
            .lock()
            .unwrap()
            .insert(image.to_string(), self.pull_id.clone());
        Ok(self.pull_id.clone())
    }

    async fn build_from_directory(
        &self,
        path: &Path,
        reference: &ImageReference,
        exclude: &[PathBuf],
    ) -> ContainerResult<ImageId> {
        self.record(EngineCall::Build(
            path.to_path_buf(),
            reference.to_string(),
            exclude.to_vec(),
        ))?;
        if let Some(watch) = &self.watch {
            *self.observed.lock().unwrap() = Some(std::fs::read_to_string(watch).ok());
        }
        if let Some(message) = &self.build_error {
            return Err(ContainerError::BuildFailed(message.clone()));
        }
        self.images
            .lock()
            .unwrap()
            .insert(reference.to_string(), self.built_id.clone());
        Ok(self.built_id.clone())
    }

    async fn tag(&self, image: &ImageId, repository: &str, tag: &str) -> ContainerResult<()> {
        self.record(EngineCall::Tag(
            image.to_string(),
            repository.to_string(),
            tag.to_string(),
        ))?;
        if let Some(message) = &self.tag_error {
            return Err(ContainerError::DockerApiError(message.clone()));
        }
        self.images
            .lock()
            .unwrap()
            .insert(format!("{}:{}", repository, tag), image.clone());
        Ok(())
    }

    async fn get(&self, reference: &str) -> ContainerResult<ImageHandle> {
        self.record(EngineCall::Get(reference.to_string()))?;
        match self.images.lock().unwrap().get(reference) {
            Some(id) => Ok(ImageHandle {
                id: id.clone(),
            }),
            None => Err(ContainerError::ImageNotFound {
                image: reference.to_string(),
            }),
        }
    }

    async fn remove(&self, image: &ImageId) -> ContainerResult<()> {
        self.record(EngineCall::Remove(image.to_string()))?;
        if self.in_use.contains(image.as_str()) {
            return Err(ContainerError::ImageInUse {
                image: image.to_string(),
                message: "image has dependent child images".to_string(),
            });
        }
        Ok(())
    }

    async fn history(&self, image: &ImageId) -> ContainerResult<Vec<HistoryEntry>> {
        self.record(EngineCall::History(image.to_string()))?;
        Ok(self.history.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverCall {
    Install(PathBuf),
    Vendor(PathBuf, bool),
    Upload(bool, Option<PathBuf>),
}

pub struct FakeResolver {
    pub calls: Mutex<Vec<ResolverCall>>,
    available: bool,
    fail: Option<String>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            available: true,
            fail: None,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self, stderr: &str) -> Self {
        self.fail = Some(stderr.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ResolverCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ResolverCall) -> bakery_chef::Result<()> {
        self.calls.lock().unwrap().push(call);
        match &self.fail {
            Some(stderr) => Err(ChefError::CommandFailed {
                command: "berks".to_string(),
                status: 1,
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DependencyResolver for FakeResolver {
    async fn available(&self) -> bool {
        self.available
    }

    async fn install(&self, workdir: &Path) -> bakery_chef::Result<()> {
        self.record(ResolverCall::Install(workdir.to_path_buf()))
    }

    async fn vendor(&self, _workdir: &Path, target: &Path, force: bool) -> bakery_chef::Result<()> {
        self.record(ResolverCall::Vendor(target.to_path_buf(), force))
    }

    async fn upload(
        &self,
        _workdir: &Path,
        force: bool,
        config: Option<&Path>,
    ) -> bakery_chef::Result<()> {
        self.record(ResolverCall::Upload(force, config.map(Path::to_path_buf)))
    }
}

pub struct FakeIdentityStore {
    pub calls: Mutex<Vec<(String, String)>>,
    node: Option<DeleteStatus>,
    client: Option<DeleteStatus>,
}

impl FakeIdentityStore {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            node: Some(DeleteStatus::Deleted),
            client: Some(DeleteStatus::Deleted),
        }
    }

    /// `None` なら削除自体が失敗する
    pub fn responding(node: Option<DeleteStatus>, client: Option<DeleteStatus>) -> Self {
        Self {
            node,
            client,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, kind: &str, name: &str, status: Option<DeleteStatus>) -> bakery_chef::Result<DeleteStatus> {
        self.calls
            .lock()
            .unwrap()
            .push((kind.to_string(), name.to_string()));
        status.ok_or_else(|| ChefError::CommandFailed {
            command: format!("knife {} delete", kind),
            status: 100,
            stderr: "ERROR: 500 Internal Server Error".to_string(),
        })
    }
}

#[async_trait]
impl RemoteIdentityStore for FakeIdentityStore {
    async fn delete_node(&self, name: &str) -> bakery_chef::Result<DeleteStatus> {
        self.respond("node", name, self.node)
    }

    async fn delete_client(&self, name: &str) -> bakery_chef::Result<DeleteStatus> {
        self.respond("client", name, self.client)
    }
}
