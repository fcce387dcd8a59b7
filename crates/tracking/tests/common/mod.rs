//! Shared fixtures: an in-memory broker and a scripted conflict resolver

#![allow(dead_code)]

use async_trait::async_trait;
use broker::{
    AuthScheme, Broker, BrokerError, ConnectionSettings, DuplicatesStrategy, Feedback,
    ImportResults, ListQuery, ServerInfo, Version,
};
use chrono::{DateTime, Duration, Utc};
use grain::{Grain, GrainId, Scope};
use journal::JsonFormat;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, AnchorRef, TrackOptions};
use tracking::{Conflict, ConflictResolver, Resolution, SnapshotDirectory, VcsFlavor};
use uuid::Uuid;

pub const SCHEMA: Version = Version::new(0, 1, 3);

/// Broker calls made so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub list: usize,
    pub check_exist: usize,
    pub pull: usize,
    pub push: usize,
}

struct State {
    grains: BTreeMap<GrainId, Grain>,
    calls: Calls,
    push_feedback: Vec<Feedback>,
    reject_pushes: bool,
}

/// Broker keeping its grains in memory
pub struct MemoryBroker {
    url: String,
    info: ServerInfo,
    state: Mutex<State>,
}

/// Ids of the standard fixture tree `/root`, `/root/a`, `/root/b`
#[derive(Debug, Clone, Copy)]
pub struct Tree {
    pub root: GrainId,
    pub a: GrainId,
    pub b: GrainId,
}

/// Modification time of every fixture grain
pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_720_000_000, 0).unwrap()
}

pub fn new_grain(parent: Option<&Grain>, name: &str, m_time: DateTime<Utc>) -> Grain {
    let mut grain = Grain::new(Uuid::new_v4(), name, m_time);
    grain.parent_id = parent.map(|p| p.id);
    grain.path = Some(match parent {
        Some(p) => format!("{}/{name}", p.display_path()),
        None => format!("/{name}"),
    });
    grain
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_identity(Uuid::new_v4(), SCHEMA)
    }

    /// Empty broker reporting the given instance and schema
    pub fn with_identity(instance_id: Uuid, schema_version: Version) -> Self {
        Self {
            url: "http://memory.broker/".to_string(),
            info: ServerInfo {
                version: Version::new(0, 1, 21),
                schema_version,
                instance_id,
            },
            state: Mutex::new(State {
                grains: BTreeMap::new(),
                calls: Calls::default(),
                push_feedback: Vec::new(),
                reject_pushes: false,
            }),
        }
    }

    /// Broker holding `/root` with children `a` and `b`
    pub fn with_tree() -> (Self, Tree) {
        let broker = Self::new();
        let root = new_grain(None, "root", base_time());
        let a = new_grain(Some(&root), "a", base_time());
        let b = new_grain(Some(&root), "b", base_time());
        let tree = Tree {
            root: root.id,
            a: a.id,
            b: b.id,
        };
        for g in [root, a, b] {
            broker.insert(g);
        }
        (broker, tree)
    }

    pub fn instance_id(&self) -> Uuid {
        self.info.instance_id
    }

    pub fn insert(&self, grain: Grain) {
        self.state.lock().unwrap().grains.insert(grain.id, grain);
    }

    pub fn get(&self, id: GrainId) -> Option<Grain> {
        self.state.lock().unwrap().grains.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().grains.len()
    }

    /// Bump a grain's modification time, as an edit on the broker would
    pub fn touch(&self, id: GrainId, m_time: DateTime<Utc>) {
        if let Some(grain) = self.state.lock().unwrap().grains.get_mut(&id) {
            grain.m_time = m_time;
        }
    }

    pub fn remove(&self, id: GrainId) {
        self.state.lock().unwrap().grains.remove(&id);
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }

    pub fn set_push_feedback(&self, feedback: Vec<Feedback>) {
        self.state.lock().unwrap().push_feedback = feedback;
    }

    /// Fail every push from now on
    pub fn reject_pushes(&self) {
        self.state.lock().unwrap().reject_pushes = true;
    }

    fn check(cancel: &CancellationToken) -> broker::Result<()> {
        if cancel.is_cancelled() {
            Err(BrokerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn url(&self) -> &str {
        &self.url
    }

    async fn server_info(&self, cancel: &CancellationToken) -> broker::Result<ServerInfo> {
        Self::check(cancel)?;
        Ok(self.info.clone())
    }

    async fn get_grain(&self, id: GrainId, cancel: &CancellationToken) -> broker::Result<Option<Grain>> {
        Self::check(cancel)?;
        Ok(self.get(id))
    }

    async fn get_grain_by_path(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> broker::Result<Option<Grain>> {
        Self::check(cancel)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .grains
            .values()
            .find(|g| g.path.as_deref() == Some(path))
            .cloned())
    }

    async fn grain_path(&self, id: GrainId, cancel: &CancellationToken) -> broker::Result<Vec<Grain>> {
        Self::check(cancel)?;
        let state = self.state.lock().unwrap();
        let mut path = Vec::new();
        let mut current = state.grains.get(&id);
        while let Some(grain) = current {
            path.push(grain.clone());
            current = grain.parent_id.and_then(|parent| state.grains.get(&parent));
        }
        path.reverse();
        Ok(path)
    }

    async fn list_grains(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> broker::Result<Vec<Grain>> {
        Self::check(cancel)?;
        let mut state = self.state.lock().unwrap();
        state.calls.list += 1;
        let Some(root) = state.grains.get(&query.root).cloned() else {
            return Ok(Vec::new());
        };
        let prefix = format!("{}/", root.display_path());
        let mut grains: Vec<Grain> = state
            .grains
            .values()
            .filter(|g| {
                if query.recursive {
                    g.is_under(&prefix)
                } else {
                    g.parent_id == Some(root.id)
                }
            })
            .filter(|g| query.accepts(g.m_time))
            .cloned()
            .collect();
        grains.sort_by(|a, b| a.path.cmp(&b.path));
        if query.include_root && query.accepts(root.m_time) {
            grains.insert(0, root);
        }
        Ok(grains)
    }

    async fn check_exist(
        &self,
        ids: &[GrainId],
        cancel: &CancellationToken,
    ) -> broker::Result<HashMap<GrainId, bool>> {
        Self::check(cancel)?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut state = self.state.lock().unwrap();
        state.calls.check_exist += 1;
        Ok(ids
            .iter()
            .map(|id| (*id, state.grains.contains_key(id)))
            .collect())
    }

    async fn pull_grains(
        &self,
        ids: &[GrainId],
        cancel: &CancellationToken,
    ) -> broker::Result<Vec<Grain>> {
        Self::check(cancel)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self.state.lock().unwrap();
        state.calls.pull += 1;
        Ok(ids
            .iter()
            .filter_map(|id| state.grains.get(id).cloned())
            .collect())
    }

    async fn push_grains(
        &self,
        store: &[Grain],
        delete: &BTreeSet<GrainId>,
        _strategy: DuplicatesStrategy,
        cancel: &CancellationToken,
    ) -> broker::Result<ImportResults> {
        Self::check(cancel)?;
        let mut state = self.state.lock().unwrap();
        state.calls.push += 1;
        if state.reject_pushes {
            return Err(BrokerError::UnexpectedResponse {
                url: format!("{}Transport/In", self.url),
            });
        }
        for grain in store {
            state.grains.insert(grain.id, grain.clone());
        }
        let mut deleted_count = 0;
        for id in delete {
            if state.grains.remove(id).is_some() {
                deleted_count += 1;
            }
        }
        Ok(ImportResults {
            imported_count: store.len(),
            deleted_count,
            feedback: std::mem::take(&mut state.push_feedback),
        })
    }
}

/// Resolver answering from a script; panics on an unexpected conflict
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    pub answers: VecDeque<Resolution>,
    pub prompts: Vec<GrainId>,
    pub diffs: usize,
}

impl ScriptedResolver {
    pub fn new(answers: impl IntoIterator<Item = Resolution>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl ConflictResolver for ScriptedResolver {
    fn resolve(&mut self, conflict: &Conflict) -> Resolution {
        self.prompts.push(conflict.id());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected conflict on {}", conflict.id()))
    }

    fn show_diff(&mut self, _conflict: &Conflict) {
        self.diffs += 1;
    }
}

pub fn connection() -> ConnectionSettings {
    ConnectionSettings::new("http://memory.broker/", AuthScheme::Basic, false).unwrap()
}

pub fn later(seconds: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(seconds)
}

/// Track `/root` with the given scope into `path`
pub async fn track(broker: &MemoryBroker, path: &Path, root: GrainId, scope: Scope) -> SnapshotDirectory {
    let mut dir = SnapshotDirectory::new(path, JsonFormat::default());
    let options = TrackOptions {
        anchor: AnchorRef::Id(root),
        scope,
        vcs: VcsFlavor::Git,
        ignores: Default::default(),
    };
    ops::track(&mut dir, broker, connection(), options, &CancellationToken::new())
        .await
        .unwrap();
    dir
}
