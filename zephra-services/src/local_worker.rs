//! In-process caching worker.
//!
//! `LocalWorker` plays the role of the browser's service worker on desktop
//! hosts: a tokio task owning a cache directory (one sub-directory per
//! named cache) that answers [`WorkerRequest`]s over an mpsc channel with
//! oneshot replies. Worker versions follow the install/waiting/activate
//! sequence: publishing a newer version and calling `update` installs it as
//! waiting, and `skip_waiting` promotes it and fires `ControllerChanged`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use zephra_core::constants;
use zephra_core::error::{ZephraError, ZephraResult};

use crate::ports::{
    CacheInfo, CacheStats, WorkerHost, WorkerHostEvent, WorkerRegistration, WorkerReply, WorkerRequest,
};

struct WorkerCommand {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerReply>,
}

#[derive(Debug, Default)]
struct WorkerSlots {
    registration: Option<WorkerRegistration>,
    active: Option<String>,
    waiting: Option<String>,
    /// Latest script version available to install.
    published: String,
}

/// Desktop implementation of [`WorkerHost`].
pub struct LocalWorker {
    cache_dir: PathBuf,
    commands: mpsc::Sender<WorkerCommand>,
    events: broadcast::Sender<WorkerHostEvent>,
    slots: Arc<Mutex<WorkerSlots>>,
}

impl LocalWorker {
    /// Start the worker task. Must be called from within a tokio runtime.
    pub fn spawn(cache_dir: PathBuf, version: &str) -> Self {
        let (commands, mut rx) = mpsc::channel::<WorkerCommand>(32);
        let (events, _) = broadcast::channel(16);
        let slots = Arc::new(Mutex::new(WorkerSlots {
            published: version.to_string(),
            ..WorkerSlots::default()
        }));

        let storage = CacheStorage { root: cache_dir.clone() };
        let task_slots = slots.clone();
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                let reply = match cmd.request {
                    WorkerRequest::GetVersion => {
                        let version = task_slots
                            .lock()
                            .ok()
                            .and_then(|s| s.active.clone())
                            .unwrap_or_default();
                        WorkerReply::Version { version }
                    }
                    request => storage.handle(request),
                };
                if cmd.reply.send(reply).is_err() {
                    debug!("worker reply dropped: requester went away");
                }
            }
            debug!("local worker task finished");
        });

        Self {
            cache_dir,
            commands,
            events,
            slots,
        }
    }

    /// Make a newer worker script available; `update` will install it.
    pub fn publish(&self, version: &str) -> ZephraResult<()> {
        self.slots()?.published = version.to_string();
        info!("worker version {version} published");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Version currently in control, if registered.
    pub fn active_version(&self) -> Option<String> {
        self.slots().ok().and_then(|s| s.active.clone())
    }

    fn slots(&self) -> ZephraResult<MutexGuard<'_, WorkerSlots>> {
        self.slots
            .lock()
            .map_err(|_| ZephraError::Worker("worker state lock poisoned".into()))
    }

    fn announce(&self, event: WorkerHostEvent) {
        // No listeners is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WorkerHost for LocalWorker {
    fn is_supported(&self) -> bool {
        true
    }

    async fn register(&self, script_url: &str, scope: &str) -> ZephraResult<WorkerRegistration> {
        let installed = {
            let mut slots = self.slots()?;
            if let Some(existing) = &slots.registration {
                return Ok(existing.clone());
            }

            fs::create_dir_all(&self.cache_dir)?;
            for name in constants::worker::KNOWN_CACHES {
                fs::create_dir_all(self.cache_dir.join(name))?;
            }

            let version = slots.published.clone();
            let registration = WorkerRegistration {
                script_url: script_url.to_string(),
                scope: scope.to_string(),
                active_version: Some(version.clone()),
            };
            slots.active = Some(version);
            slots.registration = Some(registration.clone());
            registration
        };

        info!("local worker registered at scope {scope}");
        self.announce(WorkerHostEvent::Installed { waiting: false });
        Ok(installed)
    }

    async fn update(&self) -> ZephraResult<()> {
        let installed = {
            let mut slots = self.slots()?;
            if slots.registration.is_none() {
                return Err(ZephraError::Worker("worker is not registered".into()));
            }
            let published = slots.published.clone();
            let is_new = slots.active.as_deref() != Some(published.as_str())
                && slots.waiting.as_deref() != Some(published.as_str());
            if is_new {
                slots.waiting = Some(published.clone());
                Some(published)
            } else {
                None
            }
        };

        if let Some(version) = installed {
            info!("worker version {version} installed and waiting");
            self.announce(WorkerHostEvent::Installed { waiting: true });
        }
        Ok(())
    }

    fn has_waiting(&self) -> bool {
        self.slots().map(|s| s.waiting.is_some()).unwrap_or(false)
    }

    fn has_controller(&self) -> bool {
        self.slots()
            .map(|s| s.registration.is_some() && s.active.is_some())
            .unwrap_or(false)
    }

    async fn skip_waiting(&self) -> ZephraResult<()> {
        let activated = {
            let mut slots = self.slots()?;
            match slots.waiting.take() {
                Some(version) => {
                    slots.active = Some(version.clone());
                    if let Some(reg) = slots.registration.as_mut() {
                        reg.active_version = Some(version.clone());
                    }
                    Some(version)
                }
                None => None,
            }
        };

        if let Some(version) = activated {
            info!("worker version {version} activated");
            self.announce(WorkerHostEvent::ControllerChanged);
        }
        Ok(())
    }

    async fn post_message(&self, request: WorkerRequest) -> ZephraResult<WorkerReply> {
        if self.slots()?.registration.is_none() {
            return Err(ZephraError::Worker("no active worker".into()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand { request, reply: reply_tx })
            .await
            .map_err(|_| ZephraError::Worker("worker task stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| ZephraError::Worker("worker dropped the request".into()))
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkerHostEvent> {
        self.events.subscribe()
    }
}

/// On-disk cache storage owned by the worker task.
struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    fn handle(&self, request: WorkerRequest) -> WorkerReply {
        let result = match request {
            WorkerRequest::GetCacheStats => self.stats().map(WorkerReply::CacheStats),
            WorkerRequest::ClearCache { name } => self
                .clear(name.as_deref())
                .map(|caches| WorkerReply::Cleared { caches }),
            WorkerRequest::Store { cache, key, body } => {
                self.store(&cache, &key, &body).map(|_| WorkerReply::Stored)
            }
            WorkerRequest::GetVersion => Ok(WorkerReply::Version { version: String::new() }),
        };
        result.unwrap_or_else(|e| WorkerReply::Error { message: e.to_string() })
    }

    fn cache_names(&self) -> ZephraResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn cache_path(&self, name: &str) -> ZephraResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(ZephraError::Worker(format!("invalid cache name: {name}")));
        }
        Ok(self.root.join(name))
    }

    fn stats(&self) -> ZephraResult<CacheStats> {
        let mut caches = Vec::new();
        for name in self.cache_names()? {
            let (entries, bytes) = scan_directory(&self.root.join(&name))?;
            caches.push(CacheInfo { name, entries, bytes });
        }
        Ok(CacheStats::from_caches(caches))
    }

    fn clear(&self, name: Option<&str>) -> ZephraResult<Vec<String>> {
        let targets = match name {
            Some(name) => {
                let path = self.cache_path(name)?;
                if !path.is_dir() {
                    return Err(ZephraError::Worker(format!("cache not found: {name}")));
                }
                vec![name.to_string()]
            }
            None => self.cache_names()?,
        };

        for target in &targets {
            let path = self.root.join(target);
            if let Err(e) = fs::remove_dir_all(&path) {
                warn!("failed to delete cache {target}: {e}");
                return Err(e.into());
            }
        }
        info!("deleted {} cache(s)", targets.len());
        Ok(targets)
    }

    fn store(&self, cache: &str, key: &str, body: &[u8]) -> ZephraResult<()> {
        let dir = self.cache_path(cache)?;
        fs::create_dir_all(&dir)?;
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(ZephraError::Worker(format!("invalid cache key: {key}")));
        }
        fs::write(dir.join(file_name), body)?;
        Ok(())
    }
}

/// Count files and bytes below `dir`.
fn scan_directory(dir: &Path) -> ZephraResult<(usize, u64)> {
    let mut entries = 0usize;
    let mut bytes = 0u64;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            let (e, b) = scan_directory(&path)?;
            entries += e;
            bytes += b;
        } else if path.is_file() {
            entries += 1;
            bytes += fs::metadata(&path)?.len();
        }
    }
    Ok((entries, bytes))
}
