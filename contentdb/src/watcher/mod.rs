use crate::discovery::{extensions, Discovery, FsDiscovery};
use crate::error::Result;
use crate::schema::{CollectionKind, ContentConfig, SchemaRegistry};
use crate::store::{LoadOptions, Snapshot};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::time::Duration;

/// A change to one collection document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// The kind of file change detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// Quiet period after the last change before a batch is released.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches collection directories and hands out debounced batches of changes.
///
/// Every batch holds each changed document once, with its latest change kind,
/// and is released once no further change arrived for [`DEBOUNCE`].
struct FileWatcher {
    watcher: RecommendedWatcher,
    thread: std::thread::JoinHandle<()>,
    batches: mpsc::Receiver<Vec<WatcherEvent>>,
}

impl FileWatcher {
    fn start(root: &Path, dirs: &[PathBuf]) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
        let (batch_tx, batches) = mpsc::channel::<Vec<WatcherEvent>>();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )?;

        for dir in dirs {
            let abs_dir = root.join(dir);
            if abs_dir.is_dir() {
                watcher.watch(&abs_dir, RecursiveMode::Recursive)?;
            } else {
                log::debug!("Not watching missing directory {}", abs_dir.display());
            }
        }

        let thread = std::thread::spawn(move || {
            let mut pending: BTreeMap<PathBuf, ChangeKind> = BTreeMap::new();
            loop {
                let wait = if pending.is_empty() {
                    Duration::from_secs(3600)
                } else {
                    DEBOUNCE
                };
                match raw_rx.recv_timeout(wait) {
                    Ok(Ok(event)) => record(&mut pending, event),
                    Ok(Err(e)) => log::warn!("File watcher error: {e}"),
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if pending.is_empty() {
                            continue;
                        }
                        let batch = std::mem::take(&mut pending)
                            .into_iter()
                            .map(|(path, kind)| WatcherEvent { path, kind })
                            .collect();
                        if batch_tx.send(batch).is_err() {
                            return;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        Ok(FileWatcher {
            watcher,
            thread,
            batches,
        })
    }
}

/// Fold a raw notification into the pending batch.
fn record(pending: &mut BTreeMap<PathBuf, ChangeKind>, event: Event) {
    let Some(kind) = ChangeKind::from_event(&event.kind) else {
        return;
    };
    for path in event.paths {
        if is_document_file(&path) {
            pending.insert(path, kind);
        }
    }
}

/// Check if a path looks like a collection document.
fn is_document_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            [CollectionKind::Content, CollectionKind::Data]
                .iter()
                .any(|&kind| extensions(kind).contains(&ext))
        })
        .unwrap_or(false)
}

/// A snapshot that can be replaced wholesale while readers keep going.
///
/// Readers take an `Arc<Snapshot>` and keep a consistent view for as long as
/// they hold it. [`reload`](Self::reload) builds a complete new snapshot and
/// swaps the pointer; a failed reload leaves the current snapshot in place.
pub struct LiveSnapshot {
    current: RwLock<Arc<Snapshot>>,
    registry: SchemaRegistry,
    discovery: Arc<dyn Discovery>,
    options: LoadOptions,
    generation: AtomicU64,
}

impl LiveSnapshot {
    pub fn load(
        registry: SchemaRegistry,
        discovery: Arc<dyn Discovery>,
        options: LoadOptions,
    ) -> Result<Self> {
        let snapshot = Snapshot::load(registry.clone(), discovery.as_ref(), options)?;
        Ok(LiveSnapshot {
            current: RwLock::new(Arc::new(snapshot)),
            registry,
            discovery,
            options,
            generation: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        let registry = SchemaRegistry::from_config(config)?;
        let discovery = Arc::new(FsDiscovery::new(&config.root));
        LiveSnapshot::load(
            registry,
            discovery,
            LoadOptions {
                validation: config.validation,
            },
        )
    }

    /// The snapshot readers should use right now.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of successful reloads so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Rebuild the snapshot from the same sources and swap it in.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let snapshot = Arc::new(Snapshot::load(
            self.registry.clone(),
            self.discovery.as_ref(),
            self.options,
        )?);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(snapshot)
    }

    /// Watch the collection directories under `root` and reload on change.
    /// Watching stops when the returned handle is dropped.
    pub fn watch(self: &Arc<Self>, root: &Path) -> Result<WatchHandle> {
        let dirs: Vec<PathBuf> = self
            .registry
            .collections()
            .map(|d| PathBuf::from(&d.directory))
            .collect();
        let watcher = FileWatcher::start(root, &dirs)?;
        log::info!("Watching {} collection directories under {}", dirs.len(), root.display());

        let live = Arc::clone(self);
        let (event_tx, event_rx) = mpsc::channel::<WatcherEvent>();
        let batches = watcher.batches;
        let thread = std::thread::spawn(move || {
            while let Ok(mut batch) = batches.recv() {
                // Batches that queued up during a slow reload share one reload
                for more in batches.try_iter() {
                    batch.extend(more);
                }
                log::debug!("{} document changes, reloading", batch.len());

                match live.reload() {
                    Ok(snapshot) => log::info!(
                        "Reloaded snapshot: {} entries",
                        snapshot.report().total_loaded()
                    ),
                    Err(e) => log::warn!("Reload failed, keeping previous snapshot: {e}"),
                }
                // Nobody may be listening; reloading continues regardless
                for event in batch {
                    let _ = event_tx.send(event);
                }
            }
        });

        Ok(WatchHandle {
            _watcher: watcher.watcher,
            _debounce_thread: watcher.thread,
            _reload_thread: thread,
            events: event_rx,
        })
    }
}

/// Keeps a watch alive. Changes that triggered a reload are forwarded on `events`.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    _debounce_thread: std::thread::JoinHandle<()>,
    _reload_thread: std::thread::JoinHandle<()>,
    pub events: mpsc::Receiver<WatcherEvent>,
}
