//! Local country database management with hot reload.
//!
//! The database file is a black box behind [`CountryDatabase`]; the default
//! implementation reads MaxMind `.mmdb` files, gzip-compressed or not. One
//! [`DatabaseHandle`] is live at a time, held in an `ArcSwapOption` so
//! lookups snapshot a reference and never block a concurrent reload.
//!
//! A directory watcher feeds change events over a channel to a
//! reconciliation thread, which debounces and then reloads, so a multi-step
//! file replace settles before the new file is read.

use arc_swap::ArcSwapOption;
use flate2::read::GzDecoder;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::metrics::{DatabaseOutcome, MetricsSink};

/// Delay between a file-change notification and the reload.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Opaque country database: given an IP, return an ISO country code or
/// nothing.
pub trait CountryDatabase: Send + Sync {
    fn country(&self, ip: IpAddr) -> Option<String>;
}

/// Function that opens a [`CountryDatabase`] from a file path.
pub type DatabaseOpener = Box<dyn Fn(&Path) -> Result<Box<dyn CountryDatabase>> + Send + Sync>;

/// MaxMind `.mmdb` database reader.
struct MaxMindDatabase {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindDatabase {
    fn open(path: &Path) -> Result<Box<dyn CountryDatabase>> {
        let data = read_database_file(path)?;
        let reader =
            maxminddb::Reader::from_source(data).map_err(|e| Error::Database(e.to_string()))?;
        Ok(Box::new(Self { reader }))
    }
}

impl CountryDatabase for MaxMindDatabase {
    fn country(&self, ip: IpAddr) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct CountryRecord {
            iso_code: Option<String>,
        }

        #[derive(serde::Deserialize)]
        struct GeoRecord {
            country: Option<CountryRecord>,
        }

        let record: GeoRecord = self.reader.lookup(ip).ok()?;
        record.country?.iso_code
    }
}

/// Read a database file, decompressing gzip when the path ends in `.gz`.
fn read_database_file(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    if path.extension() == Some(OsStr::new("gz")) {
        let mut decoder = GzDecoder::new(&data[..]);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        return Ok(decompressed);
    }

    Ok(data)
}

/// One loaded database: the reader plus its provenance.
pub struct DatabaseHandle {
    database: Box<dyn CountryDatabase>,
    loaded_at: SystemTime,
    source: PathBuf,
}

impl DatabaseHandle {
    /// When this handle was loaded.
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// The file this handle was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

struct ManagerInner {
    path: PathBuf,
    handle: ArcSwapOption<DatabaseHandle>,
    opener: DatabaseOpener,
    metrics: Arc<dyn MetricsSink>,
    generation: AtomicU64,
}

/// Manager for the hot-reloadable local country database.
///
/// Cloning is cheap and shares the same underlying handle; the watcher
/// thread holds a clone.
#[derive(Clone)]
pub struct LocalDatabaseManager {
    inner: Arc<ManagerInner>,
}

impl LocalDatabaseManager {
    /// Create a manager over a MaxMind database file.
    ///
    /// No load is attempted; call [`reload`](Self::reload) to load.
    pub fn new(path: impl Into<PathBuf>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_opener(path, metrics, Box::new(MaxMindDatabase::open))
    }

    /// Create a manager with a custom database opener, for formats other
    /// than MaxMind.
    pub fn with_opener(
        path: impl Into<PathBuf>,
        metrics: Arc<dyn MetricsSink>,
        opener: DatabaseOpener,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                path: path.into(),
                handle: ArcSwapOption::const_empty(),
                opener,
                metrics,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The configured database path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether a database handle is currently loaded.
    pub fn is_ready(&self) -> bool {
        self.inner.handle.load().is_some()
    }

    /// Number of successful loads so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Snapshot of the current handle, if any.
    pub fn current(&self) -> Option<Arc<DatabaseHandle>> {
        self.inner.handle.load_full()
    }

    /// Load (or re-load) the database from the configured path.
    ///
    /// A missing file leaves the current handle untouched and is not an
    /// error: the manager keeps serving what it has, or stays not-ready. An
    /// open failure also keeps the last good handle, so one corrupt update
    /// cannot take resolution down, and returns the error.
    pub fn reload(&self) -> Result<()> {
        let path = &self.inner.path;
        if !path.exists() {
            log::warn!(
                "country database missing at {:?}, keeping current handle",
                path
            );
            return Ok(());
        }

        match (self.inner.opener)(path) {
            Ok(database) => {
                let handle = DatabaseHandle {
                    database,
                    loaded_at: SystemTime::now(),
                    source: path.clone(),
                };
                self.inner.handle.store(Some(Arc::new(handle)));
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                log::info!(
                    "loaded country database from {:?} (generation {})",
                    path,
                    generation
                );
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "failed to load country database from {:?}, keeping current handle: {}",
                    path,
                    e
                );
                Err(e)
            }
        }
    }

    /// Look up the country code for an address.
    ///
    /// Takes a snapshot of the current handle and queries it outside any
    /// synchronization; a concurrent reload is never blocked by lookups.
    pub fn lookup(&self, ip: IpAddr) -> Option<String> {
        let handle = match self.inner.handle.load_full() {
            Some(handle) => handle,
            None => {
                self.inner.metrics.record_database(DatabaseOutcome::NotReady);
                return None;
            }
        };

        match handle.database.country(ip) {
            Some(code) => {
                self.inner.metrics.record_database(DatabaseOutcome::Hit);
                Some(code)
            }
            None => {
                self.inner.metrics.record_database(DatabaseOutcome::Miss);
                None
            }
        }
    }

    /// Watch the database file's directory and reload on changes.
    ///
    /// Create/modify events for the database file are debounced by
    /// [`RELOAD_DEBOUNCE`] and coalesced, then [`reload`](Self::reload)
    /// runs. Dropping the returned guard stops the watcher and joins the
    /// reconciliation thread.
    pub fn watch(&self) -> Result<WatchGuard> {
        let dir = match self.inner.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        log::info!("watching country database directory {:?}", dir);

        let manager = self.clone();
        let thread = thread::Builder::new()
            .name("geogate-db-watch".to_string())
            .spawn(move || manager.watch_loop(rx))?;

        Ok(WatchGuard {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }

    fn watch_loop(&self, rx: mpsc::Receiver<notify::Result<notify::Event>>) {
        let file_name = self.inner.path.file_name().map(OsStr::to_os_string);

        while let Ok(event) = rx.recv() {
            match event {
                Ok(event) if is_database_event(&event, file_name.as_deref()) => {
                    // Let a multi-step file replace finish before reading.
                    thread::sleep(RELOAD_DEBOUNCE);
                    while rx.try_recv().is_ok() {}
                    // reload logs its own failures and keeps the last good
                    // handle, nothing more to do here
                    let _ = self.reload();
                }
                Ok(_) => {}
                Err(e) => log::warn!("database watch error: {}", e),
            }
        }

        log::debug!("database watch loop stopped");
    }
}

fn is_database_event(event: &notify::Event, file_name: Option<&OsStr>) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => false,
    }
}

/// Guard for a running database watcher.
///
/// Dropping it stops the watcher and joins the reconciliation thread.
pub struct WatchGuard {
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        // Dropping the watcher closes the event channel, which ends the loop
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
