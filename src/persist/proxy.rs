//! Saving through a streaming proxy service.
//!
//! The service hands us a write stream that turns into an ordinary
//! download on the other end, so nothing is buffered and nobody is prompted.
//! It only works if two helper assets are being served alongside us,
//! which we check before starting anything.

use log::*;

use super::{stream_into, PersistenceOutcome, Strategy, WritableFile};
use crate::download::DownloadMethod;
use crate::entry::ArchiveEntry;
use crate::path::file_name;
use crate::result::*;

/// Where the proxy's assets are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// The page the service redirects transfers through.
    pub mitm: String,
    /// The worker script that intercepts them.
    pub service_worker: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mitm: String::from("/streamsaver/mitm.html"),
            service_worker: String::from("/streamsaver/sw.js"),
        }
    }
}

/// Checks if a served asset exists without fetching it.
pub trait AssetProbe: Sync {
    fn exists(&self, path: &str) -> SaveResult<bool>;
}

/// The streaming service itself.
pub trait StreamService {
    /// The platform's own flag for whether streaming downloads work at all.
    fn supported(&self) -> bool;

    /// Opens a stream that becomes a download named `name`.
    ///
    /// `mitm` is the redirect target the service should route through.
    fn create_write_stream(
        &self,
        mitm: &str,
        name: &str,
        size: Option<u64>,
    ) -> SaveResult<Box<dyn WritableFile>>;
}

pub struct ProxyStream<P, S> {
    secure_context: bool,
    config: ProxyConfig,
    assets: P,
    service: S,
}

impl<P: AssetProbe, S: StreamService> ProxyStream<P, S> {
    pub fn new(secure_context: bool, config: ProxyConfig, assets: P, service: S) -> Self {
        Self {
            secure_context,
            config,
            assets,
            service,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Probes both assets at once.
    fn assets_present(&self) -> SaveResult<bool> {
        let assets = &self.assets;
        let config = &self.config;
        let (mitm, worker) = rayon::join(
            || assets.exists(&config.mitm),
            || assets.exists(&config.service_worker),
        );
        let present = mitm? && worker?;
        if !present {
            debug!(
                "Proxy assets missing ({} or {})",
                config.mitm, config.service_worker
            );
        }
        Ok(present)
    }

    fn save(&self, entry: &dyn ArchiveEntry) -> SaveResult<u64> {
        if !self.assets_present()? {
            return Err(SaveError::Unsupported(String::from("proxy assets missing")));
        }
        let stream = self.service.create_write_stream(
            &self.config.mitm,
            file_name(entry.filename()),
            entry.uncompressed_size().filter(|s| *s > 0),
        )?;
        stream_into(entry, stream)
    }
}

impl<P: AssetProbe, S: StreamService> Strategy for ProxyStream<P, S> {
    fn method(&self) -> DownloadMethod {
        DownloadMethod::StreamSaver
    }

    fn probe(&self) -> bool {
        self.secure_context && self.service.supported()
    }

    fn attempt(&self, entry: &dyn ArchiveEntry) -> PersistenceOutcome {
        if entry.is_directory() {
            return PersistenceOutcome::Unsupported;
        }
        if !self.probe() {
            if !self.secure_context {
                debug!("Proxy stream unavailable: insecure context");
            } else {
                debug!("Proxy stream unavailable: service reports no support");
            }
            return PersistenceOutcome::Unsupported;
        }

        debug!("Attempting a proxy stream of {}", entry.filename());
        PersistenceOutcome::classify("Proxy stream", self.save(entry))
    }
}
