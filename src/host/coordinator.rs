//! Host coordinator: drives a worker and answers its file requests.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{HostError, HostResult};
use crate::config::Settings;
use crate::fonts::{font_dirs, scan_font_dirs};
use crate::package::PackageResolver;
use crate::protocol::{
    CompileOutput, CompileRequest, FileRequest, ReadError, StartupOptions, VirtualPath,
    WorkerCommand, WorkerEvent,
};
use crate::template::{prepare_source, TemplateVariables};
use crate::vfs::{LocalFs, VirtualFs};
use crate::worker::{Dispatcher, EngineLoader, WorkerHandle};

/// Owns the virtual filesystem and the package resolver on the host side.
///
/// A coordinator can drive any number of workers; each call takes the
/// handle it should talk to.
pub struct HostCoordinator {
    vfs: Arc<dyn VirtualFs>,
    resolver: PackageResolver,
    settings: Settings,
    variables: TemplateVariables,
}

impl HostCoordinator {
    pub fn new(vfs: Arc<dyn VirtualFs>, resolver: PackageResolver, settings: Settings) -> Self {
        Self {
            vfs,
            resolver,
            settings,
            variables: TemplateVariables::default(),
        }
    }

    /// Coordinator over the configured vault, downloading from the
    /// configured registry.
    pub fn from_settings(settings: Settings) -> HostResult<Self> {
        let vfs: Arc<dyn VirtualFs> = Arc::new(LocalFs::new(settings.vault_root()?));
        let resolver = PackageResolver::from_settings(&settings, vfs.clone())?;
        Ok(Self::new(vfs, resolver, settings))
    }

    pub fn with_variables(mut self, variables: TemplateVariables) -> Self {
        self.variables = variables;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &PackageResolver {
        &self.resolver
    }

    pub fn variables_mut(&mut self) -> &mut TemplateVariables {
        &mut self.variables
    }

    /// Answer one blocked read.
    ///
    /// The buffer ends with exactly one outcome and is notified exactly once,
    /// also when resolution panics.
    pub async fn handle_request(&self, request: FileRequest) -> Result<(), ReadError> {
        let FileRequest { buffer, path, .. } = request;
        let _guard = buffer.completion_guard();

        let outcome = match self.read_payload(&path).await {
            Ok(payload) => buffer.write_success(&payload),
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            buffer.write_failure(err);
        }

        debug!(%path, code = buffer.status_word(), "file request answered");
        outcome
    }

    async fn read_payload(&self, raw: &str) -> Result<Vec<u8>, ReadError> {
        match VirtualPath::parse(raw) {
            Ok(VirtualPath::Package(spec)) => match self.resolver.resolve(&spec).await {
                Ok(folder) => Ok(folder.into_bytes()),
                Err(err) => {
                    warn!(%spec, error = %err, "package request failed");
                    Err(err.read_error())
                }
            },
            Ok(VirtualPath::File { path, binary }) => {
                let read = if binary {
                    self.vfs.read(&path).await
                } else {
                    self.vfs.read_to_string(&path).await.map(String::into_bytes)
                };
                read.map_err(|err| {
                    debug!(%path, error = %err, "file read failed");
                    ReadError::NotFound
                })
            }
            Err(err) => {
                warn!(path = raw, error = %err, "malformed package request");
                Err(ReadError::NotFound)
            }
        }
    }

    /// Spawn a worker configured from `[worker]`.
    ///
    /// The configured fallback URL is used whenever shared memory is off.
    pub fn spawn_worker<L: EngineLoader>(&self, loader: L) -> HostResult<WorkerHandle> {
        let base_url = self.settings.worker.fallback_base_url.clone();
        let worker = WorkerHandle::spawn_with(move |events| {
            Dispatcher::new(loader, events).with_fallback_base_url(base_url)
        })?;
        Ok(worker)
    }

    /// Configure the read mode and initialize the engine.
    ///
    /// Waits for the worker's `Ready`; an `Error` event fails the startup.
    pub async fn startup(&self, worker: &mut WorkerHandle, binary: Vec<u8>) -> HostResult<()> {
        let shared_memory = self.settings.worker.shared_memory;
        worker.send(WorkerCommand::SharedMemory(shared_memory))?;
        if !shared_memory {
            worker.send(WorkerCommand::Packages(self.package_list().await?))?;
        }

        let base_path = self.settings.vault_root()?.to_string_lossy().into_owned();
        worker.send(WorkerCommand::Startup(StartupOptions {
            binary,
            base_path,
            package_path: self.resolver.storage().to_string(),
        }))?;

        loop {
            match worker.next_event().await {
                Some(WorkerEvent::Ready) => {
                    info!(shared_memory, "compiler worker ready");
                    return Ok(());
                }
                Some(WorkerEvent::Error(message)) => return Err(HostError::Startup(message)),
                Some(WorkerEvent::FileRequest(request)) => {
                    let _ = self.handle_request(request).await;
                }
                Some(WorkerEvent::CompileResult(_)) => {
                    warn!("ignoring compile result received during startup");
                }
                None => return Err(HostError::WorkerExited),
            }
        }
    }

    /// Replace the worker's fonts with `fonts`.
    pub fn load_fonts(&self, worker: &WorkerHandle, fonts: Vec<Vec<u8>>) -> HostResult<()> {
        worker.send(WorkerCommand::ResetFonts)?;
        if !fonts.is_empty() {
            debug!(count = fonts.len(), "sending fonts to worker");
            worker.send(WorkerCommand::Fonts(fonts))?;
        }
        Ok(())
    }

    /// Load the configured font families from the platform font directories.
    ///
    /// Returns the families with no matching font file.
    pub async fn load_configured_fonts(&self, worker: &WorkerHandle) -> HostResult<Vec<String>> {
        self.load_fonts_from(worker, &font_dirs()).await
    }

    /// Load the configured font families from `dirs`, replacing the worker's
    /// fonts. Returns the families with no matching font file.
    pub async fn load_fonts_from(
        &self,
        worker: &WorkerHandle,
        dirs: &[PathBuf],
    ) -> HostResult<Vec<String>> {
        let selection = scan_font_dirs(dirs, &self.settings.fonts.families).await;
        if !selection.missing.is_empty() {
            warn!(missing = ?selection.missing, "configured fonts not found");
        }
        self.load_fonts(worker, selection.fonts)?;
        Ok(selection.missing)
    }

    /// Installed packages as `ns/name/version`.
    pub async fn package_list(&self) -> HostResult<Vec<String>> {
        let installed = self.resolver.list_installed().await?;
        Ok(installed.iter().map(|spec| spec.dir()).collect())
    }

    /// Send the current package list to a worker using the direct resolver.
    pub async fn seed_packages(&self, worker: &WorkerHandle) -> HostResult<()> {
        worker.send(WorkerCommand::Packages(self.package_list().await?))?;
        Ok(())
    }

    /// Source with the layout preamble and template variables applied.
    pub fn prepare_source(&self, source: &str) -> String {
        prepare_source(source, &self.settings.compile, &self.variables)
    }

    /// Run one compile, answering file requests until the result arrives.
    pub async fn compile(
        &self,
        worker: &mut WorkerHandle,
        request: CompileRequest,
    ) -> HostResult<CompileOutput> {
        let format = request.format.name();
        worker.send(WorkerCommand::Compile(request))?;

        loop {
            match worker.next_event().await {
                Some(WorkerEvent::Ready) => continue,
                Some(WorkerEvent::FileRequest(request)) => {
                    let _ = self.handle_request(request).await;
                }
                Some(WorkerEvent::CompileResult(result)) => {
                    debug!(format, ok = result.is_ok(), "compile finished");
                    return result.map_err(HostError::from);
                }
                Some(WorkerEvent::Error(message)) => {
                    return Err(HostError::Compile {
                        message,
                        code: None,
                    })
                }
                None => return Err(HostError::WorkerExited),
            }
        }
    }
}
