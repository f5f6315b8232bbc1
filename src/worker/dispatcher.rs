//! Worker-side command dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::engine::{Engine, EngineLoader};
use super::error::EngineError;
use super::resolver::{DirectResolver, FileResolver, SharedMemoryResolver};
use crate::protocol::{
    CompileFailure, CompileFormat, CompileOutput, CompileRequest, StartupOptions, WorkerCommand,
    WorkerEvent,
};

/// Default URL prefix for the direct resolver.
pub const DEFAULT_FALLBACK_BASE_URL: &str = "http://localhost/_capacitor_file_";

/// Owns the engine and answers [`WorkerCommand`]s.
///
/// One dispatcher runs per worker thread. Compiles are handled one at a time;
/// the engine blocks inside [`FileResolver::read`] while the host answers.
pub struct Dispatcher<L: EngineLoader> {
    loader: L,
    engine: Option<L::Engine>,
    events: UnboundedSender<WorkerEvent>,

    shared_memory: bool,
    base_path: String,
    package_path: String,
    packages: Vec<String>,
    fallback_base_url: String,
    http: Option<reqwest::blocking::Client>,
}

impl<L: EngineLoader> Dispatcher<L> {
    pub fn new(loader: L, events: UnboundedSender<WorkerEvent>) -> Self {
        Self {
            loader,
            engine: None,
            events,
            shared_memory: true,
            base_path: String::new(),
            package_path: String::new(),
            packages: Vec::new(),
            fallback_base_url: DEFAULT_FALLBACK_BASE_URL.to_string(),
            http: None,
        }
    }

    /// Override the URL prefix used when shared memory is unavailable.
    pub fn with_fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = url.into();
        self
    }

    /// Whether startup has completed.
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Process commands until the host drops its sender.
    pub fn run(mut self, commands: Receiver<WorkerCommand>) {
        info!("compiler worker started");
        while let Ok(command) = commands.recv() {
            self.dispatch(command);
        }
        info!("compiler worker stopped");
    }

    /// Handle a single command.
    pub fn dispatch(&mut self, command: WorkerCommand) {
        debug!(kind = command.kind(), "worker received command");
        match command {
            WorkerCommand::SharedMemory(enabled) => self.shared_memory = enabled,
            WorkerCommand::Startup(options) => self.startup(options),
            WorkerCommand::Fonts(fonts) => self.add_fonts(fonts),
            WorkerCommand::ResetFonts => self.reset_fonts(),
            WorkerCommand::Packages(packages) => {
                debug!(count = packages.len(), "package list updated");
                self.packages = packages;
            }
            WorkerCommand::Compile(request) => {
                let result = self.compile(&request);
                if let Err(failure) = &result {
                    warn!(format = request.format.name(), error = %failure, "compile failed");
                }
                self.post(WorkerEvent::CompileResult(result));
            }
        }
    }

    fn post(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            warn!("host dropped the event channel");
        }
    }

    fn startup(&mut self, options: StartupOptions) {
        if self.engine.is_some() {
            warn!("ignoring repeated startup");
            self.post(WorkerEvent::Error("compiler already initialized".into()));
            return;
        }

        self.base_path = options.base_path;
        self.package_path = options.package_path;

        match self.loader.load(&options.binary, &self.base_path) {
            Ok(engine) => {
                self.engine = Some(engine);
                info!(base_path = %self.base_path, "compiler initialized");
                self.post(WorkerEvent::Ready);
            }
            Err(err) => {
                error!(error = %err, "compiler initialization failed");
                self.post(WorkerEvent::Error(err.to_string()));
            }
        }
    }

    fn add_fonts(&mut self, fonts: Vec<Vec<u8>>) {
        let Some(engine) = self.engine.as_mut() else {
            warn!("compiler not initialized yet, cannot add fonts");
            return;
        };
        debug!(count = fonts.len(), "adding fonts");
        for font in fonts {
            engine.add_font(font);
        }
    }

    fn reset_fonts(&mut self) {
        match self.engine.as_mut() {
            Some(engine) => engine.reset_fonts(),
            None => warn!("compiler not initialized yet, cannot reset fonts"),
        }
    }

    fn compile(&mut self, request: &CompileRequest) -> Result<CompileOutput, CompileFailure> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(CompileFailure::new("compiler not initialized"));
        };

        if self.shared_memory {
            let resolver = SharedMemoryResolver::new(self.events.clone());
            return run_engine(engine, request, &resolver);
        }

        let client = self.http.get_or_insert_with(reqwest::blocking::Client::new);
        let resolver = DirectResolver {
            client,
            base_url: &self.fallback_base_url,
            base_path: &self.base_path,
            package_path: &self.package_path,
            packages: &self.packages,
        };
        run_engine(engine, request, &resolver)
    }
}

/// Invoke the engine entry point for the request's format.
///
/// Engine errors and engine panics both become a [`CompileFailure`].
fn run_engine<E: Engine>(
    engine: &mut E,
    request: &CompileRequest,
    files: &dyn FileResolver,
) -> Result<CompileOutput, CompileFailure> {
    let source = request.source.as_str();
    let path = request.path.as_str();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &request.format {
        CompileFormat::Image(params) => engine
            .compile_image(source, path, params, files)
            .map(CompileOutput::Image),
        CompileFormat::Svg => engine.compile_svg(source, path, files).map(CompileOutput::Svg),
        CompileFormat::Pdf => engine.compile_pdf(source, path, files).map(CompileOutput::Pdf),
    }));

    match outcome {
        Ok(result) => result.map_err(CompileFailure::from),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "engine panicked".to_string());
            Err(EngineError::Compile(message).into())
        }
    }
}
