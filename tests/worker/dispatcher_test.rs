use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::unbounded_channel;
use typst_bridge::package::unique_specs;
use typst_bridge::protocol::{
    CompileOutput, CompileRequest, ImageParams, ReadError, StartupOptions, VirtualPath,
    WorkerCommand, WorkerEvent,
};
use typst_bridge::worker::{
    Dispatcher, Engine, EngineError, EngineLoader, FileData, FileResolver, WorkerHandle,
};

/// Engine that reads package imports and `#include "path"` lines.
struct ScriptedEngine {
    fonts: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn render(&self, source: &str, files: &dyn FileResolver) -> Result<String, EngineError> {
        if source.contains("#panic") {
            panic!("engine crashed");
        }
        for spec in unique_specs(source) {
            files.read(&VirtualPath::package_request(&spec))?;
        }

        let mut out = String::new();
        for line in source.lines() {
            match line.strip_prefix("#include ") {
                Some(path) => match files.read(path.trim_matches('"'))? {
                    FileData::Text(text) => out.push_str(&text),
                    FileData::Binary(data) => out.push_str(&format!("[{} bytes]", data.len())),
                },
                None if line.starts_with("#import") => {}
                None => out.push_str(line),
            }
        }
        Ok(out)
    }
}

impl Engine for ScriptedEngine {
    fn add_font(&mut self, _data: Vec<u8>) {
        self.fonts.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_fonts(&mut self) {
        self.fonts.store(0, Ordering::SeqCst);
    }

    fn compile_image(
        &mut self,
        source: &str,
        _path: &str,
        params: &ImageParams,
        files: &dyn FileResolver,
    ) -> Result<typst_bridge::protocol::RasterImage, EngineError> {
        let text = self.render(source, files)?;
        Ok(typst_bridge::protocol::RasterImage {
            width: params.size,
            height: 1,
            rgba: text.into_bytes(),
        })
    }

    fn compile_svg(
        &mut self,
        source: &str,
        _path: &str,
        files: &dyn FileResolver,
    ) -> Result<String, EngineError> {
        Ok(format!("<svg>{}</svg>", self.render(source, files)?))
    }

    fn compile_pdf(
        &mut self,
        source: &str,
        _path: &str,
        files: &dyn FileResolver,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(self.render(source, files)?.into_bytes())
    }
}

#[derive(Clone, Default)]
struct ScriptedLoader {
    fonts: Arc<AtomicUsize>,
}

impl EngineLoader for ScriptedLoader {
    type Engine = ScriptedEngine;

    fn load(&self, binary: &[u8], _root: &str) -> Result<ScriptedEngine, EngineError> {
        if binary.is_empty() {
            return Err(EngineError::Load("empty compiler binary".into()));
        }
        Ok(ScriptedEngine {
            fonts: self.fonts.clone(),
        })
    }
}

fn startup(binary: &[u8]) -> WorkerCommand {
    WorkerCommand::Startup(StartupOptions {
        binary: binary.to_vec(),
        base_path: "/vault".into(),
        package_path: "/vault/.obsidian/plugins/typst/packages/".into(),
    })
}

fn compile_result(event: WorkerEvent) -> Result<CompileOutput, typst_bridge::protocol::CompileFailure> {
    match event {
        WorkerEvent::CompileResult(result) => result,
        other => panic!("expected compile result, got {:?}", other),
    }
}

#[test]
fn test_startup_posts_ready_once() {
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(ScriptedLoader::default(), tx);

    dispatcher.dispatch(startup(b"wasm"));
    assert!(matches!(rx.try_recv().unwrap(), WorkerEvent::Ready));
    assert!(dispatcher.is_ready());

    dispatcher.dispatch(startup(b"wasm"));
    match rx.try_recv().unwrap() {
        WorkerEvent::Error(message) => assert!(message.contains("already initialized")),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(dispatcher.is_ready());
}

#[test]
fn test_load_failure_posts_error() {
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(ScriptedLoader::default(), tx);

    dispatcher.dispatch(startup(b""));
    match rx.try_recv().unwrap() {
        WorkerEvent::Error(message) => assert!(message.contains("empty compiler binary")),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(!dispatcher.is_ready());
}

#[test]
fn test_compile_before_startup_fails() {
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(ScriptedLoader::default(), tx);

    dispatcher.dispatch(WorkerCommand::Compile(CompileRequest::svg("Hello", "/main.typ")));
    let failure = compile_result(rx.try_recv().unwrap()).unwrap_err();
    assert_eq!(failure.message, "compiler not initialized");
    assert_eq!(failure.code, None);
}

#[test]
fn test_fonts_before_startup_are_ignored() {
    let loader = ScriptedLoader::default();
    let fonts = loader.fonts.clone();
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(loader, tx);

    dispatcher.dispatch(WorkerCommand::Fonts(vec![vec![1], vec![2]]));
    assert_eq!(fonts.load(Ordering::SeqCst), 0);

    dispatcher.dispatch(startup(b"wasm"));
    dispatcher.dispatch(WorkerCommand::Fonts(vec![vec![1], vec![2]]));
    assert_eq!(fonts.load(Ordering::SeqCst), 2);

    dispatcher.dispatch(WorkerCommand::ResetFonts);
    assert_eq!(fonts.load(Ordering::SeqCst), 0);

    assert!(matches!(rx.try_recv().unwrap(), WorkerEvent::Ready));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_engine_panic_becomes_failure() {
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(ScriptedLoader::default(), tx);
    dispatcher.dispatch(startup(b"wasm"));
    let _ = rx.try_recv();

    dispatcher.dispatch(WorkerCommand::Compile(CompileRequest::svg("#panic", "/main.typ")));
    let failure = compile_result(rx.try_recv().unwrap()).unwrap_err();
    assert_eq!(failure.message, "engine crashed");

    // The engine stays usable.
    dispatcher.dispatch(WorkerCommand::Compile(CompileRequest::svg("Hello", "/main.typ")));
    let output = compile_result(rx.try_recv().unwrap()).unwrap();
    assert_eq!(output, CompileOutput::Svg("<svg>Hello</svg>".into()));
}

#[test]
fn test_direct_mode_uses_package_list() {
    let (tx, mut rx) = unbounded_channel();
    let mut dispatcher = Dispatcher::new(ScriptedLoader::default(), tx);
    dispatcher.dispatch(WorkerCommand::SharedMemory(false));
    dispatcher.dispatch(WorkerCommand::Packages(vec!["preview/foo/0.1.0".into()]));
    dispatcher.dispatch(startup(b"wasm"));
    let _ = rx.try_recv();

    let source = "#import \"@preview/foo:0.1.0\": bar\nBody";
    dispatcher.dispatch(WorkerCommand::Compile(CompileRequest::pdf(source, "/main.typ")));
    let output = compile_result(rx.try_recv().unwrap()).unwrap();
    assert_eq!(output.as_bytes(), b"Body");

    let source = "#import \"@preview/missing:1.0.0\"\nBody";
    dispatcher.dispatch(WorkerCommand::Compile(CompileRequest::pdf(source, "/main.typ")));
    let failure = compile_result(rx.try_recv().unwrap()).unwrap_err();
    assert_eq!(failure.code, Some(ReadError::NotFound.code()));
}

#[tokio::test]
async fn test_shared_memory_round_trip() {
    let mut worker = WorkerHandle::spawn(ScriptedLoader::default()).unwrap();
    worker.send(startup(b"wasm")).unwrap();
    assert!(matches!(worker.next_event().await, Some(WorkerEvent::Ready)));

    let source = "Intro\n#include \"chapter.typ\"\n#include \"logo.png:binary\"";
    worker
        .send(WorkerCommand::Compile(CompileRequest::svg(source, "/main.typ")))
        .unwrap();

    let mut paths = Vec::new();
    let output = loop {
        match worker.next_event().await.unwrap() {
            WorkerEvent::FileRequest(request) => {
                let _guard = request.buffer.completion_guard();
                paths.push(request.path.clone());
                if request.path == "chapter.typ" {
                    request.buffer.write_success(b"Chapter").unwrap();
                } else {
                    request.buffer.write_success(&[0x89, 0x50, 0x4e]).unwrap();
                }
            }
            WorkerEvent::CompileResult(result) => break result.unwrap(),
            other => panic!("unexpected event {:?}", other),
        }
    };

    assert_eq!(paths, vec!["chapter.typ", "logo.png:binary"]);
    assert_eq!(output, CompileOutput::Svg("<svg>IntroChapter[3 bytes]</svg>".into()));
    assert!(worker.is_alive());
}

#[tokio::test]
async fn test_unanswered_request_fails_read() {
    let mut worker = WorkerHandle::spawn(ScriptedLoader::default()).unwrap();
    worker.send(startup(b"wasm")).unwrap();
    let _ = worker.next_event().await;

    let params = ImageParams {
        pixel_per_pt: 2.0,
        fill: String::new(),
        size: 320,
        display: true,
    };
    worker
        .send(WorkerCommand::Compile(CompileRequest::image(
            "#include \"gone.typ\"",
            "/main.typ",
            params,
        )))
        .unwrap();

    let failure = loop {
        match worker.next_event().await.unwrap() {
            // Dropping the guard without writing answers with a generic failure.
            WorkerEvent::FileRequest(request) => drop(request.buffer.completion_guard()),
            WorkerEvent::CompileResult(result) => break result.unwrap_err(),
            other => panic!("unexpected event {:?}", other),
        }
    };
    assert_eq!(failure.code, Some(ReadError::Generic.code()));
}

#[test]
fn test_dropping_handle_releases_blocked_read() {
    let loader = ScriptedLoader::default();
    // The loader and the engine each hold a clone until the worker thread exits.
    let fonts = loader.fonts.clone();
    let worker = WorkerHandle::spawn(loader).unwrap();
    worker.send(startup(b"wasm")).unwrap();
    worker
        .send(WorkerCommand::Compile(CompileRequest::svg(
            "#include \"a.typ\"",
            "/main.typ",
        )))
        .unwrap();

    // Let the engine park on the read with the request still queued.
    thread::sleep(Duration::from_millis(200));
    drop(worker);

    let deadline = Instant::now() + Duration::from_secs(5);
    while Arc::strong_count(&fonts) > 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(Arc::strong_count(&fonts), 1, "worker thread did not exit");
}

#[tokio::test]
async fn test_discarded_request_fails_read() {
    let mut worker = WorkerHandle::spawn(ScriptedLoader::default()).unwrap();
    worker.send(startup(b"wasm")).unwrap();
    let _ = worker.next_event().await;

    worker
        .send(WorkerCommand::Compile(CompileRequest::svg(
            "#include \"a.typ\"",
            "/main.typ",
        )))
        .unwrap();

    let failure = loop {
        match worker.next_event().await.unwrap() {
            WorkerEvent::FileRequest(request) => drop(request),
            WorkerEvent::CompileResult(result) => break result.unwrap_err(),
            other => panic!("unexpected event {:?}", other),
        }
    };
    assert_eq!(failure.code, Some(ReadError::Generic.code()));
    assert!(worker.is_alive());
}
