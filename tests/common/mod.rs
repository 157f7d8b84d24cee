//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use mathrpc_core::{
    error::{MathRpcError, Result},
    services::SolverConfig,
    CacheStore, Dispatcher, Headline, NewsProvider, ProblemSolver, RemoteModel, RpcServer,
    ServerStats,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Headline provider that counts how often it is asked
pub struct CountingNews {
    headlines: Vec<Headline>,
    calls: AtomicUsize,
}

impl CountingNews {
    pub fn new(titles: &[&str]) -> Arc<Self> {
        let headlines = titles
            .iter()
            .enumerate()
            .map(|(i, title)| Headline {
                title: title.to_string(),
                link: format!("https://news.example/{}", i),
            })
            .collect();
        Arc::new(Self {
            headlines,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsProvider for CountingNews {
    async fn fetch_headlines(&self, count: usize) -> Result<Vec<Headline>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.headlines.iter().take(count).cloned().collect())
    }
}

/// Remote model answering from a fixed script, recording the models asked
pub struct ScriptedRemote {
    script: Mutex<VecDeque<Result<String>>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            models: Mutex::new(Vec::new()),
        })
    }

    pub fn models_asked(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteModel for ScriptedRemote {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<String> {
        self.models.lock().unwrap().push(model.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MathRpcError::RemoteService("script exhausted".to_string())))
    }
}

/// Solver config with a plausible credential and two fallbacks
pub fn remote_solver_config() -> SolverConfig {
    SolverConfig {
        api_key: "k".repeat(39),
        primary_model: "primary-model".to_string(),
        fallback_models: vec!["fallback-a".to_string(), "fallback-b".to_string()],
    }
}

/// Dispatcher with a local-only solver and the given headline provider
pub fn local_dispatcher(news: Arc<CountingNews>) -> Dispatcher {
    Dispatcher::new(Arc::new(ProblemSolver::local_only()), news, 5)
}

/// A server running on an ephemeral port
pub struct TestServer<C: CacheStore + 'static> {
    pub addr: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(ServerStats, RpcServer<C>)>>,
}

impl<C: CacheStore + 'static> TestServer<C> {
    /// Stop the loop and return its counters and the stopped server
    pub async fn stop(self) -> (ServerStats, RpcServer<C>) {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .expect("server task panicked")
            .expect("server loop failed")
    }
}

/// Start a server on 127.0.0.1 with an OS-assigned port
pub async fn start_server<C: CacheStore + 'static>(dispatcher: Dispatcher, cache: C) -> TestServer<C> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (shutdown, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let mut server = RpcServer::new(dispatcher, cache);
        let stats = server
            .serve_with_shutdown(listener, async {
                let _ = rx.await;
            })
            .await?;
        Ok((stats, server))
    });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Send raw bytes on a fresh connection, half-close, and read the whole reply
pub async fn send_raw(addr: &str, payload: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8(reply).unwrap()
}
