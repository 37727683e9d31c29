use crate::engine::{RenderEngine, RenderPage};
use crate::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

type PageId = u64;

enum Command {
    NewPage(oneshot::Sender<Result<PageId>>),
    Goto(PageId, String, oneshot::Sender<Result<()>>),
    Probe(PageId, String, oneshot::Sender<Result<bool>>),
    Content(PageId, oneshot::Sender<Result<String>>),
    Screenshot(PageId, oneshot::Sender<Result<Vec<u8>>>),
    ClosePage(PageId, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly browser handle backed by a dedicated worker thread.
///
/// The worker thread owns the engine and every open page and executes commands
/// sent from async tasks, so callers get an async interface without the engine
/// having to be `Send`. Dropping the handle without calling [`Browser::close`]
/// still closes every page and the engine once the worker notices the channel
/// is gone.
pub struct Browser {
    cmd_tx: Sender<Command>,
}

/// A handle representing one isolated page context in the browser.
pub struct Page {
    id: PageId,
    cmd_tx: Sender<Command>,
}

impl Browser {
    /// Spawn the worker thread, build the engine on it with `launch`, and wait
    /// for the engine to come up.
    pub async fn launch<E, F>(launch: F) -> Result<Self>
    where
        E: RenderEngine + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::Builder::new()
            .name("prerender-engine".into())
            .spawn(move || {
                let engine = match launch() {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));
                worker_loop(engine, cmd_rx);
            })
            .map_err(|e| Error::Engine(format!("failed to spawn engine worker: {}", e)))?;

        init_rx
            .await
            .map_err(|e| Error::Engine(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Open a new isolated page.
    pub async fn new_page(&self) -> Result<Page> {
        let id = request(&self.cmd_tx, "NewPage", Command::NewPage).await?;
        Ok(Page {
            id,
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Close every remaining page and shut the engine down.
    pub async fn close(self) -> Result<()> {
        request(&self.cmd_tx, "Close", Command::Close).await
    }
}

impl Page {
    /// Navigate to a URL and wait for the load to settle
    pub async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        request(&self.cmd_tx, "Goto", |tx| Command::Goto(self.id, url, tx)).await
    }

    /// Run one readiness probe against `selector`
    pub async fn is_ready(&self, selector: &str) -> Result<bool> {
        let selector = selector.to_string();
        request(&self.cmd_tx, "Probe", |tx| Command::Probe(self.id, selector, tx)).await
    }

    /// Serialized document markup
    pub async fn content(&self) -> Result<String> {
        request(&self.cmd_tx, "Content", |tx| Command::Content(self.id, tx)).await
    }

    /// Full-page PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        request(&self.cmd_tx, "Screenshot", |tx| Command::Screenshot(self.id, tx)).await
    }

    /// Close the page and dispose of its context.
    pub async fn close(self) -> Result<()> {
        request(&self.cmd_tx, "ClosePage", |tx| Command::ClosePage(self.id, tx)).await
    }
}

async fn request<T>(
    cmd_tx: &Sender<Command>,
    what: &str,
    make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(make(tx))
        .map_err(|_| Error::Engine(format!("{} failed: engine worker has exited", what)))?;
    rx.await
        .map_err(|e| Error::Engine(format!("{} canceled: {}", what, e)))?
}

fn worker_loop<E: RenderEngine>(mut engine: E, cmd_rx: mpsc::Receiver<Command>) {
    let mut pages: HashMap<PageId, E::Page> = HashMap::new();
    let mut next_id: PageId = 1;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::NewPage(resp) => {
                let res = engine.new_page().map(|page| {
                    let id = next_id;
                    next_id += 1;
                    pages.insert(id, page);
                    id
                });
                let _ = resp.send(res);
            }
            Command::Goto(id, url, resp) => {
                let res = with_page(&mut pages, id, |p| p.goto(&url));
                let _ = resp.send(res);
            }
            Command::Probe(id, selector, resp) => {
                let res = with_page(&mut pages, id, |p| p.is_ready(&selector));
                let _ = resp.send(res);
            }
            Command::Content(id, resp) => {
                let res = with_page(&mut pages, id, |p| p.content());
                let _ = resp.send(res);
            }
            Command::Screenshot(id, resp) => {
                let res = with_page(&mut pages, id, |p| p.screenshot_png());
                let _ = resp.send(res);
            }
            Command::ClosePage(id, resp) => {
                let res = match pages.remove(&id) {
                    Some(page) => engine.close_page(page),
                    None => Err(unknown_page(id)),
                };
                let _ = resp.send(res);
            }
            Command::Close(resp) => {
                close_all(&mut engine, &mut pages);
                let res = engine.close();
                let _ = resp.send(res);
                return;
            }
        }
    }

    // Every handle was dropped without an explicit close.
    debug!("Engine handle dropped; shutting engine down");
    close_all(&mut engine, &mut pages);
    if let Err(e) = engine.close() {
        warn!("Failed to close engine: {}", e);
    }
}

fn with_page<P, T>(pages: &mut HashMap<PageId, P>, id: PageId, f: impl FnOnce(&mut P) -> Result<T>) -> Result<T>
where
    P: RenderPage,
{
    let Some(page) = pages.get_mut(&id) else {
        return Err(unknown_page(id));
    };
    // A panicking page must not take the worker (and every later page) with it.
    match std::panic::catch_unwind(AssertUnwindSafe(|| f(page))) {
        Ok(res) => res,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Engine(format!("page {} panicked: {}", id, msg)))
        }
    }
}

fn close_all<E: RenderEngine>(engine: &mut E, pages: &mut HashMap<PageId, E::Page>) {
    for (id, page) in pages.drain() {
        if let Err(e) = engine.close_page(page) {
            warn!("Failed to close page {}: {}", id, e);
        }
    }
}

fn unknown_page(id: PageId) -> Error {
    Error::Engine(format!("page {} is not open", id))
}
