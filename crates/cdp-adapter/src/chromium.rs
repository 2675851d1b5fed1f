//! [`HostDocument`] backed by a Chromium page over the DevTools protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use dropclick_core_types::ElementId;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::{DomEvent, ElementSnapshot, HostDocument};
use crate::errors::HostError;
use crate::script;

const EVENT_CAPACITY: usize = 256;

/// How to obtain the browser.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Page to open.
    pub url: String,
    /// DevTools websocket of an already running browser; launches one when `None`.
    pub connect: Option<String>,
    pub headless: bool,
    /// Sampling interval of the injected mutation counter.
    pub mutation_poll: Duration,
}

impl ChromiumOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect: None,
            headless: false,
            mutation_poll: Duration::from_millis(25),
        }
    }
}

pub struct ChromiumDocument {
    // kept alive for the lifetime of the page
    _browser: Browser,
    page: Page,
    events: broadcast::Sender<DomEvent>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Deserialize)]
struct QueryResult {
    error: Option<String>,
    items: Vec<RawElement>,
}

#[derive(Deserialize)]
struct InspectResult {
    item: Option<RawElement>,
}

#[derive(Deserialize)]
struct RawElement {
    id: String,
    tag: String,
    text: String,
    classes: Vec<String>,
    role: Option<String>,
    disabled: bool,
    attached: bool,
    rendered: bool,
    hidden: bool,
}

impl From<RawElement> for ElementSnapshot {
    fn from(raw: RawElement) -> Self {
        ElementSnapshot {
            id: ElementId::new(raw.id),
            tag: raw.tag,
            text: raw.text,
            classes: raw.classes,
            role: raw.role,
            disabled: raw.disabled,
            attached: raw.attached,
            rendered: raw.rendered,
            hidden: raw.hidden,
        }
    }
}

impl ChromiumDocument {
    pub async fn open(options: ChromiumOptions) -> Result<Arc<Self>, HostError> {
        let (browser, mut handler) = match &options.connect {
            Some(ws) => Browser::connect(ws.clone())
                .await
                .map_err(|err| HostError::Launch(err.to_string()))?,
            None => {
                let mut builder = BrowserConfig::builder();
                if !options.headless {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(HostError::Launch)?;
                Browser::launch(config)
                    .await
                    .map_err(|err| HostError::Launch(err.to_string()))?
            }
        };

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        let handler_stop = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = handler_stop.cancelled() => break,
                    event = handler.next() => match event {
                        Some(Ok(())) => {}
                        Some(Err(err)) => {
                            warn!(target: "cdp-adapter", %err, "browser handler error");
                        }
                        None => break,
                    },
                }
            }
        }));

        let page = browser
            .new_page(options.url.as_str())
            .await
            .map_err(|err| HostError::Navigation(err.to_string()))?;
        info!(target: "cdp-adapter", url = %options.url, "page opened");

        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        tasks.push(spawn_observer(
            page.clone(),
            events.clone(),
            options.mutation_poll,
            shutdown.clone(),
        ));

        Ok(Arc::new(Self {
            _browser: browser,
            page,
            events,
            shutdown,
            tasks,
        }))
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> Result<T, HostError> {
        evaluate(&self.page, expression).await
    }
}

impl Drop for ChromiumDocument {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, expression: String) -> Result<T, HostError> {
    let result = page
        .evaluate(expression)
        .await
        .map_err(|err| HostError::Script(err.to_string()))?;
    result
        .into_value::<T>()
        .map_err(|err| HostError::Script(err.to_string()))
}

/// Samples the injected observer and republishes its counter as [`DomEvent`]s.
fn spawn_observer(
    page: Page,
    events: broadcast::Sender<DomEvent>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_count: i64 = 0;
        let mut last_url: Option<String> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let sample: Result<(i64, String), HostError> =
                evaluate(&page, script::OBSERVE.to_string()).await;
            let (count, url) = match sample {
                Ok(sample) => sample,
                Err(err) => {
                    // evaluation races navigations; the next tick retries
                    debug!(target: "cdp-adapter", %err, "observer sample failed");
                    continue;
                }
            };
            if count < 0 {
                last_count = 0;
                if last_url.is_some() {
                    let _ = events.send(DomEvent::Navigated { url: url.clone() });
                }
                last_url = Some(url);
                continue;
            }
            if count != last_count {
                last_count = count;
                let _ = events.send(DomEvent::Mutated);
            }
        }
    })
}

#[async_trait]
impl HostDocument for ChromiumDocument {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, HostError> {
        let result: QueryResult = self.eval(script::query_all(selector)).await?;
        if let Some(reason) = result.error {
            return Err(HostError::InvalidSelector {
                selector: selector.to_string(),
                reason,
            });
        }
        Ok(result.items.into_iter().map(ElementSnapshot::from).collect())
    }

    async fn inspect(&self, id: &ElementId) -> Result<Option<ElementSnapshot>, HostError> {
        let result: InspectResult = self.eval(script::inspect(id.as_str())).await?;
        Ok(result.item.map(ElementSnapshot::from))
    }

    async fn page_text(&self) -> Result<String, HostError> {
        self.eval(script::PAGE_TEXT.to_string()).await
    }

    async fn current_url(&self) -> Result<String, HostError> {
        self.page
            .url()
            .await
            .map_err(|err| HostError::Script(err.to_string()))
            .map(Option::unwrap_or_default)
    }

    async fn click(&self, id: &ElementId) -> Result<(), HostError> {
        let clicked: bool = self.eval(script::click(id.as_str())).await?;
        if clicked {
            Ok(())
        } else {
            Err(HostError::Detached(id.clone()))
        }
    }

    async fn reload(&self) -> Result<(), HostError> {
        self.page
            .reload()
            .await
            .map_err(|err| HostError::Navigation(err.to_string()))?;
        Ok(())
    }

    async fn history_back(&self) -> Result<(), HostError> {
        let _: bool = self.eval(script::HISTORY_BACK.to_string()).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DomEvent> {
        self.events.subscribe()
    }
}
