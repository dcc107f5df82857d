//! Crawl event reporting
//!
//! The crawler reports progress through a narrow observer capability instead
//! of depending on any particular UI or channel type. Events are emitted from
//! the coordinator task only, so delivery order always matches emission
//! order. Observers must not block; hand the event off and return.

use tokio::sync::mpsc::UnboundedSender;

/// One progress notification from a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// Discovery started parsing a listing page.
    PageStarted { page: u32 },

    /// A batch of newly discovered articles is about to download.
    BatchStarted { page: u32, total: usize },

    /// One article in the current batch finished, successfully or not.
    ItemFinished {
        page: u32,
        done: usize,
        total: usize,
        url: String,
        error: Option<String>,
    },

    /// Every new article on the page succeeded and the page was committed.
    PageCompleted { page: u32, new_items: usize },

    /// The listing was exhausted or the page ceiling was reached.
    Completed,

    /// A stop request ended the run.
    Stopped,

    /// An unrecoverable fault ended the run.
    Failed { message: String },
}

impl CrawlEvent {
    /// Renders the fixed status vocabulary a front-end can display verbatim.
    pub fn status_text(&self) -> String {
        match self {
            Self::PageStarted { page } => format!("Parsing list page {}...", page),
            Self::BatchStarted { total, .. } => {
                format!("Preparing to download {} articles...", total)
            }
            Self::ItemFinished { done, total, .. } => {
                format!("Download progress: [{}/{}]", done, total)
            }
            Self::PageCompleted { page, .. } => format!("Page {} completed", page),
            Self::Completed => "Completed".to_string(),
            Self::Stopped => "Stopped".to_string(),
            Self::Failed { message } => format!("Error: {}", message),
        }
    }

    /// Returns true for the three run-ending events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed { .. })
    }
}

/// Receiver of crawl events
///
/// Implemented by anything that can accept an event without blocking: a
/// closure, a channel sender, a log bridge. The crawler holds observers
/// behind `Arc<dyn CrawlObserver>` and never inspects what they do.
pub trait CrawlObserver: Send + Sync {
    fn notify(&self, event: CrawlEvent);
}

/// Observer that discards every event
pub struct NullObserver;

impl CrawlObserver for NullObserver {
    fn notify(&self, _event: CrawlEvent) {}
}

// Any Fn(CrawlEvent) closure is an observer.
impl<F> CrawlObserver for F
where
    F: Fn(CrawlEvent) + Send + Sync,
{
    fn notify(&self, event: CrawlEvent) {
        self(event);
    }
}

/// Observer that forwards events into an unbounded channel
///
/// The receiving side decides how to render them; a closed receiver simply
/// drops further events rather than failing the crawl.
pub struct ChannelObserver {
    sender: UnboundedSender<CrawlEvent>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<CrawlEvent>) -> Self {
        Self { sender }
    }
}

impl CrawlObserver for ChannelObserver {
    fn notify(&self, event: CrawlEvent) {
        let _ = self.sender.send(event);
    }
}
