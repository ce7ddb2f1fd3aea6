//! Background fetches tagged with a navigation token.
//!
//! Each submission gets a fresh token and one worker thread. Completions
//! arrive over a channel that the UI drains every frame; only the completion
//! carrying the latest token is handed back; older ones are dropped.

use std::any::Any;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use ks_core::BrowserError;
use ks_core::BrowserResult;
use ks_net::FetchConfig;
use ks_net::FetchedPage;
use ks_net::normalize_address;

const FETCH_THREAD_NAME: &str = "kestrel-fetch";

/// Blocking fetch run on the worker thread.
pub type FetchFn = Arc<dyn Fn(&str) -> BrowserResult<FetchedPage> + Send + Sync>;

#[derive(Debug)]
pub struct FetchCompletion {
    pub token: u64,
    pub address: String,
    pub result: BrowserResult<FetchedPage>,
}

pub struct Navigator {
    fetch: FetchFn,
    next_token: u64,
    pending: Option<u64>,
    sender: mpsc::Sender<FetchCompletion>,
    receiver: mpsc::Receiver<FetchCompletion>,
}

impl Navigator {
    pub fn new(fetch: FetchFn) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            fetch,
            next_token: 1,
            pending: None,
            sender,
            receiver,
        }
    }

    /// Fetches over the network with the default transport settings.
    pub fn with_default_fetcher() -> Self {
        let config = FetchConfig::default();
        Self::new(Arc::new(move |address: &str| {
            ks_net::DefaultFetcher::new(config.clone()).fetch(address)
        }))
    }

    /// Starts fetching `input` and makes it the only navigation whose
    /// completion will be accepted. Returns the normalised address.
    pub fn submit(&mut self, input: &str) -> BrowserResult<String> {
        let address = normalize_address(input);
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);

        let fetch = Arc::clone(&self.fetch);
        let sender = self.sender.clone();
        let worker_address = address.clone();
        let job = move || {
            // A panicking fetch still has to clear the pending navigation.
            let result = panic::catch_unwind(AssertUnwindSafe(|| fetch(&worker_address)))
                .unwrap_or_else(|payload| Err(worker_failed(payload.as_ref())));
            // The receiver only goes away when the window closes.
            let _ = sender.send(FetchCompletion {
                token,
                address: worker_address,
                result,
            });
        };

        thread::Builder::new()
            .name(FETCH_THREAD_NAME.to_owned())
            .spawn(job)
            .map_err(|error| {
                BrowserError::new(
                    "app.navigation.spawn_failed",
                    format!("could not start fetch worker: {error}"),
                )
            })?;

        tracing::info!(token, address = %address, "navigation started");
        self.pending = Some(token);
        Ok(address)
    }

    /// Returns the completion for the latest submission once it arrives.
    pub fn poll(&mut self) -> Option<FetchCompletion> {
        while let Ok(completion) = self.receiver.try_recv() {
            if Some(completion.token) != self.pending {
                tracing::debug!(
                    token = completion.token,
                    address = %completion.address,
                    "discarding stale navigation result"
                );
                continue;
            }

            self.pending = None;
            return Some(completion);
        }
        None
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }
}

fn worker_failed(payload: &(dyn Any + Send)) -> BrowserError {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    tracing::error!(reason = %reason, "fetch worker panicked");
    BrowserError::new(
        "app.navigation.worker_failed",
        format!("The page could not be fetched: {reason}"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;
    use std::time::Instant;

    use ks_core::BrowserError;
    use ks_net::FetchedPage;

    use super::FetchCompletion;
    use super::Navigator;

    fn page(address: &str) -> FetchedPage {
        FetchedPage {
            url: address.to_owned(),
            status: 200,
            content_type: Some("text/html".to_owned()),
            body: format!("<p>{address}</p>"),
        }
    }

    fn wait_for(navigator: &mut Navigator) -> FetchCompletion {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(completion) = navigator.poll() {
                return completion;
            }
            if Instant::now() > deadline {
                panic!("navigation did not complete");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn delivers_the_completion_for_a_normalised_address() {
        let mut navigator = Navigator::new(Arc::new(|address: &str| Ok(page(address))));
        let address = match navigator.submit("  example.com ") {
            Ok(address) => address,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(address, "http://example.com");
        assert!(navigator.is_loading());

        let completion = wait_for(&mut navigator);
        assert_eq!(completion.address, "http://example.com");
        match completion.result {
            Ok(fetched) => assert_eq!(fetched.url, "http://example.com"),
            Err(error) => panic!("{error}"),
        }
        assert!(!navigator.is_loading());
    }

    #[test]
    fn fetch_errors_are_delivered_as_completions() {
        let mut navigator = Navigator::new(Arc::new(|_: &str| {
            Err(BrowserError::new("net.connect_failed", "Connection refused"))
        }));
        assert!(navigator.submit("https://example.com").is_ok());

        let completion = wait_for(&mut navigator);
        match completion.result {
            Ok(_) => panic!("expected an error"),
            Err(error) => assert_eq!(error.message, "Connection refused"),
        }
    }

    #[test]
    fn panicking_fetch_still_completes_the_navigation() {
        let mut navigator = Navigator::new(Arc::new(|address: &str| {
            if address.contains("boom") {
                panic!("decoder blew up");
            }
            Ok(page(address))
        }));
        assert!(navigator.submit("boom.example").is_ok());

        let completion = wait_for(&mut navigator);
        match completion.result {
            Ok(_) => panic!("expected an error"),
            Err(error) => {
                assert_eq!(error.code, "app.navigation.worker_failed");
                assert!(error.message.contains("decoder blew up"));
            }
        }
        assert!(!navigator.is_loading());

        assert!(navigator.submit("fine.example").is_ok());
        let completion = wait_for(&mut navigator);
        assert!(completion.result.is_ok());
    }

    #[test]
    fn stale_completions_are_discarded() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let gate = Arc::clone(&release_rx);
        let mut navigator = Navigator::new(Arc::new(move |address: &str| {
            if address.contains("slow") {
                if let Ok(receiver) = gate.lock() {
                    let _ = receiver.recv_timeout(Duration::from_secs(5));
                }
            }
            Ok(page(address))
        }));

        assert!(navigator.submit("slow.example").is_ok());
        assert!(navigator.submit("fast.example").is_ok());

        let completion = wait_for(&mut navigator);
        assert_eq!(completion.address, "http://fast.example");

        let _ = release_tx.send(());
        std::thread::sleep(Duration::from_millis(100));
        assert!(navigator.poll().is_none());
        assert!(!navigator.is_loading());
    }
}
