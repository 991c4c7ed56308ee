use crate::adapters::{HttpRepoSource, MutationStub, PreviewRepoSource};
use crate::core::counter::CounterService;
use crate::core::query_client::{mutation_fn, query_fn, QueryClient, QueryEvent};
use crate::core::{ConfigProvider, CounterSync, RepoMutator, RepoRecord, RepoSource};
use crate::utils::error::{PulseError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const REPO_DATA_KEY: &str = "repoData";
pub const COUNTER_KEY: &str = "counter";
pub const MUTATE_REPO_KEY: &str = "mutateRepoData";

/// Repository query as seen by the status view.
#[derive(Debug, Clone, Default)]
pub struct RepoDataView {
    pub is_pending: bool,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub error: Option<Arc<PulseError>>,
    pub data: Option<RepoRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub counter: Option<u64>,
    pub repo: RepoDataView,
}

impl fmt::Display for DashboardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(data) = &self.repo.data else {
            return match &self.repo.error {
                Some(err) => write!(f, "An error has occurred: {}", err),
                None => write!(f, "Loading..."),
            };
        };

        let counter = self
            .counter
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());

        write!(
            f,
            "{} | Counter: {} | {} | 👀 {} ✨ {} 🍴 {}",
            data.name,
            counter,
            data.description,
            data.subscriber_count,
            data.star_count,
            data.fork_count
        )?;

        if self.repo.is_fetching {
            write!(f, " | Updating...")?;
        } else if let Some(err) = &self.repo.error {
            write!(f, " | ⚠️ {}", err)?;
        }
        Ok(())
    }
}

/// Wires the counter, the repository source and the mutation into one
/// query client.
///
/// The query client only holds the counter weakly, so dropping the last
/// `Dashboard` clone releases the counter and cancels its timer even
/// without `shutdown()`.
#[derive(Clone)]
pub struct Dashboard {
    counter: Arc<CounterService>,
    queries: QueryClient,
    sync: CounterSync,
}

impl Dashboard {
    pub fn new(
        counter: Arc<CounterService>,
        queries: QueryClient,
        source: Arc<dyn RepoSource>,
        mutator: Arc<dyn RepoMutator>,
        sync: CounterSync,
    ) -> Self {
        queries.register_query(
            REPO_DATA_KEY,
            query_fn(move || {
                let source = Arc::clone(&source);
                async move { source.fetch_repo_data().await }
            }),
        );

        // 弱參考：觀察者經由 client 持有此函式，強參考會讓計數器永遠不被釋放
        let reader = Arc::downgrade(&counter);
        queries.register_query(
            COUNTER_KEY,
            query_fn(move || {
                let value = reader
                    .upgrade()
                    .map(|counter| counter.get_value())
                    .ok_or_else(|| PulseError::CounterReleasedError {
                        key: COUNTER_KEY.to_string(),
                    });
                async move { value }
            }),
        );

        queries.register_mutation(
            MUTATE_REPO_KEY,
            mutation_fn(move || {
                let mutator = Arc::clone(&mutator);
                async move { mutator.mutate_repo_data().await }
            }),
        );

        let dashboard = Self {
            counter,
            queries,
            sync,
        };
        dashboard.attach_observer();
        dashboard
    }

    /// Builds the HTTP (or preview, when offline) dashboard described by
    /// `config`.
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let source: Arc<dyn RepoSource> = if config.offline() {
            tracing::info!("📴 Offline mode: serving the preview repository record");
            Arc::new(PreviewRepoSource::default())
        } else {
            Arc::new(HttpRepoSource::from_config(config)?)
        };

        Ok(Self::new(
            Arc::new(CounterService::new(config.tick_interval())),
            QueryClient::new(),
            source,
            Arc::new(MutationStub::new(config.mutation_delay())),
            config.counter_sync(),
        ))
    }

    fn attach_observer(&self) {
        let client = self.queries.clone();
        match self.sync {
            CounterSync::Invalidate => {
                self.counter.set_update_observer(move || {
                    client.invalidate(COUNTER_KEY);
                });
            }
            CounterSync::Push => {
                let counter = Arc::downgrade(&self.counter);
                self.counter.set_update_observer(move || {
                    let Some(counter) = counter.upgrade() else {
                        return;
                    };
                    if let Err(e) = client.set_query_data(COUNTER_KEY, counter.get_value()) {
                        tracing::warn!("Failed to push counter value: {}", e);
                    }
                });
            }
        }
    }

    /// Starts the counter and loads both queries.
    pub fn start(&self) {
        self.counter.start();
        self.mount();
    }

    /// Initial fetch of every query that has not been fetched yet.
    pub fn mount(&self) {
        for key in [REPO_DATA_KEY, COUNTER_KEY] {
            let needs_fetch = self
                .queries
                .get_status(key)
                .map(|state| state.fetch_count == 0 && state.data.is_none())
                .unwrap_or(false);
            if needs_fetch {
                self.queries.spawn_fetch(key);
            }
        }
    }

    /// Stops the counter and drops its observer, releasing the reference
    /// the observer holds on the query client.
    pub fn shutdown(&self) {
        self.counter.stop();
        self.counter.clear_update_observer();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.queries.subscribe()
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn counter_service(&self) -> &Arc<CounterService> {
        &self.counter
    }

    pub fn counter_sync(&self) -> CounterSync {
        self.sync
    }

    pub fn repo_data(&self) -> RepoDataView {
        let Some(state) = self.queries.get_status(REPO_DATA_KEY) else {
            return RepoDataView::default();
        };

        let (data, decode_error) = match state.data_as::<RepoRecord>() {
            Ok(data) => (data, None),
            Err(e) => (None, Some(Arc::new(e))),
        };

        RepoDataView {
            is_pending: state.is_pending(),
            is_loading: state.is_loading(),
            is_fetching: state.is_fetching(),
            error: decode_error.or(state.error),
            data,
        }
    }

    /// Last counter value the cache has seen.
    pub fn counter(&self) -> Option<u64> {
        self.queries
            .get_status(COUNTER_KEY)
            .and_then(|state| state.data_as::<u64>().ok().flatten())
    }

    /// Invalidates the repository query, which refetches it.
    pub fn refresh_repo(&self) -> bool {
        self.queries.invalidate(REPO_DATA_KEY)
    }

    /// Runs the repository write, then refreshes the repository query.
    pub async fn mutate_repo(&self) -> Result<()> {
        self.queries.mutate(MUTATE_REPO_KEY).await?;
        self.queries.invalidate(REPO_DATA_KEY);
        Ok(())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            counter: self.counter(),
            repo: self.repo_data(),
        }
    }
}
