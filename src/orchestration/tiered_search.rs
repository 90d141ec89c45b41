//! # Tiered Search Orchestrator
//!
//! Drives one search from binding to a classified answer:
//!
//! 1. bind a session to an egress endpoint
//! 2. fetch each tier's pages concurrently, matching products as pages land
//! 3. stop the instant a page matches or is denied, cancelling the rest of the tier
//! 4. retry pages that failed with an error, one at a time
//! 5. classify, then report session usage and origin health
//!
//! Pages are applied to the search state in completion order by a single
//! collecting loop. The first page to complete with a match wins even when a
//! lower-numbered page finishes later; results that arrive after the tier was
//! cancelled are dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::config::{SearchConfig, TierConfig};
use super::outcome_classifier::OutcomeClassifier;
use super::page_fetcher::{FetchContext, PageFetcher};
use super::types::{
    ApplyEffect, BatchSearchState, OutcomeKind, SearchDiagnostics, SearchOutcome, SearchResult,
};
use crate::config::{ConfigurationError, RankerConfig};
use crate::constants;
use crate::error::SearchError;
use crate::logging::{log_error, log_search_operation};
use crate::models::{PageFetchOutcome, PageStatus, TargetIdentity};
use crate::resilience::OriginCircuitBreaker;
use crate::services::{
    BindRequest, BoundResource, ProductExtractor, ProxyDirectory, SessionBinder, SessionStore,
    Transport,
};
use crate::state_machine::{SearchState, SearchStateMachine};

/// Everything one search needs beyond the orchestrator's defaults
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    pub target: TargetIdentity,
    pub max_page: Option<u32>,
    pub tier_config: Option<TierConfig>,
    pub timeout_budget: Option<Duration>,
    /// Binding constraints; the binder's configured defaults when unset
    pub bind: Option<BindRequest>,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>, target: TargetIdentity) -> Self {
        Self {
            keyword: keyword.into(),
            target,
            max_page: None,
            tier_config: None,
            timeout_budget: None,
            bind: None,
        }
    }

    pub fn with_max_page(mut self, max_page: u32) -> Self {
        self.max_page = Some(max_page);
        self
    }

    pub fn with_tiers(mut self, tiers: TierConfig) -> Self {
        self.tier_config = Some(tiers);
        self
    }

    pub fn with_timeout_budget(mut self, budget: Duration) -> Self {
        self.timeout_budget = Some(budget);
        self
    }

    pub fn with_bind_request(mut self, bind: BindRequest) -> Self {
        self.bind = Some(bind);
        self
    }
}

/// Whether the search keeps going after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct TieredSearchOrchestrator {
    binder: Arc<SessionBinder>,
    fetcher: Arc<PageFetcher>,
    store: Arc<dyn SessionStore>,
    config: SearchConfig,
}

impl TieredSearchOrchestrator {
    pub fn new(
        binder: Arc<SessionBinder>,
        fetcher: Arc<PageFetcher>,
        store: Arc<dyn SessionStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            binder,
            fetcher,
            store,
            config,
        }
    }

    /// Wire the binder, fetcher and orchestrator from one loaded configuration
    pub fn from_config(
        config: &RankerConfig,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn ProductExtractor>,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn ProxyDirectory>,
        breaker: Arc<OriginCircuitBreaker>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let fetcher = PageFetcher::new(transport, extractor, config.fetch.clone())?;
        let binder = SessionBinder::new(store.clone(), directory, breaker, config.binder.clone());

        Ok(Self::new(
            Arc::new(binder),
            Arc::new(fetcher),
            store,
            config.search.clone(),
        ))
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<OriginCircuitBreaker> {
        self.binder.breaker()
    }

    /// Find the rank of `target` for `keyword` within the first `max_page` pages
    pub async fn search(
        &self,
        keyword: &str,
        target: &TargetIdentity,
        max_page: u32,
        tier_config: Option<TierConfig>,
        timeout_budget: Option<Duration>,
    ) -> Result<SearchResult, SearchError> {
        let mut request = SearchRequest::new(keyword, target.clone()).with_max_page(max_page);
        request.tier_config = tier_config;
        request.timeout_budget = timeout_budget;
        self.execute(request).await
    }

    #[instrument(skip(self, request), fields(
        keyword = %request.keyword,
        product_id = %request.target.product_id
    ))]
    pub async fn execute(&self, request: SearchRequest) -> Result<SearchResult, SearchError> {
        let keyword = request.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(SearchError::InvalidInput("keyword is required".to_string()));
        }

        let max_page = request.max_page.unwrap_or(self.config.max_page);
        if max_page == 0 || max_page > constants::search::MAX_ALLOWED_PAGE {
            return Err(SearchError::InvalidInput(format!(
                "max_page must be between 1 and {}, got {max_page}",
                constants::search::MAX_ALLOWED_PAGE
            )));
        }

        let tier_config = request
            .tier_config
            .unwrap_or_else(|| self.config.tiers.clone());
        tier_config
            .validate()
            .map_err(|e| SearchError::InvalidInput(e.to_string()))?;
        let tiers = tier_config.pages_for(max_page);

        let budget = request
            .timeout_budget
            .unwrap_or_else(|| self.config.timeout_budget());

        let bind_request = request
            .bind
            .unwrap_or_else(|| BindRequest::from_config(self.binder.config()));
        let bound = self.binder.bind(&bind_request).await?;

        let started = Instant::now();
        let search_id = Uuid::new_v4();
        let deadline = deadline_after(budget);

        let search_ref = search_id.to_string();
        log_search_operation(
            "search_started",
            Some(search_ref.as_str()),
            Some(keyword.as_str()),
            Some(request.target.product_id.as_str()),
            "running",
            Some(format!("tiers={} max_page={max_page}", tiers.len()).as_str()),
        );

        let ctx = Arc::new(FetchContext {
            search_id,
            keyword,
            fingerprint: bound.session.fingerprint(),
            endpoint: bound.endpoint.clone(),
            cookie_jar: Arc::new(Mutex::new(bound.session.cookie_jar.clone())),
        });

        let mut machine = SearchStateMachine::new(search_id);
        let mut state = BatchSearchState::new();

        self.run_tiers(&tiers, &ctx, &request.target, &mut state, &mut machine, deadline)
            .await?;

        state.cookie_jar_snapshot = ctx.cookie_jar.lock().clone();
        let outcome = OutcomeClassifier::classify(&state);
        machine.transition(terminal_state(&outcome))?;

        self.settle(&bound, &outcome, &state).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = assemble_result(&outcome, &state, &bound, &machine, search_id, elapsed_ms);

        log_search_operation(
            "search_finished",
            Some(search_ref.as_str()),
            Some(ctx.keyword.as_str()),
            Some(request.target.product_id.as_str()),
            &result.outcome.to_string(),
            Some(
                format!(
                    "rank={:?} scanned={} bytes={} elapsed_ms={elapsed_ms}",
                    result.rank, result.total_products_scanned, result.bytes_transferred
                )
                .as_str(),
            ),
        );

        Ok(result)
    }

    async fn run_tiers(
        &self,
        tiers: &[Vec<u32>],
        ctx: &Arc<FetchContext>,
        target: &TargetIdentity,
        state: &mut BatchSearchState,
        machine: &mut SearchStateMachine,
        deadline: tokio::time::Instant,
    ) -> Result<(), SearchError> {
        for (index, pages) in tiers.iter().enumerate() {
            let tier = index as u32 + 1;
            machine.transition(SearchState::TierRunning(tier))?;
            info!(search_id = %ctx.search_id, tier, pages = ?pages, "🚀 Tier started");

            if self.run_tier(pages, ctx, target, state, deadline).await == Flow::Stop {
                return Ok(());
            }

            let retryable: Vec<u32> = pages
                .iter()
                .copied()
                .filter(|page| {
                    state
                        .resolved_pages
                        .get(page)
                        .is_some_and(|status| self.is_retryable(*status))
                })
                .collect();

            if !retryable.is_empty() && self.config.max_retries > 0 {
                machine.transition(SearchState::TierRetrying(tier))?;
                if self.retry_pages(retryable, ctx, target, state, deadline).await == Flow::Stop {
                    return Ok(());
                }
            }

            // Decided on the page's final status, which may come from a retry
            let first_page_empty = pages
                .first()
                .and_then(|page| state.resolved_pages.get(page))
                == Some(&PageStatus::NoResults);
            if tier == 1 && first_page_empty {
                info!(search_id = %ctx.search_id, "Source reported no results");
                state.no_results = true;
                return Ok(());
            }

            if tier > 1 && self.config.stop_on_empty_tier && Self::tier_is_past_end(pages, state) {
                info!(search_id = %ctx.search_id, tier, "Reached end of results");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Fetch every page of one tier concurrently
    async fn run_tier(
        &self,
        pages: &[u32],
        ctx: &Arc<FetchContext>,
        target: &TargetIdentity,
        state: &mut BatchSearchState,
        deadline: tokio::time::Instant,
    ) -> Flow {
        let token = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let mut tasks = JoinSet::new();

        for &page in pages {
            let fetcher = Arc::clone(&self.fetcher);
            let ctx = Arc::clone(ctx);
            let token = token.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => None,
                    outcome = async {
                        let _permit = semaphore.acquire_owned().await.ok()?;
                        Some(fetcher.fetch_page(&ctx, page).await)
                    } => outcome,
                }
            });
        }

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let flow = loop {
            tokio::select! {
                _ = &mut sleep => {
                    warn!(search_id = %ctx.search_id, "⏰ Search budget exhausted mid-tier");
                    state.mark_timed_out();
                    break Flow::Stop;
                }
                joined = tasks.join_next() => match joined {
                    None => break Flow::Continue,
                    Some(Ok(Some(outcome))) => {
                        if self.absorb(outcome, ctx, target, state) == Flow::Stop {
                            break Flow::Stop;
                        }
                    }
                    Some(Ok(None)) => {}
                    Some(Err(e)) => {
                        log_error("tiered_search", "fetch_page", &e.to_string(), None);
                    }
                },
            }
        };

        token.cancel();
        tasks.abort_all();

        if flow == Flow::Continue {
            // A fetch task that died leaves its page unresolved
            for &page in pages {
                if !state.resolved_pages.contains_key(&page) {
                    let lost = PageFetchOutcome::new(page, PageStatus::NetworkError)
                        .with_detail("fetch task failed");
                    state.apply(lost, target, self.config.include_sponsored);
                }
            }
        }

        flow
    }

    /// Retry failed pages one at a time, up to `max_retries` rounds
    async fn retry_pages(
        &self,
        mut pending: Vec<u32>,
        ctx: &Arc<FetchContext>,
        target: &TargetIdentity,
        state: &mut BatchSearchState,
        deadline: tokio::time::Instant,
    ) -> Flow {
        for round in 1..=self.config.max_retries {
            let mut still_failing = Vec::new();

            for page in pending {
                if tokio::time::Instant::now() >= deadline {
                    warn!(search_id = %ctx.search_id, page, "⏰ Search budget exhausted during retries");
                    state.mark_timed_out();
                    return Flow::Stop;
                }

                debug!(search_id = %ctx.search_id, page, round, "🔄 Retrying page");
                let fetched =
                    tokio::time::timeout_at(deadline, self.fetcher.fetch_page(ctx, page)).await;
                let Ok(mut outcome) = fetched else {
                    warn!(search_id = %ctx.search_id, page, "⏰ Search budget exhausted during retries");
                    state.mark_timed_out();
                    return Flow::Stop;
                };

                outcome.retries_used = round;
                let status = outcome.status;
                if self.absorb(outcome, ctx, target, state) == Flow::Stop {
                    return Flow::Stop;
                }
                if self.is_retryable(status) {
                    still_failing.push(page);
                }
            }

            if still_failing.is_empty() {
                break;
            }
            pending = still_failing;
        }
        Flow::Continue
    }

    /// Merge cookies and fold one page outcome into the state
    fn absorb(
        &self,
        outcome: PageFetchOutcome,
        ctx: &FetchContext,
        target: &TargetIdentity,
        state: &mut BatchSearchState,
    ) -> Flow {
        ctx.cookie_jar.lock().merge(&outcome.set_cookies);

        let page = outcome.page;
        match state.apply(outcome, target, self.config.include_sponsored) {
            ApplyEffect::Matched => {
                info!(
                    search_id = %ctx.search_id,
                    page,
                    match_level = ?state.match_level,
                    "🎯 Target matched"
                );
                Flow::Stop
            }
            ApplyEffect::Denied => {
                warn!(
                    search_id = %ctx.search_id,
                    page,
                    reason = state.block_reason.as_deref().unwrap_or_default(),
                    "🚫 Access denied"
                );
                Flow::Stop
            }
            ApplyEffect::Continue => Flow::Continue,
        }
    }

    fn is_retryable(&self, status: PageStatus) -> bool {
        match status {
            PageStatus::NetworkError => true,
            PageStatus::HttpError => self.config.retry_http_errors,
            _ => false,
        }
    }

    /// Every page resolved and none had products
    fn tier_is_past_end(pages: &[u32], state: &BatchSearchState) -> bool {
        let all_resolved = pages.iter().all(|page| {
            state
                .resolved_pages
                .get(page)
                .is_some_and(|status| status.is_resolved())
        });
        let products: usize = pages
            .iter()
            .filter_map(|page| state.page_products.get(page))
            .sum();
        all_resolved && products == 0
    }

    /// Report session usage once, return the cookie jar and feed the breaker
    async fn settle(&self, bound: &BoundResource, outcome: &SearchOutcome, state: &BatchSearchState) {
        let session_id = bound.session.id;
        let kind = outcome.kind();

        if let Err(e) = self
            .store
            .record_usage(session_id, kind != OutcomeKind::Blocked)
            .await
        {
            log_error(
                "session_store",
                "record_usage",
                &e.to_string(),
                Some(format!("session_id={session_id}").as_str()),
            );
        }

        if let Err(e) = self
            .store
            .merge_cookies(session_id, &state.cookie_jar_snapshot.to_vec())
            .await
        {
            log_error(
                "session_store",
                "merge_cookies",
                &e.to_string(),
                Some(format!("session_id={session_id}").as_str()),
            );
        }

        let ip = &bound.endpoint.current_external_ip;
        match kind {
            OutcomeKind::Blocked | OutcomeKind::Incomplete => {
                let record = self.breaker().record_failure(ip);
                if record.ip_blocked || record.subnet_blocked {
                    warn!(
                        ip = %ip,
                        ip_blocked = record.ip_blocked,
                        subnet_blocked = record.subnet_blocked,
                        "Origin taken out of rotation"
                    );
                }
            }
            _ => self.breaker().record_success(ip),
        }
    }
}

/// Budgets too large to represent run until the far-future horizon
fn deadline_after(budget: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(constants::search::FAR_FUTURE))
        .unwrap_or(now)
}

fn terminal_state(outcome: &SearchOutcome) -> SearchState {
    match outcome.kind() {
        OutcomeKind::Found => SearchState::Found,
        OutcomeKind::NotFound => SearchState::NotFound,
        OutcomeKind::Blocked => SearchState::Blocked,
        OutcomeKind::Incomplete => SearchState::Incomplete,
        OutcomeKind::NoResults => SearchState::NoResults,
    }
}

fn assemble_result(
    outcome: &SearchOutcome,
    state: &BatchSearchState,
    bound: &BoundResource,
    machine: &SearchStateMachine,
    search_id: Uuid,
    elapsed_ms: u64,
) -> SearchResult {
    let (rank, page, match_level) = match outcome {
        SearchOutcome::Found {
            match_level,
            rank,
            page,
        } => (Some(*rank), Some(*page), Some(*match_level)),
        _ => (None, None, None),
    };
    let block_reason = match outcome {
        SearchOutcome::Blocked { reason } => Some(reason.clone()),
        _ => None,
    };
    let unresolved_pages = match outcome {
        SearchOutcome::Incomplete { unresolved_pages } => unresolved_pages.clone(),
        _ => Vec::new(),
    };

    SearchResult {
        outcome: outcome.kind(),
        rank,
        page,
        match_level,
        found_product: rank.and(state.found.clone()),
        total_products_scanned: OutcomeClassifier::total_ranked(state),
        pages_resolved: state.pages_resolved(),
        block_detail: block_reason.as_ref().and(state.block_detail.clone()),
        block_reason,
        unresolved_pages,
        bytes_transferred: state.cumulative_bytes,
        diagnostics: SearchDiagnostics {
            search_id,
            session_id: bound.session.id,
            match_type: bound.match_type,
            endpoint_ip: bound.endpoint.current_external_ip.clone(),
            endpoint_address: bound.endpoint.address.clone(),
            pages_searched: state.resolved_pages.len(),
            page_counts: state.page_counts(),
            state_path: machine.history().iter().map(ToString::to_string).collect(),
            elapsed_ms,
        },
    }
}
