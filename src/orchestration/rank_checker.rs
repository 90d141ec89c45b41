//! # Rank Checker
//!
//! Request/response facade for work-allocation callers. Validates the
//! request, runs one search and wraps the answer in a serializable envelope
//! `{success, data, meta, error}`. Search failures and non-answers (blocked,
//! incomplete) come back as coded errors rather than `Err`.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::tiered_search::{SearchRequest, TieredSearchOrchestrator};
use super::types::{OutcomeKind, SearchResult};
use crate::constants::{error_codes, search};
use crate::error::SearchError;
use crate::logging::log_error;
use crate::matching::MatchLevel;
use crate::models::TargetIdentity;

fn default_max_page() -> u32 {
    search::DEFAULT_MAX_PAGE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankCheckRequest {
    pub keyword: String,
    pub product_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub vendor_item_id: Option<String>,
    #[serde(default = "default_max_page")]
    pub max_page: u32,
}

impl RankCheckRequest {
    pub fn new(keyword: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            product_id: product_id.into(),
            item_id: None,
            vendor_item_id: None,
            max_page: default_max_page(),
        }
    }

    fn target(&self) -> Result<TargetIdentity, SearchError> {
        let mut target = TargetIdentity::new(self.product_id.as_str())?;
        if let Some(item_id) = &self.item_id {
            target = target.with_item_id(item_id.as_str());
        }
        if let Some(vendor_item_id) = &self.vendor_item_id {
            target = target.with_vendor_item_id(vendor_item_id.as_str());
        }
        Ok(target)
    }

    fn validate(&self) -> Result<TargetIdentity, SearchError> {
        if self.keyword.trim().is_empty() {
            return Err(SearchError::InvalidInput("keyword is required".to_string()));
        }
        if self.max_page == 0 || self.max_page > search::MAX_ALLOWED_PAGE {
            return Err(SearchError::InvalidInput(format!(
                "max_page must be between 1 and {}",
                search::MAX_ALLOWED_PAGE
            )));
        }
        self.target()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankData {
    pub keyword: String,
    pub product_id: String,
    pub item_id: Option<String>,
    pub vendor_item_id: Option<String>,
    pub outcome: OutcomeKind,
    pub found: bool,
    pub rank: Option<u32>,
    pub page: Option<u32>,
    pub id_match_type: Option<MatchLevel>,
    pub total_products: usize,
    pub checked_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub search_id: Option<String>,
    pub pages_searched: usize,
    pub page_counts: BTreeMap<String, String>,
    pub elapsed_ms: u64,
    pub bytes_transferred: u64,
    pub session_id: Option<i64>,
    pub match_type: Option<String>,
    pub proxy_ip: Option<String>,
    pub proxy_host: Option<String>,
    pub state_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorInfo {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankCheckResponse {
    pub success: bool,
    pub data: Option<RankData>,
    pub meta: Option<ResponseMeta>,
    pub error: Option<ErrorInfo>,
}

impl RankCheckResponse {
    fn failure(error: ErrorInfo, meta: Option<ResponseMeta>) -> Self {
        Self {
            success: false,
            data: None,
            meta,
            error: Some(error),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

pub struct RankChecker {
    orchestrator: Arc<TieredSearchOrchestrator>,
}

impl RankChecker {
    pub fn new(orchestrator: Arc<TieredSearchOrchestrator>) -> Self {
        Self { orchestrator }
    }

    #[instrument(skip(self, request), fields(keyword = %request.keyword, product_id = %request.product_id))]
    pub async fn check(&self, request: RankCheckRequest) -> RankCheckResponse {
        let started = Instant::now();

        let target = match request.validate() {
            Ok(target) => target,
            Err(e) => {
                return RankCheckResponse::failure(
                    ErrorInfo::new(error_codes::INVALID_INPUT, e.to_string()),
                    None,
                )
            }
        };

        let search_request =
            SearchRequest::new(request.keyword.trim(), target).with_max_page(request.max_page);

        match self.orchestrator.execute(search_request).await {
            Ok(result) => Self::respond(&request, result),
            Err(e) => {
                let meta = ResponseMeta {
                    elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    ..ResponseMeta::default()
                };
                let code = match &e {
                    SearchError::InvalidInput(_) => error_codes::INVALID_INPUT,
                    SearchError::ResourceExhausted(_) => error_codes::NO_SESSION,
                    SearchError::Collaborator(_) | SearchError::InvalidState(_) => {
                        log_error("rank_checker", "check", &e.to_string(), None);
                        error_codes::INTERNAL_ERROR
                    }
                };
                RankCheckResponse::failure(ErrorInfo::new(code, e.to_string()), Some(meta))
            }
        }
    }

    /// Check several requests, at most `concurrency` searches in flight.
    /// Responses come back in request order.
    pub async fn check_all(
        &self,
        requests: Vec<RankCheckRequest>,
        concurrency: usize,
    ) -> Vec<RankCheckResponse> {
        stream::iter(requests)
            .map(|request| self.check(request))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    fn respond(request: &RankCheckRequest, result: SearchResult) -> RankCheckResponse {
        let diagnostics = &result.diagnostics;
        let meta = ResponseMeta {
            search_id: Some(diagnostics.search_id.to_string()),
            pages_searched: diagnostics.pages_searched,
            page_counts: diagnostics.page_counts.clone(),
            elapsed_ms: diagnostics.elapsed_ms,
            bytes_transferred: result.bytes_transferred,
            session_id: Some(diagnostics.session_id),
            match_type: Some(diagnostics.match_type.to_string()),
            proxy_ip: Some(diagnostics.endpoint_ip.clone()),
            proxy_host: Some(diagnostics.endpoint_address.clone()),
            state_path: diagnostics.state_path.clone(),
        };

        match result.outcome {
            OutcomeKind::Blocked => {
                let reason = result.block_reason.clone().unwrap_or_default();
                RankCheckResponse::failure(
                    ErrorInfo::new(error_codes::BLOCKED, format!("search blocked: {reason}"))
                        .with_detail(result.block_detail.clone()),
                    Some(meta),
                )
            }
            OutcomeKind::Incomplete => RankCheckResponse::failure(
                ErrorInfo::new(
                    error_codes::INCOMPLETE,
                    format!("unresolved pages: {:?}", result.unresolved_pages),
                ),
                Some(meta),
            ),
            OutcomeKind::Found | OutcomeKind::NotFound | OutcomeKind::NoResults => {
                RankCheckResponse {
                    success: true,
                    data: Some(RankData {
                        keyword: request.keyword.trim().to_string(),
                        product_id: request.product_id.trim().to_string(),
                        item_id: request.item_id.clone(),
                        vendor_item_id: request.vendor_item_id.clone(),
                        outcome: result.outcome,
                        found: result.is_found(),
                        rank: result.rank,
                        page: result.page,
                        id_match_type: result.match_level,
                        total_products: result.total_products_scanned,
                        checked_at: Utc::now().to_rfc3339(),
                    }),
                    meta: Some(meta),
                    error: None,
                }
            }
        }
    }
}
