//! Turn-level coordination of the dialogue engine.
//!
//! One call per customer message: load the session, resolve references,
//! classify, then either answer from evidence or advance the order flow.
//! The user message and the final reply are appended to history exactly
//! once per turn, on every degraded path included, and the session is
//! saved with a bounded optimistic retry. Backend trouble inside the turn
//! degrades to fallback replies; only the session store propagates errors.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use hawker_core::config::HawkerConfig;
use hawker_core::types::{IntentLabel, Message, OrderState};
use hawker_intent::IntentClassifier;
use hawker_llm::LlmClient;
use hawker_order::{OrderEvidence, OrderFlowHandler, OrderOutcome, ShopInfo};
use hawker_search::aggregator::strip_id_lines;
use hawker_search::{DynEmbeddingService, ProductIndex, SearchAggregator, WebSearchProvider};
use hawker_session::{SessionError, SessionRecord, SessionStore};

use crate::consultation::{ConsultationHandler, NO_INFORMATION};
use crate::context::ContextResolver;
use crate::error::ChatError;
use crate::types::{EngineResponse, EngineStats, OrderSnapshot, SourceAttribution};
use crate::validator::{ResponseValidator, Verdict, NO_MATCHING_PRODUCT};

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// One event of a streamed turn.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// A piece of reply text, in order.
    Chunk(String),
    /// Sent once after the turn is persisted. Absent when persisting
    /// failed; the consumer should treat a stream without it as broken.
    Done(EngineResponse),
}

/// Everything one turn produced besides the envelope bookkeeping.
struct TurnOutput {
    text: String,
    sources: Vec<SourceAttribution>,
    order: Option<OrderState>,
    degraded: bool,
    used_web: bool,
    rejections: u32,
}

// =============================================================================
// DialogueOrchestrator
// =============================================================================

/// Coordinates one conversation turn across all subsystems.
pub struct DialogueOrchestrator {
    store: Arc<dyn SessionStore>,
    resolver: ContextResolver,
    classifier: IntentClassifier,
    consultation: ConsultationHandler,
    validator: ResponseValidator,
    order_flow: OrderFlowHandler,
    index: ProductIndex,
    history_cap: usize,
    save_retries: u32,
    stats: Mutex<EngineStats>,
}

impl DialogueOrchestrator {
    /// Build the engine from its backends and the full configuration. The
    /// per-turn collaborators are assembled here; callers only supply what
    /// touches the outside world.
    pub fn new(
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmClient>,
        embedding: Arc<dyn DynEmbeddingService>,
        web: Option<Arc<dyn WebSearchProvider>>,
        index: ProductIndex,
        config: &HawkerConfig,
    ) -> Self {
        let aggregator = SearchAggregator::new(
            embedding,
            index.clone(),
            web,
            &config.search,
            &config.web_search,
        );
        Self {
            store,
            resolver: ContextResolver::new(&config.intent),
            classifier: IntentClassifier::new(llm.clone(), &config.intent, &config.llm),
            consultation: ConsultationHandler::new(aggregator, llm, &config.search, &config.llm),
            validator: ResponseValidator::new(),
            order_flow: OrderFlowHandler::new(
                ShopInfo::from_general(&config.general),
                &config.order,
            ),
            index,
            history_cap: config.session.history_cap,
            save_retries: config.session.save_retries,
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Handle one customer message and return the full reply envelope.
    pub async fn handle(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<EngineResponse, ChatError> {
        let message = validate_message(message)?;
        let mut record = self.load_or_create(conversation_id)?;

        let resolved = self.resolver.resolve(message, record.history.messages());
        if resolved.rewritten {
            debug!(referent = ?resolved.referent, "reference resolved");
        }
        let intent = self
            .classifier
            .classify(&resolved.text, record.history.messages())
            .await;
        let llm_fallback = intent.rationale.starts_with("model_unavailable");

        let active_order = record.order.as_ref().is_some_and(|s| !s.is_terminal());
        let turn = if active_order || intent.label == IntentLabel::Order {
            let outcome = self.advance_order(record.order.take(), &resolved.text);
            TurnOutput {
                text: outcome.reply,
                sources: Vec::new(),
                order: Some(outcome.state),
                degraded: false,
                used_web: false,
                rejections: 0,
            }
        } else {
            self.consultation_turn(&resolved.text, record.order.take())
                .await
        };

        let user = Message::user(message);
        let reply = Message::assistant(turn.text.clone());
        let snapshot = turn.order.as_ref().map(OrderSnapshot::from);
        self.save_turn(record, &user, &reply, &turn.order)?;
        self.record_turn(intent.label, llm_fallback, turn.rejections, turn.used_web);

        info!(
            conversation_id,
            intent = intent.label.as_str(),
            confidence = intent.confidence,
            "turn completed"
        );
        Ok(EngineResponse {
            text: turn.text,
            intent: intent.label,
            confidence: intent.confidence,
            sources: turn.sources,
            order: snapshot,
            degraded: turn.degraded || llm_fallback,
        })
    }

    /// Streamed variant of [`handle`](Self::handle).
    ///
    /// Consultation answers arrive token by token; order replies as one
    /// chunk. History is appended only after the whole reply streamed, so
    /// a cancelled stream persists nothing, and the grounding check does
    /// not run on streamed answers.
    pub async fn handle_stream(
        self: Arc<Self>,
        conversation_id: &str,
        message: &str,
    ) -> Result<ReceiverStream<StreamEvent>, ChatError> {
        let message = validate_message(message)?.to_string();
        let record = self.load_or_create(conversation_id)?;

        // One chunk in flight; a dropped receiver fails the next send.
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            self.stream_turn(record, message, tx).await;
        });
        Ok(ReceiverStream::new(rx))
    }

    /// Snapshot of the running counters.
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Conversation history as stored, oldest first.
    pub fn history(&self, conversation_id: &str) -> Result<Vec<Message>, ChatError> {
        let record = self.store.load(conversation_id)?;
        Ok(record.map(|r| r.history.messages().to_vec()).unwrap_or_default())
    }

    /// Drop a conversation and any order attached to it.
    pub fn forget(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.store.delete(conversation_id)?;
        Ok(())
    }

    // ===== Turn internals =====

    async fn stream_turn(
        &self,
        mut record: SessionRecord,
        message: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let resolved = self.resolver.resolve(&message, record.history.messages());
        let intent = self
            .classifier
            .classify(&resolved.text, record.history.messages())
            .await;
        let llm_fallback = intent.rationale.starts_with("model_unavailable");
        let active_order = record.order.as_ref().is_some_and(|s| !s.is_terminal());

        let turn = if active_order || intent.label == IntentLabel::Order {
            let outcome = self.advance_order(record.order.take(), &resolved.text);
            if tx
                .send(StreamEvent::Chunk(outcome.reply.clone()))
                .await
                .is_err()
            {
                debug!("stream cancelled before the order reply");
                return;
            }
            TurnOutput {
                text: outcome.reply,
                sources: Vec::new(),
                order: Some(outcome.state),
                degraded: false,
                used_web: false,
                rejections: 0,
            }
        } else {
            let mut result = self.consultation.answer_stream(&resolved.text).await;
            let mut llm_failed = result.llm_failed;
            let mut text = String::new();
            loop {
                match result.stream.next().await {
                    Some(Ok(chunk)) => {
                        if tx.send(StreamEvent::Chunk(chunk.clone())).await.is_err() {
                            debug!("stream cancelled mid-answer, turn discarded");
                            return;
                        }
                        text.push_str(&chunk);
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "consultation stream broke mid-answer");
                        llm_failed = true;
                        if text.trim().is_empty() {
                            if tx
                                .send(StreamEvent::Chunk(NO_INFORMATION.to_string()))
                                .await
                                .is_err()
                            {
                                return;
                            }
                            text = NO_INFORMATION.to_string();
                        }
                        break;
                    }
                    None => break,
                }
            }
            TurnOutput {
                text: strip_id_lines(text.trim()),
                sources: SourceAttribution::from_results(&result.pool.results),
                order: record.order.take(),
                degraded: result.pool.degraded || llm_failed,
                used_web: result.pool.used_web,
                rejections: 0,
            }
        };

        let user = Message::user(&message);
        let reply = Message::assistant(turn.text.clone());
        let snapshot = turn.order.as_ref().map(OrderSnapshot::from);
        if let Err(err) = self.save_turn(record, &user, &reply, &turn.order) {
            error!(error = %err, "failed to persist streamed turn");
            return;
        }
        self.record_turn(intent.label, llm_fallback, turn.rejections, turn.used_web);

        let _ = tx
            .send(StreamEvent::Done(EngineResponse {
                text: turn.text,
                intent: intent.label,
                confidence: intent.confidence,
                sources: turn.sources,
                order: snapshot,
                degraded: turn.degraded || llm_fallback,
            }))
            .await;
    }

    /// Evidence-grounded answer with the one-retry grounding check.
    async fn consultation_turn(
        &self,
        resolved: &str,
        stored_order: Option<OrderState>,
    ) -> TurnOutput {
        let outcome = self.consultation.answer(resolved).await;
        let mut rejections = 0;

        let text = match self.validator.validate(&outcome.text, &outcome.pool) {
            Verdict::Accepted => outcome.text,
            Verdict::Rejected { unmatched } => {
                rejections += 1;
                warn!(?unmatched, "answer failed the grounding check, regenerating");
                let retry = self
                    .consultation
                    .regenerate(resolved, &outcome.pool, &unmatched)
                    .await;
                match retry {
                    Some(retry) => match self.validator.validate(&retry, &outcome.pool) {
                        Verdict::Accepted => retry,
                        Verdict::Rejected { unmatched } => {
                            rejections += 1;
                            warn!(?unmatched, "regenerated answer failed the grounding check");
                            NO_MATCHING_PRODUCT.to_string()
                        }
                    },
                    None => NO_MATCHING_PRODUCT.to_string(),
                }
            }
        };

        TurnOutput {
            text,
            sources: SourceAttribution::from_results(&outcome.pool.results),
            order: stored_order,
            degraded: outcome.pool.degraded || outcome.llm_failed,
            used_web: outcome.pool.used_web,
            rejections,
        }
    }

    fn advance_order(&self, prior: Option<OrderState>, resolved: &str) -> OrderOutcome {
        let evidence = OrderEvidence::extract(resolved);
        let state = select_order_state(prior, &evidence);
        self.order_flow.advance(state, &evidence, &self.index)
    }

    // ===== Session plumbing =====

    fn load_or_create(&self, conversation_id: &str) -> Result<SessionRecord, ChatError> {
        let record = self.store.load(conversation_id)?;
        Ok(record.unwrap_or_else(|| SessionRecord::new(conversation_id, self.history_cap)))
    }

    /// Append the turn to history and save, reloading and reapplying on a
    /// version conflict up to `save_retries` times.
    fn save_turn(
        &self,
        mut record: SessionRecord,
        user: &Message,
        reply: &Message,
        order: &Option<OrderState>,
    ) -> Result<(), ChatError> {
        let conversation_id = record.conversation_id.clone();
        let mut attempts = 0;
        loop {
            record.history.push(user.clone());
            record.history.push(reply.clone());
            record.order = order.clone();
            match self.store.save(&record) {
                Ok(_) => return Ok(()),
                Err(SessionError::VersionConflict(held, stored))
                    if attempts < self.save_retries =>
                {
                    attempts += 1;
                    warn!(
                        conversation_id = %conversation_id,
                        held, stored, attempts, "session save conflicted, reloading"
                    );
                    record = self
                        .store
                        .load(&conversation_id)?
                        .unwrap_or_else(|| {
                            SessionRecord::new(&conversation_id, self.history_cap)
                        });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn record_turn(&self, label: IntentLabel, llm_fallback: bool, rejections: u32, used_web: bool) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.messages += 1;
            match label {
                IntentLabel::Consultation => stats.consultation_turns += 1,
                IntentLabel::Order => stats.order_turns += 1,
            }
            if llm_fallback {
                stats.llm_fallbacks += 1;
            }
            stats.validator_rejections += u64::from(rejections);
            if used_web {
                stats.web_searches += 1;
            }
        }
    }
}

/// An active order always continues. A terminal order is kept for polite
/// repeats until the customer names a product again, which starts a fresh
/// order.
fn select_order_state(prior: Option<OrderState>, evidence: &OrderEvidence) -> OrderState {
    match prior {
        Some(state) if !state.is_terminal() => state,
        Some(state) if evidence.product.is_none() => state,
        _ => OrderState::new(),
    }
}

fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
    }
    Ok(trimmed)
}

// =============================================================================
// Tests
// =============================================================================
