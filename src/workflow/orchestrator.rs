//! Session coordinator for the companion.
//!
//! Owns the session state, the query services, the preference store and the
//! monitoring task. Every request runs in three phases: `begin_*` validates
//! input and issues a ticket, the request's `execute` talks to the service
//! (and may run on another thread), and `complete_*` applies the outcome
//! only if the ticket is still the latest of its kind.
//!
//! No error leaves an operation without also being recorded as the
//! session's inline message.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::steps::{transition, Action, Step};
use super::tickets::{RequestTicket, RequestTracker};
use super::{CompanionError, WorkflowError};
use crate::config::CHAT_CONTEXT_TURNS;
use crate::db::{preferences, PersistenceStore};
use crate::models::{
    AidRecord, AlertNotification, BoundaryState, ChatMessage, Coordinate, EnrichedHit,
    GroundedResponse, HistoryEntry, RequestKind, Theme, VitalsReading,
};
use crate::monitoring::{
    start_monitoring, AlertSink, MonitorConfig, MonitorEvent, MonitorHandle, MonitoringError,
    PositionSource,
};
use crate::pipeline::{
    aid_response_schema, prompt, validate_aid_payload, EntityReconciler, GroundedSearchService,
    NarrativeQueryService, PromptContext, ServiceError, StructuredQueryService,
};

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// The three query services, cheap to clone onto a worker thread.
#[derive(Clone)]
pub struct QueryServices {
    pub narrative: Arc<dyn NarrativeQueryService>,
    pub grounded: Arc<dyn GroundedSearchService>,
    pub structured: Arc<dyn StructuredQueryService>,
}

impl QueryServices {
    /// One backend serving all three roles.
    pub fn shared<S>(service: Arc<S>) -> Self
    where
        S: NarrativeQueryService + GroundedSearchService + StructuredQueryService + 'static,
    {
        Self {
            narrative: service.clone(),
            grounded: service.clone(),
            structured: service,
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// What the monitoring screen shows, rebuilt from `MonitorEvent`s.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorSnapshot {
    pub running: bool,
    pub latest_vitals: Option<VitalsReading>,
    pub home: Option<Coordinate>,
    pub last_position: Option<Coordinate>,
    pub boundary: Option<BoundaryState>,
    pub distance_km: Option<f64>,
    pub alerts: Vec<AlertNotification>,
    pub last_error: Option<String>,
}

impl MonitorSnapshot {
    fn apply(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Position(update) => {
                self.home = Some(update.home);
                self.last_position = Some(update.position);
                self.boundary = Some(update.state);
                self.distance_km = Some(update.distance_km);
                self.last_error = None;
            }
            MonitorEvent::PositionError { message } => self.last_error = Some(message.clone()),
            MonitorEvent::Vitals(reading) => self.latest_vitals = Some(*reading),
            MonitorEvent::Alert(alert) => self.alerts.push(alert.clone()),
            MonitorEvent::Stopped => self.stop(),
        }
    }

    /// Home, fix and vitals belong to one monitoring session. Alerts stay.
    fn stop(&mut self) {
        self.running = false;
        self.home = None;
        self.last_position = None;
        self.boundary = None;
        self.distance_km = None;
        self.latest_vitals = None;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub step: Step,
    pub inline_error: Option<String>,
    pub symptoms: String,
    pub analysis: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub hospital_narrative: String,
    pub hospitals: Vec<EnrichedHit>,
    pub aid_query: String,
    pub aid_records: Vec<AidRecord>,
    pub aid_warnings: Vec<String>,
    pub chat: Vec<ChatMessage>,
    pub monitor: MonitorSnapshot,
    pub theme: Theme,
    pub emergency_contact: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            step: Step::Entry,
            inline_error: None,
            symptoms: String::new(),
            analysis: None,
            history: Vec::new(),
            hospital_narrative: String::new(),
            hospitals: Vec::new(),
            aid_query: String::new(),
            aid_records: Vec::new(),
            aid_warnings: Vec::new(),
            chat: Vec::new(),
            monitor: MonitorSnapshot::default(),
            theme: Theme::default(),
            emergency_contact: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Whether a completion was applied or arrived after a newer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticket: RequestTicket,
    pub symptoms: String,
    pub context: PromptContext,
}

impl AnalysisRequest {
    pub fn execute(&self, services: &QueryServices) -> Result<String, ServiceError> {
        services.narrative.ask(&self.context)
    }
}

#[derive(Debug, Clone)]
pub struct HospitalSearchRequest {
    pub ticket: RequestTicket,
    pub location: Coordinate,
    pub context: PromptContext,
}

impl HospitalSearchRequest {
    pub fn execute(&self, services: &QueryServices) -> Result<GroundedResponse, ServiceError> {
        services.grounded.search(&self.context, self.location)
    }
}

#[derive(Debug, Clone)]
pub struct AidQueryRequest {
    pub ticket: RequestTicket,
    pub query: String,
    pub context: PromptContext,
    pub schema: Value,
}

impl AidQueryRequest {
    pub fn execute(&self, services: &QueryServices) -> Result<Value, ServiceError> {
        services.structured.ask_structured(&self.context, &self.schema)
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub ticket: RequestTicket,
    pub context: PromptContext,
}

impl ChatRequest {
    pub fn execute(&self, services: &QueryServices) -> Result<String, ServiceError> {
        services.narrative.ask(&self.context)
    }
}

fn request_kind_for(step: Step) -> Option<RequestKind> {
    match step {
        Step::Analyzing => Some(RequestKind::Analysis),
        Step::HospitalSearch => Some(RequestKind::HospitalSearch),
        Step::FinancialAidQuery => Some(RequestKind::FinancialAid),
        Step::Chat => Some(RequestKind::Chat),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    session: SessionState,
    tracker: RequestTracker,
    services: QueryServices,
    store: Arc<dyn PersistenceStore>,
    positions: Arc<dyn PositionSource>,
    alert_sink: Arc<dyn AlertSink>,
    reconciler: EntityReconciler,
    monitor_config: MonitorConfig,
    monitor: Option<MonitorHandle>,
}

impl Orchestrator {
    /// Create a session, restoring theme, emergency contact and history.
    pub fn new(
        services: QueryServices,
        store: Arc<dyn PersistenceStore>,
        positions: Arc<dyn PositionSource>,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Result<Self, CompanionError> {
        let session = SessionState {
            theme: preferences::load_theme(store.as_ref())?,
            emergency_contact: preferences::load_emergency_contact(store.as_ref())?
                .unwrap_or_default(),
            history: preferences::load_history(store.as_ref())?,
            ..SessionState::default()
        };

        tracing::info!(
            theme = %session.theme,
            history = session.history.len(),
            has_contact = !session.emergency_contact.is_empty(),
            "Session restored"
        );

        Ok(Self {
            session,
            tracker: RequestTracker::new(),
            services,
            store,
            positions,
            alert_sink,
            reconciler: EntityReconciler::default(),
            monitor_config: MonitorConfig::default(),
            monitor: None,
        })
    }

    pub fn with_reconciler(mut self, reconciler: EntityReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Settings for future monitoring sessions. The contact comes from the
    /// session, not from `config`.
    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn step(&self) -> Step {
        self.session.step
    }

    pub fn services(&self) -> &QueryServices {
        &self.services
    }

    // -- Navigation ---------------------------------------------------------

    /// Apply a user action. Leaving a screen makes its pending request stale.
    pub fn apply(&mut self, action: Action) -> Result<Step, CompanionError> {
        let from = self.session.step;
        let to = match transition(from, action) {
            Ok(to) => to,
            Err(e) => return Err(self.fail(e.into())),
        };

        if to != from {
            if let Some(kind) = request_kind_for(from) {
                self.tracker.invalidate(kind);
            }
        }
        if action == Action::StartOver {
            self.clear_results();
        }

        self.session.step = to;
        self.session.inline_error = None;
        tracing::info!(from = %from, to = %to, action = %action, "Workflow transition");
        Ok(to)
    }

    fn clear_results(&mut self) {
        self.session.symptoms.clear();
        self.session.analysis = None;
        self.session.hospital_narrative.clear();
        self.session.hospitals.clear();
        self.session.aid_query.clear();
        self.session.aid_records.clear();
        self.session.aid_warnings.clear();
    }

    fn require_step(&mut self, expected: Step) -> Result<(), CompanionError> {
        if self.session.step == expected {
            return Ok(());
        }
        let err = WorkflowError::WrongStep {
            expected: expected.to_string(),
            actual: self.session.step.to_string(),
        };
        Err(self.fail(err.into()))
    }

    /// Record `err` as the inline message and hand it back.
    fn fail(&mut self, err: CompanionError) -> CompanionError {
        tracing::warn!(step = %self.session.step, error = %err, "Operation failed");
        self.session.inline_error = Some(err.user_message());
        err
    }

    fn is_current(&self, ticket: &RequestTicket) -> bool {
        let current = self.tracker.is_current(ticket);
        if !current {
            tracing::debug!(kind = %ticket.kind, seq = ticket.seq, "Ignoring stale completion");
        }
        current
    }

    // -- Symptom analysis ---------------------------------------------------

    pub fn begin_analysis(&mut self, symptoms: &str) -> Result<AnalysisRequest, CompanionError> {
        let symptoms = symptoms.trim();
        if symptoms.is_empty() {
            return Err(self.fail(CompanionError::InputValidation(
                "Please describe your symptoms.".into(),
            )));
        }
        self.require_step(Step::SymptomInput)?;
        self.apply(Action::Submit)?;

        self.session.symptoms = symptoms.to_string();
        self.session.analysis = None;
        Ok(AnalysisRequest {
            ticket: self.tracker.issue(RequestKind::Analysis),
            symptoms: symptoms.to_string(),
            context: prompt::symptom_analysis(symptoms),
        })
    }

    pub fn complete_analysis(
        &mut self,
        request: AnalysisRequest,
        outcome: Result<String, ServiceError>,
    ) -> Result<Completion, CompanionError> {
        if !self.is_current(&request.ticket) {
            return Ok(Completion::Stale);
        }

        let analysis = match outcome.and_then(|text| non_empty(text, "analysis")) {
            Ok(text) => text,
            Err(e) => {
                self.apply(Action::Fail)?;
                return Err(self.fail(e.into()));
            }
        };

        match preferences::append_history(
            self.store.as_ref(),
            HistoryEntry::new(&request.symptoms, &analysis),
        ) {
            Ok(history) => self.session.history = history,
            Err(e) => tracing::warn!(error = %e, "Could not save analysis to history"),
        }

        self.session.analysis = Some(analysis);
        self.apply(Action::Complete)?;
        Ok(Completion::Applied)
    }

    /// Run an analysis to completion on the current thread.
    pub fn analyze_symptoms(&mut self, symptoms: &str) -> Result<(), CompanionError> {
        let request = self.begin_analysis(symptoms)?;
        let outcome = request.execute(&self.services);
        self.complete_analysis(request, outcome).map(|_| ())
    }

    // -- Hospital search ----------------------------------------------------

    /// Uses the monitor's last fix, or asks the position source once.
    pub fn begin_hospital_search(
        &mut self,
        need: Option<&str>,
    ) -> Result<HospitalSearchRequest, CompanionError> {
        self.require_step(Step::HospitalSearch)?;

        let location = match self.session.monitor.last_position {
            Some(position) => position,
            None => match self.positions.get_once() {
                Ok(position) => position,
                Err(e) => return Err(self.fail(e.into())),
            },
        };

        let need = need.map(str::trim).filter(|n| !n.is_empty());
        Ok(HospitalSearchRequest {
            ticket: self.tracker.issue(RequestKind::HospitalSearch),
            location,
            context: prompt::hospital_search(location, need),
        })
    }

    pub fn complete_hospital_search(
        &mut self,
        request: HospitalSearchRequest,
        outcome: Result<GroundedResponse, ServiceError>,
    ) -> Result<Completion, CompanionError> {
        if !self.is_current(&request.ticket) {
            return Ok(Completion::Stale);
        }

        let response = outcome.map_err(|e| self.fail(e.into()))?;
        self.session.hospitals = self
            .reconciler
            .reconcile_with_random_ratings(&response.hits, &response.narrative);
        self.session.hospital_narrative = response.narrative;
        self.session.inline_error = None;

        tracing::info!(
            hits = self.session.hospitals.len(),
            location = %request.location,
            "Hospital search complete"
        );
        Ok(Completion::Applied)
    }

    pub fn search_hospitals(&mut self, need: Option<&str>) -> Result<(), CompanionError> {
        let request = self.begin_hospital_search(need)?;
        let outcome = request.execute(&self.services);
        self.complete_hospital_search(request, outcome).map(|_| ())
    }

    // -- Financial aid ------------------------------------------------------

    pub fn begin_aid_query(&mut self, query: &str) -> Result<AidQueryRequest, CompanionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(self.fail(CompanionError::InputValidation(
                "Please describe the help you are looking for.".into(),
            )));
        }
        self.require_step(Step::FinancialAidQuery)?;

        self.session.aid_query = query.to_string();
        Ok(AidQueryRequest {
            ticket: self.tracker.issue(RequestKind::FinancialAid),
            query: query.to_string(),
            context: prompt::financial_aid(query),
            schema: aid_response_schema(),
        })
    }

    /// A payload that is not a list of schemes empties the results.
    pub fn complete_aid_query(
        &mut self,
        request: AidQueryRequest,
        outcome: Result<Value, ServiceError>,
    ) -> Result<Completion, CompanionError> {
        if !self.is_current(&request.ticket) {
            return Ok(Completion::Stale);
        }

        let payload = outcome.map_err(|e| self.fail(e.into()))?;
        let validation = match validate_aid_payload(&payload) {
            Ok(validation) => validation,
            Err(e) => {
                self.session.aid_records.clear();
                self.session.aid_warnings.clear();
                return Err(self.fail(e.into()));
            }
        };

        tracing::info!(
            query = %request.query,
            accepted = validation.records.len(),
            dropped = validation.warnings.len(),
            "Aid query complete"
        );
        self.session.aid_records = validation.records;
        self.session.aid_warnings = validation.warnings;
        self.apply(Action::Complete)?;
        Ok(Completion::Applied)
    }

    pub fn query_financial_aid(&mut self, query: &str) -> Result<(), CompanionError> {
        let request = self.begin_aid_query(query)?;
        let outcome = request.execute(&self.services);
        self.complete_aid_query(request, outcome).map(|_| ())
    }

    // -- Chat ---------------------------------------------------------------

    /// The user's message joins the transcript immediately.
    pub fn begin_chat(&mut self, message: &str) -> Result<ChatRequest, CompanionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(self.fail(CompanionError::InputValidation(
                "Please type a message.".into(),
            )));
        }
        self.require_step(Step::Chat)?;

        let transcript = &self.session.chat;
        let recent = &transcript[transcript.len().saturating_sub(CHAT_CONTEXT_TURNS)..];
        let context = prompt::chat(recent, message);
        self.session.chat.push(ChatMessage::user(message));
        self.session.inline_error = None;

        Ok(ChatRequest {
            ticket: self.tracker.issue(RequestKind::Chat),
            context,
        })
    }

    pub fn complete_chat(
        &mut self,
        request: ChatRequest,
        outcome: Result<String, ServiceError>,
    ) -> Result<Completion, CompanionError> {
        if !self.is_current(&request.ticket) {
            return Ok(Completion::Stale);
        }
        let reply = outcome
            .and_then(|text| non_empty(text, "chat reply"))
            .map_err(|e| self.fail(e.into()))?;
        self.session.chat.push(ChatMessage::assistant(&reply));
        Ok(Completion::Applied)
    }

    pub fn send_chat_message(&mut self, message: &str) -> Result<(), CompanionError> {
        let request = self.begin_chat(message)?;
        let outcome = request.execute(&self.services);
        self.complete_chat(request, outcome).map(|_| ())
    }

    // -- History & settings -------------------------------------------------

    pub fn clear_history(&mut self) -> Result<(), CompanionError> {
        preferences::clear_history(self.store.as_ref()).map_err(|e| self.fail(e.into()))?;
        self.session.history.clear();
        tracing::info!("History cleared");
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), CompanionError> {
        preferences::save_theme(self.store.as_ref(), theme).map_err(|e| self.fail(e.into()))?;
        self.session.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, CompanionError> {
        let theme = self.session.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /// Persist the contact and hand it to a running monitor.
    pub fn set_emergency_contact(&mut self, contact: &str) -> Result<(), CompanionError> {
        let contact = contact.trim();
        preferences::save_emergency_contact(self.store.as_ref(), contact)
            .map_err(|e| self.fail(e.into()))?;
        self.session.emergency_contact = contact.to_string();
        if let Some(monitor) = &self.monitor {
            monitor.set_contact(contact);
        }
        tracing::info!(has_contact = !contact.is_empty(), "Emergency contact updated");
        Ok(())
    }

    // -- Monitoring ---------------------------------------------------------

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    /// Subscribe to positions and start the vitals timer. Must be called
    /// within a tokio runtime.
    pub fn start_monitoring(&mut self) -> Result<(), CompanionError> {
        if self.monitor.is_some() {
            return Err(self.fail(MonitoringError::AlreadyRunning.into()));
        }
        let config = MonitorConfig {
            contact: self.session.emergency_contact.clone(),
            ..self.monitor_config.clone()
        };
        let handle = start_monitoring(self.positions.as_ref(), config, self.alert_sink.clone())
            .map_err(|e| self.fail(e.into()))?;

        self.session.monitor = MonitorSnapshot {
            running: true,
            ..MonitorSnapshot::default()
        };
        self.session.inline_error = None;
        self.monitor = Some(handle);
        Ok(())
    }

    /// Unsubscribe and stop the timer. Events already produced are applied.
    pub fn stop_monitoring(&mut self) -> Result<(), CompanionError> {
        let Some(mut handle) = self.monitor.take() else {
            return Err(self.fail(MonitoringError::NotRunning.into()));
        };
        handle.stop();
        for event in handle.drain_events() {
            self.session.monitor.apply(&event);
        }
        self.session.monitor.stop();
        Ok(())
    }

    /// Fold pending monitor events into the snapshot and return them.
    pub fn poll_monitor(&mut self) -> Vec<MonitorEvent> {
        let Some(handle) = self.monitor.as_mut() else {
            return Vec::new();
        };
        let events = handle.drain_events();
        for event in &events {
            self.session.monitor.apply(event);
        }
        if events.contains(&MonitorEvent::Stopped) {
            self.monitor = None;
        }
        events
    }

    /// Wait for the next monitor event and apply it.
    pub async fn next_monitor_event(&mut self) -> Option<MonitorEvent> {
        let event = self.monitor.as_mut()?.next_event().await;
        match &event {
            Some(e) => {
                self.session.monitor.apply(e);
                if *e == MonitorEvent::Stopped {
                    self.monitor = None;
                }
            }
            None => {
                self.monitor = None;
                self.session.monitor.stop();
            }
        }
        event
    }
}

fn non_empty(text: String, what: &str) -> Result<String, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ResponseParsing(format!("empty {what}")));
    }
    Ok(trimmed.to_string())
}
