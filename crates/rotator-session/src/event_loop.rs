//! The intent loop. It owns the [`Session`] and is its only mutator: user
//! intents arrive over a channel, network work runs on blocking workers,
//! and each completion is posted back and applied one at a time.

use std::sync::Arc;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};

use rotator_core::gateway::Gateway;
use rotator_core::probe::ProbeReport;
use rotator_core::record::SelectionRecord;
use rotator_core::{AvatarCandidate, Result, RotatorError};

use crate::apply::{ApplyOutcome, ApplyPlan};
use crate::seq::{Slot, Ticket};
use crate::session::{DashboardView, Fetched, Session};

const INTENT_QUEUE: usize = 64;

/// What a user can ask the dashboard to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Refetch `slots` (all when empty). With `wait`, reply only after
    /// every issued request has completed.
    Refresh { slots: Vec<Slot>, wait: bool },
    Select(String),
    SelectRandom,
    Clear,
    Apply,
    /// Download the selected image and check it.
    Probe,
    /// Select whatever the repository's selection record names.
    AdoptRecord,
    SetSchedule(String),
    Dismiss(u64),
    Snapshot,
}

#[derive(Debug, Clone)]
pub enum Response {
    Dashboard(Box<DashboardView>),
    Selected(AvatarCandidate),
    Applied(ApplyOutcome),
    Probed(ProbeReport),
    Scheduled {
        schedule: String,
        next: Option<OffsetDateTime>,
    },
    Dismissed(bool),
}

type Reply = oneshot::Sender<Result<Response>>;

struct Envelope {
    intent: Intent,
    reply: Reply,
}

enum Event {
    Fetched {
        ticket: Ticket,
        fetched: Fetched,
    },
    Dispatched {
        record: SelectionRecord,
        workflow: String,
        result: Result<()>,
        reply: Reply,
    },
    Probed {
        name: String,
        result: Result<Vec<u8>>,
        reply: Reply,
    },
    RecordRead {
        result: Result<Vec<u8>>,
        reply: Reply,
    },
    /// Follow-up status refresh after a dispatch.
    PollDue,
}

struct Waiter {
    outstanding: Vec<Ticket>,
    reply: Reply,
}

// ── Handle ──

/// Cloneable front door to a running loop.
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::Sender<Envelope>,
}

impl LoopHandle {
    pub async fn send(&self, intent: Intent) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { intent, reply })
            .await
            .map_err(|_| RotatorError::Unavailable("event loop stopped".into()))?;
        rx.await
            .map_err(|_| RotatorError::Unavailable("event loop dropped the request".into()))?
    }

    pub async fn snapshot(&self) -> Result<DashboardView> {
        expect_dashboard(self.send(Intent::Snapshot).await?)
    }

    pub async fn refresh(&self, slots: Vec<Slot>, wait: bool) -> Result<DashboardView> {
        expect_dashboard(self.send(Intent::Refresh { slots, wait }).await?)
    }

    pub async fn select(&self, name: &str) -> Result<AvatarCandidate> {
        expect_selected(self.send(Intent::Select(name.to_string())).await?)
    }

    pub async fn select_random(&self) -> Result<AvatarCandidate> {
        expect_selected(self.send(Intent::SelectRandom).await?)
    }

    pub async fn adopt_record(&self) -> Result<AvatarCandidate> {
        expect_selected(self.send(Intent::AdoptRecord).await?)
    }

    pub async fn clear(&self) -> Result<DashboardView> {
        expect_dashboard(self.send(Intent::Clear).await?)
    }

    pub async fn apply(&self) -> Result<ApplyOutcome> {
        match self.send(Intent::Apply).await? {
            Response::Applied(outcome) => Ok(outcome),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn probe(&self) -> Result<ProbeReport> {
        match self.send(Intent::Probe).await? {
            Response::Probed(report) => Ok(report),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the normalized expression and its next occurrence.
    pub async fn set_schedule(&self, expr: &str) -> Result<(String, Option<OffsetDateTime>)> {
        match self.send(Intent::SetSchedule(expr.to_string())).await? {
            Response::Scheduled { schedule, next } => Ok((schedule, next)),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn dismiss(&self, id: u64) -> Result<bool> {
        match self.send(Intent::Dismiss(id)).await? {
            Response::Dismissed(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }
}

fn expect_dashboard(resp: Response) -> Result<DashboardView> {
    match resp {
        Response::Dashboard(view) => Ok(*view),
        other => Err(unexpected(&other)),
    }
}

fn expect_selected(resp: Response) -> Result<AvatarCandidate> {
    match resp {
        Response::Selected(candidate) => Ok(candidate),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(resp: &Response) -> RotatorError {
    RotatorError::Unavailable(format!("unexpected loop response {resp:?}"))
}

// ── Loop ──

pub struct EventLoop {
    session: Session,
    gateway: Arc<dyn Gateway>,
    intents: mpsc::Receiver<Envelope>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    waiters: Vec<Waiter>,
}

impl EventLoop {
    /// Start the loop on the current tokio runtime.
    pub fn spawn(session: Session, gateway: Arc<dyn Gateway>) -> LoopHandle {
        let (handle, event_loop) = Self::new(session, gateway);
        tokio::spawn(event_loop.run());
        handle
    }

    pub fn new(session: Session, gateway: Arc<dyn Gateway>) -> (LoopHandle, Self) {
        let (tx, intents) = mpsc::channel(INTENT_QUEUE);
        let (events_tx, events) = mpsc::unbounded_channel();
        let event_loop = Self {
            session,
            gateway,
            intents,
            events_tx,
            events,
            waiters: Vec::new(),
        };
        (LoopHandle { tx }, event_loop)
    }

    /// Run until every [`LoopHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::debug!("session loop started");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                envelope = self.intents.recv() => match envelope {
                    Some(Envelope { intent, reply }) => self.handle_intent(intent, reply),
                    None => break,
                },
            }
        }
        tracing::debug!("session loop stopped");
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn dashboard(&mut self) -> Response {
        Response::Dashboard(Box::new(self.session.snapshot(Self::now())))
    }

    /// Log, notify, and hand the error back to the caller.
    fn fail(&mut self, reply: Reply, err: RotatorError) {
        self.session.report(&err, Self::now());
        let _ = reply.send(Err(err));
    }

    fn handle_intent(&mut self, intent: Intent, reply: Reply) {
        tracing::debug!(?intent, "intent");
        let now = Self::now();
        match intent {
            Intent::Refresh { slots, wait } => {
                let tickets = self.start_refresh(&slots);
                if wait {
                    self.waiters.push(Waiter {
                        outstanding: tickets,
                        reply,
                    });
                } else {
                    let _ = reply.send(Ok(self.dashboard()));
                }
            }
            Intent::Select(name) => match self.session.select(&name) {
                Ok(c) => {
                    let _ = reply.send(Ok(Response::Selected(c)));
                }
                Err(err) => self.fail(reply, err),
            },
            Intent::SelectRandom => match self.session.select_random() {
                Ok(c) => {
                    let _ = reply.send(Ok(Response::Selected(c)));
                }
                Err(err) => self.fail(reply, err),
            },
            Intent::Clear => {
                self.session.clear();
                let _ = reply.send(Ok(self.dashboard()));
            }
            Intent::Apply => match self.session.plan_apply(now) {
                Ok(ApplyPlan::Record {
                    record,
                    instructions,
                }) => {
                    let _ = reply.send(Ok(Response::Applied(ApplyOutcome::Instructions {
                        record,
                        instructions,
                    })));
                }
                Ok(ApplyPlan::Dispatch {
                    record,
                    workflow,
                    git_ref,
                    inputs,
                }) => self.start_dispatch(record, workflow, git_ref, inputs, reply),
                Err(err) => self.fail(reply, err),
            },
            Intent::Probe => match self.session.selected_name() {
                Ok(name) => {
                    let path = format!(
                        "{}/{}",
                        self.session.settings().avatars_dir.trim_end_matches('/'),
                        name
                    );
                    let tx = self.events_tx.clone();
                    let work = self.read_file(path);
                    tokio::spawn(async move {
                        let result = work.await;
                        let _ = tx.send(Event::Probed {
                            name,
                            result,
                            reply,
                        });
                    });
                }
                Err(err) => self.fail(reply, err),
            },
            Intent::AdoptRecord => {
                let path = self.session.settings().record_path.clone();
                let tx = self.events_tx.clone();
                let work = self.read_file(path);
                tokio::spawn(async move {
                    let result = work.await;
                    let _ = tx.send(Event::RecordRead { result, reply });
                });
            }
            Intent::SetSchedule(expr) => match self.session.set_schedule(&expr, now) {
                Ok(next) => {
                    let schedule = self.session.settings().recurrence.to_string();
                    if let Some(t) = next.and_then(|t| t.format(&Rfc3339).ok()) {
                        tracing::info!(%schedule, next = %t, "schedule updated");
                    }
                    let _ = reply.send(Ok(Response::Scheduled { schedule, next }));
                }
                Err(err) => self.fail(reply, err),
            },
            Intent::Dismiss(id) => {
                let found = self.session.dismiss(id);
                let _ = reply.send(Ok(Response::Dismissed(found)));
            }
            Intent::Snapshot => {
                let _ = reply.send(Ok(self.dashboard()));
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        let now = Self::now();
        match event {
            Event::Fetched { ticket, fetched } => {
                self.session.complete(ticket, fetched, now);
                self.settle_waiters(ticket);
            }
            Event::Dispatched {
                record,
                workflow,
                result,
                reply,
            } => match self.session.finish_dispatch(record, workflow, result, now) {
                Ok(outcome) => {
                    self.schedule_poll();
                    let _ = reply.send(Ok(Response::Applied(outcome)));
                }
                Err(err) => self.fail(reply, err),
            },
            Event::Probed {
                name,
                result,
                reply,
            } => match result {
                Ok(bytes) => {
                    let report = self.session.finish_probe(&name, &bytes, now);
                    let _ = reply.send(Ok(Response::Probed(report)));
                }
                Err(err) => self.fail(reply, err),
            },
            Event::RecordRead { result, reply } => {
                match result.and_then(|bytes| self.session.adopt_record(&bytes)) {
                    Ok(c) => {
                        let _ = reply.send(Ok(Response::Selected(c)));
                    }
                    Err(err) => self.fail(reply, err),
                }
            }
            Event::PollDue => {
                tracing::debug!("follow-up status refresh");
                self.start_refresh(&[Slot::Status, Slot::History]);
            }
        }
    }

    fn settle_waiters(&mut self, done: Ticket) {
        for waiter in &mut self.waiters {
            waiter.outstanding.retain(|t| *t != done);
        }
        let (ready, waiting): (Vec<Waiter>, Vec<Waiter>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|w| w.outstanding.is_empty());
        self.waiters = waiting;
        for waiter in ready {
            let _ = waiter.reply.send(Ok(self.dashboard()));
        }
    }

    // ── Off-loop work ──

    fn start_refresh(&mut self, slots: &[Slot]) -> Vec<Ticket> {
        let slots: &[Slot] = if slots.is_empty() { &Slot::ALL } else { slots };
        let mut tickets = Vec::with_capacity(slots.len());
        for &slot in slots {
            if tickets.iter().any(|t: &Ticket| t.slot == slot) {
                continue;
            }
            let ticket = self.session.begin(slot);
            tickets.push(ticket);
            self.spawn_fetch(ticket);
        }
        tickets
    }

    fn spawn_fetch(&self, ticket: Ticket) {
        let gw = Arc::clone(&self.gateway);
        let settings = self.session.settings();
        let timeout = settings.request_timeout;
        let tx = self.events_tx.clone();
        let (status_filter, history_filter) = (settings.status_filter(), settings.history_filter());
        let avatars_dir = settings.avatars_dir.clone();

        tokio::spawn(async move {
            let fetched = match ticket.slot {
                Slot::User => Fetched::User(
                    run_blocking(timeout, "user", move || gw.current_user()).await,
                ),
                Slot::Status => Fetched::Status(
                    run_blocking(timeout, "status", move || gw.run_history(&status_filter)).await,
                ),
                Slot::Catalog => Fetched::Catalog(
                    run_blocking(timeout, "avatars", move || gw.list_files(&avatars_dir)).await,
                ),
                Slot::History => Fetched::History(
                    run_blocking(timeout, "run history", move || gw.run_history(&history_filter))
                        .await,
                ),
            };
            let _ = tx.send(Event::Fetched { ticket, fetched });
        });
    }

    fn read_file(&self, path: String) -> impl std::future::Future<Output = Result<Vec<u8>>> {
        let gw = Arc::clone(&self.gateway);
        let timeout = self.session.settings().request_timeout;
        async move {
            let what = path.clone();
            run_blocking(timeout, &what, move || gw.read_file(&path)).await
        }
    }

    fn start_dispatch(
        &self,
        record: SelectionRecord,
        workflow: String,
        git_ref: String,
        inputs: std::collections::BTreeMap<String, String>,
        reply: Reply,
    ) {
        let gw = Arc::clone(&self.gateway);
        let timeout = self.session.settings().request_timeout;
        let tx = self.events_tx.clone();
        let wf = workflow.clone();
        tokio::spawn(async move {
            let result = run_blocking(timeout, "dispatch", move || {
                gw.dispatch_workflow(&wf, &git_ref, &inputs)
            })
            .await;
            let _ = tx.send(Event::Dispatched {
                record,
                workflow,
                result,
                reply,
            });
        });
    }

    fn schedule_poll(&self) {
        let delay = self.session.settings().poll_delay;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::PollDue);
        });
    }
}

/// Run a blocking gateway call on a worker, bounded by `timeout`.
async fn run_blocking<T, F>(timeout: Duration, what: &str, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(RotatorError::fetch(what, format!("worker failed: {join}"))),
        Err(_) => Err(RotatorError::fetch(
            what,
            format!("timed out after {}s", timeout.as_secs_f32()),
        )),
    }
}
