//! Request dispatch for one UI session.
//!
//! `Session` is the explicit context every request runs against: the
//! multipass adapter, SSH collaborators, the event sink and the poll
//! registry. It holds no ambient global state.

use std::time::Duration;

use serde::Serialize;

use crate::application::ports::{
    EventSink, PollOutcome, SessionEvent, SshClient, SshFiles, VmProvisioner,
};
use crate::application::services::launch::launch_instance;
use crate::application::services::lifecycle;
use crate::application::services::poller::{
    PollPolicy, PollRegistry, gone, poll_until, reachable, reaches,
};
use crate::application::services::registry::{find_images, get_instance_info, list_instances};
use crate::application::services::ssh_provision::{SshProvisioner, SshSettings};
use crate::domain::{
    FindImagesResult, Instance, InstanceInfo, InstanceLists, InstanceState, LaunchProgress,
    LaunchSpec, MultipassError, SshError, Transition,
};

// ── Messages ──────────────────────────────────────────────────────────────────

/// Every request the UI can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RefreshList,
    GetInstanceInfo { name: String },
    FindImages,
    StartInstance { name: String },
    StopInstance { name: String },
    SuspendInstance { name: String },
    LaunchInstance(LaunchSpec),
    DeleteInstance { name: String, purge: bool },
    RecoverInstance { name: String },
    PurgeInstance { name: String },
    PurgeAll,
}

/// One-shot reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Snapshot(InstanceLists),
    Info(Result<InstanceInfo, MultipassError>),
    Images(Option<FindImagesResult>),
    Completed(OperationReport),
}

/// Result of a mutating request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    pub operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MultipassError>,
    pub was_downloading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollOutcome>,
    /// `Some` when SSH setup was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_configured: Option<bool>,
    pub warnings: Vec<String>,
}

impl OperationReport {
    fn new(operation: &'static str, name: Option<&str>) -> Self {
        Self {
            operation,
            name: name.map(String::from),
            success: true,
            error: None,
            was_downloading: false,
            poll: None,
            ssh_configured: None,
            warnings: Vec::new(),
        }
    }

    fn failed(mut self, error: MultipassError) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    /// Budget when also waiting for an address.
    pub max_attempts_with_ip: u32,
    /// Poll for convergence after mutations.
    pub wait: bool,
    pub ssh: SshSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            max_attempts: 30,
            max_attempts_with_ip: 60,
            wait: true,
            ssh: SshSettings::default(),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session<'a, P, F, C, E> {
    mp: &'a P,
    files: &'a F,
    client: &'a C,
    events: &'a E,
    settings: SessionSettings,
    polls: PollRegistry,
}

impl<'a, P, F, C, E> Session<'a, P, F, C, E>
where
    P: VmProvisioner,
    F: SshFiles,
    C: SshClient,
    E: EventSink,
{
    pub fn new(
        mp: &'a P,
        files: &'a F,
        client: &'a C,
        events: &'a E,
        settings: SessionSettings,
    ) -> Self {
        Self {
            mp,
            files,
            client,
            events,
            settings,
            polls: PollRegistry::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// SSH provisioning bound to this session's collaborators.
    #[must_use]
    pub fn ssh(&self) -> SshProvisioner<'a, P, F, C> {
        SshProvisioner::new(self.mp, self.files, self.client, self.settings.ssh.clone())
    }

    /// Dispatch one request.
    pub async fn handle(&self, request: Request) -> Response {
        tracing::debug!(?request, "handling request");
        match request {
            Request::RefreshList => Response::Snapshot(list_instances(self.mp).await),
            Request::GetInstanceInfo { name } => {
                Response::Info(get_instance_info(self.mp, &name).await)
            }
            Request::FindImages => Response::Images(find_images(self.mp).await),
            Request::StartInstance { name } => {
                Response::Completed(self.transition(Transition::Start, &name, false).await)
            }
            Request::StopInstance { name } => {
                Response::Completed(self.transition(Transition::Stop, &name, false).await)
            }
            Request::SuspendInstance { name } => {
                Response::Completed(self.transition(Transition::Suspend, &name, false).await)
            }
            Request::RecoverInstance { name } => {
                Response::Completed(self.transition(Transition::Recover, &name, false).await)
            }
            Request::DeleteInstance { name, purge } => {
                Response::Completed(self.transition(Transition::Delete, &name, purge).await)
            }
            Request::PurgeInstance { name } => {
                Response::Completed(self.transition(Transition::Purge, &name, true).await)
            }
            Request::LaunchInstance(spec) => Response::Completed(self.launch(&spec).await),
            Request::PurgeAll => Response::Completed(self.purge_all().await),
        }
    }

    /// Provision SSH for an instance that is already running with an address.
    ///
    /// # Errors
    ///
    /// Fails when the instance is unknown, not reachable, or setup fails.
    pub async fn setup_ssh(&self, name: &str) -> Result<bool, SshError> {
        let lists = list_instances(self.mp).await;
        if let Some(err) = &lists.error {
            return Err(err.clone().into());
        }
        let ip = lists
            .find(name)
            .filter(|i| i.is_running())
            .and_then(|i| i.ipv4.clone())
            .ok_or_else(|| {
                MultipassError::other(format!(
                    "Instance '{name}' must be running with an IP address"
                ))
            })?;
        self.ssh().setup(name, &ip).await
    }

    async fn transition(&self, transition: Transition, name: &str, purge: bool) -> OperationReport {
        let mut report = OperationReport::new(transition.verb(), Some(name));

        if matches!(transition, Transition::Purge | Transition::Recover)
            && let Err(err) = self.check_allowed(transition, name).await
        {
            return report.failed(err);
        }

        if let Some(state) = transition.optimistic_state() {
            self.events
                .emit(SessionEvent::Optimistic(Instance::optimistic(name, state, None)));
        }

        if let Err(err) = lifecycle::apply(self.mp, transition, name, purge).await {
            // Overwrite the optimistic record with what the daemon reports.
            self.events
                .emit(SessionEvent::Snapshot(list_instances(self.mp).await));
            return report.failed(err);
        }

        let purged = transition == Transition::Purge || (transition == Transition::Delete && purge);
        if purged {
            self.remove_ssh_block(name, &mut report).await;
        }

        if self.settings.wait {
            let budget = self.settings.max_attempts;
            let outcome = match transition.target_state(purge) {
                Some(state) => self.poll(name, reaches(state), budget, &mut report).await,
                None => self.poll(name, gone(), budget, &mut report).await,
            };
            report.poll = Some(outcome);
        }
        report
    }

    /// Refuse a verb the instance's current state does not accept.
    async fn check_allowed(&self, transition: Transition, name: &str) -> Result<(), MultipassError> {
        let lists = list_instances(self.mp).await;
        if let Some(err) = &lists.error {
            return Err(err.clone());
        }
        let Some(inst) = lists.find(name) else {
            return Err(MultipassError::other(format!(
                "Instance '{name}' does not exist"
            )));
        };
        if transition.allowed_from(&inst.state) {
            return Ok(());
        }
        tracing::debug!(name, state = %inst.state, verb = transition.verb(), "transition refused");
        Err(MultipassError::other(format!(
            "Cannot {} '{name}' while it is {}; only deleted instances accept it",
            transition.verb(),
            inst.state,
        )))
    }

    async fn launch(&self, spec: &LaunchSpec) -> OperationReport {
        let mut report = OperationReport::new("launch", Some(&spec.name));

        if let Err(err) = spec.validate() {
            return report.failed(MultipassError::other(err.to_string()));
        }

        let lists = list_instances(self.mp).await;
        if let Some(err) = &lists.error {
            return report.failed(err.clone());
        }
        if lists.name_exists(&spec.name) {
            return report.failed(MultipassError::other(format!(
                "Instance '{}' already exists",
                spec.name
            )));
        }

        let state = if lists.image_is_cached(spec.release_hint()) {
            InstanceState::Creating
        } else {
            InstanceState::DownloadingImage
        };
        self.events.emit(SessionEvent::Optimistic(Instance::optimistic(
            &spec.name,
            state,
            spec.image.as_deref(),
        )));

        let events = self.events;
        let mut on_progress = |p: &LaunchProgress| {
            events.emit(SessionEvent::LaunchProgress {
                message: p.message.clone(),
                downloading: p.downloading,
            });
        };
        let outcome = launch_instance(self.mp, spec, Some(&mut on_progress)).await;
        report.was_downloading = outcome.was_downloading;
        if let Some(err) = outcome.error {
            self.events
                .emit(SessionEvent::Snapshot(list_instances(self.mp).await));
            return report.failed(err);
        }

        if !self.settings.wait {
            if spec.enable_ssh {
                self.warn(&mut report, "SSH setup skipped: not waiting for the instance".to_string());
            }
            return report;
        }

        if !spec.enable_ssh {
            let budget = self.settings.max_attempts;
            let outcome = self
                .poll(&spec.name, reaches(InstanceState::Running), budget, &mut report)
                .await;
            report.poll = Some(outcome);
            return report;
        }

        let budget = self.settings.max_attempts_with_ip;
        let outcome = self.poll(&spec.name, reachable(), budget, &mut report).await;
        let ip = match &outcome {
            PollOutcome::Converged {
                instance: Some(inst),
                ..
            } => inst.ipv4.clone(),
            _ => None,
        };
        report.poll = Some(outcome);

        let Some(ip) = ip else {
            self.warn(
                &mut report,
                format!("SSH setup skipped: '{}' did not get an IP address", spec.name),
            );
            return report;
        };

        match self.ssh().setup(&spec.name, &ip).await {
            Ok(connected) => {
                report.ssh_configured = Some(true);
                if !connected {
                    self.warn(
                        &mut report,
                        "SSH configured but the test connection failed; it may work after a short delay"
                            .to_string(),
                    );
                }
            }
            Err(err) => {
                report.ssh_configured = Some(false);
                self.warn(&mut report, err.to_string());
            }
        }
        report
    }

    async fn purge_all(&self) -> OperationReport {
        let mut report = OperationReport::new("purge", None);
        let before = list_instances(self.mp).await;

        if let Err(err) = lifecycle::purge_all(self.mp).await {
            return report.failed(err);
        }

        for inst in &before.deleted {
            self.remove_ssh_block(&inst.name, &mut report).await;
        }
        self.events
            .emit(SessionEvent::Snapshot(list_instances(self.mp).await));
        report
    }

    async fn poll(
        &self,
        name: &str,
        done: impl Fn(Option<&Instance>) -> bool,
        max_attempts: u32,
        report: &mut OperationReport,
    ) -> PollOutcome {
        let ticket = self.polls.begin(name);
        let policy = PollPolicy {
            interval: self.settings.poll_interval,
            max_attempts,
        };
        let outcome = poll_until(self.mp, self.events, name, done, policy, Some(&ticket)).await;
        self.polls.finish(ticket);
        self.events.emit(SessionEvent::PollFinished {
            name: name.to_string(),
            outcome: outcome.clone(),
        });
        if let PollOutcome::TimedOut { .. } = outcome {
            self.warn(
                report,
                format!("'{name}' has not settled yet; it may still converge"),
            );
        }
        outcome
    }

    async fn remove_ssh_block(&self, name: &str, report: &mut OperationReport) {
        if let Err(err) = self.ssh().remove(name).await {
            self.warn(
                report,
                format!("Could not remove SSH config for '{name}': {err}"),
            );
        }
    }

    fn warn(&self, report: &mut OperationReport, message: String) {
        tracing::warn!("{message}");
        self.events.emit(SessionEvent::Warning {
            message: message.clone(),
        });
        report.warnings.push(message);
    }
}
