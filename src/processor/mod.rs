//! Acquisition coordinator.
//!
//! One tokio task walks tuner lock → PAT → PMT → stream binding → TDT → TOT
//! and then waits for channel changes. Everything it reacts to arrives on a
//! single signal queue: lock status and section arrivals from the notifiers,
//! channel requests and shutdown from the handle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::calendar::resolve_local_time;
use crate::config::AcquisitionConfig;
use crate::constants::{PAT_PID, RESERVED_SERVICE_INDEX, TDT_TOT_PID};
use crate::error::{AcquisitionError, PortError};
use crate::ports::{Notifications, Ports};
use crate::psi::{PatTable, PmtElementaryInfo, PmtTable};
use crate::si_cache::{Table, TableRegistry};
use crate::types::{
    AcquisitionState, ChannelInfo, ChannelRequest, FilterHandle, LockStatus, ResolvedTime,
    StreamCodec, StreamHandle, TableKind,
};

const FIRST_SERVICE_INDEX: usize = RESERVED_SERVICE_INDEX + 1;

/// Events consumed by the coordinator task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    TunerStatus(LockStatus),
    /// A table of this kind was just stored in the registry.
    TableArrived(TableKind),
    ChannelChange(ChannelRequest),
    Shutdown,
}

/// Service index a channel request leads to, given the PAT's service count.
///
/// Index 0 is reserved, so valid indices are `1..service_count`. Up wraps
/// from the last index to 1, down wraps from 1 (or 0) to the last index.
/// `None` for an out-of-range direct entry or a PAT with no services.
pub fn next_channel(current: usize, service_count: usize, request: ChannelRequest) -> Option<usize> {
    let last = service_count
        .checked_sub(1)
        .filter(|&last| last >= FIRST_SERVICE_INDEX)?;
    match request {
        ChannelRequest::Up if current >= last => Some(FIRST_SERVICE_INDEX),
        ChannelRequest::Up => Some(current + 1),
        ChannelRequest::Down if current <= FIRST_SERVICE_INDEX => Some(last),
        ChannelRequest::Down => Some(current - 1),
        ChannelRequest::Direct(index) if (FIRST_SERVICE_INDEX..=last).contains(&index) => Some(index),
        ChannelRequest::Direct(_) => None,
    }
}

/// Demux-side entry point: parse, store, then wake the coordinator.
///
/// Runs synchronously on whatever thread the demux calls back on.
#[derive(Debug, Clone)]
pub struct SectionNotifier {
    registry: TableRegistry,
    signals: UnboundedSender<Signal>,
}

impl SectionNotifier {
    pub fn on_section(&self, section: &[u8]) {
        let Some(kind) = section.first().copied().and_then(TableKind::from_table_id) else {
            debug!(len = section.len(), "ignoring section with unhandled table id");
            return;
        };
        match Table::parse(kind, section) {
            Ok(table) => {
                let sequence = self.registry.store(table);
                debug!(%kind, sequence, "section stored");
                if self.signals.send(Signal::TableArrived(kind)).is_err() {
                    debug!(%kind, "coordinator gone; arrival not signalled");
                }
            }
            Err(e) => warn!(%kind, error = %e, "rejected section"),
        }
    }
}

/// Tuner-side entry point.
#[derive(Debug, Clone)]
pub struct LockNotifier {
    signals: UnboundedSender<Signal>,
}

impl LockNotifier {
    pub fn on_status(&self, status: LockStatus) {
        debug!(?status, "tuner lock status");
        let _ = self.signals.send(Signal::TunerStatus(status));
    }
}

/// How a wait ended, when it did not fail.
enum Wake<T> {
    Ready(T),
    /// A channel request moved the selection to this service index.
    Channel(usize),
    Shutdown,
}

/// The fresh table of `kind` if `signal` announces one stored after `since`.
fn fresh_table(
    registry: &TableRegistry,
    signal: &Signal,
    kind: TableKind,
    since: u64,
) -> Option<Table> {
    match signal {
        Signal::TableArrived(arrived) if *arrived == kind => registry.fresh(kind, since),
        _ => None,
    }
}

pub struct Coordinator {
    config: AcquisitionConfig,
    ports: Ports,
    registry: TableRegistry,
    signals: UnboundedReceiver<Signal>,
    state: Arc<RwLock<AcquisitionState>>,
    channel_info: Arc<RwLock<Option<ChannelInfo>>>,

    pat: PatTable,
    current_index: usize,
    /// Channel requests received before the PAT was known.
    pending: Vec<ChannelRequest>,
    time_resolved: bool,

    filter: Option<FilterHandle>,
    /// Registry sequence recorded when the current filter was set.
    filter_mark: u64,
    video: Option<StreamHandle>,
    audio: Option<StreamHandle>,
    source_open: bool,
    tuner_engaged: bool,
}

impl Coordinator {
    /// Registers the notifiers with the ports and spawns the acquisition
    /// task on the current tokio runtime.
    pub fn start(config: AcquisitionConfig, mut ports: Ports) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = TableRegistry::new();

        let sections = SectionNotifier {
            registry: registry.clone(),
            signals: tx.clone(),
        };
        ports
            .demux
            .on_section_received(Box::new(move |section: &[u8]| sections.on_section(section)));
        let lock = LockNotifier { signals: tx.clone() };
        ports
            .tuner
            .on_lock_status_changed(Box::new(move |status: LockStatus| lock.on_status(status)));

        let state = Arc::new(RwLock::new(AcquisitionState::Idle));
        let channel_info = Arc::new(RwLock::new(None));
        let notifications = Arc::clone(&ports.notifications);

        let coordinator = Coordinator {
            config,
            ports,
            registry: registry.clone(),
            signals: rx,
            state: Arc::clone(&state),
            channel_info: Arc::clone(&channel_info),
            pat: PatTable::default(),
            current_index: FIRST_SERVICE_INDEX,
            pending: Vec::new(),
            time_resolved: false,
            filter: None,
            filter_mark: 0,
            video: None,
            audio: None,
            source_open: false,
            tuner_engaged: false,
        };

        CoordinatorHandle {
            signals: tx,
            registry,
            state,
            channel_info,
            notifications,
            task: tokio::spawn(coordinator.run()),
        }
    }

    /// Runs until shutdown or the first fatal error, then tears down.
    async fn run(mut self) -> Result<(), AcquisitionError> {
        let outcome = self.acquire().await;
        match &outcome {
            Ok(()) => info!("acquisition stopped on request"),
            Err(e) => error!(error = %e, state = %self.state(), "acquisition failed"),
        }
        self.teardown();
        outcome
    }

    async fn acquire(&mut self) -> Result<(), AcquisitionError> {
        self.set_state(AcquisitionState::TunerLocking);
        self.ports.tuner.lock(
            self.config.frequency_hz,
            self.config.bandwidth_mhz,
            self.config.standard,
        )?;
        self.tuner_engaged = true;

        // Lock and PAT waits defer channel requests, so only shutdown ends them early.
        let limit = self.config.tuner_lock_timeout();
        let Wake::Ready(()) = self
            .wait(Some(limit), |signal| {
                matches!(signal, Signal::TunerStatus(LockStatus::Locked)).then_some(())
            })
            .await?
        else {
            return Ok(());
        };

        self.set_state(AcquisitionState::AwaitingPat);
        self.ports.player.open_source()?;
        self.source_open = true;
        self.program_filter(PAT_PID, TableKind::Pat.table_id())?;

        let (registry, since) = (self.registry.clone(), self.filter_mark);
        let limit = self.config.table_timeout();
        let Wake::Ready(pat) = self
            .wait(Some(limit), move |signal| {
                match fresh_table(&registry, signal, TableKind::Pat, since)? {
                    Table::Pat(pat) => Some(pat),
                    _ => None,
                }
            })
            .await?
        else {
            return Ok(());
        };

        if pat.service_count() <= FIRST_SERVICE_INDEX {
            return Err(AcquisitionError::NoServices);
        }
        info!(
            transport_stream_id = pat.header.transport_stream_id,
            services = pat.service_count() - FIRST_SERVICE_INDEX,
            "PAT acquired"
        );
        self.pat = pat;
        self.current_index = self.initial_index();
        for request in std::mem::take(&mut self.pending) {
            match next_channel(self.current_index, self.pat.service_count(), request) {
                Some(index) => self.current_index = index,
                None => warn!(?request, "deferred channel request out of range; ignored"),
            }
        }

        loop {
            match self.bind_channel().await? {
                Wake::Ready(()) => {}
                Wake::Channel(index) => {
                    self.current_index = index;
                    continue;
                }
                Wake::Shutdown => return Ok(()),
            }

            if !self.time_resolved {
                match self.acquire_time().await? {
                    Wake::Ready(()) => {}
                    Wake::Channel(index) => {
                        self.current_index = index;
                        continue;
                    }
                    Wake::Shutdown => return Ok(()),
                }
            }

            match self.wait(None, |_| None::<()>).await? {
                Wake::Channel(index) => self.current_index = index,
                Wake::Ready(()) | Wake::Shutdown => return Ok(()),
            }
        }
    }

    fn initial_index(&self) -> usize {
        let wanted = self.config.initial_channel;
        if (FIRST_SERVICE_INDEX..self.pat.service_count()).contains(&wanted) {
            wanted
        } else {
            warn!(wanted, services = self.pat.service_count(), "initial channel out of range; using 1");
            FIRST_SERVICE_INDEX
        }
    }

    /// AwaitingPmt → StreamsBound for the current service index.
    async fn bind_channel(&mut self) -> Result<Wake<()>, AcquisitionError> {
        let service = self
            .pat
            .service(self.current_index)
            .copied()
            .ok_or(AcquisitionError::NoServices)?;
        self.set_state(AcquisitionState::AwaitingPmt);
        info!(
            index = self.current_index,
            program_number = service.program_number,
            pmt_pid = service.pid,
            "selecting service"
        );
        self.program_filter(service.pid, TableKind::Pmt.table_id())?;

        let (registry, since) = (self.registry.clone(), self.filter_mark);
        let program_number = service.program_number;
        let limit = self.config.table_timeout();
        let pmt = match self
            .wait(Some(limit), move |signal| {
                match fresh_table(&registry, signal, TableKind::Pmt, since)? {
                    Table::Pmt(pmt) if pmt.header.program_number == program_number => Some(pmt),
                    _ => None,
                }
            })
            .await?
        {
            Wake::Ready(pmt) => pmt,
            Wake::Channel(index) => return Ok(Wake::Channel(index)),
            Wake::Shutdown => return Ok(Wake::Shutdown),
        };

        self.bind_streams(&pmt)?;
        Ok(Wake::Ready(()))
    }

    /// First video and first audio stream of the PMT replace whatever was bound.
    fn bind_streams(&mut self, pmt: &PmtTable) -> Result<(), PortError> {
        for stream in [self.video.take(), self.audio.take()].into_iter().flatten() {
            self.ports.player.remove_stream(stream);
        }

        let video = self.create_stream(pmt.first_video())?;
        self.video = video.map(|(_, handle)| handle);
        let audio = self.create_stream(pmt.first_audio())?;
        self.audio = audio.map(|(_, handle)| handle);

        let info = ChannelInfo {
            program_number: pmt.header.program_number,
            audio_pid: audio.map(|(pid, _)| pid),
            video_pid: video.map(|(pid, _)| pid),
        };
        *self.channel_info.write() = Some(info);
        self.set_state(AcquisitionState::StreamsBound);
        info!(
            program_number = info.program_number,
            video_pid = ?info.video_pid,
            audio_pid = ?info.audio_pid,
            "streams bound"
        );
        self.ports.notifications.channel_bound(&info);
        Ok(())
    }

    fn create_stream(
        &mut self,
        stream: Option<&PmtElementaryInfo>,
    ) -> Result<Option<(u16, StreamHandle)>, PortError> {
        let Some((pid, codec)) = stream.and_then(|s| {
            StreamCodec::from_stream_type(s.stream_type).map(|codec| (s.elementary_pid, codec))
        }) else {
            return Ok(None);
        };
        let handle = self.ports.player.create_stream(pid, codec)?;
        debug!(pid, ?codec, "stream created");
        Ok(Some((pid, handle)))
    }

    /// StreamsBound → AwaitingTdt → AwaitingTot → TimeResolved.
    async fn acquire_time(&mut self) -> Result<Wake<()>, AcquisitionError> {
        let limit = self.config.time_table_timeout();

        self.set_state(AcquisitionState::AwaitingTdt);
        self.program_filter(TDT_TOT_PID, TableKind::Tdt.table_id())?;
        let (registry, since) = (self.registry.clone(), self.filter_mark);
        let (utc, captured_at) = match self
            .wait(Some(limit), move |signal| {
                match fresh_table(&registry, signal, TableKind::Tdt, since)? {
                    Table::Tdt(tdt) => tdt.utc().map(|utc| (utc, std::time::Instant::now())),
                    _ => None,
                }
            })
            .await?
        {
            Wake::Ready(tdt) => tdt,
            Wake::Channel(index) => return Ok(Wake::Channel(index)),
            Wake::Shutdown => return Ok(Wake::Shutdown),
        };
        debug!(%utc, "TDT acquired");

        self.set_state(AcquisitionState::AwaitingTot);
        self.program_filter(TDT_TOT_PID, TableKind::Tot.table_id())?;
        let (registry, since) = (self.registry.clone(), self.filter_mark);
        let tot = match self
            .wait(Some(limit), move |signal| {
                match fresh_table(&registry, signal, TableKind::Tot, since)? {
                    Table::Tot(tot) => Some(tot),
                    _ => None,
                }
            })
            .await?
        {
            Wake::Ready(tot) => tot,
            Wake::Channel(index) => return Ok(Wake::Channel(index)),
            Wake::Shutdown => return Ok(Wake::Shutdown),
        };
        self.release_filter();

        let local = resolve_local_time(utc, Some(&tot), self.config.country_code.as_deref());
        let resolved = ResolvedTime::from_local(local, captured_at);
        self.time_resolved = true;
        self.set_state(AcquisitionState::TimeResolved);
        info!(%utc, %local, "local time resolved");
        self.ports.notifications.time_resolved(&resolved);
        Ok(Wake::Ready(()))
    }

    /// Pulls signals until `ready` accepts one, a channel request or shutdown
    /// interrupts, or `limit` elapses.
    async fn wait<T>(
        &mut self,
        limit: Option<Duration>,
        mut ready: impl FnMut(&Signal) -> Option<T>,
    ) -> Result<Wake<T>, AcquisitionError> {
        let deadline = limit.map(|after| (Instant::now() + after, after));
        loop {
            let received = match deadline {
                Some((at, after)) => {
                    let outcome = timeout_at(at, self.signals.recv()).await;
                    match outcome {
                        Ok(received) => received,
                        Err(_) => {
                            return Err(AcquisitionError::Timeout {
                                phase: self.state(),
                                after,
                            });
                        }
                    }
                }
                None => self.signals.recv().await,
            };
            let signal = received.ok_or(AcquisitionError::QueueClosed)?;

            if let Some(value) = ready(&signal) {
                return Ok(Wake::Ready(value));
            }
            match signal {
                Signal::Shutdown => return Ok(Wake::Shutdown),
                Signal::ChannelChange(request) => {
                    if let Some(index) = self.route_channel_request(request) {
                        return Ok(Wake::Channel(index));
                    }
                }
                Signal::TunerStatus(LockStatus::NotLocked) => {
                    warn!(state = %self.state(), "tuner reports no lock")
                }
                Signal::TunerStatus(LockStatus::Locked) => {}
                Signal::TableArrived(kind) => {
                    debug!(%kind, state = %self.state(), "section does not complete the wait")
                }
            }
        }
    }

    /// Index to switch to, or `None` if the request is deferred or ignored.
    fn route_channel_request(&mut self, request: ChannelRequest) -> Option<usize> {
        match self.state() {
            AcquisitionState::Idle | AcquisitionState::TunerLocking | AcquisitionState::AwaitingPat => {
                debug!(?request, "channel request deferred until PAT");
                self.pending.push(request);
                None
            }
            _ => {
                let next = next_channel(self.current_index, self.pat.service_count(), request);
                match next {
                    Some(index) => info!(?request, from = self.current_index, to = index, "channel change"),
                    None => warn!(
                        ?request,
                        services = self.pat.service_count(),
                        "channel request out of range; ignored"
                    ),
                }
                next
            }
        }
    }

    /// Frees the current filter and programs a new one.
    fn program_filter(&mut self, pid: u16, table_id: u8) -> Result<(), PortError> {
        self.release_filter();
        self.filter_mark = self.registry.sequence();
        let handle = self.ports.demux.set_filter(pid, table_id)?;
        debug!(pid, table_id, "filter set");
        self.filter = Some(handle);
        Ok(())
    }

    fn release_filter(&mut self) {
        if let Some(filter) = self.filter.take() {
            self.ports.demux.free_filter(filter);
        }
    }

    /// Releases everything acquired so far. Safe to call more than once.
    fn teardown(&mut self) {
        if self.state() == AcquisitionState::TornDown {
            return;
        }
        self.release_filter();
        for stream in [self.video.take(), self.audio.take()].into_iter().flatten() {
            self.ports.player.remove_stream(stream);
        }
        if std::mem::take(&mut self.source_open) {
            self.ports.player.close_source();
        }
        if std::mem::take(&mut self.tuner_engaged) {
            self.ports.tuner.release();
        }
        self.registry.clear();
        *self.channel_info.write() = None;
        self.set_state(AcquisitionState::TornDown);
    }

    fn state(&self) -> AcquisitionState {
        *self.state.read()
    }

    fn set_state(&self, state: AcquisitionState) {
        *self.state.write() = state;
        info!(%state, "acquisition state");
    }
}

/// Caller-side view of a running coordinator.
///
/// Dropping the handle asks the coordinator to tear down; the task finishes
/// in the background.
pub struct CoordinatorHandle {
    signals: UnboundedSender<Signal>,
    registry: TableRegistry,
    state: Arc<RwLock<AcquisitionState>>,
    channel_info: Arc<RwLock<Option<ChannelInfo>>>,
    notifications: Arc<dyn Notifications>,
    task: JoinHandle<Result<(), AcquisitionError>>,
}

impl CoordinatorHandle {
    pub fn state(&self) -> AcquisitionState {
        *self.state.read()
    }

    /// Channel currently bound, if any.
    pub fn channel_info(&self) -> Option<ChannelInfo> {
        *self.channel_info.read()
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Another entry point for sections, besides the demux callback.
    pub fn section_notifier(&self) -> SectionNotifier {
        SectionNotifier {
            registry: self.registry.clone(),
            signals: self.signals.clone(),
        }
    }

    pub fn lock_notifier(&self) -> LockNotifier {
        LockNotifier {
            signals: self.signals.clone(),
        }
    }

    pub fn channel_up(&self) -> Result<(), AcquisitionError> {
        self.post(Signal::ChannelChange(ChannelRequest::Up))
    }

    pub fn channel_down(&self) -> Result<(), AcquisitionError> {
        self.post(Signal::ChannelChange(ChannelRequest::Down))
    }

    /// Direct entry of a PAT service index.
    pub fn select_channel(&self, index: usize) -> Result<(), AcquisitionError> {
        self.post(Signal::ChannelChange(ChannelRequest::Direct(index)))
    }

    /// Forwards a volume level to the application callbacks.
    pub fn publish_volume(&self, level: u8) {
        self.notifications.volume_changed(level);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the coordinator to tear down and waits for it.
    pub async fn shutdown(self) -> Result<(), AcquisitionError> {
        // The task may already be gone after a fatal error; join reports it.
        let _ = self.signals.send(Signal::Shutdown);
        self.join().await
    }

    /// Waits for the coordinator to finish on its own.
    pub async fn join(mut self) -> Result<(), AcquisitionError> {
        (&mut self.task).await?
    }

    fn post(&self, signal: Signal) -> Result<(), AcquisitionError> {
        self.signals
            .send(signal)
            .map_err(|_| AcquisitionError::QueueClosed)
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        // The port callbacks hold senders too, so the queue never closes by itself.
        if !self.task.is_finished() && self.signals.send(Signal::Shutdown).is_ok() {
            debug!("handle dropped; coordinator shutting down");
        }
    }
}
