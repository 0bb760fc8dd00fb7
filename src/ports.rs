//! Capability ports: the tuner, demux and player collaborators the
//! coordinator drives, plus the outward notifications it raises.

use std::sync::Arc;

use crate::error::PortError;
use crate::types::{
    ChannelInfo, FilterHandle, LockStatus, ResolvedTime, StreamCodec, StreamHandle, TunerStandard,
};

/// Invoked by the tuner whenever its lock status changes.
pub type LockCallback = Box<dyn Fn(LockStatus) + Send + Sync>;

/// Invoked by the demux with each complete section matching a filter.
/// The buffer starts at the table_id byte.
pub type SectionCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

pub trait Tuner: Send {
    /// Starts locking; completion is reported through the lock callback.
    fn lock(
        &mut self,
        frequency_hz: u32,
        bandwidth_mhz: u32,
        standard: TunerStandard,
    ) -> Result<(), PortError>;

    fn on_lock_status_changed(&mut self, callback: LockCallback);

    fn release(&mut self);
}

pub trait Demux: Send {
    fn set_filter(&mut self, pid: u16, table_id: u8) -> Result<FilterHandle, PortError>;

    fn free_filter(&mut self, filter: FilterHandle);

    fn on_section_received(&mut self, callback: SectionCallback);
}

#[cfg_attr(test, mockall::automock)]
pub trait Player: Send {
    fn open_source(&mut self) -> Result<(), PortError>;

    fn close_source(&mut self);

    fn create_stream(&mut self, pid: u16, codec: StreamCodec) -> Result<StreamHandle, PortError>;

    fn remove_stream(&mut self, stream: StreamHandle);
}

/// Application-side callbacks.
pub trait Notifications: Send + Sync {
    /// Raised once per tuning session.
    fn time_resolved(&self, time: &ResolvedTime);

    fn volume_changed(&self, level: u8);

    fn channel_bound(&self, _channel: &ChannelInfo) {}
}

/// The collaborators handed to a coordinator.
pub struct Ports {
    pub tuner: Box<dyn Tuner>,
    pub demux: Box<dyn Demux>,
    pub player: Box<dyn Player>,
    pub notifications: Arc<dyn Notifications>,
}
