//! Notification sink for whatever draws the simulation.
//!
//! The simulation only ever pushes events; it never waits on the receiver.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::automaton::grid::Cell;

/// Observer of cell lifecycle changes. All methods default to no-ops.
pub trait RenderBridge {
    /// A cell joined the active set.
    fn on_cell_activated(&mut self, _cell: &Cell) {}

    /// An active cell stayed active through a tick.
    fn on_cell_updated(&mut self, _cell: &Cell) {}

    /// A cell left the active set (its saturation reached zero).
    fn on_cell_deactivated(&mut self, _cell: &Cell) {}

    /// A terrain cell was created during terrain generation.
    fn on_terrain_cell_created(&mut self, _cell: &Cell) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl RenderBridge for NullBridge {}

/// One notification, as sent by [`ChannelBridge`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderEvent {
    Activated(Cell),
    Updated(Cell),
    Deactivated(Cell),
    TerrainCreated(Cell),
}

/// Forwards events over an unbounded channel so a render thread can consume
/// them at its own pace.
pub struct ChannelBridge {
    sender: Sender<RenderEvent>,
    disconnected: bool,
}

impl ChannelBridge {
    /// Bridge plus the receiving end for the renderer.
    pub fn new() -> (Self, Receiver<RenderEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            ChannelBridge {
                sender,
                disconnected: false,
            },
            receiver,
        )
    }

    fn send(&mut self, event: RenderEvent) {
        if self.disconnected {
            return;
        }
        if self.sender.send(event).is_err() {
            log::warn!("render receiver dropped; further events are discarded");
            self.disconnected = true;
        }
    }
}

impl RenderBridge for ChannelBridge {
    fn on_cell_activated(&mut self, cell: &Cell) {
        self.send(RenderEvent::Activated(*cell));
    }

    fn on_cell_updated(&mut self, cell: &Cell) {
        self.send(RenderEvent::Updated(*cell));
    }

    fn on_cell_deactivated(&mut self, cell: &Cell) {
        self.send(RenderEvent::Deactivated(*cell));
    }

    fn on_terrain_cell_created(&mut self, cell: &Cell) {
        self.send(RenderEvent::TerrainCreated(*cell));
    }
}

/// Collects events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingBridge {
    pub events: Vec<RenderEvent>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.events)
    }
}

impl RenderBridge for RecordingBridge {
    fn on_cell_activated(&mut self, cell: &Cell) {
        self.events.push(RenderEvent::Activated(*cell));
    }

    fn on_cell_updated(&mut self, cell: &Cell) {
        self.events.push(RenderEvent::Updated(*cell));
    }

    fn on_cell_deactivated(&mut self, cell: &Cell) {
        self.events.push(RenderEvent::Deactivated(*cell));
    }

    fn on_terrain_cell_created(&mut self, cell: &Cell) {
        self.events.push(RenderEvent::TerrainCreated(*cell));
    }
}
