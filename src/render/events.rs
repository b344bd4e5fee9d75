//! Scoped surface listeners.
//!
//! The host owns a [`SurfaceEvents`] hub and emits pointer and resize
//! events into it. Each mounted view holds one [`Subscription`], which
//! unregisters exactly once: on [`Subscription::unsubscribe`] or on drop,
//! whichever comes first. Repeated mount/unmount cycles therefore never
//! leave listeners behind.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::render::SurfaceSize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// Pointer pressed at surface pixel coordinates (origin top-left).
    PointerDown { x: f32, y: f32 },
    Resized(SurfaceSize),
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, VecDeque<SurfaceEvent>)>,
}

/// Event hub for one host surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceEvents {
    registry: Rc<RefCell<Registry>>,
}

impl SurfaceEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let mut reg = self.registry.borrow_mut();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.push((id, VecDeque::new()));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver `event` to every live subscription. Back-to-back resizes
    /// collapse into the newest; a resize queued before a pointer event
    /// stays ahead of it.
    pub fn emit(&self, event: SurfaceEvent) {
        let mut reg = self.registry.borrow_mut();
        for (_, queue) in reg.listeners.iter_mut() {
            if let SurfaceEvent::Resized(_) = event {
                if let Some(last @ SurfaceEvent::Resized(_)) = queue.back_mut() {
                    *last = event;
                    continue;
                }
            }
            queue.push_back(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }
}

/// One registered listener. Unregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
    active: bool,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<SurfaceEvent> {
        if !self.active {
            return Vec::new();
        }
        let Some(registry) = self.registry.upgrade() else {
            return Vec::new();
        };
        let mut reg = registry.borrow_mut();
        reg.listeners
            .iter_mut()
            .find(|(id, _)| *id == self.id)
            .map(|(_, q)| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Unregister. Returns `true` only for the call that removed it.
    pub fn unsubscribe(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
