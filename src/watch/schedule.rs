//! Coalescing of watch-triggered re-runs
//!
//! Each watch spec is a slot moving through idle -> queued -> running,
//! with at most one follow-up remembered while it runs. Slots wait in a
//! single FIFO so re-runs start in the order their first event arrived.

use std::collections::VecDeque;

/// State of one watch spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    /// Waiting in the queue
    Queued,
    Running,
    /// Running, with one follow-up requested
    RunningWithPending,
}

/// Single-executor scheduler over a fixed set of slots
#[derive(Debug)]
pub struct Scheduler {
    slots: Vec<SlotState>,
    queue: VecDeque<usize>,
}

impl Scheduler {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![SlotState::Idle; slots],
            queue: VecDeque::new(),
        }
    }

    pub fn state(&self, slot: usize) -> SlotState {
        self.slots[slot]
    }

    /// Ask for a re-run of `slot`; returns false if it collapsed into one
    /// already pending.
    pub fn request(&mut self, slot: usize) -> bool {
        match self.slots[slot] {
            SlotState::Idle => {
                self.slots[slot] = SlotState::Queued;
                self.queue.push_back(slot);
                true
            }
            SlotState::Running => {
                self.slots[slot] = SlotState::RunningWithPending;
                true
            }
            SlotState::Queued | SlotState::RunningWithPending => false,
        }
    }

    /// Take the next slot to run, marking it running
    pub fn next(&mut self) -> Option<usize> {
        let slot = self.queue.pop_front()?;
        self.slots[slot] = SlotState::Running;
        Some(slot)
    }

    /// Mark `slot` finished, queueing its follow-up if one was requested
    pub fn finish(&mut self, slot: usize) {
        self.slots[slot] = match self.slots[slot] {
            SlotState::RunningWithPending => {
                self.queue.push_back(slot);
                SlotState::Queued
            }
            _ => SlotState::Idle,
        };
    }
}
