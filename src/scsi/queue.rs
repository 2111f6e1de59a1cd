//! Tagged task queue.
//!
//! Holds the commands a LUN has accepted but not finished. A task submitted
//! under disconnect privilege sits here while the bus is free and is picked up
//! again by (initiator, tag) when the target reselects.

use heapless::Vec;

/// Tasks per logical unit
pub const QUEUE_DEPTH: usize = 4;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskAttribute {
    Simple,
    HeadOfQueue,
    /// Starts only after every earlier task has completed, and holds back
    /// every later task until it completes
    Ordered,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    Queued,
    Active,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    Full,
    /// A task with the same initiator and tag is already queued
    Overlapped,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Task {
    pub initiator: u8,
    pub tag: u8,
    pub attribute: TaskAttribute,
    pub state: TaskState,
    cdb: [u8; 12],
    cdb_len: u8,
}

impl Task {
    pub fn new(initiator: u8, tag: u8, attribute: TaskAttribute, cdb: &[u8]) -> Self {
        let len = cdb.len().min(12);
        let mut bytes = [0; 12];
        bytes[..len].copy_from_slice(&cdb[..len]);
        Self {
            initiator,
            tag,
            attribute,
            state: TaskState::Queued,
            cdb: bytes,
            cdb_len: len as u8,
        }
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb[..self.cdb_len as usize]
    }

    fn is(&self, initiator: u8, tag: u8) -> bool {
        self.initiator == initiator && self.tag == tag
    }
}

#[derive(Clone, Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Task, QUEUE_DEPTH>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, task: Task) -> Result<(), QueueError> {
        if self.get(task.initiator, task.tag).is_some() {
            return Err(QueueError::Overlapped);
        }
        let result = match task.attribute {
            TaskAttribute::HeadOfQueue => self.tasks.insert(0, task),
            _ => self.tasks.push(task),
        };
        result.map_err(|_| QueueError::Full)
    }

    /// The first queued task allowed to start, as (initiator, tag)
    pub fn next_runnable(&self) -> Option<(u8, u8)> {
        let mut ordered_ahead = false;
        for (i, task) in self.tasks.iter().enumerate() {
            let runnable = match task.attribute {
                TaskAttribute::HeadOfQueue => true,
                TaskAttribute::Simple => !ordered_ahead,
                TaskAttribute::Ordered => i == 0,
            };
            if task.state == TaskState::Queued && runnable {
                return Some((task.initiator, task.tag));
            }
            if task.attribute == TaskAttribute::Ordered {
                ordered_ahead = true;
            }
        }
        None
    }

    /// Marks a task active, returning its CDB
    pub fn start(&mut self, initiator: u8, tag: u8) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| t.is(initiator, tag))?;
        task.state = TaskState::Active;
        Some(task)
    }

    /// Removes a finished task
    pub fn complete(&mut self, initiator: u8, tag: u8) -> Option<Task> {
        let i = self.tasks.iter().position(|t| t.is(initiator, tag))?;
        Some(self.tasks.remove(i))
    }

    pub fn get(&self, initiator: u8, tag: u8) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is(initiator, tag))
    }

    pub fn abort_task(&mut self, initiator: u8, tag: u8) -> bool {
        self.complete(initiator, tag).is_some()
    }

    /// ABORT TASK SET: drops everything from one initiator
    pub fn abort_initiator(&mut self, initiator: u8) {
        self.tasks.retain(|t| t.initiator != initiator);
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ6: [u8; 6] = [0x08, 0, 0, 0, 1, 0];

    fn task(tag: u8, attribute: TaskAttribute) -> Task {
        Task::new(7, tag, attribute, &READ6)
    }

    #[test]
    fn test_ordered_barrier() {
        let mut queue = TaskQueue::new();
        queue.submit(task(1, TaskAttribute::Simple)).unwrap();
        queue.submit(task(2, TaskAttribute::Ordered)).unwrap();
        queue.submit(task(3, TaskAttribute::Simple)).unwrap();

        assert_eq!(queue.next_runnable(), Some((7, 1)));
        queue.start(7, 1);
        // B waits for A, C waits for B
        assert_eq!(queue.next_runnable(), None);
        queue.complete(7, 1);

        assert_eq!(queue.next_runnable(), Some((7, 2)));
        queue.start(7, 2);
        assert_eq!(queue.next_runnable(), None);
        queue.complete(7, 2);

        assert_eq!(queue.next_runnable(), Some((7, 3)));
    }

    #[test]
    fn test_simple_tasks_run_in_order_without_barrier() {
        let mut queue = TaskQueue::new();
        queue.submit(task(1, TaskAttribute::Simple)).unwrap();
        queue.submit(task(2, TaskAttribute::Simple)).unwrap();
        queue.start(7, 1);
        assert_eq!(queue.next_runnable(), Some((7, 2)));
    }

    #[test]
    fn test_head_of_queue_jumps_ahead() {
        let mut queue = TaskQueue::new();
        queue.submit(task(1, TaskAttribute::Ordered)).unwrap();
        queue.submit(task(2, TaskAttribute::Simple)).unwrap();
        queue.submit(task(3, TaskAttribute::HeadOfQueue)).unwrap();
        assert_eq!(queue.next_runnable(), Some((7, 3)));
        assert_eq!(queue.get(7, 3).unwrap().cdb(), &READ6);
    }

    #[test]
    fn test_overlap_and_full() {
        let mut queue = TaskQueue::new();
        queue.submit(task(1, TaskAttribute::Simple)).unwrap();
        assert_eq!(
            queue.submit(task(1, TaskAttribute::Simple)),
            Err(QueueError::Overlapped)
        );
        for tag in 2..=QUEUE_DEPTH as u8 {
            queue.submit(task(tag, TaskAttribute::Simple)).unwrap();
        }
        assert_eq!(
            queue.submit(task(0x20, TaskAttribute::Simple)),
            Err(QueueError::Full)
        );

        queue.abort_initiator(7);
        assert!(queue.is_empty());
    }
}
