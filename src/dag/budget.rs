// src/dag/budget.rs

/// Counting permit pool bounding how many steps may be `Running` at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyBudget {
    capacity: usize,
    in_use: usize,
}

impl ConcurrencyBudget {
    /// A zero capacity would stall every run, so it is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }

    pub fn try_acquire(&mut self) -> bool {
        if self.in_use < self.capacity {
            self.in_use += 1;
            true
        } else {
            false
        }
    }

    pub fn release(&mut self) {
        self.in_use = self.in_use.saturating_sub(1);
    }
}
