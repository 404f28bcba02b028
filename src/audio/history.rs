use std::collections::VecDeque;

/// Sliding record of the most recent window peaks, one slot per LED.
///
/// Index 0 holds the newest value. The length never changes after
/// construction: every push discards the oldest slot.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    slots: VecDeque<f32>,
}

impl HistoryBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            slots: std::iter::repeat(0.0).take(len).collect(),
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.is_empty() {
            return;
        }
        self.slots.pop_back();
        self.slots.push_front(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.slots.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let history = HistoryBuffer::new(5);
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|v| v == 0.0));
    }

    #[test]
    fn newest_first() {
        let mut history = HistoryBuffer::new(4);
        history.push(0.1);
        history.push(0.2);
        history.push(0.3);
        let values: Vec<f32> = history.iter().collect();
        assert_eq!(values, vec![0.3, 0.2, 0.1, 0.0]);
    }

    #[test]
    fn length_is_fixed() {
        let mut history = HistoryBuffer::new(3);
        for i in 0..100 {
            history.push(i as f32);
            assert_eq!(history.len(), 3);
        }
        let values: Vec<f32> = history.iter().collect();
        assert_eq!(values, vec![99.0, 98.0, 97.0]);
    }

    #[test]
    fn zero_length_ignores_pushes() {
        let mut history = HistoryBuffer::new(0);
        history.push(1.0);
        assert!(history.is_empty());
    }
}
