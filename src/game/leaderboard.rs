//! Best finish times across races

use crate::ws::protocol::LeaderboardEntry;

pub const DEFAULT_CAPACITY: usize = 10;

/// Top-N best times, one entry per player name, fastest first
#[derive(Debug, Clone)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
    capacity: usize,
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a finish. Only a first entry or a strictly faster time for the
    /// name is kept. Returns true if the table changed; a time too slow for a
    /// full board is dropped and reports no change.
    pub fn record(&mut self, name: &str, time_ms: u64, clicks: u32) -> bool {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) if time_ms < existing.time_ms => {
                existing.time_ms = time_ms;
                existing.clicks = clicks;
            }
            Some(_) => return false,
            None => self.entries.push(LeaderboardEntry {
                name: name.to_string(),
                time_ms,
                clicks,
            }),
        }

        // Stable sort keeps earlier entries ahead on ties
        self.entries.sort_by_key(|e| e.time_ms);
        self.entries.truncate(self.capacity);
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(board: &Leaderboard) -> Vec<String> {
        board.snapshot().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn keeps_ascending_order() {
        let mut board = Leaderboard::default();
        board.record("b", 30_000, 90);
        board.record("a", 20_000, 80);
        board.record("c", 25_000, 85);

        assert_eq!(names(&board), vec!["a", "c", "b"]);
    }

    #[test]
    fn replaces_only_when_strictly_faster() {
        let mut board = Leaderboard::default();
        assert!(board.record("a", 20_000, 80));
        assert!(!board.record("a", 20_000, 70));
        assert!(!board.record("a", 25_000, 60));
        assert_eq!(board.snapshot()[0].clicks, 80);

        assert!(board.record("a", 19_000, 75));
        assert_eq!(board.len(), 1);
        assert_eq!(board.snapshot()[0].time_ms, 19_000);
        assert_eq!(board.snapshot()[0].clicks, 75);
    }

    #[test]
    fn truncates_to_capacity() {
        let mut board = Leaderboard::default();
        for i in 0..15u64 {
            board.record(&format!("p{}", i), 40_000 - i * 1_000, 100);
        }

        assert_eq!(board.len(), DEFAULT_CAPACITY);
        let snapshot = board.snapshot();
        assert_eq!(snapshot[0].name, "p14");
        assert!(snapshot.windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
    }

    #[test]
    fn slow_time_does_not_enter_full_board() {
        let mut board = Leaderboard::new(2);
        assert!(board.record("a", 10_000, 1));
        assert!(board.record("b", 11_000, 1));
        let before = board.snapshot();

        assert!(!board.record("c", 12_000, 1));
        assert_eq!(board.snapshot(), before);
        assert_eq!(names(&board), vec!["a", "b"]);

        // Fast enough to push "b" out
        assert!(board.record("d", 9_000, 1));
        assert_eq!(names(&board), vec!["d", "a"]);
    }
}
