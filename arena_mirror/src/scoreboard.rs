use arena_proto::ScoreEntry;

/// Latest scoreboard as sent by the simulator. Never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    entries: Vec<ScoreEntry>,
}

impl Scoreboard {
    pub fn replace(&mut self, entries: Vec<ScoreEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, color: &str) -> ScoreEntry {
        ScoreEntry {
            label: label.to_string(),
            color: color.into(),
        }
    }

    #[test]
    fn replace_discards_previous_entries() {
        let mut board = Scoreboard::default();
        board.replace(vec![entry("alice 3", "#f00"), entry("bob 1", "#00f")]);
        board.replace(vec![entry("carol 9", "#0f0")]);
        assert_eq!(board.entries(), &[entry("carol 9", "#0f0")]);
    }
}
