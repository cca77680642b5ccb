use crate::chess_move::Move;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeType {
    Exact,
    /// Upper bound: no move raised alpha.
    Alpha,
    /// Lower bound: the node failed high.
    Beta,
}

#[derive(Copy, Clone, Debug)]
pub struct TranspositionEntry {
    pub hash: u64,
    /// Remaining depth the value was searched to.
    pub depth: i32,
    pub flag: NodeType,
    /// Mate scores are stored relative to this node, not the root.
    pub value: i32,
    pub best_move: Option<Move>,
    /// Search generation that wrote the entry.
    pub age: u8,
}

/// Fixed-size hash table of search results, owned by one search.
#[derive(Clone, Debug)]
pub struct TranspositionTable {
    table: Vec<Option<TranspositionEntry>>,
    size: usize,
    age: u8,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        // Calculate number of entries that fit in size_mb megabytes
        let entry_size = std::mem::size_of::<Option<TranspositionEntry>>();
        let num_entries = ((size_mb * 1024 * 1024) / entry_size).max(1);

        TranspositionTable {
            table: vec![None; num_entries],
            size: num_entries,
            age: 0,
        }
    }

    pub fn store(
        &mut self,
        hash: u64,
        depth: i32,
        flag: NodeType,
        value: i32,
        best_move: Option<Move>,
    ) {
        let index = self.get_index(hash);
        let entry = TranspositionEntry {
            hash,
            depth,
            flag,
            value,
            best_move,
            age: self.age,
        };

        // Replacement strategy: replace if deeper search or older age
        match self.table[index] {
            Some(existing) if existing.depth > depth && existing.age == self.age => {}
            _ => self.table[index] = Some(entry),
        }
    }

    pub fn probe(&self, hash: u64) -> Option<&TranspositionEntry> {
        let index = self.get_index(hash);
        self.table[index].as_ref().filter(|entry| entry.hash == hash)
    }

    pub fn new_search(&mut self) {
        self.age = self.age.wrapping_add(1);
    }

    pub fn clear(&mut self) {
        self.table.fill(None);
        self.age = 0;
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.table.iter().all(Option::is_none)
    }

    fn get_index(&self, hash: u64) -> usize {
        (hash % self.size as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess_move::MoveFlag;
    use crate::square::Square;

    fn mv(from: &str, to: &str) -> Move {
        Move::new(from.parse::<Square>().unwrap(), to.parse::<Square>().unwrap(), MoveFlag::Normal)
    }

    #[test]
    fn test_store_and_probe() {
        let mut tt = TranspositionTable::new(1); // 1MB table
        let hash = 123456789;
        let best_move = Some(mv("g1", "f3"));

        tt.store(hash, 4, NodeType::Exact, 100, best_move);
        let entry = tt.probe(hash).unwrap();

        assert_eq!(entry.hash, hash);
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.flag, NodeType::Exact);
        assert_eq!(entry.value, 100);
        assert_eq!(entry.best_move, best_move);
        assert!(tt.probe(hash + 1).is_none());
    }

    #[test]
    fn test_replacement_strategy() {
        let mut tt = TranspositionTable::new(1);
        let hash = 123456789;

        tt.store(hash, 2, NodeType::Exact, 100, Some(mv("e2", "e4")));

        // Deeper search replaces
        tt.store(hash, 4, NodeType::Exact, 200, Some(mv("d2", "d4")));
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.value, 200);

        // Shallower search in the same generation does not
        tt.store(hash, 1, NodeType::Beta, 300, Some(mv("c2", "c4")));
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.best_move, Some(mv("d2", "d4")));
    }

    #[test]
    fn test_age_update() {
        let mut tt = TranspositionTable::new(1);
        let hash = 123456789;

        tt.store(hash, 4, NodeType::Exact, 100, None);
        let initial_age = tt.probe(hash).unwrap().age;

        tt.new_search();
        tt.store(hash, 3, NodeType::Exact, 200, None);
        let entry = tt.probe(hash).unwrap();

        assert_ne!(initial_age, entry.age);
        assert_eq!(entry.depth, 3);
    }

    #[test]
    fn test_clear() {
        let mut tt = TranspositionTable::new(1);
        tt.store(42, 1, NodeType::Alpha, -5, None);
        assert!(!tt.is_empty());
        tt.clear();
        assert!(tt.is_empty());
        assert!(tt.capacity() > 0);
    }
}
