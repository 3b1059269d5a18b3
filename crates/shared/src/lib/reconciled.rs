use std::collections::HashSet;

use crate::deposit_data::Pubkey;

/// Every public key known to have a completed deposit: the union of the
/// cached history and freshly fetched on-chain events.
///
/// The set only ever grows within a session. Incoming records are filtered
/// against it; nothing is ever removed from it.
#[derive(Debug, Default, Clone)]
pub struct ReconciledSet {
    keys: HashSet<Pubkey>,
}

impl ReconciledSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = Pubkey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn extend(&mut self, keys: impl IntoIterator<Item = Pubkey>) {
        self.keys.extend(keys);
    }

    pub fn contains(&self, key: &Pubkey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> Pubkey {
        Pubkey::from([seed; 48])
    }

    #[test]
    fn union_of_cached_and_fetched_keys() {
        let mut set = ReconciledSet::from_keys([key(1), key(2)]);
        set.extend([key(2), key(3)]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&key(1)));
        assert!(set.contains(&key(3)));
        assert!(!set.contains(&key(4)));
    }
}
