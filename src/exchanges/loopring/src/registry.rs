use std::collections::BTreeMap;
use ti_types::ExchangePair;

/// Pairs currently subscribed on the stream, keyed by market name, with the number of open
/// handles for each. Owned by the session task, replayed in full after every reconnect.
#[derive(Default)]
pub struct SubscriptionRegistry {
    pairs: BTreeMap<String, Entry>,
}

struct Entry {
    pair: ExchangePair,
    handles: usize,
}

impl SubscriptionRegistry {
    /// Adds a handle for the market. Returns true if it is the first one, i.e. the market still
    /// has to be subscribed on the wire.
    pub fn insert(&mut self, pair: ExchangePair) -> bool {
        if let Some(entry) = self.pairs.get_mut(&pair.foreign_name) {
            entry.handles += 1;
            return false;
        }
        self.pairs
            .insert(pair.foreign_name.clone(), Entry { pair, handles: 1 });
        true
    }

    /// Drops one handle for the market. Returns the pair once the last handle is gone.
    pub fn remove(&mut self, market: &str) -> Option<ExchangePair> {
        let entry = self.pairs.get_mut(market)?;
        entry.handles -= 1;
        if entry.handles > 0 {
            return None;
        }
        self.pairs.remove(market).map(|entry| entry.pair)
    }

    pub fn contains(&self, market: &str) -> bool {
        self.pairs.contains_key(market)
    }

    pub fn markets(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}
