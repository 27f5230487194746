use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use super::types::Binding;

/// Returned by [`BindingTable::remove_exact`] when the tuple is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no binding {0}")]
pub struct BindingNotFound(pub Binding);

/// Set of unique bindings, indexed by exchange and by queue.
///
/// Both indexes always hold the same tuples; an entry whose set becomes empty is removed.
#[derive(Debug, Default, Clone)]
pub struct BindingTable {
  /// exchange -> {(queue, routing key)}
  by_exchange: HashMap<String, BTreeSet<(String, String)>>,
  /// queue -> {(exchange, routing key)}
  by_queue: HashMap<String, BTreeSet<(String, String)>>,
  len: usize,
}

impl BindingTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a binding. Returns `false` if the identical tuple was already present.
  pub fn insert(&mut self, binding: Binding) -> bool {
    let inserted = self
      .by_exchange
      .entry(binding.exchange.clone())
      .or_default()
      .insert((binding.queue.clone(), binding.routing_key.clone()));
    if !inserted {
      return false;
    }
    self
      .by_queue
      .entry(binding.queue)
      .or_default()
      .insert((binding.exchange, binding.routing_key));
    self.len += 1;
    true
  }

  pub fn contains(&self, binding: &Binding) -> bool {
    self
      .by_exchange
      .get(&binding.exchange)
      .is_some_and(|set| set.contains(&(binding.queue.clone(), binding.routing_key.clone())))
  }

  /// Remove exactly one tuple.
  pub fn remove_exact(&mut self, binding: &Binding) -> Result<(), BindingNotFound> {
    let removed = remove_pair(
      &mut self.by_exchange,
      &binding.exchange,
      &(binding.queue.clone(), binding.routing_key.clone()),
    );
    if !removed {
      return Err(BindingNotFound(binding.clone()));
    }
    remove_pair(
      &mut self.by_queue,
      &binding.queue,
      &(binding.exchange.clone(), binding.routing_key.clone()),
    );
    self.len -= 1;
    Ok(())
  }

  /// Remove every binding of `queue`, returning them in order.
  pub fn remove_all_for_queue(&mut self, queue: &str) -> Vec<Binding> {
    let Some(pairs) = self.by_queue.remove(queue) else {
      return Vec::new();
    };
    let removed: Vec<_> = pairs
      .into_iter()
      .map(|(exchange, routing_key)| Binding::new(queue, exchange, routing_key))
      .collect();
    for binding in &removed {
      remove_pair(
        &mut self.by_exchange,
        &binding.exchange,
        &(binding.queue.clone(), binding.routing_key.clone()),
      );
    }
    self.len -= removed.len();
    removed
  }

  /// Remove every binding of `exchange`, returning them in order.
  pub fn remove_all_for_exchange(&mut self, exchange: &str) -> Vec<Binding> {
    let Some(pairs) = self.by_exchange.remove(exchange) else {
      return Vec::new();
    };
    let removed: Vec<_> = pairs
      .into_iter()
      .map(|(queue, routing_key)| Binding::new(queue, exchange, routing_key))
      .collect();
    for binding in &removed {
      remove_pair(
        &mut self.by_queue,
        &binding.queue,
        &(binding.exchange.clone(), binding.routing_key.clone()),
      );
    }
    self.len -= removed.len();
    removed
  }

  /// Live bindings of `exchange`, ordered by queue then key.
  pub fn for_exchange(&self, exchange: &str) -> Vec<Binding> {
    self
      .by_exchange
      .get(exchange)
      .map(|set| {
        set
          .iter()
          .map(|(queue, key)| Binding::new(queue.as_str(), exchange, key.as_str()))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Live bindings of `queue`, ordered by exchange then key.
  pub fn for_queue(&self, queue: &str) -> Vec<Binding> {
    self
      .by_queue
      .get(queue)
      .map(|set| {
        set
          .iter()
          .map(|(exchange, key)| Binding::new(queue, exchange.as_str(), key.as_str()))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Distinct exchanges `queue` is bound to.
  pub fn exchanges_for_queue(&self, queue: &str) -> BTreeSet<String> {
    self
      .by_queue
      .get(queue)
      .map(|set| set.iter().map(|(exchange, _)| exchange.clone()).collect())
      .unwrap_or_default()
  }

  /// Distinct queues bound to `exchange`.
  pub fn queues_for_exchange(&self, exchange: &str) -> BTreeSet<String> {
    self
      .by_exchange
      .get(exchange)
      .map(|set| set.iter().map(|(queue, _)| queue.clone()).collect())
      .unwrap_or_default()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Every binding, sorted.
  pub fn iter(&self) -> impl Iterator<Item = Binding> + '_ {
    let mut all: Vec<_> = self
      .by_exchange
      .iter()
      .flat_map(|(exchange, set)| {
        set
          .iter()
          .map(move |(queue, key)| Binding::new(queue.as_str(), exchange.as_str(), key.as_str()))
      })
      .collect();
    all.sort();
    all.into_iter()
  }
}

fn remove_pair(index: &mut HashMap<String, BTreeSet<(String, String)>>, key: &str, pair: &(String, String)) -> bool {
  let Some(set) = index.get_mut(key) else {
    return false;
  };
  let removed = set.remove(pair);
  if set.is_empty() {
    index.remove(key);
  }
  removed
}
