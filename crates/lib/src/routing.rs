//! Routing-key matching.
//!
//! The broker supplies an exchange's kind and its live bindings; a [`Matcher`] decides which
//! queues a message with a given routing key reaches.

use std::collections::BTreeSet;

use crate::binding::Binding;
use crate::entity::ExchangeKind;

pub trait Matcher: Send + Sync + std::fmt::Debug {
  /// Destination queues for `routing_key` among `bindings`, all of which belong to one
  /// exchange of kind `kind`.
  fn route(&self, kind: ExchangeKind, bindings: &[Binding], routing_key: &str) -> BTreeSet<String>;
}

/// Direct, fanout and AMQP topic matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyMatcher;

impl Matcher for KeyMatcher {
  fn route(&self, kind: ExchangeKind, bindings: &[Binding], routing_key: &str) -> BTreeSet<String> {
    bindings
      .iter()
      .filter(|b| match kind {
        ExchangeKind::Direct => b.routing_key == routing_key,
        ExchangeKind::Fanout => true,
        ExchangeKind::Topic => topic_matches(&b.routing_key, routing_key),
      })
      .map(|b| b.queue.clone())
      .collect()
  }
}

/// Match a dot-separated routing key against a topic pattern.
///
/// `*` matches exactly one word and `#` matches zero or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
  let pattern: Vec<&str> = pattern.split('.').collect();
  let key: Vec<&str> = key.split('.').collect();
  match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
  match pattern.split_first() {
    None => key.is_empty(),
    Some((&"#", rest)) => {
      // Collapse runs of '#'.
      if rest.first() == Some(&"#") {
        return match_words(rest, key);
      }
      (0..=key.len()).any(|skip| match_words(rest, &key[skip..]))
    }
    Some((word, rest)) => match key.split_first() {
      Some((first, key_rest)) => (*word == "*" || word == first) && match_words(rest, key_rest),
      None => false,
    },
  }
}
