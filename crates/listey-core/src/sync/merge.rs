//! Pairing of server and client children within one slot

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::models::TimestampedNode;

/// One server/client pairing; at least one side is present
pub type Pair<'a, C> = (Option<&'a C>, Option<&'a C>);

/// Pair keyed children by key union, in ascending key order
pub fn pair_keyed<'a, C>(
    server: &'a HashMap<String, C>,
    client: &'a HashMap<String, C>,
) -> impl Iterator<Item = Pair<'a, C>> + 'a {
    let keys: BTreeSet<&'a str> = server
        .keys()
        .chain(client.keys())
        .map(String::as_str)
        .collect();
    keys.into_iter()
        .map(move |key| (server.get(key), client.get(key)))
}

/// Pair two id-sorted sequences with a two-cursor walk.
///
/// An exhausted side counts as greater than any id. Both inputs must
/// already be sorted ascending; see [`ensure_sorted`].
pub const fn pair_sorted<'a, C>(server: &'a [C], client: &'a [C]) -> SortedPairs<'a, C> {
    SortedPairs { server, client }
}

/// Iterator returned by [`pair_sorted`]
#[derive(Debug, Clone)]
pub struct SortedPairs<'a, C> {
    server: &'a [C],
    client: &'a [C],
}

impl<'a, C: TimestampedNode> Iterator for SortedPairs<'a, C> {
    type Item = Pair<'a, C>;

    fn next(&mut self) -> Option<Self::Item> {
        let (server, client) = match (self.server.split_first(), self.client.split_first()) {
            (None, None) => return None,
            (Some((server, rest)), None) => {
                self.server = rest;
                (Some(server), None)
            }
            (None, Some((client, rest))) => {
                self.client = rest;
                (None, Some(client))
            }
            (Some((server, server_rest)), Some((client, client_rest))) => {
                match client.unique_id().cmp(server.unique_id()) {
                    Ordering::Greater => {
                        self.server = server_rest;
                        (Some(server), None)
                    }
                    Ordering::Less => {
                        self.client = client_rest;
                        (None, Some(client))
                    }
                    Ordering::Equal => {
                        self.server = server_rest;
                        self.client = client_rest;
                        (Some(server), Some(client))
                    }
                }
            }
        };
        Some((server, client))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let longest = self.server.len().max(self.client.len());
        (longest, Some(self.server.len() + self.client.len()))
    }
}

/// Every keyed child must be stored under its own id
pub(crate) fn ensure_keyed<C: TimestampedNode>(
    slot: &'static str,
    entries: &HashMap<String, C>,
) -> Result<()> {
    match entries.iter().find(|(key, child)| key.as_str() != child.unique_id()) {
        Some((key, child)) => Err(Error::MisKeyedChild {
            slot,
            kind: C::KIND,
            key: key.clone(),
            id: child.unique_id().to_string(),
        }),
        None => Ok(()),
    }
}

/// A sorted slot must be strictly ascending by id
pub(crate) fn ensure_sorted<C: TimestampedNode>(slot: &'static str, entries: &[C]) -> Result<()> {
    match entries
        .windows(2)
        .find(|pair| pair[0].unique_id() >= pair[1].unique_id())
    {
        Some(pair) => Err(Error::UnsortedSlot {
            slot,
            id: pair[1].unique_id().to_string(),
        }),
        None => Ok(()),
    }
}
