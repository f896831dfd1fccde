/*!
Recording and tallying of exit polls.

A poll round has a topic (the *tematica*) and a list of candidates. Each voter
checks one or more candidates on a [`ballot::Ballot`], and the submission is
stored as a [`VoteRecord`]. The interactive flow is driven by the
[`session::Session`] state machine, and the results are computed with [`tally`].

```
use exit_poll::*;

let votes = vec![
    VoteRecord::new("T", None, &["A B".to_string(), "C D".to_string()]),
    VoteRecord::new("T", Some("zorro"), &["A B".to_string()]),
];
let tallies = tally(&votes);
assert_eq!(tallies[0].rows[0].candidate, "A B");
assert_eq!(tallies[0].rows[0].count, 2);
```
*/

pub mod ballot;
mod config;
pub mod manual;
pub mod session;

use log::{debug, info};

use std::{
    collections::HashMap,
    ops::{Add, AddAssign},
};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

/// Counts in insertion order, like a multiset that remembers when each
/// element was first seen.
#[derive(Debug, Clone, Default)]
struct Counter {
    entries: Vec<(String, VoteCount)>,
    positions: HashMap<String, usize>,
}

impl Counter {
    fn update(&mut self, names: &[String]) {
        for name in names.iter() {
            match self.positions.get(name) {
                Some(idx) => self.entries[*idx].1 += VoteCount(1),
                None => {
                    self.positions.insert(name.clone(), self.entries.len());
                    self.entries.push((name.clone(), VoteCount(1)));
                }
            }
        }
    }

    fn total(&self) -> VoteCount {
        self.entries.iter().map(|(_, vc)| *vc).sum()
    }

    /// All the entries, from the most common to the least common.
    fn most_common(&self) -> Vec<(String, VoteCount)> {
        let mut res = self.entries.clone();
        // sort_by is stable: ties keep their first-seen order.
        res.sort_by(|a, b| b.1.cmp(&a.1));
        res
    }
}

fn percentage(count: VoteCount, total: VoteCount) -> f64 {
    if total == VoteCount::EMPTY {
        0.0
    } else {
        100.0 * (count.0 as f64) / (total.0 as f64)
    }
}

fn counter_to_tally(topic: &str, counter: &Counter) -> TopicTally {
    let total = counter.total();
    let rows: Vec<TallyRow> = counter
        .most_common()
        .into_iter()
        .map(|(candidate, count)| TallyRow {
            candidate,
            count: count.0,
            percentage: percentage(count, total),
        })
        .collect();
    TopicTally {
        topic: topic.to_string(),
        total: total.0,
        rows,
    }
}

/// Computes the tally of every topic found in the votes.
///
/// The topics are returned in the order in which they first appear in `votes`.
/// Within a topic, the rows are sorted by decreasing count, and candidates with
/// the same count keep the order in which they were first selected.
///
/// Arguments:
/// * `votes` all the recorded votes, typically everything a store holds
pub fn tally(votes: &[VoteRecord]) -> Vec<TopicTally> {
    info!("tally: processing {:?} votes", votes.len());
    let mut groups: Vec<(String, Counter)> = Vec::new();
    let mut topic_positions: HashMap<String, usize> = HashMap::new();
    for v in votes.iter() {
        let idx = match topic_positions.get(&v.topic) {
            Some(idx) => *idx,
            None => {
                topic_positions.insert(v.topic.clone(), groups.len());
                groups.push((v.topic.clone(), Counter::default()));
                groups.len() - 1
            }
        };
        groups[idx].1.update(&v.selections);
    }
    debug!("tally: found {:?} topics", groups.len());

    groups
        .iter()
        .map(|(topic, counter)| counter_to_tally(topic, counter))
        .collect()
}

/// The tally restricted to a single topic, or None if nobody voted on it.
pub fn tally_topic(votes: &[VoteRecord], topic: &str) -> Option<TopicTally> {
    let selected: Vec<VoteRecord> = votes.iter().filter(|v| v.topic == topic).cloned().collect();
    tally(&selected).into_iter().next()
}
