/*
 * Blur (canonical abstraction)
 *
 * Canonical name of a node = vector of its abstraction-predicate values.
 * Nodes sharing a name merge into one node:
 * - summary if more than one node merged or any merged node was summary
 * - each tuple value is the join of the merged tuples' values
 *
 * New nodes are numbered in canonical-name order, so the result does not
 * depend on the original numbering.
 */

use std::collections::BTreeMap;

use super::tvs::Tvs;
use crate::shared::models::{Kleene, Node};

pub(super) fn blur(tvs: &mut Tvs) {
    let abstraction = tvs.vocabulary().abstraction_predicates();

    let mut groups: BTreeMap<Vec<Kleene>, Vec<Node>> = BTreeMap::new();
    for node in &tvs.nodes {
        let name: Vec<Kleene> = abstraction.iter().map(|p| tvs.get(p, &[*node])).collect();
        groups.entry(name).or_default().push(*node);
    }

    let mut representative: BTreeMap<Node, Node> = BTreeMap::new();
    let mut sizes = Vec::with_capacity(groups.len());
    let mut summary = Vec::new();
    for (index, members) in groups.values().enumerate() {
        let merged = Node(index as u32);
        for node in members {
            representative.insert(*node, merged);
        }
        sizes.push(members.len());
        if members.len() > 1 || members.iter().any(|n| tvs.summary.contains(n)) {
            summary.push(merged);
        }
    }

    let mut values = BTreeMap::new();
    for (predicate, table) in &tvs.values {
        // merged tuple -> (join of stored values, number of stored tuples)
        let mut merged: BTreeMap<Vec<Node>, (Kleene, usize)> = BTreeMap::new();
        for (tuple, value) in table {
            let Some(key) = tuple
                .iter()
                .map(|n| representative.get(n).copied())
                .collect::<Option<Vec<Node>>>()
            else {
                continue;
            };
            let entry = merged.entry(key).or_insert((*value, 0));
            entry.0 = entry.0.join(*value);
            entry.1 += 1;
        }

        let mut blurred = BTreeMap::new();
        for (tuple, (value, stored)) in merged {
            let total: usize = tuple.iter().map(|n| sizes[n.0 as usize]).product();
            // missing tuples are 0
            let value = if stored == total {
                value
            } else {
                value.join(Kleene::False)
            };
            if value != Kleene::False {
                blurred.insert(tuple, value);
            }
        }
        if !blurred.is_empty() {
            values.insert(predicate.clone(), blurred);
        }
    }

    tvs.nodes = (0..groups.len() as u32).map(Node).collect();
    tvs.summary = summary.into_iter().collect();
    tvs.values = values;
    tvs.next_node = groups.len() as u32;
}
