//! Near-duplicate components over shingle similarity
//!
//! Responses are nodes; two responses are linked when the Jaccard similarity
//! of their shingle sets reaches the threshold. Components are the connected
//! components of that graph, so membership is transitive: two members need
//! not be similar to each other, only joined by a chain of similar pairs.

use super::config::ClusterConfig;
use super::shingle::{jaccard, shingles, ShingleSet};
use crate::record::{ComponentLabel, ConsultationSlug, ResponseRecord};
use std::collections::{BTreeMap, HashMap};

/// Component label per response id, for one consultation
pub type ComponentMap = HashMap<String, ComponentLabel>;

/// Group one consultation's responses into components
///
/// Labels count up from 0 in order of each component's first record, so the
/// result depends only on `records` (and their order) and `config`. Records
/// whose text normalizes to nothing get no label.
pub fn cluster(records: &[ResponseRecord], config: &ClusterConfig) -> ComponentMap {
    let refs: Vec<&ResponseRecord> = records.iter().collect();
    cluster_refs(&refs, config)
}

/// Return `records` with `component` assigned, clustering each consultation
/// separately
///
/// Existing labels are replaced; records excluded from clustering end up
/// with `component = None`. Calling this on records reloaded from storage
/// gives the same partition as clustering at collection time.
pub fn add_components(mut records: Vec<ResponseRecord>, config: &ClusterConfig) -> Vec<ResponseRecord> {
    let mut groups: Vec<(ConsultationSlug, Vec<usize>)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        match groups.iter_mut().find(|(slug, _)| *slug == record.consultation_slug) {
            Some((_, members)) => members.push(idx),
            None => groups.push((record.consultation_slug.clone(), vec![idx])),
        }
    }

    for (_, members) in groups {
        let labels = {
            let refs: Vec<&ResponseRecord> = members.iter().map(|&i| &records[i]).collect();
            cluster_refs(&refs, config)
        };
        for idx in members {
            let record = &mut records[idx];
            record.component = labels.get(&record.response_id).copied();
        }
    }

    records
}

/// Sizes of each component, largest first (ties by label)
pub fn component_sizes(records: &[ResponseRecord]) -> Vec<(ComponentLabel, usize)> {
    let mut counts: BTreeMap<ComponentLabel, usize> = BTreeMap::new();
    for label in records.iter().filter_map(|r| r.component) {
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut sizes: Vec<(ComponentLabel, usize)> = counts.into_iter().collect();
    sizes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    sizes
}

fn cluster_refs(records: &[&ResponseRecord], config: &ClusterConfig) -> ComponentMap {
    let nodes: Vec<(&str, ShingleSet)> = records
        .iter()
        .map(|r| {
            let set = shingles(&r.comparison_text(), config.shingle_size(), config.unit());
            (r.response_id.as_str(), set)
        })
        .filter(|(_, set)| !set.is_empty())
        .collect();

    let adjacency = similarity_graph(&nodes, config.threshold());

    let mut labels = ComponentMap::new();
    let mut visited = vec![false; nodes.len()];
    let mut next_label: ComponentLabel = 0;

    for start in 0..nodes.len() {
        if visited[start] {
            continue;
        }

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            labels.insert(nodes[current].0.to_string(), next_label);

            for &neighbor in &adjacency[current] {
                if !visited[neighbor] {
                    stack.push(neighbor);
                }
            }
        }

        next_label += 1;
    }

    labels
}

/// Undirected adjacency lists linking every pair at or above `threshold`
///
/// Quadratic in the number of nodes; one consultation's responses at a time.
fn similarity_graph(nodes: &[(&str, ShingleSet)], threshold: f64) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); nodes.len()];
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            if jaccard(&nodes[i].1, &nodes[j].1) >= threshold {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    adjacency
}
