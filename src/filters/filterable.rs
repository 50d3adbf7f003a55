/// Filter splice between a fixed input and output node
///
/// Either `input -> output` directly, or
/// `input -> f[0].destination, f[i].source -> f[i+1].destination, f[n].source -> output`.
/// Every change tears the previous topology down completely before building
/// the next one.
use crate::audio_system::{AudioGraph, NodeId};

use super::filter::Filter;

#[derive(Debug)]
pub struct Filterable {
    ends: Option<(NodeId, NodeId)>,
    filters: Option<Vec<Filter>>,
}

impl Filterable {
    /// Wire `input -> output` and return the splice point
    pub fn new(graph: &mut AudioGraph, input: NodeId, output: NodeId) -> Self {
        graph.connect(input, output);
        Self {
            ends: Some((input, output)),
            filters: None,
        }
    }

    /// Where upstream nodes should connect
    pub fn destination(&self) -> Option<NodeId> {
        self.ends.map(|(input, _)| input)
    }

    pub fn input(&self) -> Option<NodeId> {
        self.ends.map(|(input, _)| input)
    }

    pub fn output(&self) -> Option<NodeId> {
        self.ends.map(|(_, output)| output)
    }

    /// Currently spliced filters, `None` when routing directly
    pub fn filters(&self) -> Option<&[Filter]> {
        self.filters.as_deref()
    }

    /// Replace the filter chain. `None` or an empty list restores the direct route.
    pub fn set_filters(&mut self, graph: &mut AudioGraph, filters: Option<Vec<Filter>>) {
        let Some((input, output)) = self.ends else {
            tracing::warn!("Ignoring filters on a destroyed splice");
            return;
        };

        if let Some(previous) = self.filters.take() {
            for filter in &previous {
                filter.disconnect(graph);
            }
        }
        graph.disconnect(input);

        let requested = filters.unwrap_or_default();
        let count = requested.len();
        let filters: Vec<Filter> = requested
            .into_iter()
            .filter(|f| f.is_live(graph))
            .collect();
        if filters.len() < count {
            tracing::warn!(
                "Skipping {} destroyed filter(s) in splice",
                count - filters.len()
            );
        }

        if filters.is_empty() {
            graph.connect(input, output);
            return;
        }

        let mut previous: Option<&Filter> = None;
        for filter in &filters {
            // dead filters were dropped above, so both ends exist
            let Some(destination) = filter.destination() else {
                continue;
            };
            match previous {
                None => {
                    graph.connect(input, destination);
                }
                Some(prev) => {
                    prev.connect(graph, destination);
                }
            }
            previous = Some(filter);
        }
        if let Some(last) = previous {
            last.connect(graph, output);
        }

        tracing::debug!("Spliced {} filter(s) into chain", filters.len());
        self.filters = Some(filters);
    }

    /// Clear filters (disconnecting them), then forget both ends
    pub fn destroy(&mut self, graph: &mut AudioGraph) {
        self.set_filters(graph, None);
        if let Some((input, _)) = self.ends.take() {
            graph.disconnect(input);
        }
    }
}
