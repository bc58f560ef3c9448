//! Cost model
//!
//! Costs are three-dimensional: CPU, peak memory and network, all in
//! size-derived units. A node's cumulative cost combines its local cost
//! with its children's cumulative costs through one of three memory
//! combinators, depending on whether the operator streams, accumulates
//! its whole input, or probes a built lookup table.
//!
//! Two calculators share the same local-cost and exchange-cost helpers:
//! one costs plans whose exchanges are explicit nodes, the other
//! estimates the exchanges a logical plan would need. Using the same
//! helpers keeps the two in agreement for equivalent plans.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use rcbo_common::CostEstimatorConfig;
use rcbo_plan::{
    ExchangeKind, ExchangeScope, JoinDistribution, PlanNode, TypeMap,
};

/// Cumulative cost of a subplan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanCostEstimate {
    pub cpu_cost: Estimate,
    /// Peak memory over the subplan's whole lifetime.
    pub max_memory: Estimate,
    /// Peak memory while the subplan is producing output. Smaller than
    /// `max_memory` when upstream accumulation has already been
    /// released.
    pub max_memory_when_outputting: Estimate,
    pub network_cost: Estimate,
}

impl PlanCostEstimate {
    pub fn zero() -> Self {
        Self {
            cpu_cost: Estimate::zero(),
            max_memory: Estimate::zero(),
            max_memory_when_outputting: Estimate::zero(),
            network_cost: Estimate::zero(),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn has_unknown_components(&self) -> bool {
        self.cpu_cost.is_unknown()
            || self.max_memory.is_unknown()
            || self.max_memory_when_outputting.is_unknown()
            || self.network_cost.is_unknown()
    }
}

/// Cost contributed by one operator, before combining with its sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCostEstimate {
    pub cpu_cost: Estimate,
    pub max_memory: Estimate,
    pub network_cost: Estimate,
}

impl LocalCostEstimate {
    pub fn zero() -> Self {
        Self {
            cpu_cost: Estimate::zero(),
            max_memory: Estimate::zero(),
            network_cost: Estimate::zero(),
        }
    }

    pub fn of(cpu: Estimate, max_memory: Estimate, network: Estimate) -> Self {
        Self {
            cpu_cost: cpu,
            max_memory,
            network_cost: network,
        }
    }

    /// Component-wise sum, for folding estimated exchanges into an
    /// operator's own cost.
    pub fn add(self, other: LocalCostEstimate) -> LocalCostEstimate {
        LocalCostEstimate {
            cpu_cost: self.cpu_cost + other.cpu_cost,
            max_memory: self.max_memory + other.max_memory,
            network_cost: self.network_cost + other.network_cost,
        }
    }
}

/// Component-wise sum of source costs. Memory sums too: sibling subplans
/// run concurrently.
fn sum_sources(sources: &[PlanCostEstimate]) -> PlanCostEstimate {
    let mut total = PlanCostEstimate::zero();
    for source in sources {
        total.cpu_cost = total.cpu_cost + source.cpu_cost;
        total.max_memory = total.max_memory + source.max_memory;
        total.max_memory_when_outputting =
            total.max_memory_when_outputting + source.max_memory_when_outputting;
        total.network_cost = total.network_cost + source.network_cost;
    }
    total
}

/// Operator that produces output while still consuming input. Its memory
/// stays held while the sources are outputting.
fn cost_streaming(sources: &[PlanCostEstimate], local: LocalCostEstimate) -> PlanCostEstimate {
    let sources = sum_sources(sources);
    PlanCostEstimate {
        cpu_cost: sources.cpu_cost + local.cpu_cost,
        max_memory: sources
            .max_memory
            .max(local.max_memory + sources.max_memory_when_outputting),
        max_memory_when_outputting: local.max_memory + sources.max_memory_when_outputting,
        network_cost: sources.network_cost + local.network_cost,
    }
}

/// Operator that consumes its whole input before producing any output
/// (aggregation, sort). Once it outputs, the sources have finished and
/// released their memory.
fn cost_accumulating(
    sources: &[PlanCostEstimate],
    local: LocalCostEstimate,
) -> PlanCostEstimate {
    let sources = sum_sources(sources);
    PlanCostEstimate {
        cpu_cost: sources.cpu_cost + local.cpu_cost,
        max_memory: sources
            .max_memory
            .max(local.max_memory + sources.max_memory_when_outputting),
        max_memory_when_outputting: local.max_memory,
        network_cost: sources.network_cost + local.network_cost,
    }
}

/// Hash join: the build side is fully consumed first, then held while
/// the probe side streams through.
fn cost_lookup_join(
    probe: PlanCostEstimate,
    build: PlanCostEstimate,
    local: LocalCostEstimate,
) -> PlanCostEstimate {
    let max_memory = (probe.max_memory + build.max_memory)
        .max(probe.max_memory + build.max_memory_when_outputting + local.max_memory)
        .max(
            probe.max_memory_when_outputting
                + build.max_memory_when_outputting
                + local.max_memory,
        );
    PlanCostEstimate {
        cpu_cost: probe.cpu_cost + build.cpu_cost + local.cpu_cost,
        max_memory,
        max_memory_when_outputting: probe.max_memory_when_outputting
            + build.max_memory_when_outputting
            + local.max_memory,
        network_cost: probe.network_cost + build.network_cost + local.network_cost,
    }
}

/// Hash repartition across nodes: every byte is hashed and serialized
/// (CPU) and crosses the network once.
pub(crate) fn remote_repartition_cost(data_size: Estimate) -> LocalCostEstimate {
    LocalCostEstimate::of(data_size, Estimate::zero(), data_size)
}

/// Gather to a single node: network only.
pub(crate) fn remote_gather_cost(data_size: Estimate) -> LocalCostEstimate {
    LocalCostEstimate::of(Estimate::zero(), Estimate::zero(), data_size)
}

/// Broadcast to every node: the data crosses the network once per node.
pub(crate) fn remote_replicate_cost(data_size: Estimate, node_count: usize) -> LocalCostEstimate {
    LocalCostEstimate::of(
        Estimate::zero(),
        Estimate::zero(),
        data_size * node_count as f64,
    )
}

/// Repartition between local drivers: CPU only.
pub(crate) fn local_repartition_cost(data_size: Estimate) -> LocalCostEstimate {
    LocalCostEstimate::of(data_size, Estimate::zero(), Estimate::zero())
}

pub trait CostCalculator {
    /// Cumulative cost of `node`, given its output statistics, the
    /// statistics of its children and the children's cumulative costs,
    /// all in `children()` order.
    fn calculate_cost(
        &self,
        node: &PlanNode,
        node_stats: &PlanNodeStatsEstimate,
        source_stats: &[PlanNodeStatsEstimate],
        source_costs: &[PlanCostEstimate],
        types: &TypeMap,
    ) -> PlanCostEstimate;
}

fn output_size(node: &PlanNode, stats: &PlanNodeStatsEstimate, types: &TypeMap) -> Estimate {
    stats.output_size_in_bytes(&node.output_symbols(), types)
}

fn input_size(
    node: &PlanNode,
    source_stats: &[PlanNodeStatsEstimate],
    index: usize,
    types: &TypeMap,
) -> Estimate {
    match (node.children().get(index), source_stats.get(index)) {
        (Some(child), Some(stats)) => stats.output_size_in_bytes(&child.output_symbols(), types),
        _ => Estimate::Unknown,
    }
}

/// An arity mismatch is a caller error; the cost trait has no error
/// channel, so it degrades to unknown instead of panicking.
fn source_cost(source_costs: &[PlanCostEstimate], index: usize) -> PlanCostEstimate {
    source_costs
        .get(index)
        .copied()
        .unwrap_or_else(PlanCostEstimate::unknown)
}

/// Local cost of the join operator itself: stream the probe side, build
/// and hold a hash table of the build side. A replicated build is held
/// once per node.
fn join_local_cost(
    probe_size: Estimate,
    build_size: Estimate,
    distribution: JoinDistribution,
    node_count: usize,
) -> LocalCostEstimate {
    let build_multiplier = match distribution {
        JoinDistribution::Partitioned => 1.0,
        JoinDistribution::Replicated => node_count as f64,
    };
    let held_build = build_size * build_multiplier;
    LocalCostEstimate::of(probe_size + held_build, held_build, Estimate::zero())
}

/// Shared per-operator costing for everything that does not involve
/// exchanges; the two calculators differ only in how data movement is
/// accounted.
fn calculate_non_exchange_cost(
    node: &PlanNode,
    node_stats: &PlanNodeStatsEstimate,
    source_stats: &[PlanNodeStatsEstimate],
    source_costs: &[PlanCostEstimate],
    types: &TypeMap,
    config: &CostEstimatorConfig,
    estimated_exchanges: impl FnOnce() -> LocalCostEstimate,
) -> PlanCostEstimate {
    match node {
        PlanNode::TableScan { .. } => {
            let local = LocalCostEstimate::of(
                output_size(node, node_stats, types),
                Estimate::zero(),
                Estimate::zero(),
            );
            cost_streaming(source_costs, local)
        }
        PlanNode::Filter { .. } | PlanNode::Project { .. } => {
            let local = LocalCostEstimate::of(
                input_size(node, source_stats, 0, types),
                Estimate::zero(),
                Estimate::zero(),
            );
            cost_streaming(source_costs, local)
        }
        PlanNode::Join { distribution, .. } => {
            let probe_size = input_size(node, source_stats, 0, types);
            let build_size = input_size(node, source_stats, 1, types);
            let local = join_local_cost(
                probe_size,
                build_size,
                *distribution,
                config.cluster_node_count,
            )
            .add(estimated_exchanges());
            cost_lookup_join(source_cost(source_costs, 0), source_cost(source_costs, 1), local)
        }
        PlanNode::SemiJoin { .. } => {
            let probe_size = input_size(node, source_stats, 0, types);
            let build_size = input_size(node, source_stats, 1, types);
            let local = join_local_cost(
                probe_size,
                build_size,
                JoinDistribution::Partitioned,
                config.cluster_node_count,
            )
            .add(estimated_exchanges());
            cost_lookup_join(source_cost(source_costs, 0), source_cost(source_costs, 1), local)
        }
        PlanNode::Aggregate { .. } => {
            let local = LocalCostEstimate::of(
                input_size(node, source_stats, 0, types),
                output_size(node, node_stats, types),
                Estimate::zero(),
            )
            .add(estimated_exchanges());
            cost_accumulating(source_costs, local)
        }
        PlanNode::Union { .. } => {
            cost_streaming(source_costs, estimated_exchanges())
        }
        PlanNode::Limit { .. } => {
            let local = LocalCostEstimate::of(
                output_size(node, node_stats, types),
                Estimate::zero(),
                Estimate::zero(),
            );
            cost_streaming(source_costs, local)
        }
        PlanNode::TopN { .. } => {
            let local = LocalCostEstimate::of(
                input_size(node, source_stats, 0, types),
                output_size(node, node_stats, types),
                Estimate::zero(),
            );
            cost_accumulating(source_costs, local)
        }
        PlanNode::Sort { .. } => {
            let size = input_size(node, source_stats, 0, types);
            let local = LocalCostEstimate::of(size, size, Estimate::zero());
            cost_accumulating(source_costs, local)
        }
        PlanNode::Exchange { .. } => {
            // handled by the caller
            cost_streaming(source_costs, LocalCostEstimate::zero())
        }
    }
}

/// Costs plans whose data movement is explicit `Exchange` nodes.
pub struct CostCalculatorUsingExchanges {
    config: CostEstimatorConfig,
}

impl CostCalculatorUsingExchanges {
    pub fn new(config: CostEstimatorConfig) -> Self {
        Self { config }
    }
}

impl CostCalculator for CostCalculatorUsingExchanges {
    fn calculate_cost(
        &self,
        node: &PlanNode,
        node_stats: &PlanNodeStatsEstimate,
        source_stats: &[PlanNodeStatsEstimate],
        source_costs: &[PlanCostEstimate],
        types: &TypeMap,
    ) -> PlanCostEstimate {
        if let PlanNode::Exchange { scope, kind, .. } = node {
            let size = input_size(node, source_stats, 0, types);
            let local = match (scope, kind) {
                (ExchangeScope::Remote, ExchangeKind::Repartition) => {
                    remote_repartition_cost(size)
                }
                (ExchangeScope::Remote, ExchangeKind::Gather) => remote_gather_cost(size),
                (ExchangeScope::Remote, ExchangeKind::Replicate) => {
                    remote_replicate_cost(size, self.config.cluster_node_count)
                }
                (ExchangeScope::Local, _) => local_repartition_cost(size),
            };
            return cost_streaming(source_costs, local);
        }
        calculate_non_exchange_cost(
            node,
            node_stats,
            source_stats,
            source_costs,
            types,
            &self.config,
            LocalCostEstimate::zero,
        )
    }
}

/// Costs logical plans by estimating the exchanges the distributed form
/// would need.
pub struct CostCalculatorWithEstimatedExchanges {
    config: CostEstimatorConfig,
}

impl CostCalculatorWithEstimatedExchanges {
    pub fn new(config: CostEstimatorConfig) -> Self {
        Self { config }
    }
}

impl CostCalculator for CostCalculatorWithEstimatedExchanges {
    fn calculate_cost(
        &self,
        node: &PlanNode,
        node_stats: &PlanNodeStatsEstimate,
        source_stats: &[PlanNodeStatsEstimate],
        source_costs: &[PlanCostEstimate],
        types: &TypeMap,
    ) -> PlanCostEstimate {
        let estimated_exchanges = || match node {
            PlanNode::Join { distribution, .. } => {
                let probe_size = input_size(node, source_stats, 0, types);
                let build_size = input_size(node, source_stats, 1, types);
                match distribution {
                    JoinDistribution::Partitioned => remote_repartition_cost(probe_size)
                        .add(remote_repartition_cost(build_size))
                        .add(local_repartition_cost(build_size)),
                    JoinDistribution::Replicated => remote_replicate_cost(
                        build_size,
                        self.config.cluster_node_count,
                    )
                    .add(local_repartition_cost(build_size)),
                }
            }
            PlanNode::SemiJoin { .. } => {
                let probe_size = input_size(node, source_stats, 0, types);
                let build_size = input_size(node, source_stats, 1, types);
                remote_repartition_cost(probe_size)
                    .add(remote_repartition_cost(build_size))
                    .add(local_repartition_cost(build_size))
            }
            PlanNode::Aggregate { group_by, .. } if !group_by.is_empty() => {
                let size = input_size(node, source_stats, 0, types);
                remote_repartition_cost(size).add(local_repartition_cost(size))
            }
            PlanNode::Aggregate { .. } => {
                // global aggregation gathers everything to one node
                remote_gather_cost(input_size(node, source_stats, 0, types))
            }
            PlanNode::Union { .. } => {
                let mut total = Estimate::zero();
                for index in 0..node.children().len() {
                    total = total + input_size(node, source_stats, index, types);
                }
                remote_gather_cost(total)
            }
            _ => LocalCostEstimate::zero(),
        };
        calculate_non_exchange_cost(
            node,
            node_stats,
            source_stats,
            source_costs,
            types,
            &self.config,
            estimated_exchanges,
        )
    }
}
