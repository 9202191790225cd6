use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backends::stub::{FailingMarketData, FailingResolver, NoMarketData, PanickingResolver};
use crate::backends::{FunctionDefinition, FunctionRepository, StaticMarketData, MARKET_DATA_FUNCTION};
use crate::config::BuilderOptions;
use crate::engine::{DependencyGraphBuilder, TokioSpawner};
use crate::errors::{BuildError, CollaboratorError};
use crate::model::{Requirement, Specification};
use crate::traits::{Candidate, CompilationContext, FunctionResolver, MarketDataAvailability};

/// Integration tests for the dependency graph builder using in-memory collaborators
#[cfg(test)]
mod tests {
    use super::*;

    fn options(threads: usize) -> BuilderOptions {
        BuilderOptions {
            max_additional_threads: Some(threads),
            ..BuilderOptions::default()
        }
    }

    fn builder_with(
        resolver: impl FunctionResolver + 'static,
        market_data: impl MarketDataAvailability + 'static,
        threads: usize,
    ) -> DependencyGraphBuilder {
        DependencyGraphBuilder::new(Arc::new(resolver), Arc::new(market_data), &options(threads))
    }

    fn requirement(value_name: &str) -> Requirement {
        Requirement::new(value_name, "T")
    }

    /// Delegates to a repository after sleeping, to keep jobs busy.
    struct SlowResolver {
        inner: FunctionRepository,
        delay: Duration,
    }

    impl FunctionResolver for SlowResolver {
        fn resolve_candidates(
            &self,
            requirement: &Requirement,
            context: &CompilationContext<'_>,
        ) -> Result<Vec<Candidate>, CollaboratorError> {
            std::thread::sleep(self.delay);
            self.inner.resolve_candidates(requirement, context)
        }
    }

    /// Counts lookups per value name.
    struct CountingResolver {
        inner: FunctionRepository,
        lookups: Arc<AtomicUsize>,
        counted: &'static str,
    }

    impl FunctionResolver for CountingResolver {
        fn resolve_candidates(
            &self,
            requirement: &Requirement,
            context: &CompilationContext<'_>,
        ) -> Result<Vec<Candidate>, CollaboratorError> {
            if requirement.value_name == self.counted {
                self.lookups.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.resolve_candidates(requirement, context)
        }
    }

    /// Panics when asked for one value name.
    struct PanicsOnValue {
        inner: FunctionRepository,
        value_name: &'static str,
    }

    impl FunctionResolver for PanicsOnValue {
        fn resolve_candidates(
            &self,
            requirement: &Requirement,
            context: &CompilationContext<'_>,
        ) -> Result<Vec<Candidate>, CollaboratorError> {
            if requirement.value_name == self.value_name {
                panic!("no catalogue for {}", self.value_name);
            }
            self.inner.resolve_candidates(requirement, context)
        }
    }

    /// A and B can each be derived from the other, optionally with a direct
    /// lower priority alternative.
    fn mutually_derivable(with_direct: bool) -> FunctionRepository {
        let mut functions = FunctionRepository::new();
        functions
            .add(FunctionDefinition::new("a_from_b", "A", 10).with_input("B"))
            .add(FunctionDefinition::new("b_from_a", "B", 10).with_input("A"));
        if with_direct {
            functions.register("a_direct", "A", 0).register("b_direct", "B", 0);
        }
        functions
    }

    /// A portfolio of swaps sharing curves, with lower priority alternatives
    /// that are never needed.
    fn portfolio() -> (FunctionRepository, StaticMarketData, Vec<Requirement>) {
        let mut functions = FunctionRepository::new();
        functions
            .add(
                FunctionDefinition::new("pv_discounting", "PV", 10)
                    .with_input("DiscountCurve")
                    .with_input("ForwardCurve"),
            )
            .add(FunctionDefinition::new("pv_par_rate", "PV", 0).with_input("ParRate"))
            .add(FunctionDefinition::new("discount_curve", "DiscountCurve", 0).with_input("Rates"))
            .add(FunctionDefinition::new("forward_curve", "ForwardCurve", 0).with_input("DiscountCurve"))
            .add(FunctionDefinition::new("delta", "Delta", 0).with_input("PV").with_input("DiscountCurve"))
            .add(FunctionDefinition::new("gamma", "Gamma", 0).with_input("Delta"));

        let mut market_data = StaticMarketData::new();
        let mut targets = Vec::new();
        for index in 0..20 {
            let target = format!("SWAP-{}", index);
            market_data.provide("Rates", target.as_str());
            targets.push(Requirement::new("PV", target.as_str()));
            targets.push(Requirement::new("Gamma", target.as_str()));
        }
        targets.push(Requirement::new("Vega", "SWAP-0"));
        (functions, market_data, targets)
    }

    #[test]
    fn test_simple_chain_resolves() {
        let mut functions = FunctionRepository::new();
        functions
            .add(FunctionDefinition::new("pv", "PV", 0).with_input("Spot"))
            .register("spot", "Spot", 0);
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_target(requirement("PV"));
        let graph = builder.get_graph().unwrap();

        assert_eq!(
            graph.terminal_outputs()[&requirement("PV")],
            Specification::new("PV", "T", "pv")
        );
        assert_eq!(graph.node_count(), 2);
        let pv = graph.producer_of(&Specification::new("PV", "T", "pv")).unwrap();
        assert!(pv.inputs.contains(&Specification::new("Spot", "T", "spot")));
        assert!(builder.exceptions().is_empty());
    }

    #[test]
    fn test_higher_priority_candidate_wins() {
        let mut functions = FunctionRepository::new();
        functions
            .register("first_registered", "PV", 0)
            .register("preferred", "PV", 5)
            .register("also_zero", "PV", 0);
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_target(requirement("PV"));
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs()[&requirement("PV")].function.as_str(), "preferred");
    }

    #[test]
    fn test_equal_priorities_keep_registration_order() {
        let mut functions = FunctionRepository::new();
        functions.register("first", "PV", 1).register("second", "PV", 1);
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_target(requirement("PV"));

        let mapping = builder.get_graph().map(|_| builder.value_requirement_mapping()).unwrap();
        assert_eq!(mapping[&requirement("PV")].function.as_str(), "first");
    }

    #[test]
    fn test_same_target_from_many_threads_creates_one_task() {
        let mut functions = FunctionRepository::new();
        functions.register("pv", "PV", 0);
        let builder = builder_with(functions, NoMarketData, 4);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = builder.clone();
                std::thread::spawn(move || builder.add_target(requirement("PV")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let graph = builder.get_graph().unwrap();

        assert_eq!(builder.resolving_task_count(&requirement("PV")), 1);
        assert_eq!(graph.terminal_outputs().len(), 1);
    }

    #[test]
    fn test_shared_requirement_is_resolved_once() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let mut inner = FunctionRepository::new();
        inner
            .add(FunctionDefinition::new("a", "A", 0).with_input("C"))
            .add(FunctionDefinition::new("b", "B", 0).with_input("C"))
            .register("c", "C", 0);
        let resolver = CountingResolver {
            inner,
            lookups: Arc::clone(&lookups),
            counted: "C",
        };
        let builder = builder_with(resolver, NoMarketData, 0);

        builder.add_targets([requirement("A"), requirement("B")]);
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs().len(), 2);
        assert_eq!(builder.resolving_task_count(&requirement("C")), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        // A, B and the shared C.
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_requirement_loop_is_rejected_and_alternative_used() {
        let mut functions = FunctionRepository::new();
        functions
            .add(FunctionDefinition::new("a_from_b", "A", 0).with_input("B"))
            .add(FunctionDefinition::new("b_from_a", "B", 10).with_input("A"))
            .register("b_direct", "B", 0);
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_target(requirement("A"));
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs()[&requirement("A")].function.as_str(), "a_from_b");
        let functions: HashSet<&str> = graph.nodes().iter().map(|node| node.function.as_str()).collect();
        assert_eq!(functions, HashSet::from(["a_from_b", "b_direct"]));
    }

    #[test]
    fn test_pure_cycle_terminates_unresolved() {
        let mut functions = FunctionRepository::new();
        functions
            .add(FunctionDefinition::new("c_from_d", "C", 0).with_input("D"))
            .add(FunctionDefinition::new("d_from_c", "D", 0).with_input("C"));

        for threads in [0, 4] {
            let builder = builder_with(functions.clone(), NoMarketData, threads);
            builder.add_target(requirement("C"));

            let graph = builder.get_graph().unwrap();

            assert!(graph.is_empty());
            assert!(graph.terminal_outputs().is_empty());
            assert!(builder.unresolved_requirements().contains(&requirement("C")));
        }
    }

    #[test]
    fn test_fallback_resolves_shared_requirement_for_second_dependent() {
        // S is first resolved under P1, where its only input (P1) is a loop.
        // P2 shares that task and must fall back to resolving S itself.
        let mut functions = FunctionRepository::new();
        functions
            .add(FunctionDefinition::new("p1_from_s", "P1", 10).with_input("S"))
            .register("p1_direct", "P1", 0)
            .add(FunctionDefinition::new("s_from_p1", "S", 0).with_input("P1"))
            .add(FunctionDefinition::new("p2_from_s", "P2", 0).with_input("S"));
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_targets([requirement("P1"), requirement("P2")]);
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs()[&requirement("P1")].function.as_str(), "p1_direct");
        assert_eq!(graph.terminal_outputs()[&requirement("P2")].function.as_str(), "p2_from_s");
        let s = graph.producer_of(&Specification::new("S", "T", "s_from_p1")).unwrap();
        assert!(s.inputs.contains(&Specification::new("P1", "T", "p1_direct")));
        assert_eq!(builder.resolving_task_count(&requirement("S")), 2);
        assert!(builder.unresolved_requirements().is_empty());
    }

    #[test]
    fn test_shared_input_with_dead_end_constraint_on_one_root() {
        // Both roots need Curve. The root that also admits an exotic model
        // tries it first and dead-ends on a volatility input nothing
        // produces, then settles on the specification the other root picks.
        let mut functions = FunctionRepository::new();
        functions
            .add(
                FunctionDefinition::new("pv_exotic", "PV", 20)
                    .with_property("Model", "Exotic")
                    .with_input("Curve")
                    .with_input("ExoticVol"),
            )
            .add(
                FunctionDefinition::new("pv_standard", "PV", 10)
                    .with_property("Model", "Standard")
                    .with_input("Curve"),
            )
            .add(FunctionDefinition::new("curve", "Curve", 0).with_input("Rates"));
        let mut market_data = StaticMarketData::new();
        market_data.provide("Rates", "T");
        let either_model = requirement("PV").with_constraint("Model", ["Exotic", "Standard"]);
        let standard_only = requirement("PV").with_constraint("Model", ["Standard"]);
        let standard = Specification::new("PV", "T", "pv_standard").with_property("Model", "Standard");

        for threads in [0, 4] {
            let builder = builder_with(functions.clone(), market_data.clone(), threads);

            builder.add_targets([either_model.clone(), standard_only.clone()]);
            let graph = builder.get_graph().unwrap();

            assert_eq!(graph.terminal_outputs()[&either_model], standard, "threads={}", threads);
            assert_eq!(graph.terminal_outputs()[&standard_only], standard, "threads={}", threads);
            assert!(builder.unresolved_requirements().is_empty());
            assert_eq!(builder.producing_task_count(&standard), 1);
            let pv = graph.producer_of(&standard).unwrap();
            assert!(pv.inputs.contains(&Specification::new("Curve", "T", "curve")));
            assert_eq!(
                graph
                    .nodes()
                    .iter()
                    .filter(|node| node.function.as_str() == "curve")
                    .count(),
                1
            );
        }
    }

    #[test]
    fn test_mutually_derivable_targets_both_resolve() {
        for threads in [0, 4] {
            let builder = builder_with(mutually_derivable(true), NoMarketData, threads);

            builder.add_targets([requirement("A"), requirement("B")]);
            let graph = builder.get_graph().unwrap();

            assert_eq!(graph.terminal_outputs().len(), 2, "threads={}", threads);
            assert_eq!(builder.value_requirement_mapping().len(), 2);
            assert!(builder.unresolved_requirements().is_empty());
        }
    }

    #[test]
    fn test_mutually_derivable_targets_keep_preferred_derivation() {
        let builder = builder_with(mutually_derivable(true), NoMarketData, 0);

        builder.add_targets([requirement("A"), requirement("B")]);
        let graph = builder.get_graph().unwrap();

        // The newer task gives up waiting and settles for its direct
        // alternative, which lets the older one finish its preferred path.
        assert_eq!(graph.terminal_outputs()[&requirement("A")].function.as_str(), "a_from_b");
        assert_eq!(graph.terminal_outputs()[&requirement("B")].function.as_str(), "b_direct");
        let a = graph.producer_of(&Specification::new("A", "T", "a_from_b")).unwrap();
        assert!(a.inputs.contains(&Specification::new("B", "T", "b_direct")));
    }

    #[test]
    fn test_mutually_derivable_targets_without_alternatives_are_unresolved() {
        for threads in [0, 4] {
            let builder = builder_with(mutually_derivable(false), NoMarketData, threads);

            builder.add_targets([requirement("A"), requirement("B")]);
            let graph = builder.get_graph().unwrap();

            assert!(graph.is_empty(), "threads={}", threads);
            assert_eq!(
                builder.unresolved_requirements().into_iter().collect::<Vec<_>>(),
                vec![requirement("A"), requirement("B")]
            );
        }
    }

    #[test]
    fn test_mutually_derivable_sync_target_resolves() {
        let builder = builder_with(mutually_derivable(true), NoMarketData, 0);
        builder.add_target(requirement("A"));

        let specification = builder.add_target_sync(requirement("B")).unwrap();

        assert_eq!(specification.value_name, "B");
        assert_eq!(builder.get_graph().unwrap().terminal_outputs().len(), 2);
    }

    #[test]
    fn test_requirement_without_candidates_fails() {
        let mut functions = FunctionRepository::new();
        functions.add(FunctionDefinition::new("pv", "PV", 0).with_input("Missing"));
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_targets([requirement("PV"), requirement("Missing")]);
        let graph = builder.get_graph().unwrap();

        assert!(graph.terminal_outputs().is_empty());
        assert_eq!(
            builder.unresolved_requirements().into_iter().collect::<Vec<_>>(),
            vec![requirement("Missing"), requirement("PV")]
        );
    }

    #[test]
    fn test_add_target_sync_reports_unsatisfiable() {
        let builder = builder_with(FunctionRepository::new(), NoMarketData, 0);

        let result = builder.add_target_sync(requirement("PV"));

        assert_eq!(result, Err(BuildError::Unsatisfiable(requirement("PV"))));
        assert_eq!(result.unwrap_err().to_string(), "could not resolve PV[T]");
    }

    #[test]
    fn test_add_target_sync_returns_specification() {
        let mut functions = FunctionRepository::new();
        functions.add(FunctionDefinition::new("pv", "PV", 0).with_input("Spot"));
        let mut market_data = StaticMarketData::new();
        market_data.provide("Spot", "T");

        for threads in [0, 2] {
            let builder = builder_with(functions.clone(), market_data.clone(), threads);

            let specification = builder.add_target_sync(requirement("PV")).unwrap();

            assert_eq!(specification, Specification::new("PV", "T", "pv"));
            let graph = builder.get_graph().unwrap();
            assert_eq!(graph.terminal_outputs()[&requirement("PV")], specification);
        }
    }

    #[test]
    fn test_thread_count_does_not_change_graph() {
        let graphs: Vec<_> = [0, 1, 8]
            .into_iter()
            .map(|threads| {
                let (functions, market_data, targets) = portfolio();
                let builder = builder_with(functions, market_data, threads);
                builder.add_targets(targets);
                builder.get_graph().unwrap()
            })
            .collect();

        assert_eq!(graphs[0].terminal_outputs().len(), 40);
        assert_eq!(graphs[0], graphs[1]);
        assert_eq!(graphs[0], graphs[2]);
    }

    #[test]
    fn test_targets_added_during_build_are_included() {
        let (functions, market_data, targets) = portfolio();
        let builder = builder_with(functions, market_data, 4);
        let (first, second) = targets.split_at(targets.len() / 2);

        builder.add_targets(first.to_vec());
        builder.add_targets(second.to_vec());
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs().len(), 40);
        assert!(builder
            .unresolved_requirements()
            .contains(&Requirement::new("Vega", "SWAP-0")));
    }

    #[test]
    fn test_cancelled_build_resumes_to_same_graph() {
        let uninterrupted = {
            let (functions, market_data, targets) = portfolio();
            let builder = builder_with(functions, market_data, 2);
            builder.add_targets(targets);
            builder.get_graph().unwrap()
        };

        let (functions, market_data, targets) = portfolio();
        let builder = builder_with(functions, market_data, 2);
        builder.add_targets(targets);
        builder.cancel_active_build();
        assert_eq!(builder.max_additional_threads(), 0);

        builder.set_max_additional_threads(2);
        let resumed = builder.get_graph_blocking(true).unwrap();

        assert_eq!(resumed, uninterrupted);
    }

    #[test]
    fn test_cancel_interrupts_blocked_caller() {
        let mut inner = FunctionRepository::new();
        for level in 0..20 {
            inner.add(
                FunctionDefinition::new(format!("f{}", level), format!("V{}", level), 0)
                    .with_input(format!("V{}", level + 1)),
            );
        }
        let resolver = SlowResolver {
            inner,
            delay: Duration::from_millis(50),
        };
        let builder = builder_with(resolver, NoMarketData, 1);
        builder.add_target(requirement("V0"));

        let waiter = {
            let builder = builder.clone();
            std::thread::spawn(move || builder.get_graph_blocking(true))
        };
        std::thread::sleep(Duration::from_millis(100));
        builder.cancel_active_build();

        assert_eq!(waiter.join().unwrap(), Err(BuildError::Cancelled));
    }

    #[test]
    fn test_non_blocking_retrieval_reports_incomplete() {
        let mut inner = FunctionRepository::new();
        inner.register("pv", "PV", 0);
        let resolver = SlowResolver {
            inner,
            delay: Duration::from_millis(300),
        };
        let builder = builder_with(resolver, NoMarketData, 1);
        builder.add_target(requirement("PV"));

        // Give the background job time to take the only item.
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(builder.get_graph_blocking(false), Err(BuildError::Incomplete));
        assert!(builder.get_graph_blocking(true).is_ok());
    }

    #[test]
    fn test_identical_collaborator_errors_are_counted() {
        let builder = builder_with(FailingResolver::new("catalogue offline"), NoMarketData, 4);

        let handles: Vec<_> = (0..50)
            .map(|index| {
                let builder = builder.clone();
                std::thread::spawn(move || builder.add_target(Requirement::new("PV", format!("SWAP-{}", index))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        builder.get_graph().unwrap();

        let exceptions = builder.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[&CollaboratorError::function("pv", "catalogue offline")], 50);
        assert_eq!(builder.unresolved_requirements().len(), 50);
    }

    #[test]
    fn test_market_data_errors_do_not_stop_resolution() {
        let mut functions = FunctionRepository::new();
        functions.register("pv", "PV", 0);
        let builder = builder_with(functions, FailingMarketData, 0);

        builder.add_target(requirement("PV"));
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs().len(), 1);
        assert_eq!(builder.exceptions()[&CollaboratorError::market_data("feed unavailable")], 1);
    }

    #[test]
    fn test_panicking_resolver_is_recorded() {
        let builder = builder_with(PanickingResolver { message: "resolver bug" }, NoMarketData, 0);

        builder.add_target(requirement("PV"));
        let graph = builder.get_graph().unwrap();

        assert!(graph.is_empty());
        assert!(builder.unresolved_requirements().contains(&requirement("PV")));
        assert_eq!(
            builder.exceptions()[&CollaboratorError::Panicked {
                message: "resolver bug".to_string()
            }],
            1
        );
    }

    #[test]
    fn test_panic_on_input_falls_back_to_next_candidate() {
        let mut inner = FunctionRepository::new();
        inner
            .add(FunctionDefinition::new("pv_from_x", "PV", 10).with_input("X"))
            .register("pv_direct", "PV", 0);

        for threads in [0, 2] {
            let resolver = PanicsOnValue {
                inner: inner.clone(),
                value_name: "X",
            };
            let builder = builder_with(resolver, NoMarketData, threads);

            builder.add_target(requirement("PV"));
            let graph = builder.get_graph().unwrap();

            assert_eq!(
                graph.terminal_outputs()[&requirement("PV")].function.as_str(),
                "pv_direct",
                "threads={}",
                threads
            );
            assert!(builder.unresolved_requirements().is_empty());
            assert_eq!(
                builder.exceptions()[&CollaboratorError::Panicked {
                    message: "no catalogue for X".to_string()
                }],
                1
            );
        }
    }

    #[test]
    fn test_market_data_short_circuits_functions() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let mut inner = FunctionRepository::new();
        inner
            .add(FunctionDefinition::new("pv", "PV", 0).with_input("Spot"))
            .register("spot_model", "Spot", 100);
        let resolver = CountingResolver {
            inner,
            lookups: Arc::clone(&lookups),
            counted: "Spot",
        };
        let mut market_data = StaticMarketData::new();
        market_data.provide("Spot", "T");
        let builder = builder_with(resolver, market_data, 0);

        builder.add_target(requirement("PV"));
        let graph = builder.get_graph().unwrap();

        let pv = graph.producer_of(&Specification::new("PV", "T", "pv")).unwrap();
        assert!(pv
            .inputs
            .contains(&Specification::new("Spot", "T", MARKET_DATA_FUNCTION)));
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_specification_is_derived_once() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let mut inner = FunctionRepository::new();
        inner
            .add(
                FunctionDefinition::new("pv", "PV", 0)
                    .with_property("Method", "Discounting")
                    .with_input("Curve"),
            )
            .register("curve", "Curve", 0);
        let resolver = CountingResolver {
            inner,
            lookups: Arc::clone(&lookups),
            counted: "Curve",
        };
        let builder = builder_with(resolver, NoMarketData, 0);
        let constrained = requirement("PV").with_constraint("Method", ["Discounting"]);

        builder.add_targets([requirement("PV"), constrained.clone()]);
        let graph = builder.get_graph().unwrap();

        let specification = Specification::new("PV", "T", "pv").with_property("Method", "Discounting");
        assert_eq!(graph.terminal_outputs()[&requirement("PV")], specification);
        assert_eq!(graph.terminal_outputs()[&constrained], specification);
        assert_eq!(builder.producing_task_count(&specification), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_deep_chain_does_not_overflow_stack() {
        let mut functions = FunctionRepository::new();
        let depth = 3_000;
        for level in 0..depth {
            functions.add(
                FunctionDefinition::new(format!("f{}", level), format!("V{}", level), 0)
                    .with_input(format!("V{}", level + 1)),
            );
        }
        functions.register("leaf", format!("V{}", depth), 0);
        let builder = builder_with(functions, NoMarketData, 0);

        builder.add_target(requirement("V0"));
        let graph = builder.get_graph().unwrap();

        assert_eq!(graph.terminal_outputs()[&requirement("V0")].function.as_str(), "f0");
        assert_eq!(graph.node_count(), depth + 1);
    }

    #[test]
    fn test_progress_estimate_reaches_one() {
        let (functions, market_data, targets) = portfolio();
        let builder = builder_with(functions, market_data, 0);

        assert_eq!(builder.estimate_build_fraction(), None);
        builder.add_targets(targets);
        let before = builder.estimate_build_fraction().unwrap();
        builder.get_graph().unwrap();

        assert!(before < 1.0);
        assert_eq!(builder.estimate_build_fraction(), Some(1.0));
        assert!(builder.task_count() > 0);
    }

    #[test]
    fn test_poll_graph_is_idempotent_at_fixed_point() {
        let (functions, market_data, targets) = portfolio();
        let builder = builder_with(functions, market_data, 2);
        builder.add_targets(targets);

        let graph = builder.get_graph().unwrap();

        assert_eq!(builder.poll_graph(), Some(graph.clone()));
        assert_eq!(builder.poll_graph(), Some(graph));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_spawner_builds_graph() {
        let (functions, market_data, targets) = portfolio();
        let builder = DependencyGraphBuilder::with_spawner(
            Arc::new(functions),
            Arc::new(market_data),
            &options(4),
            Arc::new(TokioSpawner::current()),
        );
        builder.add_targets(targets);

        let graph = tokio::task::spawn_blocking(move || builder.get_graph())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(graph.terminal_outputs().len(), 40);
    }
}
