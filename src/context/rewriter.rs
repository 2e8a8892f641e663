//! Substitution of root factory calls in construction plans
//!
//! A context-based registration is first registered with a root factory, which calls the
//! context factory with [DependencyContext::ROOT]. When the plan of another registration is
//! compiled, every call to that root factory is replaced by a call to the context function
//! with a context describing the consumer: the implementation type of the enclosing
//! constructor call, or the registered service type of the plan when the call is not a
//! constructor argument.

use tracing::{debug, trace};

use crate::context::DependencyContext;
use crate::plan::{walk_invoke, Enclosing, Function, FunctionId, PlanNode, PlanVisitor};
use crate::types::ServiceType;

struct ContextRewriter<'a> {
    registered_service: &'a ServiceType,
    dependency_service: &'a ServiceType,
    root_factory: FunctionId,
    context_function: &'a Function,
    rewrites: usize,
}

impl ContextRewriter<'_> {
    fn consumer(&self, enclosing: Enclosing<'_>) -> ServiceType {
        match enclosing {
            Enclosing::Construct(implementation) => implementation.clone(),
            Enclosing::Invoke(_) | Enclosing::Root => self.registered_service.clone(),
        }
    }
}

impl PlanVisitor for ContextRewriter<'_> {
    fn visit_invoke(
        &mut self,
        function: Function,
        arguments: Vec<PlanNode>,
        enclosing: Enclosing<'_>,
    ) -> PlanNode {
        if function.id() != self.root_factory {
            return walk_invoke(self, function, arguments);
        }

        let consumer = self.consumer(enclosing);
        trace!(
            service = %self.dependency_service,
            consumer = %consumer,
            "injecting dependency context"
        );
        self.rewrites += 1;
        let context = DependencyContext::new(
            self.registered_service.clone(),
            consumer,
            self.dependency_service,
        );
        PlanNode::invoke(self.context_function.clone(), vec![PlanNode::constant(context)])
    }
}

/// Replace the calls to a root factory in the plan compiled for a registered service.
///
/// Plans which never call the root factory are returned untouched.
pub(crate) fn rewrite_root_calls(
    plan: PlanNode,
    registered_service: &ServiceType,
    dependency_service: &ServiceType,
    root_factory: FunctionId,
    context_function: &Function,
) -> PlanNode {
    if !plan.invokes(root_factory) {
        return plan;
    }

    let mut rewriter = ContextRewriter {
        registered_service,
        dependency_service,
        root_factory,
        context_function,
        rewrites: 0,
    };
    let plan = rewriter.visit(plan, Enclosing::Root);
    debug!(
        service = %dependency_service,
        plan = %registered_service,
        rewrites = rewriter.rewrites,
        "rewrote root factory calls"
    );
    plan
}
