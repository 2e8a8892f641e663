//! Construction plans
//!
//! A construction plan describes how one instance is built before anything is executed.
//! Plans are trees over three node shapes: calls to function objects, calls to the constructor
//! of an implementation type, and constants. The host builds a plan for each registration,
//! lets subscribers rewrite it (see [crate::PlanCompiled]) and evaluates it on each request.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::resolve::{Resolver, Result};
use crate::types::{Instance, ServiceType};

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token of a [Function], shared by all its clones
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(u64);

type FunctionBody = dyn Fn(&dyn Resolver, &[Instance]) -> Result<Instance> + Send + Sync;

/// Build an implementation instance from its evaluated constructor arguments
pub type Activator = Arc<dyn Fn(Vec<Instance>) -> Result<Instance> + Send + Sync>;

/// A function object which can be invoked from a plan.
///
/// Functions are compared by identity: each call to [Function::new] creates a new
/// [FunctionId], clones keep it.
#[derive(Clone)]
pub struct Function {
    id: FunctionId,
    name: Cow<'static, str>,
    body: Arc<FunctionBody>,
}

impl Function {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, body: F) -> Self
    where
        F: Fn(&dyn Resolver, &[Instance]) -> Result<Instance> + Send + Sync + 'static,
    {
        Self {
            id: FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, resolver: &dyn Resolver, arguments: &[Instance]) -> Result<Instance> {
        (self.body)(resolver, arguments)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// Node of a construction plan
#[derive(Clone)]
pub enum PlanNode {
    /// Invoke a function object with the values of the argument nodes
    Invoke {
        function: Function,
        arguments: Vec<PlanNode>,
    },
    /// Call the constructor of an implementation type
    Construct {
        implementation: ServiceType,
        activator: Activator,
        arguments: Vec<PlanNode>,
    },
    Constant(Instance),
}

impl PlanNode {
    pub fn constant<T: Send + Sync + 'static>(value: T) -> Self {
        PlanNode::Constant(Arc::new(value))
    }

    pub fn invoke(function: Function, arguments: Vec<PlanNode>) -> Self {
        PlanNode::Invoke {
            function,
            arguments,
        }
    }

    /// Execute the plan.
    pub fn evaluate(&self, resolver: &dyn Resolver) -> Result<Instance> {
        match self {
            PlanNode::Invoke {
                function,
                arguments,
            } => {
                let arguments = evaluate_all(arguments, resolver)?;
                function.call(resolver, &arguments)
            }
            PlanNode::Construct {
                activator,
                arguments,
                ..
            } => activator(evaluate_all(arguments, resolver)?),
            PlanNode::Constant(value) => Ok(value.clone()),
        }
    }

    /// Check if the plan contains a call to the given function.
    pub fn invokes(&self, function: FunctionId) -> bool {
        match self {
            PlanNode::Invoke {
                function: f,
                arguments,
            } => f.id() == function || arguments.iter().any(|a| a.invokes(function)),
            PlanNode::Construct { arguments, .. } => arguments.iter().any(|a| a.invokes(function)),
            PlanNode::Constant(_) => false,
        }
    }
}

fn evaluate_all(nodes: &[PlanNode], resolver: &dyn Resolver) -> Result<Vec<Instance>> {
    nodes.iter().map(|node| node.evaluate(resolver)).collect()
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::Invoke {
                function,
                arguments,
            } => {
                write!(f, "{function:?}")?;
                f.debug_list().entries(arguments).finish()
            }
            PlanNode::Construct {
                implementation,
                arguments,
                ..
            } => {
                write!(f, "new {implementation}")?;
                f.debug_list().entries(arguments).finish()
            }
            PlanNode::Constant(_) => f.write_str("constant"),
        }
    }
}

/// The node whose argument list contains the visited node
#[derive(Clone, Copy, Debug)]
pub enum Enclosing<'a> {
    /// The visited node is the root of the plan
    Root,
    Invoke(&'a Function),
    Construct(&'a ServiceType),
}

/// Rewrite a plan node by node.
///
/// All methods default to an identity rewrite: implementors override the node shapes they are
/// interested in and call the `walk_*` functions to keep visiting the arguments.
pub trait PlanVisitor {
    fn visit(&mut self, node: PlanNode, enclosing: Enclosing<'_>) -> PlanNode {
        match node {
            PlanNode::Invoke {
                function,
                arguments,
            } => self.visit_invoke(function, arguments, enclosing),
            PlanNode::Construct {
                implementation,
                activator,
                arguments,
            } => self.visit_construct(implementation, activator, arguments, enclosing),
            PlanNode::Constant(value) => self.visit_constant(value, enclosing),
        }
    }

    fn visit_invoke(
        &mut self,
        function: Function,
        arguments: Vec<PlanNode>,
        _enclosing: Enclosing<'_>,
    ) -> PlanNode {
        walk_invoke(self, function, arguments)
    }

    fn visit_construct(
        &mut self,
        implementation: ServiceType,
        activator: Activator,
        arguments: Vec<PlanNode>,
        _enclosing: Enclosing<'_>,
    ) -> PlanNode {
        walk_construct(self, implementation, activator, arguments)
    }

    fn visit_constant(&mut self, value: Instance, _enclosing: Enclosing<'_>) -> PlanNode {
        PlanNode::Constant(value)
    }
}

/// Visit the arguments of a call and rebuild it.
pub fn walk_invoke<V: PlanVisitor + ?Sized>(
    visitor: &mut V,
    function: Function,
    arguments: Vec<PlanNode>,
) -> PlanNode {
    let arguments = arguments
        .into_iter()
        .map(|argument| visitor.visit(argument, Enclosing::Invoke(&function)))
        .collect();
    PlanNode::Invoke {
        function,
        arguments,
    }
}

/// Visit the arguments of a constructor call and rebuild it.
pub fn walk_construct<V: PlanVisitor + ?Sized>(
    visitor: &mut V,
    implementation: ServiceType,
    activator: Activator,
    arguments: Vec<PlanNode>,
) -> PlanNode {
    let arguments = arguments
        .into_iter()
        .map(|argument| visitor.visit(argument, Enclosing::Construct(&implementation)))
        .collect();
    PlanNode::Construct {
        implementation,
        activator,
        arguments,
    }
}
