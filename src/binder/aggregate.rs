//! Aggregate descriptors and their evaluation-point computation.
//!
//! Descriptors live in an arena and refer to each other (containment) and to
//! scope regions (by stack index) through plain integer handles.

use tracing::debug;

use crate::error::{BindError, ErrorContext};
use crate::parser::ast::NodeId;

use super::expression::BoundExpression;

/// Handle of an aggregate descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateId(pub usize);

/// How names read inside a group key are projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// The key as computed from one input element.
    Key,
    /// The key as seen from a function aggregate's argument.
    Function,
    /// The key as seen from a GROUPPARTITION argument.
    Partition,
}

/// Kind of aggregate context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// Aggregate function call such as `MAX(x)`.
    Function,
    /// `GROUPPARTITION(x)`.
    GroupPartition,
    /// Conversion of a GROUP BY key. A correlated key seals to its defining
    /// region, so aggregates nested in it are rejected.
    GroupKey(Interpretation),
}

impl AggregateKind {
    /// Returns how entries read in this context are projected.
    #[must_use]
    pub fn interpretation(self) -> Interpretation {
        match self {
            AggregateKind::Function => Interpretation::Function,
            AggregateKind::GroupPartition => Interpretation::Partition,
            AggregateKind::GroupKey(interpretation) => interpretation,
        }
    }
}

/// One discovered aggregate occurrence.
#[derive(Debug, Clone)]
pub struct AggregateDescriptor {
    pub kind: AggregateKind,
    /// Syntax node the aggregate is attached to, once discovered.
    pub node: Option<NodeId>,
    pub context: ErrorContext,
    pub defining_region: usize,
    pub innermost_referenced_region: Option<usize>,
    /// Set by [`AggregateArena::seal`].
    pub evaluating_region: Option<usize>,
    pub containing: Option<AggregateId>,
    pub contained: Vec<AggregateId>,
    pub result_name: Option<String>,
    pub result_stub: Option<BoundExpression>,
    /// Aggregate expression, or the partition projection.
    pub definition: Option<BoundExpression>,
}

impl AggregateDescriptor {
    /// Returns true once the evaluation point is fixed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.evaluating_region.is_some()
    }
}

/// Owner of all aggregate descriptors of one resolver.
#[derive(Debug, Clone, Default)]
pub struct AggregateArena {
    items: Vec<AggregateDescriptor>,
}

impl AggregateArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        AggregateArena::default()
    }

    /// Creates a descriptor defined in `defining_region` and links it under
    /// `containing`.
    pub fn create(
        &mut self,
        kind: AggregateKind,
        node: Option<NodeId>,
        context: ErrorContext,
        defining_region: usize,
        containing: Option<AggregateId>,
    ) -> AggregateId {
        let id = AggregateId(self.items.len());
        self.items.push(AggregateDescriptor {
            kind,
            node,
            context,
            defining_region,
            innermost_referenced_region: None,
            evaluating_region: None,
            containing,
            contained: Vec::new(),
            result_name: None,
            result_stub: None,
            definition: None,
        });
        if let Some(parent) = containing {
            self.items[parent.0].contained.push(id);
        }
        id
    }

    /// Returns a descriptor.
    #[must_use]
    pub fn get(&self, id: AggregateId) -> &AggregateDescriptor {
        &self.items[id.0]
    }

    /// Returns a descriptor mutably.
    pub fn get_mut(&mut self, id: AggregateId) -> &mut AggregateDescriptor {
        &mut self.items[id.0]
    }

    /// Records a name resolved from `region`, keeping the innermost one.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor is sealed.
    pub fn update_referenced_region(&mut self, id: AggregateId, region: usize) {
        let item = &mut self.items[id.0];
        assert!(!item.is_sealed(), "aggregate {} changed after seal", id.0);
        if item.innermost_referenced_region.map_or(true, |current| region > current) {
            item.innermost_referenced_region = Some(region);
        }
    }

    /// Restores the innermost referenced region saved before a discarded
    /// conversion attempt.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor is sealed.
    pub fn restore_referenced_region(&mut self, id: AggregateId, region: Option<usize>) {
        let item = &mut self.items[id.0];
        assert!(!item.is_sealed(), "aggregate {} changed after seal", id.0);
        item.innermost_referenced_region = region;
    }

    /// Moves the descriptor under a new containing aggregate.
    pub fn set_containing(&mut self, id: AggregateId, containing: Option<AggregateId>) {
        if let Some(old) = self.items[id.0].containing {
            self.items[old.0].contained.retain(|c| *c != id);
        }
        if let Some(new) = containing {
            self.items[new.0].contained.push(id);
        }
        self.items[id.0].containing = containing;
    }

    /// Fixes the evaluation region of an aggregate and validates containment.
    ///
    /// `is_aggregating` reports whether a region currently hosts a group
    /// operation; `region_count` is the depth of the region stack.
    ///
    /// # Errors
    ///
    /// Returns `AggregateHasNoAggregatingScope` if no region from the chosen
    /// one inward is aggregating, and `NestedAggregateInAggregate` if a
    /// contained aggregate evaluates between this aggregate's evaluation and
    /// defining regions.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor is already sealed.
    pub fn seal(
        &mut self,
        id: AggregateId,
        region_count: usize,
        is_aggregating: impl Fn(usize) -> bool,
    ) -> Result<usize, BindError> {
        let item = &self.items[id.0];
        assert!(!item.is_sealed(), "aggregate {} sealed twice", id.0);

        let mut evaluating = item
            .innermost_referenced_region
            .unwrap_or(item.defining_region);
        if !is_aggregating(evaluating) {
            evaluating = (evaluating..region_count)
                .find(|&region| is_aggregating(region))
                .ok_or(BindError::AggregateHasNoAggregatingScope)?;
        }

        let defining = item.defining_region;
        self.validate_contained(id, evaluating, defining)?;

        self.items[id.0].evaluating_region = Some(evaluating);
        debug!(
            aggregate = id.0,
            defining_region = defining,
            evaluating_region = evaluating,
            "sealed aggregate"
        );
        Ok(evaluating)
    }

    fn validate_contained(&self, id: AggregateId, outer: usize, inner: usize) -> Result<(), BindError> {
        for &child in &self.items[id.0].contained {
            if let Some(region) = self.items[child.0].evaluating_region {
                if (outer..=inner).contains(&region) {
                    return Err(BindError::NestedAggregateInAggregate);
                }
            }
            self.validate_contained(child, outer, inner)?;
        }
        Ok(())
    }
}
