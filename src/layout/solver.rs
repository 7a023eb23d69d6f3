//! Constraint solver integration for layout computation
//!
//! This module provides a wrapper around the kasuari Cassowary constraint solver,
//! translating layout constraints between item frames into the solver's format
//! and extracting solutions.
//!
//! Conflicts are never surfaced to the layout engine. A required constraint
//! the solver rejects as unsatisfiable is re-added at [`Priority::High`], the
//! way an auto-layout system breaks a constraint and carries on.

use std::collections::HashMap;

use kasuari::{
    Constraint as KasuariConstraint, Expression, Solver as KasuariSolver, Strength, Term,
    Variable as KasuariVariable, WeightedRelation::*,
};
use thiserror::Error;

use super::types::NodeId;

// ============================================================================
// Variables
// ============================================================================

/// Properties that can be constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutProperty {
    Left,
    Top,
    Width,
    Height,
    /// Right = Left + Width (derived property)
    Right,
    /// Bottom = Top + Height (derived property)
    Bottom,
    /// Center X = Left + Width/2 (derived property)
    CenterX,
    /// Center Y = Top + Height/2 (derived property)
    CenterY,
}

/// Which rectangle of an item a variable belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    /// The item's outer frame, margins excluded
    Outer(NodeId),
    /// The outer frame inset by padding
    Content(NodeId),
    /// Zero-content marker before a box's first child on the main axis
    LeadingSide(NodeId),
    /// Zero-content marker after a box's last child on the main axis
    TrailingSide(NodeId),
}

impl Frame {
    pub fn node(self) -> NodeId {
        match self {
            Frame::Outer(id) | Frame::Content(id) | Frame::LeadingSide(id) | Frame::TrailingSide(id) => id,
        }
    }
}

/// A variable in the constraint system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutVariable {
    pub frame: Frame,
    pub property: LayoutProperty,
}

impl LayoutVariable {
    pub fn new(frame: Frame, property: LayoutProperty) -> Self {
        Self { frame, property }
    }
}

// ============================================================================
// Priorities
// ============================================================================

/// How hard the solver tries to keep a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Content hugging of wrap-content containers
    Fitting,
    /// Intrinsic sizes and placeholders
    Low,
    /// Preferred but breakable relations
    High,
    Required,
}

impl Priority {
    fn strength(self) -> Strength {
        match self {
            Priority::Required => Strength::REQUIRED,
            Priority::High => Strength::STRONG,
            Priority::Low => Strength::MEDIUM,
            Priority::Fitting => Strength::WEAK,
        }
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// A constraint in the layout system
#[derive(Debug, Clone)]
pub enum LayoutConstraint {
    /// Variable = constant
    Fixed {
        variable: LayoutVariable,
        value: f64,
        priority: Priority,
    },

    /// left_var = right_var + offset
    Equal {
        left: LayoutVariable,
        right: LayoutVariable,
        offset: f64,
        priority: Priority,
    },

    /// variable >= value
    GreaterOrEqual {
        variable: LayoutVariable,
        value: f64,
        priority: Priority,
    },

    /// variable <= value
    LessOrEqual {
        variable: LayoutVariable,
        value: f64,
        priority: Priority,
    },

    /// left_var >= right_var + offset
    AtLeast {
        left: LayoutVariable,
        right: LayoutVariable,
        offset: f64,
        priority: Priority,
    },

    /// left_var <= right_var + offset
    AtMost {
        left: LayoutVariable,
        right: LayoutVariable,
        offset: f64,
        priority: Priority,
    },

    /// target = source * ratio
    Ratio {
        target: LayoutVariable,
        source: LayoutVariable,
        ratio: f64,
        priority: Priority,
    },
}

impl LayoutConstraint {
    pub fn priority(&self) -> Priority {
        match self {
            LayoutConstraint::Fixed { priority, .. }
            | LayoutConstraint::Equal { priority, .. }
            | LayoutConstraint::GreaterOrEqual { priority, .. }
            | LayoutConstraint::LessOrEqual { priority, .. }
            | LayoutConstraint::AtLeast { priority, .. }
            | LayoutConstraint::AtMost { priority, .. }
            | LayoutConstraint::Ratio { priority, .. } => *priority,
        }
    }

    /// The same constraint at another priority
    pub fn with_priority(mut self, new: Priority) -> Self {
        match &mut self {
            LayoutConstraint::Fixed { priority, .. }
            | LayoutConstraint::Equal { priority, .. }
            | LayoutConstraint::GreaterOrEqual { priority, .. }
            | LayoutConstraint::LessOrEqual { priority, .. }
            | LayoutConstraint::AtLeast { priority, .. }
            | LayoutConstraint::AtMost { priority, .. }
            | LayoutConstraint::Ratio { priority, .. } => *priority = new,
        }
        self
    }

    fn describe(&self) -> String {
        fn var(v: &LayoutVariable) -> String {
            format!("{:?}.{:?}", v.frame, v.property)
        }
        match self {
            LayoutConstraint::Fixed { variable, value, .. } => format!("{} = {}", var(variable), value),
            LayoutConstraint::Equal { left, right, offset, .. } => {
                format!("{} = {} + {}", var(left), var(right), offset)
            }
            LayoutConstraint::GreaterOrEqual { variable, value, .. } => {
                format!("{} >= {}", var(variable), value)
            }
            LayoutConstraint::LessOrEqual { variable, value, .. } => {
                format!("{} <= {}", var(variable), value)
            }
            LayoutConstraint::AtLeast { left, right, offset, .. } => {
                format!("{} >= {} + {}", var(left), var(right), offset)
            }
            LayoutConstraint::AtMost { left, right, offset, .. } => {
                format!("{} <= {} + {}", var(left), var(right), offset)
            }
            LayoutConstraint::Ratio { target, source, ratio, .. } => {
                format!("{} = {} * {}", var(target), var(source), ratio)
            }
        }
    }
}

/// Errors from the constraint solver
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Unsatisfiable constraint: {0}")]
    Unsatisfiable(String),

    #[error("Unknown constraint handle {0}")]
    UnknownHandle(usize),

    #[error("Internal solver error: {0}")]
    Internal(String),
}

/// Names a constraint so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(usize);

// ============================================================================
// ConstraintSolver
// ============================================================================

/// Wrapper around kasuari solver
pub struct ConstraintSolver {
    solver: KasuariSolver,
    /// Maps our variables to kasuari variables
    variables: HashMap<LayoutVariable, KasuariVariable>,
    /// Last known value of every kasuari variable
    values: HashMap<KasuariVariable, f64>,
    active: HashMap<ConstraintHandle, KasuariConstraint>,
    next_handle: usize,
    demoted: usize,
}

impl ConstraintSolver {
    pub fn new() -> Self {
        Self {
            solver: KasuariSolver::new(),
            variables: HashMap::new(),
            values: HashMap::new(),
            active: HashMap::new(),
            next_handle: 0,
            demoted: 0,
        }
    }

    /// Get or create a kasuari variable for a base property
    fn get_or_create_var(&mut self, frame: Frame, property: LayoutProperty) -> KasuariVariable {
        let var = LayoutVariable::new(frame, property);
        *self.variables.entry(var).or_insert_with(KasuariVariable::new)
    }

    /// Terms of a layout variable over base properties
    ///
    /// Derived properties expand to their definition, e.g. Right = Left + Width.
    fn terms(&mut self, var: &LayoutVariable, scale: f64) -> Vec<Term> {
        let (position, size) = match var.property {
            LayoutProperty::Left | LayoutProperty::Top | LayoutProperty::Width | LayoutProperty::Height => {
                let v = self.get_or_create_var(var.frame, var.property);
                return vec![Term::new(v, scale)];
            }
            LayoutProperty::Right | LayoutProperty::CenterX => (LayoutProperty::Left, LayoutProperty::Width),
            LayoutProperty::Bottom | LayoutProperty::CenterY => (LayoutProperty::Top, LayoutProperty::Height),
        };
        let factor = match var.property {
            LayoutProperty::CenterX | LayoutProperty::CenterY => 0.5,
            _ => 1.0,
        };
        let p = self.get_or_create_var(var.frame, position);
        let s = self.get_or_create_var(var.frame, size);
        vec![Term::new(p, scale), Term::new(s, scale * factor)]
    }

    /// Build `lhs - rhs - offset` from two variables
    fn difference(&mut self, left: &LayoutVariable, right: &LayoutVariable, right_scale: f64, offset: f64) -> Expression {
        let mut terms = self.terms(left, 1.0);
        terms.extend(self.terms(right, -right_scale));
        Expression::new(terms, -offset)
    }

    fn single(&mut self, variable: &LayoutVariable, value: f64) -> Expression {
        let terms = self.terms(variable, 1.0);
        Expression::new(terms, -value)
    }

    fn to_kasuari(&mut self, constraint: &LayoutConstraint) -> KasuariConstraint {
        let strength = constraint.priority().strength();
        match constraint {
            LayoutConstraint::Fixed { variable, value, .. } => {
                self.single(variable, *value) | EQ(strength) | 0.0
            }
            LayoutConstraint::GreaterOrEqual { variable, value, .. } => {
                self.single(variable, *value) | GE(strength) | 0.0
            }
            LayoutConstraint::LessOrEqual { variable, value, .. } => {
                self.single(variable, *value) | LE(strength) | 0.0
            }
            LayoutConstraint::Equal { left, right, offset, .. } => {
                self.difference(left, right, 1.0, *offset) | EQ(strength) | 0.0
            }
            LayoutConstraint::AtLeast { left, right, offset, .. } => {
                self.difference(left, right, 1.0, *offset) | GE(strength) | 0.0
            }
            LayoutConstraint::AtMost { left, right, offset, .. } => {
                self.difference(left, right, 1.0, *offset) | LE(strength) | 0.0
            }
            LayoutConstraint::Ratio { target, source, ratio, .. } => {
                self.difference(target, source, *ratio, 0.0) | EQ(strength) | 0.0
            }
        }
    }

    /// Add a constraint to the solver
    ///
    /// An unsatisfiable required constraint is demoted to [`Priority::High`]
    /// instead of failing.
    pub fn add_constraint(&mut self, constraint: LayoutConstraint) -> Result<ConstraintHandle, SolverError> {
        let kconstraint = self.to_kasuari(&constraint);
        let added = match self.solver.add_constraint(kconstraint.clone()) {
            Ok(()) => kconstraint,
            Err(kasuari::AddConstraintError::UnsatisfiableConstraint)
                if constraint.priority() == Priority::Required =>
            {
                tracing::debug!(constraint = %constraint.describe(), "demoting unsatisfiable constraint");
                self.demoted += 1;
                let demoted = constraint.with_priority(Priority::High);
                let kconstraint = self.to_kasuari(&demoted);
                self.solver
                    .add_constraint(kconstraint.clone())
                    .map_err(|e| self.convert_kasuari_error(e, &demoted))?;
                kconstraint
            }
            Err(e) => return Err(self.convert_kasuari_error(e, &constraint)),
        };

        let handle = ConstraintHandle(self.next_handle);
        self.next_handle += 1;
        self.active.insert(handle, added);
        Ok(handle)
    }

    /// Remove a previously added constraint
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<(), SolverError> {
        let constraint = self
            .active
            .remove(&handle)
            .ok_or(SolverError::UnknownHandle(handle.0))?;
        self.solver
            .remove_constraint(&constraint)
            .map_err(|e| SolverError::Internal(format!("Failed to remove constraint: {e:?}")))
    }

    /// Number of required constraints that had to be demoted so far
    pub fn demoted_count(&self) -> usize {
        self.demoted
    }

    fn convert_kasuari_error(&self, e: kasuari::AddConstraintError, constraint: &LayoutConstraint) -> SolverError {
        match e {
            kasuari::AddConstraintError::UnsatisfiableConstraint => {
                SolverError::Unsatisfiable(constraint.describe())
            }
            kasuari::AddConstraintError::DuplicateConstraint => {
                SolverError::Internal(format!("Duplicate constraint: {}", constraint.describe()))
            }
            kasuari::AddConstraintError::InternalSolverError(msg) => SolverError::Internal(format!(
                "Internal solver error for {}: {}",
                constraint.describe(),
                msg
            )),
        }
    }

    /// Solve the constraint system
    ///
    /// kasuari only reports variables whose value changed since the last
    /// fetch, so values are accumulated across solves. Untouched variables
    /// read as zero.
    pub fn solve(&mut self) -> Solution {
        for (kvar, value) in self.solver.fetch_changes() {
            self.values.insert(*kvar, *value);
        }
        let values = self
            .variables
            .iter()
            .map(|(var, kvar)| (*var, self.values.get(kvar).copied().unwrap_or(0.0)))
            .collect();
        Solution { values }
    }
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solution from the constraint solver
#[derive(Debug, Clone, Default)]
pub struct Solution {
    values: HashMap<LayoutVariable, f64>,
}

impl Solution {
    /// Value of any property, derived ones included
    pub fn get(&self, frame: Frame, property: LayoutProperty) -> f64 {
        let base = |p: LayoutProperty| {
            self.values
                .get(&LayoutVariable::new(frame, p))
                .copied()
                .unwrap_or(0.0)
        };
        match property {
            LayoutProperty::Left | LayoutProperty::Top | LayoutProperty::Width | LayoutProperty::Height => {
                base(property)
            }
            LayoutProperty::Right => base(LayoutProperty::Left) + base(LayoutProperty::Width),
            LayoutProperty::Bottom => base(LayoutProperty::Top) + base(LayoutProperty::Height),
            LayoutProperty::CenterX => base(LayoutProperty::Left) + base(LayoutProperty::Width) / 2.0,
            LayoutProperty::CenterY => base(LayoutProperty::Top) + base(LayoutProperty::Height) / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: usize, property: LayoutProperty) -> LayoutVariable {
        LayoutVariable::new(Frame::Outer(NodeId(id)), property)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_fixed_constraint() {
        let mut solver = ConstraintSolver::new();
        solver
            .add_constraint(LayoutConstraint::Fixed {
                variable: v(0, LayoutProperty::Width),
                value: 100.0,
                priority: Priority::Required,
            })
            .unwrap();
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(0)), LayoutProperty::Width), 100.0));
    }

    #[test]
    fn test_derived_right_chain() {
        let mut solver = ConstraintSolver::new();
        // a: left 10, width 50; b.left = a.right + 5
        for c in [
            LayoutConstraint::Fixed { variable: v(0, LayoutProperty::Left), value: 10.0, priority: Priority::Required },
            LayoutConstraint::Fixed { variable: v(0, LayoutProperty::Width), value: 50.0, priority: Priority::Required },
            LayoutConstraint::Equal {
                left: v(1, LayoutProperty::Left),
                right: v(0, LayoutProperty::Right),
                offset: 5.0,
                priority: Priority::Required,
            },
        ] {
            solver.add_constraint(c).unwrap();
        }
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(1)), LayoutProperty::Left), 65.0));
    }

    #[test]
    fn test_center_alignment() {
        let mut solver = ConstraintSolver::new();
        for c in [
            LayoutConstraint::Fixed { variable: v(0, LayoutProperty::Left), value: 0.0, priority: Priority::Required },
            LayoutConstraint::Fixed { variable: v(0, LayoutProperty::Width), value: 100.0, priority: Priority::Required },
            LayoutConstraint::Fixed { variable: v(1, LayoutProperty::Width), value: 20.0, priority: Priority::Required },
            LayoutConstraint::Equal {
                left: v(1, LayoutProperty::CenterX),
                right: v(0, LayoutProperty::CenterX),
                offset: 0.0,
                priority: Priority::Required,
            },
        ] {
            solver.add_constraint(c).unwrap();
        }
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(1)), LayoutProperty::Left), 40.0));
    }

    #[test]
    fn test_ratio_constraint() {
        let mut solver = ConstraintSolver::new();
        solver
            .add_constraint(LayoutConstraint::Fixed {
                variable: v(0, LayoutProperty::Width),
                value: 200.0,
                priority: Priority::Required,
            })
            .unwrap();
        solver
            .add_constraint(LayoutConstraint::Ratio {
                target: v(0, LayoutProperty::Height),
                source: v(0, LayoutProperty::Width),
                ratio: 0.5,
                priority: Priority::High,
            })
            .unwrap();
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(0)), LayoutProperty::Height), 100.0));
    }

    #[test]
    fn test_weaker_priority_yields() {
        let mut solver = ConstraintSolver::new();
        let width = v(0, LayoutProperty::Width);
        solver
            .add_constraint(LayoutConstraint::Fixed { variable: width, value: 80.0, priority: Priority::Low })
            .unwrap();
        solver
            .add_constraint(LayoutConstraint::LessOrEqual { variable: width, value: 50.0, priority: Priority::Required })
            .unwrap();
        solver
            .add_constraint(LayoutConstraint::Fixed { variable: width, value: 0.0, priority: Priority::Fitting })
            .unwrap();
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(0)), LayoutProperty::Width), 50.0));
    }

    #[test]
    fn test_conflicting_required_constraint_is_demoted() {
        let mut solver = ConstraintSolver::new();
        let x = v(0, LayoutProperty::Left);
        solver
            .add_constraint(LayoutConstraint::Fixed { variable: x, value: 100.0, priority: Priority::Required })
            .unwrap();
        let result = solver.add_constraint(LayoutConstraint::Fixed {
            variable: x,
            value: 200.0,
            priority: Priority::Required,
        });
        assert!(result.is_ok());
        assert_eq!(solver.demoted_count(), 1);
        let solution = solver.solve();
        assert!(approx(solution.get(Frame::Outer(NodeId(0)), LayoutProperty::Left), 100.0));
    }

    #[test]
    fn test_remove_constraint() {
        let mut solver = ConstraintSolver::new();
        let width = v(0, LayoutProperty::Width);
        let handle = solver
            .add_constraint(LayoutConstraint::Fixed { variable: width, value: 10.0, priority: Priority::Required })
            .unwrap();
        assert!(approx(solver.solve().get(Frame::Outer(NodeId(0)), LayoutProperty::Width), 10.0));

        solver.remove_constraint(handle).unwrap();
        solver
            .add_constraint(LayoutConstraint::Fixed { variable: width, value: 30.0, priority: Priority::Required })
            .unwrap();
        assert!(approx(solver.solve().get(Frame::Outer(NodeId(0)), LayoutProperty::Width), 30.0));
        assert!(matches!(solver.remove_constraint(handle), Err(SolverError::UnknownHandle(_))));
    }
}
