//! Compiled rule definitions.
//!
//! A [`RuleSpec`] is what a rule-language front end hands the engine: one
//! ordered condition list per disjunct, with alpha constraints already
//! separated from the join tests between conditions.

use reticle_foundation::{Error, Result, SymbolId};

use crate::alpha::{FactPattern, ObjectPattern};
use crate::expr::Expr;
use crate::network::arena::arena_key;
use crate::network::{JoinId, PatternId};

arena_key!(
    /// Handle to an installed rule.
    RuleId,
    "r"
);

/// What a condition matches.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionEntry {
    /// A fact pattern.
    Fact(FactPattern),
    /// An object pattern.
    Object(ObjectPattern),
    /// A conjunction evaluated as a sub-network and entered from the right.
    /// Only valid under `not` or `exists`.
    Group(Vec<Condition>),
}

/// One condition element of a rule's left-hand side.
///
/// Join expressions read left binds with [`Expr::left`] (pattern index
/// among the conditions before this one) and this condition's own bind
/// with [`Expr::right`] at index 0. For a group, the right side is the
/// whole group row: earlier binds first, then the group's own.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    /// What is matched.
    pub entry: ConditionEntry,
    /// `not`: satisfied while nothing matches.
    pub negated: bool,
    /// `exists`: satisfied once while anything matches.
    pub exists: bool,
    /// Inside a leading `logical` block.
    pub logical: bool,
    /// Join test between the left row and the right match.
    pub network_test: Option<Expr>,
    /// Test on the left row alone, run once the row is unblocked
    /// (`not`/`exists`) or ANDed into the join test otherwise.
    pub secondary_test: Option<Expr>,
    /// Hash of the left row; must agree with `right_hash` on joinable pairs.
    pub left_hash: Vec<Expr>,
    /// Hash of the right match.
    pub right_hash: Vec<Expr>,
}

impl Condition {
    fn with_entry(entry: ConditionEntry) -> Self {
        Self {
            entry,
            negated: false,
            exists: false,
            logical: false,
            network_test: None,
            secondary_test: None,
            left_hash: Vec::new(),
            right_hash: Vec::new(),
        }
    }

    /// A positive fact condition.
    #[must_use]
    pub fn fact(pattern: FactPattern) -> Self {
        Self::with_entry(ConditionEntry::Fact(pattern))
    }

    /// A positive object condition.
    #[must_use]
    pub fn object(pattern: ObjectPattern) -> Self {
        Self::with_entry(ConditionEntry::Object(pattern))
    }

    /// `(not (and ...))`.
    #[must_use]
    pub fn not_all(conditions: Vec<Condition>) -> Self {
        Self::with_entry(ConditionEntry::Group(conditions)).negate()
    }

    /// `(exists (and ...))`.
    #[must_use]
    pub fn exists_all(conditions: Vec<Condition>) -> Self {
        Self::with_entry(ConditionEntry::Group(conditions)).existential()
    }

    /// Marks the condition `not`.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }

    /// Marks the condition `exists`.
    #[must_use]
    pub fn existential(mut self) -> Self {
        self.exists = true;
        self
    }

    /// Marks the condition as part of the leading `logical` block.
    #[must_use]
    pub fn logical(mut self) -> Self {
        self.logical = true;
        self
    }

    /// Sets the join test.
    #[must_use]
    pub fn with_test(mut self, test: Expr) -> Self {
        self.network_test = Some(test);
        self
    }

    /// Sets the secondary test.
    #[must_use]
    pub fn with_secondary(mut self, test: Expr) -> Self {
        self.secondary_test = Some(test);
        self
    }

    /// Sets the hash expressions for both sides.
    #[must_use]
    pub fn with_hash(mut self, left: Vec<Expr>, right: Vec<Expr>) -> Self {
        self.left_hash = left;
        self.right_hash = right;
        self
    }

    pub(crate) fn is_group(&self) -> bool {
        matches!(self.entry, ConditionEntry::Group(_))
    }
}

/// A rule as compiled by a front end.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSpec {
    /// Rule name; must be unique within an engine.
    pub name: String,
    /// Agenda priority.
    pub salience: i32,
    /// One condition list per `or` branch.
    pub disjuncts: Vec<Vec<Condition>>,
}

impl RuleSpec {
    /// Creates a rule with no conditions yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            salience: 0,
            disjuncts: Vec::new(),
        }
    }

    /// Sets the salience.
    #[must_use]
    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = salience;
        self
    }

    /// Adds a disjunct.
    #[must_use]
    pub fn when(mut self, conditions: Vec<Condition>) -> Self {
        self.disjuncts.push(conditions);
        self
    }

    /// Checks the shape of every disjunct.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCondition` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.disjuncts.is_empty() {
            return Err(Error::invalid_condition(format!(
                "rule {} has no conditions",
                self.name
            )));
        }
        for conditions in &self.disjuncts {
            if conditions.is_empty() {
                return Err(Error::invalid_condition(format!(
                    "rule {} has an empty disjunct",
                    self.name
                )));
            }
            let mut logical_open = true;
            for (index, condition) in conditions.iter().enumerate() {
                if condition.logical && !logical_open {
                    return Err(Error::invalid_condition(
                        "logical conditions must come first",
                    ));
                }
                logical_open &= condition.logical;
                validate_condition(condition, index == 0)?;
            }
        }
        Ok(())
    }
}

fn validate_condition(condition: &Condition, first: bool) -> Result<()> {
    if condition.negated && condition.exists {
        return Err(Error::invalid_condition("a condition cannot be both not and exists"));
    }
    if first && !condition.left_hash.is_empty() {
        return Err(Error::invalid_condition(
            "the first condition has no left input to hash",
        ));
    }
    if let ConditionEntry::Group(inner) = &condition.entry {
        if !(condition.negated || condition.exists) {
            return Err(Error::invalid_condition(
                "a grouped condition must be negated or existential",
            ));
        }
        if inner.is_empty() {
            return Err(Error::invalid_condition("empty condition group"));
        }
        for (index, nested) in inner.iter().enumerate() {
            if nested.logical {
                return Err(Error::invalid_condition(
                    "logical is only allowed at the top level",
                ));
            }
            validate_condition(nested, first && index == 0)?;
        }
    }
    Ok(())
}

/// The network fragment of one disjunct.
#[derive(Clone, Debug)]
pub(crate) struct Disjunct {
    pub(crate) terminal: JoinId,
    /// Join whose left rows carry logical support, if any.
    pub(crate) logical_join: Option<JoinId>,
    /// Top-level joins in condition order, terminal excluded.
    pub(crate) joins: Vec<JoinId>,
    pub(crate) patterns: Vec<PatternId>,
}

/// An installed rule.
#[derive(Clone, Debug)]
pub(crate) struct Rule {
    pub(crate) name: SymbolId,
    pub(crate) salience: i32,
    pub(crate) disjuncts: Vec<Disjunct>,
}
